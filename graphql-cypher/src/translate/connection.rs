//! Relay connections.
//!
//! Every matched edge is collected first so that `totalCount` sees the whole result; the page
//! is cut from the collected list. Cursors and page info are filled in from the page offset
//! when the records are reshaped.
use apollo_compiler::Name;
use serde_json::Value;

use super::NodeSet;
use super::Translator;
use super::cypher;
use super::projection::TYPENAME;
use super::read::ROOT;
use super::selection::SelectedField;
use super::selection::SelectionSet;
use super::shape::ConnectionField;
use super::shape::ConnectionShape;
use super::shape::EdgeField;
use super::shape::PageInfoField;
use super::shape::RootShape;
use super::shape::Shape;
use super::shape::offset_after;
use crate::auth::rules::AuthorizationOperation;
use crate::error::CompileError;
use crate::error::GraphCypherError;
use crate::filter::FilterParser;
use crate::model::ConceptType;
use crate::model::Entity;
use crate::model::PropertiesType;
use crate::model::Relationship;
use crate::schema::naming;

/// What a connection is over.
struct Edges<'a> {
    target: NodeSet<'a>,
    /// Whether the edges carry a relationship, as in connections of relationship fields.
    relationship: bool,
    properties: Option<&'a PropertiesType>,
    connection_type: Name,
    edge_type: Name,
}

impl<'a> Translator<'a> {
    pub(super) fn connection_root(
        &mut self,
        name: &Name,
        field: &SelectedField,
    ) -> Result<(Vec<String>, RootShape), GraphCypherError> {
        let target = self.node_set(name)?;
        let plural = match self.set_entity(&target)? {
            Entity::Concept(concept) => concept.plural.clone(),
            Entity::Interface(interface) => interface.plural.clone(),
            Entity::Union(union) => union.plural.clone(),
            Entity::Properties(_) | Entity::Jwt(_) => name.to_string(),
        };
        let mut statement = self.match_nodes(&target, ROOT, field, AuthorizationOperation::Read)?;
        let collected = self.env.var();
        statement.push(format!("WITH collect({{node: {ROOT}}}) AS {collected}"));
        let edges = Edges {
            connection_type: Name::new_unchecked(&naming::root_connection(&plural)),
            edge_type: Name::new_unchecked(&naming::root_edge(name)),
            target,
            relationship: false,
            properties: None,
        };
        let (clauses, expression, shape) = self.edges(&edges, &collected, field)?;
        statement.extend(clauses);
        statement.push(format!("RETURN {expression} AS {ROOT}"));
        Ok((statement, RootShape::Rows { shape, list: false }))
    }

    /// A subquery computing a `<rel>Connection` field of the node bound to `variable`.
    pub(super) fn connection_subquery(
        &mut self,
        source: &'a ConceptType,
        variable: &str,
        relationship: &'a Relationship,
        field: &SelectedField,
    ) -> Result<(String, String, Shape), GraphCypherError> {
        let target = self.node_set(relationship.target.name())?;
        let target_var = self.env.this();
        let rel_var = self.env.this();
        let pattern = relationship.pattern(
            variable,
            &rel_var,
            &target.node_pattern(&target_var),
            relationship.reads_directed(),
        );
        let mut predicates = Vec::new();
        predicates.extend(target.label_predicate(&target_var));
        if let Some(value) = field.object_argument("where")? {
            let filter = FilterParser::new(self.model).parse_connection_where(relationship, value)?;
            self.push_predicate(&mut predicates, filter.as_ref(), &target_var, Some(&rel_var))?;
        }
        predicates.extend(self.read_filter(&target, &target_var)?);

        let collected = self.env.var();
        let mut body = vec![format!("WITH {variable}"), format!("MATCH {pattern}")];
        body.extend(cypher::where_clause(cypher::and(predicates)));
        body.push(format!(
            "WITH collect({{node: {target_var}, relationship: {rel_var}}}) AS {collected}"
        ));
        let model = self.model;
        let properties = relationship
            .properties
            .as_ref()
            .and_then(|name| model.relationship_properties.get(name));
        let edges = Edges {
            target,
            relationship: true,
            properties,
            connection_type: Name::new_unchecked(&naming::connection(&source.name, &relationship.field_name)),
            edge_type: Name::new_unchecked(&naming::relationship(&source.name, &relationship.field_name)),
        };
        let (clauses, expression, shape) = self.edges(&edges, &collected, field)?;
        body.extend(clauses);
        let result = self.env.var();
        body.push(format!("RETURN {expression} AS {result}"));
        Ok((cypher::call(&body), result, shape))
    }

    /// The page of a collected list of edges. Returns the clauses, the expression of the
    /// connection map and its shape.
    fn edges(
        &mut self,
        edges: &Edges<'a>,
        collected: &str,
        field: &SelectedField,
    ) -> Result<(Vec<String>, String, Shape), GraphCypherError> {
        let total = self.env.var();
        let mut clauses = vec![format!("WITH {collected}, size({collected}) AS {total}")];

        let offset = match field.argument("after").and_then(Value::as_str) {
            Some(cursor) => offset_after(cursor)?,
            None => 0,
        };
        let node_var = self.env.this();
        let rel_var = edges.relationship.then(|| self.env.this());
        let order = match field.argument("sort") {
            Some(sort) => self.connection_order(edges, &node_var, rel_var.as_deref(), sort)?,
            None => Vec::new(),
        };

        // Node and properties selections of every `edges` alias.
        let mut node_selection = SelectionSet::default();
        let mut properties_selection = SelectionSet::default();
        for edges_field in field.selection.fields().iter().filter(|f| f.name == "edges") {
            for edge_field in edges_field.selection.fields() {
                let selection = match edge_field.name.as_str() {
                    "node" => &mut node_selection,
                    "properties" => &mut properties_selection,
                    _ => continue,
                };
                selection.items.extend(edge_field.selection.items.iter().cloned());
            }
        }

        let mut body = vec![
            format!("WITH {collected}"),
            format!("UNWIND {collected} AS edge"),
            match &rel_var {
                Some(rel_var) => format!("WITH edge.node AS {node_var}, edge.relationship AS {rel_var}"),
                None => format!("WITH edge.node AS {node_var}"),
            },
        ];
        let skip = (offset > 0).then(|| Value::from(offset));
        body.extend(self.page_clauses(order, skip, field.argument("first").cloned()));
        let mut projection = self.project(&edges.target, &node_var, &node_selection)?;
        body.extend(projection.clauses());
        let mut entries = vec![format!("node: {}", projection.expression)];
        let mut properties_shape = Shape::Value;
        if let (Some(rel_var), Some(properties)) = (&rel_var, edges.properties) {
            let (expression, shape) = self.project_properties(properties, rel_var, &properties_selection)?;
            entries.push(format!("properties: {expression}"));
            properties_shape = shape;
        }
        let page = self.env.var();
        body.push(format!("RETURN collect({{ {} }}) AS {page}", entries.join(", ")));
        clauses.push(cypher::call(&body));

        let shape = Shape::Connection(ConnectionShape {
            offset,
            fields: self.connection_fields(edges, field, &projection.shape, &properties_shape)?,
        });
        Ok((clauses, format!("{{edges: {page}, totalCount: {total}}}"), shape))
    }

    fn connection_order(
        &self,
        edges: &Edges<'a>,
        node_var: &str,
        rel_var: Option<&str>,
        sort: &Value,
    ) -> Result<Vec<String>, CompileError> {
        let entity = self.set_entity(&edges.target)?;
        if !edges.relationship {
            return self.sort_items(entity, node_var, sort);
        }
        let items: Vec<&Value> = match sort {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        let mut order = Vec::new();
        for item in items {
            let Some(item) = item.as_object() else {
                continue;
            };
            if let Some(node) = item.get("node").filter(|v| !v.is_null()) {
                order.extend(self.sort_items(entity, node_var, node)?);
            }
            if let (Some(edge), Some(properties), Some(rel_var)) =
                (item.get("edge").filter(|v| !v.is_null()), edges.properties, rel_var)
            {
                order.extend(self.sort_items(Entity::Properties(properties), rel_var, edge)?);
            }
        }
        Ok(order)
    }

    fn connection_fields(
        &self,
        edges: &Edges<'a>,
        field: &SelectedField,
        node_shape: &Shape,
        properties_shape: &Shape,
    ) -> Result<Vec<(String, ConnectionField)>, CompileError> {
        let unknown = |type_name: &Name, field: &SelectedField| CompileError::UnknownField {
            type_name: type_name.clone(),
            field: field.name.to_string(),
        };
        let mut fields = Vec::new();
        for selected in field.selection.fields() {
            let connection_field = match selected.name.as_str() {
                TYPENAME => ConnectionField::Typename(edges.connection_type.clone()),
                "totalCount" => ConnectionField::TotalCount,
                "pageInfo" => {
                    let mut page_info = Vec::new();
                    for info in selected.selection.fields() {
                        let info_field = match info.name.as_str() {
                            TYPENAME => PageInfoField::Typename,
                            "hasNextPage" => PageInfoField::HasNextPage,
                            "hasPreviousPage" => PageInfoField::HasPreviousPage,
                            "startCursor" => PageInfoField::StartCursor,
                            "endCursor" => PageInfoField::EndCursor,
                            _ => {
                                return Err(unknown(&Name::new_unchecked(naming::PAGE_INFO), &info));
                            }
                        };
                        page_info.push((info.response_key, info_field));
                    }
                    ConnectionField::PageInfo(page_info)
                }
                "edges" => {
                    let mut edge_fields = Vec::new();
                    for edge in selected.selection.fields() {
                        let edge_field = match edge.name.as_str() {
                            TYPENAME => EdgeField::Typename(edges.edge_type.clone()),
                            "cursor" => EdgeField::Cursor,
                            "node" => EdgeField::Node(node_shape.clone()),
                            "properties" if !matches!(properties_shape, Shape::Value) => {
                                EdgeField::Properties(properties_shape.clone())
                            }
                            _ => return Err(unknown(&edges.edge_type, &edge)),
                        };
                        edge_fields.push((edge.response_key, edge_field));
                    }
                    ConnectionField::Edges(edge_fields)
                }
                _ => return Err(unknown(&edges.connection_type, &selected)),
            };
            fields.push((selected.response_key, connection_field));
        }
        Ok(fields)
    }
}
