//! Aggregations: counts and per-field statistics.
//!
//! Matched nodes, or node and relationship pairs, are collected into one list. Each selected
//! field statistic is computed by its own subquery over that list.
use apollo_compiler::Name;

use super::Translator;
use super::cypher;
use super::projection::TYPENAME;
use super::read::ROOT;
use super::selection::SelectedField;
use super::shape::RootShape;
use super::shape::Shape;
use crate::auth::rules::AuthorizationOperation;
use crate::auth::rules::ValidationWhen;
use crate::error::CompileError;
use crate::error::GraphCypherError;
use crate::model::ConceptType;
use crate::model::Entity;
use crate::model::Field;
use crate::model::Relationship;
use crate::model::ScalarCategory;
use crate::schema::naming;

fn map_literal(entries: &[String]) -> String {
    if entries.is_empty() {
        "{}".to_owned()
    } else {
        format!("{{ {} }}", entries.join(", "))
    }
}

fn unknown(type_name: &str, field: &SelectedField) -> CompileError {
    CompileError::UnknownField {
        type_name: Name::new_unchecked(type_name),
        field: field.name.to_string(),
    }
}

impl<'a> Translator<'a> {
    pub(super) fn aggregate_root(
        &mut self,
        name: &Name,
        field: &SelectedField,
    ) -> Result<(Vec<String>, RootShape), GraphCypherError> {
        let set = self.node_set(name)?;
        let selected = field.selection.fields();
        for concept in set.concepts.iter().copied() {
            self.authenticate(
                concept,
                AuthorizationOperation::Aggregate,
                selected.iter().map(|f| &f.name),
            )?;
        }
        let mut statement = self.match_nodes(&set, ROOT, field, AuthorizationOperation::Aggregate)?;
        statement.extend(self.set_validate(
            &set,
            ROOT,
            AuthorizationOperation::Aggregate,
            ValidationWhen::Before,
        )?);
        let items = self.env.var();
        statement.push(format!("WITH collect({{node: {ROOT}}}) AS {items}"));

        let entity = self.set_entity(&set)?;
        let type_name = naming::aggregate_selection(name);
        let mut calls = Vec::new();
        let mut entries = Vec::new();
        for selected in &selected {
            let key = cypher::escape(&selected.response_key);
            let value = match selected.name.as_str() {
                TYPENAME => format!("\"{type_name}\""),
                "count" => format!("size({items})"),
                _ => {
                    let model_field = entity
                        .field(&selected.name)
                        .ok_or_else(|| unknown(&type_name, selected))?;
                    self.field_aggregate(&items, "node", model_field, selected, &mut calls)?
                }
            };
            entries.push(format!("{key}: {value}"));
        }
        statement.extend(calls);
        statement.push(format!("RETURN {} AS {ROOT}", map_literal(&entries)));
        Ok((
            statement,
            RootShape::Rows {
                shape: Shape::Value,
                list: false,
            },
        ))
    }

    /// A subquery computing a `<rel>Aggregate` field of the node bound to `variable`.
    pub(super) fn aggregate_subquery(
        &mut self,
        source: &'a ConceptType,
        variable: &str,
        relationship: &'a Relationship,
        field: &SelectedField,
    ) -> Result<(String, String), GraphCypherError> {
        let target = self.node_set(relationship.target.name())?;
        for concept in target.concepts.iter().copied() {
            self.authenticate(concept, AuthorizationOperation::Aggregate, [])?;
        }
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
        let filter = self.where_filter(&target, field)?;
        self.push_predicate(&mut predicates, filter.as_ref(), &target_var, None)?;
        predicates.extend(self.set_filter(&target, &target_var, AuthorizationOperation::Aggregate)?);

        let items = self.env.var();
        let mut body = vec![format!("WITH {variable}"), format!("MATCH {pattern}")];
        body.extend(cypher::where_clause(cypher::and(predicates)));
        body.push(format!(
            "WITH collect({{node: {target_var}, relationship: {rel_var}}}) AS {items}"
        ));

        let target_entity = self.set_entity(&target)?;
        let model = self.model;
        let properties = relationship
            .properties
            .as_ref()
            .and_then(|name| model.relationship_properties.get(name))
            .map(Entity::Properties);
        let (source_name, target_name, field_name) =
            (&source.name, relationship.target.name(), &relationship.field_name);
        let type_name = naming::relationship_aggregate(source_name, target_name, field_name);

        let mut calls = Vec::new();
        let mut entries = Vec::new();
        for selected in field.selection.fields() {
            let key = cypher::escape(&selected.response_key);
            let value = match selected.name.as_str() {
                TYPENAME => format!("\"{type_name}\""),
                "count" => format!("size({items})"),
                "node" => {
                    let node_type = naming::node_aggregate(source_name, target_name, field_name);
                    self.side_aggregate(&items, "node", target_entity, &node_type, &selected, &mut calls)?
                }
                "edge" => {
                    let edge_type = naming::edge_aggregate(source_name, target_name, field_name);
                    let properties = properties.ok_or_else(|| unknown(&type_name, &selected))?;
                    self.side_aggregate(&items, "relationship", properties, &edge_type, &selected, &mut calls)?
                }
                _ => return Err(unknown(&type_name, &selected).into()),
            };
            entries.push(format!("{key}: {value}"));
        }
        body.extend(calls);
        let result = self.env.var();
        body.push(format!("RETURN {} AS {result}", map_literal(&entries)));
        Ok((cypher::call(&body), result))
    }

    /// The `node` or `edge` part of a relationship aggregation.
    fn side_aggregate(
        &mut self,
        items: &str,
        side: &str,
        entity: Entity<'a>,
        type_name: &str,
        field: &SelectedField,
        calls: &mut Vec<String>,
    ) -> Result<String, CompileError> {
        let mut entries = Vec::new();
        for selected in field.selection.fields() {
            let key = cypher::escape(&selected.response_key);
            let value = match selected.name.as_str() {
                TYPENAME => format!("\"{type_name}\""),
                _ => {
                    let model_field = entity
                        .field(&selected.name)
                        .ok_or_else(|| unknown(type_name, &selected))?;
                    self.field_aggregate(items, side, model_field, &selected, calls)?
                }
            };
            entries.push(format!("{key}: {value}"));
        }
        Ok(map_literal(&entries))
    }

    /// Statistics of one attribute over `items`: the subquery computing them is appended to
    /// `calls` and the map of the selected statistics is returned.
    fn field_aggregate(
        &mut self,
        items: &str,
        side: &str,
        field: &'a Field,
        selected: &SelectedField,
        calls: &mut Vec<String>,
    ) -> Result<String, CompileError> {
        let unsupported = || CompileError::UnknownField {
            type_name: field.type_name().clone(),
            field: selected.name.to_string(),
        };
        let category = field
            .scalar_category()
            .filter(|_| !field.is_list())
            .ok_or_else(unsupported)?;
        let type_name = naming::field_aggregate(category).ok_or_else(unsupported)?;
        let value = cypher::property(&format!("item.{side}"), &field.db_property);
        let mut body = vec![
            format!("WITH {items}"),
            format!("UNWIND {items} AS item"),
            format!("WITH {value} AS value"),
            "WHERE value IS NOT NULL".to_owned(),
        ];
        let statistics: &[(&str, &str)] = match category {
            ScalarCategory::Int | ScalarCategory::Float | ScalarCategory::BigInt => &[
                ("min", "min(value)"),
                ("max", "max(value)"),
                ("average", "avg(value)"),
                ("sum", "sum(value)"),
            ],
            ScalarCategory::DateTime => &[
                ("min", "toString(min(value))"),
                ("max", "toString(max(value))"),
            ],
            _ => {
                body.push("WITH value ORDER BY size(value) DESC".to_owned());
                body.push("WITH collect(value) AS list".to_owned());
                &[("longest", "head(list)"), ("shortest", "last(list)")]
            }
        };
        let mut columns = Vec::new();
        let mut returns = Vec::new();
        for (name, expression) in statistics {
            let variable = self.env.var();
            returns.push(format!("{expression} AS {variable}"));
            columns.push((*name, variable));
        }
        body.push(format!("RETURN {}", returns.join(", ")));
        calls.push(cypher::call(&body));

        let mut entries = Vec::new();
        for statistic in selected.selection.fields() {
            let key = cypher::escape(&statistic.response_key);
            let value = match statistic.name.as_str() {
                TYPENAME => format!("\"{type_name}\""),
                name => columns
                    .iter()
                    .find(|(column, _)| *column == name)
                    .map(|(_, variable)| variable.clone())
                    .ok_or_else(|| unknown(type_name, &statistic))?,
            };
            entries.push(format!("{key}: {value}"));
        }
        Ok(map_literal(&entries))
    }
}
