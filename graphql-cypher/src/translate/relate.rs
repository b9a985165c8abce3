//! Connecting and disconnecting existing nodes.
//!
//! Every operation is a subquery that imports the source node and returns the events of what
//! it wrote as one flattened list, so that it yields exactly one row whatever it matched.
use itertools::Itertools;
use serde_json::Map;
use serde_json::Value;

use super::NodeSet;
use super::Translator;
use super::cypher;
use super::events;
use super::input_object;
use super::input_objects;
use crate::auth::rules::AuthorizationOperation;
use crate::auth::rules::ValidationWhen;
use crate::error::CompileError;
use crate::error::GraphCypherError;
use crate::filter::FilterParser;
use crate::model::ConceptType;
use crate::model::Entity;
use crate::model::Relationship;
use crate::model::ScalarCategory;
use crate::model::TimestampOperation;
use crate::schema::naming::EventKind;

/// The `node` part of a `where` of connect inputs.
fn node_where<'v>(input: &'v Map<String, Value>) -> Result<Option<&'v Map<String, Value>>, CompileError> {
    let Some(filter) = input.get("where") else {
        return Ok(None);
    };
    let Some(filter) = input_object("where", filter)? else {
        return Ok(None);
    };
    match filter.get("node") {
        Some(node) => input_object("node", node),
        None => Ok(None),
    }
}

impl<'a> Translator<'a> {
    /// The concept of a node set the nested operations of a written node are resolved on.
    /// Nested operations are only available below node types.
    fn nested_concept(&self, target: &NodeSet<'a>) -> Option<&'a ConceptType> {
        match target.is_abstract {
            false => target.concepts.first().copied(),
            true => None,
        }
    }

    /// Connects `source` to every node of `target` matching the `where` of the input.
    pub(super) fn connect(
        &mut self,
        source_concept: &'a ConceptType,
        source: &str,
        relationship: &'a Relationship,
        target: &NodeSet<'a>,
        input: &Map<String, Value>,
    ) -> Result<(String, String), GraphCypherError> {
        self.authenticate(source_concept, AuthorizationOperation::CreateRelationship, [])?;
        for concept in target.concepts.iter().copied() {
            self.authenticate(concept, AuthorizationOperation::CreateRelationship, [])?;
        }
        let node = self.env.this();
        let mut predicates = Vec::new();
        predicates.extend(target.label_predicate(&node));
        if let Some(filter) = node_where(input)? {
            let filter = FilterParser::new(self.model).parse(self.set_entity(target)?, filter)?;
            self.push_predicate(&mut predicates, filter.as_ref(), &node, None)?;
        }
        predicates.extend(self.set_filter(target, &node, AuthorizationOperation::CreateRelationship)?);

        let mut body = vec![
            format!("WITH {source}"),
            format!("MATCH ({})", target.node_pattern(&node)),
        ];
        body.extend(cypher::where_clause(cypher::and(predicates)));

        // The relationship itself, unless the pair is already connected.
        let rel = self.env.this();
        let as_duplicate = input
            .get("asDuplicate")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let mut create = vec![format!("WITH {source}, {node}")];
        if !as_duplicate {
            create.push(format!(
                "WHERE NOT EXISTS {{ MATCH {} }}",
                relationship.pattern(source, "", &node, true)
            ));
        }
        create.extend(self.auth_validate(
            source_concept,
            source,
            AuthorizationOperation::CreateRelationship,
            ValidationWhen::Before,
            &[],
        )?);
        create.extend(self.set_validate(
            target,
            &node,
            AuthorizationOperation::CreateRelationship,
            ValidationWhen::Before,
        )?);
        create.push(format!("CREATE {}", relationship.pattern(source, &rel, &node, true)));
        let edge_sets = self.edge_assignments(relationship, &rel, input, TimestampOperation::Create)?;
        if !edge_sets.is_empty() {
            create.push(format!("SET {}", edge_sets.join(", ")));
        }
        create.extend(self.auth_validate(
            source_concept,
            source,
            AuthorizationOperation::CreateRelationship,
            ValidationWhen::After,
            &[],
        )?);
        let created = self.env.var();
        let event = self
            .relationship_field_event(EventKind::RelationshipCreated, relationship, source, &rel, &node)
            .unwrap_or_else(|| "null".to_owned());
        create.push(format!("RETURN collect({event}) AS {created}"));
        body.push(cypher::call(&create));

        // Nested connects of the connected node.
        let mut batch = vec![created];
        if let (Some(concept), Some(nested)) = (self.nested_concept(target), input.get("connect")) {
            for nested in input_objects("connect", nested)? {
                for relationship_input in self.relationship_inputs(concept, nested)? {
                    let key = relationship_input.relationship.field_name.as_str();
                    for item in input_objects(key, relationship_input.value)? {
                        let (call, result) = self.connect(
                            concept,
                            &node,
                            relationship_input.relationship,
                            &relationship_input.target,
                            item,
                        )?;
                        body.push(call);
                        batch.push(result);
                    }
                }
            }
        }
        let result = self.env.var();
        body.push(format!("RETURN {} AS {result}", events::flatten(&events::concat(batch))));
        Ok((cypher::call(&body), result))
    }

    /// Connects `source` to the node with the given unique values, creating it when it does
    /// not exist.
    pub(super) fn connect_or_create(
        &mut self,
        source_concept: &'a ConceptType,
        source: &str,
        relationship: &'a Relationship,
        target: &NodeSet<'a>,
        input: &Map<String, Value>,
    ) -> Result<(String, String), GraphCypherError> {
        let concept = self.nested_concept(target).ok_or_else(|| CompileError::InvalidOperation {
            message: format!("connectOrCreate is not available for \"{}\"", target.name),
        })?;
        self.authenticate(source_concept, AuthorizationOperation::CreateRelationship, [])?;
        self.authenticate(concept, AuthorizationOperation::Create, [])?;
        let unique = node_where(input)?.filter(|unique| !unique.is_empty()).ok_or_else(|| {
            CompileError::InvalidArgument {
                key: "where".to_owned(),
                message: "connectOrCreate needs the unique fields of the node".to_owned(),
            }
        })?;
        let mut keys = Vec::new();
        for (name, value) in unique {
            let field = concept
                .unique_fields()
                .find(|field| field.name.as_str() == name)
                .ok_or_else(|| CompileError::UnknownField {
                    type_name: concept.name.clone(),
                    field: name.clone(),
                })?;
            let param = self.env.param(value.clone());
            let category = field.scalar_category().unwrap_or(ScalarCategory::Other);
            keys.push((
                field,
                format!("{}: {}", cypher::escape(&field.db_property), cypher::typed_value(category, &param, false)),
            ));
        }
        let properties = keys.iter().map(|(_, key)| key.as_str()).join(", ");
        let label_string = concept.label_string();

        let on_create = match input.get("onCreate") {
            Some(value) => input_object("onCreate", value)?,
            None => None,
        };
        let empty = Map::new();
        let node_input = on_create
            .and_then(|on_create| on_create.get("node"))
            .map(|node| input_object("node", node))
            .transpose()?
            .flatten()
            .unwrap_or(&empty);
        let node = self.env.this();
        let rel = self.env.this();
        let mut node_sets = self.assignments(
            Entity::Concept(concept),
            &node,
            node_input,
            TimestampOperation::Create,
        )?;
        // The merged keys are never overwritten, not even by generated ids.
        let key_properties: Vec<String> = keys
            .iter()
            .map(|(field, _)| format!("{} =", cypher::property(&node, &field.db_property)))
            .collect();
        node_sets.retain(|set| !key_properties.iter().any(|key| set.starts_with(key.as_str())));
        let edge_input = on_create.unwrap_or(&empty);
        let edge_sets = self.edge_assignments(relationship, &rel, edge_input, TimestampOperation::Create)?;

        let mut body = vec![format!("WITH {source}")];
        let events_enabled = self.events_enabled();
        let (created, linked) = (self.env.var(), self.env.var());
        if events_enabled {
            body.push(format!(
                "WITH {source}, NOT EXISTS {{ MATCH (existing{label_string} {{ {properties} }}) }} AS {created}"
            ));
        }
        body.push(format!("MERGE ({node}{label_string} {{ {properties} }})"));
        if !node_sets.is_empty() {
            body.push(format!("ON CREATE SET {}", node_sets.join(", ")));
        }
        if events_enabled {
            body.push(format!(
                "WITH *, NOT EXISTS {{ MATCH {} }} AS {linked}",
                relationship.pattern(source, "", &node, true)
            ));
        }
        body.push(format!("MERGE {}", relationship.pattern(source, &rel, &node, true)));
        if !edge_sets.is_empty() {
            body.push(format!("ON CREATE SET {}", edge_sets.join(", ")));
        }
        body.extend(self.auth_validate(
            concept,
            &node,
            AuthorizationOperation::Create,
            ValidationWhen::After,
            &[],
        )?);
        let result = self.env.var();
        let node_event = self.created_event(&node);
        let relationship_event =
            self.relationship_field_event(EventKind::RelationshipCreated, relationship, source, &rel, &node);
        let events = match (node_event, relationship_event) {
            (Some(node_event), Some(relationship_event)) => format!(
                "[event IN [CASE WHEN {created} THEN {node_event} END, CASE WHEN {linked} THEN {relationship_event} END] WHERE event IS NOT NULL]"
            ),
            _ => events::NO_EVENTS.to_owned(),
        };
        body.push(format!("RETURN {events} AS {result}"));
        Ok((cypher::call(&body), result))
    }

    /// Disconnects `source` from the related nodes matching the connection `where` of the
    /// input, then the nested disconnects of those nodes.
    pub(super) fn disconnect(
        &mut self,
        source_concept: &'a ConceptType,
        source: &str,
        relationship: &'a Relationship,
        target: &NodeSet<'a>,
        input: &Map<String, Value>,
    ) -> Result<(String, String), GraphCypherError> {
        self.authenticate(source_concept, AuthorizationOperation::DeleteRelationship, [])?;
        for concept in target.concepts.iter().copied() {
            self.authenticate(concept, AuthorizationOperation::DeleteRelationship, [])?;
        }
        let node = self.env.this();
        let rel = self.env.this();
        let mut body = vec![format!("WITH {source}")];
        body.extend(self.related_match(
            relationship,
            source,
            &rel,
            target,
            &node,
            input,
            AuthorizationOperation::DeleteRelationship,
        )?);
        body.extend(self.auth_validate(
            source_concept,
            source,
            AuthorizationOperation::DeleteRelationship,
            ValidationWhen::Before,
            &[],
        )?);
        body.extend(self.set_validate(
            target,
            &node,
            AuthorizationOperation::DeleteRelationship,
            ValidationWhen::Before,
        )?);

        let mut batch = vec![events::single(self.relationship_field_event(
            EventKind::RelationshipDeleted,
            relationship,
            source,
            &rel,
            &node,
        ))];
        if let (Some(concept), Some(nested)) = (self.nested_concept(target), input.get("disconnect")) {
            for nested in input_objects("disconnect", nested)? {
                for relationship_input in self.relationship_inputs(concept, nested)? {
                    let key = relationship_input.relationship.field_name.as_str();
                    for item in input_objects(key, relationship_input.value)? {
                        let (call, result) = self.disconnect(
                            concept,
                            &node,
                            relationship_input.relationship,
                            &relationship_input.target,
                            item,
                        )?;
                        body.push(call);
                        batch.push(result);
                    }
                }
            }
        }
        let events = self.env.var();
        body.push(format!("WITH *, {} AS {events}", events::concat(batch)));
        body.push(format!("DELETE {rel}"));
        let result = self.env.var();
        body.push(format!("RETURN {} AS {result}", events::flatten(&events)));
        Ok((cypher::call(&body), result))
    }

    /// `MATCH` and `WHERE` of the relationships of `source` selected by the connection `where`
    /// of a nested update, disconnect or delete input.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn related_match(
        &mut self,
        relationship: &'a Relationship,
        source: &str,
        rel: &str,
        target: &NodeSet<'a>,
        node: &str,
        input: &Map<String, Value>,
        operation: AuthorizationOperation,
    ) -> Result<Vec<String>, GraphCypherError> {
        let mut clauses = vec![format!(
            "MATCH {}",
            relationship.pattern(source, rel, &target.node_pattern(node), true)
        )];
        let mut predicates = Vec::new();
        predicates.extend(target.label_predicate(node));
        if let Some(filter) = input.get("where") {
            if let Some(filter) = input_object("where", filter)? {
                let filter = FilterParser::new(self.model).parse_connection_where(relationship, filter)?;
                self.push_predicate(&mut predicates, filter.as_ref(), node, Some(rel))?;
            }
        }
        predicates.extend(self.set_filter(target, node, operation)?);
        clauses.extend(cypher::where_clause(cypher::and(predicates)));
        Ok(clauses)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn connect_where_reads_the_node_filter() {
        let input = json!({ "where": { "node": { "name": "Keanu" } } });
        let node = node_where(input.as_object().unwrap()).unwrap();
        assert_eq!(node, json!({ "name": "Keanu" }).as_object());
        assert_eq!(node_where(&Map::new()).unwrap(), None);
    }
}
