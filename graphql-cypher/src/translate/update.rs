//! Update mutations.
//!
//! The matched nodes are updated in place. Each relationship field of the `update` input
//! carries its own nested operations, applied in a fixed order: `update`, `connect`,
//! `disconnect`, `create`, `connectOrCreate`, `delete`.
use apollo_compiler::Name;
use serde_json::Map;
use serde_json::Value;

use super::NodeSet;
use super::Translator;
use super::create::RelationshipInput;
use super::create::update_operator;
use super::cypher;
use super::events;
use super::input_object;
use super::input_objects;
use super::read::ROOT;
use super::selection::SelectedField;
use super::shape::RootShape;
use crate::auth::rules::AuthorizationOperation;
use crate::auth::rules::ValidationWhen;
use crate::error::CompileError;
use crate::error::GraphCypherError;
use crate::model::ConceptType;
use crate::model::Entity;
use crate::model::Relationship;
use crate::model::TimestampOperation;
use crate::schema::naming;

/// Nested operations of a relationship field in an update input, in the order they run.
const NESTED_OPERATIONS: [&str; 6] = [
    "update",
    "connect",
    "disconnect",
    "create",
    "connectOrCreate",
    "delete",
];

impl<'a> Translator<'a> {
    pub(super) fn update_root(
        &mut self,
        name: &Name,
        field: &SelectedField,
    ) -> Result<(Vec<String>, RootShape), GraphCypherError> {
        let concept = self.concept(name)?;
        let empty = Map::new();
        let update = field.object_argument("update")?.unwrap_or(&empty);
        let set = NodeSet::concept(concept);
        let mut statement = self.match_nodes(&set, ROOT, field, AuthorizationOperation::Update)?;
        let (clauses, events) = self.update_node(concept, ROOT, update)?;
        statement.extend(clauses);
        statement.push(format!("WITH *, {events} AS meta"));
        let response_type = naming::update_response(&concept.plural);
        let (clauses, expression, fields) =
            self.mutation_response(concept, field, &response_type, naming::UPDATE_INFO)?;
        statement.extend(clauses);
        statement.push(format!("RETURN {expression} AS {ROOT}, meta"));
        Ok((statement, RootShape::Mutation(fields)))
    }

    /// Updates the node bound to `node` and applies the nested operations of its relationship
    /// fields. Returns the clauses and the expression of the events.
    fn update_node(
        &mut self,
        concept: &'a ConceptType,
        node: &str,
        input: &Map<String, Value>,
    ) -> Result<(Vec<String>, String), GraphCypherError> {
        let written = self.input_fields(concept, input, |key| update_operator(key).is_some())?;
        self.authenticate(concept, AuthorizationOperation::Update, written.iter().map(|f| &f.name))?;
        let mut clauses = Vec::new();
        clauses.extend(self.auth_validate(
            concept,
            node,
            AuthorizationOperation::Update,
            ValidationWhen::Before,
            &written,
        )?);
        let mut events = Vec::new();
        let sets = self.assignments(Entity::Concept(concept), node, input, TimestampOperation::Update)?;
        if !sets.is_empty() {
            if self.events_enabled() {
                let snapshot = self.env.var();
                clauses.push(format!("WITH *, properties({node}) AS {snapshot}"));
                events.push(events::single(self.updated_event(node, &snapshot)));
            }
            clauses.push(format!("SET {}", sets.join(", ")));
        }
        let relationships = self.relationship_inputs(concept, input)?;
        if !relationships.is_empty() {
            clauses.push("WITH *".to_owned());
        }
        for relationship in &relationships {
            let key = relationship.relationship.field_name.as_str();
            for item in input_objects(key, relationship.value)? {
                let (calls, nested) = self.update_field_input(concept, node, relationship, item)?;
                clauses.extend(calls);
                events.extend(nested);
            }
        }
        clauses.extend(self.auth_validate(
            concept,
            node,
            AuthorizationOperation::Update,
            ValidationWhen::After,
            &written,
        )?);
        Ok((clauses, events::concat(events)))
    }

    /// The nested operations of one `<Type><Field>UpdateFieldInput`.
    fn update_field_input(
        &mut self,
        concept: &'a ConceptType,
        node: &str,
        input: &RelationshipInput<'a, '_>,
        item: &Map<String, Value>,
    ) -> Result<(Vec<String>, Vec<String>), GraphCypherError> {
        let relationship = input.relationship;
        let target = &input.target;
        if let Some(key) = item
            .keys()
            .find(|key| *key != "where" && !NESTED_OPERATIONS.contains(&key.as_str()))
        {
            return Err(CompileError::UnknownField {
                type_name: Name::new_unchecked(&naming::relationship_input(
                    &concept.name,
                    &relationship.field_name,
                    "UpdateFieldInput",
                )),
                field: key.clone(),
            }
            .into());
        }
        let mut calls = Vec::new();
        let mut events = Vec::new();
        for operation in NESTED_OPERATIONS {
            let Some(value) = item.get(operation) else {
                continue;
            };
            if operation == "update" {
                if let Some(update) = input_object(operation, value)? {
                    let (call, result) = self.update_related(concept, node, relationship, target, item, update)?;
                    calls.push(call);
                    events.push(result);
                }
                continue;
            }
            for nested in input_objects(operation, value)? {
                let (call, result) = match operation {
                    "connect" => self.connect(concept, node, relationship, target, nested)?,
                    "disconnect" => self.disconnect(concept, node, relationship, target, nested)?,
                    "create" => self.create_related(concept, node, relationship, target, nested)?,
                    "connectOrCreate" => self.connect_or_create(concept, node, relationship, target, nested)?,
                    _ => self.delete_related(concept, node, relationship, target, nested)?,
                };
                calls.push(call);
                events.push(result);
            }
        }
        Ok((calls, events))
    }

    /// Updates the related nodes and relationships selected by the `where` of `item`.
    fn update_related(
        &mut self,
        source_concept: &'a ConceptType,
        source: &str,
        relationship: &'a Relationship,
        target: &NodeSet<'a>,
        item: &Map<String, Value>,
        update: &Map<String, Value>,
    ) -> Result<(String, String), GraphCypherError> {
        let node = self.env.this();
        let rel = self.env.this();
        let mut body = vec![format!("WITH {source}")];
        body.extend(self.related_match(
            relationship,
            source,
            &rel,
            target,
            &node,
            item,
            AuthorizationOperation::Update,
        )?);
        let mut batch = Vec::new();
        let node_input = match update.get("node") {
            Some(value) => input_object("node", value)?,
            None => None,
        };
        if let Some(node_input) = node_input {
            let (clauses, events) = match (target.is_abstract, target.concepts.first().copied()) {
                (false, Some(concept)) => self.update_node(concept, &node, node_input)?,
                _ => self.update_abstract(target, &node, node_input)?,
            };
            body.extend(clauses);
            batch.push(events);
        }
        let edge_sets = self.edge_assignments(relationship, &rel, update, TimestampOperation::Update)?;
        if !edge_sets.is_empty() {
            self.authenticate(source_concept, AuthorizationOperation::Update, [&relationship.field_name])?;
            body.push(format!("SET {}", edge_sets.join(", ")));
        }
        let events = self.env.var();
        body.push(format!("WITH *, {} AS {events}", events::concat(batch)));
        let result = self.env.var();
        body.push(format!("RETURN {} AS {result}", events::flatten(&events)));
        Ok((cypher::call(&body), result))
    }

    /// Updates the fields shared by the node types of an interface.
    fn update_abstract(
        &mut self,
        target: &NodeSet<'a>,
        node: &str,
        input: &Map<String, Value>,
    ) -> Result<(Vec<String>, String), GraphCypherError> {
        let entity = self.set_entity(target)?;
        if let Some(key) = input
            .keys()
            .find(|key| {
                entity.field(key).is_none()
                    && update_operator(key).is_none()
                    && *key != naming::EMPTY_INPUT
            })
        {
            return Err(CompileError::UnknownField {
                type_name: entity.name().clone(),
                field: key.clone(),
            }
            .into());
        }
        for concept in target.concepts.iter().copied() {
            let fields = input.keys().filter_map(|key| concept.fields.get_key_value(key.as_str()));
            self.authenticate(concept, AuthorizationOperation::Update, fields.map(|(name, _)| name))?;
        }
        let mut clauses = Vec::new();
        clauses.extend(self.set_validate(target, node, AuthorizationOperation::Update, ValidationWhen::Before)?);
        let mut events = events::NO_EVENTS.to_owned();
        let sets = self.assignments(entity, node, input, TimestampOperation::Update)?;
        if !sets.is_empty() {
            if self.events_enabled() {
                let snapshot = self.env.var();
                clauses.push(format!("WITH *, properties({node}) AS {snapshot}"));
                events = events::single(self.updated_event(node, &snapshot));
            }
            clauses.push(format!("SET {}", sets.join(", ")));
        }
        clauses.extend(self.set_validate(target, node, AuthorizationOperation::Update, ValidationWhen::After)?);
        Ok((clauses, events))
    }
}
