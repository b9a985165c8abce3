//! Delete mutations.
//!
//! A node is deleted after the nested deletes of its own relationships, and together with
//! every relationship it still has. Events come out deepest first: the nested deletes, then
//! the relationships of the node, then the node itself.
use apollo_compiler::Name;
use serde_json::Map;
use serde_json::Value;

use super::NodeSet;
use super::Translator;
use super::create::info_fields;
use super::cypher;
use super::events;
use super::input_object;
use super::input_objects;
use super::read::ROOT;
use super::selection::SelectedField;
use super::shape::RootShape;
use crate::auth::rules::AuthorizationOperation;
use crate::auth::rules::ValidationWhen;
use crate::error::GraphCypherError;
use crate::model::ConceptType;
use crate::model::Relationship;
use crate::schema::naming;

impl<'a> Translator<'a> {
    pub(super) fn delete_root(
        &mut self,
        name: &Name,
        field: &SelectedField,
    ) -> Result<(Vec<String>, RootShape), GraphCypherError> {
        let concept = self.concept(name)?;
        self.authenticate(concept, AuthorizationOperation::Delete, [])?;
        let set = NodeSet::concept(concept);
        let mut statement = self.match_nodes(&set, ROOT, field, AuthorizationOperation::Delete)?;
        let nested = field.object_argument("delete")?;
        let (clauses, events) = self.delete_node(concept, ROOT, nested)?;
        statement.extend(clauses);
        let batch = self.env.var();
        statement.push(format!("WITH *, {events} AS {batch}"));
        statement.push(format!("DETACH DELETE {ROOT}"));
        statement.push(format!("RETURN {} AS meta", events::flatten(&batch)));
        let fields = info_fields(field, naming::DELETE_INFO)?;
        Ok((statement, RootShape::Delete(fields)))
    }

    /// The validation and nested deletes preceding the deletion of the node bound to `node`.
    /// Returns the clauses and the events of the whole deletion.
    fn delete_node(
        &mut self,
        concept: &'a ConceptType,
        node: &str,
        nested: Option<&Map<String, Value>>,
    ) -> Result<(Vec<String>, String), GraphCypherError> {
        let mut clauses = Vec::new();
        clauses.extend(self.auth_validate(
            concept,
            node,
            AuthorizationOperation::Delete,
            ValidationWhen::Before,
            &[],
        )?);
        let mut batch = Vec::new();
        if let Some(nested) = nested {
            for relationship_input in self.relationship_inputs(concept, nested)? {
                let key = relationship_input.relationship.field_name.as_str();
                for item in input_objects(key, relationship_input.value)? {
                    let (call, result) = self.delete_related(
                        concept,
                        node,
                        relationship_input.relationship,
                        &relationship_input.target,
                        item,
                    )?;
                    clauses.push(call);
                    batch.push(result);
                }
            }
        }
        batch.push(self.detached_events(node));
        batch.push(events::single(self.deleted_event(node)));
        Ok((clauses, events::concat(batch)))
    }

    /// Deletes the nodes related to `source` selected by the `where` of the input.
    pub(super) fn delete_related(
        &mut self,
        source_concept: &'a ConceptType,
        source: &str,
        relationship: &'a Relationship,
        target: &NodeSet<'a>,
        input: &Map<String, Value>,
    ) -> Result<(String, String), GraphCypherError> {
        self.authenticate(source_concept, AuthorizationOperation::DeleteRelationship, [])?;
        for concept in target.concepts.iter().copied() {
            self.authenticate(concept, AuthorizationOperation::Delete, [])?;
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
            AuthorizationOperation::Delete,
        )?);
        body.push(format!("WITH DISTINCT {node}"));
        let nested = match input.get("delete") {
            Some(value) => input_object("delete", value)?,
            None => None,
        };
        let (clauses, events) = match (target.is_abstract, target.concepts.first().copied()) {
            (false, Some(concept)) => self.delete_node(concept, &node, nested)?,
            _ => {
                let mut clauses = Vec::new();
                clauses.extend(self.set_validate(
                    target,
                    &node,
                    AuthorizationOperation::Delete,
                    ValidationWhen::Before,
                )?);
                let events = events::concat(vec![
                    self.detached_events(&node),
                    events::single(self.deleted_event(&node)),
                ]);
                (clauses, events)
            }
        };
        body.extend(clauses);
        let batch = self.env.var();
        body.push(format!("WITH *, {events} AS {batch}"));
        body.push(format!("DETACH DELETE {node}"));
        let result = self.env.var();
        body.push(format!("RETURN {} AS {result}", events::flatten(&batch)));
        Ok((cypher::call(&body), result))
    }
}
