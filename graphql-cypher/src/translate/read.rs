//! Plural reads and federation entity reads.
use apollo_compiler::Name;
use serde_json::Map;
use serde_json::Value;

use super::NodeSet;
use super::Translator;
use super::cypher;
use super::selection::SelectedField;
use super::selection::SelectionSet;
use super::shape::RootShape;
use crate::auth::rules::AuthorizationOperation;
use crate::error::CompileError;
use crate::error::GraphCypherError;

/// The variable of the nodes matched by a root field.
pub(super) const ROOT: &str = "this";

impl<'a> Translator<'a> {
    /// `MATCH` and `WHERE` of the nodes a root field operates on, including the filter rules of
    /// `operation`.
    pub(super) fn match_nodes(
        &mut self,
        set: &NodeSet<'a>,
        variable: &str,
        field: &SelectedField,
        operation: AuthorizationOperation,
    ) -> Result<Vec<String>, GraphCypherError> {
        let mut clauses = vec![format!("MATCH ({})", set.node_pattern(variable))];
        let mut predicates = Vec::new();
        predicates.extend(set.label_predicate(variable));
        let filter = self.where_filter(set, field)?;
        self.push_predicate(&mut predicates, filter.as_ref(), variable, None)?;
        predicates.extend(self.set_filter(set, variable, operation)?);
        clauses.extend(cypher::where_clause(cypher::and(predicates)));
        Ok(clauses)
    }

    pub(super) fn read_root(
        &mut self,
        name: &Name,
        field: &SelectedField,
    ) -> Result<(Vec<String>, RootShape), GraphCypherError> {
        let set = self.node_set(name)?;
        let mut statement = self.match_nodes(&set, ROOT, field, AuthorizationOperation::Read)?;
        statement.extend(self.paging(&set, ROOT, field)?);
        let mut projection = self.project(&set, ROOT, &field.selection)?;
        statement.extend(projection.clauses());
        statement.push(format!("RETURN {} AS {ROOT}", projection.expression));
        Ok((
            statement,
            RootShape::Rows {
                shape: projection.shape,
                list: true,
            },
        ))
    }

    /// Reads the entity a federation representation points to, matched on the first declared
    /// key whose fields the representation carries.
    pub(super) fn entity_read(
        &mut self,
        representation: &Map<String, Value>,
        selection: &SelectionSet,
    ) -> Result<(Vec<String>, RootShape), GraphCypherError> {
        let invalid = |message: &str| CompileError::InvalidArgument {
            key: "representations".to_owned(),
            message: message.to_owned(),
        };
        let type_name = representation
            .get("__typename")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("missing __typename"))?;
        let concept = self.concept(type_name)?;
        let present = |name: &Name| representation.get(name.as_str()).is_some_and(|v| !v.is_null());
        let key = concept
            .keys
            .iter()
            .find(|key| key.field_names.iter().all(present))
            .ok_or_else(|| invalid("no @key of the type is fully present"))?;

        let mut predicates = Vec::new();
        for name in &key.field_names {
            let field = concept.fields.get(name).ok_or_else(|| CompileError::UnknownField {
                type_name: concept.name.clone(),
                field: name.to_string(),
            })?;
            let category = field.scalar_category().ok_or_else(|| invalid("key fields must be attributes"))?;
            let value = representation.get(name.as_str()).cloned().unwrap_or_default();
            let param = self.env.param(value);
            predicates.push(format!(
                "{} = {}",
                cypher::property(ROOT, &field.db_property),
                cypher::typed_value(category, &param, false)
            ));
        }
        predicates.extend(self.auth_filter(concept, ROOT, AuthorizationOperation::Read)?);
        let set = NodeSet::concept(concept);
        let mut statement = vec![format!("MATCH ({})", set.node_pattern(ROOT))];
        statement.extend(cypher::where_clause(cypher::and(predicates)));
        let mut projection = self.project(&set, ROOT, selection)?;
        statement.extend(projection.clauses());
        statement.push(format!("RETURN {} AS {ROOT}", projection.expression));
        Ok((
            statement,
            RootShape::Rows {
                shape: projection.shape,
                list: false,
            },
        ))
    }
}
