//! Fields backed by `@cypher` statements.
//!
//! The statement is embedded verbatim in a subquery. It sees the node it is resolved on as
//! `this` and its field arguments as parameters of the same name.
use apollo_compiler::Name;
use apollo_compiler::name;
use serde_json::Map;
use serde_json::Value;

use super::NodeSet;
use super::Translator;
use super::cypher;
use super::selection::SelectedField;
use super::selection::value_to_json;
use super::shape::RootShape;
use super::shape::Shape;
use crate::error::CompileError;
use crate::error::GraphCypherError;
use crate::model::CypherAnnotation;
use crate::model::Field;

impl<'a> Translator<'a> {
    /// Binds the arguments of a `@cypher` field, defaults included.
    fn cypher_arguments(&mut self, field: &'a Field, selected: &SelectedField) -> Result<(), CompileError> {
        for definition in &field.arguments {
            let value = match selected.arguments.get(definition.name.as_str()) {
                Some(value) => value.clone(),
                None => definition
                    .default_value
                    .as_ref()
                    .map(|default| value_to_json(default, &Map::new()))
                    .transpose()?
                    .unwrap_or(Value::Null),
            };
            self.env.named_param(&definition.name, value)?;
        }
        Ok(())
    }

    fn embed(&mut self, annotation: &CypherAnnotation) -> String {
        if annotation.statement.contains("$jwt") {
            self.env.uses_auth = true;
        }
        annotation.statement.trim().to_owned()
    }

    /// The node set the statement returns, `None` for scalar results.
    fn result_set(&self, field: &'a Field) -> Result<Option<NodeSet<'a>>, CompileError> {
        let type_name = field.type_name();
        if self.model.entity(type_name).is_none() || self.model.relationship_properties.contains_key(type_name) {
            return Ok(None);
        }
        self.node_set(type_name).map(Some)
    }

    /// The clauses and the expression projecting a `@cypher` result bound to `column`.
    fn project_result(
        &mut self,
        field: &'a Field,
        column: &str,
        selected: &SelectedField,
    ) -> Result<(Vec<String>, String, Shape), GraphCypherError> {
        let Some(set) = self.result_set(field)? else {
            return Ok((Vec::new(), column.to_owned(), Shape::Value));
        };
        let mut clauses = Vec::new();
        let mut predicates = Vec::new();
        predicates.extend(set.label_predicate(column));
        predicates.extend(self.read_filter(&set, column)?);
        if let Some(predicate) = cypher::and(predicates) {
            clauses.push(format!("WITH {column}"));
            clauses.push(format!("WHERE {predicate}"));
        }
        let mut projection = self.project(&set, column, &selected.selection)?;
        clauses.extend(projection.clauses());
        Ok((clauses, projection.expression, projection.shape))
    }

    /// A subquery computing a `@cypher` field of the node bound to `variable`.
    pub(super) fn cypher_field_subquery(
        &mut self,
        variable: &str,
        field: &'a Field,
        annotation: &CypherAnnotation,
        selected: &SelectedField,
    ) -> Result<(String, String, Shape), GraphCypherError> {
        self.cypher_arguments(field, selected)?;
        let statement = self.embed(annotation);
        let column = self.env.this();
        let mut body = vec![
            format!("WITH {variable}"),
            cypher::call(&[
                format!("WITH {variable}"),
                format!("WITH {variable} AS this"),
                statement,
            ]),
            format!("WITH {} AS {column}", cypher::escape(&annotation.column_name)),
        ];
        let (clauses, expression, shape) = self.project_result(field, &column, selected)?;
        body.extend(clauses);
        let projected = self.env.var();
        body.push(format!("WITH {expression} AS {projected}"));
        let result = self.env.var();
        body.push(if field.is_list() {
            format!("RETURN collect({projected}) AS {result}")
        } else {
            format!("RETURN head(collect({projected})) AS {result}")
        });
        Ok((cypher::call(&body), result, shape))
    }

    /// A user declared `Query` or `Mutation` field backed by `@cypher`.
    pub(super) fn cypher_root(
        &mut self,
        name: &Name,
        mutation: bool,
        selected: &SelectedField,
    ) -> Result<(Vec<String>, RootShape), GraphCypherError> {
        let model = self.model;
        let (root_type, fields) = if mutation {
            (name!("Mutation"), &model.custom_mutations)
        } else {
            (name!("Query"), &model.custom_queries)
        };
        let unknown = || CompileError::UnknownRootField {
            type_name: root_type.clone(),
            field: name.to_string(),
        };
        let custom = fields.get(name).ok_or_else(unknown)?;
        let annotation = custom.field.cypher().ok_or_else(unknown)?;
        self.cypher_arguments(&custom.field, selected)?;
        let column = self.env.this();
        let mut statement = vec![
            cypher::call(&[self.embed(annotation)]),
            format!("WITH {} AS {column}", cypher::escape(&annotation.column_name)),
        ];
        let (clauses, expression, shape) = self.project_result(&custom.field, &column, selected)?;
        statement.extend(clauses);
        statement.push(format!("RETURN {expression} AS this"));
        Ok((
            statement,
            RootShape::Rows {
                shape,
                list: custom.field.is_list(),
            },
        ))
    }
}
