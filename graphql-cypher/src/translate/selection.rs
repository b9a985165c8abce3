//! Normalised selections.
//!
//! Operations are flattened once before compilation: fragments are inlined together with the
//! type conditions they were spread under, `@skip`/`@include` are applied and argument values
//! are resolved against the request variables into JSON.
use apollo_compiler::ExecutableDocument;
use apollo_compiler::Name;
use apollo_compiler::ast;
use apollo_compiler::executable;
use serde_json::Map;
use serde_json::Number;
use serde_json::Value;

use crate::error::CompileError;
use crate::model::ConceptType;
use crate::model::TypeModel;

/// A field selection with its arguments resolved.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SelectedField {
    pub(crate) response_key: String,
    pub(crate) name: Name,
    pub(crate) arguments: Map<String, Value>,
    pub(crate) selection: SelectionSet,
}

impl SelectedField {
    pub(crate) fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name).filter(|v| !v.is_null())
    }

    pub(crate) fn object_argument(&self, name: &str) -> Result<Option<&Map<String, Value>>, CompileError> {
        match self.argument(name) {
            None => Ok(None),
            Some(Value::Object(object)) => Ok(Some(object)),
            Some(_) => Err(CompileError::InvalidArgument {
                key: name.to_owned(),
                message: "expected an input object".to_owned(),
            }),
        }
    }
}

/// A field together with the type conditions it was selected under.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SelectionItem {
    pub(crate) conditions: Vec<Name>,
    pub(crate) field: SelectedField,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct SelectionSet {
    pub(crate) items: Vec<SelectionItem>,
}

impl SelectionSet {
    pub(crate) fn from_executable(
        document: &ExecutableDocument,
        selection_set: &executable::SelectionSet,
        variables: &Map<String, Value>,
    ) -> Result<Self, CompileError> {
        let mut items = Vec::new();
        collect(document, selection_set, variables, &[], &mut items)?;
        Ok(Self { items })
    }

    /// Fields selected on an object whose conditions all hold for `applies`, merged by
    /// response key.
    pub(crate) fn merged(&self, applies: impl Fn(&Name) -> bool) -> Vec<SelectedField> {
        let mut fields: Vec<SelectedField> = Vec::new();
        for item in &self.items {
            if !item.conditions.iter().all(&applies) {
                continue;
            }
            match fields
                .iter_mut()
                .find(|f| f.response_key == item.field.response_key)
            {
                Some(existing) => existing
                    .selection
                    .items
                    .extend(item.field.selection.items.iter().cloned()),
                None => fields.push(item.field.clone()),
            }
        }
        fields
    }

    /// Fields selected on a node of the given concrete type.
    pub(crate) fn fields_for(&self, model: &TypeModel, concept: &ConceptType) -> Vec<SelectedField> {
        self.merged(|condition| {
            *condition == concept.name
                || concept.interfaces.contains(condition)
                || concept.unions.contains(condition)
                || model
                    .interfaces
                    .get(condition)
                    .is_some_and(|i| i.implementations.contains(&concept.name))
        })
    }

    /// Fields selected on a type that is not a node, such as a connection or a mutation
    /// response.
    pub(crate) fn fields(&self) -> Vec<SelectedField> {
        self.merged(|_| true)
    }
}

fn collect(
    document: &ExecutableDocument,
    selection_set: &executable::SelectionSet,
    variables: &Map<String, Value>,
    conditions: &[Name],
    items: &mut Vec<SelectionItem>,
) -> Result<(), CompileError> {
    for selection in &selection_set.selections {
        if !included(selection.directives(), variables)? {
            continue;
        }
        match selection {
            executable::Selection::Field(field) => {
                let mut arguments = Map::new();
                for argument in &field.arguments {
                    arguments.insert(
                        argument.name.to_string(),
                        value_to_json(&argument.value, variables)?,
                    );
                }
                let mut nested = Vec::new();
                collect(document, &field.selection_set, variables, &[], &mut nested)?;
                items.push(SelectionItem {
                    conditions: conditions.to_vec(),
                    field: SelectedField {
                        response_key: field.response_key().to_string(),
                        name: field.name.clone(),
                        arguments,
                        selection: SelectionSet { items: nested },
                    },
                });
            }
            executable::Selection::FragmentSpread(spread) => {
                let fragment = document.fragments.get(&spread.fragment_name).ok_or_else(|| {
                    CompileError::InvalidOperation {
                        message: format!("unknown fragment \"{}\"", spread.fragment_name),
                    }
                })?;
                let mut conditions = conditions.to_vec();
                conditions.push(fragment.type_condition().clone());
                collect(document, &fragment.selection_set, variables, &conditions, items)?;
            }
            executable::Selection::InlineFragment(inline) => {
                let mut conditions = conditions.to_vec();
                conditions.extend(inline.type_condition.clone());
                collect(document, &inline.selection_set, variables, &conditions, items)?;
            }
        }
    }
    Ok(())
}

fn included(directives: &ast::DirectiveList, variables: &Map<String, Value>) -> Result<bool, CompileError> {
    for (name, expected) in [("skip", false), ("include", true)] {
        let Some(directive) = directives.get(name) else {
            continue;
        };
        let condition = directive
            .specified_argument_by_name("if")
            .map(|value| value_to_json(value, variables))
            .transpose()?;
        if condition.as_ref().and_then(Value::as_bool) != Some(expected) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Converts an argument value to JSON, substituting variables.
pub(crate) fn value_to_json(value: &ast::Value, variables: &Map<String, Value>) -> Result<Value, CompileError> {
    Ok(match value {
        ast::Value::Null => Value::Null,
        ast::Value::Enum(name) => Value::String(name.to_string()),
        ast::Value::Variable(name) => variables.get(name.as_str()).cloned().unwrap_or(Value::Null),
        ast::Value::String(s) => Value::String(s.clone()),
        ast::Value::Float(f) => f
            .try_to_f64()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| CompileError::InvalidArgument {
                key: f.as_str().to_owned(),
                message: "not a finite Float".to_owned(),
            })?,
        ast::Value::Int(i) => i
            .as_str()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| CompileError::InvalidArgument {
                key: i.as_str().to_owned(),
                message: "Int out of range".to_owned(),
            })?,
        ast::Value::Boolean(b) => Value::Bool(*b),
        ast::Value::List(items) => Value::Array(
            items
                .iter()
                .map(|item| value_to_json(item, variables))
                .collect::<Result<_, _>>()?,
        ),
        ast::Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, value)| Ok((name.to_string(), value_to_json(value, variables)?)))
                .collect::<Result<_, CompileError>>()?,
        ),
    })
}

#[cfg(test)]
mod tests {
    use apollo_compiler::Schema;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    const SCHEMA: &str = r#"
        interface Production { title: String }
        type Movie implements Production { title: String runtime: Int }
        type Series implements Production { title: String episodes: Int }
        type Query { productions(limit: Int): [Production!]! }
    "#;

    fn selection(query: &str, variables: serde_json::Value) -> SelectionSet {
        let schema = Schema::parse_and_validate(SCHEMA, "schema.graphql").unwrap();
        let document = ExecutableDocument::parse_and_validate(&schema, query, "query.graphql").unwrap();
        let operation = document.operations.get(None).unwrap();
        SelectionSet::from_executable(
            &document,
            &operation.selection_set,
            variables.as_object().unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn fragments_are_flattened_with_their_conditions() {
        let set = selection(
            r#"
            query($limit: Int, $skip: Boolean!) {
                productions(limit: $limit) {
                    title
                    ... on Movie { runtime }
                    ...SeriesFields
                    skipped: title @skip(if: $skip)
                }
            }
            fragment SeriesFields on Series { episodes }
            "#,
            json!({ "limit": 3, "skip": true }),
        );
        let root = &set.fields()[0];
        assert_eq!(root.arguments, json!({ "limit": 3 }).as_object().unwrap().clone());
        let keys: Vec<(&str, Vec<&str>)> = root
            .selection
            .items
            .iter()
            .map(|item| {
                (
                    item.field.response_key.as_str(),
                    item.conditions.iter().map(Name::as_str).collect(),
                )
            })
            .collect();
        assert_eq!(
            keys,
            vec![
                ("title", vec![]),
                ("runtime", vec!["Movie"]),
                ("episodes", vec!["Series"]),
            ]
        );
    }

    #[test]
    fn duplicate_response_keys_are_merged() {
        let set = selection(
            "{ productions { title } productions { ... on Movie { runtime } } }",
            json!({}),
        );
        let fields = set.fields();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].selection.items.len(), 2);
    }
}
