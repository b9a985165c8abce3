//! Names of the directives understood by the type model builder, and helpers to read their
//! arguments.
use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast::Directive;
use apollo_compiler::ast::Value;
use apollo_compiler::name;
use serde_json::Map;
use serde_json::Number;

use crate::error::SingleValidationError;

pub(crate) const RELATIONSHIP: Name = name!("relationship");
pub(crate) const DECLARE_RELATIONSHIP: Name = name!("declareRelationship");
pub(crate) const RELATIONSHIP_PROPERTIES: Name = name!("relationshipProperties");
pub(crate) const CYPHER: Name = name!("cypher");
pub(crate) const AUTHORIZATION: Name = name!("authorization");
pub(crate) const AUTHENTICATION: Name = name!("authentication");
pub(crate) const SUBSCRIPTIONS_AUTHORIZATION: Name = name!("subscriptionsAuthorization");
pub(crate) const JWT: Name = name!("jwt");
pub(crate) const JWT_CLAIM: Name = name!("jwtClaim");
pub(crate) const NODE: Name = name!("node");
pub(crate) const ALIAS: Name = name!("alias");
pub(crate) const ID: Name = name!("id");
pub(crate) const UNIQUE: Name = name!("unique");
pub(crate) const DEFAULT: Name = name!("default");
pub(crate) const TIMESTAMP: Name = name!("timestamp");
pub(crate) const PLURAL: Name = name!("plural");

pub(crate) const KEY: Name = name!("key");

/// Directives consumed by the type model builder. They never appear in the generated schema.
pub(crate) const LIBRARY_DIRECTIVES: [Name; 16] = [
    RELATIONSHIP,
    DECLARE_RELATIONSHIP,
    RELATIONSHIP_PROPERTIES,
    CYPHER,
    AUTHORIZATION,
    AUTHENTICATION,
    SUBSCRIPTIONS_AUTHORIZATION,
    JWT,
    JWT_CLAIM,
    NODE,
    ALIAS,
    ID,
    UNIQUE,
    DEFAULT,
    TIMESTAMP,
    PLURAL,
];

/// Federation directives, carried over to the subgraph variant of the schema only.
pub(crate) const FEDERATION_DIRECTIVES: [Name; 9] = [
    KEY,
    name!("shareable"),
    name!("external"),
    name!("requires"),
    name!("provides"),
    name!("override"),
    name!("inaccessible"),
    name!("tag"),
    name!("link"),
];

pub(crate) fn is_library_directive(name: &str) -> bool {
    LIBRARY_DIRECTIVES.iter().any(|d| d == name)
}

pub(crate) fn is_federation_directive(name: &str) -> bool {
    FEDERATION_DIRECTIVES.iter().any(|d| d == name)
}

/// Reads the arguments of one directive application, reporting shape mismatches against the
/// location the directive is applied to.
pub(crate) struct DirectiveArguments<'a> {
    directive: &'a Directive,
    location: String,
}

impl<'a> DirectiveArguments<'a> {
    pub(crate) fn new(directive: &'a Directive, location: impl Into<String>) -> Self {
        Self {
            directive,
            location: location.into(),
        }
    }

    pub(crate) fn error(&self, argument: &str, message: impl Into<String>) -> SingleValidationError {
        SingleValidationError::InvalidDirectiveArgument {
            directive: self.directive.name.clone(),
            argument: argument.to_owned(),
            location: self.location.clone(),
            message: message.into(),
        }
    }

    pub(crate) fn value(&self, argument: &str) -> Option<&'a Node<Value>> {
        self.directive
            .specified_argument_by_name(argument)
            .filter(|v| !v.is_null())
    }

    pub(crate) fn required_string(&self, argument: &str) -> Result<String, SingleValidationError> {
        self.optional_string(argument)?
            .ok_or_else(|| self.error(argument, "a String value is required"))
    }

    pub(crate) fn optional_string(
        &self,
        argument: &str,
    ) -> Result<Option<String>, SingleValidationError> {
        match self.value(argument) {
            None => Ok(None),
            Some(value) => value
                .as_str()
                .map(|s| Some(s.to_owned()))
                .ok_or_else(|| self.error(argument, "expected a String")),
        }
    }

    pub(crate) fn optional_bool(&self, argument: &str) -> Result<Option<bool>, SingleValidationError> {
        match self.value(argument) {
            None => Ok(None),
            Some(value) => value
                .to_bool()
                .map(Some)
                .ok_or_else(|| self.error(argument, "expected a Boolean")),
        }
    }

    pub(crate) fn optional_enum(&self, argument: &str) -> Result<Option<Name>, SingleValidationError> {
        match self.value(argument) {
            None => Ok(None),
            Some(value) => value
                .as_enum()
                .cloned()
                .map(Some)
                .ok_or_else(|| self.error(argument, "expected an enum value")),
        }
    }

    /// A list of enum values; a single value is coerced to a list of one.
    pub(crate) fn enum_list(&self, argument: &str) -> Result<Option<Vec<Name>>, SingleValidationError> {
        let Some(value) = self.value(argument) else {
            return Ok(None);
        };
        let items: Vec<&Node<Value>> = match value.as_list() {
            Some(items) => items.iter().collect(),
            None => vec![value],
        };
        items
            .into_iter()
            .map(|item| {
                item.as_enum()
                    .cloned()
                    .ok_or_else(|| self.error(argument, "expected a list of enum values"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// A list of strings; a single value is coerced to a list of one.
    pub(crate) fn string_list(&self, argument: &str) -> Result<Option<Vec<String>>, SingleValidationError> {
        let Some(value) = self.value(argument) else {
            return Ok(None);
        };
        let items: Vec<&Node<Value>> = match value.as_list() {
            Some(items) => items.iter().collect(),
            None => vec![value],
        };
        items
            .into_iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| self.error(argument, "expected a list of strings"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// Any argument converted to JSON. Variables are rejected: directive arguments are constant.
    pub(crate) fn json(&self, argument: &str) -> Result<Option<serde_json::Value>, SingleValidationError> {
        match self.value(argument) {
            None => Ok(None),
            Some(value) => constant_to_json(value)
                .map(Some)
                .ok_or_else(|| self.error(argument, "variables are not allowed in directive arguments")),
        }
    }
}

/// Converts a constant GraphQL value to JSON. Returns `None` when the value contains a variable.
pub(crate) fn constant_to_json(value: &Value) -> Option<serde_json::Value> {
    Some(match value {
        Value::Null => serde_json::Value::Null,
        Value::Enum(name) => serde_json::Value::String(name.to_string()),
        Value::Variable(_) => return None,
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Float(f) => f
            .try_to_f64()
            .ok()
            .and_then(Number::from_f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Int(i) => match i.try_to_i32() {
            Ok(i) => serde_json::Value::from(i),
            // Outside of the i32 range: keep the full precision where possible.
            Err(_) => i
                .as_str()
                .parse::<i64>()
                .map(serde_json::Value::from)
                .unwrap_or_else(|_| serde_json::Value::String(i.as_str().to_owned())),
        },
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::List(items) => serde_json::Value::Array(
            items
                .iter()
                .map(|item| constant_to_json(item))
                .collect::<Option<Vec<_>>>()?,
        ),
        Value::Object(fields) => serde_json::Value::Object(
            fields
                .iter()
                .map(|(name, value)| Some((name.to_string(), constant_to_json(value)?)))
                .collect::<Option<Map<_, _>>>()?,
        ),
    })
}

#[cfg(test)]
mod tests {
    use apollo_compiler::Schema;
    use serde_json::json;

    use super::*;

    fn directive(sdl: &str) -> Node<Directive> {
        let schema = Schema::builder()
            .adopt_orphan_extensions()
            .parse(sdl, "test.graphql")
            .build()
            .unwrap_or_else(|e| e.partial);
        let movie = schema.get_object("Movie").unwrap();
        movie.directives.iter().next().unwrap().node.clone()
    }

    #[test]
    fn reads_typed_arguments() {
        let directive = directive(
            r#"type Movie @test(s: "x", b: true, e: IN, l: [A, B], one: A, o: { a: [1, 2.5, null] }) { id: ID }"#,
        );
        let args = DirectiveArguments::new(&directive, "Movie");
        assert_eq!(args.required_string("s").unwrap(), "x");
        assert_eq!(args.optional_bool("b").unwrap(), Some(true));
        assert_eq!(args.optional_enum("e").unwrap(), Some(name!("IN")));
        assert_eq!(
            args.enum_list("l").unwrap(),
            Some(vec![name!("A"), name!("B")])
        );
        assert_eq!(args.enum_list("one").unwrap(), Some(vec![name!("A")]));
        assert_eq!(args.json("o").unwrap(), Some(json!({ "a": [1, 2.5, null] })));
        assert_eq!(args.optional_string("missing").unwrap(), None);
    }

    #[test]
    fn reports_shape_mismatches() {
        let directive = directive(r#"type Movie @test(s: 1) { id: ID }"#);
        let args = DirectiveArguments::new(&directive, "Movie");
        let error = args.required_string("s").unwrap_err();
        assert_eq!(
            error.to_string(),
            "Invalid argument \"s\" of directive @test on Movie: expected a String"
        );
    }
}
