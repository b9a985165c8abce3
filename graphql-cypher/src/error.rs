//! Error types.
//!
//! Schema construction reports every problem it finds at once through [`ValidationErrors`];
//! per-operation failures are [`CompileError`]s; authorization failures and database failures
//! have their own variants of [`GraphCypherError`] so that the executor can turn each of them
//! into the right GraphQL error.
use std::fmt;

use apollo_compiler::Name;
use apollo_compiler::validation::DiagnosticList;
use apollo_compiler::validation::WithErrors;

/// Message of the GraphQL error raised when a validate rule is not satisfied.
pub const FORBIDDEN_MESSAGE: &str = "Forbidden";
/// Message of the GraphQL error raised when authentication is required and missing.
pub const UNAUTHENTICATED_MESSAGE: &str = "Unauthenticated";

/// Marker carried by the database error raised from a failed validate predicate.
pub(crate) const FORBIDDEN_MARKER: &str = "@graphql-cypher/FORBIDDEN";

/// A single problem found while building the type model or the augmented schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, strum_macros::IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SingleValidationError {
    #[error("Invalid type definitions: {message}")]
    InvalidTypeDefinitions { message: String },
    #[error(
        "Type \"{type_name}\" declares relationship type \"{rel_type}\" with direction {direction} to \"{target}\" on both \"{first_field}\" and \"{second_field}\""
    )]
    DuplicateRelationship {
        type_name: Name,
        rel_type: String,
        direction: String,
        target: Name,
        first_field: Name,
        second_field: Name,
    },
    #[error(
        "Field \"{type_name}.{field_name}\" references relationship properties type \"{properties}\" which is not annotated with @relationshipProperties"
    )]
    MissingRelationshipProperties {
        type_name: Name,
        field_name: Name,
        properties: String,
    },
    #[error("Field \"{type_name}.{field_name}\" has a relationship to unknown type \"{target}\"")]
    UnknownRelationshipTarget {
        type_name: Name,
        field_name: Name,
        target: Name,
    },
    #[error("Invalid argument \"{argument}\" of directive @{directive} on {location}: {message}")]
    InvalidDirectiveArgument {
        directive: Name,
        argument: String,
        location: String,
        message: String,
    },
    #[error("Interface \"{interface}\" implements itself through {cycle}")]
    CircularInterfaceImplementation { interface: Name, cycle: String },
    #[error("Union \"{union_name}\" member \"{member}\" is not a node type")]
    InvalidUnionMember { union_name: Name, member: Name },
    #[error(
        "Generated {generated} \"{name}\" collides with the user declared {declared} \"{name}\""
    )]
    NameCollision {
        name: String,
        generated: String,
        declared: String,
    },
    #[error("Invalid authorization rule on {location}: {message}")]
    InvalidAuthorizationRule { location: String, message: String },
    #[error("Invalid @key on \"{type_name}\": {message}")]
    InvalidEntityKey { type_name: Name, message: String },
    #[error("The generated schema is invalid: {message}")]
    InvalidGeneratedSchema { message: String },
}

impl SingleValidationError {
    pub fn code(&self) -> &'static str {
        self.into()
    }
}

/// All the problems found while building a schema. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    pub errors: Vec<SingleValidationError>,
}

impl ValidationErrors {
    pub(crate) fn push(&mut self, error: SingleValidationError) {
        self.errors.push(error);
    }

    pub(crate) fn into_result(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub(crate) fn new() -> Self {
        Self { errors: Vec::new() }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [single] => write!(f, "{single}"),
            errors => {
                writeln!(f, "The following errors occurred:")?;
                for error in errors {
                    writeln!(f, "  - {error}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ValidationErrors {}

impl From<SingleValidationError> for ValidationErrors {
    fn from(error: SingleValidationError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl FromIterator<SingleValidationError> for ValidationErrors {
    fn from_iter<T: IntoIterator<Item = SingleValidationError>>(iter: T) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl<T> From<WithErrors<T>> for ValidationErrors {
    fn from(value: WithErrors<T>) -> Self {
        value.errors.into()
    }
}

impl From<DiagnosticList> for ValidationErrors {
    fn from(value: DiagnosticList) -> Self {
        value
            .iter()
            .map(|diagnostic| SingleValidationError::InvalidTypeDefinitions {
                message: diagnostic.error.to_string(),
            })
            .collect()
    }
}

/// A problem with one operation, found before anything is sent to the database.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, strum_macros::IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CompileError {
    #[error("Unknown field \"{field}\" in filter of type \"{type_name}\"")]
    UnknownWhereField { type_name: Name, field: String },
    #[error("Invalid value for \"{key}\": {message}")]
    InvalidArgument { key: String, message: String },
    #[error("Unknown root field \"{type_name}.{field}\"")]
    UnknownRootField { type_name: Name, field: String },
    #[error("Unknown field \"{field}\" on type \"{type_name}\"")]
    UnknownField { type_name: Name, field: String },
    #[error("Invalid cursor \"{cursor}\"")]
    InvalidCursor { cursor: String },
    #[error("Missing variable \"${name}\"")]
    MissingVariable { name: Name },
    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },
    #[error("Field \"{type_name}.{field}\" cannot be sorted on")]
    UnsortableField { type_name: Name, field: String },
}

impl CompileError {
    pub fn code(&self) -> &'static str {
        self.into()
    }
}

/// An error reported by the injected database driver, passed through opaquely.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct DriverError {
    pub code: Option<String>,
    pub message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }
}

/// The crate level error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, strum_macros::IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GraphCypherError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("{}", FORBIDDEN_MESSAGE)]
    Forbidden,
    #[error("{}", UNAUTHENTICATED_MESSAGE)]
    Unauthenticated,
    #[error(transparent)]
    Driver(DriverError),
    #[error("{message}")]
    Resolver { message: String },
}

impl GraphCypherError {
    /// The code reported in `extensions.code` of the GraphQL error.
    pub fn code(&self) -> String {
        match self {
            GraphCypherError::Validation(errors) => errors
                .errors
                .first()
                .map(|e| e.code())
                .unwrap_or("VALIDATION")
                .to_owned(),
            GraphCypherError::Compile(error) => error.code().to_owned(),
            GraphCypherError::Driver(error) => {
                error.code.clone().unwrap_or_else(|| "DATABASE".to_owned())
            }
            _ => {
                let code: &str = self.into();
                code.to_owned()
            }
        }
    }
}

impl From<SingleValidationError> for GraphCypherError {
    fn from(error: SingleValidationError) -> Self {
        GraphCypherError::Validation(error.into())
    }
}

impl From<DriverError> for GraphCypherError {
    fn from(error: DriverError) -> Self {
        // Validate predicates abort the statement with a database error carrying a marker.
        if error.message.contains(FORBIDDEN_MARKER) {
            GraphCypherError::Forbidden
        } else {
            GraphCypherError::Driver(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use apollo_compiler::name;

    use super::*;

    #[test]
    fn driver_errors_with_markers_become_authorization_errors() {
        let forbidden = DriverError::new(format!(
            "Failed to invoke function `apoc.util.validatePredicate`: {FORBIDDEN_MARKER}"
        ));
        assert_eq!(GraphCypherError::from(forbidden), GraphCypherError::Forbidden);
        assert_eq!(GraphCypherError::Forbidden.to_string(), "Forbidden");

        let opaque = DriverError::with_code("Neo.ClientError.Schema.ConstraintValidationFailed", "exists");
        assert_eq!(
            GraphCypherError::from(opaque.clone()),
            GraphCypherError::Driver(opaque)
        );
    }

    #[test]
    fn codes_are_screaming_snake_case() {
        let error = CompileError::UnknownWhereField {
            type_name: name!("Movie"),
            field: "nope".to_owned(),
        };
        assert_eq!(error.code(), "UNKNOWN_WHERE_FIELD");
        assert_eq!(GraphCypherError::from(error).code(), "UNKNOWN_WHERE_FIELD");
        assert_eq!(GraphCypherError::Unauthenticated.code(), "UNAUTHENTICATED");
    }

    #[test]
    fn multiple_validation_errors_are_listed() {
        let errors: ValidationErrors = [
            SingleValidationError::InvalidTypeDefinitions {
                message: "a".to_owned(),
            },
            SingleValidationError::InvalidTypeDefinitions {
                message: "b".to_owned(),
            },
        ]
        .into_iter()
        .collect();
        insta::assert_snapshot!(errors.to_string(), @r###"
        The following errors occurred:
          - Invalid type definitions: a
          - Invalid type definitions: b
        "###);
    }
}
