//! The Cypher query compiler.
//!
//! A [`Translator`] compiles one root field of an operation into one [`CompiledOperation`]: the
//! statement text, its parameters, and the [`RootShape`] used to turn the returned records into
//! GraphQL data. Every user supplied value becomes a parameter; the statement text only ever
//! contains identifiers taken from the type model.
use apollo_compiler::Name;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use tracing::debug;
use tracing::instrument;

use crate::auth;
use crate::auth::rules::AuthorizationOperation;
use crate::config::Features;
use crate::config::RequestContext;
use crate::error::CompileError;
use crate::error::GraphCypherError;
use crate::execute::driver::AccessMode;
use crate::model::ConceptType;
use crate::model::Entity;
use crate::model::InterfaceEntity;
use crate::model::TypeModel;
use crate::utils::logging::snapshot;

mod aggregate;
mod authorization;
mod connection;
mod create;
mod custom;
pub(crate) mod cypher;
mod delete;
mod events;
pub(crate) mod projection;
mod read;
mod relate;
pub(crate) mod selection;
pub(crate) mod shape;
mod update;
mod where_clause;

use cypher::Environment;
use selection::SelectedField;
use shape::RootShape;

/// What a generated root field does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RootField {
    Typename,
    /// Plural read of a node type, interface or union.
    Read(Name),
    Connection(Name),
    Aggregate(Name),
    Create(Name),
    Update(Name),
    Delete(Name),
    /// A user declared root field backed by `@cypher`.
    Cypher { field: Name, mutation: bool },
    /// A user declared root field backed by an injected resolver.
    Resolver(Name),
    Service,
    Entities,
}

/// A statement ready to be sent to the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledOperation {
    pub cypher: String,
    pub params: Map<String, Value>,
    #[serde(skip)]
    pub(crate) shape: RootShape,
    #[serde(skip)]
    pub(crate) mode: AccessMode,
}

/// The node types a variable may be bound to: one node type, or the closed set of node types of
/// an interface or union.
#[derive(Debug, Clone)]
pub(crate) struct NodeSet<'a> {
    pub(crate) name: &'a Name,
    pub(crate) concepts: Vec<&'a ConceptType>,
    pub(crate) interface: Option<&'a InterfaceEntity>,
    pub(crate) is_abstract: bool,
}

impl<'a> NodeSet<'a> {
    pub(crate) fn of(model: &'a TypeModel, name: &str) -> Result<Self, CompileError> {
        let unknown = || CompileError::UnknownField {
            type_name: Name::new_unchecked(name),
            field: "<node>".to_owned(),
        };
        let entity = model.entity(name).ok_or_else(unknown)?;
        let interface = match entity {
            Entity::Interface(interface) => Some(interface),
            Entity::Concept(_) | Entity::Union(_) => None,
            Entity::Properties(_) | Entity::Jwt(_) => return Err(unknown()),
        };
        let mut concepts = model.concrete_types(name);
        // Types with more labels first, so that a label check never matches a less specific type.
        concepts.sort_by_key(|c| std::cmp::Reverse(c.labels.len()));
        Ok(Self {
            name: entity.name(),
            concepts,
            interface,
            is_abstract: !matches!(entity, Entity::Concept(_)),
        })
    }

    pub(crate) fn concept(concept: &'a ConceptType) -> Self {
        Self {
            name: &concept.name,
            concepts: vec![concept],
            interface: None,
            is_abstract: false,
        }
    }

    /// The node part of a pattern: labels for a node type, a bare variable otherwise.
    pub(crate) fn node_pattern(&self, variable: &str) -> String {
        match (self.is_abstract, self.concepts.first()) {
            (false, Some(concept)) => format!("{variable}{}", concept.label_string()),
            _ => variable.to_owned(),
        }
    }

    /// The label check of abstract sets, matched in `WHERE`.
    pub(crate) fn label_predicate(&self, variable: &str) -> Option<String> {
        if !self.is_abstract {
            return None;
        }
        Some(
            cypher::or(
                self.concepts
                    .iter()
                    .map(|concept| concept.label_check(variable))
                    .collect(),
            )
            .unwrap_or_else(|| "false".to_owned()),
        )
    }
}

pub(crate) struct Translator<'a> {
    model: &'a TypeModel,
    features: &'a Features,
    context: &'a RequestContext,
    env: Environment,
    /// Set while compiling the predicate of an authorization rule: rules do not nest.
    in_rule: bool,
}

impl<'a> Translator<'a> {
    pub(crate) fn new(model: &'a TypeModel, features: &'a Features, context: &'a RequestContext) -> Self {
        Self {
            model,
            features,
            context,
            env: Environment::default(),
            in_rule: false,
        }
    }

    /// Compiles one root field.
    #[instrument(skip_all, fields(field = %field.name))]
    pub(crate) fn compile(
        mut self,
        root: &RootField,
        field: &SelectedField,
    ) -> Result<CompiledOperation, GraphCypherError> {
        auth::check_global_authentication(self.features, self.context)?;
        let (statement, shape, mode) = match root {
            RootField::Read(name) => {
                let (statement, shape) = self.read_root(name, field)?;
                (statement, shape, AccessMode::Read)
            }
            RootField::Connection(name) => {
                let (statement, shape) = self.connection_root(name, field)?;
                (statement, shape, AccessMode::Read)
            }
            RootField::Aggregate(name) => {
                let (statement, shape) = self.aggregate_root(name, field)?;
                (statement, shape, AccessMode::Read)
            }
            RootField::Create(name) => {
                let (statement, shape) = self.create_root(name, field)?;
                (statement, shape, AccessMode::Write)
            }
            RootField::Update(name) => {
                let (statement, shape) = self.update_root(name, field)?;
                (statement, shape, AccessMode::Write)
            }
            RootField::Delete(name) => {
                let (statement, shape) = self.delete_root(name, field)?;
                (statement, shape, AccessMode::Write)
            }
            RootField::Cypher { field: name, mutation } => {
                let (statement, shape) = self.cypher_root(name, *mutation, field)?;
                let mode = if *mutation {
                    AccessMode::Write
                } else {
                    AccessMode::Read
                };
                (statement, shape, mode)
            }
            RootField::Typename | RootField::Resolver(_) | RootField::Service | RootField::Entities => {
                return Err(CompileError::InvalidOperation {
                    message: format!("root field \"{}\" is not compiled to Cypher", field.name),
                }
                .into());
            }
        };
        Ok(self.finish(statement, shape, mode))
    }

    /// Compiles the read of one federation entity representation.
    pub(crate) fn compile_entity(
        mut self,
        representation: &Map<String, Value>,
        selection: &selection::SelectionSet,
    ) -> Result<CompiledOperation, GraphCypherError> {
        let (statement, shape) = self.entity_read(representation, selection)?;
        Ok(self.finish(statement, shape, AccessMode::Read))
    }

    fn finish(self, statement: Vec<String>, shape: RootShape, mode: AccessMode) -> CompiledOperation {
        let uses_auth = self.env.uses_auth;
        let mut params = self.env.into_params();
        if uses_auth {
            params.insert(
                "jwt".to_owned(),
                Value::Object(self.context.jwt.clone().unwrap_or_default()),
            );
            params.insert(
                "isAuthenticated".to_owned(),
                Value::Bool(self.context.is_authenticated()),
            );
        }
        let compiled = CompiledOperation {
            cypher: statement.join("\n"),
            params,
            shape,
            mode,
        };
        debug!(cypher = %compiled.cypher, "compiled root field");
        snapshot!(compiled, "compiled root field");
        compiled
    }

    fn events_enabled(&self) -> bool {
        self.features.subscriptions.is_some()
    }

    fn node_set(&self, name: &str) -> Result<NodeSet<'a>, CompileError> {
        NodeSet::of(self.model, name)
    }

    fn concept(&self, name: &str) -> Result<&'a ConceptType, CompileError> {
        self.model
            .concept(name)
            .ok_or_else(|| CompileError::UnknownField {
                type_name: Name::new_unchecked(name),
                field: "<node>".to_owned(),
            })
    }

    /// Checks `@authentication` of a node type and of the given fields of it.
    fn authenticate<'f>(
        &self,
        concept: &ConceptType,
        operation: AuthorizationOperation,
        fields: impl IntoIterator<Item = &'f Name>,
    ) -> Result<(), GraphCypherError> {
        auth::authenticate(concept.authentication.as_ref(), operation, self.context)?;
        for name in fields {
            if let Some(field) = concept.fields.get(name) {
                auth::authenticate(field.authentication.as_ref(), operation, self.context)?;
            }
        }
        Ok(())
    }
}

/// Input values may be a single object or a list of objects.
pub(crate) fn input_objects<'v>(key: &str, value: &'v Value) -> Result<Vec<&'v Map<String, Value>>, CompileError> {
    let invalid = || CompileError::InvalidArgument {
        key: key.to_owned(),
        message: "expected an input object or a list of input objects".to_owned(),
    };
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Object(object) => Ok(vec![object]),
        Value::Array(items) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(|item| item.as_object().ok_or_else(invalid))
            .collect(),
        _ => Err(invalid()),
    }
}

pub(crate) fn input_object<'v>(key: &str, value: &'v Value) -> Result<Option<&'v Map<String, Value>>, CompileError> {
    match value {
        Value::Null => Ok(None),
        Value::Object(object) => Ok(Some(object)),
        _ => Err(CompileError::InvalidArgument {
            key: key.to_owned(),
            message: "expected an input object".to_owned(),
        }),
    }
}
