//! The type model: node types, relationships, interfaces and unions resolved from the user's
//! type definitions.
//!
//! The model is built once per schema by [`TypeModel::build`] and is immutable afterwards. The
//! schema augmentation engine and the Cypher compiler only ever read it.
use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::schema;
use itertools::Itertools;

use crate::auth::rules::AuthenticationAnnotation;
use crate::auth::rules::AuthorizationAnnotation;
use crate::auth::rules::SubscriptionsAuthorizationAnnotation;
use crate::error::ValidationErrors;

pub(crate) mod builder;
pub(crate) mod directives;
pub mod field;
pub mod relationship;

pub use field::CypherAnnotation;
pub use field::Field;
pub use field::FieldKind;
pub use field::ScalarCategory;
pub use field::TimestampOperation;
pub use relationship::Direction;
pub use relationship::QueryDirection;
pub use relationship::Relationship;
pub use relationship::Target;

/// A federation `@key`.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityKey {
    /// The raw field set, e.g. `"id"`.
    pub fields: String,
    /// The top level fields of the field set.
    pub field_names: Vec<Name>,
    pub resolvable: bool,
}

/// An object type backed by a node label.
#[derive(Debug, Clone, PartialEq)]
pub struct ConceptType {
    pub name: Name,
    pub description: Option<Node<str>>,
    /// Labels matched and created for this type; the first one is the main label.
    pub labels: Vec<String>,
    pub fields: IndexMap<Name, Field>,
    pub interfaces: Vec<Name>,
    /// Unions this type is a member of.
    pub unions: Vec<Name>,
    pub authorization: Option<AuthorizationAnnotation>,
    pub authentication: Option<AuthenticationAnnotation>,
    pub subscriptions_authorization: Option<SubscriptionsAuthorizationAnnotation>,
    pub keys: Vec<EntityKey>,
    /// Directives not understood by the library, copied to the generated object type.
    pub passthrough: schema::DirectiveList,
    /// Lower camel case plural used for root fields, e.g. `movies`.
    pub plural: String,
}

impl ConceptType {
    pub fn is_union_member(&self) -> bool {
        !self.unions.is_empty()
    }

    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.fields.values().filter_map(Field::relationship)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Field> {
        self.fields.values().filter(|f| f.is_attribute())
    }

    /// Whether the data of this type lives in another subgraph.
    pub fn is_resolvable(&self) -> bool {
        self.keys.is_empty() || self.keys.iter().any(|key| key.resolvable)
    }

    pub fn main_label(&self) -> &str {
        self.labels
            .first()
            .map(String::as_str)
            .unwrap_or_else(|| self.name.as_str())
    }

    /// The label expression of this type's nodes, e.g. `:Movie:Film`.
    pub(crate) fn label_string(&self) -> String {
        self.labels
            .iter()
            .map(|label| format!(":{}", crate::translate::cypher::escape(label)))
            .collect()
    }

    /// A boolean Cypher expression checking that `variable` is a node of this type.
    pub(crate) fn label_check(&self, variable: &str) -> String {
        self.labels
            .iter()
            .map(|label| format!("{variable}:{}", crate::translate::cypher::escape(label)))
            .join(" AND ")
    }

    pub fn unique_fields(&self) -> impl Iterator<Item = &Field> {
        self.attributes().filter(|f| f.unique)
    }
}

/// An interface implemented by node types.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceEntity {
    pub name: Name,
    pub description: Option<Node<str>>,
    pub fields: IndexMap<Name, Field>,
    pub interfaces: Vec<Name>,
    /// Every node type implementing this interface, directly or through another interface.
    pub implementations: Vec<Name>,
    pub authorization: Option<AuthorizationAnnotation>,
    pub passthrough: schema::DirectiveList,
    pub plural: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionEntity {
    pub name: Name,
    pub description: Option<Node<str>>,
    pub members: Vec<Name>,
    pub passthrough: schema::DirectiveList,
    pub plural: String,
}

/// A `@relationshipProperties` type: the attributes stored on relationships.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertiesType {
    pub name: Name,
    pub description: Option<Node<str>>,
    pub fields: IndexMap<Name, Field>,
    pub passthrough: schema::DirectiveList,
}

/// A claim of the `@jwt` type.
#[derive(Debug, Clone, PartialEq)]
pub struct JwtClaim {
    pub field: Field,
    /// Path of the claim in the token payload (`@jwtClaim`), split on dots.
    pub path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JwtType {
    pub name: Name,
    pub claims: IndexMap<Name, JwtClaim>,
}

/// A field of the user's `Query`, `Mutation` or `Subscription` type.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomRootField {
    pub field: Field,
    pub definition: Node<apollo_compiler::ast::FieldDefinition>,
}

/// Any type of the model that fields can be looked up on.
#[derive(Debug, Clone, Copy)]
pub enum Entity<'a> {
    Concept(&'a ConceptType),
    Interface(&'a InterfaceEntity),
    Union(&'a UnionEntity),
    Properties(&'a PropertiesType),
    Jwt(&'a JwtType),
}

impl<'a> Entity<'a> {
    pub fn name(&self) -> &'a Name {
        match self {
            Entity::Concept(t) => &t.name,
            Entity::Interface(t) => &t.name,
            Entity::Union(t) => &t.name,
            Entity::Properties(t) => &t.name,
            Entity::Jwt(t) => &t.name,
        }
    }

    pub fn field(&self, name: &str) -> Option<&'a Field> {
        match self {
            Entity::Concept(t) => t.fields.get(name),
            Entity::Interface(t) => t.fields.get(name),
            Entity::Union(_) => None,
            Entity::Properties(t) => t.fields.get(name),
            Entity::Jwt(t) => t.claims.get(name).map(|claim| &claim.field),
        }
    }

    pub fn fields(&self) -> Box<dyn Iterator<Item = &'a Field> + 'a> {
        match self {
            Entity::Concept(t) => Box::new(t.fields.values()),
            Entity::Interface(t) => Box::new(t.fields.values()),
            Entity::Union(_) => Box::new(std::iter::empty()),
            Entity::Properties(t) => Box::new(t.fields.values()),
            Entity::Jwt(t) => Box::new(t.claims.values().map(|claim| &claim.field)),
        }
    }
}

/// The resolved type model.
#[derive(Debug, Clone)]
pub struct TypeModel {
    pub concepts: IndexMap<Name, ConceptType>,
    pub interfaces: IndexMap<Name, InterfaceEntity>,
    pub unions: IndexMap<Name, UnionEntity>,
    pub relationship_properties: IndexMap<Name, PropertiesType>,
    pub jwt: Option<JwtType>,
    pub custom_queries: IndexMap<Name, CustomRootField>,
    pub custom_mutations: IndexMap<Name, CustomRootField>,
    /// The parsed user type definitions: the source of enums, scalars, input types and
    /// directive definitions carried over to the generated schema.
    pub source: Schema,
}

impl TypeModel {
    /// Builds the model from SDL type definitions.
    pub fn build(type_defs: &str) -> Result<Self, ValidationErrors> {
        builder::TypeModelBuilder::build(type_defs)
    }

    pub fn concept(&self, name: &str) -> Option<&ConceptType> {
        self.concepts.get(name)
    }

    pub fn entity(&self, name: &str) -> Option<Entity<'_>> {
        if let Some(t) = self.concepts.get(name) {
            return Some(Entity::Concept(t));
        }
        if let Some(t) = self.interfaces.get(name) {
            return Some(Entity::Interface(t));
        }
        if let Some(t) = self.unions.get(name) {
            return Some(Entity::Union(t));
        }
        if let Some(t) = self.relationship_properties.get(name) {
            return Some(Entity::Properties(t));
        }
        match &self.jwt {
            Some(jwt) if jwt.name == name => Some(Entity::Jwt(jwt)),
            _ => None,
        }
    }

    /// The concrete node types of a node, interface or union type name.
    pub fn concrete_types(&self, name: &str) -> Vec<&ConceptType> {
        if let Some(concept) = self.concepts.get(name) {
            return vec![concept];
        }
        let names: &[Name] = if let Some(interface) = self.interfaces.get(name) {
            &interface.implementations
        } else if let Some(union) = self.unions.get(name) {
            &union.members
        } else {
            &[]
        };
        names.iter().filter_map(|n| self.concepts.get(n)).collect()
    }

    pub fn is_enum(&self, name: &str) -> bool {
        matches!(
            self.source.types.get(name),
            Some(schema::ExtendedType::Enum(_))
        )
    }

    /// Finds the node type of a node given its labels: the type whose labels are all present,
    /// preferring the type with the most labels.
    pub fn concept_for_labels<'a>(&'a self, labels: &[String]) -> Option<&'a ConceptType> {
        self.concepts
            .values()
            .filter(|concept| concept.labels.iter().all(|l| labels.contains(l)))
            .max_by_key(|concept| concept.labels.len())
    }
}
