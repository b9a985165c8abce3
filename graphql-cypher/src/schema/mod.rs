//! Schema augmentation: the GraphQL schema served for a type model.
//!
//! Every node type gets filter, sort and mutation inputs, connection and aggregation types, and
//! root fields. Generated types are created on first use and memoized by name: cyclic
//! relationship graphs terminate, and the output only depends on the order of the type model.
use std::collections::HashMap;
use std::collections::HashSet;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::ast::FieldDefinition;
use apollo_compiler::ast::InputValueDefinition;
use apollo_compiler::ast::Type;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::name;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::ComponentName;
use apollo_compiler::schema::EnumType;
use apollo_compiler::schema::EnumValueDefinition;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::InputObjectType;
use apollo_compiler::schema::ObjectType;
use apollo_compiler::schema::ScalarType;
use apollo_compiler::validation::Valid;
use tracing::debug;
use tracing::instrument;

use crate::config::Features;
use crate::error::SingleValidationError;
use crate::error::ValidationErrors;
use crate::model::TypeModel;
use crate::model::directives;
use crate::translate::RootField;
use crate::utils::generated_name;

mod federation;
mod inputs;
pub(crate) mod naming;
mod objects;
mod subscriptions;

use naming::EventKind;

const QUERY: Name = name!("Query");
const MUTATION: Name = name!("Mutation");
const SUBSCRIPTION: Name = name!("Subscription");

/// Scalars provided by the library, emitted when referenced.
const LIBRARY_SCALARS: [&str; 3] = ["DateTime", "Date", "BigInt"];

/// The generated schema and what its root fields do.
#[derive(Debug)]
pub(crate) struct AugmentedSchema {
    pub(crate) schema: Valid<Schema>,
    pub(crate) queries: IndexMap<Name, RootField>,
    pub(crate) mutations: IndexMap<Name, RootField>,
    /// Subscription root fields: the node type and the event they deliver.
    pub(crate) subscriptions: IndexMap<Name, (Name, EventKind)>,
    /// The schema served by `_service { sdl }`: without the elements synthesized for
    /// federation.
    pub(crate) service_sdl: String,
}

/// Generates the schema of a type model. The subgraph variant keeps federation directives and
/// adds the `_service` and `_entities` fields.
#[instrument(skip_all, fields(subgraph))]
pub(crate) fn augment(
    model: &TypeModel,
    features: &Features,
    subgraph: bool,
) -> Result<AugmentedSchema, ValidationErrors> {
    let mut writer = SchemaWriter::new(model, features, subgraph);
    writer.copy_user_definitions();
    if subgraph {
        writer.federation_definitions()?;
    }
    writer.node_types();
    writer.root_fields();
    if features.subscriptions.is_some() {
        writer.subscription_fields();
    }
    writer.finish()
}

/// A named type reference, e.g. `MovieWhere`.
pub(super) fn named(name: impl AsRef<str>) -> Type {
    Type::Named(generated_name(name))
}

/// `Name!`
pub(super) fn required(name: impl AsRef<str>) -> Type {
    Type::NonNullNamed(generated_name(name))
}

/// `[Name!]`
pub(super) fn list(name: impl AsRef<str>) -> Type {
    Type::List(Box::new(required(name)))
}

/// `[Name!]!`
pub(super) fn required_list(name: impl AsRef<str>) -> Type {
    Type::NonNullList(Box::new(required(name)))
}

pub(super) fn nullable(ty: &Type) -> Type {
    match ty {
        Type::NonNullNamed(name) => Type::Named(name.clone()),
        Type::NonNullList(item) => Type::List(item.clone()),
        other => other.clone(),
    }
}

/// An input field or argument.
pub(super) fn entry(name: impl AsRef<str>, ty: Type) -> (Name, Type) {
    (generated_name(name), ty)
}

pub(super) fn argument(name: impl AsRef<str>, ty: Type) -> Node<InputValueDefinition> {
    Node::new(InputValueDefinition {
        description: None,
        name: generated_name(name),
        ty: Node::new(ty),
        default_value: None,
        directives: Default::default(),
    })
}

pub(super) fn output_field(
    name: impl AsRef<str>,
    ty: Type,
    arguments: Vec<Node<InputValueDefinition>>,
) -> Component<FieldDefinition> {
    Component::new(FieldDefinition {
        description: None,
        name: generated_name(name),
        arguments,
        ty,
        directives: Default::default(),
    })
}

/// What a user declared type is, for collision reports.
fn declared_kind(ty: &ExtendedType) -> &'static str {
    match ty {
        ExtendedType::Scalar(_) => "scalar",
        ExtendedType::Object(_) => "object type",
        ExtendedType::Interface(_) => "interface",
        ExtendedType::Union(_) => "union",
        ExtendedType::Enum(_) => "enum",
        ExtendedType::InputObject(_) => "input object",
    }
}

pub(super) struct SchemaWriter<'a> {
    model: &'a TypeModel,
    features: &'a Features,
    subgraph: bool,
    schema: Schema,
    /// Types declared by the user, by name.
    declared: HashMap<Name, &'static str>,
    /// Names of the generated types, including the ones still being built.
    generated: HashSet<Name>,
    /// Generated types whose fields are being built.
    in_progress: HashSet<Name>,
    errors: ValidationErrors,
    query_fields: IndexMap<Name, Component<FieldDefinition>>,
    mutation_fields: IndexMap<Name, Component<FieldDefinition>>,
    subscription_fields: IndexMap<Name, Component<FieldDefinition>>,
    queries: IndexMap<Name, RootField>,
    mutations: IndexMap<Name, RootField>,
    subscriptions: IndexMap<Name, (Name, EventKind)>,
}

impl<'a> SchemaWriter<'a> {
    fn new(model: &'a TypeModel, features: &'a Features, subgraph: bool) -> Self {
        let declared = model
            .source
            .types
            .iter()
            .filter(|(_, ty)| !ty.is_built_in())
            .map(|(name, ty)| (name.clone(), declared_kind(ty)))
            .collect();
        Self {
            model,
            features,
            subgraph,
            schema: Schema::new(),
            declared,
            generated: HashSet::new(),
            in_progress: HashSet::new(),
            errors: ValidationErrors::new(),
            query_fields: IndexMap::default(),
            mutation_fields: IndexMap::default(),
            subscription_fields: IndexMap::default(),
            queries: IndexMap::default(),
            mutations: IndexMap::default(),
            subscriptions: IndexMap::default(),
        }
    }

    /// Whether a directive of the user's definitions is carried to the generated schema.
    fn carries(&self, directive: &str) -> bool {
        !directives::is_library_directive(directive)
            && (self.subgraph || !directives::is_federation_directive(directive))
    }

    fn carried(&self, list: &apollo_compiler::schema::DirectiveList) -> apollo_compiler::schema::DirectiveList {
        apollo_compiler::schema::DirectiveList(
            list.iter().filter(|d| self.carries(&d.name)).cloned().collect(),
        )
    }

    fn carried_ast(&self, list: &ast::DirectiveList) -> ast::DirectiveList {
        ast::DirectiveList(list.iter().filter(|d| self.carries(&d.name)).cloned().collect())
    }

    /// Copies the enums, scalars, input objects and directive definitions of the user's
    /// definitions.
    fn copy_user_definitions(&mut self) {
        let model = self.model;
        for (name, definition) in &model.source.directive_definitions {
            if self.schema.directive_definitions.contains_key(name) || !self.carries(name) {
                continue;
            }
            self.schema
                .directive_definitions
                .insert(name.clone(), definition.clone());
        }
        for (name, ty) in &model.source.types {
            if ty.is_built_in() {
                continue;
            }
            let copied = match ty {
                ExtendedType::Scalar(scalar) => {
                    let mut scalar = scalar.clone();
                    scalar.make_mut().directives = self.carried(&scalar.directives);
                    ExtendedType::Scalar(scalar)
                }
                ExtendedType::Enum(enum_type) => {
                    let mut enum_type = enum_type.clone();
                    enum_type.make_mut().directives = self.carried(&enum_type.directives);
                    ExtendedType::Enum(enum_type)
                }
                ExtendedType::InputObject(input) => {
                    let mut input = input.clone();
                    input.make_mut().directives = self.carried(&input.directives);
                    ExtendedType::InputObject(input)
                }
                ExtendedType::Object(_) | ExtendedType::Interface(_) | ExtendedType::Union(_) => continue,
            };
            self.schema.types.insert(name.clone(), copied);
        }
    }

    /// Claims the name of a generated type. Returns false when the type was already generated
    /// or is being built further up the stack.
    fn claim(&mut self, name: &Name, kind: &str) -> bool {
        if !self.generated.insert(name.clone()) {
            return false;
        }
        self.in_progress.insert(name.clone());
        if let Some(declared) = self.declared.get(name) {
            self.errors.push(SingleValidationError::NameCollision {
                name: name.to_string(),
                generated: kind.to_owned(),
                declared: (*declared).to_owned(),
            });
        }
        true
    }

    fn insert(&mut self, name: Name, ty: ExtendedType) {
        self.in_progress.remove(&name);
        self.schema.types.insert(name, ty);
    }

    /// The generated input object `name`, built by `build` on first use. Inputs without any
    /// field get a placeholder field.
    pub(super) fn input_object(
        &mut self,
        name: String,
        build: impl FnOnce(&mut Self) -> Vec<(Name, Type)>,
    ) -> Name {
        let name = generated_name(name);
        if !self.claim(&name, "input object") {
            return name;
        }
        let mut entries = build(self);
        if entries.is_empty() {
            entries.push(entry(naming::EMPTY_INPUT, named("Boolean")));
        }
        let fields = entries
            .into_iter()
            .map(|(field_name, ty)| {
                let definition = InputValueDefinition {
                    description: None,
                    name: field_name.clone(),
                    ty: Node::new(ty),
                    default_value: None,
                    directives: Default::default(),
                };
                (field_name, Component::new(definition))
            })
            .collect();
        let input = InputObjectType {
            description: None,
            name: name.clone(),
            directives: Default::default(),
            fields,
        };
        self.insert(name.clone(), ExtendedType::InputObject(Node::new(input)));
        name
    }

    /// The generated object type `name`, built by `build` on first use. `None` when it has no
    /// field.
    pub(super) fn object(
        &mut self,
        name: String,
        build: impl FnOnce(&mut Self) -> Vec<Component<FieldDefinition>>,
    ) -> Option<Name> {
        let name = generated_name(name);
        if !self.claim(&name, "object type") {
            let exists = self.schema.types.contains_key(&name) || self.in_progress.contains(&name);
            return exists.then_some(name);
        }
        let fields = build(self);
        if fields.is_empty() {
            self.in_progress.remove(&name);
            return None;
        }
        let object = ObjectType {
            description: None,
            name: name.clone(),
            implements_interfaces: IndexSet::default(),
            directives: Default::default(),
            fields: fields.into_iter().map(|f| (f.name.clone(), f)).collect(),
        };
        self.insert(name.clone(), ExtendedType::Object(Node::new(object)));
        Some(name)
    }

    pub(super) fn enum_type(&mut self, name: &str, values: &[&str]) -> Name {
        let name = generated_name(name);
        if !self.claim(&name, "enum") {
            return name;
        }
        let values = values
            .iter()
            .map(|value| {
                let value = generated_name(value);
                let definition = EnumValueDefinition {
                    description: None,
                    value: value.clone(),
                    directives: Default::default(),
                };
                (value, Component::new(definition))
            })
            .collect();
        let enum_type = EnumType {
            description: None,
            name: name.clone(),
            directives: Default::default(),
            values,
        };
        self.insert(name.clone(), ExtendedType::Enum(Node::new(enum_type)));
        name
    }

    /// Checks a generated field against the fields the user declared on the same type.
    pub(super) fn check_field(&mut self, type_name: &str, field: &str, declared: bool) {
        if declared {
            self.errors.push(SingleValidationError::NameCollision {
                name: format!("{type_name}.{field}"),
                generated: "field".to_owned(),
                declared: "field".to_owned(),
            });
        }
    }

    pub(super) fn add_query(&mut self, field: Component<FieldDefinition>, root: RootField) {
        let declared = self.model.custom_queries.contains_key(&field.name);
        self.check_field(QUERY.as_str(), &field.name, declared);
        self.queries.insert(field.name.clone(), root);
        self.query_fields.insert(field.name.clone(), field);
    }

    pub(super) fn add_mutation(&mut self, field: Component<FieldDefinition>, root: RootField) {
        let declared = self.model.custom_mutations.contains_key(&field.name);
        self.check_field(MUTATION.as_str(), &field.name, declared);
        self.mutations.insert(field.name.clone(), root);
        self.mutation_fields.insert(field.name.clone(), field);
    }

    pub(super) fn add_subscription(
        &mut self,
        field: Component<FieldDefinition>,
        type_name: Name,
        kind: EventKind,
    ) {
        self.subscriptions.insert(field.name.clone(), (type_name, kind));
        self.subscription_fields.insert(field.name.clone(), field);
    }

    /// Inserts the root operation types.
    fn root_types(&mut self) {
        let roots = [
            (QUERY, std::mem::take(&mut self.query_fields)),
            (MUTATION, std::mem::take(&mut self.mutation_fields)),
            (SUBSCRIPTION, std::mem::take(&mut self.subscription_fields)),
        ];
        for (name, fields) in roots {
            if fields.is_empty() && name != QUERY {
                continue;
            }
            let object = ObjectType {
                description: None,
                name: name.clone(),
                implements_interfaces: IndexSet::default(),
                directives: Default::default(),
                fields,
            };
            self.schema
                .types
                .insert(name.clone(), ExtendedType::Object(Node::new(object)));
            let definition = self.schema.schema_definition.make_mut();
            let root = Some(ComponentName::from(name.clone()));
            match name.as_str() {
                "Query" => definition.query = root,
                "Mutation" => definition.mutation = root,
                _ => definition.subscription = root,
            }
        }
    }

    /// Declares the library scalars referenced by any generated or copied field.
    fn library_scalars(&mut self) {
        let mut referenced = HashSet::new();
        for ty in self.schema.types.values() {
            match ty {
                ExtendedType::Object(object) => {
                    for field in object.fields.values() {
                        referenced.insert(field.ty.inner_named_type().clone());
                        referenced.extend(field.arguments.iter().map(|a| a.ty.inner_named_type().clone()));
                    }
                }
                ExtendedType::Interface(interface) => {
                    for field in interface.fields.values() {
                        referenced.insert(field.ty.inner_named_type().clone());
                        referenced.extend(field.arguments.iter().map(|a| a.ty.inner_named_type().clone()));
                    }
                }
                ExtendedType::InputObject(input) => {
                    referenced.extend(input.fields.values().map(|f| f.ty.inner_named_type().clone()));
                }
                _ => {}
            }
        }
        for scalar in LIBRARY_SCALARS {
            if !referenced.contains(scalar) || self.schema.types.contains_key(scalar) {
                continue;
            }
            let name = generated_name(scalar);
            let definition = ScalarType {
                description: None,
                name: name.clone(),
                directives: Default::default(),
            };
            self.schema
                .types
                .insert(name, ExtendedType::Scalar(Node::new(definition)));
        }
    }

    fn finish(mut self) -> Result<AugmentedSchema, ValidationErrors> {
        self.root_types();
        self.library_scalars();
        self.errors.clone().into_result()?;
        let service_sdl = self.schema.to_string();
        if self.subgraph {
            self.entity_fields();
        }
        let schema = self.schema.validate().map_err(|invalid| {
            SingleValidationError::InvalidGeneratedSchema {
                message: invalid.errors.to_string(),
            }
        })?;
        debug!(
            types = schema.types.len(),
            queries = self.queries.len(),
            mutations = self.mutations.len(),
            subscriptions = self.subscriptions.len(),
            "augmented schema"
        );
        Ok(AugmentedSchema {
            schema,
            queries: self.queries,
            mutations: self.mutations,
            subscriptions: self.subscriptions,
            service_sdl,
        })
    }
}

#[cfg(test)]
mod tests {
    use apollo_compiler::schema::ExtendedType;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::SubscriptionsFeature;

    const TYPE_DEFS: &str = r#"
        directive @preserved on OBJECT | FIELD_DEFINITION

        interface Production {
            title: String!
        }

        type Movie implements Production @preserved {
            id: ID! @id
            title: String!
            released: Int
            tags: [String!]
            actors: [Actor!]! @relationship(type: "ACTED_IN", direction: IN, properties: "ActedIn")
            director: Person @relationship(type: "DIRECTED", direction: IN)
            related: [Search!]! @relationship(type: "RELATED", direction: OUT)
        }

        type Actor {
            name: String! @unique @preserved
            born: DateTime
            movies: [Movie!]! @relationship(type: "ACTED_IN", direction: OUT, properties: "ActedIn")
        }

        type Person {
            name: String
        }

        type ActedIn @relationshipProperties {
            role: String
        }

        union Search = Movie | Actor
    "#;

    fn augmented(type_defs: &str, features: &Features, subgraph: bool) -> AugmentedSchema {
        let model = TypeModel::build(type_defs).unwrap();
        augment(&model, features, subgraph).unwrap()
    }

    fn input_fields(schema: &Schema, name: &str) -> Vec<String> {
        let Some(ExtendedType::InputObject(input)) = schema.types.get(name) else {
            panic!("no input object {name}");
        };
        input.fields.keys().map(ToString::to_string).collect()
    }

    fn field_type(schema: &Schema, type_name: &str, field: &str) -> String {
        schema.type_field(type_name, field).unwrap().ty.to_string()
    }

    #[test]
    fn generation_is_deterministic() {
        let features = Features::default();
        let first = augmented(TYPE_DEFS, &features, false);
        let second = augmented(TYPE_DEFS, &features, false);
        assert_eq!(first.schema.to_string(), second.schema.to_string());
    }

    #[test]
    fn generates_root_fields() {
        let augmented = augmented(TYPE_DEFS, &Features::default(), false);
        let schema = &augmented.schema;
        assert_eq!(field_type(schema, "Query", "movies"), "[Movie!]!");
        assert_eq!(field_type(schema, "Query", "moviesConnection"), "MoviesConnection!");
        assert_eq!(field_type(schema, "Query", "moviesAggregate"), "MovieAggregateSelection!");
        assert_eq!(field_type(schema, "Query", "productions"), "[Production!]!");
        assert_eq!(field_type(schema, "Query", "searches"), "[Search!]!");
        assert_eq!(
            field_type(schema, "Mutation", "createMovies"),
            "CreateMoviesMutationResponse!"
        );
        assert_eq!(field_type(schema, "Mutation", "deleteMovies"), "DeleteInfo!");
        assert_eq!(
            augmented.queries.get("moviesConnection"),
            Some(&RootField::Connection(name!("Movie")))
        );
        assert_eq!(
            augmented.mutations.get("updateActors"),
            Some(&RootField::Update(name!("Actor")))
        );
        assert!(schema.types.contains_key("DateTime"));
        assert!(!schema.types.contains_key("BigInt"));
    }

    #[test]
    fn where_inputs_follow_field_categories() {
        let augmented = augmented(TYPE_DEFS, &Features::default(), false);
        let fields = input_fields(&augmented.schema, "MovieWhere");
        for expected in [
            "title_STARTS_WITH",
            "released_GTE",
            "tags_INCLUDES",
            "actors_SOME",
            "actorsConnection_ALL",
            "actorsAggregate",
            "director_NOT",
            "directorConnection",
            "related_NONE",
            "AND",
            "NOT",
        ] {
            assert!(fields.contains(&expected.to_owned()), "missing {expected}");
        }
        assert!(!fields.contains(&"tags_CONTAINS".to_owned()));
        assert_eq!(input_fields(&augmented.schema, "SearchWhere"), ["Movie", "Actor"]);
        assert!(input_fields(&augmented.schema, "ProductionWhere").contains(&"_on".to_owned()));
    }

    #[test]
    fn mutation_inputs_nest_through_relationships() {
        let augmented = augmented(TYPE_DEFS, &Features::default(), false);
        let schema = &augmented.schema;
        let create = input_fields(schema, "MovieCreateInput");
        assert_eq!(create, ["title", "released", "tags", "actors", "director", "related"]);
        assert_eq!(
            input_fields(schema, "MovieActorsFieldInput"),
            ["create", "connect", "connectOrCreate"]
        );
        assert_eq!(input_fields(schema, "MovieRelatedCreateInput"), ["Movie", "Actor"]);
        assert!(input_fields(schema, "MovieUpdateInput").contains(&"released_INCREMENT".to_owned()));
        assert_eq!(
            input_fields(schema, "MovieActorsUpdateFieldInput"),
            ["where", "update", "connect", "disconnect", "create", "connectOrCreate", "delete"]
        );
        assert_eq!(input_fields(schema, "ActorUniqueWhere"), ["name"]);
    }

    #[test]
    fn relationship_fields_get_connections_and_aggregates() {
        let augmented = augmented(TYPE_DEFS, &Features::default(), false);
        let schema = &augmented.schema;
        assert_eq!(
            field_type(schema, "Movie", "actorsConnection"),
            "MovieActorsConnection!"
        );
        assert_eq!(
            field_type(schema, "MovieActorsRelationship", "properties"),
            "ActedIn!"
        );
        assert_eq!(
            field_type(schema, "Movie", "actorsAggregate"),
            "MovieActorActorsAggregationSelection"
        );
        assert!(schema.type_field("Movie", "relatedAggregate").is_err());
    }

    #[test]
    fn unknown_directives_are_carried_over() {
        let augmented = augmented(TYPE_DEFS, &Features::default(), false);
        let schema = &augmented.schema;
        assert!(schema.directive_definitions.contains_key("preserved"));
        let Some(ExtendedType::Object(movie)) = schema.types.get("Movie") else {
            panic!("no Movie type");
        };
        assert!(movie.directives.has("preserved"));
        assert!(schema.type_field("Actor", "name").unwrap().directives.has("preserved"));
        assert!(!schema.directive_definitions.contains_key("relationship"));
    }

    #[test]
    fn collisions_with_declared_types_are_fatal() {
        let model = TypeModel::build(
            r#"
            type Movie { title: String }
            input MovieWhere { title: String }
            "#,
        )
        .unwrap();
        let errors = augment(&model, &Features::default(), false).unwrap_err();
        assert_eq!(
            errors.errors,
            vec![SingleValidationError::NameCollision {
                name: "MovieWhere".to_owned(),
                generated: "input object".to_owned(),
                declared: "input object".to_owned(),
            }]
        );
    }

    #[test]
    fn collisions_with_declared_root_fields_are_fatal() {
        let model = TypeModel::build(
            r#"
            type Movie { title: String }
            type Query { movies: [Movie!]! @cypher(statement: "MATCH (m:Movie) RETURN m", columnName: "m") }
            "#,
        )
        .unwrap();
        let errors = augment(&model, &Features::default(), false).unwrap_err();
        assert_eq!(errors.errors[0].code(), "NAME_COLLISION");
    }

    #[test]
    fn subscriptions_are_generated_when_enabled() {
        let features = Features {
            subscriptions: Some(SubscriptionsFeature::default()),
            ..Default::default()
        };
        let augmented = augmented(TYPE_DEFS, &features, false);
        let schema = &augmented.schema;
        assert_eq!(
            augmented.subscriptions.get("movieCreated"),
            Some(&(name!("Movie"), EventKind::Created))
        );
        assert_eq!(field_type(schema, "Subscription", "movieUpdated"), "MovieUpdatedEvent!");
        assert_eq!(
            field_type(schema, "MovieRelationshipCreatedEvent", "createdRelationship"),
            "MovieConnectedRelationships!"
        );
        assert_eq!(
            field_type(schema, "MovieActorsConnectedRelationship", "node"),
            "ActorEventPayload!"
        );
        assert!(schema.types.contains_key("EventType"));
    }

    #[test]
    fn subgraph_schemas_expose_entities() {
        let type_defs = r#"
            type Movie @key(fields: "id") { id: ID! title: String }
            type Studio @key(fields: "id", resolvable: false) { id: ID! }
        "#;
        let supergraph = augmented(type_defs, &Features::default(), false);
        assert!(!supergraph.queries.contains_key("_entities"));
        let Some(ExtendedType::Object(movie)) = supergraph.schema.types.get("Movie") else {
            panic!("no Movie type");
        };
        assert!(!movie.directives.has("key"));

        let subgraph = augmented(type_defs, &Features::default(), true);
        assert_eq!(subgraph.queries.get("_entities"), Some(&RootField::Entities));
        assert_eq!(subgraph.queries.get("_service"), Some(&RootField::Service));
        let Some(ExtendedType::Union(entity)) = subgraph.schema.types.get("_Entity") else {
            panic!("no _Entity union");
        };
        assert_eq!(entity.members.len(), 1);
        assert!(subgraph.service_sdl.contains("@key(fields: \"id\")"));
        assert!(!subgraph.service_sdl.contains("_entities"));
    }
}
