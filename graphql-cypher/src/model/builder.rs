//! Builds the [`TypeModel`] from user type definitions.
//!
//! Building happens in two passes. The first pass collects node types, interfaces, unions,
//! relationship properties and the JWT type, reporting every problem it finds. The second pass
//! parses authorization rules, which need the shape of every type to be known.
use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::name;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::FieldDefinition;
use apollo_compiler::schema::InterfaceType;
use apollo_compiler::schema::ObjectType;
use itertools::Itertools;
use tracing::debug;
use tracing::instrument;

use super::ConceptType;
use super::CustomRootField;
use super::Entity;
use super::EntityKey;
use super::InterfaceEntity;
use super::JwtClaim;
use super::JwtType;
use super::PropertiesType;
use super::TypeModel;
use super::UnionEntity;
use super::directives;
use super::directives::DirectiveArguments;
use super::field::CypherAnnotation;
use super::field::Field;
use super::field::FieldKind;
use super::field::ScalarCategory;
use super::field::TimestampOperation;
use super::relationship::Direction;
use super::relationship::QueryDirection;
use super::relationship::Relationship;
use super::relationship::Target;
use crate::auth::rules::AuthenticationAnnotation;
use crate::auth::rules::AuthorizationAnnotation;
use crate::auth::rules::RuleParser;
use crate::auth::rules::SubscriptionsAuthorizationAnnotation;
use crate::error::SingleValidationError;
use crate::error::ValidationErrors;
use crate::utils::lower_first;
use crate::utils::pluralize;

/// Rules parsed in the second pass, applied once parsing no longer borrows the model.
enum PendingRule {
    TypeAuthorization(Name, AuthorizationAnnotation),
    TypeAuthentication(Name, AuthenticationAnnotation),
    TypeSubscriptions(Name, SubscriptionsAuthorizationAnnotation),
    InterfaceAuthorization(Name, AuthorizationAnnotation),
    FieldAuthorization(Name, Name, AuthorizationAnnotation),
    FieldAuthentication(Name, Name, AuthenticationAnnotation),
}

pub(crate) struct TypeModelBuilder {
    source: Schema,
    errors: ValidationErrors,
    concepts: IndexMap<Name, ConceptType>,
    interfaces: IndexMap<Name, InterfaceEntity>,
    unions: IndexMap<Name, UnionEntity>,
    relationship_properties: IndexMap<Name, PropertiesType>,
    jwt: Option<JwtType>,
    custom_queries: IndexMap<Name, CustomRootField>,
    custom_mutations: IndexMap<Name, CustomRootField>,
}

impl TypeModelBuilder {
    #[instrument(skip_all)]
    pub(crate) fn build(type_defs: &str) -> Result<TypeModel, ValidationErrors> {
        let source = Schema::builder()
            .adopt_orphan_extensions()
            .parse(type_defs, "schema.graphql")
            .build()?;
        let mut builder = Self {
            source,
            errors: ValidationErrors::new(),
            concepts: IndexMap::default(),
            interfaces: IndexMap::default(),
            unions: IndexMap::default(),
            relationship_properties: IndexMap::default(),
            jwt: None,
            custom_queries: IndexMap::default(),
            custom_mutations: IndexMap::default(),
        };
        builder.collect_types();
        builder.check_interface_cycles();
        builder.collect_fields();
        builder.errors.clone().into_result()?;

        let mut model = TypeModel {
            concepts: builder.concepts,
            interfaces: builder.interfaces,
            unions: builder.unions,
            relationship_properties: builder.relationship_properties,
            jwt: builder.jwt,
            custom_queries: builder.custom_queries,
            custom_mutations: builder.custom_mutations,
            source: builder.source,
        };
        attach_rules(&mut model)?;
        debug!(
            concepts = model.concepts.len(),
            interfaces = model.interfaces.len(),
            unions = model.unions.len(),
            "built type model"
        );
        Ok(model)
    }

    fn root_names(&self) -> (Name, Name, Name) {
        let definition = &self.source.schema_definition;
        let name_of = |root: &Option<apollo_compiler::schema::ComponentName>, default: Name| {
            root.as_ref().map(|n| n.name.clone()).unwrap_or(default)
        };
        (
            name_of(&definition.query, name!("Query")),
            name_of(&definition.mutation, name!("Mutation")),
            name_of(&definition.subscription, name!("Subscription")),
        )
    }

    /// First pass over type names: decides what every object, interface and union becomes.
    fn collect_types(&mut self) {
        let (query, mutation, subscription) = self.root_names();
        let source = self.source.clone();
        for (name, ty) in &source.types {
            if ty.is_built_in() {
                continue;
            }
            match ty {
                ExtendedType::Object(object) => {
                    if *name == query || *name == mutation || *name == subscription {
                        continue;
                    }
                    if object.directives.has(&directives::RELATIONSHIP_PROPERTIES) {
                        self.relationship_properties.insert(
                            name.clone(),
                            PropertiesType {
                                name: name.clone(),
                                description: object.description.clone(),
                                fields: IndexMap::default(),
                                passthrough: passthrough(&object.directives),
                            },
                        );
                    } else if object.directives.has(&directives::JWT) {
                        self.jwt = Some(JwtType {
                            name: name.clone(),
                            claims: IndexMap::default(),
                        });
                    } else {
                        self.collect_concept(object);
                    }
                }
                ExtendedType::Interface(interface) => {
                    let plural = self.plural(name, &interface.directives);
                    self.interfaces.insert(
                        name.clone(),
                        InterfaceEntity {
                            name: name.clone(),
                            description: interface.description.clone(),
                            fields: IndexMap::default(),
                            interfaces: interface
                                .implements_interfaces
                                .iter()
                                .map(|i| i.name.clone())
                                .collect(),
                            implementations: Vec::new(),
                            authorization: None,
                            passthrough: passthrough(&interface.directives),
                            plural,
                        },
                    );
                }
                _ => {}
            }
        }
        // Unions reference node types, so they are resolved once every node type is known.
        for (name, ty) in &source.types {
            let ExtendedType::Union(union) = ty else {
                continue;
            };
            let mut members = Vec::new();
            for member in &union.members {
                if self.concepts.contains_key(&member.name) {
                    members.push(member.name.clone());
                } else {
                    self.errors.push(SingleValidationError::InvalidUnionMember {
                        union_name: name.clone(),
                        member: member.name.clone(),
                    });
                }
            }
            for member in &members {
                if let Some(concept) = self.concepts.get_mut(member) {
                    concept.unions.push(name.clone());
                }
            }
            let plural = self.plural(name, &union.directives);
            self.unions.insert(
                name.clone(),
                UnionEntity {
                    name: name.clone(),
                    description: union.description.clone(),
                    members,
                    passthrough: passthrough(&union.directives),
                    plural,
                },
            );
        }
        let implementations: Vec<(Name, Name)> = self
            .concepts
            .values()
            .flat_map(|c| c.interfaces.iter().map(|i| (i.clone(), c.name.clone())))
            .collect();
        for (interface, concept) in implementations {
            if let Some(interface) = self.interfaces.get_mut(&interface) {
                interface.implementations.push(concept);
            }
        }
    }

    fn plural(&mut self, name: &Name, directive_list: &apollo_compiler::schema::DirectiveList) -> String {
        if let Some(directive) = directive_list.get(&directives::PLURAL) {
            let args = DirectiveArguments::new(directive, name.as_str());
            match args.required_string("value") {
                Ok(value) => return lower_first(&value),
                Err(error) => self.errors.push(error),
            }
        }
        lower_first(&pluralize(name))
    }

    fn collect_concept(&mut self, object: &Node<ObjectType>) {
        let name = &object.name;
        let labels = match object.directives.get(&directives::NODE) {
            Some(directive) => {
                match DirectiveArguments::new(directive, name.as_str()).string_list("labels") {
                    Ok(Some(labels)) if !labels.is_empty() => labels,
                    Ok(_) => vec![name.to_string()],
                    Err(error) => {
                        self.errors.push(error);
                        vec![name.to_string()]
                    }
                }
            }
            None => vec![name.to_string()],
        };
        let keys = self.entity_keys(object);
        let plural = self.plural(name, &object.directives);
        self.concepts.insert(
            name.clone(),
            ConceptType {
                name: name.clone(),
                description: object.description.clone(),
                labels,
                fields: IndexMap::default(),
                interfaces: object
                    .implements_interfaces
                    .iter()
                    .map(|i| i.name.clone())
                    .collect(),
                unions: Vec::new(),
                authorization: None,
                authentication: None,
                subscriptions_authorization: None,
                keys,
                passthrough: passthrough(&object.directives),
                plural,
            },
        );
    }

    fn entity_keys(&mut self, object: &ObjectType) -> Vec<EntityKey> {
        let mut keys = Vec::new();
        for directive in object.directives.get_all(&directives::KEY) {
            let args = DirectiveArguments::new(directive, object.name.as_str());
            let (fields, resolvable) = match (
                args.required_string("fields"),
                args.optional_bool("resolvable"),
            ) {
                (Ok(fields), Ok(resolvable)) => (fields, resolvable.unwrap_or(true)),
                (Err(error), _) | (_, Err(error)) => {
                    self.errors.push(error);
                    continue;
                }
            };
            let field_names = top_level_fields(&fields);
            if field_names.is_empty() {
                self.errors.push(SingleValidationError::InvalidEntityKey {
                    type_name: object.name.clone(),
                    message: "the field set is empty".to_owned(),
                });
                continue;
            }
            let mut names = Vec::new();
            for field in field_names {
                match Name::new(&field) {
                    Ok(name) if object.fields.contains_key(&name) => names.push(name),
                    _ => self.errors.push(SingleValidationError::InvalidEntityKey {
                        type_name: object.name.clone(),
                        message: format!("unknown field \"{field}\""),
                    }),
                }
            }
            keys.push(EntityKey {
                fields,
                field_names: names,
                resolvable,
            });
        }
        keys
    }

    fn check_interface_cycles(&mut self) {
        for start in self.interfaces.keys() {
            let mut path = vec![start.clone()];
            let mut visited = IndexSet::default();
            if self.reaches(start, start, &mut path, &mut visited) {
                self.errors
                    .push(SingleValidationError::CircularInterfaceImplementation {
                        interface: start.clone(),
                        cycle: path
                            .iter()
                            .map(Name::as_str)
                            .join(" -> "),
                    });
            }
        }
    }

    fn reaches(
        &self,
        from: &Name,
        target: &Name,
        path: &mut Vec<Name>,
        visited: &mut IndexSet<Name>,
    ) -> bool {
        let Some(interface) = self.interfaces.get(from) else {
            return false;
        };
        for next in &interface.interfaces {
            path.push(next.clone());
            if next == target {
                return true;
            }
            if visited.insert(next.clone()) && self.reaches(next, target, path, visited) {
                return true;
            }
            path.pop();
        }
        false
    }

    /// Second pass over type definitions: fields of every collected type.
    fn collect_fields(&mut self) {
        let source = self.source.clone();
        for (name, ty) in &source.types {
            match ty {
                ExtendedType::Object(object) if self.concepts.contains_key(name) => {
                    let fields = self.object_fields(name, &object.fields);
                    if let Some(concept) = self.concepts.get_mut(name) {
                        concept.fields = fields;
                    }
                }
                ExtendedType::Object(object) if self.relationship_properties.contains_key(name) => {
                    let fields = self.object_fields(name, &object.fields);
                    for field in fields.values() {
                        if !field.is_attribute() {
                            self.errors.push(SingleValidationError::InvalidTypeDefinitions {
                                message: format!(
                                    "relationship properties field \"{name}.{}\" must be a scalar or enum",
                                    field.name
                                ),
                            });
                        }
                    }
                    if let Some(properties) = self.relationship_properties.get_mut(name) {
                        properties.fields = fields;
                    }
                }
                ExtendedType::Object(object) if self.jwt.as_ref().is_some_and(|j| j.name == *name) => {
                    let claims = self.jwt_claims(name, object);
                    if let Some(jwt) = &mut self.jwt {
                        jwt.claims = claims;
                    }
                }
                ExtendedType::Interface(interface) => {
                    let fields = self.interface_fields(interface);
                    if let Some(entity) = self.interfaces.get_mut(name) {
                        entity.fields = fields;
                    }
                }
                _ => {}
            }
        }
        self.inherit_interface_relationships();
        self.check_duplicate_relationships();
        self.collect_custom_root_fields(&source);
    }

    fn object_fields(
        &mut self,
        type_name: &Name,
        definitions: &IndexMap<Name, Component<FieldDefinition>>,
    ) -> IndexMap<Name, Field> {
        let mut fields = IndexMap::default();
        for definition in definitions.values() {
            let own = &definition.directives;
            let inherited = if own.has(&directives::RELATIONSHIP) || own.has(&directives::CYPHER) {
                None
            } else {
                self.inherited_relationship(type_name, &definition.name)
            };
            match self.field(type_name, definition, inherited.as_ref().unwrap_or(own)) {
                Ok(field) => {
                    fields.insert(field.name.clone(), field);
                }
                Err(error) => self.errors.push(error),
            }
        }
        fields
    }

    /// Directives of the `@relationship` field an implemented interface declares under the
    /// same name, searching inherited interfaces too.
    fn inherited_relationship(&self, type_name: &Name, field_name: &Name) -> Option<ast::DirectiveList> {
        let mut pending: Vec<Name> = self.concepts.get(type_name)?.interfaces.clone();
        let mut visited = IndexSet::default();
        while let Some(interface) = pending.pop() {
            if !visited.insert(interface.clone()) {
                continue;
            }
            if let Some(ExtendedType::Interface(definition)) = self.source.types.get(&interface) {
                let declared = definition
                    .fields
                    .get(field_name)
                    .filter(|field| field.directives.has(&directives::RELATIONSHIP));
                if let Some(field) = declared {
                    return Some(field.directives.clone());
                }
            }
            if let Some(entity) = self.interfaces.get(&interface) {
                pending.extend(entity.interfaces.iter().cloned());
            }
        }
        None
    }

    fn interface_fields(&mut self, interface: &InterfaceType) -> IndexMap<Name, Field> {
        let mut fields = IndexMap::default();
        for definition in interface.fields.values() {
            let declared = definition.directives.get(&directives::DECLARE_RELATIONSHIP);
            let result = match declared {
                // The relationship is declared here and defined by the implementations.
                Some(_) => self.declared_relationship(interface, definition),
                None => self.field(&interface.name, definition, &definition.directives),
            };
            match result {
                Ok(field) => {
                    fields.insert(field.name.clone(), field);
                }
                Err(error) => self.errors.push(error),
            }
        }
        fields
    }

    fn declared_relationship(
        &self,
        interface: &InterfaceType,
        definition: &FieldDefinition,
    ) -> Result<Field, SingleValidationError> {
        let implementations = self
            .interfaces
            .get(&interface.name)
            .map(|i| i.implementations.clone())
            .unwrap_or_default();
        for implementation in &implementations {
            let Some(ExtendedType::Object(object)) = self.source.types.get(implementation) else {
                continue;
            };
            let Some(implemented) = object.fields.get(&definition.name) else {
                continue;
            };
            if implemented.directives.has(&directives::RELATIONSHIP) {
                let mut field = self.field(&object.name, implemented, &implemented.directives)?;
                field.description = definition.description.clone();
                field.passthrough = passthrough_ast(&definition.directives);
                return Ok(field);
            }
        }
        Err(SingleValidationError::InvalidTypeDefinitions {
            message: format!(
                "@declareRelationship field \"{}.{}\" is not implemented with @relationship by any type",
                interface.name, definition.name
            ),
        })
    }

    /// Relationships defined on an interface field with `@relationship` apply to every
    /// implementation that does not redefine them.
    fn inherit_interface_relationships(&mut self) {
        let inherited: Vec<(Name, Field)> = self
            .interfaces
            .values()
            .flat_map(|interface| {
                interface
                    .fields
                    .values()
                    .filter(|f| f.relationship().is_some())
                    .flat_map(|f| {
                        interface
                            .implementations
                            .iter()
                            .map(|i| (i.clone(), f.clone()))
                    })
            })
            .collect();
        for (concept, field) in inherited {
            let Some(concept) = self.concepts.get_mut(&concept) else {
                continue;
            };
            let replace = concept
                .fields
                .get(&field.name)
                .is_some_and(|existing| existing.relationship().is_none());
            if replace {
                concept.fields.insert(field.name.clone(), field);
            }
        }
    }

    fn check_duplicate_relationships(&mut self) {
        for concept in self.concepts.values() {
            let mut seen: IndexMap<(String, Direction, Name), Name> = IndexMap::default();
            for relationship in concept.relationships() {
                let key = (
                    relationship.rel_type.clone(),
                    relationship.direction,
                    relationship.target.name().clone(),
                );
                if let Some(first) = seen.get(&key) {
                    self.errors.push(SingleValidationError::DuplicateRelationship {
                        type_name: concept.name.clone(),
                        rel_type: relationship.rel_type.clone(),
                        direction: relationship.direction.to_string(),
                        target: relationship.target.name().clone(),
                        first_field: first.clone(),
                        second_field: relationship.field_name.clone(),
                    });
                } else {
                    seen.insert(key, relationship.field_name.clone());
                }
            }
        }
    }

    fn jwt_claims(&mut self, type_name: &Name, object: &ObjectType) -> IndexMap<Name, JwtClaim> {
        let mut claims = IndexMap::default();
        for definition in object.fields.values() {
            let field = match self.field(type_name, definition, &definition.directives) {
                Ok(field) if field.is_attribute() => field,
                Ok(field) => {
                    self.errors.push(SingleValidationError::InvalidTypeDefinitions {
                        message: format!("JWT claim \"{}\" must be a scalar", field.name),
                    });
                    continue;
                }
                Err(error) => {
                    self.errors.push(error);
                    continue;
                }
            };
            let path = match definition.directives.get(&directives::JWT_CLAIM) {
                Some(directive) => {
                    match DirectiveArguments::new(directive, format!("{type_name}.{}", field.name))
                        .required_string("path")
                    {
                        Ok(path) => split_claim_path(&path),
                        Err(error) => {
                            self.errors.push(error);
                            continue;
                        }
                    }
                }
                None => vec![field.name.to_string()],
            };
            claims.insert(field.name.clone(), JwtClaim { field, path });
        }
        claims
    }

    fn collect_custom_root_fields(&mut self, source: &Schema) {
        let (query, mutation, _) = self.root_names();
        for (root, is_query) in [(query, true), (mutation, false)] {
            let Some(ExtendedType::Object(object)) = source.types.get(&root) else {
                continue;
            };
            for definition in object.fields.values() {
                let location = format!("{root}.{}", definition.name);
                let kind = match definition.directives.get(&directives::CYPHER) {
                    Some(directive) => match cypher_annotation(directive, &location) {
                        Ok(cypher) => FieldKind::Cypher(cypher),
                        Err(error) => {
                            self.errors.push(error);
                            continue;
                        }
                    },
                    None => FieldKind::Attribute(self.category(definition.ty.inner_named_type())),
                };
                let field = Field {
                    kind,
                    ..plain_field(definition, &definition.directives)
                };
                let custom = CustomRootField {
                    field,
                    definition: definition.node.clone(),
                };
                if is_query {
                    self.custom_queries.insert(definition.name.clone(), custom);
                } else {
                    self.custom_mutations.insert(definition.name.clone(), custom);
                }
            }
        }
    }

    fn category(&self, type_name: &str) -> ScalarCategory {
        let is_enum = matches!(self.source.types.get(type_name), Some(ExtendedType::Enum(_)));
        ScalarCategory::from_type_name(type_name, is_enum)
    }

    fn is_node_like(&self, type_name: &str) -> bool {
        self.concepts.contains_key(type_name)
            || self.interfaces.contains_key(type_name)
            || self.unions.contains_key(type_name)
    }

    fn field(
        &self,
        type_name: &Name,
        definition: &FieldDefinition,
        directive_list: &ast::DirectiveList,
    ) -> Result<Field, SingleValidationError> {
        let location = format!("{type_name}.{}", definition.name);
        let mut field = plain_field(definition, directive_list);
        let target = definition.ty.inner_named_type();
        if let Some(directive) = directive_list.get(&directives::RELATIONSHIP) {
            let relationship = self.relationship(type_name, definition, directive, &location)?;
            field.kind = FieldKind::Relationship(Box::new(relationship));
            return Ok(field);
        }
        if let Some(directive) = directive_list.get(&directives::CYPHER) {
            field.kind = FieldKind::Cypher(cypher_annotation(directive, &location)?);
            return Ok(field);
        }
        if self.is_node_like(target) {
            return Err(SingleValidationError::InvalidTypeDefinitions {
                message: format!(
                    "field \"{location}\" of type \"{target}\" needs a @relationship or @cypher directive"
                ),
            });
        }
        match self.source.types.get(target) {
            Some(ExtendedType::Scalar(_) | ExtendedType::Enum(_)) => {}
            // Temporal and big integer scalars are provided by the generated schema.
            None if self.category(target) != ScalarCategory::Other => {}
            _ => {
                return Err(SingleValidationError::InvalidTypeDefinitions {
                    message: format!("field \"{location}\" has unsupported type \"{target}\""),
                });
            }
        }
        field.kind = FieldKind::Attribute(self.category(target));
        if let Some(directive) = directive_list.get(&directives::ALIAS) {
            field.db_property = DirectiveArguments::new(directive, location.as_str())
                .required_string("property")?;
        }
        if let Some(directive) = directive_list.get(&directives::ID) {
            let args = DirectiveArguments::new(directive, location.as_str());
            field.autogenerate = args.optional_bool("autogenerate")?.unwrap_or(true);
            field.unique = args.optional_bool("unique")?.unwrap_or(true);
        }
        if directive_list.get(&directives::UNIQUE).is_some() {
            field.unique = true;
        }
        if let Some(directive) = directive_list.get(&directives::DEFAULT) {
            let args = DirectiveArguments::new(directive, location.as_str());
            field.default = args.json("value")?;
            if field.default.is_none() {
                return Err(args.error("value", "a value is required"));
            }
        }
        if let Some(directive) = directive_list.get(&directives::TIMESTAMP) {
            let args = DirectiveArguments::new(directive, location.as_str());
            let operations = args
                .enum_list("operations")?
                .unwrap_or_else(|| vec![name!("CREATE"), name!("UPDATE")]);
            for operation in operations {
                field.timestamps.push(match operation.as_str() {
                    "CREATE" => TimestampOperation::Create,
                    "UPDATE" => TimestampOperation::Update,
                    other => {
                        return Err(args.error("operations", format!("unknown operation {other}")));
                    }
                });
            }
        }
        Ok(field)
    }

    fn relationship(
        &self,
        type_name: &Name,
        definition: &FieldDefinition,
        directive: &ast::Directive,
        location: &str,
    ) -> Result<Relationship, SingleValidationError> {
        let args = DirectiveArguments::new(directive, location);
        let rel_type = args.required_string("type")?;
        let direction = match args.optional_enum("direction")?.as_ref().map(Name::as_str) {
            Some("IN") => Direction::In,
            Some("OUT") => Direction::Out,
            Some(other) => {
                return Err(args.error("direction", format!("expected IN or OUT, got {other}")));
            }
            None => return Err(args.error("direction", "a direction is required")),
        };
        let query_direction = match args.optional_enum("queryDirection")?.as_ref().map(Name::as_str) {
            None | Some("DIRECTED" | "DEFAULT_DIRECTED") => QueryDirection::Directed,
            Some("UNDIRECTED" | "DEFAULT_UNDIRECTED") => QueryDirection::Undirected,
            Some(other) => {
                return Err(args.error("queryDirection", format!("unknown direction {other}")));
            }
        };
        let properties = match args.optional_string("properties")? {
            Some(properties) => match self.relationship_properties.get(properties.as_str()) {
                Some(found) => Some(found.name.clone()),
                None => {
                    return Err(SingleValidationError::MissingRelationshipProperties {
                        type_name: type_name.clone(),
                        field_name: definition.name.clone(),
                        properties,
                    });
                }
            },
            None => None,
        };
        let target_name = definition.ty.inner_named_type();
        let target = if self.concepts.contains_key(target_name) {
            Target::Concept(target_name.clone())
        } else if let Some(interface) = self.interfaces.get(target_name) {
            Target::Interface {
                name: target_name.clone(),
                implementations: interface.implementations.clone(),
            }
        } else if let Some(union) = self.unions.get(target_name) {
            Target::Union {
                name: target_name.clone(),
                members: union.members.clone(),
            }
        } else {
            return Err(SingleValidationError::UnknownRelationshipTarget {
                type_name: type_name.clone(),
                field_name: definition.name.clone(),
                target: target_name.clone(),
            });
        };
        let resolvable = self
            .concepts
            .get(target_name)
            .is_none_or(ConceptType::is_resolvable);
        Ok(Relationship {
            field_name: definition.name.clone(),
            rel_type,
            direction,
            query_direction,
            properties,
            target,
            is_list: definition.ty.is_list(),
            is_required: !definition.ty.is_list() && definition.ty.is_non_null(),
            aggregate: args.optional_bool("aggregate")?.unwrap_or(true),
            resolvable,
        })
    }
}

fn plain_field(definition: &FieldDefinition, directive_list: &ast::DirectiveList) -> Field {
    Field {
        name: definition.name.clone(),
        ty: definition.ty.clone(),
        description: definition.description.clone(),
        kind: FieldKind::Attribute(ScalarCategory::Other),
        db_property: definition.name.to_string(),
        default: None,
        autogenerate: false,
        unique: false,
        timestamps: Vec::new(),
        authorization: None,
        authentication: None,
        passthrough: passthrough_ast(directive_list),
        arguments: definition.arguments.clone(),
    }
}

fn cypher_annotation(
    directive: &ast::Directive,
    location: &str,
) -> Result<CypherAnnotation, SingleValidationError> {
    let args = DirectiveArguments::new(directive, location);
    Ok(CypherAnnotation {
        statement: args.required_string("statement")?,
        column_name: args.required_string("columnName")?,
    })
}

fn passthrough(list: &apollo_compiler::schema::DirectiveList) -> apollo_compiler::schema::DirectiveList {
    apollo_compiler::schema::DirectiveList(
        list.iter()
            .filter(|d| !directives::is_library_directive(&d.name))
            .cloned()
            .collect(),
    )
}

fn passthrough_ast(list: &ast::DirectiveList) -> ast::DirectiveList {
    ast::DirectiveList(
        list.iter()
            .filter(|d| !directives::is_library_directive(&d.name))
            .cloned()
            .collect(),
    )
}

/// The top level field names of a federation field set: `"id org { id }"` gives `id`, `org`.
fn top_level_fields(fields: &str) -> Vec<String> {
    let mut depth = 0usize;
    let mut names = Vec::new();
    let spaced = fields.replace('{', " { ").replace('}', " } ");
    for token in spaced.split_whitespace() {
        match token {
            "{" => depth += 1,
            "}" => depth = depth.saturating_sub(1),
            name if depth == 0 => names.push(name.to_owned()),
            _ => {}
        }
    }
    names
}

/// Splits a claim path on dots, keeping escaped dots (`\.`) in the segment.
fn split_claim_path(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'.') => {
                current.push('.');
                chars.next();
            }
            '.' => segments.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    segments.push(current);
    segments
}

fn attach_rules(model: &mut TypeModel) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let mut pending = Vec::new();
    {
        let parser = RuleParser::new(model);
        let source = &model.source;
        for concept in model.concepts.values() {
            let Some(ExtendedType::Object(object)) = source.types.get(&concept.name) else {
                continue;
            };
            let entity = Entity::Concept(concept);
            let location = concept.name.as_str();
            if let Some(directive) = object.directives.get(&directives::AUTHORIZATION) {
                match parser.authorization(directive, entity, location) {
                    Ok(rule) => pending.push(PendingRule::TypeAuthorization(concept.name.clone(), rule)),
                    Err(error) => errors.push(error),
                }
            }
            if let Some(directive) = object.directives.get(&directives::AUTHENTICATION) {
                match parser.authentication(directive, location) {
                    Ok(rule) => pending.push(PendingRule::TypeAuthentication(concept.name.clone(), rule)),
                    Err(error) => errors.push(error),
                }
            }
            if let Some(directive) = object.directives.get(&directives::SUBSCRIPTIONS_AUTHORIZATION) {
                match parser.subscriptions_authorization(directive, entity, location) {
                    Ok(rule) => pending.push(PendingRule::TypeSubscriptions(concept.name.clone(), rule)),
                    Err(error) => errors.push(error),
                }
            }
            for definition in object.fields.values() {
                let location = format!("{}.{}", concept.name, definition.name);
                if let Some(directive) = definition.directives.get(&directives::AUTHORIZATION) {
                    match parser.authorization(directive, entity, &location) {
                        Ok(rule) => pending.push(PendingRule::FieldAuthorization(
                            concept.name.clone(),
                            definition.name.clone(),
                            rule,
                        )),
                        Err(error) => errors.push(error),
                    }
                }
                if let Some(directive) = definition.directives.get(&directives::AUTHENTICATION) {
                    match parser.authentication(directive, &location) {
                        Ok(rule) => pending.push(PendingRule::FieldAuthentication(
                            concept.name.clone(),
                            definition.name.clone(),
                            rule,
                        )),
                        Err(error) => errors.push(error),
                    }
                }
            }
        }
        for interface in model.interfaces.values() {
            let Some(ExtendedType::Interface(definition)) = source.types.get(&interface.name) else {
                continue;
            };
            if let Some(directive) = definition.directives.get(&directives::AUTHORIZATION) {
                match parser.authorization(directive, Entity::Interface(interface), interface.name.as_str()) {
                    Ok(rule) => pending.push(PendingRule::InterfaceAuthorization(interface.name.clone(), rule)),
                    Err(error) => errors.push(error),
                }
            }
        }
    }
    errors.into_result()?;
    for rule in pending {
        match rule {
            PendingRule::TypeAuthorization(name, rule) => {
                if let Some(concept) = model.concepts.get_mut(&name) {
                    concept.authorization = Some(rule);
                }
            }
            PendingRule::TypeAuthentication(name, rule) => {
                if let Some(concept) = model.concepts.get_mut(&name) {
                    concept.authentication = Some(rule);
                }
            }
            PendingRule::TypeSubscriptions(name, rule) => {
                if let Some(concept) = model.concepts.get_mut(&name) {
                    concept.subscriptions_authorization = Some(rule);
                }
            }
            PendingRule::InterfaceAuthorization(name, rule) => {
                if let Some(interface) = model.interfaces.get_mut(&name) {
                    interface.authorization = Some(rule);
                }
            }
            PendingRule::FieldAuthorization(type_name, field, rule) => {
                if let Some(field) = model
                    .concepts
                    .get_mut(&type_name)
                    .and_then(|c| c.fields.get_mut(&field))
                {
                    field.authorization = Some(rule);
                }
            }
            PendingRule::FieldAuthentication(type_name, field, rule) => {
                if let Some(field) = model
                    .concepts
                    .get_mut(&type_name)
                    .and_then(|c| c.fields.get_mut(&field))
                {
                    field.authentication = Some(rule);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::auth::rules::AuthorizationOperation;

    fn build(type_defs: &str) -> Result<TypeModel, ValidationErrors> {
        TypeModelBuilder::build(type_defs)
    }

    #[test]
    fn resolves_concepts_and_relationships() {
        let model = build(
            r#"
            type Movie @node(labels: ["Movie", "Film"]) @plural(value: "films") {
                id: ID! @id
                title: String! @alias(property: "movie_title")
                actors: [Actor!]! @relationship(type: "ACTED_IN", direction: IN, properties: "ActedIn")
                director: Person @relationship(type: "DIRECTED", direction: IN, queryDirection: UNDIRECTED)
                score: Float @cypher(statement: "RETURN 1.0 AS s", columnName: "s")
            }
            type Actor { name: String! }
            type Person { name: String! @unique }
            type ActedIn @relationshipProperties { role: String }
            "#,
        )
        .unwrap();
        let movie = model.concept("Movie").unwrap();
        assert_eq!(movie.labels, vec!["Movie", "Film"]);
        assert_eq!(movie.plural, "films");
        assert_eq!(movie.label_string(), ":Movie:Film");
        assert_eq!(movie.fields["title"].db_property, "movie_title");
        assert!(movie.fields["id"].autogenerate);
        assert!(movie.fields["score"].cypher().is_some());

        let actors = movie.fields["actors"].relationship().unwrap();
        assert_eq!(actors.rel_type, "ACTED_IN");
        assert_eq!(actors.direction, Direction::In);
        assert_eq!(actors.properties, Some(name!("ActedIn")));
        assert!(actors.is_list);

        let director = movie.fields["director"].relationship().unwrap();
        assert!(!director.is_list);
        assert_eq!(director.query_direction, QueryDirection::Undirected);

        assert_eq!(model.concept("Actor").unwrap().plural, "actors");
        assert!(model.concept("Person").unwrap().fields["name"].unique);
    }

    #[test]
    fn resolves_abstract_targets_to_their_closed_set() {
        let model = build(
            r#"
            interface Production { title: String! }
            type Movie implements Production { title: String! }
            type Series implements Production { title: String! episodes: Int }
            union Search = Movie | Series
            type Actor {
                actedIn: [Production!]! @relationship(type: "ACTED_IN", direction: OUT)
                found: [Search!]! @relationship(type: "FOUND", direction: OUT)
            }
            "#,
        )
        .unwrap();
        let actor = model.concept("Actor").unwrap();
        assert_eq!(
            actor.fields["actedIn"].relationship().unwrap().target.concrete_types(),
            &[name!("Movie"), name!("Series")]
        );
        assert_eq!(
            actor.fields["found"].relationship().unwrap().target,
            Target::Union {
                name: name!("Search"),
                members: vec![name!("Movie"), name!("Series")]
            }
        );
        assert_eq!(model.concept("Movie").unwrap().unions, vec![name!("Search")]);
        assert_eq!(model.interfaces["Production"].plural, "productions");
    }

    #[test]
    fn interface_relationships_are_inherited() {
        let model = build(
            r#"
            interface Production {
                actors: [Actor!]! @relationship(type: "ACTED_IN", direction: IN)
            }
            type Movie implements Production { title: String actors: [Actor!]! }
            type Actor { name: String }
            "#,
        )
        .unwrap();
        let movie = model.concept("Movie").unwrap();
        assert_eq!(movie.fields["actors"].relationship().unwrap().rel_type, "ACTED_IN");
    }

    #[test]
    fn reports_every_problem() {
        let errors = build(
            r#"
            type Movie {
                actors: [Actor!]! @relationship(type: "ACTED_IN", direction: IN, properties: "Missing")
                a: [Person!]! @relationship(type: "KNOWS", direction: OUT)
                b: [Person!]! @relationship(type: "KNOWS", direction: OUT)
                c: Person @relationship(type: "KNOWS", direction: SIDEWAYS)
                d: Nowhere @relationship(type: "X", direction: OUT)
            }
            type Actor { name: String }
            type Person { name: String }
            interface A implements B { id: ID }
            interface B implements A { id: ID }
            "#,
        )
        .unwrap_err();
        let codes: Vec<&str> = errors.errors.iter().map(|e| e.code()).collect();
        assert!(codes.contains(&"MISSING_RELATIONSHIP_PROPERTIES"), "{codes:?}");
        assert!(codes.contains(&"DUPLICATE_RELATIONSHIP"), "{codes:?}");
        assert!(codes.contains(&"INVALID_DIRECTIVE_ARGUMENT"), "{codes:?}");
        assert!(codes.contains(&"CIRCULAR_INTERFACE_IMPLEMENTATION"), "{codes:?}");
        assert!(codes.contains(&"UNKNOWN_RELATIONSHIP_TARGET"), "{codes:?}");
    }

    #[test]
    fn parses_rules_against_the_model() {
        let model = build(
            r#"
            type JWT @jwt { roles: [String!]! @jwtClaim(path: "realm.roles") }
            type User @authorization(
                filter: [{ where: { node: { id: "$jwt.sub" } } }]
                validate: [{ operations: [DELETE], where: { jwt: { roles_INCLUDES: "admin" } } }]
            ) @authentication(operations: [DELETE]) {
                id: ID!
                password: String @authorization(filter: [{ operations: [READ], where: { node: { id: "$jwt.sub" } } }])
            }
            "#,
        )
        .unwrap();
        let jwt = model.jwt.as_ref().unwrap();
        assert_eq!(jwt.claims["roles"].path, vec!["realm", "roles"]);

        let user = model.concept("User").unwrap();
        let authorization = user.authorization.as_ref().unwrap();
        assert_eq!(authorization.filters_for(AuthorizationOperation::Read).count(), 1);
        assert_eq!(authorization.filters_for(AuthorizationOperation::Create).count(), 0);
        assert!(user.authentication.as_ref().unwrap().applies_to(AuthorizationOperation::Delete));
        assert!(user.fields["password"].authorization.is_some());
    }

    #[test]
    fn rules_referencing_unknown_fields_are_rejected() {
        let errors = build(
            r#"
            type User @authorization(filter: [{ where: { node: { nope: "$jwt.sub" } } }]) {
                id: ID!
            }
            "#,
        )
        .unwrap_err();
        assert_eq!(errors.errors[0].code(), "INVALID_AUTHORIZATION_RULE");
    }

    #[test]
    fn entity_keys() {
        let model = build(
            r#"
            type User @key(fields: "id") { id: ID! name: String }
            type Org @key(fields: "id", resolvable: false) { id: ID! }
            "#,
        )
        .unwrap();
        assert_eq!(model.concept("User").unwrap().keys[0].field_names, vec![name!("id")]);
        assert!(!model.concept("Org").unwrap().is_resolvable());
    }

    #[test]
    fn claim_paths() {
        assert_eq!(split_claim_path("a.b"), vec!["a", "b"]);
        assert_eq!(
            split_claim_path(r"https://example\.com/roles"),
            vec!["https://example.com/roles"]
        );
        assert_eq!(top_level_fields("id org { id }"), vec!["id", "org"]);
    }
}
