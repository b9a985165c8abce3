//! Node, connection and aggregation types, and the query and mutation root fields.
use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast::FieldDefinition;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::ComponentName;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::InterfaceType;
use apollo_compiler::schema::ObjectType;
use apollo_compiler::schema::UnionType;

use super::SchemaWriter;
use super::argument;
use super::list;
use super::named;
use super::naming;
use super::output_field;
use super::required;
use super::required_list;
use crate::model::ConceptType;
use crate::model::Entity;
use crate::model::Field;
use crate::model::FieldKind;
use crate::model::Relationship;
use crate::model::ScalarCategory;
use crate::model::Target;
use crate::translate::RootField;

fn int_field(name: &str) -> Component<FieldDefinition> {
    output_field(name, required("Int"), Vec::new())
}

impl<'a> SchemaWriter<'a> {
    /// Object types of node types and relationship properties, interfaces and unions.
    pub(super) fn node_types(&mut self) {
        let model = self.model;
        for concept in model.concepts.values() {
            self.concept_object(concept);
        }
        for interface in model.interfaces.values() {
            let fields = interface
                .fields
                .values()
                .map(|field| (field.name.clone(), self.declared_field(field)))
                .collect();
            let definition = InterfaceType {
                description: interface.description.clone(),
                name: interface.name.clone(),
                implements_interfaces: interface
                    .interfaces
                    .iter()
                    .map(|name| ComponentName::from(name.clone()))
                    .collect(),
                directives: self.carried(&interface.passthrough),
                fields,
            };
            self.schema.types.insert(
                interface.name.clone(),
                ExtendedType::Interface(Node::new(definition)),
            );
        }
        for union in model.unions.values() {
            let definition = UnionType {
                description: union.description.clone(),
                name: union.name.clone(),
                directives: self.carried(&union.passthrough),
                members: union
                    .members
                    .iter()
                    .map(|name| ComponentName::from(name.clone()))
                    .collect(),
            };
            self.schema
                .types
                .insert(union.name.clone(), ExtendedType::Union(Node::new(definition)));
        }
        for properties in model.relationship_properties.values() {
            let definition = ObjectType {
                description: properties.description.clone(),
                name: properties.name.clone(),
                implements_interfaces: Default::default(),
                directives: self.carried(&properties.passthrough),
                fields: properties
                    .fields
                    .values()
                    .map(|field| (field.name.clone(), self.declared_field(field)))
                    .collect(),
            };
            self.schema.types.insert(
                properties.name.clone(),
                ExtendedType::Object(Node::new(definition)),
            );
        }
    }

    fn concept_object(&mut self, concept: &'a ConceptType) {
        let mut fields: IndexMap<Name, Component<FieldDefinition>> = concept
            .fields
            .values()
            .map(|field| (field.name.clone(), self.declared_field(field)))
            .collect();
        for relationship in concept.relationships() {
            let field_name = &relationship.field_name;
            let connection = self.connection_field(&concept.name, relationship);
            self.check_field(&concept.name, &connection.name, fields.contains_key(&connection.name));
            fields.insert(connection.name.clone(), connection);
            if !relationship.aggregate || matches!(relationship.target, Target::Union { .. }) {
                continue;
            }
            let Some(selection) = self.relationship_aggregate(&concept.name, relationship) else {
                continue;
            };
            let name = naming::aggregate_field(field_name);
            self.check_field(&concept.name, &name, fields.contains_key(name.as_str()));
            let target_where = self.where_input(relationship.target.name());
            let field = output_field(
                name,
                named(selection),
                vec![argument("where", named(target_where))],
            );
            fields.insert(field.name.clone(), field);
        }
        let definition = ObjectType {
            description: concept.description.clone(),
            name: concept.name.clone(),
            implements_interfaces: concept
                .interfaces
                .iter()
                .filter(|name| self.model.interfaces.contains_key(*name))
                .map(|name| ComponentName::from(name.clone()))
                .collect(),
            directives: self.carried(&concept.passthrough),
            fields,
        };
        self.schema.types.insert(
            concept.name.clone(),
            ExtendedType::Object(Node::new(definition)),
        );
    }

    /// A field as the user declared it. Relationship fields get filtering and pagination
    /// arguments.
    fn declared_field(&mut self, field: &Field) -> Component<FieldDefinition> {
        let arguments = match &field.kind {
            FieldKind::Relationship(relationship) => {
                let target = relationship.target.name();
                vec![
                    argument("where", named(self.where_input(target))),
                    argument("options", named(self.options_input(target))),
                ]
            }
            FieldKind::Attribute(_) | FieldKind::Cypher(_) => field.arguments.clone(),
        };
        Component::new(FieldDefinition {
            description: field.description.clone(),
            name: field.name.clone(),
            arguments,
            ty: field.ty.clone(),
            directives: self.carried_ast(&field.passthrough),
        })
    }

    fn page_info(&mut self) -> Option<Name> {
        self.object(naming::PAGE_INFO.to_owned(), |_| {
            vec![
                output_field("hasNextPage", required("Boolean"), Vec::new()),
                output_field("hasPreviousPage", required("Boolean"), Vec::new()),
                output_field("startCursor", named("String"), Vec::new()),
                output_field("endCursor", named("String"), Vec::new()),
            ]
        })
    }

    /// `<field>Connection`: cursor pagination over a relationship field.
    fn connection_field(
        &mut self,
        owner: &Name,
        relationship: &Relationship,
    ) -> Component<FieldDefinition> {
        let field_name = &relationship.field_name;
        let target = relationship.target.name();
        let connection_where = self.connection_where(owner, relationship);
        let connection_sort = self.connection_sort(owner, relationship);
        let properties = relationship.properties.clone();
        let edge = self.object(naming::relationship(owner, field_name), |_| {
            let mut fields = vec![
                output_field("cursor", required("String"), Vec::new()),
                output_field("node", required(target), Vec::new()),
            ];
            if let Some(properties) = properties {
                fields.push(output_field("properties", required(properties), Vec::new()));
            }
            fields
        });
        let connection = self.connection_type(naming::connection(owner, field_name), edge);
        let mut arguments = vec![
            argument("where", named(connection_where)),
            argument("first", named("Int")),
            argument("after", named("String")),
        ];
        if let Some(sort) = connection_sort {
            arguments.push(argument("sort", list(sort)));
        }
        output_field(
            naming::connection_field(field_name),
            required(connection),
            arguments,
        )
    }

    /// `{ edges, totalCount, pageInfo }`
    fn connection_type(&mut self, name: String, edge: Option<Name>) -> Name {
        let page_info = self.page_info();
        let fallback = crate::utils::generated_name(&name);
        self.object(name, |_| {
            let mut fields = Vec::new();
            if let Some(edge) = edge {
                fields.push(output_field("edges", required_list(edge), Vec::new()));
            }
            fields.push(int_field("totalCount"));
            if let Some(page_info) = page_info {
                fields.push(output_field("pageInfo", required(page_info), Vec::new()));
            }
            fields
        })
        .unwrap_or(fallback)
    }

    /// `<Type><Field>ConnectionSort`: sorting connection edges by node or properties.
    fn connection_sort(&mut self, owner: &Name, relationship: &Relationship) -> Option<Name> {
        let node = self.sort_input(relationship.target.name());
        let edge = match &relationship.properties {
            Some(properties) => self.sort_input(properties),
            None => None,
        };
        if node.is_none() && edge.is_none() {
            return None;
        }
        let name = naming::relationship_input(owner, &relationship.field_name, "ConnectionSort");
        Some(self.input_object(name, |_| {
            let mut entries = Vec::new();
            entries.extend(node.map(|node| super::entry("node", named(node))));
            entries.extend(edge.map(|edge| super::entry("edge", named(edge))));
            entries
        }))
    }

    /// The selection type of one aggregated field category.
    fn field_aggregate(&mut self, category: ScalarCategory) -> Option<Name> {
        let name = naming::field_aggregate(category)?;
        let (value, average, sum): (&str, Option<&str>, Option<&str>) = match category {
            ScalarCategory::String | ScalarCategory::Id => {
                let ty = if category == ScalarCategory::Id { "ID" } else { "String" };
                return self.object(name.to_owned(), |_| {
                    vec![
                        output_field("longest", named(ty), Vec::new()),
                        output_field("shortest", named(ty), Vec::new()),
                    ]
                });
            }
            ScalarCategory::Int => ("Int", Some("Float"), Some("Int")),
            ScalarCategory::Float => ("Float", Some("Float"), Some("Float")),
            ScalarCategory::BigInt => ("BigInt", Some("BigInt"), Some("BigInt")),
            _ => ("DateTime", None, None),
        };
        self.object(name.to_owned(), |_| {
            let mut fields = vec![
                output_field("min", named(value), Vec::new()),
                output_field("max", named(value), Vec::new()),
            ];
            fields.extend(average.map(|ty| output_field("average", named(ty), Vec::new())));
            fields.extend(sum.map(|ty| output_field("sum", named(ty), Vec::new())));
            fields
        })
    }

    /// One field per aggregatable attribute of `entity`.
    fn aggregate_fields(&mut self, entity: Entity<'a>) -> Vec<Component<FieldDefinition>> {
        let mut fields = Vec::new();
        for field in entity.fields().filter(|f| !f.is_list()) {
            let Some(category) = field.scalar_category() else {
                continue;
            };
            if let Some(selection) = self.field_aggregate(category) {
                fields.push(output_field(&field.name, required(selection), Vec::new()));
            }
        }
        fields
    }

    /// `<Type><Target><Field>AggregationSelection`.
    fn relationship_aggregate(&mut self, owner: &Name, relationship: &Relationship) -> Option<Name> {
        let model = self.model;
        let field_name = &relationship.field_name;
        let target = relationship.target.name();
        let node = match model.entity(target) {
            Some(entity) => self.object(naming::node_aggregate(owner, target, field_name), |writer| {
                writer.aggregate_fields(entity)
            }),
            None => None,
        };
        let edge = match relationship.properties.as_ref().and_then(|p| model.entity(p)) {
            Some(entity) => self.object(naming::edge_aggregate(owner, target, field_name), |writer| {
                writer.aggregate_fields(entity)
            }),
            None => None,
        };
        self.object(naming::relationship_aggregate(owner, target, field_name), |_| {
            let mut fields = vec![int_field("count")];
            fields.extend(node.map(|node| output_field("node", named(node), Vec::new())));
            fields.extend(edge.map(|edge| output_field("edge", named(edge), Vec::new())));
            fields
        })
    }

    /// `plural`, `pluralConnection` and `pluralAggregate` of a node type or interface.
    fn read_fields(&mut self, type_name: &'a Name, plural: &str) {
        let model = self.model;
        let Some(entity) = model.entity(type_name) else {
            return;
        };
        let where_input = self.where_input(type_name);
        let options = self.options_input(type_name);
        self.add_query(
            output_field(
                plural,
                required_list(type_name),
                vec![
                    argument("where", named(&where_input)),
                    argument("options", named(options)),
                ],
            ),
            RootField::Read(type_name.clone()),
        );

        let edge = self.object(naming::root_edge(type_name), |_| {
            vec![
                output_field("cursor", required("String"), Vec::new()),
                output_field("node", required(type_name), Vec::new()),
            ]
        });
        let connection = self.connection_type(naming::root_connection(plural), edge);
        let mut arguments = vec![
            argument("where", named(&where_input)),
            argument("first", named("Int")),
            argument("after", named("String")),
        ];
        if let Some(sort) = self.sort_input(type_name) {
            arguments.push(argument("sort", list(sort)));
        }
        self.add_query(
            output_field(
                naming::connection_field(plural),
                required(connection),
                arguments,
            ),
            RootField::Connection(type_name.clone()),
        );

        let selection = self
            .object(naming::aggregate_selection(type_name), |writer| {
                let mut fields = vec![int_field("count")];
                fields.extend(writer.aggregate_fields(entity));
                fields
            })
            .unwrap_or_else(|| crate::utils::generated_name(naming::aggregate_selection(type_name)));
        self.add_query(
            output_field(
                naming::aggregate_field(plural),
                required(selection),
                vec![argument("where", named(where_input))],
            ),
            RootField::Aggregate(type_name.clone()),
        );
    }

    fn mutation_fields(&mut self, concept: &'a ConceptType) {
        let plural = concept.plural.as_str();
        let name = &concept.name;

        let create_info = self.object(naming::CREATE_INFO.to_owned(), |_| {
            vec![int_field("nodesCreated"), int_field("relationshipsCreated")]
        });
        if let (Some(input), Some(info)) = (self.create_input(name), create_info) {
            let response = self.object(naming::create_response(plural), |_| {
                vec![
                    output_field("info", required(info), Vec::new()),
                    output_field(plural, required_list(name), Vec::new()),
                ]
            });
            if let Some(response) = response {
                self.add_mutation(
                    output_field(
                        naming::create_field(plural),
                        required(response),
                        vec![argument("input", required_list(input))],
                    ),
                    RootField::Create(name.clone()),
                );
            }
        }

        let where_input = self.where_input(name);
        let update_info = self.object(naming::UPDATE_INFO.to_owned(), |_| {
            vec![
                int_field("nodesCreated"),
                int_field("nodesDeleted"),
                int_field("relationshipsCreated"),
                int_field("relationshipsDeleted"),
            ]
        });
        if let (Some(update), Some(info)) = (self.update_input(name), update_info) {
            let response = self.object(naming::update_response(plural), |_| {
                vec![
                    output_field("info", required(info), Vec::new()),
                    output_field(plural, required_list(name), Vec::new()),
                ]
            });
            if let Some(response) = response {
                self.add_mutation(
                    output_field(
                        naming::update_field(plural),
                        required(response),
                        vec![
                            argument("where", named(&where_input)),
                            argument("update", named(update)),
                        ],
                    ),
                    RootField::Update(name.clone()),
                );
            }
        }

        let delete_info = self.object(naming::DELETE_INFO.to_owned(), |_| {
            vec![int_field("nodesDeleted"), int_field("relationshipsDeleted")]
        });
        if let Some(info) = delete_info {
            let mut arguments = vec![argument("where", named(where_input))];
            if let Some(delete) = self.delete_input(concept) {
                arguments.push(argument("delete", named(delete)));
            }
            self.add_mutation(
                output_field(naming::delete_field(plural), required(info), arguments),
                RootField::Delete(name.clone()),
            );
        }
    }

    /// A user declared root field, without the library's directives.
    fn custom_field(&self, definition: &Node<FieldDefinition>) -> Component<FieldDefinition> {
        Component::new(FieldDefinition {
            directives: self.carried_ast(&definition.directives),
            ..FieldDefinition::clone(definition)
        })
    }

    /// Root fields of every node type, interface and union, then the user's own.
    pub(super) fn root_fields(&mut self) {
        let model = self.model;
        for concept in model.concepts.values().filter(|c| c.is_resolvable()) {
            self.read_fields(&concept.name, &concept.plural);
        }
        for interface in model.interfaces.values() {
            if !interface.implementations.is_empty() {
                self.read_fields(&interface.name, &interface.plural);
            }
        }
        for union in model.unions.values() {
            if union.members.is_empty() {
                continue;
            }
            let where_input = self.where_input(&union.name);
            let options = self.options_input(&union.name);
            self.add_query(
                output_field(
                    &union.plural,
                    required_list(&union.name),
                    vec![
                        argument("where", named(where_input)),
                        argument("options", named(options)),
                    ],
                ),
                RootField::Read(union.name.clone()),
            );
        }
        for concept in model.concepts.values().filter(|c| c.is_resolvable()) {
            self.mutation_fields(concept);
        }

        for (name, custom) in &model.custom_queries {
            let root = match custom.field.cypher() {
                Some(_) => RootField::Cypher {
                    field: name.clone(),
                    mutation: false,
                },
                None => RootField::Resolver(name.clone()),
            };
            self.queries.insert(name.clone(), root);
            let field = self.custom_field(&custom.definition);
            self.query_fields.insert(name.clone(), field);
        }
        for (name, custom) in &model.custom_mutations {
            let root = match custom.field.cypher() {
                Some(_) => RootField::Cypher {
                    field: name.clone(),
                    mutation: true,
                },
                None => RootField::Resolver(name.clone()),
            };
            self.mutations.insert(name.clone(), root);
            let field = self.custom_field(&custom.definition);
            self.mutation_fields.insert(name.clone(), field);
        }
    }
}

#[cfg(test)]
mod tests {
    use apollo_compiler::name;
    use apollo_compiler::schema::ExtendedType;

    use super::*;
    use crate::config::Features;
    use crate::model::TypeModel;
    use crate::schema::augment;

    #[test]
    fn aggregation_types_follow_field_categories() {
        let model = TypeModel::build(
            r#"
            type Movie {
                title: String
                runtime: Int
                rating: Float
                budget: BigInt
                released: DateTime
                tags: [String!]
                actors: [Actor!]! @relationship(type: "ACTED_IN", direction: IN)
            }
            type Actor { name: String }
            "#,
        )
        .unwrap();
        let augmented = augment(&model, &Features::default(), false).unwrap();
        let schema = &augmented.schema;
        let Some(ExtendedType::Object(selection)) = schema.types.get("MovieAggregateSelection")
        else {
            panic!("no MovieAggregateSelection");
        };
        let fields: Vec<_> = selection.fields.keys().map(Name::as_str).collect();
        assert_eq!(fields, ["count", "title", "runtime", "rating", "budget", "released"]);
        assert_eq!(
            schema.type_field("IntAggregateSelection", "average").unwrap().ty.to_string(),
            "Float"
        );
        assert_eq!(
            schema.type_field("BigIntAggregateSelection", "sum").unwrap().ty.to_string(),
            "BigInt"
        );
        assert!(schema.type_field("DateTimeAggregateSelection", "sum").is_err());
        assert_eq!(
            schema.type_field("Movie", "actorsAggregate").unwrap().ty.to_string(),
            "MovieActorActorsAggregationSelection"
        );
    }

    #[test]
    fn non_resolvable_types_get_no_root_fields() {
        let model = TypeModel::build(
            r#"
            type Movie { title: String studio: Studio @relationship(type: "MADE_BY", direction: OUT) }
            type Studio @key(fields: "id", resolvable: false) { id: ID! }
            "#,
        )
        .unwrap();
        let augmented = augment(&model, &Features::default(), true).unwrap();
        assert!(augmented.queries.contains_key("movies"));
        assert!(!augmented.queries.contains_key("studios"));
        assert!(!augmented.mutations.contains_key("createStudios"));
        assert!(augmented.schema.types.contains_key("Studio"));
    }

    #[test]
    fn custom_root_fields_keep_their_arguments() {
        let model = TypeModel::build(
            r#"
            type Movie { title: String }
            type Query {
                topMovies(limit: Int = 3): [Movie!]!
                    @cypher(statement: "MATCH (m:Movie) RETURN m LIMIT $limit", columnName: "m")
                greeting: String
            }
            "#,
        )
        .unwrap();
        let augmented = augment(&model, &Features::default(), false).unwrap();
        assert_eq!(
            augmented.queries.get("topMovies"),
            Some(&RootField::Cypher {
                field: name!("topMovies"),
                mutation: false
            })
        );
        assert_eq!(
            augmented.queries.get("greeting"),
            Some(&RootField::Resolver(name!("greeting")))
        );
        let top_movies = augmented.schema.type_field("Query", "topMovies").unwrap();
        assert_eq!(top_movies.arguments.len(), 1);
        assert!(!top_movies.directives.has("cypher"));
    }
}
