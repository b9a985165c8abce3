//! Apollo Federation v2 support for subgraph schemas.
use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::ast::Type;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::schema::ComponentName;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::ObjectType;
use apollo_compiler::schema::ScalarType;
use apollo_compiler::schema::UnionType;

use super::QUERY;
use super::SchemaWriter;
use super::argument;
use super::named;
use super::output_field;
use super::required;
use crate::error::SingleValidationError;
use crate::error::ValidationErrors;
use crate::translate::RootField;
use crate::utils::generated_name;

/// Definitions of the federation directives applied in subgraph schemas.
const FEDERATION_DEFINITIONS: &str = r#"
scalar federation__FieldSet

directive @key(fields: federation__FieldSet!, resolvable: Boolean = true) repeatable on OBJECT | INTERFACE
directive @shareable repeatable on OBJECT | FIELD_DEFINITION
directive @external on OBJECT | FIELD_DEFINITION
directive @requires(fields: federation__FieldSet!) on FIELD_DEFINITION
directive @provides(fields: federation__FieldSet!) on FIELD_DEFINITION
directive @override(from: String!) on FIELD_DEFINITION
directive @inaccessible on FIELD_DEFINITION | OBJECT | INTERFACE | UNION | ARGUMENT_DEFINITION | SCALAR | ENUM | ENUM_VALUE | INPUT_OBJECT | INPUT_FIELD_DEFINITION
directive @tag(name: String!) repeatable on FIELD_DEFINITION | OBJECT | INTERFACE | UNION | ARGUMENT_DEFINITION | SCALAR | ENUM | ENUM_VALUE | INPUT_OBJECT | INPUT_FIELD_DEFINITION
"#;

const ANY: &str = "_Any";
const SERVICE: &str = "_Service";
const ENTITY: &str = "_Entity";

impl SchemaWriter<'_> {
    /// Declares the federation directives, unless the user's definitions already do.
    pub(super) fn federation_definitions(&mut self) -> Result<(), ValidationErrors> {
        let definitions = Schema::parse(FEDERATION_DEFINITIONS, "federation.graphql").map_err(
            |invalid| SingleValidationError::InvalidGeneratedSchema {
                message: invalid.errors.to_string(),
            },
        )?;
        for (name, definition) in &definitions.directive_definitions {
            if !self.schema.directive_definitions.contains_key(name) {
                self.schema
                    .directive_definitions
                    .insert(name.clone(), definition.clone());
            }
        }
        for (name, ty) in &definitions.types {
            if !ty.is_built_in() && !self.schema.types.contains_key(name) {
                self.schema.types.insert(name.clone(), ty.clone());
            }
        }
        Ok(())
    }

    /// `_service` and `_entities`, added after the service SDL is printed.
    pub(super) fn entity_fields(&mut self) {
        let model = self.model;
        let entities: IndexSet<ComponentName> = model
            .concepts
            .values()
            .filter(|concept| !concept.keys.is_empty() && concept.is_resolvable())
            .map(|concept| ComponentName::from(concept.name.clone()))
            .collect();

        let mut fields = vec![output_field("_service", required(SERVICE), Vec::new())];
        self.scalar(ANY);
        self.object(SERVICE.to_owned(), |_| {
            vec![output_field("sdl", named("String"), Vec::new())]
        });
        self.queries.insert(generated_name("_service"), RootField::Service);
        if !entities.is_empty() {
            let name = generated_name(ENTITY);
            let definition = UnionType {
                description: None,
                name: name.clone(),
                directives: Default::default(),
                members: entities,
            };
            self.schema
                .types
                .insert(name, ExtendedType::Union(Node::new(definition)));
            fields.push(output_field(
                "_entities",
                Type::NonNullList(Box::new(named(ENTITY))),
                vec![argument(
                    "representations",
                    Type::NonNullList(Box::new(required(ANY))),
                )],
            ));
            self.queries.insert(generated_name("_entities"), RootField::Entities);
        }

        if let Some(ExtendedType::Object(query)) = self.schema.types.get_mut(&QUERY) {
            let query: &mut ObjectType = query.make_mut();
            for field in fields {
                query.fields.insert(field.name.clone(), field);
            }
        }
    }

    fn scalar(&mut self, name: &str) {
        let name = generated_name(name);
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
