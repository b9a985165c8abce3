//! Create mutations and the property writes shared by every mutation.
//!
//! Each input object of a `create<Type>s` field is created by its own subquery. Nested
//! relationship inputs are written depth first inside the subquery of their parent, so one
//! statement creates the whole tree.
use apollo_compiler::Name;
use serde_json::Map;
use serde_json::Value;

use super::NodeSet;
use super::Translator;
use super::cypher;
use super::events;
use super::input_object;
use super::input_objects;
use super::projection::TYPENAME;
use super::read::ROOT;
use super::selection::SelectedField;
use super::shape::InfoField;
use super::shape::MutationField;
use super::shape::RootShape;
use crate::auth::rules::AuthorizationOperation;
use crate::auth::rules::ValidationWhen;
use crate::error::CompileError;
use crate::error::GraphCypherError;
use crate::model::ConceptType;
use crate::model::Entity;
use crate::model::Field;
use crate::model::Relationship;
use crate::model::Target;
use crate::model::TimestampOperation;
use crate::schema::naming;

/// Arithmetic and list operators of update inputs, e.g. `count_INCREMENT`.
const UPDATE_OPERATORS: [(&str, &str); 8] = [
    ("_INCREMENT", "+"),
    ("_DECREMENT", "-"),
    ("_ADD", "+"),
    ("_SUBTRACT", "-"),
    ("_MULTIPLY", "*"),
    ("_DIVIDE", "/"),
    ("_PUSH", "PUSH"),
    ("_POP", "POP"),
];

/// Splits an update operator key into field name and operator.
pub(super) fn update_operator(key: &str) -> Option<(&str, &'static str)> {
    UPDATE_OPERATORS
        .iter()
        .find_map(|(suffix, operator)| key.strip_suffix(suffix).map(|field| (field, *operator)))
}

/// The fields of `info` in a mutation response.
pub(super) fn info_fields(field: &SelectedField, type_name: &str) -> Result<Vec<(String, InfoField)>, CompileError> {
    let mut fields = Vec::new();
    for selected in field.selection.fields() {
        let info = match selected.name.as_str() {
            TYPENAME => InfoField::Typename(Name::new_unchecked(type_name)),
            "nodesCreated" => InfoField::NodesCreated,
            "nodesDeleted" => InfoField::NodesDeleted,
            "relationshipsCreated" => InfoField::RelationshipsCreated,
            "relationshipsDeleted" => InfoField::RelationshipsDeleted,
            _ => {
                return Err(CompileError::UnknownField {
                    type_name: Name::new_unchecked(type_name),
                    field: selected.name.to_string(),
                });
            }
        };
        fields.push((selected.response_key, info));
    }
    Ok(fields)
}

/// The clauses creating a node tree, with the validation to run once the tree is connected.
struct CreatedNode {
    clauses: Vec<String>,
    events: String,
    validate_after: Option<String>,
}

/// One relationship field of an input object, split by concrete target for union targets.
pub(super) struct RelationshipInput<'a, 'v> {
    pub(super) relationship: &'a Relationship,
    pub(super) target: NodeSet<'a>,
    pub(super) value: &'v Value,
}

impl<'a> Translator<'a> {
    pub(super) fn create_root(
        &mut self,
        name: &Name,
        field: &SelectedField,
    ) -> Result<(Vec<String>, RootShape), GraphCypherError> {
        let concept = self.concept(name)?;
        let inputs = input_objects("input", field.argument("input").unwrap_or(&Value::Null))?;
        let mut statement = Vec::new();
        let mut rows = Vec::new();
        for input in inputs {
            let node = self.env.this();
            let (mut body, events) = self.create_node(concept, &node, input)?;
            let meta = self.env.var();
            body.push(format!("RETURN {node}, {events} AS {meta}"));
            statement.push(cypher::call(&body));
            rows.push(format!("{{ node: {node}, meta: {meta} }}"));
        }
        let created = self.env.var();
        statement.push(format!("UNWIND [{}] AS {created}", rows.join(", ")));
        statement.push(format!("WITH {created}.node AS {ROOT}, {created}.meta AS meta"));
        let response_type = naming::create_response(&concept.plural);
        let (clauses, expression, fields) =
            self.mutation_response(concept, field, &response_type, naming::CREATE_INFO)?;
        statement.extend(clauses);
        statement.push(format!("RETURN {expression} AS {ROOT}, meta"));
        Ok((statement, RootShape::Mutation(fields)))
    }

    /// The projection of a create or update response: a map keyed by the response keys of the
    /// selected node lists, evaluated once per affected node.
    pub(super) fn mutation_response(
        &mut self,
        concept: &'a ConceptType,
        field: &SelectedField,
        response_type: &str,
        info_type: &str,
    ) -> Result<(Vec<String>, String, Vec<(String, MutationField)>), GraphCypherError> {
        let set = NodeSet::concept(concept);
        let mut clauses = Vec::new();
        let mut entries = Vec::new();
        let mut fields = Vec::new();
        for selected in field.selection.fields() {
            let mutation_field = match selected.name.as_str() {
                TYPENAME => MutationField::Typename(Name::new_unchecked(response_type)),
                "info" => MutationField::Info(info_fields(&selected, info_type)?),
                name if name == concept.plural => {
                    let mut projection = self.project(&set, ROOT, &selected.selection)?;
                    clauses.extend(projection.clauses());
                    entries.push(format!(
                        "{}: {}",
                        cypher::escape(&selected.response_key),
                        projection.expression
                    ));
                    MutationField::Nodes(projection.shape)
                }
                _ => {
                    return Err(CompileError::UnknownField {
                        type_name: Name::new_unchecked(response_type),
                        field: selected.name.to_string(),
                    }
                    .into());
                }
            };
            fields.push((selected.response_key, mutation_field));
        }
        let expression = if entries.is_empty() {
            "{}".to_owned()
        } else {
            format!("{{ {} }}", entries.join(", "))
        };
        Ok((clauses, expression, fields))
    }

    /// Creates one node and its nested relationship inputs. Returns the clauses and the
    /// expression of the events, parent first.
    pub(super) fn create_node(
        &mut self,
        concept: &'a ConceptType,
        node: &str,
        input: &Map<String, Value>,
    ) -> Result<(Vec<String>, String), GraphCypherError> {
        let created = self.create_node_tree(concept, node, input)?;
        let mut clauses = created.clauses;
        clauses.extend(created.validate_after);
        Ok((clauses, created.events))
    }

    /// Like [`Self::create_node`], but leaves the validation that follows the write to the
    /// caller, which may still have to connect the node.
    fn create_node_tree(
        &mut self,
        concept: &'a ConceptType,
        node: &str,
        input: &Map<String, Value>,
    ) -> Result<CreatedNode, GraphCypherError> {
        let written = self.input_fields(concept, input, |_| false)?;
        self.authenticate(concept, AuthorizationOperation::Create, written.iter().map(|f| &f.name))?;
        let mut clauses = vec![format!("CREATE ({node}{})", concept.label_string())];
        let sets = self.assignments(Entity::Concept(concept), node, input, TimestampOperation::Create)?;
        if !sets.is_empty() {
            clauses.push(format!("SET {}", sets.join(", ")));
        }
        let mut events = vec![events::single(self.created_event(node))];
        let relationships = self.relationship_inputs(concept, input)?;
        if !relationships.is_empty() {
            clauses.push("WITH *".to_owned());
        }
        for relationship in relationships {
            let (calls, nested) = self.relationship_field_input(concept, node, &relationship)?;
            clauses.extend(calls);
            events.extend(nested);
        }
        let validate_after = self.auth_validate(
            concept,
            node,
            AuthorizationOperation::Create,
            ValidationWhen::After,
            &written,
        )?;
        Ok(CreatedNode {
            clauses,
            events: events::concat(events),
            validate_after,
        })
    }

    /// The model fields an input object writes. Keys that are neither fields nor accepted by
    /// `extra` are unknown.
    pub(super) fn input_fields(
        &self,
        concept: &'a ConceptType,
        input: &Map<String, Value>,
        extra: impl Fn(&str) -> bool,
    ) -> Result<Vec<&'a Field>, CompileError> {
        let mut fields = Vec::new();
        for key in input.keys() {
            match concept.fields.get(key.as_str()) {
                Some(field) => fields.push(field),
                None if extra(key) || key == naming::EMPTY_INPUT => {}
                None => {
                    return Err(CompileError::UnknownField {
                        type_name: concept.name.clone(),
                        field: key.clone(),
                    });
                }
            }
        }
        Ok(fields)
    }

    /// `SET` items writing the attributes of `input` to `variable`, along with the values
    /// assigned on `operation`: generated ids, timestamps, defaults and update operators.
    pub(super) fn assignments(
        &mut self,
        entity: Entity<'a>,
        variable: &str,
        input: &Map<String, Value>,
        operation: TimestampOperation,
    ) -> Result<Vec<String>, CompileError> {
        let mut sets = Vec::new();
        for field in entity.fields() {
            let Some(category) = field.scalar_category() else {
                continue;
            };
            let target = cypher::property(variable, &field.db_property);
            if field.timestamps.contains(&operation) {
                sets.push(format!("{target} = datetime()"));
                continue;
            }
            if operation == TimestampOperation::Create && field.autogenerate {
                sets.push(format!("{target} = randomUUID()"));
                continue;
            }
            let value = match input.get(field.name.as_str()) {
                Some(value) => Some(value.clone()),
                None if operation == TimestampOperation::Create => field.default.clone(),
                None => None,
            };
            if let Some(value) = value {
                let param = self.env.param(value);
                sets.push(format!(
                    "{target} = {}",
                    cypher::typed_value(category, &param, field.is_list())
                ));
            }
        }
        if operation == TimestampOperation::Update {
            for (key, value) in input {
                let Some((name, operator)) = update_operator(key) else {
                    continue;
                };
                let field = entity.field(name).ok_or_else(|| CompileError::UnknownField {
                    type_name: entity.name().clone(),
                    field: key.clone(),
                })?;
                let Some(category) = field.scalar_category() else {
                    continue;
                };
                let target = cypher::property(variable, &field.db_property);
                let param = self.env.param(value.clone());
                sets.push(match operator {
                    "PUSH" => format!(
                        "{target} = coalesce({target}, []) + {}",
                        cypher::typed_value(category, &param, value.is_array())
                    ),
                    "POP" => format!(
                        "{target} = CASE WHEN {param} > 0 THEN {target}[0..-{param}] ELSE {target} END"
                    ),
                    arithmetic => format!("{target} = {target} {arithmetic} {param}"),
                });
            }
        }
        Ok(sets)
    }

    /// The relationship fields set in an input object. Inputs of union relationships are keyed
    /// by member type and come out as one input per member.
    pub(super) fn relationship_inputs<'v>(
        &self,
        concept: &'a ConceptType,
        input: &'v Map<String, Value>,
    ) -> Result<Vec<RelationshipInput<'a, 'v>>, CompileError> {
        let mut inputs = Vec::new();
        for (key, value) in input {
            let Some(relationship) = concept.fields.get(key.as_str()).and_then(Field::relationship) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            match &relationship.target {
                Target::Union { members, .. } => {
                    let by_member = input_object(key, value)?.into_iter().flatten();
                    for (member, value) in by_member {
                        if value.is_null() {
                            continue;
                        }
                        if !members.iter().any(|m| m.as_str() == member) {
                            return Err(CompileError::UnknownField {
                                type_name: relationship.target.name().clone(),
                                field: member.clone(),
                            });
                        }
                        inputs.push(RelationshipInput {
                            relationship,
                            target: NodeSet::concept(self.concept(member)?),
                            value,
                        });
                    }
                }
                Target::Concept(_) | Target::Interface { .. } => inputs.push(RelationshipInput {
                    relationship,
                    target: self.node_set(relationship.target.name())?,
                    value,
                }),
            }
        }
        Ok(inputs)
    }

    /// The `create`, `connect` and `connectOrCreate` operations of a relationship field in a
    /// create input.
    fn relationship_field_input(
        &mut self,
        concept: &'a ConceptType,
        node: &str,
        input: &RelationshipInput<'a, '_>,
    ) -> Result<(Vec<String>, Vec<String>), GraphCypherError> {
        let key = input.relationship.field_name.as_str();
        let object = input_object(key, input.value)?.ok_or_else(|| CompileError::InvalidArgument {
            key: key.to_owned(),
            message: "expected a relationship field input".to_owned(),
        })?;
        let mut calls = Vec::new();
        let mut events = Vec::new();
        for (operation, value) in object {
            for item in input_objects(operation, value)? {
                let (call, result) = match operation.as_str() {
                    "create" => self.create_related(concept, node, input.relationship, &input.target, item)?,
                    "connect" => self.connect(concept, node, input.relationship, &input.target, item)?,
                    "connectOrCreate" => {
                        self.connect_or_create(concept, node, input.relationship, &input.target, item)?
                    }
                    _ => {
                        return Err(CompileError::UnknownField {
                            type_name: Name::new_unchecked(&naming::relationship_input(
                                &concept.name,
                                key,
                                "FieldInput",
                            )),
                            field: operation.clone(),
                        }
                        .into());
                    }
                };
                calls.push(call);
                events.push(result);
            }
        }
        Ok((calls, events))
    }

    /// Creates a node related to `source`, with its relationship. The subquery returns the
    /// events of the relationship and of the created tree.
    pub(super) fn create_related(
        &mut self,
        source_concept: &'a ConceptType,
        source: &str,
        relationship: &'a Relationship,
        target: &NodeSet<'a>,
        input: &Map<String, Value>,
    ) -> Result<(String, String), GraphCypherError> {
        let node_input = input
            .get("node")
            .map(|value| input_object("node", value))
            .transpose()?
            .flatten()
            .ok_or_else(|| CompileError::InvalidArgument {
                key: "node".to_owned(),
                message: "a nested create needs a node".to_owned(),
            })?;
        // Inputs of interface targets are keyed by implementation.
        let (concept, node_input) = if target.is_abstract {
            let mut implementations = node_input.iter().filter(|(_, value)| !value.is_null());
            let (type_name, value) = match (implementations.next(), implementations.next()) {
                (Some(only), None) => only,
                _ => {
                    return Err(CompileError::InvalidArgument {
                        key: "node".to_owned(),
                        message: format!("expected exactly one implementation of \"{}\"", target.name),
                    }
                    .into());
                }
            };
            let concept = target
                .concepts
                .iter()
                .copied()
                .find(|concept| concept.name.as_str() == type_name)
                .ok_or_else(|| CompileError::UnknownField {
                    type_name: target.name.clone(),
                    field: type_name.clone(),
                })?;
            let object = input_object(type_name, value)?.ok_or_else(|| CompileError::InvalidArgument {
                key: type_name.clone(),
                message: "expected an input object".to_owned(),
            })?;
            (concept, object)
        } else {
            (self.concept(target.name)?, node_input)
        };

        self.authenticate(source_concept, AuthorizationOperation::CreateRelationship, [])?;
        let node = self.env.this();
        let created = self.create_node_tree(concept, &node, node_input)?;
        let rel = self.env.this();
        let mut body = vec![format!("WITH {source}")];
        body.extend(created.clauses);
        body.push(format!(
            "CREATE {}",
            relationship.pattern(source, &rel, &node, true)
        ));
        let edge_sets = self.edge_assignments(relationship, &rel, input, TimestampOperation::Create)?;
        if !edge_sets.is_empty() {
            body.push(format!("SET {}", edge_sets.join(", ")));
        }
        // Rules checked after the write see the edge to the parent.
        body.extend(created.validate_after);
        let result = self.env.var();
        let relationship_event = events::single(self.relationship_field_event(
            naming::EventKind::RelationshipCreated,
            relationship,
            source,
            &rel,
            &node,
        ));
        body.push(format!(
            "RETURN {} AS {result}",
            events::concat(vec![relationship_event, created.events])
        ));
        Ok((cypher::call(&body), result))
    }

    /// `SET` items of the `edge` input of a relationship with properties.
    pub(super) fn edge_assignments(
        &mut self,
        relationship: &'a Relationship,
        rel_variable: &str,
        input: &Map<String, Value>,
        operation: TimestampOperation,
    ) -> Result<Vec<String>, CompileError> {
        let model = self.model;
        let Some(properties) = relationship
            .properties
            .as_ref()
            .and_then(|name| model.relationship_properties.get(name))
        else {
            return Ok(Vec::new());
        };
        let empty = Map::new();
        let edge = match input.get("edge") {
            Some(value) => input_object("edge", value)?.unwrap_or(&empty),
            None => &empty,
        };
        self.assignments(Entity::Properties(properties), rel_variable, edge, operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_operators_split_on_their_suffix() {
        assert_eq!(update_operator("count_INCREMENT"), Some(("count", "+")));
        assert_eq!(update_operator("rating_DIVIDE"), Some(("rating", "/")));
        assert_eq!(update_operator("tags_POP"), Some(("tags", "POP")));
        assert_eq!(update_operator("title"), None);
    }
}
