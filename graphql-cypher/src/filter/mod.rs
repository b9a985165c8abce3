//! Typed filters.
//!
//! Every `where` argument, authorization rule and subscription filter is parsed into a
//! [`Filter`] tree checked against the type model before anything is compiled. The tree is
//! turned into Cypher by the query compiler and evaluated in process by [`evaluate`] for
//! subscription delivery and authentication checks.
use std::fmt;

use apollo_compiler::Name;
use serde_json::Map;
use serde_json::Value;

use crate::error::CompileError;
use crate::model::Entity;
use crate::model::Field;
use crate::model::FieldKind;
use crate::model::Relationship;
use crate::model::ScalarCategory;
use crate::model::Target;
use crate::model::TypeModel;

pub(crate) mod evaluate;

/// Comparison operators, named by the suffix they are generated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::IntoStaticStr, strum_macros::EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Equal,
    Not,
    In,
    NotIn,
    Contains,
    NotContains,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
    Lt,
    Lte,
    Gt,
    Gte,
    Includes,
    NotIncludes,
}

impl Operator {
    /// The suffix of the generated where field, e.g. `_NOT_IN`. Empty for equality.
    pub fn suffix(self) -> String {
        match self {
            Operator::Equal => String::new(),
            _ => {
                let name: &str = self.into();
                format!("_{name}")
            }
        }
    }

    /// The operators generated for a field of the given category.
    pub fn supported(category: ScalarCategory, list: bool) -> Vec<Operator> {
        use Operator::*;
        if list {
            return vec![Equal, Not, Includes, NotIncludes];
        }
        let mut operators = vec![Equal, Not];
        if category == ScalarCategory::Boolean {
            return operators;
        }
        operators.extend([In, NotIn]);
        if category.is_string_like() {
            operators.extend([
                Contains,
                NotContains,
                StartsWith,
                NotStartsWith,
                EndsWith,
                NotEndsWith,
            ]);
        }
        if category.is_orderable() {
            operators.extend([Lt, Lte, Gt, Gte]);
        }
        operators
    }

    /// Whether the operator takes a list of values.
    pub fn takes_list(self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    /// Operators expressed as the negation of another one.
    pub(crate) fn negated(self) -> Option<Operator> {
        match self {
            Operator::Not => Some(Operator::Equal),
            Operator::NotIn => Some(Operator::In),
            Operator::NotContains => Some(Operator::Contains),
            Operator::NotStartsWith => Some(Operator::StartsWith),
            Operator::NotEndsWith => Some(Operator::EndsWith),
            Operator::NotIncludes => Some(Operator::Includes),
            _ => None,
        }
    }
}

/// Relationship quantifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Quantifier {
    All,
    None,
    Single,
    Some,
}

impl Quantifier {
    pub(crate) const ALL: [Quantifier; 4] = [
        Quantifier::All,
        Quantifier::None,
        Quantifier::Single,
        Quantifier::Some,
    ];

    pub fn suffix(self) -> String {
        let name: &str = self.into();
        format!("_{name}")
    }
}

/// What a property filter compares.
#[derive(Debug, Clone, PartialEq)]
pub enum Subject {
    /// A property of the node or relationship in scope.
    Property(String),
    /// A claim of the request's JWT, by path.
    Jwt(Vec<String>),
}

/// The right hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Literal(Value),
    /// A `$jwt.<path>` reference, resolved against the request's claims.
    Jwt(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyFilter {
    pub field: Name,
    pub subject: Subject,
    pub category: ScalarCategory,
    pub list: bool,
    pub operator: Operator,
    pub value: FilterValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipFilter {
    pub relationship: Relationship,
    pub quantifier: Quantifier,
    /// Applied to the related node, or for connection filters to the node and edge pair.
    pub filter: Option<Box<Filter>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CountFilter {
    pub relationship: Relationship,
    pub operator: Operator,
    pub value: FilterValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Property(PropertyFilter),
    Relationship(RelationshipFilter),
    Connection(RelationshipFilter),
    Count(CountFilter),
    /// Restricts the node in scope to one concrete type.
    Implementation { type_name: Name, filter: Box<Filter> },
    /// Switches the scope to the related node of a connection filter.
    Node(Box<Filter>),
    /// Switches the scope to the relationship of a connection filter.
    Edge(Box<Filter>),
}

impl Filter {
    pub(crate) fn and(filters: Vec<Filter>) -> Option<Filter> {
        let mut filters = filters;
        match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(Filter::And(filters)),
        }
    }

    pub(crate) fn or(filters: Vec<Filter>) -> Option<Filter> {
        let mut filters = filters;
        match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(Filter::Or(filters)),
        }
    }

    /// Whether the filter only reads properties of the node in scope and JWT claims, so that
    /// it can be evaluated on an event snapshot.
    pub fn is_local(&self) -> bool {
        match self {
            Filter::And(filters) | Filter::Or(filters) => filters.iter().all(Filter::is_local),
            Filter::Not(filter) | Filter::Implementation { filter, .. } => filter.is_local(),
            Filter::Property(_) => true,
            Filter::Relationship(_)
            | Filter::Connection(_)
            | Filter::Count(_)
            | Filter::Node(_)
            | Filter::Edge(_) => false,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name: &str = self.into();
        f.write_str(name)
    }
}

/// Parses JSON `where` values into filters.
pub(crate) struct FilterParser<'a> {
    model: &'a TypeModel,
    /// Whether string values of the form `$jwt.<path>` are claim references.
    jwt_references: bool,
}

impl<'a> FilterParser<'a> {
    pub(crate) fn new(model: &'a TypeModel) -> Self {
        Self {
            model,
            jwt_references: false,
        }
    }

    /// A parser for authorization rules, where `$jwt.<path>` strings reference claims.
    pub(crate) fn for_rules(model: &'a TypeModel) -> Self {
        Self {
            model,
            jwt_references: true,
        }
    }

    fn invalid(&self, key: &str, message: impl Into<String>) -> CompileError {
        CompileError::InvalidArgument {
            key: key.to_owned(),
            message: message.into(),
        }
    }

    fn object<'v>(&self, key: &str, value: &'v Value) -> Result<&'v Map<String, Value>, CompileError> {
        value
            .as_object()
            .ok_or_else(|| self.invalid(key, "expected an input object"))
    }

    fn objects<'v>(&self, key: &str, value: &'v Value) -> Result<Vec<&'v Map<String, Value>>, CompileError> {
        match value {
            Value::Array(items) => items.iter().map(|item| self.object(key, item)).collect(),
            Value::Object(object) => Ok(vec![object]),
            _ => Err(self.invalid(key, "expected a list of input objects")),
        }
    }

    /// Parses a `<Type>Where` value. Returns `None` for an empty filter.
    pub(crate) fn parse(
        &self,
        entity: Entity<'_>,
        value: &Map<String, Value>,
    ) -> Result<Option<Filter>, CompileError> {
        let mut filters = Vec::new();
        for (key, item) in value {
            if let Some(filter) = self.parse_entry(entity, key, item)? {
                filters.push(filter);
            }
        }
        Ok(Filter::and(filters))
    }

    fn parse_entry(
        &self,
        entity: Entity<'_>,
        key: &str,
        value: &Value,
    ) -> Result<Option<Filter>, CompileError> {
        match key {
            "AND" | "OR" => {
                if value.is_null() {
                    return Ok(None);
                }
                let mut filters = Vec::new();
                for object in self.objects(key, value)? {
                    filters.push(self.parse(entity, object)?.unwrap_or(Filter::And(Vec::new())));
                }
                Ok(if key == "AND" {
                    Filter::and(filters)
                } else {
                    Some(Filter::Or(filters))
                })
            }
            "NOT" => {
                if value.is_null() {
                    return Ok(None);
                }
                Ok(self
                    .parse(entity, self.object(key, value)?)?
                    .map(|filter| Filter::Not(Box::new(filter))))
            }
            "_on" => {
                let Entity::Interface(interface) = entity else {
                    return Err(self.unknown(entity, key));
                };
                if value.is_null() {
                    return Ok(None);
                }
                let mut branches = Vec::new();
                for (type_name, where_value) in self.object(key, value)? {
                    let concept = interface
                        .implementations
                        .iter()
                        .find(|name| name.as_str() == type_name)
                        .and_then(|name| self.model.concept(name))
                        .ok_or_else(|| self.unknown(entity, type_name))?;
                    let filter = self
                        .parse(Entity::Concept(concept), self.object(type_name, where_value)?)?
                        .unwrap_or(Filter::And(Vec::new()));
                    branches.push(Filter::Implementation {
                        type_name: concept.name.clone(),
                        filter: Box::new(filter),
                    });
                }
                Ok(Filter::or(branches))
            }
            _ => match entity {
                Entity::Union(union) => {
                    let concept = union
                        .members
                        .iter()
                        .find(|name| name.as_str() == key)
                        .and_then(|name| self.model.concept(name))
                        .ok_or_else(|| self.unknown(entity, key))?;
                    if value.is_null() {
                        return Ok(None);
                    }
                    let filter = self
                        .parse(Entity::Concept(concept), self.object(key, value)?)?
                        .unwrap_or(Filter::And(Vec::new()));
                    Ok(Some(Filter::Implementation {
                        type_name: concept.name.clone(),
                        filter: Box::new(filter),
                    }))
                }
                _ => self.parse_field_entry(entity, key, value),
            },
        }
    }

    fn unknown(&self, entity: Entity<'_>, key: &str) -> CompileError {
        CompileError::UnknownWhereField {
            type_name: entity.name().clone(),
            field: key.to_owned(),
        }
    }

    fn parse_field_entry(
        &self,
        entity: Entity<'_>,
        key: &str,
        value: &Value,
    ) -> Result<Option<Filter>, CompileError> {
        if let Some(field) = entity.field(key) {
            return self.parse_field(entity, key, field, None, value);
        }
        if let Some(name) = key.strip_suffix("Aggregate") {
            if let Some(relationship) = entity.field(name).and_then(Field::relationship) {
                return self.parse_count(key, relationship, value).map(Some);
            }
        }
        if let Some(name) = key.strip_suffix("Connection") {
            if let Some(relationship) = entity.field(name).and_then(Field::relationship) {
                let quantifier = if relationship.is_list {
                    return Err(self.unknown(entity, key));
                } else {
                    Quantifier::Some
                };
                return self.parse_connection(key, relationship, quantifier, value);
            }
        }
        for quantifier in Quantifier::ALL {
            let Some(prefix) = key.strip_suffix(quantifier.suffix().as_str()) else {
                continue;
            };
            if let Some(name) = prefix.strip_suffix("Connection") {
                if let Some(relationship) = entity.field(name).and_then(Field::relationship) {
                    if relationship.is_list {
                        return self.parse_connection(key, relationship, quantifier, value);
                    }
                }
            }
            if let Some(relationship) = entity.field(prefix).and_then(Field::relationship) {
                if relationship.is_list {
                    return self.parse_relationship(key, relationship, quantifier, value);
                }
            }
        }
        if let Some(prefix) = key.strip_suffix("Connection_NOT") {
            if let Some(relationship) = entity.field(prefix).and_then(Field::relationship) {
                if !relationship.is_list {
                    return self.parse_connection(key, relationship, Quantifier::None, value);
                }
            }
        }
        // Longest suffix first: `_NOT_IN` before `_IN`.
        let mut operators: Vec<Operator> = <Operator as strum::IntoEnumIterator>::iter()
            .filter(|op| *op != Operator::Equal)
            .collect();
        operators.sort_by_key(|op| std::cmp::Reverse(op.suffix().len()));
        for operator in operators {
            let Some(prefix) = key.strip_suffix(operator.suffix().as_str()) else {
                continue;
            };
            if let Some(field) = entity.field(prefix) {
                return self.parse_field(entity, key, field, Some(operator), value);
            }
        }
        Err(self.unknown(entity, key))
    }

    fn parse_field(
        &self,
        entity: Entity<'_>,
        key: &str,
        field: &Field,
        operator: Option<Operator>,
        value: &Value,
    ) -> Result<Option<Filter>, CompileError> {
        match &field.kind {
            FieldKind::Attribute(category) => {
                let operator = operator.unwrap_or(Operator::Equal);
                if !Operator::supported(*category, field.is_list()).contains(&operator) {
                    return Err(self.unknown(entity, key));
                }
                let subject = match entity {
                    Entity::Jwt(jwt) => Subject::Jwt(
                        jwt.claims
                            .get(&field.name)
                            .map(|claim| claim.path.clone())
                            .unwrap_or_else(|| vec![field.name.to_string()]),
                    ),
                    _ => Subject::Property(field.db_property.clone()),
                };
                let value = self.filter_value(key, operator, value)?;
                Ok(Some(Filter::Property(PropertyFilter {
                    field: field.name.clone(),
                    subject,
                    category: *category,
                    list: field.is_list(),
                    operator,
                    value,
                })))
            }
            FieldKind::Relationship(relationship) if !relationship.is_list => {
                let quantifier = match operator {
                    None => Quantifier::Some,
                    Some(Operator::Not) => Quantifier::None,
                    Some(_) => return Err(self.unknown(entity, key)),
                };
                if value.is_null() {
                    // `{ director: null }` matches nodes without a related node.
                    let quantifier = match quantifier {
                        Quantifier::Some => Quantifier::None,
                        _ => Quantifier::Some,
                    };
                    return Ok(Some(Filter::Relationship(RelationshipFilter {
                        relationship: (**relationship).clone(),
                        quantifier,
                        filter: None,
                    })));
                }
                self.parse_relationship(key, relationship, quantifier, value)
            }
            _ => Err(self.unknown(entity, key)),
        }
    }

    fn filter_value(
        &self,
        key: &str,
        operator: Operator,
        value: &Value,
    ) -> Result<FilterValue, CompileError> {
        if let Some(path) = self.jwt_reference(value) {
            return Ok(FilterValue::Jwt(path));
        }
        if operator.takes_list() && !value.is_array() {
            return Err(self.invalid(key, "expected a list"));
        }
        if value.is_null() && !matches!(operator, Operator::Equal | Operator::Not) {
            return Err(self.invalid(key, "null is only allowed for equality"));
        }
        Ok(FilterValue::Literal(value.clone()))
    }

    fn jwt_reference(&self, value: &Value) -> Option<Vec<String>> {
        if !self.jwt_references {
            return None;
        }
        let path = value.as_str()?.strip_prefix("$jwt.")?;
        let mut segments: Vec<String> = path.split('.').map(str::to_owned).collect();
        // A claim of the `@jwt` type is looked up by its `@jwtClaim` path.
        if let (Some(jwt), [first]) = (&self.model.jwt, segments.as_slice()) {
            if let Some(claim) = jwt.claims.get(first.as_str()) {
                segments = claim.path.clone();
            }
        }
        Some(segments)
    }

    fn target_entity(&self, relationship: &Relationship) -> Result<Entity<'a>, CompileError> {
        let name = relationship.target.name();
        self.model
            .entity(name)
            .ok_or_else(|| CompileError::UnknownField {
                type_name: name.clone(),
                field: relationship.field_name.to_string(),
            })
    }

    fn parse_relationship(
        &self,
        key: &str,
        relationship: &Relationship,
        quantifier: Quantifier,
        value: &Value,
    ) -> Result<Option<Filter>, CompileError> {
        if value.is_null() {
            return Ok(None);
        }
        let target = self.target_entity(relationship)?;
        let filter = self.parse(target, self.object(key, value)?)?;
        Ok(Some(Filter::Relationship(RelationshipFilter {
            relationship: relationship.clone(),
            quantifier,
            filter: filter.map(Box::new),
        })))
    }

    fn parse_connection(
        &self,
        key: &str,
        relationship: &Relationship,
        quantifier: Quantifier,
        value: &Value,
    ) -> Result<Option<Filter>, CompileError> {
        if value.is_null() {
            return Ok(None);
        }
        let filter = self.parse_connection_where(relationship, self.object(key, value)?)?;
        Ok(Some(Filter::Connection(RelationshipFilter {
            relationship: relationship.clone(),
            quantifier,
            filter: filter.map(Box::new),
        })))
    }

    /// Parses a `<Type><Rel>ConnectionWhere` value.
    pub(crate) fn parse_connection_where(
        &self,
        relationship: &Relationship,
        value: &Map<String, Value>,
    ) -> Result<Option<Filter>, CompileError> {
        if let Target::Union { members, .. } = &relationship.target {
            let mut branches = Vec::new();
            for (key, item) in value {
                let concept = members
                    .iter()
                    .find(|name| name.as_str() == key)
                    .and_then(|name| self.model.concept(name))
                    .ok_or_else(|| CompileError::UnknownWhereField {
                        type_name: relationship.target.name().clone(),
                        field: key.clone(),
                    })?;
                if item.is_null() {
                    continue;
                }
                let filter = self
                    .parse_edge_and_node(relationship, Entity::Concept(concept), self.object(key, item)?)?
                    .unwrap_or(Filter::And(Vec::new()));
                branches.push(Filter::And(vec![
                    Filter::Node(Box::new(Filter::Implementation {
                        type_name: concept.name.clone(),
                        filter: Box::new(Filter::And(Vec::new())),
                    })),
                    filter,
                ]));
            }
            return Ok(Filter::or(branches));
        }
        let target = self.target_entity(relationship)?;
        self.parse_edge_and_node(relationship, target, value)
    }

    fn parse_edge_and_node(
        &self,
        relationship: &Relationship,
        node: Entity<'_>,
        value: &Map<String, Value>,
    ) -> Result<Option<Filter>, CompileError> {
        let mut filters = Vec::new();
        for (key, item) in value {
            if item.is_null() {
                continue;
            }
            match key.as_str() {
                "node" => {
                    if let Some(filter) = self.parse(node, self.object(key, item)?)? {
                        filters.push(Filter::Node(Box::new(filter)));
                    }
                }
                "node_NOT" => {
                    if let Some(filter) = self.parse(node, self.object(key, item)?)? {
                        filters.push(Filter::Not(Box::new(Filter::Node(Box::new(filter)))));
                    }
                }
                "edge" | "edge_NOT" => {
                    let properties = relationship
                        .properties
                        .as_ref()
                        .and_then(|name| self.model.relationship_properties.get(name))
                        .ok_or_else(|| CompileError::UnknownWhereField {
                            type_name: relationship.field_name.clone(),
                            field: key.clone(),
                        })?;
                    if let Some(filter) =
                        self.parse(Entity::Properties(properties), self.object(key, item)?)?
                    {
                        let filter = Filter::Edge(Box::new(filter));
                        filters.push(if key == "edge" {
                            filter
                        } else {
                            Filter::Not(Box::new(filter))
                        });
                    }
                }
                "AND" | "OR" => {
                    let mut nested = Vec::new();
                    for object in self.objects(key, item)? {
                        nested.push(
                            self.parse_edge_and_node(relationship, node, object)?
                                .unwrap_or(Filter::And(Vec::new())),
                        );
                    }
                    if key == "AND" {
                        filters.extend(Filter::and(nested));
                    } else {
                        filters.push(Filter::Or(nested));
                    }
                }
                "NOT" => {
                    if let Some(filter) =
                        self.parse_edge_and_node(relationship, node, self.object(key, item)?)?
                    {
                        filters.push(Filter::Not(Box::new(filter)));
                    }
                }
                _ => {
                    return Err(CompileError::UnknownWhereField {
                        type_name: relationship.field_name.clone(),
                        field: key.clone(),
                    });
                }
            }
        }
        Ok(Filter::and(filters))
    }

    fn parse_count(
        &self,
        key: &str,
        relationship: &Relationship,
        value: &Value,
    ) -> Result<Filter, CompileError> {
        let mut filters = Vec::new();
        for (aggregate_key, item) in self.object(key, value)? {
            let operator = match aggregate_key.as_str() {
                "count" => Operator::Equal,
                "count_LT" => Operator::Lt,
                "count_LTE" => Operator::Lte,
                "count_GT" => Operator::Gt,
                "count_GTE" => Operator::Gte,
                _ => {
                    return Err(CompileError::UnknownWhereField {
                        type_name: relationship.field_name.clone(),
                        field: aggregate_key.clone(),
                    });
                }
            };
            if item.is_null() {
                continue;
            }
            if !item.is_number() {
                return Err(self.invalid(aggregate_key, "expected an Int"));
            }
            filters.push(Filter::Count(CountFilter {
                relationship: relationship.clone(),
                operator,
                value: FilterValue::Literal(item.clone()),
            }));
        }
        Ok(Filter::and(filters).unwrap_or(Filter::And(Vec::new())))
    }
}
