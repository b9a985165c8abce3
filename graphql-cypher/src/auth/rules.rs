//! Authorization rules declared with `@authorization`, `@authentication` and
//! `@subscriptionsAuthorization`.
use std::str::FromStr;

use apollo_compiler::ast::Directive;
use serde_json::Map;
use serde_json::Value;

use crate::error::SingleValidationError;
use crate::filter::Filter;
use crate::filter::FilterParser;
use crate::model::Entity;
use crate::model::TypeModel;
use crate::model::directives::DirectiveArguments;

/// The operations a rule applies to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::EnumString, strum_macros::IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorizationOperation {
    Read,
    Aggregate,
    Create,
    Update,
    Delete,
    CreateRelationship,
    DeleteRelationship,
    Subscribe,
}

impl AuthorizationOperation {
    const FILTER_DEFAULTS: [AuthorizationOperation; 6] = [
        AuthorizationOperation::Read,
        AuthorizationOperation::Aggregate,
        AuthorizationOperation::Update,
        AuthorizationOperation::Delete,
        AuthorizationOperation::CreateRelationship,
        AuthorizationOperation::DeleteRelationship,
    ];

    const VALIDATE_DEFAULTS: [AuthorizationOperation; 7] = [
        AuthorizationOperation::Read,
        AuthorizationOperation::Aggregate,
        AuthorizationOperation::Create,
        AuthorizationOperation::Update,
        AuthorizationOperation::Delete,
        AuthorizationOperation::CreateRelationship,
        AuthorizationOperation::DeleteRelationship,
    ];
}

/// When a validate rule is checked relative to the writes of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationWhen {
    Before,
    After,
}

/// Subscription events a `@subscriptionsAuthorization` rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::EnumString, strum_macros::IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionEvent {
    Created,
    Updated,
    Deleted,
    RelationshipCreated,
    RelationshipDeleted,
}

/// A rule silently removing the rows it does not match.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterRule {
    pub operations: Vec<AuthorizationOperation>,
    pub require_authentication: bool,
    pub predicate: Option<Filter>,
}

/// A rule raising `Forbidden` when it does not match.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidateRule {
    pub operations: Vec<AuthorizationOperation>,
    pub when: Vec<ValidationWhen>,
    pub require_authentication: bool,
    pub predicate: Option<Filter>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthorizationAnnotation {
    pub filter: Vec<FilterRule>,
    pub validate: Vec<ValidateRule>,
}

impl AuthorizationAnnotation {
    pub fn filters_for(&self, operation: AuthorizationOperation) -> impl Iterator<Item = &FilterRule> {
        self.filter
            .iter()
            .filter(move |rule| rule.operations.contains(&operation))
    }
}

/// `@authentication`: the operations require an authenticated request whose claims match
/// `jwt`.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticationAnnotation {
    pub operations: Vec<AuthorizationOperation>,
    pub jwt: Option<Filter>,
}

impl AuthenticationAnnotation {
    pub fn applies_to(&self, operation: AuthorizationOperation) -> bool {
        self.operations.contains(&operation)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionFilterRule {
    pub events: Vec<SubscriptionEvent>,
    pub require_authentication: bool,
    pub predicate: Option<Filter>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionsAuthorizationAnnotation {
    pub filter: Vec<SubscriptionFilterRule>,
}

/// Parses rule directives once the shape of every type is known.
pub(crate) struct RuleParser<'a> {
    model: &'a TypeModel,
    parser: FilterParser<'a>,
}

impl<'a> RuleParser<'a> {
    pub(crate) fn new(model: &'a TypeModel) -> Self {
        Self {
            model,
            parser: FilterParser::for_rules(model),
        }
    }

    fn error(&self, location: &str, message: impl Into<String>) -> SingleValidationError {
        SingleValidationError::InvalidAuthorizationRule {
            location: location.to_owned(),
            message: message.into(),
        }
    }

    pub(crate) fn authorization(
        &self,
        directive: &Directive,
        entity: Entity<'_>,
        location: &str,
    ) -> Result<AuthorizationAnnotation, SingleValidationError> {
        let args = DirectiveArguments::new(directive, location);
        let mut annotation = AuthorizationAnnotation::default();
        for rule in self.rule_objects(&args, "filter")? {
            annotation.filter.push(FilterRule {
                operations: self.operations(&rule, "operations", location)?.unwrap_or_else(|| {
                    AuthorizationOperation::FILTER_DEFAULTS.to_vec()
                }),
                require_authentication: self.require_authentication(&rule, location)?,
                predicate: self.predicate(&rule, entity, location)?,
            });
        }
        for rule in self.rule_objects(&args, "validate")? {
            let when = match rule.get("when") {
                None | Some(Value::Null) => vec![ValidationWhen::Before, ValidationWhen::After],
                Some(value) => self.enum_values(value, location)?,
            };
            annotation.validate.push(ValidateRule {
                operations: self.operations(&rule, "operations", location)?.unwrap_or_else(|| {
                    AuthorizationOperation::VALIDATE_DEFAULTS.to_vec()
                }),
                when,
                require_authentication: self.require_authentication(&rule, location)?,
                predicate: self.predicate(&rule, entity, location)?,
            });
        }
        Ok(annotation)
    }

    pub(crate) fn authentication(
        &self,
        directive: &Directive,
        location: &str,
    ) -> Result<AuthenticationAnnotation, SingleValidationError> {
        let args = DirectiveArguments::new(directive, location);
        let operations = match args.json("operations")? {
            None => AuthorizationOperation::VALIDATE_DEFAULTS.to_vec(),
            Some(value) => self.enum_values(&value, location)?,
        };
        let jwt = match args.json("jwt")? {
            None => None,
            Some(Value::Object(jwt)) => self.jwt_filter(&jwt, location)?,
            Some(_) => return Err(self.error(location, "`jwt` must be an input object")),
        };
        Ok(AuthenticationAnnotation { operations, jwt })
    }

    pub(crate) fn subscriptions_authorization(
        &self,
        directive: &Directive,
        entity: Entity<'_>,
        location: &str,
    ) -> Result<SubscriptionsAuthorizationAnnotation, SingleValidationError> {
        let args = DirectiveArguments::new(directive, location);
        let mut annotation = SubscriptionsAuthorizationAnnotation::default();
        for rule in self.rule_objects(&args, "filter")? {
            let events = match rule.get("events") {
                None | Some(Value::Null) => vec![
                    SubscriptionEvent::Created,
                    SubscriptionEvent::Updated,
                    SubscriptionEvent::Deleted,
                    SubscriptionEvent::RelationshipCreated,
                    SubscriptionEvent::RelationshipDeleted,
                ],
                Some(value) => self.enum_values(value, location)?,
            };
            let predicate = self.predicate(&rule, entity, location)?;
            if predicate.as_ref().is_some_and(|p| !p.is_local()) {
                return Err(self.error(
                    location,
                    "subscription filters may only compare attributes of the node",
                ));
            }
            annotation.filter.push(SubscriptionFilterRule {
                events,
                require_authentication: self.require_authentication(&rule, location)?,
                predicate,
            });
        }
        Ok(annotation)
    }

    fn rule_objects(
        &self,
        args: &DirectiveArguments<'_>,
        argument: &str,
    ) -> Result<Vec<Map<String, Value>>, SingleValidationError> {
        match args.json(argument)? {
            None => Ok(Vec::new()),
            Some(Value::Array(rules)) => rules
                .into_iter()
                .map(|rule| match rule {
                    Value::Object(rule) => Ok(rule),
                    _ => Err(args.error(argument, "expected a list of rules")),
                })
                .collect(),
            Some(Value::Object(rule)) => Ok(vec![rule]),
            Some(_) => Err(args.error(argument, "expected a list of rules")),
        }
    }

    fn enum_values<T: FromStr>(&self, value: &Value, location: &str) -> Result<Vec<T>, SingleValidationError> {
        let items = match value {
            Value::Array(items) => items.iter().collect(),
            single => vec![single],
        };
        items
            .into_iter()
            .map(|item| {
                item.as_str()
                    .and_then(|s| T::from_str(s).ok())
                    .ok_or_else(|| self.error(location, format!("unknown value {item}")))
            })
            .collect()
    }

    fn operations(
        &self,
        rule: &Map<String, Value>,
        key: &str,
        location: &str,
    ) -> Result<Option<Vec<AuthorizationOperation>>, SingleValidationError> {
        match rule.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => self.enum_values(value, location).map(Some),
        }
    }

    fn require_authentication(
        &self,
        rule: &Map<String, Value>,
        location: &str,
    ) -> Result<bool, SingleValidationError> {
        match rule.get("requireAuthentication") {
            None | Some(Value::Null) => Ok(true),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(self.error(location, "`requireAuthentication` must be a Boolean")),
        }
    }

    /// Parses the `where` of a rule: `{ node, jwt, AND, OR, NOT }`.
    fn predicate(
        &self,
        rule: &Map<String, Value>,
        entity: Entity<'_>,
        location: &str,
    ) -> Result<Option<Filter>, SingleValidationError> {
        match rule.get("where") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(where_)) => self.rule_where(where_, entity, location),
            Some(_) => Err(self.error(location, "`where` must be an input object")),
        }
    }

    fn rule_where(
        &self,
        where_: &Map<String, Value>,
        entity: Entity<'_>,
        location: &str,
    ) -> Result<Option<Filter>, SingleValidationError> {
        let mut filters = Vec::new();
        for (key, value) in where_ {
            if value.is_null() {
                continue;
            }
            match key.as_str() {
                "node" => {
                    let node = value
                        .as_object()
                        .ok_or_else(|| self.error(location, "`node` must be an input object"))?;
                    filters.extend(
                        self.parser
                            .parse(entity, node)
                            .map_err(|e| self.error(location, e.to_string()))?,
                    );
                }
                "jwt" => {
                    let jwt = value
                        .as_object()
                        .ok_or_else(|| self.error(location, "`jwt` must be an input object"))?;
                    filters.extend(self.jwt_filter(jwt, location)?);
                }
                "AND" | "OR" => {
                    let items = value
                        .as_array()
                        .ok_or_else(|| self.error(location, format!("`{key}` must be a list")))?;
                    let mut nested = Vec::new();
                    for item in items {
                        let item = item
                            .as_object()
                            .ok_or_else(|| self.error(location, "expected an input object"))?;
                        nested.push(
                            self.rule_where(item, entity, location)?
                                .unwrap_or(Filter::And(Vec::new())),
                        );
                    }
                    filters.extend(if key == "AND" {
                        Filter::and(nested)
                    } else {
                        Some(Filter::Or(nested))
                    });
                }
                "NOT" => {
                    let item = value
                        .as_object()
                        .ok_or_else(|| self.error(location, "`NOT` must be an input object"))?;
                    if let Some(filter) = self.rule_where(item, entity, location)? {
                        filters.push(Filter::Not(Box::new(filter)));
                    }
                }
                _ => return Err(self.error(location, format!("unknown key `{key}`"))),
            }
        }
        Ok(Filter::and(filters))
    }

    fn jwt_filter(
        &self,
        jwt: &Map<String, Value>,
        location: &str,
    ) -> Result<Option<Filter>, SingleValidationError> {
        let jwt_type = self.model.jwt.as_ref().unwrap_or(&*super::DEFAULT_JWT);
        self.parser
            .parse(Entity::Jwt(jwt_type), jwt)
            .map_err(|e| self.error(location, e.to_string()))
    }
}
