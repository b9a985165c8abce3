//! In process evaluation of filters over property snapshots, with the null semantics of
//! Cypher: a comparison against a missing value is unknown, and only a filter evaluating to
//! true matches.
use std::cmp::Ordering;

use serde_json::Map;
use serde_json::Value;

use super::Filter;
use super::FilterValue;
use super::Operator;
use super::PropertyFilter;
use super::Subject;

/// What a filter is evaluated against.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scope<'a> {
    /// Concrete type of the node, for `_on` and union filters.
    pub(crate) typename: Option<&'a str>,
    /// Properties of the node, keyed by database property.
    pub(crate) properties: &'a Map<String, Value>,
    pub(crate) jwt: Option<&'a Map<String, Value>>,
}

static EMPTY: std::sync::LazyLock<Map<String, Value>> = std::sync::LazyLock::new(Map::new);

impl<'a> Scope<'a> {
    /// A scope with no node, for filters only reading JWT claims.
    pub(crate) fn jwt_only(jwt: Option<&'a Map<String, Value>>) -> Self {
        Self {
            typename: None,
            properties: &EMPTY,
            jwt,
        }
    }
}

/// Whether the filter matches. Filters that need the graph (relationship quantifiers, counts,
/// connection filters) never match a snapshot.
pub(crate) fn matches(filter: &Filter, scope: Scope<'_>) -> bool {
    evaluate(filter, scope) == Some(true)
}

pub(crate) fn evaluate(filter: &Filter, scope: Scope<'_>) -> Option<bool> {
    match filter {
        Filter::And(filters) => {
            let mut result = Some(true);
            for filter in filters {
                match evaluate(filter, scope) {
                    Some(false) => return Some(false),
                    None => result = None,
                    Some(true) => {}
                }
            }
            result
        }
        Filter::Or(filters) => {
            let mut result = Some(false);
            for filter in filters {
                match evaluate(filter, scope) {
                    Some(true) => return Some(true),
                    None => result = None,
                    Some(false) => {}
                }
            }
            result
        }
        Filter::Not(filter) => evaluate(filter, scope).map(|b| !b),
        Filter::Property(property) => evaluate_property(property, scope),
        Filter::Implementation { type_name, filter } => match scope.typename {
            Some(typename) if typename == type_name.as_str() => evaluate(filter, scope),
            Some(_) => Some(false),
            None => None,
        },
        Filter::Relationship(_)
        | Filter::Connection(_)
        | Filter::Count(_)
        | Filter::Node(_)
        | Filter::Edge(_) => None,
    }
}

fn lookup<'v>(root: Option<&'v Map<String, Value>>, path: &[String]) -> Option<&'v Value> {
    let (first, rest) = path.split_first()?;
    let mut current = root?.get(first)?;
    for segment in rest {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn evaluate_property(filter: &PropertyFilter, scope: Scope<'_>) -> Option<bool> {
    let subject = match &filter.subject {
        Subject::Property(property) => scope.properties.get(property),
        Subject::Jwt(path) => lookup(scope.jwt, path),
    }
    .filter(|v| !v.is_null());
    let value = match &filter.value {
        FilterValue::Literal(value) => value,
        // A missing claim never satisfies a comparison.
        FilterValue::Jwt(path) => match lookup(scope.jwt, path) {
            Some(value) if !value.is_null() => value,
            _ => return Some(false),
        },
    };
    if let Some(positive) = filter.operator.negated() {
        if filter.operator == Operator::Not && value.is_null() {
            return Some(subject.is_some());
        }
        return compare(positive, subject, value).map(|b| !b);
    }
    compare(filter.operator, subject, value)
}

fn compare(operator: Operator, subject: Option<&Value>, value: &Value) -> Option<bool> {
    if operator == Operator::Equal && value.is_null() {
        return Some(subject.is_none());
    }
    let subject = subject?;
    match operator {
        Operator::Equal => Some(json_equal(subject, value)),
        Operator::In => Some(value.as_array()?.iter().any(|v| json_equal(subject, v))),
        Operator::Contains => Some(subject.as_str()?.contains(value.as_str()?)),
        Operator::StartsWith => Some(subject.as_str()?.starts_with(value.as_str()?)),
        Operator::EndsWith => Some(subject.as_str()?.ends_with(value.as_str()?)),
        Operator::Lt => Some(json_cmp(subject, value)? == Ordering::Less),
        Operator::Lte => Some(json_cmp(subject, value)? != Ordering::Greater),
        Operator::Gt => Some(json_cmp(subject, value)? == Ordering::Greater),
        Operator::Gte => Some(json_cmp(subject, value)? != Ordering::Less),
        Operator::Includes => Some(subject.as_array()?.iter().any(|v| json_equal(v, value))),
        // Negated operators are evaluated through their positive form.
        Operator::Not
        | Operator::NotIn
        | Operator::NotContains
        | Operator::NotStartsWith
        | Operator::NotEndsWith
        | Operator::NotIncludes => None,
    }
}

fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| json_equal(x, y))
        }
        _ => a == b,
    }
}

fn json_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        // ISO 8601 dates and date times order lexicographically.
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use apollo_compiler::name;
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::model::ScalarCategory;

    fn property(operator: Operator, value: FilterValue) -> Filter {
        Filter::Property(PropertyFilter {
            field: name!("title"),
            subject: Subject::Property("title".to_owned()),
            category: ScalarCategory::String,
            list: false,
            operator,
            value,
        })
    }

    fn eval(filter: &Filter, properties: serde_json::Value) -> Option<bool> {
        let properties = properties.as_object().unwrap().clone();
        evaluate(
            filter,
            Scope {
                typename: Some("Movie"),
                properties: &properties,
                jwt: None,
            },
        )
    }

    #[rstest]
    #[case(Operator::Equal, json!("Matrix"), Some(true))]
    #[case(Operator::Not, json!("Matrix"), Some(false))]
    #[case(Operator::Contains, json!("atri"), Some(true))]
    #[case(Operator::NotStartsWith, json!("Ma"), Some(false))]
    #[case(Operator::EndsWith, json!("rix"), Some(true))]
    #[case(Operator::In, json!(["Alien", "Matrix"]), Some(true))]
    #[case(Operator::NotIn, json!(["Alien"]), Some(true))]
    #[case(Operator::Gt, json!("Alien"), Some(true))]
    fn compares_present_values(
        #[case] operator: Operator,
        #[case] value: serde_json::Value,
        #[case] expected: Option<bool>,
    ) {
        let filter = property(operator, FilterValue::Literal(value));
        assert_eq!(eval(&filter, json!({ "title": "Matrix" })), expected);
    }

    #[test]
    fn missing_values_are_unknown() {
        let filter = property(Operator::Equal, FilterValue::Literal(json!("Matrix")));
        assert_eq!(eval(&filter, json!({})), None);
        let negated = Filter::Not(Box::new(filter));
        assert!(!matches(
            &negated,
            Scope {
                typename: None,
                properties: &Map::new(),
                jwt: None
            }
        ));
        let is_null = property(Operator::Equal, FilterValue::Literal(Value::Null));
        assert_eq!(eval(&is_null, json!({})), Some(true));
    }

    #[test]
    fn jwt_references_fail_closed() {
        let filter = property(Operator::Equal, FilterValue::Jwt(vec!["sub".to_owned()]));
        assert_eq!(eval(&filter, json!({ "title": "Matrix" })), Some(false));

        let jwt = json!({ "sub": "Matrix" }).as_object().unwrap().clone();
        let properties = json!({ "title": "Matrix" }).as_object().unwrap().clone();
        assert!(matches(
            &filter,
            Scope {
                typename: None,
                properties: &properties,
                jwt: Some(&jwt)
            }
        ));
    }

    #[test]
    fn nested_claims() {
        let filter = Filter::Property(PropertyFilter {
            field: name!("roles"),
            subject: Subject::Jwt(vec!["realm".to_owned(), "roles".to_owned()]),
            category: ScalarCategory::String,
            list: true,
            operator: Operator::Includes,
            value: FilterValue::Literal(json!("admin")),
        });
        let jwt = json!({ "realm": { "roles": ["user", "admin"] } })
            .as_object()
            .unwrap()
            .clone();
        assert!(matches(&filter, Scope::jwt_only(Some(&jwt))));
        assert!(!matches(&filter, Scope::jwt_only(None)));
    }

    #[test]
    fn numbers_compare_by_value() {
        let filter = Filter::Property(PropertyFilter {
            field: name!("released"),
            subject: Subject::Property("released".to_owned()),
            category: ScalarCategory::Int,
            list: false,
            operator: Operator::Gte,
            value: FilterValue::Literal(json!(1999.0)),
        });
        assert_eq!(eval(&filter, json!({ "released": 1999 })), Some(true));
    }
}
