//! Cypher text building blocks: identifier escaping, variable and parameter allocation.
use std::sync::LazyLock;

use itertools::Itertools;
use regex::Regex;
use serde_json::Map;
use serde_json::Value;

use crate::error::CompileError;
use crate::model::ScalarCategory;

static SAFE_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid regex pattern"));

/// Escapes a label, relationship type, property or map key with backticks when it is not a
/// plain identifier.
pub(crate) fn escape(identifier: &str) -> String {
    if SAFE_IDENTIFIER.is_match(identifier) {
        identifier.to_owned()
    } else {
        format!("`{}`", identifier.replace('`', "``"))
    }
}

/// A property access, e.g. `this.title`.
pub(crate) fn property(variable: &str, property: &str) -> String {
    format!("{variable}.{}", escape(property))
}

/// Wraps a parameter reference so that the database compares values of the property's type.
pub(crate) fn typed_value(category: ScalarCategory, expression: &str, list: bool) -> String {
    let function = match category {
        ScalarCategory::DateTime => "datetime",
        ScalarCategory::Date => "date",
        ScalarCategory::BigInt => "toInteger",
        _ => return expression.to_owned(),
    };
    if list {
        format!("[var IN {expression} | {function}(var)]")
    } else {
        format!("{function}({expression})")
    }
}

/// Allocates the variables and parameters of one compiled statement.
///
/// Variable names are unique across the whole statement, including subqueries, so that any
/// fragment can be spliced anywhere without shadowing.
#[derive(Debug, Default)]
pub(crate) struct Environment {
    counter: usize,
    params: Map<String, Value>,
    param_counter: usize,
    /// Set once a fragment references `$jwt` or `$isAuthenticated`.
    pub(crate) uses_auth: bool,
}

impl Environment {
    /// A fresh node or relationship variable: `this0`, `this1`, ...
    pub(crate) fn this(&mut self) -> String {
        self.next("this")
    }

    /// A fresh variable for a projected or collected value: `var0`, `var1`, ...
    pub(crate) fn var(&mut self) -> String {
        self.next("var")
    }

    fn next(&mut self, prefix: &str) -> String {
        let name = format!("{prefix}{}", self.counter);
        self.counter += 1;
        name
    }

    /// Binds a value to a fresh parameter and returns the reference, e.g. `$param0`.
    pub(crate) fn param(&mut self, value: Value) -> String {
        let name = format!("param{}", self.param_counter);
        self.param_counter += 1;
        self.params.insert(name.clone(), value);
        format!("${name}")
    }

    /// Binds a value to a parameter with a chosen name, used for the arguments of custom Cypher
    /// statements which reference them by name. Two different values for one name conflict.
    pub(crate) fn named_param(&mut self, name: &str, value: Value) -> Result<String, CompileError> {
        match self.params.get(name) {
            Some(existing) if *existing != value => Err(CompileError::InvalidArgument {
                key: name.to_owned(),
                message: "another value is already bound to this parameter".to_owned(),
            }),
            _ => {
                self.params.insert(name.to_owned(), value);
                Ok(format!("${}", escape(name)))
            }
        }
    }

    /// A reference to a JWT claim, e.g. `$jwt.roles`.
    pub(crate) fn jwt(&mut self, path: &[String]) -> String {
        self.uses_auth = true;
        let mut reference = "$jwt".to_owned();
        for segment in path {
            reference.push('.');
            reference.push_str(&escape(segment));
        }
        reference
    }

    pub(crate) fn is_authenticated(&mut self) -> &'static str {
        self.uses_auth = true;
        "$isAuthenticated"
    }

    pub(crate) fn into_params(self) -> Map<String, Value> {
        self.params
    }
}

/// Indents every line of a nested block.
pub(crate) fn indent(block: &str) -> String {
    block
        .lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("    {line}")
            }
        })
        .join("\n")
}

/// A `CALL { ... }` subquery.
pub(crate) fn call(body: &[String]) -> String {
    format!("CALL {{\n{}\n}}", indent(&body.join("\n")))
}

/// Joins predicates with `AND`, parenthesising them when there are several.
pub(crate) fn and(predicates: Vec<String>) -> Option<String> {
    let mut predicates: Vec<String> = predicates.into_iter().filter(|p| !p.is_empty()).collect();
    match predicates.len() {
        0 => None,
        1 => predicates.pop(),
        _ => Some(
            predicates
                .into_iter()
                .map(|p| format!("({p})"))
                .join(" AND "),
        ),
    }
}

/// Joins predicates with `OR`, always parenthesising the group.
pub(crate) fn or(predicates: Vec<String>) -> Option<String> {
    let mut predicates: Vec<String> = predicates.into_iter().filter(|p| !p.is_empty()).collect();
    match predicates.len() {
        0 => None,
        1 => predicates.pop(),
        _ => Some(format!(
            "({})",
            predicates
                .into_iter()
                .map(|p| format!("({p})"))
                .join(" OR ")
        )),
    }
}

/// A `WHERE` clause, or nothing.
pub(crate) fn where_clause(predicate: Option<String>) -> Option<String> {
    predicate.map(|p| format!("WHERE {p}"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn escapes_only_unsafe_identifiers() {
        assert_eq!(escape("ACTED_IN"), "ACTED_IN");
        assert_eq!(escape("has space"), "`has space`");
        assert_eq!(escape("back`tick"), "`back``tick`");
        assert_eq!(escape("1st"), "`1st`");
    }

    #[test]
    fn variables_are_unique_across_prefixes() {
        let mut env = Environment::default();
        assert_eq!(env.this(), "this0");
        assert_eq!(env.var(), "var1");
        assert_eq!(env.this(), "this2");
        assert_eq!(env.param(json!(1)), "$param0");
        assert_eq!(env.param(json!("a")), "$param1");
        assert_eq!(
            env.jwt(&["https://example.com/roles".to_owned()]),
            "$jwt.`https://example.com/roles`"
        );
        assert!(env.uses_auth);
        assert_eq!(env.named_param("limit", json!(3)), Ok("$limit".to_owned()));
        assert!(env.named_param("limit", json!(3)).is_ok());
        assert!(env.named_param("limit", json!(4)).is_err());
        let params = env.into_params();
        assert_eq!(params.get("param1"), Some(&json!("a")));
    }

    #[test]
    fn boolean_composition_parenthesises() {
        assert_eq!(and(vec!["a".into()]), Some("a".into()));
        assert_eq!(and(vec!["a".into(), "b OR c".into()]), Some("(a) AND (b OR c)".into()));
        assert_eq!(or(vec!["a".into(), "b".into()]), Some("((a) OR (b))".into()));
        assert_eq!(or(vec![]), None);
    }

    #[test]
    fn calls_indent_their_body() {
        assert_eq!(
            call(&["WITH this".into(), "RETURN count(*) AS var0".into()]),
            "CALL {\n    WITH this\n    RETURN count(*) AS var0\n}"
        );
    }

    #[test]
    fn typed_values() {
        assert_eq!(
            typed_value(ScalarCategory::DateTime, "$param0", false),
            "datetime($param0)"
        );
        assert_eq!(
            typed_value(ScalarCategory::Date, "$param0", true),
            "[var IN $param0 | date(var)]"
        );
        assert_eq!(typed_value(ScalarCategory::Int, "$param0", false), "$param0");
    }
}
