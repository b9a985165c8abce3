//! Types related to GraphQL requests, responses and errors.
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::error::GraphCypherError;

/// A JSON object.
pub type Object = Map<String, Value>;

/// An element of the path of a field error.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathElement {
    Key(String),
    Index(usize),
}

impl From<&str> for PathElement {
    fn from(key: &str) -> Self {
        PathElement::Key(key.to_owned())
    }
}

/// An entry of the `errors` list of a [`Response`]. The `code` extension carries the code of
/// the error it was built from.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
#[non_exhaustive]
pub struct Error {
    pub message: String,

    /// Response key of the failed root field. Empty for request errors.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<PathElement>,

    #[serde(skip_serializing_if = "Object::is_empty")]
    pub extensions: Object,
}

#[buildstructor::buildstructor]
impl Error {
    /// `extension_code` becomes `extensions.code`, unless `extensions` already has a code.
    #[builder(visibility = "pub")]
    fn new(
        message: String,
        path: Option<Vec<PathElement>>,
        extension_code: Option<String>,
        extensions: Option<Object>,
    ) -> Self {
        let mut extensions = extensions.unwrap_or_default();
        if let Some(code) = extension_code {
            extensions
                .entry("code".to_owned())
                .or_insert(Value::String(code));
        }
        Self {
            message,
            path: path.unwrap_or_default(),
            extensions,
        }
    }
}

impl Error {
    pub(crate) fn from_error(error: &GraphCypherError, path: Vec<PathElement>) -> Self {
        Error::builder()
            .message(error.to_string())
            .path(path)
            .extension_code(error.code())
            .build()
    }
}

/// A GraphQL request.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Request {
    /// Source text of the document.
    #[serde(default)]
    pub query: String,

    /// Selects the operation to run when the document holds several.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub operation_name: Option<String>,

    #[serde(
        skip_serializing_if = "Object::is_empty",
        default,
        deserialize_with = "deserialize_null_default"
    )]
    pub variables: Object,
}

// `"variables": null` is accepted as no variables.
fn deserialize_null_default<'de, D, T: Default + Deserialize<'de>>(
    deserializer: D,
) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[buildstructor::buildstructor]
impl Request {
    #[builder(visibility = "pub")]
    fn new(query: String, operation_name: Option<String>, variables: Option<Object>) -> Self {
        Self {
            query,
            operation_name,
            variables: variables.unwrap_or_default(),
        }
    }
}

/// The result of a request. `data` is `None` when the request failed before execution, and
/// `null` when a failed root field was non-null.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Value>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<Error>,
}

#[buildstructor::buildstructor]
impl Response {
    #[builder(visibility = "pub")]
    fn new(data: Option<Value>, errors: Vec<Error>) -> Self {
        Self { data, errors }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn error_serializes_code_in_extensions() {
        let error = Error::builder()
            .message("Forbidden")
            .path(vec!["users".into(), PathElement::Index(0)])
            .extension_code("FORBIDDEN")
            .build();
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({
                "message": "Forbidden",
                "path": ["users", 0],
                "extensions": { "code": "FORBIDDEN" }
            })
        );
    }

    #[test]
    fn request_accepts_null_variables() {
        let request: Request =
            serde_json::from_value(json!({ "query": "{ movies { title } }", "variables": null }))
                .unwrap();
        assert!(request.variables.is_empty());
        assert_eq!(request.operation_name, None);
    }
}
