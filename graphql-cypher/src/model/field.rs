use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast;
use apollo_compiler::ast::InputValueDefinition;

use crate::auth::rules::AuthenticationAnnotation;
use crate::auth::rules::AuthorizationAnnotation;
use crate::model::relationship::Relationship;

/// Filter and aggregation behaviour of a scalar or enum typed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarCategory {
    String,
    Id,
    Int,
    Float,
    BigInt,
    Boolean,
    DateTime,
    Date,
    Enum,
    /// A user declared scalar: only equality and membership.
    Other,
}

impl ScalarCategory {
    pub(crate) fn from_type_name(name: &str, is_enum: bool) -> Self {
        if is_enum {
            return ScalarCategory::Enum;
        }
        match name {
            "String" => ScalarCategory::String,
            "ID" => ScalarCategory::Id,
            "Int" => ScalarCategory::Int,
            "Float" => ScalarCategory::Float,
            "BigInt" => ScalarCategory::BigInt,
            "Boolean" => ScalarCategory::Boolean,
            "DateTime" => ScalarCategory::DateTime,
            "Date" => ScalarCategory::Date,
            _ => ScalarCategory::Other,
        }
    }

    /// Supports `_CONTAINS`, `_STARTS_WITH` and `_ENDS_WITH`.
    pub fn is_string_like(self) -> bool {
        matches!(self, ScalarCategory::String | ScalarCategory::Id)
    }

    /// Supports `_LT`, `_LTE`, `_GT` and `_GTE`.
    pub fn is_orderable(self) -> bool {
        matches!(
            self,
            ScalarCategory::String
                | ScalarCategory::Int
                | ScalarCategory::Float
                | ScalarCategory::BigInt
                | ScalarCategory::DateTime
                | ScalarCategory::Date
        )
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ScalarCategory::Int | ScalarCategory::Float | ScalarCategory::BigInt
        )
    }

    pub fn is_sortable(self) -> bool {
        !matches!(self, ScalarCategory::Other)
    }
}

/// The operations on which `@timestamp` assigns the current date time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampOperation {
    Create,
    Update,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CypherAnnotation {
    pub statement: String,
    pub column_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// A property stored on the node or relationship.
    Attribute(ScalarCategory),
    /// A field computed by a custom Cypher statement. The output type may be a scalar or any
    /// node, interface or union type.
    Cypher(CypherAnnotation),
    Relationship(Box<Relationship>),
}

/// A field of a node, interface, relationship properties or JWT type.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: Name,
    pub ty: ast::Type,
    pub description: Option<Node<str>>,
    pub kind: FieldKind,
    /// The database property backing this field (`@alias`, else the field name).
    pub db_property: String,
    /// Value assigned on create when the input omits the field (`@default`).
    pub default: Option<serde_json::Value>,
    /// `@id`: the field is assigned `randomUUID()` on create when autogenerated.
    pub autogenerate: bool,
    pub unique: bool,
    pub timestamps: Vec<TimestampOperation>,
    pub authorization: Option<AuthorizationAnnotation>,
    pub authentication: Option<AuthenticationAnnotation>,
    /// Directives not understood by the library, copied to the generated field.
    pub passthrough: ast::DirectiveList,
    pub arguments: Vec<Node<InputValueDefinition>>,
}

impl Field {
    pub fn type_name(&self) -> &Name {
        self.ty.inner_named_type()
    }

    pub fn is_list(&self) -> bool {
        self.ty.is_list()
    }

    pub fn is_required(&self) -> bool {
        self.ty.is_non_null()
    }

    pub fn scalar_category(&self) -> Option<ScalarCategory> {
        match &self.kind {
            FieldKind::Attribute(category) => Some(*category),
            _ => None,
        }
    }

    pub fn relationship(&self) -> Option<&Relationship> {
        match &self.kind {
            FieldKind::Relationship(relationship) => Some(relationship),
            _ => None,
        }
    }

    pub fn cypher(&self) -> Option<&CypherAnnotation> {
        match &self.kind {
            FieldKind::Cypher(cypher) => Some(cypher),
            _ => None,
        }
    }

    pub fn is_attribute(&self) -> bool {
        matches!(self.kind, FieldKind::Attribute(_))
    }

    /// Attributes the user may set through create and update inputs.
    pub fn is_settable(&self) -> bool {
        self.is_attribute() && !self.autogenerate && self.timestamps.is_empty()
    }
}
