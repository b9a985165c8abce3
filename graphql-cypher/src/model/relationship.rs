use std::fmt;

use apollo_compiler::Name;

/// Direction of the stored relationship, seen from the declaring type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    In,
    Out,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::In => write!(f, "IN"),
            Direction::Out => write!(f, "OUT"),
        }
    }
}

/// How reads traverse the relationship. Writes are always directed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryDirection {
    #[default]
    Directed,
    Undirected,
}

/// What kind of type a relationship points to. Interface and union targets are resolved to
/// their closed set of implementing node types by the type model builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Concept(Name),
    Interface { name: Name, implementations: Vec<Name> },
    Union { name: Name, members: Vec<Name> },
}

impl Target {
    pub fn name(&self) -> &Name {
        match self {
            Target::Concept(name) => name,
            Target::Interface { name, .. } | Target::Union { name, .. } => name,
        }
    }

    /// The concrete node types the relationship may reach.
    pub fn concrete_types(&self) -> &[Name] {
        match self {
            Target::Concept(name) => std::slice::from_ref(name),
            Target::Interface {
                implementations, ..
            } => implementations,
            Target::Union { members, .. } => members,
        }
    }

    pub fn is_abstract(&self) -> bool {
        !matches!(self, Target::Concept(_))
    }
}

/// A `@relationship` field.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub field_name: Name,
    /// The Cypher relationship type, e.g. `ACTED_IN`.
    pub rel_type: String,
    pub direction: Direction,
    pub query_direction: QueryDirection,
    /// Name of the `@relationshipProperties` type holding the edge attributes.
    pub properties: Option<Name>,
    pub target: Target,
    pub is_list: bool,
    /// A non-list relationship declared non-null.
    pub is_required: bool,
    /// Whether a `<field>Aggregate` field is generated.
    pub aggregate: bool,
    /// False when the target type is a federation entity resolved by another subgraph.
    pub resolvable: bool,
}

impl Relationship {
    /// The relationship pattern between `from` and `to`, e.g. `(this)<-[this0:ACTED_IN]-(this1:Actor)`.
    ///
    /// `directed` is false only for reads of undirected relationships.
    pub(crate) fn pattern(
        &self,
        from: &str,
        rel_variable: &str,
        to: &str,
        directed: bool,
    ) -> String {
        let rel_type = crate::translate::cypher::escape(&self.rel_type);
        let (left, right) = match (directed, self.direction) {
            (false, _) => ("-", "-"),
            (true, Direction::Out) => ("-", "->"),
            (true, Direction::In) => ("<-", "-"),
        };
        format!("({from}){left}[{rel_variable}:{rel_type}]{right}({to})")
    }

    pub(crate) fn reads_directed(&self) -> bool {
        self.query_direction == QueryDirection::Directed
    }
}

#[cfg(test)]
mod tests {
    use apollo_compiler::name;

    use super::*;

    fn acted_in(direction: Direction) -> Relationship {
        Relationship {
            field_name: name!("actors"),
            rel_type: "ACTED_IN".to_owned(),
            direction,
            query_direction: QueryDirection::Directed,
            properties: None,
            target: Target::Concept(name!("Actor")),
            is_list: true,
            is_required: false,
            aggregate: true,
            resolvable: true,
        }
    }

    #[test]
    fn patterns_follow_direction() {
        assert_eq!(
            acted_in(Direction::In).pattern("this", "this0", "this1:Actor", true),
            "(this)<-[this0:ACTED_IN]-(this1:Actor)"
        );
        assert_eq!(
            acted_in(Direction::Out).pattern("this", "this0", "this1", true),
            "(this)-[this0:ACTED_IN]->(this1)"
        );
        assert_eq!(
            acted_in(Direction::Out).pattern("this", "", "this1", false),
            "(this)-[:ACTED_IN]-(this1)"
        );
    }
}
