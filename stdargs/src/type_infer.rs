// type_infer.rs — Element types and the promotion lattice
//
// Resolves the element type a parameter is bound with from its current type,
// its fixed constraint and the constraint's limit kind, and computes the
// common type shared by `^`-flagged parameters.
//
// Preconditions: none.
// Postconditions: results depend only on the arguments.
// Failure modes: none (absence is expressed as `None`).
// Side effects: none.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Element types ───────────────────────────────────────────────────────────

/// Element types of the host language, in promotion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    Int8,
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    CFloat,
    CDouble,
    String,
}

impl ElementType {
    pub const ALL: [ElementType; 9] = [
        ElementType::Int8,
        ElementType::Int16,
        ElementType::Int32,
        ElementType::Int64,
        ElementType::Float,
        ElementType::Double,
        ElementType::CFloat,
        ElementType::CDouble,
        ElementType::String,
    ];

    /// Position in the promotion order. Higher ranks absorb lower ones.
    pub fn rank(self) -> u8 {
        match self {
            ElementType::Int8 => 0,
            ElementType::Int16 => 1,
            ElementType::Int32 => 2,
            ElementType::Int64 => 3,
            ElementType::Float => 4,
            ElementType::Double => 5,
            ElementType::CFloat => 6,
            ElementType::CDouble => 7,
            ElementType::String => 8,
        }
    }

    /// The format-grammar character for this type.
    pub fn code(self) -> char {
        match self {
            ElementType::Int8 => 'B',
            ElementType::Int16 => 'W',
            ElementType::Int32 => 'L',
            ElementType::Int64 => 'Q',
            ElementType::Float => 'F',
            ElementType::Double => 'D',
            ElementType::CFloat => 'C',
            ElementType::CDouble => 'Z',
            ElementType::String => 'S',
        }
    }

    pub fn from_code(c: char) -> Option<ElementType> {
        ElementType::ALL.into_iter().find(|t| t.code() == c)
    }

    pub fn is_floating(self) -> bool {
        matches!(
            self,
            ElementType::Float | ElementType::Double | ElementType::CFloat | ElementType::CDouble
        )
    }

    pub fn is_integer(self) -> bool {
        self.rank() <= ElementType::Int64.rank()
    }

    /// Integer width a floating type is truncated to under `~`.
    fn integer_counterpart(self) -> Option<ElementType> {
        match self {
            ElementType::Float | ElementType::CFloat => Some(ElementType::Int32),
            ElementType::Double | ElementType::CDouble => Some(ElementType::Int64),
            _ => None,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::Int8 => "int8",
            ElementType::Int16 => "int16",
            ElementType::Int32 => "int32",
            ElementType::Int64 => "int64",
            ElementType::Float => "float",
            ElementType::Double => "double",
            ElementType::CFloat => "cfloat",
            ElementType::CDouble => "cdouble",
            ElementType::String => "string",
        };
        f.write_str(name)
    }
}

/// How a fixed type constraint limits the resolved type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TypeLimit {
    /// Use the constraint as-is (no limit character).
    #[default]
    Exact,
    /// `>`: at least the constraint.
    Lower,
    /// `<`: at most the constraint.
    Upper,
    /// `~`: floating types become integers; otherwise like `Lower`.
    ForceInteger,
}

impl TypeLimit {
    pub fn code(self) -> Option<char> {
        match self {
            TypeLimit::Exact => None,
            TypeLimit::Lower => Some('>'),
            TypeLimit::Upper => Some('<'),
            TypeLimit::ForceInteger => Some('~'),
        }
    }
}

// ── Resolution ──────────────────────────────────────────────────────────────

fn higher(a: ElementType, b: ElementType) -> ElementType {
    if b.rank() > a.rank() {
        b
    } else {
        a
    }
}

fn lower(a: ElementType, b: ElementType) -> ElementType {
    if b.rank() < a.rank() {
        b
    } else {
        a
    }
}

/// Resolve the target type of one parameter.
///
/// `current` is the type the value has (or inherits) before conversion;
/// `constraint` is the fixed type from the format, `None` when unconstrained.
pub fn resolve_type(
    current: Option<ElementType>,
    constraint: Option<ElementType>,
    limit: TypeLimit,
) -> Option<ElementType> {
    match limit {
        TypeLimit::Exact => constraint.or(current),
        TypeLimit::Lower => match (current, constraint) {
            (Some(t), Some(c)) => Some(higher(t, c)),
            (t, c) => c.or(t),
        },
        TypeLimit::Upper => match (current, constraint) {
            (Some(t), Some(c)) => Some(lower(t, c)),
            (t, c) => c.or(t),
        },
        TypeLimit::ForceInteger => match current.and_then(ElementType::integer_counterpart) {
            Some(int) => Some(int),
            None => resolve_type(current, constraint, TypeLimit::Lower),
        },
    }
}

/// Highest-ranked type among the participants, `None` if there are none.
pub fn common_type<I>(participants: I) -> Option<ElementType>
where
    I: IntoIterator<Item = ElementType>,
{
    participants.into_iter().reduce(higher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ElementType::*;

    #[test]
    fn exact_replaces_unless_unconstrained() {
        assert_eq!(resolve_type(Some(Int8), Some(Double), TypeLimit::Exact), Some(Double));
        assert_eq!(resolve_type(Some(Double), Some(Int8), TypeLimit::Exact), Some(Int8));
        assert_eq!(resolve_type(Some(Float), None, TypeLimit::Exact), Some(Float));
        assert_eq!(resolve_type(None, None, TypeLimit::Exact), None);
    }

    #[test]
    fn lower_limit_only_raises() {
        assert_eq!(resolve_type(Some(Int16), Some(Float), TypeLimit::Lower), Some(Float));
        assert_eq!(resolve_type(Some(Double), Some(Float), TypeLimit::Lower), Some(Double));
        assert_eq!(resolve_type(None, Some(Int32), TypeLimit::Lower), Some(Int32));
    }

    #[test]
    fn upper_limit_only_lowers() {
        assert_eq!(resolve_type(Some(Double), Some(Float), TypeLimit::Upper), Some(Float));
        assert_eq!(resolve_type(Some(Int8), Some(Float), TypeLimit::Upper), Some(Int8));
        assert_eq!(resolve_type(None, Some(Float), TypeLimit::Upper), Some(Float));
    }

    #[test]
    fn force_integer_maps_by_precision() {
        assert_eq!(resolve_type(Some(Float), None, TypeLimit::ForceInteger), Some(Int32));
        assert_eq!(resolve_type(Some(CFloat), Some(Int8), TypeLimit::ForceInteger), Some(Int32));
        assert_eq!(resolve_type(Some(Double), None, TypeLimit::ForceInteger), Some(Int64));
        assert_eq!(resolve_type(Some(CDouble), None, TypeLimit::ForceInteger), Some(Int64));
        // Integers fall back to Lower.
        assert_eq!(resolve_type(Some(Int8), Some(Int32), TypeLimit::ForceInteger), Some(Int32));
        assert_eq!(resolve_type(Some(Int64), Some(Int32), TypeLimit::ForceInteger), Some(Int64));
    }

    #[test]
    fn common_type_is_the_maximum() {
        assert_eq!(common_type([Int16, Double, Float]), Some(Double));
        assert_eq!(common_type([Int8]), Some(Int8));
        assert_eq!(common_type(std::iter::empty()), None);
    }

    #[test]
    fn codes_round_trip() {
        for t in ElementType::ALL {
            assert_eq!(ElementType::from_code(t.code()), Some(t));
        }
        assert_eq!(ElementType::from_code('X'), None);
    }

    #[test]
    fn rank_follows_declaration_order() {
        for pair in ElementType::ALL.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
        }
        assert!(Int64.is_integer());
        assert!(!Float.is_integer());
        assert!(CDouble.is_floating());
    }
}
