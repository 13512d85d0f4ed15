// error.rs — Binder error taxonomy
//
// Every failure the grammar parser or the binder can produce. Indices are
// stored 0-based and rendered 1-based, which is what script authors see.

use thiserror::Error;

use crate::host::HostError;

/// Coarse classification of a [`BindError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed format text or an impossible specification.
    Grammar,
    /// Wrong number of arguments, or a required argument is missing.
    Arity,
    /// Dimension count/size mismatch or a bad axis.
    Shape,
    /// Forward, missing or non-array reference parameter.
    Reference,
    /// Allocation or conversion failure reported by the host.
    Host,
}

/// Malformed format text. The whole specification is unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid argument format at offset {offset}: {message}")]
pub struct GrammarError {
    /// Byte offset into the format text.
    pub offset: usize,
    pub message: String,
}

impl GrammarError {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error("parameter #{}: remaining dimensions cannot be arbitrary for an output", .param + 1)]
    ArbitraryOutput { param: usize },

    #[error("expected between {min} and {max} arguments, found {found}")]
    Arity { min: usize, max: usize, found: usize },

    #[error("parameter #{} is required", .param + 1)]
    MissingArgument { param: usize },

    #[error("parameter #{} is undefined", .param + 1)]
    UndefinedArgument { param: usize },

    #[error("parameter #{}, dimension #{}: expected {expected}, found {found}", .param + 1, .dim + 1)]
    DimensionMismatch {
        param: usize,
        dim: usize,
        expected: usize,
        found: usize,
    },

    #[error("parameter #{}, dimension #{}: expected at least {minimum}, found {found}", .param + 1, .dim + 1)]
    DimensionTooSmall {
        param: usize,
        dim: usize,
        minimum: usize,
        found: usize,
    },

    #[error("parameter #{}: expected at least {needed} dimensions, found {found}", .param + 1)]
    TooFewDimensions {
        param: usize,
        needed: usize,
        found: usize,
    },

    #[error("parameter #{}: expected {expected} dimensions, found {found}", .param + 1)]
    TooManyDimensions {
        param: usize,
        expected: usize,
        found: usize,
    },

    #[error("parameter #{}: reference parameter #{} has no dimension #{}", .param + 1, .reference + 1, .dim + 1)]
    ReferenceExhausted {
        param: usize,
        reference: usize,
        dim: usize,
    },

    #[error("parameter #{}: axis {axis} is out of range for {rank} dimensions", .param + 1)]
    AxisOutOfRange { param: usize, axis: i64, rank: usize },

    #[error("parameter #{}: axis parameter #{} does not hold integers", .param + 1, .axis_param + 1)]
    AxisNotIntegral { param: usize, axis_param: usize },

    #[error("parameter #{}: reference parameter #{} is an output that is not yet defined", .param + 1, .reference + 1)]
    ForwardReference { param: usize, reference: usize },

    #[error("parameter #{}: reference parameter #{} is not an array", .param + 1, .reference + 1)]
    NonArrayReference { param: usize, reference: usize },

    #[error("parameter #{}: needs a reference parameter but has none", .param + 1)]
    MissingReference { param: usize },

    #[error("parameter #{}: cannot determine the element type", .param + 1)]
    UnresolvedType { param: usize },

    #[error("parameter #{}: {source}", .param + 1)]
    Host {
        param: usize,
        #[source]
        source: HostError,
    },
}

impl BindError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BindError::Grammar(_) | BindError::ArbitraryOutput { .. } => ErrorKind::Grammar,
            BindError::Arity { .. }
            | BindError::MissingArgument { .. }
            | BindError::UndefinedArgument { .. } => ErrorKind::Arity,
            BindError::DimensionMismatch { .. }
            | BindError::DimensionTooSmall { .. }
            | BindError::TooFewDimensions { .. }
            | BindError::TooManyDimensions { .. }
            | BindError::ReferenceExhausted { .. }
            | BindError::AxisOutOfRange { .. }
            | BindError::AxisNotIntegral { .. } => ErrorKind::Shape,
            BindError::ForwardReference { .. }
            | BindError::NonArrayReference { .. }
            | BindError::MissingReference { .. } => ErrorKind::Reference,
            BindError::UnresolvedType { .. } | BindError::Host { .. } => ErrorKind::Host,
        }
    }

    /// 0-based index of the offending parameter, if the error names one.
    pub fn param(&self) -> Option<usize> {
        match self {
            BindError::Grammar(_) | BindError::Arity { .. } => None,
            BindError::ArbitraryOutput { param }
            | BindError::MissingArgument { param }
            | BindError::UndefinedArgument { param }
            | BindError::DimensionMismatch { param, .. }
            | BindError::DimensionTooSmall { param, .. }
            | BindError::TooFewDimensions { param, .. }
            | BindError::TooManyDimensions { param, .. }
            | BindError::ReferenceExhausted { param, .. }
            | BindError::AxisOutOfRange { param, .. }
            | BindError::AxisNotIntegral { param, .. }
            | BindError::ForwardReference { param, .. }
            | BindError::NonArrayReference { param, .. }
            | BindError::MissingReference { param }
            | BindError::UnresolvedType { param }
            | BindError::Host { param, .. } => Some(*param),
        }
    }
}
