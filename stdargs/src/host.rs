// host.rs — Interfaces to the interpreter around the binder
//
// The binder never owns values. It reads shapes and types through
// `ValueStore`, mutates the store only through the allocate/redefine/convert
// operations, and asks a `LoopEngine` for one iteration binding per value.
// `memstore` provides in-process implementations of both.

use std::fmt;

use thiserror::Error;

use crate::type_infer::ElementType;

/// Handle of a value in the host's value store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub usize);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

/// Storage class of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueClass {
    Undefined,
    Scalar,
    Array,
    String,
}

impl ValueClass {
    /// Scalars count as rank-0 arrays wherever a shape is needed.
    pub fn is_numeric(self) -> bool {
        matches!(self, ValueClass::Scalar | ValueClass::Array)
    }
}

/// Opaque address of a value's elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataLocation(pub usize);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("value {0} does not exist")]
    NoSuchValue(ValueId),
    #[error("cannot allocate {elements} elements of type {ty}")]
    Allocation { ty: ElementType, elements: usize },
    #[error("cannot convert {from} to {to}")]
    Conversion { from: ElementType, to: ElementType },
    #[error("cannot iterate over value {0}")]
    NotIterable(ValueId),
}

/// Read access plus the narrow set of mutations the binder may perform.
pub trait ValueStore {
    fn class_of(&self, value: ValueId) -> ValueClass;
    fn type_of(&self, value: ValueId) -> Option<ElementType>;
    /// Dimensions, outermost last; empty for scalars and strings.
    fn dims_of(&self, value: ValueId) -> Vec<usize>;
    fn data_of(&self, value: ValueId) -> Option<DataLocation>;
    /// Elements as integers, if every element is integral.
    fn integers_of(&self, value: ValueId) -> Option<Vec<i64>>;

    fn allocate_array(&mut self, ty: ElementType, dims: &[usize]) -> Result<ValueId, HostError>;
    fn allocate_scalar(&mut self, ty: ElementType) -> Result<ValueId, HostError>;
    /// Reshape/retype `value` in place; storage is reused when it fits.
    fn redefine_array(
        &mut self,
        value: ValueId,
        ty: ElementType,
        dims: &[usize],
    ) -> Result<(), HostError>;
    fn redefine_scalar(&mut self, value: ValueId, ty: ElementType) -> Result<(), HostError>;
    /// Converted copy of `value`.
    fn convert_to(&mut self, value: ValueId, ty: ElementType) -> Result<ValueId, HostError>;
}

/// Hints passed to [`LoopEngine::begin_loop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopFlags {
    /// Size-1 dimensions were stripped from the shape.
    pub omit_unit_dims: bool,
    /// Iterate along the listed axes first.
    pub along_axes: bool,
}

/// The host's N-dimensional iteration engine.
pub trait LoopEngine {
    type Pointer;
    type Info;

    fn begin_loop(
        &mut self,
        value: ValueId,
        dims: &[usize],
        axes: &[usize],
        flags: LoopFlags,
        ty: ElementType,
    ) -> Result<(Self::Pointer, Self::Info), HostError>;

    /// Step to the next element. Returns how many dimensions were advanced,
    /// 0 once the loop is exhausted.
    fn advance(&self, info: &mut Self::Info, pointer: &mut Self::Pointer) -> usize;
}
