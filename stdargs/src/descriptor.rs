// descriptor.rs — Shape snapshots used during inference
//
// A `Descriptor` is taken from a live value once per binder call, or built
// from a planned shape once a parameter is finalized. It is never refreshed:
// after the apply phase redefines a value, descriptors of it are stale.

use crate::host::{DataLocation, ValueClass, ValueId, ValueStore};
use crate::type_infer::ElementType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    class: ValueClass,
    ty: Option<ElementType>,
    dims: Vec<usize>,
    data: Option<DataLocation>,
}

impl Descriptor {
    /// Descriptor of an absent or unusable argument.
    pub fn invalid() -> Self {
        Self {
            class: ValueClass::Undefined,
            ty: None,
            dims: Vec::new(),
            data: None,
        }
    }

    /// Snapshot of `value`; size-1 dimensions are dropped when `omit_unit_dims`.
    pub fn of<S: ValueStore + ?Sized>(
        store: &S,
        value: Option<ValueId>,
        omit_unit_dims: bool,
    ) -> Self {
        let Some(value) = value else {
            return Self::invalid();
        };
        let class = store.class_of(value);
        if class == ValueClass::Undefined {
            return Self::invalid();
        }
        let mut dims = store.dims_of(value);
        if omit_unit_dims {
            dims.retain(|&d| d != 1);
        }
        Self {
            class,
            ty: store.type_of(value),
            dims,
            data: store.data_of(value),
        }
    }

    /// Descriptor of a finalized output that has not been applied yet.
    pub fn planned(ty: ElementType, dims: Vec<usize>) -> Self {
        let class = if dims.is_empty() {
            ValueClass::Scalar
        } else {
            ValueClass::Array
        };
        Self {
            class,
            ty: Some(ty),
            dims,
            data: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.class != ValueClass::Undefined
    }

    /// Usable as a reference shape.
    pub fn is_array_like(&self) -> bool {
        self.class.is_numeric()
    }

    pub fn class(&self) -> ValueClass {
        self.class
    }

    pub fn element_type(&self) -> Option<ElementType> {
        self.ty
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn element_count(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn data(&self) -> Option<DataLocation> {
        self.data
    }
}
