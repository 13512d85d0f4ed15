// memstore.rs — In-process value store and loop engine
//
// Backs the CLI and the tests. Elements are kept as f64 regardless of the
// nominal element type; conversion to an integer type truncates. Every fresh
// element buffer bumps `allocations()`, so tests can tell in-place
// redefinition from reallocation.

use tracing::trace;

use crate::host::{
    DataLocation, HostError, LoopEngine, LoopFlags, ValueClass, ValueId, ValueStore,
};
use crate::type_infer::ElementType;

#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Undefined,
    Scalar {
        ty: ElementType,
        value: f64,
        buffer: usize,
    },
    Array {
        ty: ElementType,
        dims: Vec<usize>,
        data: Vec<f64>,
        buffer: usize,
    },
    Str(String),
}

#[derive(Debug, Default)]
pub struct MemStore {
    slots: Vec<Slot>,
    allocations: usize,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of element buffers created so far.
    pub fn allocations(&self) -> usize {
        self.allocations
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn fresh_buffer(&mut self) -> usize {
        self.allocations += 1;
        self.allocations
    }

    fn push(&mut self, slot: Slot) -> ValueId {
        self.slots.push(slot);
        ValueId(self.slots.len() - 1)
    }

    fn slot(&self, value: ValueId) -> Result<&Slot, HostError> {
        self.slots.get(value.0).ok_or(HostError::NoSuchValue(value))
    }

    /// A named variable that has not been assigned yet.
    pub fn undefined(&mut self) -> ValueId {
        self.push(Slot::Undefined)
    }

    pub fn scalar(&mut self, ty: ElementType, value: f64) -> ValueId {
        let buffer = self.fresh_buffer();
        self.push(Slot::Scalar { ty, value, buffer })
    }

    /// Zero-filled array.
    pub fn array(&mut self, ty: ElementType, dims: &[usize]) -> ValueId {
        let data = vec![0.0; dims.iter().product()];
        self.array_with(ty, dims, data)
    }

    pub fn array_with(&mut self, ty: ElementType, dims: &[usize], data: Vec<f64>) -> ValueId {
        let buffer = self.fresh_buffer();
        self.push(Slot::Array {
            ty,
            dims: dims.to_vec(),
            data,
            buffer,
        })
    }

    /// Int32 vector (or scalar, for one value) holding `values`.
    pub fn integers(&mut self, values: &[i64]) -> ValueId {
        match values {
            [v] => self.scalar(ElementType::Int32, *v as f64),
            _ => self.array_with(
                ElementType::Int32,
                &[values.len()],
                values.iter().map(|&v| v as f64).collect(),
            ),
        }
    }

    pub fn string(&mut self, text: impl Into<String>) -> ValueId {
        self.push(Slot::Str(text.into()))
    }

    /// Elements of a numeric value.
    pub fn values(&self, value: ValueId) -> Option<Vec<f64>> {
        match self.slots.get(value.0)? {
            Slot::Scalar { value, .. } => Some(vec![*value]),
            Slot::Array { data, .. } => Some(data.clone()),
            Slot::Undefined | Slot::Str(_) => None,
        }
    }
}

fn coerce(v: f64, ty: ElementType) -> f64 {
    if ty.is_integer() {
        v.trunc()
    } else {
        v
    }
}

impl ValueStore for MemStore {
    fn class_of(&self, value: ValueId) -> ValueClass {
        match self.slots.get(value.0) {
            None | Some(Slot::Undefined) => ValueClass::Undefined,
            Some(Slot::Scalar { .. }) => ValueClass::Scalar,
            Some(Slot::Array { .. }) => ValueClass::Array,
            Some(Slot::Str(_)) => ValueClass::String,
        }
    }

    fn type_of(&self, value: ValueId) -> Option<ElementType> {
        match self.slots.get(value.0)? {
            Slot::Scalar { ty, .. } | Slot::Array { ty, .. } => Some(*ty),
            Slot::Str(_) => Some(ElementType::String),
            Slot::Undefined => None,
        }
    }

    fn dims_of(&self, value: ValueId) -> Vec<usize> {
        match self.slots.get(value.0) {
            Some(Slot::Array { dims, .. }) => dims.clone(),
            _ => Vec::new(),
        }
    }

    fn data_of(&self, value: ValueId) -> Option<DataLocation> {
        match self.slots.get(value.0)? {
            Slot::Scalar { buffer, .. } | Slot::Array { buffer, .. } => {
                Some(DataLocation(*buffer))
            }
            Slot::Undefined | Slot::Str(_) => None,
        }
    }

    fn integers_of(&self, value: ValueId) -> Option<Vec<i64>> {
        self.values(value)?
            .into_iter()
            .map(|v| (v.fract() == 0.0).then_some(v as i64))
            .collect()
    }

    fn allocate_array(&mut self, ty: ElementType, dims: &[usize]) -> Result<ValueId, HostError> {
        if ty == ElementType::String {
            return Err(HostError::Allocation {
                ty,
                elements: dims.iter().product(),
            });
        }
        Ok(self.array(ty, dims))
    }

    fn allocate_scalar(&mut self, ty: ElementType) -> Result<ValueId, HostError> {
        if ty == ElementType::String {
            return Ok(self.string(""));
        }
        Ok(self.scalar(ty, 0.0))
    }

    fn redefine_array(
        &mut self,
        value: ValueId,
        ty: ElementType,
        dims: &[usize],
    ) -> Result<(), HostError> {
        let elements: usize = dims.iter().product();
        if ty == ElementType::String {
            return Err(HostError::Allocation { ty, elements });
        }
        let reuse = match self.slot(value)? {
            Slot::Array { data, buffer, .. } if data.len() == elements => Some(*buffer),
            _ => None,
        };
        let buffer = match reuse {
            Some(buffer) => buffer,
            None => self.fresh_buffer(),
        };
        trace!(%value, reused = reuse.is_some(), "redefine array");
        let data = match &mut self.slots[value.0] {
            Slot::Array { data, .. } if reuse.is_some() => std::mem::take(data),
            _ => vec![0.0; elements],
        };
        self.slots[value.0] = Slot::Array {
            ty,
            dims: dims.to_vec(),
            data,
            buffer,
        };
        Ok(())
    }

    fn redefine_scalar(&mut self, value: ValueId, ty: ElementType) -> Result<(), HostError> {
        let reuse = match self.slot(value)? {
            Slot::Scalar {
                buffer, value: old, ..
            } => Some((*buffer, *old)),
            _ => None,
        };
        if ty == ElementType::String {
            self.slots[value.0] = Slot::Str(String::new());
            return Ok(());
        }
        let (buffer, old) = match reuse {
            Some(found) => found,
            None => (self.fresh_buffer(), 0.0),
        };
        self.slots[value.0] = Slot::Scalar {
            ty,
            value: coerce(old, ty),
            buffer,
        };
        Ok(())
    }

    fn convert_to(&mut self, value: ValueId, ty: ElementType) -> Result<ValueId, HostError> {
        let converted = match self.slot(value)? {
            Slot::Undefined => return Err(HostError::NoSuchValue(value)),
            Slot::Str(s) if ty == ElementType::String => Slot::Str(s.clone()),
            Slot::Str(_) => {
                return Err(HostError::Conversion {
                    from: ElementType::String,
                    to: ty,
                })
            }
            Slot::Scalar { ty: from, .. } | Slot::Array { ty: from, .. }
                if ty == ElementType::String =>
            {
                return Err(HostError::Conversion { from: *from, to: ty });
            }
            Slot::Scalar { value: v, .. } => Slot::Scalar {
                ty,
                value: coerce(*v, ty),
                buffer: 0,
            },
            Slot::Array { dims, data, .. } => Slot::Array {
                ty,
                dims: dims.clone(),
                data: data.iter().map(|&v| coerce(v, ty)).collect(),
                buffer: 0,
            },
        };
        let buffer = self.fresh_buffer();
        let converted = match converted {
            Slot::Scalar { ty, value, .. } => Slot::Scalar { ty, value, buffer },
            Slot::Array { ty, dims, data, .. } => Slot::Array {
                ty,
                dims,
                data,
                buffer,
            },
            other => other,
        };
        Ok(self.push(converted))
    }
}

// ── Loop engine ─────────────────────────────────────────────────────────────

/// Iteration state for one bound value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopInfo {
    pub dims: Vec<usize>,
    /// Dimension visiting order, fastest first: requested axes, then the rest.
    pub order: Vec<usize>,
    pub coords: Vec<usize>,
    strides: Vec<usize>,
}

/// Row-major loops over a flat element index, first dimension fastest.
#[derive(Debug, Default)]
pub struct SimpleLoops {
    started: usize,
}

impl SimpleLoops {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of loops begun so far.
    pub fn started(&self) -> usize {
        self.started
    }
}

impl LoopEngine for SimpleLoops {
    type Pointer = usize;
    type Info = LoopInfo;

    fn begin_loop(
        &mut self,
        value: ValueId,
        dims: &[usize],
        axes: &[usize],
        flags: LoopFlags,
        ty: ElementType,
    ) -> Result<(usize, LoopInfo), HostError> {
        if axes.iter().any(|&a| a >= dims.len()) {
            return Err(HostError::NotIterable(value));
        }
        let mut order: Vec<usize> = axes.to_vec();
        order.extend((0..dims.len()).filter(|d| !axes.contains(d)));
        let mut strides = Vec::with_capacity(dims.len());
        let mut stride = 1;
        for d in dims {
            strides.push(stride);
            stride *= d;
        }
        self.started += 1;
        trace!(%value, ?dims, ?axes, ?flags, %ty, "begin loop");
        Ok((
            0,
            LoopInfo {
                dims: dims.to_vec(),
                order,
                coords: vec![0; dims.len()],
                strides,
            },
        ))
    }

    fn advance(&self, info: &mut LoopInfo, pointer: &mut usize) -> usize {
        for (step, &dim) in info.order.iter().enumerate() {
            info.coords[dim] += 1;
            if info.coords[dim] < info.dims[dim] {
                *pointer = info
                    .coords
                    .iter()
                    .zip(&info.strides)
                    .map(|(c, s)| c * s)
                    .sum();
                return step + 1;
            }
            info.coords[dim] = 0;
        }
        *pointer = 0;
        0
    }
}
