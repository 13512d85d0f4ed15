// binder.rs — Per-call argument binding
//
// Two phases. `plan` reads the store and decides, for every parameter left to
// right (the return value last), its final shape and element type. `apply`
// performs the store mutations the plan calls for (conversion, in-place
// redefinition, allocation) and opens one loop binding per bound value.
//
// Preconditions: `spec` is a validated `ParameterSpecList`; `args` holds one
//   entry per supplied call argument, `None` for an omitted one.
// Postconditions: on success every present parameter has a value of its
//   planned shape and type and an open loop binding.
// Failure modes: the first failing parameter aborts the call with a
//   `BindError`; plan failures leave the store untouched.
// Side effects: `apply` mutates the store and starts loops.

use std::fmt;

use tracing::{debug, trace};

use crate::descriptor::Descriptor;
use crate::dim_resolve::{resolve_dims, DimWalk, Reference};
use crate::error::BindError;
use crate::host::{HostError, LoopEngine, LoopFlags, ValueClass, ValueId, ValueStore};
use crate::spec::{ParamKind, ParameterSpec, ParameterSpecList};
use crate::type_infer::{common_type, resolve_type, ElementType};

// ── Plan ────────────────────────────────────────────────────────────────────

/// Decision for one parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamPlan {
    /// Position in the normalized parameter list.
    pub index: usize,
    pub kind: ParamKind,
    /// Argument handle; `None` for the return value and omitted arguments.
    pub value: Option<ValueId>,
    /// Planned dimensions.
    pub dims: Vec<usize>,
    /// Dimensions the loop walks: the actual shape for inputs, the planned
    /// one for outputs.
    pub loop_dims: Vec<usize>,
    pub ty: Option<ElementType>,
    /// Inputs: loop axes. Outputs: reference axes that were dropped.
    pub axes: Vec<usize>,
    /// The input's element type differs from `ty`.
    pub convert: bool,
    pub omit_unit_dims: bool,
}

impl ParamPlan {
    fn absent(index: usize, spec: &ParameterSpec) -> Self {
        Self {
            index,
            kind: spec.kind,
            value: None,
            dims: Vec::new(),
            loop_dims: Vec::new(),
            ty: None,
            axes: Vec::new(),
            convert: false,
            omit_unit_dims: spec.omit_unit_dims,
        }
    }

    pub fn is_present(&self) -> bool {
        self.kind == ParamKind::Return || self.value.is_some()
    }

    /// Produced parameters without dimensions become scalars.
    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    params: Vec<ParamPlan>,
    common: Option<ElementType>,
}

impl Plan {
    pub fn params(&self) -> &[ParamPlan] {
        &self.params
    }

    pub fn get(&self, index: usize) -> Option<&ParamPlan> {
        self.params.get(index)
    }

    /// Common type of the `^` inputs, if any took part.
    pub fn common_type(&self) -> Option<ElementType> {
        self.common
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for p in &self.params {
            write!(f, "#{} {}", p.index + 1, p.kind.code())?;
            match p.ty {
                Some(ty) if p.is_present() => write!(f, " {ty} {:?}", p.dims)?,
                _ => write!(f, " absent")?,
            }
            if !p.axes.is_empty() {
                write!(f, " axes={:?}", p.axes)?;
            }
            if p.convert {
                write!(f, " convert")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

struct Planner<'a, S: ?Sized> {
    store: &'a S,
    args: &'a [Option<ValueId>],
    spec: &'a ParameterSpecList,
    common: Option<ElementType>,
    /// Finalized descriptor of every parameter planned so far.
    finalized: Vec<Descriptor>,
    /// Last resolved reference, reused while the effective index is unchanged.
    cached: Option<(usize, Descriptor)>,
}

impl<'a, S: ValueStore + ?Sized> Planner<'a, S> {
    /// Raw handle of in/out argument `index`, undefined values included.
    fn handle(&self, index: usize) -> Option<ValueId> {
        if index >= self.spec.in_out_count() {
            return None;
        }
        self.args.get(index).copied().flatten()
    }

    /// Handle to bind, `None` when an optional argument is omitted.
    fn argument(&self, index: usize, p: &ParameterSpec) -> Result<Option<ValueId>, BindError> {
        if p.kind == ParamKind::Return {
            return Ok(None);
        }
        let Some(value) = self.handle(index) else {
            if p.optional {
                return Ok(None);
            }
            return Err(BindError::MissingArgument { param: index });
        };
        // Outputs may name a variable that is not assigned yet.
        if p.kind == ParamKind::Input && self.store.class_of(value) == ValueClass::Undefined {
            if p.optional {
                return Ok(None);
            }
            return Err(BindError::UndefinedArgument { param: index });
        }
        Ok(Some(value))
    }

    /// Type each `^` input would resolve to on its own.
    fn common_pass(&self) -> Option<ElementType> {
        let own = self
            .spec
            .params()
            .iter()
            .enumerate()
            .filter(|(_, p)| p.kind == ParamKind::Input && p.common_type)
            .filter_map(|(i, p)| {
                let value = self.handle(i)?;
                if self.store.class_of(value) == ValueClass::Undefined {
                    return None;
                }
                resolve_type(self.store.type_of(value), p.fixed_type, p.limit)
            });
        common_type(own)
    }

    fn resolve_reference(&self, index: usize, r: usize) -> Result<Descriptor, BindError> {
        if let Some(done) = self.finalized.get(r) {
            return Ok(done.clone());
        }
        match self.spec.get(r) {
            Some(target) if target.kind == ParamKind::Input => Ok(Descriptor::of(
                self.store,
                self.handle(r),
                target.omit_unit_dims,
            )),
            _ => Err(BindError::ForwardReference {
                param: index,
                reference: r,
            }),
        }
    }

    fn reference(
        &mut self,
        index: usize,
        p: &ParameterSpec,
    ) -> Result<Option<(usize, Descriptor)>, BindError> {
        let Some(r) = p.reference.or_else(|| index.checked_sub(1)) else {
            return Ok(None);
        };
        match &self.cached {
            Some((cached, descriptor)) if *cached == r => Ok(Some((r, descriptor.clone()))),
            _ => {
                let descriptor = self.resolve_reference(index, r)?;
                trace!(param = index, reference = r, dims = ?descriptor.dims(), "resolved reference");
                self.cached = Some((r, descriptor.clone()));
                Ok(Some((r, descriptor)))
            }
        }
    }

    /// Integers held by the axis argument, `None` when it is omitted.
    fn axis_values(&self, index: usize, a: usize) -> Result<Option<Vec<i64>>, BindError> {
        let Some(value) = self.handle(a) else {
            return Ok(None);
        };
        if self.store.class_of(value) == ValueClass::Undefined {
            return Ok(None);
        }
        self.store
            .integers_of(value)
            .map(Some)
            .ok_or(BindError::AxisNotIntegral {
                param: index,
                axis_param: a,
            })
    }

    fn plan_param(&mut self, index: usize, p: &ParameterSpec) -> Result<ParamPlan, BindError> {
        let mut plan = ParamPlan::absent(index, p);
        let value = self.argument(index, p)?;
        if p.kind != ParamKind::Return && value.is_none() {
            self.finalized.push(Descriptor::invalid());
            return Ok(plan);
        }
        plan.value = value;

        let actual = Descriptor::of(self.store, value, p.omit_unit_dims);
        let reference = self.reference(index, p)?;
        let view = match &reference {
            None => Reference::None,
            Some((r, d)) if d.is_array_like() => Reference::Dims {
                index: *r,
                dims: d.dims(),
            },
            Some((r, _)) => Reference::Invalid { index: *r },
        };
        let walk = DimWalk {
            param: index,
            kind: p.kind,
            actual: actual.dims(),
            reference: view,
        };
        let axis = match p.axis {
            Some(a) => Some(self.axis_values(index, a)?),
            None => None,
        };

        match (p.kind, axis) {
            (ParamKind::Input, axis) => {
                if let Some(Some(values)) = axis {
                    plan.axes = check_axes(index, &values, actual.rank())?;
                }
                plan.dims = resolve_dims(&walk, &p.dims, p.remaining)?;
            }
            (_, None) => plan.dims = resolve_dims(&walk, &p.dims, p.remaining)?,
            // Omitted axis argument: reduce over everything.
            (_, Some(None)) => {}
            (_, Some(Some(values))) => {
                let (r, dims) = match view {
                    Reference::None => return Err(BindError::MissingReference { param: index }),
                    Reference::Invalid { index: r } => {
                        return Err(BindError::NonArrayReference {
                            param: index,
                            reference: r,
                        })
                    }
                    Reference::Dims { index: r, dims } => (r, dims),
                };
                plan.axes = check_axes(index, &values, dims.len())?;
                let reduced: Vec<usize> = dims
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !plan.axes.contains(i))
                    .map(|(_, &d)| d)
                    .collect();
                let walk = DimWalk {
                    reference: Reference::Dims {
                        index: r,
                        dims: &reduced,
                    },
                    ..walk
                };
                plan.dims = resolve_dims(&walk, &p.dims, p.remaining)?;
            }
        }

        let base = match p.kind {
            ParamKind::Input => actual.element_type(),
            _ => reference
                .as_ref()
                .filter(|(_, d)| d.is_array_like())
                .and_then(|(_, d)| d.element_type())
                .or(actual.element_type()),
        };
        let mut ty = resolve_type(base, p.fixed_type, p.limit);
        if p.common_type {
            ty = self.common.or(ty);
        }
        let ty = ty.ok_or(BindError::UnresolvedType { param: index })?;
        plan.ty = Some(ty);

        if p.kind == ParamKind::Input {
            plan.loop_dims = actual.dims().to_vec();
            plan.convert = actual.element_type() != Some(ty);
            // Inputs are never reshaped: later references see the live shape,
            // not the literal an `AtLeast` or `=` slot planned.
            self.finalized.push(if actual.is_array_like() {
                Descriptor::planned(ty, actual.dims().to_vec())
            } else {
                actual
            });
        } else {
            plan.loop_dims = plan.dims.clone();
            self.finalized
                .push(Descriptor::planned(ty, plan.dims.clone()));
        }
        trace!(param = index, kind = %p.kind, dims = ?plan.dims, %ty, "planned parameter");
        Ok(plan)
    }
}

fn check_axes(param: usize, values: &[i64], rank: usize) -> Result<Vec<usize>, BindError> {
    values
        .iter()
        .map(|&axis| {
            usize::try_from(axis)
                .ok()
                .filter(|&a| a < rank)
                .ok_or(BindError::AxisOutOfRange { param, axis, rank })
        })
        .collect()
}

/// Decide shapes and types without touching the store.
pub fn plan<S: ValueStore + ?Sized>(
    store: &S,
    args: &[Option<ValueId>],
    spec: &ParameterSpecList,
) -> Result<Plan, BindError> {
    let (min, max) = spec.arity();
    if args.len() < min || args.len() > max {
        return Err(BindError::Arity {
            min,
            max,
            found: args.len(),
        });
    }
    let mut planner = Planner {
        store,
        args,
        spec,
        common: None,
        finalized: Vec::with_capacity(spec.len()),
        cached: None,
    };
    planner.common = planner.common_pass();

    let params = spec
        .params()
        .iter()
        .enumerate()
        .map(|(index, p)| planner.plan_param(index, p))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Plan {
        params,
        common: planner.common,
    })
}

// ── Apply ───────────────────────────────────────────────────────────────────

/// A bound value and its open loop.
#[derive(Debug)]
pub struct ParamBinding<P, I> {
    pub value: ValueId,
    pub ty: ElementType,
    pub dims: Vec<usize>,
    pub pointer: P,
    pub info: I,
}

/// Result of a successful bind.
#[derive(Debug)]
pub struct Bound<P, I> {
    plan: Plan,
    bindings: Vec<Option<ParamBinding<P, I>>>,
    return_value: Option<ValueId>,
}

impl<P, I> Bound<P, I> {
    /// Binding of parameter `index`; `None` for omitted arguments.
    pub fn binding(&self, index: usize) -> Option<&ParamBinding<P, I>> {
        self.bindings.get(index)?.as_ref()
    }

    /// Number of bound parameters.
    pub fn len(&self) -> usize {
        self.bindings.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn return_value(&self) -> Option<ValueId> {
        self.return_value
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// Step the loop of parameter `index`. 0 when exhausted or unbound.
    pub fn advance<L>(&mut self, loops: &L, index: usize) -> usize
    where
        L: LoopEngine<Pointer = P, Info = I> + ?Sized,
    {
        match self.bindings.get_mut(index) {
            Some(Some(b)) => loops.advance(&mut b.info, &mut b.pointer),
            _ => 0,
        }
    }
}

fn host(param: usize) -> impl Fn(HostError) -> BindError {
    move |source| BindError::Host { param, source }
}

/// Carry out `plan` against the store and open the loops.
pub fn apply<S, L>(
    store: &mut S,
    loops: &mut L,
    plan: Plan,
) -> Result<Bound<L::Pointer, L::Info>, BindError>
where
    S: ValueStore + ?Sized,
    L: LoopEngine + ?Sized,
{
    let mut bindings = Vec::with_capacity(plan.params.len());
    let mut return_value = None;
    for p in &plan.params {
        let Some(ty) = p.ty else {
            bindings.push(None);
            continue;
        };
        let value = match (p.kind, p.value) {
            (ParamKind::Input, Some(v)) if p.convert => {
                store.convert_to(v, ty).map_err(host(p.index))?
            }
            (ParamKind::Input, Some(v)) => v,
            (ParamKind::Output, Some(v)) => {
                let redefined = if p.is_scalar() {
                    store.redefine_scalar(v, ty)
                } else {
                    store.redefine_array(v, ty, &p.dims)
                };
                redefined.map_err(host(p.index))?;
                v
            }
            (ParamKind::Return, _) => {
                let v = if p.is_scalar() {
                    store.allocate_scalar(ty)
                } else {
                    store.allocate_array(ty, &p.dims)
                }
                .map_err(host(p.index))?;
                return_value = Some(v);
                v
            }
            (_, None) => {
                bindings.push(None);
                continue;
            }
        };
        let axes: &[usize] = if p.kind == ParamKind::Input {
            &p.axes
        } else {
            &[]
        };
        let flags = LoopFlags {
            omit_unit_dims: p.omit_unit_dims,
            along_axes: !axes.is_empty(),
        };
        let (pointer, info) = loops
            .begin_loop(value, &p.loop_dims, axes, flags, ty)
            .map_err(host(p.index))?;
        bindings.push(Some(ParamBinding {
            value,
            ty,
            dims: p.loop_dims.clone(),
            pointer,
            info,
        }));
    }
    Ok(Bound {
        plan,
        bindings,
        return_value,
    })
}

/// Plan and apply `spec` for one call.
pub fn bind<S, L>(
    store: &mut S,
    loops: &mut L,
    args: &[Option<ValueId>],
    spec: &ParameterSpecList,
) -> Result<Bound<L::Pointer, L::Info>, BindError>
where
    S: ValueStore + ?Sized,
    L: LoopEngine + ?Sized,
{
    let result = plan(&*store, args, spec).and_then(|plan| apply(store, loops, plan));
    if let Err(err) = &result {
        debug!(kind = ?err.kind(), param = ?err.param(), "binding failed: {err}");
    }
    result
}

/// Parse `format` and bind it. Prefer [`bind`] with a cached list.
pub fn bind_format<S, L>(
    store: &mut S,
    loops: &mut L,
    args: &[Option<ValueId>],
    format: &str,
) -> Result<Bound<L::Pointer, L::Info>, BindError>
where
    S: ValueStore + ?Sized,
    L: LoopEngine + ?Sized,
{
    let spec = ParameterSpecList::parse(format)?;
    bind(store, loops, args, &spec)
}
