// dim_resolve.rs — Dimension-op interpreter
//
// Walks one parameter's dimension slots with three cursors: the slot being
// executed, the next unused dimension of the actual argument, and the next
// unused dimension of the reference parameter. Each op checks what it has to,
// emits at most one planned dimension, and reports how far it moved the
// input and reference cursors. The remaining-dims policy then settles
// whatever the slots left over.
//
// Preconditions: `ops`/`remaining` come from a validated `ParameterSpec`.
// Postconditions: the planned dimension list for the parameter.
// Failure modes: shape and reference errors naming the offending parameter
//   and dimension (0-based internally).
// Side effects: none.

use crate::error::BindError;
use crate::spec::{DimensionOp, ParamKind, RemainingDims};

/// Positions of the three cursors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursors {
    pub spec: usize,
    pub input: usize,
    pub reference: usize,
}

/// How far one op moved the input and reference cursors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    pub input: usize,
    pub reference: usize,
}

impl Advance {
    pub const BOTH: Advance = Advance {
        input: 1,
        reference: 1,
    };
    pub const INPUT: Advance = Advance {
        input: 1,
        reference: 0,
    };
    pub const REFERENCE: Advance = Advance {
        input: 0,
        reference: 1,
    };
}

/// The reference shape as seen by one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference<'a> {
    /// First parameter without an explicit reference.
    None,
    /// The reference argument is absent or not an array.
    Invalid { index: usize },
    Dims { index: usize, dims: &'a [usize] },
}

/// Everything one walk needs to know about its parameter.
#[derive(Debug, Clone, Copy)]
pub struct DimWalk<'a> {
    pub param: usize,
    pub kind: ParamKind,
    /// Dimensions of the actual argument (existing value for outputs).
    pub actual: &'a [usize],
    pub reference: Reference<'a>,
}

impl<'a> DimWalk<'a> {
    fn is_input(&self) -> bool {
        self.kind == ParamKind::Input
    }

    fn reference_dims(&self) -> Result<(usize, &'a [usize]), BindError> {
        match self.reference {
            Reference::None => Err(BindError::MissingReference { param: self.param }),
            Reference::Invalid { index } => Err(BindError::NonArrayReference {
                param: self.param,
                reference: index,
            }),
            Reference::Dims { index, dims } => Ok((index, dims)),
        }
    }

    fn actual_dim(&self, cursor: usize) -> Result<usize, BindError> {
        self.actual
            .get(cursor)
            .copied()
            .ok_or(BindError::TooFewDimensions {
                param: self.param,
                needed: cursor + 1,
                found: self.actual.len(),
            })
    }

    fn reference_dim(&self, cursor: usize) -> Result<usize, BindError> {
        let (index, dims) = self.reference_dims()?;
        dims.get(cursor)
            .copied()
            .ok_or(BindError::ReferenceExhausted {
                param: self.param,
                reference: index,
                dim: cursor,
            })
    }

    fn expect_input(&self, cursor: usize, expected: usize) -> Result<(), BindError> {
        let found = self.actual_dim(cursor)?;
        if found != expected {
            return Err(BindError::DimensionMismatch {
                param: self.param,
                dim: cursor,
                expected,
                found,
            });
        }
        Ok(())
    }

    fn remove_reference(&self, cursor: usize, expected: Option<usize>) -> Result<(), BindError> {
        let found = self.reference_dim(cursor)?;
        match expected {
            Some(expected) if expected != found => Err(BindError::DimensionMismatch {
                param: self.param,
                dim: cursor,
                expected,
                found,
            }),
            _ => Ok(()),
        }
    }

    /// Execute one op at `at`, appending its planned dimension to `out`.
    pub fn step(
        &self,
        op: DimensionOp,
        at: &Cursors,
        out: &mut Vec<usize>,
    ) -> Result<Advance, BindError> {
        match op {
            DimensionOp::Exact(n) => {
                if self.is_input() {
                    self.expect_input(at.input, n)?;
                }
                out.push(n);
                Ok(Advance::BOTH)
            }
            DimensionOp::AtLeast(n) => {
                if self.is_input() {
                    let found = self.actual_dim(at.input)?;
                    if found < n {
                        return Err(BindError::DimensionTooSmall {
                            param: self.param,
                            dim: at.input,
                            minimum: n,
                            found,
                        });
                    }
                }
                // The literal, not the observed size.
                out.push(n);
                Ok(Advance::BOTH)
            }
            DimensionOp::CopyFromReference => {
                out.push(self.reference_dim(at.reference)?);
                Ok(Advance::BOTH)
            }
            DimensionOp::Add(n) => {
                if self.is_input() {
                    self.expect_input(at.input, n)?;
                }
                out.push(n);
                Ok(Advance::INPUT)
            }
            DimensionOp::Remove(expected) => {
                self.remove_reference(at.reference, expected)?;
                Ok(Advance::REFERENCE)
            }
            DimensionOp::AddRemove { add, remove } => {
                self.remove_reference(at.reference, remove)?;
                out.push(add);
                Ok(Advance::REFERENCE)
            }
            DimensionOp::Accept => {
                out.push(self.actual_dim(at.input)?);
                Ok(Advance::BOTH)
            }
        }
    }

    /// Apply the remaining-dims policy after `explicit` slots ran.
    pub fn finish(
        &self,
        remaining: RemainingDims,
        explicit: usize,
        at: &Cursors,
        out: &mut Vec<usize>,
    ) -> Result<(), BindError> {
        let actual_rest = self.actual.get(at.input..).unwrap_or(&[]);
        match remaining {
            RemainingDims::Arbitrary => {
                if !self.is_input() {
                    return Err(BindError::ArbitraryOutput { param: self.param });
                }
                out.extend_from_slice(actual_rest);
            }
            RemainingDims::EqualToReference | RemainingDims::OneOrEqualToReference => {
                let (_, dims) = self.reference_dims()?;
                let reference_rest = dims.get(at.reference..).unwrap_or(&[]);
                if !self.is_input() {
                    out.extend_from_slice(reference_rest);
                    return Ok(());
                }
                let strict = remaining == RemainingDims::EqualToReference;
                if actual_rest.len() > reference_rest.len() {
                    return Err(BindError::TooManyDimensions {
                        param: self.param,
                        expected: at.input + reference_rest.len(),
                        found: self.actual.len(),
                    });
                }
                if strict && actual_rest.len() < reference_rest.len() {
                    return Err(BindError::TooFewDimensions {
                        param: self.param,
                        needed: at.input + reference_rest.len(),
                        found: self.actual.len(),
                    });
                }
                for (i, (&found, &expected)) in actual_rest.iter().zip(reference_rest).enumerate() {
                    if found != expected && (strict || found != 1) {
                        return Err(BindError::DimensionMismatch {
                            param: self.param,
                            dim: at.input + i,
                            expected,
                            found,
                        });
                    }
                }
                out.extend_from_slice(actual_rest);
            }
            RemainingDims::Absent => {
                if !self.is_input() {
                    return Ok(());
                }
                if explicit == 0 {
                    // Treated as a single dimension of size 1.
                    if let Some((dim, &found)) =
                        self.actual.iter().enumerate().find(|(_, &d)| d != 1)
                    {
                        return Err(BindError::DimensionMismatch {
                            param: self.param,
                            dim,
                            expected: 1,
                            found,
                        });
                    }
                } else if at.input < self.actual.len() {
                    return Err(BindError::TooManyDimensions {
                        param: self.param,
                        expected: at.input,
                        found: self.actual.len(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Run every op of a parameter and its remaining-dims policy.
pub fn resolve_dims(
    walk: &DimWalk<'_>,
    ops: &[DimensionOp],
    remaining: RemainingDims,
) -> Result<Vec<usize>, BindError> {
    let mut at = Cursors::default();
    let mut out = Vec::with_capacity(ops.len());
    while let Some(&op) = ops.get(at.spec) {
        let advance = walk.step(op, &at, &mut out)?;
        at.spec += 1;
        at.input += advance.input;
        at.reference += advance.reference;
    }
    walk.finish(remaining, ops.len(), &at, &mut out)?;
    Ok(out)
}
