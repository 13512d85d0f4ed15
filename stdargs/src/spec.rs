// spec.rs — Compiled calling-convention specifications
//
// A `ParameterSpecList` is the immutable, shareable form of one format string:
// one `ParameterSpec` per call argument (plus an optional return value), each
// carrying closed enums for its kind, type limit, dimension ops and
// remaining-dimension policy. Nothing downstream looks at format characters.
//
// Preconditions: lists come from `parser::parse` or `ParameterSpecList::new`.
// Postconditions: at most one Return, stored last; reference and axis indices
//   are within the input/output count; no Arbitrary output policy.
// Failure modes: `GrammarError` for any violated invariant.
// Side effects: none.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GrammarError;
use crate::type_infer::{ElementType, TypeLimit};

// ── Parameter pieces ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamKind {
    Input,
    Output,
    Return,
}

impl ParamKind {
    pub fn code(self) -> char {
        match self {
            ParamKind::Input => 'i',
            ParamKind::Output => 'o',
            ParamKind::Return => 'r',
        }
    }

    /// Outputs and the return value are shaped by the binder.
    pub fn is_produced(self) -> bool {
        !matches!(self, ParamKind::Input)
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::Input => "input",
            ParamKind::Output => "output",
            ParamKind::Return => "return",
        };
        f.write_str(name)
    }
}

/// One explicit dimension slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DimensionOp {
    /// `n`: the dimension equals `n`.
    Exact(usize),
    /// `>n`: the input dimension is at least `n`; outputs get exactly `n`.
    AtLeast(usize),
    /// `=`: take the next reference dimension.
    CopyFromReference,
    /// `+n`: a dimension of size `n` that the reference does not have.
    Add(usize),
    /// `-` / `-n`: skip one reference dimension, optionally checking its size.
    Remove(Option<usize>),
    /// `+n-m`: replace one reference dimension by one of size `add`.
    AddRemove { add: usize, remove: Option<usize> },
    /// `:`: take the next dimension of the actual argument.
    Accept,
}

impl fmt::Display for DimensionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimensionOp::Exact(n) => write!(f, "{n}"),
            DimensionOp::AtLeast(n) => write!(f, ">{n}"),
            DimensionOp::CopyFromReference => write!(f, "="),
            DimensionOp::Add(n) => write!(f, "+{n}"),
            DimensionOp::Remove(None) => write!(f, "-"),
            DimensionOp::Remove(Some(n)) => write!(f, "-{n}"),
            DimensionOp::AddRemove { add, remove: None } => write!(f, "+{add}-"),
            DimensionOp::AddRemove {
                add,
                remove: Some(n),
            } => write!(f, "+{add}-{n}"),
            DimensionOp::Accept => write!(f, ":"),
        }
    }
}

/// What happens to dimensions left over after the explicit slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemainingDims {
    /// `*`: anything (inputs only).
    Arbitrary,
    /// `&`: equal to the remaining reference dimensions.
    EqualToReference,
    /// `#`: each 1 or equal to the corresponding reference dimension.
    OneOrEqualToReference,
    /// No marker: nothing may remain.
    Absent,
}

impl RemainingDims {
    pub fn code(self) -> Option<char> {
        match self {
            RemainingDims::Arbitrary => Some('*'),
            RemainingDims::EqualToReference => Some('&'),
            RemainingDims::OneOrEqualToReference => Some('#'),
            RemainingDims::Absent => None,
        }
    }
}

// ── ParameterSpec ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub kind: ParamKind,
    pub fixed_type: Option<ElementType>,
    pub limit: TypeLimit,
    /// Index (among inputs/outputs) of the parameter whose shape this one follows.
    /// `None` means "the previous parameter".
    pub reference: Option<usize>,
    /// Index of the parameter holding axis numbers.
    pub axis: Option<usize>,
    pub common_type: bool,
    pub omit_unit_dims: bool,
    pub dims: Vec<DimensionOp>,
    pub remaining: RemainingDims,
    pub optional: bool,
}

impl ParameterSpec {
    /// An unconstrained parameter of the given kind with no dimension slots.
    pub fn new(kind: ParamKind) -> Self {
        Self {
            kind,
            fixed_type: None,
            limit: TypeLimit::Exact,
            reference: None,
            axis: None,
            common_type: false,
            omit_unit_dims: false,
            dims: Vec::new(),
            remaining: default_remaining(kind, 0),
            optional: false,
        }
    }
}

/// Policy used when the format gives no remaining-dims marker.
pub fn default_remaining(kind: ParamKind, slot_count: usize) -> RemainingDims {
    if kind == ParamKind::Input && slot_count == 0 {
        RemainingDims::Arbitrary
    } else {
        RemainingDims::Absent
    }
}

impl fmt::Display for ParameterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.code())?;
        if let Some(c) = self.limit.code() {
            write!(f, "{c}")?;
        }
        if let Some(t) = self.fixed_type {
            write!(f, "{}", t.code())?;
        }
        if self.common_type {
            write!(f, "^")?;
        }
        if let Some(r) = self.reference {
            write!(f, "[{r}]")?;
        }
        if let Some(a) = self.axis {
            write!(f, "{{{a}}}")?;
        }
        if self.omit_unit_dims {
            write!(f, "@")?;
        }
        for (i, op) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{op}")?;
        }
        if self.remaining != default_remaining(self.kind, self.dims.len()) {
            if let Some(c) = self.remaining.code() {
                write!(f, "{c}")?;
            }
        }
        if self.optional {
            write!(f, "?")?;
        }
        Ok(())
    }
}

// ── ParameterSpecList ───────────────────────────────────────────────────────

/// Compiled form of one format string. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterSpecList {
    params: Vec<ParameterSpec>,
    has_return: bool,
}

impl ParameterSpecList {
    /// Parse format text.
    pub fn parse(format: &str) -> Result<Self, GrammarError> {
        crate::parser::parse(format)
    }

    /// Validate and normalize hand-built specs. Errors report offset 0.
    pub fn new(params: Vec<ParameterSpec>) -> Result<Self, GrammarError> {
        let offsets = vec![0; params.len()];
        Self::validate(params, &offsets)
    }

    /// Check the list invariants. `offsets[i]` is where parameter `i` starts
    /// in the format text.
    pub(crate) fn validate(
        params: Vec<ParameterSpec>,
        offsets: &[usize],
    ) -> Result<Self, GrammarError> {
        if params.is_empty() {
            return Err(GrammarError::new(0, "no parameters"));
        }

        let mut entries: Vec<(ParameterSpec, usize)> = params
            .into_iter()
            .zip(offsets.iter().copied().chain(std::iter::repeat(0)))
            .collect();

        let mut returns = entries
            .iter()
            .filter(|(p, _)| p.kind == ParamKind::Return)
            .map(|(_, offset)| *offset);
        let has_return = returns.next().is_some();
        if let Some(offset) = returns.next() {
            return Err(GrammarError::new(offset, "more than one return parameter"));
        }
        // Stable: inputs/outputs keep their order, the return goes last.
        entries.sort_by_key(|(p, _)| p.kind == ParamKind::Return);

        let in_out = entries.len() - usize::from(has_return);
        for (index, (param, offset)) in entries.iter().enumerate() {
            if let Some(r) = param.reference {
                if r >= in_out {
                    return Err(GrammarError::new(
                        *offset,
                        format!(
                            "reference parameter index {r} out of range ({in_out} inputs/outputs)"
                        ),
                    ));
                }
            }
            if let Some(a) = param.axis {
                if a >= in_out {
                    return Err(GrammarError::new(
                        *offset,
                        format!("axis parameter index {a} out of range ({in_out} inputs/outputs)"),
                    ));
                }
                if a == index {
                    return Err(GrammarError::new(
                        *offset,
                        "parameter cannot be its own axis parameter",
                    ));
                }
            }
            if matches!(param.limit, TypeLimit::Lower | TypeLimit::Upper)
                && param.fixed_type.is_none()
            {
                return Err(GrammarError::new(
                    *offset,
                    "type limit `>` or `<` requires a type code",
                ));
            }
            if param.kind.is_produced() && param.remaining == RemainingDims::Arbitrary {
                return Err(GrammarError::new(
                    *offset,
                    format!("arbitrary remaining dimensions on {} parameter", param.kind),
                ));
            }
        }

        Ok(Self {
            params: entries.into_iter().map(|(p, _)| p).collect(),
            has_return,
        })
    }

    pub fn params(&self) -> &[ParameterSpec] {
        &self.params
    }

    pub fn get(&self, index: usize) -> Option<&ParameterSpec> {
        self.params.get(index)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn has_return(&self) -> bool {
        self.has_return
    }

    /// Number of parameters that correspond to call arguments.
    pub fn in_out_count(&self) -> usize {
        self.params.len() - usize::from(self.has_return)
    }

    pub fn return_spec(&self) -> Option<&ParameterSpec> {
        if self.has_return {
            self.params.last()
        } else {
            None
        }
    }

    /// Accepted argument counts: everything up to the last required
    /// input/output is mandatory.
    pub fn arity(&self) -> (usize, usize) {
        let max = self.in_out_count();
        let min = self.params[..max]
            .iter()
            .rposition(|p| !p.optional)
            .map_or(0, |i| i + 1);
        (min, max)
    }
}

impl fmt::Display for ParameterSpecList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ";")?;
            }
            write!(f, "{p}")?;
        }
        Ok(())
    }
}
