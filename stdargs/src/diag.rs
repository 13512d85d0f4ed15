// diag.rs — Diagnostics handed to the interpreter's error channel
//
// Turns a `BindError` into a `Diagnostic` carrying a stable code, the
// offending parameter (1-based when rendered), related parameters and a
// remediation hint.
//
// Preconditions: none.
// Postconditions: every `BindError` variant maps to exactly one code.
// Failure modes: none.
// Side effects: none.

use std::error::Error as _;
use std::fmt;

use crate::error::BindError;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0001`, `E0200`).
///
/// Once assigned, a code must never be reassigned to a different meaning.
/// The hundreds digit follows `ErrorKind`: 0 grammar, 1 arity, 2 shape,
/// 3 reference, 4 host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    pub const E0001: DiagCode = DiagCode("E0001"); // malformed format text
    pub const E0002: DiagCode = DiagCode("E0002"); // arbitrary dims on an output
    pub const E0100: DiagCode = DiagCode("E0100"); // argument count
    pub const E0101: DiagCode = DiagCode("E0101"); // required argument omitted
    pub const E0102: DiagCode = DiagCode("E0102"); // undefined input
    pub const E0200: DiagCode = DiagCode("E0200"); // dimension mismatch
    pub const E0201: DiagCode = DiagCode("E0201"); // dimension below minimum
    pub const E0202: DiagCode = DiagCode("E0202"); // too few dimensions
    pub const E0203: DiagCode = DiagCode("E0203"); // too many dimensions
    pub const E0204: DiagCode = DiagCode("E0204"); // reference shape exhausted
    pub const E0205: DiagCode = DiagCode("E0205"); // axis out of range
    pub const E0206: DiagCode = DiagCode("E0206"); // axis not integral
    pub const E0300: DiagCode = DiagCode("E0300"); // forward reference
    pub const E0301: DiagCode = DiagCode("E0301"); // non-array reference
    pub const E0302: DiagCode = DiagCode("E0302"); // no reference
    pub const E0400: DiagCode = DiagCode("E0400"); // element type undetermined
    pub const E0401: DiagCode = DiagCode("E0401"); // store or loop failure
}

// ── Related parameter ────────────────────────────────────────────────────

/// Another parameter that contributed to the failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedParam {
    pub param: usize,
    pub label: String,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    /// 0-based offending parameter.
    pub param: Option<usize>,
    /// Byte offset into the format text, for grammar errors.
    pub offset: Option<usize>,
    pub message: String,
    pub hint: Option<String>,
    pub related: Vec<RelatedParam>,
    pub cause_chain: Vec<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code, hint, related parameters, or causes.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            param: None,
            offset: None,
            message: message.into(),
            hint: None,
            related: Vec::new(),
            cause_chain: Vec::new(),
        }
    }

    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_related(mut self, param: usize, label: impl Into<String>) -> Self {
        self.related.push(RelatedParam {
            param,
            label: label.into(),
        });
        self
    }

    pub fn with_cause(mut self, message: impl Into<String>) -> Self {
        self.cause_chain.push(message.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = &self.code {
            write!(f, "error[{}]: {}", code, self.message)?;
        } else {
            write!(f, "error: {}", self.message)?;
        }
        for r in &self.related {
            write!(f, "\n  note: {} is parameter #{}", r.label, r.param + 1)?;
        }
        for cause in &self.cause_chain {
            write!(f, "\n  caused by: {cause}")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

fn code_of(err: &BindError) -> DiagCode {
    match err {
        BindError::Grammar(_) => codes::E0001,
        BindError::ArbitraryOutput { .. } => codes::E0002,
        BindError::Arity { .. } => codes::E0100,
        BindError::MissingArgument { .. } => codes::E0101,
        BindError::UndefinedArgument { .. } => codes::E0102,
        BindError::DimensionMismatch { .. } => codes::E0200,
        BindError::DimensionTooSmall { .. } => codes::E0201,
        BindError::TooFewDimensions { .. } => codes::E0202,
        BindError::TooManyDimensions { .. } => codes::E0203,
        BindError::ReferenceExhausted { .. } => codes::E0204,
        BindError::AxisOutOfRange { .. } => codes::E0205,
        BindError::AxisNotIntegral { .. } => codes::E0206,
        BindError::ForwardReference { .. } => codes::E0300,
        BindError::NonArrayReference { .. } => codes::E0301,
        BindError::MissingReference { .. } => codes::E0302,
        BindError::UnresolvedType { .. } => codes::E0400,
        BindError::Host { .. } => codes::E0401,
    }
}

impl From<&BindError> for Diagnostic {
    fn from(err: &BindError) -> Self {
        let mut d = Diagnostic::new(err.to_string()).with_code(code_of(err));
        d.param = err.param();
        match err {
            BindError::Grammar(g) => d.offset = Some(g.offset),
            BindError::ArbitraryOutput { .. } => {
                d = d.with_hint("use `&` or `#` to size the remaining dimensions");
            }
            BindError::MissingArgument { .. } => {
                d = d.with_hint("mark the parameter optional with `?`");
            }
            BindError::ReferenceExhausted { reference, .. } => {
                d = d.with_related(*reference, "the reference");
            }
            BindError::AxisNotIntegral { axis_param, .. } => {
                d = d.with_related(*axis_param, "the axis argument");
            }
            BindError::ForwardReference { reference, .. } => {
                d = d
                    .with_related(*reference, "the reference")
                    .with_hint("outputs can only be referenced once they are bound");
            }
            BindError::NonArrayReference { reference, .. } => {
                d = d.with_related(*reference, "the reference");
            }
            BindError::MissingReference { .. } => {
                d = d.with_hint("name a reference parameter with `[n]`");
            }
            BindError::UnresolvedType { .. } => {
                d = d.with_hint("give the parameter a fixed type");
            }
            BindError::Host { .. } => {
                let mut source = err.source();
                while let Some(cause) = source {
                    d = d.with_cause(cause.to_string());
                    source = cause.source();
                }
            }
            _ => {}
        }
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GrammarError;
    use crate::host::HostError;
    use crate::type_infer::ElementType;

    #[test]
    fn display_without_code() {
        let d = Diagnostic::new("something failed");
        assert_eq!(format!("{d}"), "error: something failed");
    }

    #[test]
    fn display_with_code() {
        let d = Diagnostic::from(&BindError::DimensionMismatch {
            param: 0,
            dim: 0,
            expected: 2,
            found: 3,
        });
        assert_eq!(
            format!("{d}"),
            "error[E0200]: parameter #1, dimension #1: expected 2, found 3"
        );
        assert_eq!(d.param, Some(0));
    }

    #[test]
    fn builder_chain() {
        let d = Diagnostic::new("type mismatch")
            .with_code(codes::E0400)
            .with_hint("give the parameter a fixed type")
            .with_related(2, "the reference")
            .with_cause("no value");

        assert_eq!(d.code, Some(codes::E0400));
        assert_eq!(d.hint.as_deref(), Some("give the parameter a fixed type"));
        assert_eq!(d.related.len(), 1);
        assert_eq!(d.cause_chain.len(), 1);
    }

    #[test]
    fn grammar_errors_keep_offset() {
        let d = Diagnostic::from(&BindError::Grammar(GrammarError::new(5, "oops")));
        assert_eq!(d.code, Some(codes::E0001));
        assert_eq!(d.offset, Some(5));
        assert_eq!(d.param, None);
    }

    #[test]
    fn forward_reference_names_both_parameters() {
        let d = Diagnostic::from(&BindError::ForwardReference {
            param: 0,
            reference: 1,
        });
        assert_eq!(
            d.to_string(),
            "error[E0300]: parameter #1: reference parameter #2 is an output that is not yet defined\n  \
             note: the reference is parameter #2\n  \
             hint: outputs can only be referenced once they are bound"
        );
    }

    #[test]
    fn host_errors_record_their_cause() {
        let d = Diagnostic::from(&BindError::Host {
            param: 1,
            source: HostError::Conversion {
                from: ElementType::String,
                to: ElementType::Float,
            },
        });
        assert_eq!(d.code, Some(codes::E0401));
        assert_eq!(d.cause_chain, vec!["cannot convert string to float".to_string()]);
    }

    #[test]
    fn codes_follow_error_kind() {
        let samples = [
            BindError::ArbitraryOutput { param: 0 },
            BindError::Arity { min: 1, max: 1, found: 0 },
            BindError::AxisOutOfRange { param: 0, axis: 3, rank: 2 },
            BindError::MissingReference { param: 0 },
            BindError::UnresolvedType { param: 0 },
        ];
        for err in &samples {
            let code = Diagnostic::from(err).code.map(|c| c.0);
            let digit = code.and_then(|c| c.chars().nth(2));
            assert_eq!(digit, Some(char::from(b'0' + err.kind() as u8)), "{err}");
        }
    }
}
