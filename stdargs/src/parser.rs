// Parser for calling-convention format strings.
//
// Parses the token stream from `lexer::lex()` into parameter records using
// chumsky combinators, folds dimension slots into `DimensionOp`s, and hands
// the result to `ParameterSpecList::validate` for the cross-parameter checks.
//
// Preconditions: none (lex errors are reported as grammar errors).
// Postconditions: a fully validated `ParameterSpecList`, or the first error.
// Failure modes: any lexical, syntactic or semantic error rejects the whole
//   format; there is no partial result.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::error::GrammarError;
use crate::lexer::Token;
use crate::spec::{
    default_remaining, DimensionOp, ParamKind, ParameterSpec, ParameterSpecList, RemainingDims,
};
use crate::type_infer::TypeLimit;

/// Atoms written between two commas, before folding.
#[derive(Debug, Clone)]
struct RawSlot {
    ops: Vec<DimensionOp>,
    offset: usize,
}

#[derive(Debug, Clone)]
struct RawParam {
    spec: ParameterSpec,
    slots: Vec<RawSlot>,
    remaining: Option<RemainingDims>,
    offset: usize,
}

/// Parse a format string into a validated specification list.
pub fn parse(source: &str) -> Result<ParameterSpecList, GrammarError> {
    let lex_result = crate::lexer::lex(source);
    if let Some(err) = lex_result.errors.first() {
        return Err(GrammarError::new(err.span.start, err.message.clone()));
    }
    let len = source.len();

    // Convert lexer output to chumsky stream.
    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let raw = format_parser()
        .parse(stream)
        .into_result()
        .map_err(|errors| match errors.first() {
            Some(e) => GrammarError::new(e.span().start, e.to_string()),
            None => GrammarError::new(0, "malformed format"),
        })?;

    let mut params = Vec::with_capacity(raw.len());
    let mut offsets = Vec::with_capacity(raw.len());
    for param in raw {
        offsets.push(param.offset);
        params.push(fold_param(param)?);
    }
    ParameterSpecList::validate(params, &offsets)
}

/// Fold raw slots into dimension ops and fill in the default policy.
fn fold_param(raw: RawParam) -> Result<ParameterSpec, GrammarError> {
    let mut spec = raw.spec;
    spec.dims = raw
        .slots
        .into_iter()
        .map(fold_slot)
        .collect::<Result<Vec<_>, _>>()?;
    spec.remaining = raw
        .remaining
        .unwrap_or_else(|| default_remaining(spec.kind, spec.dims.len()));
    Ok(spec)
}

/// Only `+n` and `-[m]` may share a slot.
fn fold_slot(slot: RawSlot) -> Result<DimensionOp, GrammarError> {
    match slot.ops.as_slice() {
        [op] => Ok(*op),
        [DimensionOp::Add(add), DimensionOp::Remove(remove)]
        | [DimensionOp::Remove(remove), DimensionOp::Add(add)] => Ok(DimensionOp::AddRemove {
            add: *add,
            remove: *remove,
        }),
        _ => Err(GrammarError::new(
            slot.offset,
            "conflicting dimension operations in one slot",
        )),
    }
}

// ── Grammar ──

fn format_parser<'tokens, I>(
) -> impl Parser<'tokens, I, Vec<RawParam>, extra::Err<Rich<'tokens, Token, SimpleSpan>>>
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    let number = select! { Token::Number(n) => n };
    let type_code = select! { Token::Type(t) => t };

    let kind = select! {
        Token::Input => ParamKind::Input,
        Token::Output => ParamKind::Output,
        Token::Return => ParamKind::Return,
    };

    // `>` followed by a type is a type limit; followed by digits it is an
    // at-least dimension, handled by `atom` below.
    let limit_type = choice((
        just(Token::Gt)
            .ignore_then(type_code.clone())
            .map(|t| (TypeLimit::Lower, Some(t))),
        just(Token::Lt)
            .ignore_then(type_code.clone())
            .map(|t| (TypeLimit::Upper, Some(t))),
        just(Token::Tilde)
            .ignore_then(type_code.clone().or_not())
            .map(|t| (TypeLimit::ForceInteger, t)),
        type_code.map(|t| (TypeLimit::Exact, Some(t))),
    ))
    .or_not()
    .map(|lt| lt.unwrap_or((TypeLimit::Exact, None)));

    let flag = |token: Token| just(token).or_not().map(|t| t.is_some());

    let reference = number
        .clone()
        .delimited_by(just(Token::LBracket), just(Token::RBracket))
        .or_not();
    let axis = number
        .clone()
        .delimited_by(just(Token::LBrace), just(Token::RBrace))
        .or_not();

    let atom = choice((
        number.clone().map(DimensionOp::Exact),
        just(Token::Gt)
            .ignore_then(number.clone())
            .map(DimensionOp::AtLeast),
        just(Token::Equals).to(DimensionOp::CopyFromReference),
        just(Token::Plus).ignore_then(number.clone()).map(DimensionOp::Add),
        just(Token::Minus)
            .ignore_then(number.or_not())
            .map(DimensionOp::Remove),
        just(Token::Colon).to(DimensionOp::Accept),
    ));

    let slot = atom
        .repeated()
        .at_least(1)
        .collect::<Vec<_>>()
        .map_with(|ops, e| {
            let span: SimpleSpan = e.span();
            RawSlot {
                ops,
                offset: span.start,
            }
        });

    let slots = slot.separated_by(just(Token::Comma)).collect::<Vec<_>>();

    let remaining = select! {
        Token::Star => RemainingDims::Arbitrary,
        Token::Amp => RemainingDims::EqualToReference,
        Token::Hash => RemainingDims::OneOrEqualToReference,
    }
    .or_not();

    let param = kind
        .then(limit_type)
        .then(flag(Token::Caret))
        .then(reference)
        .then(axis)
        .then(flag(Token::At))
        .then(slots)
        .then(remaining)
        .then(flag(Token::Question))
        .map_with(
            |((((((((kind, (limit, fixed_type)), common), reference), axis), omit), slots), remaining), optional),
             e| {
                let span: SimpleSpan = e.span();
                let mut spec = ParameterSpec::new(kind);
                spec.fixed_type = fixed_type;
                spec.limit = limit;
                spec.common_type = common;
                spec.reference = reference;
                spec.axis = axis;
                spec.omit_unit_dims = omit;
                spec.optional = optional;
                RawParam {
                    spec,
                    slots,
                    remaining,
                    offset: span.start,
                }
            },
        );

    param
        .separated_by(just(Token::Semi))
        .at_least(1)
        .collect::<Vec<_>>()
        .then_ignore(end())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_infer::ElementType;

    fn parse_ok(source: &str) -> ParameterSpecList {
        match parse(source) {
            Ok(list) => list,
            Err(e) => panic!("parse of {source:?} failed: {e}"),
        }
    }

    fn only(source: &str) -> ParameterSpec {
        let list = parse_ok(source);
        assert_eq!(list.len(), 1);
        list.params()[0].clone()
    }

    #[test]
    fn bare_input_accepts_anything() {
        let p = only("i");
        assert_eq!(p.kind, ParamKind::Input);
        assert_eq!(p.fixed_type, None);
        assert!(p.dims.is_empty());
        assert_eq!(p.remaining, RemainingDims::Arbitrary);
    }

    #[test]
    fn exact_dimension() {
        let p = only("i2");
        assert_eq!(p.dims, vec![DimensionOp::Exact(2)]);
        assert_eq!(p.remaining, RemainingDims::Absent);
    }

    #[test]
    fn gt_before_digits_is_at_least() {
        let p = only("i>3");
        assert_eq!(p.limit, TypeLimit::Exact);
        assert_eq!(p.fixed_type, None);
        assert_eq!(p.dims, vec![DimensionOp::AtLeast(3)]);
    }

    #[test]
    fn gt_before_type_is_lower_limit() {
        let p = only("i>L>3");
        assert_eq!(p.limit, TypeLimit::Lower);
        assert_eq!(p.fixed_type, Some(ElementType::Int32));
        assert_eq!(p.dims, vec![DimensionOp::AtLeast(3)]);
    }

    #[test]
    fn force_integer_without_type() {
        let p = only("i~*");
        assert_eq!(p.limit, TypeLimit::ForceInteger);
        assert_eq!(p.fixed_type, None);
        assert_eq!(p.remaining, RemainingDims::Arbitrary);
    }

    #[test]
    fn full_parameter() {
        let list = parse_ok("iD*;iL;o<F^[0]{1}@=,+2-3,-,:#?");
        let p = &list.params()[2];
        assert_eq!(p.kind, ParamKind::Output);
        assert_eq!(p.limit, TypeLimit::Upper);
        assert_eq!(p.fixed_type, Some(ElementType::Float));
        assert!(p.common_type);
        assert_eq!(p.reference, Some(0));
        assert_eq!(p.axis, Some(1));
        assert!(p.omit_unit_dims);
        assert_eq!(
            p.dims,
            vec![
                DimensionOp::CopyFromReference,
                DimensionOp::AddRemove {
                    add: 2,
                    remove: Some(3)
                },
                DimensionOp::Remove(None),
                DimensionOp::Accept,
            ]
        );
        assert_eq!(p.remaining, RemainingDims::OneOrEqualToReference);
        assert!(p.optional);
    }

    #[test]
    fn remove_then_add_also_folds() {
        let p = only("o-+4");
        assert_eq!(
            p.dims,
            vec![DimensionOp::AddRemove {
                add: 4,
                remove: None
            }]
        );
    }

    #[test]
    fn return_normalized_last() {
        let list = parse_ok("rD&;iD*");
        assert!(list.has_return());
        assert_eq!(list.params()[0].kind, ParamKind::Input);
        assert_eq!(list.params()[1].kind, ParamKind::Return);
    }

    #[test]
    fn parsing_is_deterministic() {
        let text = "iF^*;iL^[0]=,>2&;rF^&";
        assert_eq!(parse_ok(text), parse_ok(text));
    }

    #[test]
    fn canonical_text_round_trips() {
        for text in ["i", "i2", "i>3", "iD;iL;o<F^[0]{1}@=,+2-3,-,:#?", "i;i=", "iB;r~L&"] {
            let list = parse_ok(text);
            assert_eq!(list.to_string(), text);
        }
    }

    #[test]
    fn error_multiple_returns() {
        let err = parse("r;iD;r").unwrap_err();
        assert_eq!(err.offset, 5);
        assert!(err.message.contains("more than one return"));
    }

    #[test]
    fn error_unknown_kind() {
        let err = parse("x2").unwrap_err();
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn error_unknown_type() {
        assert!(parse("iX").is_err());
    }

    #[test]
    fn error_unmatched_brackets() {
        assert!(parse("i;i[0").is_err());
        assert!(parse("i;o{0").is_err());
        assert!(parse("i;i0]").is_err());
    }

    #[test]
    fn error_reference_out_of_range() {
        let err = parse("i;o[2]&").unwrap_err();
        assert!(err.message.contains("out of range"), "{err}");
        // The return does not count.
        assert!(parse("i;r[1]&").is_err());
        assert!(parse("i;o;r[1]&").is_ok());
    }

    #[test]
    fn error_self_axis() {
        assert!(parse("i;o{1}").is_err());
    }

    #[test]
    fn error_conflicting_slot() {
        let err = parse("o+2+3").unwrap_err();
        assert_eq!(err.offset, 1);
        assert!(parse("i2=").is_err());
    }

    #[test]
    fn error_arbitrary_output() {
        assert!(parse("i;o*").is_err());
        assert!(parse("i;r*").is_err());
    }

    #[test]
    fn error_empty_and_trailing() {
        assert!(parse("").is_err());
        assert!(parse("i;").is_err());
        assert!(parse("i2,").is_err());
        assert!(parse("i2,,3").is_err());
    }
}
