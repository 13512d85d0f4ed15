// Lexer for calling-convention format strings.
//
// Every grammar symbol is a single character except decimal numbers, so the
// token stream maps one-to-one onto the format text. Uses the `logos` crate
// for DFA-based lexing.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns all tokens with byte-offset spans, plus any lex errors.
// Failure modes: unrecognized characters (whitespace included) produce `LexError`;
//   lexing continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

use crate::type_infer::ElementType;

/// Byte-offset span in format text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Result of lexing: tokens plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// Why a span failed to lex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LexErrorKind {
    #[default]
    UnexpectedCharacter,
    NumberOutOfRange,
}

/// Format-string tokens.
///
/// The format text is embedded verbatim at built-in call sites, so there is
/// no whitespace skipping: a stray space is an error, not a separator.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(error = LexErrorKind)]
pub enum Token {
    // ── Parameter kinds ──
    #[token("i")]
    Input,
    #[token("o")]
    Output,
    #[token("r")]
    Return,

    // ── Element type codes ──
    #[regex(r"[BWLQFDCZS]", type_code)]
    Type(ElementType),

    /// Decimal size or index.
    #[regex(r"[0-9]+", parse_number)]
    Number(usize),

    // ── Symbols ──
    #[token(">")]
    Gt,
    #[token("<")]
    Lt,
    #[token("~")]
    Tilde,
    #[token("^")]
    Caret,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("@")]
    At,
    #[token("=")]
    Equals,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token("*")]
    Star,
    #[token("&")]
    Amp,
    #[token("#")]
    Hash,
    #[token("?")]
    Question,
    #[token(";")]
    Semi,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Input => write!(f, "i"),
            Token::Output => write!(f, "o"),
            Token::Return => write!(f, "r"),
            Token::Type(t) => write!(f, "{}", t.code()),
            Token::Number(n) => write!(f, "{n}"),
            Token::Gt => write!(f, ">"),
            Token::Lt => write!(f, "<"),
            Token::Tilde => write!(f, "~"),
            Token::Caret => write!(f, "^"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::At => write!(f, "@"),
            Token::Equals => write!(f, "="),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Colon => write!(f, ":"),
            Token::Comma => write!(f, ","),
            Token::Star => write!(f, "*"),
            Token::Amp => write!(f, "&"),
            Token::Hash => write!(f, "#"),
            Token::Question => write!(f, "?"),
            Token::Semi => write!(f, ";"),
        }
    }
}

// ── Callbacks ──

fn type_code(lex: &mut logos::Lexer<'_, Token>) -> Option<ElementType> {
    lex.slice().chars().next().and_then(ElementType::from_code)
}

fn parse_number(lex: &mut logos::Lexer<'_, Token>) -> Result<usize, LexErrorKind> {
    lex.slice()
        .parse()
        .map_err(|_| LexErrorKind::NumberOutOfRange)
}

// ── Public API ──

/// Lex a format string into tokens.
///
/// Returns all successfully lexed tokens together with any errors for
/// unrecognised characters.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(kind) => {
                let text = &source[span.start..span.end];
                let message = match kind {
                    LexErrorKind::UnexpectedCharacter => format!("unexpected character: {text:?}"),
                    LexErrorKind::NumberOutOfRange => format!("number out of range: {text}"),
                };
                errors.push(LexError { span, message });
            }
        }
    }

    LexResult { tokens, errors }
}

// ── Tests ──
