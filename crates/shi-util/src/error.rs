//! The crate-wide error taxonomy.
//!
//! Each concern gets its own small `thiserror` enum rather than one giant
//! error type — mirroring `faxc-util`'s split of `SymbolError`,
//! `SourceMapError`, `IndexVecError`, and `DiagnosticError`. Here the split
//! follows the taxonomy of the error-handling design instead: reader
//! errors, evaluation errors (arity/type/unbound/user), host I/O errors,
//! and fatal runtime errors that must never be caught by `trap-error`.

use crate::span::Span;

/// Syntax errors raised while reading s-expressions.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReaderError {
    #[error("{0}: unterminated list")]
    UnterminatedList(Span),

    #[error("{0}: stray '{1}'")]
    StrayCloseDelimiter(Span, char),

    #[error("{0}: stray '.'")]
    StrayDot(Span),

    #[error("{0}: alist literal has an odd number of elements")]
    OddAlistCount(Span),

    #[error("{0}: string literal exceeds maximum length of {max} bytes", max = 1000)]
    StringTooLong(Span),

    #[error("{0}: symbol exceeds maximum length of {max} bytes", max = 200)]
    SymbolTooLong(Span),

    #[error("{0}: unknown character '{1}'")]
    UnknownChar(Span, char),

    #[error("{0}: unterminated string literal")]
    UnterminatedString(Span),
}

impl ReaderError {
    pub fn span(&self) -> Span {
        match *self {
            ReaderError::UnterminatedList(s)
            | ReaderError::StrayCloseDelimiter(s, _)
            | ReaderError::StrayDot(s)
            | ReaderError::OddAlistCount(s)
            | ReaderError::StringTooLong(s)
            | ReaderError::SymbolTooLong(s)
            | ReaderError::UnknownChar(s, _)
            | ReaderError::UnterminatedString(s) => s,
        }
    }
}

/// Failures from host-facing primitives (`write`, `open`, `socket`, …).
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported on this platform: {0}")]
    Unsupported(&'static str),

    #[error("unknown file descriptor: {0}")]
    BadFd(i64),

    #[error("short write: wrote {wrote} of {requested} bytes")]
    ShortWrite { wrote: usize, requested: usize },
}

/// Errors raised during evaluation that a `trap-error` rescue frame can
/// catch.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("wrong number of arguments to {form}: expected {expected}, got {got}")]
    Arity {
        form: String,
        expected: String,
        got: usize,
    },

    #[error("wrong type of argument to {form}: expected {expected}")]
    Type { form: String, expected: String },

    #[error("unbound symbol: {0}")]
    Unbound(String),

    #[error("head of a list must be a function")]
    NotCallable,

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("{0}")]
    User(String),
}

/// Fatal conditions that unwind straight past any installed rescue frame.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("memory exhausted")]
    MemoryExhausted,

    #[error("rescue stack overflow: exceeded depth {max}")]
    RescueOverflow { max: usize },

    #[error("garbage collector invariant violated: {0}")]
    GcInvariant(String),
}

/// The evaluator's per-step failure: either a catchable [`EvalError`] (one
/// `trap-error` can rescue) or a fatal [`RuntimeError`] that unwinds past
/// every rescue frame.
///
/// This realizes the design notes' recommendation of a tagged
/// `Result(Value | ErrorKind)` at every recursive evaluation step, shaped
/// so ordinary `?` propagation works: `EvalResult<T>` composes with both
/// `EvalError::into()` and `RuntimeError::into()`, and `trap-error`'s
/// rescue loop matches on the `Fatal` variant to let it pass through
/// uncaught.
#[derive(Debug, thiserror::Error)]
pub enum EvalOutcome {
    #[error(transparent)]
    Error(#[from] EvalError),
    #[error(transparent)]
    Fatal(#[from] RuntimeError),
}

/// The result type threaded through every recursive step of evaluation.
pub type EvalResult<T> = Result<T, EvalOutcome>;
