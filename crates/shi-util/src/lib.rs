//! Shared, GC-independent infrastructure used across the `shi` workspace.
//!
//! This crate carries the parts of the runtime that have nothing to do with
//! the heap or the evaluator: source positions, a typed index-vector
//! utility, and the crate-wide error taxonomy. Splitting these out keeps
//! `shi-gc`, `shi-reader`, and `shi-eval` each focused on one concern, the
//! way the teacher workspace splits `faxc-util` out from the compiler
//! phases that depend on it.

pub mod error;
pub mod index_vec;
pub mod span;

pub use error::{EvalError, EvalOutcome, EvalResult, HostError, ReaderError, RuntimeError};
pub use index_vec::{Idx, IndexVec};
pub use span::Span;
