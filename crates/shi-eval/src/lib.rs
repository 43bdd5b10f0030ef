//! The evaluator crate: the `Interpreter`, the environment model, the
//! macro-capable apply-form loop, the primitive registry, and the
//! host-facing I/O surface (§3.4, §4.6, §4.7, §6).

pub mod config;
pub mod env;
pub mod eval;
pub mod host;
pub mod interpreter;
pub mod primitives;
pub mod trap;

pub use config::InterpreterConfig;
pub use interpreter::Interpreter;
