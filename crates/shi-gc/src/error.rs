//! The `shi-gc` crate's own error type, covering configuration failures.
//! Allocation failures are fatal and use [`shi_util::error::RuntimeError`]
//! directly, since they must never be catchable by `trap-error` (§7).

use crate::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GcError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}
