//! The heap: tagged values, bump allocation, the root registry/handle
//! discipline, the Cheney copying collector, symbol interning, and the
//! prototype-chained Object model (§3, §4.1–§4.4, §4.3, §3.3).
//!
//! Grounded on `fgc`'s crate layout (one crate owning heap + collector +
//! config + error), collapsed from `fgc`'s generational/concurrent design to
//! the single-pass semispace algorithm the core spec describes — see
//! `DESIGN.md` for the full grounding ledger.

pub mod collector;
pub mod config;
pub mod error;
pub mod heap;
pub mod object;
pub mod printer;
pub mod roots;
pub mod symbol;
pub mod value;

pub use config::GcConfig;
pub use error::GcError;
pub use heap::{GcStats, Heap, HeapSlot, BUCKET_COUNT};
pub use roots::{Handle, PinnedHandle};
pub use value::{is_valid_key, Addr, PrimitiveId, Value};
