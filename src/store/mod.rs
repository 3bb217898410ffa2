//! Store Module - orchestrator state
//!
//! Thread-safe storage shared by every concurrent call of one orchestrator.
//!
//! Key types:
//! - `InputStore`: named external inputs, mutable between runs
//! - `TtlCache`: per-node memoization keyed by resolved arguments
//! - `NodeOutputs`: formatted outputs of the nodes finished in one run

mod cache;
mod inputs;
mod outputs;

pub use cache::{CacheEntrySnapshot, TtlCache};
pub use inputs::InputStore;
pub use outputs::NodeOutputs;
