// This module holds the infrastructure shared by the IR and the cache: the error taxonomy
// that separates caller bugs from corrupt cache data, the block-scoped pooled allocator that
// owns instruction storage, and helpers for building sample blocks in unit tests. Everything
// here is independent of guest architecture details.

//! Core dynir infrastructure.
//!
//! # Key Components
//!
//! ## Errors (`error`)
//! - [`ContractViolation`] for caller bugs, [`CorruptEntry`] for bad cache data
//! - [`IrError`] wrapping both, with [`IrResult`] as the crate-wide alias
//!
//! ## Pooled Allocation (`pool`)
//! - Arena-backed storage using `bumpalo`, reserved in large chunks
//! - Generation-checked slot handles, bulk deallocation on drop

pub mod error;
pub mod pool;
pub mod test_utils;

pub use error::{ContractViolation, CorruptEntry, IrError, IrResult};
pub use pool::{Pool, SlotId, DEFAULT_CHUNK_SLOTS};
