// This module is the block data model consumed by the translator's frontend, optimization
// passes and code generation backend. It covers the leaf value types (location descriptors,
// guest condition codes and register names, value types and the opcode table), instruction
// nodes and their argument values, the intrusive instruction list, the Block container with
// its terminal state machine, the word-stream codec used by the JIT cache, the verifier, and
// the diagnostic pretty printer. Blocks own all of their instructions through a per-block
// pool; instructions refer to one another through handles that are only meaningful inside
// the block that minted them.

//! Basic-block intermediate representation.
//!
//! # Key Components
//!
//! ## Block (`block`)
//! - Entry/end locations, entry condition and its fallback, cycle estimates
//! - Ordered instruction sequence with O(1) append and insert-before
//! - Exactly one [`Terminal`], set once and then only replaced
//!
//! ## Codec (`codec`)
//! - Flat 16-bit word encoding with per-section magic markers
//! - Corrupt input is reported, never half-applied
//!
//! ## Printer (`printer`)
//! - Text dump with inline type-error annotations

pub mod arch;
pub mod block;
pub mod codec;
pub mod inst;
mod list;
pub mod location;
pub mod opcode;
pub mod printer;
pub mod terminal;
pub mod types;
pub mod value;
mod verify;

pub use arch::{A32ExtReg, A32Reg, A64Reg, A64Vec, Cond};
pub use block::Block;
pub use codec::{deserialize_terminal, serialize_terminal, WordReader, MAGIC_BLOCK, MAGIC_TERMINAL};
pub use inst::{Inst, InstRef, MAX_ARG_COUNT};
pub use list::Iter;
pub use location::LocationDescriptor;
pub use opcode::{OpInfo, Opcode};
pub use printer::dump_block;
pub use terminal::Terminal;
pub use types::{are_types_compatible, Type};
pub use value::Value;
