//! dynir - IR basic blocks for a dynamic binary translator.
//!
//! A [`Block`] is a straight-line run of guest instructions lifted into an
//! intermediate representation, closed by a [`Terminal`] that says where
//! control goes next. Blocks are built by a frontend, transformed by
//! optimization passes, lowered by a backend, and persisted in a JIT cache
//! through a compact 16-bit word encoding.
//!
//! # Primary Usage
//!
//! ```
//! use dynir::{dump_block, Block, LocationDescriptor, Opcode, Terminal, Value, WordReader};
//!
//! let mut block = Block::new(LocationDescriptor::new(0x1000));
//! block.append_new_inst(Opcode::Mul32, &[Value::U32(5), Value::U32(7)])?;
//! block.set_terminal(Terminal::ReturnToDispatch)?;
//!
//! let mut words = Vec::new();
//! block.serialize(&mut words)?;
//!
//! let restored = Block::deserialize(block.location(), &mut WordReader::new(&words))?;
//! assert_eq!(restored.len(), 1);
//! println!("{}", dump_block(&restored));
//! # Ok::<(), dynir::IrError>(())
//! ```
//!
//! # Architecture
//!
//! - [`ir`] - Block, instructions, values, terminals, codec and printer
//! - [`core`] - Shared infrastructure (instruction pool, errors)
//! - [`cache`] - Cache entry envelope and an in-memory block cache

pub mod cache;
pub mod core;
pub mod ir;

pub use crate::cache::{BlockCache, CacheStats};
pub use crate::core::{ContractViolation, CorruptEntry, IrError, IrResult};
pub use crate::ir::{
    dump_block, Block, Cond, Inst, InstRef, LocationDescriptor, Opcode, Terminal, Type, Value, WordReader,
};
