// This module defines the instruction node stored in a block's pool. An Inst carries its
// opcode, a fixed array of argument slots sized for the widest opcode, the number of other
// instructions that reference it, and an optional display name used only by the printer.
// The node also holds the prev/next links of the block's intrusive instruction list; those
// links and the use count are maintained by Block, never by callers. Detached nodes can be
// built with Inst::with_args and later moved into a block, which is how the cache codec
// rehydrates instructions: Inst::deserialize resolves back-references against the prefix of
// instructions already materialised for the block being decoded.

//! Instruction nodes.

use std::fmt;

use hashbrown::HashMap;

use super::codec::WordReader;
use super::opcode::Opcode;
use super::value::Value;
use crate::core::pool::SlotId;
use crate::core::{ContractViolation, CorruptEntry, IrResult};

/// Maximum number of argument slots of any opcode.
pub const MAX_ARG_COUNT: usize = 4;

/// Handle to an instruction owned by a block.
///
/// Handles stay valid for the lifetime of the block, across insertions
/// anywhere in the sequence, and are rejected by any other block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstRef(pub(crate) SlotId);

impl InstRef {
    /// Allocation index within the owning block.
    pub fn index(self) -> u32 {
        self.0.index()
    }
}

impl fmt::Display for InstRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A single IR instruction.
#[derive(Debug, Clone)]
pub struct Inst {
    opcode: Opcode,
    args: [Value; MAX_ARG_COUNT],
    use_count: u32,
    name: u32,
    pub(crate) prev: Option<InstRef>,
    pub(crate) next: Option<InstRef>,
    pub(crate) linked: bool,
}

impl Inst {
    /// Create an instruction with every argument slot empty.
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            args: [Value::Empty; MAX_ARG_COUNT],
            use_count: 0,
            name: 0,
            prev: None,
            next: None,
            linked: false,
        }
    }

    /// Create an instruction binding `args` positionally.
    pub fn with_args(opcode: Opcode, args: &[Value]) -> IrResult<Self> {
        if args.len() != opcode.num_args() {
            return Err(ContractViolation::ArgCount {
                opcode,
                expected: opcode.num_args(),
                got: args.len(),
            }
            .into());
        }

        let mut inst = Self::new(opcode);
        inst.args[..args.len()].copy_from_slice(args);
        Ok(inst)
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn num_args(&self) -> usize {
        self.opcode.num_args()
    }

    /// Argument slot `index`, or `None` past the opcode's argument count.
    pub fn arg(&self, index: usize) -> Option<Value> {
        self.args().get(index).copied()
    }

    /// The opcode's argument slots in order.
    pub fn args(&self) -> &[Value] {
        &self.args[..self.num_args()]
    }

    /// Number of instructions whose arguments reference this one.
    pub fn use_count(&self) -> u32 {
        self.use_count
    }

    pub fn has_uses(&self) -> bool {
        self.use_count > 0
    }

    /// Display name; 0 means unnamed.
    pub fn name(&self) -> u32 {
        self.name
    }

    pub fn set_name(&mut self, name: u32) {
        self.name = name;
    }

    pub(crate) fn set_arg_unchecked(&mut self, index: usize, value: Value) {
        self.args[index] = value;
    }

    pub(crate) fn add_use(&mut self) {
        self.use_count += 1;
    }

    pub(crate) fn remove_use(&mut self) {
        debug_assert!(self.use_count > 0, "use count underflow");
        self.use_count = self.use_count.saturating_sub(1);
    }

    /// Reset block bookkeeping before the node is moved into a block.
    pub(crate) fn detach(&mut self) {
        self.use_count = 0;
        self.prev = None;
        self.next = None;
        self.linked = false;
    }

    /// Append `OPCODE NAME_LO NAME_HI ARG*`.
    pub fn serialize(&self, positions: &HashMap<InstRef, u16>, out: &mut Vec<u16>) -> IrResult<()> {
        out.push(self.opcode.raw());
        out.push(self.name as u16);
        out.push((self.name >> 16) as u16);
        for arg in self.args() {
            arg.serialize(positions, out)?;
        }
        Ok(())
    }

    /// Decode a detached instruction whose references resolve into `prefix`.
    pub fn deserialize(prefix: &[InstRef], reader: &mut WordReader<'_>) -> Result<Self, CorruptEntry> {
        let raw = reader.read()?;
        let opcode = Opcode::from_raw(raw).ok_or(CorruptEntry::UnknownOpcode(raw))?;

        let mut inst = Self::new(opcode);
        inst.name = reader.read_u32()?;
        for index in 0..opcode.num_args() {
            inst.args[index] = Value::deserialize(prefix, reader)?;
        }
        Ok(inst)
    }
}
