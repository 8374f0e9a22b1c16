// This module implements Block, the unit of translation. A block records where it starts
// and ends in the guest program, the condition under which it executes, the fallback location
// and cycle estimate for when that condition fails, an estimate of cycles consumed by its body,
// an ordered instruction sequence, and exactly one terminal. Every instruction node lives in
// the block's own pool and is addressed through generation-checked InstRef handles, so a block
// can be moved between threads as a unit and handles from other blocks are rejected. The
// sequence is an intrusive list inside the pooled nodes: appending and inserting before any
// existing instruction are O(1) and leave all other handles valid. Argument references are
// non-owning and keep exact use counts. The terminal starts unset, may be set once, and after
// that may only be replaced.

//! Basic block container.

use std::fmt;
use std::ops::Index;

use super::arch::Cond;
use super::inst::{Inst, InstRef};
use super::list::{InstList, Iter};
use super::location::LocationDescriptor;
use super::opcode::Opcode;
use super::terminal::Terminal;
use super::types::Type;
use super::value::Value;
use crate::core::pool::{Pool, DEFAULT_CHUNK_SLOTS};
use crate::core::{ContractViolation, IrResult};

/// A straight-line run of lifted guest instructions and its exit.
pub struct Block {
    /// Entry point; fixed at construction.
    location: LocationDescriptor,
    /// First location after the block.
    end_location: LocationDescriptor,
    /// Entry condition.
    cond: Cond,
    /// Where to go when `cond` fails.
    cond_failed: Option<LocationDescriptor>,
    /// Cycles charged when `cond` fails.
    cond_failed_cycle_count: usize,
    /// Cycles charged for the block body.
    cycle_count: usize,
    instructions: InstList,
    terminal: Terminal,
    /// Storage for every instruction in `instructions`.
    instruction_alloc_pool: Pool<Inst>,
}

impl Block {
    /// Create an empty block starting at `location`.
    pub fn new(location: LocationDescriptor) -> Self {
        Self::with_chunk_capacity(location, DEFAULT_CHUNK_SLOTS)
    }

    /// Create an empty block whose pool reserves `slots` instructions per chunk.
    pub fn with_chunk_capacity(location: LocationDescriptor, slots: usize) -> Self {
        Self {
            location,
            end_location: location,
            cond: Cond::AL,
            cond_failed: None,
            cond_failed_cycle_count: 0,
            cycle_count: 0,
            instructions: InstList::default(),
            terminal: Terminal::Invalid,
            instruction_alloc_pool: Pool::with_chunk_slots(slots),
        }
    }

    pub fn location(&self) -> LocationDescriptor {
        self.location
    }

    pub fn end_location(&self) -> LocationDescriptor {
        self.end_location
    }

    pub fn set_end_location(&mut self, location: LocationDescriptor) {
        self.end_location = location;
    }

    pub fn condition(&self) -> Cond {
        self.cond
    }

    pub fn set_condition(&mut self, cond: Cond) {
        self.cond = cond;
    }

    /// Location to continue at when the entry condition fails.
    pub fn condition_failed_location(&self) -> Option<LocationDescriptor> {
        self.cond_failed
    }

    pub fn set_condition_failed_location(&mut self, location: LocationDescriptor) {
        self.cond_failed = Some(location);
    }

    pub fn has_condition_failed_location(&self) -> bool {
        self.cond_failed.is_some()
    }

    pub fn condition_failed_cycle_count(&self) -> usize {
        self.cond_failed_cycle_count
    }

    pub fn set_condition_failed_cycle_count(&mut self, cycles: usize) {
        self.cond_failed_cycle_count = cycles;
    }

    pub fn cycle_count(&self) -> usize {
        self.cycle_count
    }

    pub fn set_cycle_count(&mut self, cycles: usize) {
        self.cycle_count = cycles;
    }

    /// Charge `cycles` more to the block body.
    pub fn add_cycles(&mut self, cycles: usize) {
        self.cycle_count += cycles;
    }

    /// Instructions reserved per pool chunk.
    pub fn chunk_capacity(&self) -> usize {
        self.instruction_alloc_pool.chunk_slots()
    }

    /// Number of instructions in the sequence.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.len() == 0
    }

    /// First instruction in program order.
    pub fn front(&self) -> Option<InstRef> {
        self.instructions.head()
    }

    /// Last instruction in program order.
    pub fn back(&self) -> Option<InstRef> {
        self.instructions.tail()
    }

    /// Instructions in program order.
    pub fn iter(&self) -> Iter<'_> {
        self.instructions.iter(&self.instruction_alloc_pool)
    }

    /// The instruction behind `inst`, including erased ones.
    pub fn get(&self, inst: InstRef) -> Option<&Inst> {
        self.instruction_alloc_pool.get(inst.0)
    }

    /// Mutable access for display names; arguments go through [`Block::set_arg`].
    pub fn set_name(&mut self, inst: InstRef, name: u32) -> IrResult<()> {
        self.resolve(inst)?;
        self.node_mut(inst).set_name(name);
        Ok(())
    }

    /// Whether `inst` belongs to this block and is still in the sequence.
    pub fn contains(&self, inst: InstRef) -> bool {
        self.get(inst).is_some_and(|node| node.linked)
    }

    /// Type produced by `value` in the context of this block.
    pub fn value_type(&self, value: Value) -> Type {
        match value {
            Value::Inst(inst) => self.get(inst).map_or(Type::Void, |node| node.opcode().result_type()),
            other => other.immediate_type().unwrap_or(Type::Void),
        }
    }

    /// Construct an instruction and add it at the end of the sequence.
    pub fn append_new_inst(&mut self, opcode: Opcode, args: &[Value]) -> IrResult<InstRef> {
        let inst = Inst::with_args(opcode, args)?;
        self.insert(None, inst)
    }

    /// Move a detached instruction to the end of the sequence.
    pub fn append_inst(&mut self, inst: Inst) -> IrResult<InstRef> {
        self.insert(None, inst)
    }

    /// Construct an instruction and insert it immediately before `before`.
    pub fn prepend_new_inst(&mut self, before: InstRef, opcode: Opcode, args: &[Value]) -> IrResult<InstRef> {
        let inst = Inst::with_args(opcode, args)?;
        self.insert(Some(before), inst)
    }

    /// Move a detached instruction immediately before `before`.
    pub fn prepend_inst(&mut self, before: InstRef, inst: Inst) -> IrResult<InstRef> {
        self.insert(Some(before), inst)
    }

    fn insert(&mut self, before: Option<InstRef>, mut inst: Inst) -> IrResult<InstRef> {
        if let Some(before) = before {
            self.resolve_linked(before)?;
        }
        for arg in inst.args() {
            if let Value::Inst(used) = *arg {
                self.resolve_linked(used)?;
            }
        }

        for arg in inst.args() {
            if let Value::Inst(used) = *arg {
                self.node_mut(used).add_use();
            }
        }

        inst.detach();
        let opcode = inst.opcode();
        let new = InstRef(self.instruction_alloc_pool.alloc(inst));
        self.instructions.insert_before(&mut self.instruction_alloc_pool, before, new);

        log::trace!("block {}: inserted {} {}", self.location, new, opcode);
        Ok(new)
    }

    /// Rebind argument `index` of `inst`, keeping use counts exact.
    pub fn set_arg(&mut self, inst: InstRef, index: usize, value: Value) -> IrResult<()> {
        let node = self.resolve_linked(inst)?;
        let opcode = node.opcode();
        let old = node.arg(index).ok_or(ContractViolation::ArgIndex { opcode, index })?;

        if let Value::Inst(used) = value {
            if used == inst {
                return Err(ContractViolation::SelfReference(inst).into());
            }
            self.resolve_linked(used)?;
        }

        if let Value::Inst(previous) = old {
            self.node_mut(previous).remove_use();
        }
        if let Value::Inst(used) = value {
            self.node_mut(used).add_use();
        }
        self.node_mut(inst).set_arg_unchecked(index, value);
        Ok(())
    }

    /// Empty every argument slot of `inst`.
    pub fn clear_args(&mut self, inst: InstRef) -> IrResult<()> {
        let count = self.resolve_linked(inst)?.num_args();
        for index in 0..count {
            self.set_arg(inst, index, Value::Empty)?;
        }
        Ok(())
    }

    /// Point every argument that references `inst` at `replacement` instead.
    pub fn replace_uses_with(&mut self, inst: InstRef, replacement: Value) -> IrResult<()> {
        self.resolve_linked(inst)?;
        if let Value::Inst(target) = replacement {
            if target == inst {
                return Err(ContractViolation::SelfReference(inst).into());
            }
            self.resolve_linked(target)?;
        }

        let mut sites = Vec::new();
        for (user, node) in self.iter() {
            for (index, arg) in node.args().iter().enumerate() {
                if *arg == Value::Inst(inst) {
                    if replacement == Value::Inst(user) {
                        return Err(ContractViolation::SelfReference(user).into());
                    }
                    sites.push((user, index));
                }
            }
        }

        for (user, index) in sites {
            self.set_arg(user, index, replacement)?;
        }
        Ok(())
    }

    /// Remove an unused instruction from the sequence.
    ///
    /// Its own argument references are released; its storage stays in the
    /// pool until the block is dropped.
    pub fn erase(&mut self, inst: InstRef) -> IrResult<()> {
        let uses = self.resolve_linked(inst)?.use_count();
        if uses > 0 {
            return Err(ContractViolation::InstructionInUse { inst, uses }.into());
        }

        self.clear_args(inst)?;
        self.instructions.unlink(&mut self.instruction_alloc_pool, inst);
        log::trace!("block {}: erased {}", self.location, inst);
        Ok(())
    }

    /// The current terminal; [`Terminal::Invalid`] while unset.
    pub fn terminal(&self) -> &Terminal {
        &self.terminal
    }

    /// Set the terminal for the first time.
    pub fn set_terminal(&mut self, term: Terminal) -> IrResult<()> {
        if self.has_terminal() {
            return Err(ContractViolation::TerminalAlreadySet.into());
        }
        self.terminal = term;
        Ok(())
    }

    /// Overwrite a terminal that has already been set.
    pub fn replace_terminal(&mut self, term: Terminal) -> IrResult<()> {
        if !self.has_terminal() {
            return Err(ContractViolation::TerminalNotSet.into());
        }
        self.terminal = term;
        Ok(())
    }

    pub fn has_terminal(&self) -> bool {
        self.terminal.is_valid()
    }

    fn resolve(&self, inst: InstRef) -> Result<&Inst, ContractViolation> {
        self.get(inst).ok_or(ContractViolation::ForeignInstruction(inst))
    }

    fn resolve_linked(&self, inst: InstRef) -> Result<&Inst, ContractViolation> {
        let node = self.resolve(inst)?;
        if !node.linked {
            return Err(ContractViolation::DetachedInstruction(inst));
        }
        Ok(node)
    }

    /// Callers must have resolved `inst` first.
    fn node_mut(&mut self, inst: InstRef) -> &mut Inst {
        self.instruction_alloc_pool
            .get_mut(inst.0)
            .unwrap_or_else(|| panic!("instruction {inst} was resolved against another block"))
    }
}

impl Index<InstRef> for Block {
    type Output = Inst;

    fn index(&self, inst: InstRef) -> &Inst {
        self.get(inst)
            .unwrap_or_else(|| panic!("instruction {inst} does not belong to block {}", self.location))
    }
}

impl<'a> IntoIterator for &'a Block {
    type Item = (InstRef, &'a Inst);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("location", &self.location)
            .field("end_location", &self.end_location)
            .field("cond", &self.cond)
            .field("cond_failed", &self.cond_failed)
            .field("cycle_count", &self.cycle_count)
            .field("instructions", &self.instructions.len())
            .field("terminal", &self.terminal)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::IrError;

    fn block() -> Block {
        Block::new(LocationDescriptor::new(0x1000))
    }

    fn order(block: &Block) -> Vec<InstRef> {
        block.iter().map(|(r, _)| r).collect()
    }

    #[test]
    fn test_construction_defaults() {
        let block = block();
        assert_eq!(block.location(), LocationDescriptor::new(0x1000));
        assert_eq!(block.end_location(), block.location());
        assert_eq!(block.condition(), Cond::AL);
        assert!(!block.has_condition_failed_location());
        assert!(!block.has_terminal());
        assert!(block.is_empty());
        assert_eq!(block.chunk_capacity(), DEFAULT_CHUNK_SLOTS);
    }

    #[test]
    fn test_prepend_preserves_order() {
        let mut block = block();
        let a = block.append_new_inst(Opcode::A64GetSP, &[]).unwrap();
        let b = block.append_new_inst(Opcode::A32GetCpsr, &[]).unwrap();
        let c = block.append_new_inst(Opcode::Breakpoint, &[]).unwrap();
        let d = block.prepend_new_inst(b, Opcode::Void, &[]).unwrap();

        assert_eq!(order(&block), vec![a, d, b, c]);
        assert_eq!(block.front(), Some(a));
        assert_eq!(block.back(), Some(c));
        assert_eq!(block[d].opcode(), Opcode::Void);
    }

    #[test]
    fn test_arg_count_is_checked() {
        let mut block = block();
        let err = block.append_new_inst(Opcode::Add32, &[Value::U32(1)]).unwrap_err();
        assert!(matches!(err, IrError::Contract(ContractViolation::ArgCount { expected: 3, got: 1, .. })));
        assert!(block.is_empty());
    }

    #[test]
    fn test_use_counting() {
        let mut block = block();
        let x = block.append_new_inst(Opcode::A32GetCpsr, &[]).unwrap();
        let y = block.append_new_inst(Opcode::Not32, &[Value::Inst(x)]).unwrap();
        assert_eq!(block[x].use_count(), 1);

        let z = block.append_new_inst(Opcode::Mul32, &[Value::Inst(x), Value::Inst(y)]).unwrap();
        assert_eq!(block[x].use_count(), 2);
        assert_eq!(block[y].use_count(), 1);
        assert_eq!(block[z].use_count(), 0);

        block.set_arg(z, 0, Value::U32(3)).unwrap();
        assert_eq!(block[x].use_count(), 1);

        block.set_arg(z, 0, Value::Inst(y)).unwrap();
        assert_eq!(block[y].use_count(), 2);
    }

    #[test]
    fn test_replace_uses_and_erase() {
        let mut block = block();
        let x = block.append_new_inst(Opcode::A32GetCpsr, &[]).unwrap();
        let y = block.append_new_inst(Opcode::Not32, &[Value::Inst(x)]).unwrap();
        let z = block.append_new_inst(Opcode::A32SetCpsr, &[Value::Inst(y)]).unwrap();

        let err = block.erase(y).unwrap_err();
        assert_eq!(err, IrError::Contract(ContractViolation::InstructionInUse { inst: y, uses: 1 }));

        block.replace_uses_with(y, Value::Inst(x)).unwrap();
        assert_eq!(block[z].arg(0), Some(Value::Inst(x)));
        assert_eq!(block[y].use_count(), 0);

        block.erase(y).unwrap();
        assert_eq!(order(&block), vec![x, z]);
        assert_eq!(block[x].use_count(), 1);
        assert!(!block.contains(y));

        let err = block.append_new_inst(Opcode::Not32, &[Value::Inst(y)]).unwrap_err();
        assert_eq!(err, IrError::Contract(ContractViolation::DetachedInstruction(y)));
    }

    #[test]
    fn test_self_reference_rejected() {
        let mut block = block();
        let x = block.append_new_inst(Opcode::Not32, &[Value::U32(0)]).unwrap();
        let err = block.set_arg(x, 0, Value::Inst(x)).unwrap_err();
        assert_eq!(err, IrError::Contract(ContractViolation::SelfReference(x)));
        assert_eq!(block[x].use_count(), 0);
    }

    #[test]
    fn test_foreign_handles_rejected() {
        let mut a = block();
        let mut b = block();
        let in_a = a.append_new_inst(Opcode::A64GetSP, &[]).unwrap();

        let err = b.append_new_inst(Opcode::A64SetSP, &[Value::Inst(in_a)]).unwrap_err();
        assert_eq!(err, IrError::Contract(ContractViolation::ForeignInstruction(in_a)));
        assert!(b.get(in_a).is_none());
    }

    #[test]
    fn test_terminal_state_machine() {
        let mut block = block();
        assert_eq!(
            block.replace_terminal(Terminal::ReturnToDispatch),
            Err(IrError::Contract(ContractViolation::TerminalNotSet))
        );

        block.set_terminal(Terminal::ReturnToDispatch).unwrap();
        assert_eq!(
            block.set_terminal(Terminal::PopRSBHint),
            Err(IrError::Contract(ContractViolation::TerminalAlreadySet))
        );

        block.replace_terminal(Terminal::PopRSBHint).unwrap();
        block.replace_terminal(Terminal::FastDispatchHint).unwrap();
        assert!(block.has_terminal());
        assert_eq!(block.terminal(), &Terminal::FastDispatchHint);
    }

    #[test]
    fn test_block_moves_across_threads() {
        let mut block = block();
        let x = block.append_new_inst(Opcode::A64GetSP, &[]).unwrap();

        let handle = std::thread::spawn(move || {
            block.append_new_inst(Opcode::A64SetSP, &[Value::Inst(x)]).unwrap();
            block
        });
        let block = handle.join().unwrap();

        assert_eq!(block.len(), 2);
        assert_eq!(block[x].use_count(), 1);
    }

    #[test]
    fn test_value_type() {
        let mut block = block();
        let x = block.append_new_inst(Opcode::A64GetX, &[Value::A64Reg(crate::ir::A64Reg::new(0).unwrap())]).unwrap();
        assert_eq!(block.value_type(Value::Inst(x)), Type::U64);
        assert_eq!(block.value_type(Value::U8(1)), Type::U8);
        assert_eq!(block.value_type(Value::Empty), Type::Void);
    }
}
