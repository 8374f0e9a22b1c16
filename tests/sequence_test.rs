//! Test instruction sequence editing through the public Block API.
//!
//! This covers ordering after inserts, use-count bookkeeping across rewrites,
//! erasure, and the rules that keep handles from one block out of another.

use dynir::{Block, ContractViolation, IrError, LocationDescriptor, Opcode, Terminal, Value};

fn opcodes(block: &Block) -> Vec<Opcode> {
    block.iter().map(|(_, inst)| inst.opcode()).collect()
}

#[test]
fn test_insert_before_keeps_program_order() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut block = Block::new(LocationDescriptor::new(0x100));
    let a = block.append_new_inst(Opcode::A32GetCpsr, &[]).unwrap();
    let c = block.append_new_inst(Opcode::A64GetSP, &[]).unwrap();
    let b = block.prepend_new_inst(c, Opcode::Breakpoint, &[]).unwrap();
    let z = block.prepend_new_inst(a, Opcode::Void, &[]).unwrap();

    let order: Vec<_> = block.iter().map(|(r, _)| r).collect();
    assert_eq!(order, vec![z, a, b, c]);
    assert_eq!(block.front(), Some(z));
    assert_eq!(block.back(), Some(c));
    assert_eq!(block.iter().len(), 4);
}

#[test]
fn test_constant_folding_style_rewrite() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut block = Block::new(LocationDescriptor::new(0x200));
    let product = block.append_new_inst(Opcode::Mul32, &[Value::U32(6), Value::U32(7)]).unwrap();
    let not = block.append_new_inst(Opcode::Not32, &[Value::Inst(product)]).unwrap();
    let zero = block.append_new_inst(Opcode::IsZero32, &[Value::Inst(product)]).unwrap();
    assert_eq!(block[product].use_count(), 2);

    block.replace_uses_with(product, Value::U32(42)).unwrap();
    assert_eq!(block[product].use_count(), 0);
    assert_eq!(block[not].arg(0), Some(Value::U32(42)));
    assert_eq!(block[zero].arg(0), Some(Value::U32(42)));

    block.erase(product).unwrap();
    assert!(!block.contains(product));
    assert_eq!(opcodes(&block), vec![Opcode::Not32, Opcode::IsZero32]);
    block.verify().unwrap();
}

#[test]
fn test_erase_releases_argument_uses() {
    let mut block = Block::new(LocationDescriptor::new(0x300));
    let sp = block.append_new_inst(Opcode::A64GetSP, &[]).unwrap();
    let set = block.append_new_inst(Opcode::A64SetPC, &[Value::Inst(sp)]).unwrap();

    let err = block.erase(sp).unwrap_err();
    assert_eq!(
        err,
        IrError::Contract(ContractViolation::InstructionInUse { inst: sp, uses: 1 })
    );

    block.erase(set).unwrap();
    assert_eq!(block[sp].use_count(), 0);
    block.erase(sp).unwrap();
    assert!(block.is_empty());
}

#[test]
fn test_handles_do_not_cross_blocks() {
    let mut first = Block::new(LocationDescriptor::new(0x400));
    let mut second = Block::new(LocationDescriptor::new(0x500));
    let foreign = first.append_new_inst(Opcode::A32GetCpsr, &[]).unwrap();

    let err = second.append_new_inst(Opcode::A32SetCpsr, &[Value::Inst(foreign)]).unwrap_err();
    assert_eq!(err, IrError::Contract(ContractViolation::ForeignInstruction(foreign)));
    assert!(second.is_empty());
    assert!(second.get(foreign).is_none());
}

#[test]
fn test_erased_handles_are_rejected() {
    let mut block = Block::new(LocationDescriptor::new(0x600));
    let gone = block.append_new_inst(Opcode::A32GetCpsr, &[]).unwrap();
    block.erase(gone).unwrap();

    let err = block.append_new_inst(Opcode::A32SetCpsr, &[Value::Inst(gone)]).unwrap_err();
    assert_eq!(err, IrError::Contract(ContractViolation::DetachedInstruction(gone)));
}

#[test]
fn test_wrong_argument_count_is_rejected() {
    let mut block = Block::new(LocationDescriptor::new(0x700));
    let err = block.append_new_inst(Opcode::Add32, &[Value::U32(1), Value::U32(2)]).unwrap_err();
    assert_eq!(
        err,
        IrError::Contract(ContractViolation::ArgCount {
            opcode: Opcode::Add32,
            expected: 3,
            got: 2,
        })
    );
    assert!(block.is_empty());
}

#[test]
fn test_terminal_is_set_once_then_replaced() {
    let mut block = Block::new(LocationDescriptor::new(0x800));
    assert_eq!(
        block.replace_terminal(Terminal::PopRSBHint),
        Err(IrError::Contract(ContractViolation::TerminalNotSet))
    );

    block.set_terminal(Terminal::ReturnToDispatch).unwrap();
    assert_eq!(
        block.set_terminal(Terminal::PopRSBHint),
        Err(IrError::Contract(ContractViolation::TerminalAlreadySet))
    );

    block.replace_terminal(Terminal::link_block(LocationDescriptor::new(0x810))).unwrap();
    assert_eq!(block.terminal(), &Terminal::link_block(LocationDescriptor::new(0x810)));
}

#[test]
fn test_large_block_spans_pool_chunks() {
    let mut block = Block::with_chunk_capacity(LocationDescriptor::new(0x900), 8);
    let mut prev = block.append_new_inst(Opcode::A32GetCpsr, &[]).unwrap();
    for _ in 0..100 {
        prev = block.append_new_inst(Opcode::Not32, &[Value::Inst(prev)]).unwrap();
    }

    assert_eq!(block.len(), 101);
    assert_eq!(block.chunk_capacity(), 8);
    block.verify().unwrap();

    let moved = std::thread::spawn(move || block.len()).join().unwrap();
    assert_eq!(moved, 101);
}
