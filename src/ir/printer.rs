//! Human-readable block dumps.
//!
//! The output is deterministic except for instruction addresses, which are
//! printed for unnamed instructions. It is a debugging aid only; nothing
//! parses it back. Arguments whose type disagrees with the opcode's declared
//! slot type are flagged inline.

use std::fmt::Write;

use super::block::Block;
use super::inst::Inst;
use super::types::{are_types_compatible, Type};
use super::value::Value;

/// Render `block` as text, one instruction per line.
pub fn dump_block(block: &Block) -> String {
    let mut ret = String::new();

    let _ = writeln!(ret, "Block: location={}", block.location());
    let _ = write!(ret, "cycles={}, entry_cond={}", block.cycle_count(), block.condition());
    if let Some(fail) = block.condition_failed_location() {
        let _ = write!(ret, ", cond_fail={}", fail);
    }
    ret.push('\n');

    for (_, inst) in block.iter() {
        let op = inst.opcode();

        let _ = write!(ret, "[{:016x}] ", address_of(inst));
        if op.result_type() != Type::Void {
            if inst.name() != 0 {
                let _ = write!(ret, "%{:<5} = ", inst.name());
            } else {
                ret.push_str("noname = ");
            }
        } else {
            // width of "%00000 = "
            ret.push_str("         ");
        }

        ret.push_str(op.name());

        for (index, arg) in inst.args().iter().enumerate() {
            ret.push_str(if index != 0 { ", " } else { " " });
            ret.push_str(&arg_to_string(block, *arg));

            let actual = block.value_type(*arg);
            let expected = op.arg_type(index).unwrap_or(Type::Void);
            if !are_types_compatible(actual, expected) {
                let _ = write!(ret, "<type error: {} != {}>", actual, expected);
            }
        }

        let _ = writeln!(ret, " (uses: {})", inst.use_count());
    }

    let _ = writeln!(ret, "terminal = {}", block.terminal());
    ret
}

fn address_of(inst: &Inst) -> usize {
    inst as *const Inst as usize
}

fn arg_to_string(block: &Block, arg: Value) -> String {
    match arg {
        Value::Empty => "<null>".to_string(),
        Value::Inst(r) => match block.get(r) {
            Some(inst) if inst.name() != 0 => format!("%{}", inst.name()),
            Some(inst) => format!("%<unnamed inst {:016x}>", address_of(inst)),
            None => format!("%<foreign inst {}>", r),
        },
        Value::U1(v) => format!("#{}", if v { '1' } else { '0' }),
        Value::U8(v) => format!("#{}", v),
        Value::U16(v) => format!("#{:#x}", v),
        Value::U32(v) => format!("#{:#x}", v),
        Value::U64(v) => format!("#{:#x}", v),
        Value::A32Reg(r) => r.to_string(),
        Value::A32ExtReg(r) => r.to_string(),
        Value::A64Reg(r) => r.to_string(),
        Value::A64Vec(r) => r.to_string(),
        Value::Cond(c) => c.to_string(),
    }
}
