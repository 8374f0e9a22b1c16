//! Instruction arguments.
//!
//! An argument slot is empty, refers to an earlier instruction of the same
//! block, or holds an immediate. References are plain handles: they never own
//! or extend the lifetime of the instruction they name.

use hashbrown::HashMap;

use super::arch::{A32ExtReg, A32Reg, A64Reg, A64Vec, Cond};
use super::codec::WordReader;
use super::inst::InstRef;
use super::types::Type;
use crate::core::{ContractViolation, CorruptEntry, IrResult};

const TAG_EMPTY: u16 = 0;
const TAG_INST: u16 = 1;
const TAG_U1: u16 = 2;
const TAG_U8: u16 = 3;
const TAG_U16: u16 = 4;
const TAG_U32: u16 = 5;
const TAG_U64: u16 = 6;
const TAG_A32_REG: u16 = 7;
const TAG_A32_EXT_REG: u16 = 8;
const TAG_A64_REG: u16 = 9;
const TAG_A64_VEC: u16 = 10;
const TAG_COND: u16 = 11;

/// Contents of one argument slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Value {
    #[default]
    Empty,
    Inst(InstRef),
    U1(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    A32Reg(A32Reg),
    A32ExtReg(A32ExtReg),
    A64Reg(A64Reg),
    A64Vec(A64Vec),
    Cond(Cond),
}

impl Value {
    pub fn is_empty(self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Whether the slot holds a literal rather than a reference or nothing.
    pub fn is_immediate(self) -> bool {
        !matches!(self, Value::Empty | Value::Inst(_))
    }

    /// The referenced instruction, if any.
    pub fn inst(self) -> Option<InstRef> {
        match self {
            Value::Inst(inst) => Some(inst),
            _ => None,
        }
    }

    /// Type of an empty slot or immediate. References need their block to
    /// resolve and yield `None`.
    pub fn immediate_type(self) -> Option<Type> {
        let ty = match self {
            Value::Empty => Type::Void,
            Value::Inst(_) => return None,
            Value::U1(_) => Type::U1,
            Value::U8(_) => Type::U8,
            Value::U16(_) => Type::U16,
            Value::U32(_) => Type::U32,
            Value::U64(_) => Type::U64,
            Value::A32Reg(_) => Type::A32Reg,
            Value::A32ExtReg(_) => Type::A32ExtReg,
            Value::A64Reg(_) => Type::A64Reg,
            Value::A64Vec(_) => Type::A64Vec,
            Value::Cond(_) => Type::Cond,
        };
        Some(ty)
    }

    /// Append the tagged wire form of this value.
    ///
    /// References are written as the position of the referenced instruction
    /// in `positions`, which maps the instructions already written.
    pub fn serialize(self, positions: &HashMap<InstRef, u16>, out: &mut Vec<u16>) -> IrResult<()> {
        match self {
            Value::Empty => out.push(TAG_EMPTY),
            Value::Inst(inst) => {
                let position = positions
                    .get(&inst)
                    .copied()
                    .ok_or(ContractViolation::DetachedInstruction(inst))?;
                out.extend_from_slice(&[TAG_INST, position]);
            }
            Value::U1(v) => out.extend_from_slice(&[TAG_U1, v as u16]),
            Value::U8(v) => out.extend_from_slice(&[TAG_U8, v as u16]),
            Value::U16(v) => out.extend_from_slice(&[TAG_U16, v]),
            Value::U32(v) => out.extend_from_slice(&[TAG_U32, v as u16, (v >> 16) as u16]),
            Value::U64(v) => {
                out.push(TAG_U64);
                let mut work = v;
                for _ in 0..4 {
                    out.push(work as u16);
                    work >>= 16;
                }
            }
            Value::A32Reg(r) => out.extend_from_slice(&[TAG_A32_REG, r.raw()]),
            Value::A32ExtReg(r) => out.extend_from_slice(&[TAG_A32_EXT_REG, r.raw()]),
            Value::A64Reg(r) => out.extend_from_slice(&[TAG_A64_REG, r.raw()]),
            Value::A64Vec(r) => out.extend_from_slice(&[TAG_A64_VEC, r.raw()]),
            Value::Cond(c) => out.extend_from_slice(&[TAG_COND, c.raw()]),
        }
        Ok(())
    }

    /// Decode one tagged value, resolving references against `prefix`, the
    /// instructions already materialised for the block being decoded.
    pub fn deserialize(prefix: &[InstRef], reader: &mut WordReader<'_>) -> Result<Value, CorruptEntry> {
        let tag = reader.read()?;
        let value = match tag {
            TAG_EMPTY => Value::Empty,
            TAG_INST => {
                let position = reader.read()?;
                let inst = prefix.get(position as usize).copied().ok_or(CorruptEntry::DanglingReference {
                    position,
                    available: prefix.len(),
                })?;
                Value::Inst(inst)
            }
            TAG_U1 => match reader.read()? {
                0 => Value::U1(false),
                1 => Value::U1(true),
                raw => return Err(CorruptEntry::InvalidImmediate { kind: "U1", raw }),
            },
            TAG_U8 => {
                let raw = reader.read()?;
                let v = u8::try_from(raw).map_err(|_| CorruptEntry::InvalidImmediate { kind: "U8", raw })?;
                Value::U8(v)
            }
            TAG_U16 => Value::U16(reader.read()?),
            TAG_U32 => Value::U32(reader.read_u32()?),
            TAG_U64 => Value::U64(reader.read_u64()?),
            TAG_A32_REG => Value::A32Reg(decode_operand(reader, "A32Reg", A32Reg::from_raw)?),
            TAG_A32_EXT_REG => Value::A32ExtReg(decode_operand(reader, "A32ExtReg", A32ExtReg::from_raw)?),
            TAG_A64_REG => Value::A64Reg(decode_operand(reader, "A64Reg", A64Reg::from_raw)?),
            TAG_A64_VEC => Value::A64Vec(decode_operand(reader, "A64Vec", A64Vec::from_raw)?),
            TAG_COND => Value::Cond(decode_operand(reader, "Cond", Cond::from_raw)?),
            other => return Err(CorruptEntry::UnknownValueTag(other)),
        };
        Ok(value)
    }
}

fn decode_operand<T>(
    reader: &mut WordReader<'_>,
    kind: &'static str,
    from_raw: impl FnOnce(u16) -> Option<T>,
) -> Result<T, CorruptEntry> {
    let raw = reader.read()?;
    from_raw(raw).ok_or(CorruptEntry::InvalidImmediate { kind, raw })
}

impl From<InstRef> for Value {
    fn from(inst: InstRef) -> Self {
        Value::Inst(inst)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::U1(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::U8(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::U16(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::U32(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<Cond> for Value {
    fn from(c: Cond) -> Self {
        Value::Cond(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(words: &[u16]) -> Result<Value, CorruptEntry> {
        Value::deserialize(&[], &mut WordReader::new(words))
    }

    #[test]
    fn test_immediate_encoding() {
        let positions = HashMap::new();
        let mut out = Vec::new();
        Value::U32(0xdead_beef).serialize(&positions, &mut out).unwrap();
        Value::U1(true).serialize(&positions, &mut out).unwrap();
        Value::Empty.serialize(&positions, &mut out).unwrap();
        assert_eq!(out, vec![TAG_U32, 0xbeef, 0xdead, TAG_U1, 1, TAG_EMPTY]);

        let mut reader = WordReader::new(&out);
        assert_eq!(Value::deserialize(&[], &mut reader), Ok(Value::U32(0xdead_beef)));
        assert_eq!(Value::deserialize(&[], &mut reader), Ok(Value::U1(true)));
        assert_eq!(Value::deserialize(&[], &mut reader), Ok(Value::Empty));
        assert!(reader.is_empty());
    }

    #[test]
    fn test_invalid_immediates() {
        assert_eq!(decode(&[TAG_U1, 2]), Err(CorruptEntry::InvalidImmediate { kind: "U1", raw: 2 }));
        assert_eq!(decode(&[TAG_U8, 0x100]), Err(CorruptEntry::InvalidImmediate { kind: "U8", raw: 0x100 }));
        assert_eq!(decode(&[TAG_COND, 16]), Err(CorruptEntry::InvalidImmediate { kind: "Cond", raw: 16 }));
        assert_eq!(decode(&[99]), Err(CorruptEntry::UnknownValueTag(99)));
        assert_eq!(decode(&[TAG_U64, 1, 2]), Err(CorruptEntry::UnexpectedEnd(3)));
    }

    #[test]
    fn test_dangling_reference() {
        assert_eq!(
            decode(&[TAG_INST, 0]),
            Err(CorruptEntry::DanglingReference { position: 0, available: 0 })
        );
    }

    #[test]
    fn test_classification() {
        assert!(Value::U8(3).is_immediate());
        assert!(!Value::Empty.is_immediate());
        assert!(Value::Empty.is_empty());
        assert_eq!(Value::Cond(Cond::EQ).immediate_type(), Some(Type::Cond));
        assert_eq!(Value::Empty.immediate_type(), Some(Type::Void));
    }
}
