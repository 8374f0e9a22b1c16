//! Consistency checks over a block's instruction sequence.

use hashbrown::{HashMap, HashSet};

use super::block::Block;
use super::inst::InstRef;
use super::types::{are_types_compatible, Type};
use super::value::Value;
use crate::core::{ContractViolation, IrResult};

impl Block {
    /// Check the sequence invariants and report the first violation.
    ///
    /// - every referenced instruction precedes its user in program order,
    /// - every argument type is compatible with its slot's declared type,
    /// - every recorded use count matches the references actually present.
    pub fn verify(&self) -> IrResult<()> {
        let mut seen: HashSet<InstRef> = HashSet::with_capacity(self.len());
        let mut uses: HashMap<InstRef, u32> = HashMap::new();

        for (user, inst) in self.iter() {
            let opcode = inst.opcode();
            for (index, arg) in inst.args().iter().enumerate() {
                if let Value::Inst(used) = *arg {
                    if !seen.contains(&used) {
                        return Err(ContractViolation::ForwardReference { user, used }.into());
                    }
                    *uses.entry(used).or_insert(0) += 1;
                }

                let actual = self.value_type(*arg);
                let expected = opcode.arg_type(index).unwrap_or(Type::Void);
                if !are_types_compatible(actual, expected) {
                    return Err(ContractViolation::TypeMismatch {
                        opcode,
                        index,
                        actual,
                        expected,
                    }
                    .into());
                }
            }
            seen.insert(user);
        }

        for (inst, node) in self.iter() {
            let actual = uses.get(&inst).copied().unwrap_or(0);
            if node.use_count() != actual {
                return Err(ContractViolation::UseCountMismatch {
                    inst,
                    recorded: node.use_count(),
                    actual,
                }
                .into());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_utils::test::sample_block;
    use crate::core::IrError;
    use crate::ir::{LocationDescriptor, Opcode};

    #[test]
    fn test_sample_block_verifies() {
        sample_block().verify().unwrap();
    }

    #[test]
    fn test_forward_reference_after_prepend() {
        let mut block = Block::new(LocationDescriptor::new(0));
        let first = block.append_new_inst(Opcode::A32GetCpsr, &[]).unwrap();
        let late = block.append_new_inst(Opcode::A32GetCpsr, &[]).unwrap();
        let user = block.prepend_new_inst(first, Opcode::A32SetCpsr, &[Value::Inst(late)]).unwrap();

        assert_eq!(
            block.verify(),
            Err(IrError::Contract(ContractViolation::ForwardReference { user, used: late }))
        );
    }

    #[test]
    fn test_type_mismatch() {
        let mut block = Block::new(LocationDescriptor::new(0));
        block.append_new_inst(Opcode::Mul64, &[Value::U32(1), Value::U64(2)]).unwrap();

        assert_eq!(
            block.verify(),
            Err(IrError::Contract(ContractViolation::TypeMismatch {
                opcode: Opcode::Mul64,
                index: 0,
                actual: Type::U32,
                expected: Type::U64,
            }))
        );
    }

    #[test]
    fn test_opaque_accepts_anything() {
        let mut block = Block::new(LocationDescriptor::new(0));
        let sum = block.append_new_inst(Opcode::Add32, &[Value::U32(1), Value::U32(2), Value::U1(false)]).unwrap();
        block.append_new_inst(Opcode::GetCarryFromOp, &[Value::Inst(sum)]).unwrap();
        block.verify().unwrap();
    }
}
