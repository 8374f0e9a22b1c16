//! Value types of instruction arguments and results.

use std::fmt;

/// Type carried by an argument slot or produced by an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    A32Reg,
    A32ExtReg,
    A64Reg,
    A64Vec,
    /// Matches any type; used by pseudo-operations that inspect other results.
    Opaque,
    U1,
    U8,
    U16,
    U32,
    U64,
    U128,
    Cond,
}

impl Type {
    pub fn name(self) -> &'static str {
        match self {
            Type::Void => "Void",
            Type::A32Reg => "A32Reg",
            Type::A32ExtReg => "A32ExtReg",
            Type::A64Reg => "A64Reg",
            Type::A64Vec => "A64Vec",
            Type::Opaque => "Opaque",
            Type::U1 => "U1",
            Type::U8 => "U8",
            Type::U16 => "U16",
            Type::U32 => "U32",
            Type::U64 => "U64",
            Type::U128 => "U128",
            Type::Cond => "Cond",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a value of type `actual` may fill a slot declared as `expected`.
pub fn are_types_compatible(actual: Type, expected: Type) -> bool {
    actual == expected || actual == Type::Opaque || expected == Type::Opaque
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compatibility() {
        assert!(are_types_compatible(Type::U32, Type::U32));
        assert!(are_types_compatible(Type::Opaque, Type::U64));
        assert!(are_types_compatible(Type::U1, Type::Opaque));
        assert!(!are_types_compatible(Type::U32, Type::U64));
        assert!(!are_types_compatible(Type::Void, Type::U8));
    }
}
