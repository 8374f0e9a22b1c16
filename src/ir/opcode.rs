//! Opcode table.
//!
//! Every opcode has a fixed result type and a fixed list of argument types.
//! The table is the single source of truth for argument counts used when
//! appending, encoding, decoding and printing instructions.
//!
//! # Table Format
//!
//! ```text
//! Mnemonic => ResultType(ArgType, ArgType, ...);
//! ```
//!
//! Opcodes are encoded on the wire by their position in the table, so new
//! entries must only ever be appended.

use std::fmt;

use super::types::Type;

/// Static metadata describing one opcode.
#[derive(Debug, Clone, Copy)]
pub struct OpInfo {
    pub name: &'static str,
    pub result: Type,
    pub args: &'static [Type],
}

macro_rules! opcodes {
    ($($name:ident => $result:ident($($arg:ident),*);)*) => {
        /// Operation performed by an instruction.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum Opcode {
            $($name,)*
        }

        impl Opcode {
            /// Every opcode, indexed by its wire value.
            pub const ALL: &'static [Opcode] = &[$(Opcode::$name,)*];

            pub const fn info(self) -> OpInfo {
                match self {
                    $(Opcode::$name => OpInfo {
                        name: stringify!($name),
                        result: Type::$result,
                        args: &[$(Type::$arg),*],
                    },)*
                }
            }
        }
    };
}

opcodes! {
    Void => Void();
    Identity => Opaque(Opaque);
    Breakpoint => Void();
    CallHostFunction => Void(U64, Opaque, Opaque, Opaque);

    A32GetRegister => U32(A32Reg);
    A32GetExtendedRegister32 => U32(A32ExtReg);
    A32GetExtendedRegister64 => U64(A32ExtReg);
    A32SetRegister => Void(A32Reg, U32);
    A32SetExtendedRegister32 => Void(A32ExtReg, U32);
    A32SetExtendedRegister64 => Void(A32ExtReg, U64);
    A32GetCpsr => U32();
    A32SetCpsr => Void(U32);
    A32SetCheckBit => Void(U1);
    A32BXWritePC => Void(U32);
    A32CallSupervisor => Void(U32);

    A64GetW => U32(A64Reg);
    A64GetX => U64(A64Reg);
    A64GetQ => U128(A64Vec);
    A64GetSP => U64();
    A64SetW => Void(A64Reg, U32);
    A64SetX => Void(A64Reg, U64);
    A64SetQ => Void(A64Vec, U128);
    A64SetSP => Void(U64);
    A64SetPC => Void(U64);
    A64SetCheckBit => Void(U1);
    A64CallSupervisor => Void(U32);

    GetCarryFromOp => U1(Opaque);
    GetOverflowFromOp => U1(Opaque);

    Add32 => U32(U32, U32, U1);
    Add64 => U64(U64, U64, U1);
    Sub32 => U32(U32, U32, U1);
    Sub64 => U64(U64, U64, U1);
    Mul32 => U32(U32, U32);
    Mul64 => U64(U64, U64);
    And32 => U32(U32, U32);
    And64 => U64(U64, U64);
    Eor32 => U32(U32, U32);
    Eor64 => U64(U64, U64);
    Or32 => U32(U32, U32);
    Or64 => U64(U64, U64);
    Not32 => U32(U32);
    Not64 => U64(U64);
    LogicalShiftLeft32 => U32(U32, U8, U1);
    LogicalShiftRight32 => U32(U32, U8, U1);
    LogicalShiftLeft64 => U64(U64, U8);
    LogicalShiftRight64 => U64(U64, U8);

    ZeroExtendByteToWord => U32(U8);
    ZeroExtendWordToLong => U64(U32);
    SignExtendWordToLong => U64(U32);
    LeastSignificantWord => U32(U64);
    LeastSignificantByte => U8(U32);
    MostSignificantBit => U1(U32);
    Pack2x32To1x64 => U64(U32, U32);

    IsZero32 => U1(U32);
    IsZero64 => U1(U64);
    TestBit => U1(U64, U8);
    ConditionalSelect32 => U32(Cond, U32, U32);
    ConditionalSelect64 => U64(Cond, U64, U64);
}

impl Opcode {
    pub fn from_raw(raw: u16) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }

    pub fn raw(self) -> u16 {
        self as u16
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn result_type(self) -> Type {
        self.info().result
    }

    pub fn num_args(self) -> usize {
        self.info().args.len()
    }

    /// Declared type of argument slot `index`.
    pub fn arg_type(self, index: usize) -> Option<Type> {
        self.info().args.get(index).copied()
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
