//! Guest architecture operands: condition codes and register names.
//!
//! These appear as immediates in instruction arguments and in `If`
//! terminals. Each type has a checked constructor from its raw index, which
//! is also its wire encoding.

use std::fmt;

/// ARM condition code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Cond {
    EQ = 0,
    NE,
    CS,
    CC,
    MI,
    PL,
    VS,
    VC,
    HI,
    LS,
    GE,
    LT,
    GT,
    LE,
    #[default]
    AL,
    NV,
}

impl Cond {
    const ALL: [Cond; 16] = [
        Cond::EQ,
        Cond::NE,
        Cond::CS,
        Cond::CC,
        Cond::MI,
        Cond::PL,
        Cond::VS,
        Cond::VC,
        Cond::HI,
        Cond::LS,
        Cond::GE,
        Cond::LT,
        Cond::GT,
        Cond::LE,
        Cond::AL,
        Cond::NV,
    ];

    pub fn from_raw(raw: u16) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }

    pub fn raw(self) -> u16 {
        self as u16
    }

    /// Lower-case mnemonic suffix.
    pub fn name(self) -> &'static str {
        const NAMES: [&str; 16] = [
            "eq", "ne", "hs", "lo", "mi", "pl", "vs", "vc", "hi", "ls", "ge", "lt", "gt", "le", "al", "nv",
        ];
        NAMES[self as usize]
    }
}

impl fmt::Display for Cond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

macro_rules! register_index {
    ($(#[$meta:meta])* $name:ident, $count:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u8);

        impl $name {
            /// Number of encodable registers.
            pub const COUNT: usize = $count;

            pub fn new(index: usize) -> Option<Self> {
                (index < Self::COUNT).then(|| Self(index as u8))
            }

            pub fn from_raw(raw: u16) -> Option<Self> {
                Self::new(raw as usize)
            }

            pub fn index(self) -> usize {
                self.0 as usize
            }

            pub fn raw(self) -> u16 {
                self.0 as u16
            }
        }
    };
}

register_index!(
    /// AArch32 general purpose register R0..R15.
    A32Reg,
    16
);

register_index!(
    /// AArch32 extension register: S0..S31, then D0..D31, then Q0..Q15.
    A32ExtReg,
    80
);

register_index!(
    /// AArch64 general purpose register R0..R31.
    A64Reg,
    32
);

register_index!(
    /// AArch64 SIMD&FP register V0..V31.
    A64Vec,
    32
);

impl fmt::Display for A32Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            13 => f.write_str("sp"),
            14 => f.write_str("lr"),
            15 => f.write_str("pc"),
            n => write!(f, "r{}", n),
        }
    }
}

impl fmt::Display for A32ExtReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            n @ 0..=31 => write!(f, "s{}", n),
            n @ 32..=63 => write!(f, "d{}", n - 32),
            n => write!(f, "q{}", n - 64),
        }
    }
}

impl fmt::Display for A64Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            31 => f.write_str("sp|zr"),
            n => write!(f, "r{}", n),
        }
    }
}

impl fmt::Display for A64Vec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}
