// This module defines error types for dynir using the thiserror crate for idiomatic Rust
// error handling. Failures are split into two families that callers must treat differently.
// ContractViolation covers programming errors in the caller: wrong argument counts, setting
// a terminal twice, replacing an unset terminal, deserializing into a populated block, handles
// that belong to another block, and the inconsistencies reported by the verifier. These should
// abort translation of the enclosing unit. CorruptEntry covers malformed cache data: bad magic
// markers, unknown tags and opcodes, truncated streams and dangling references. These are
// recoverable; the cache discards the entry and the caller recompiles from guest code. IrError
// wraps both families, and IrResult<T> is the convenience alias used throughout the crate.

//! Error types for dynir.
//!
//! Using thiserror for more idiomatic error handling.

use thiserror::Error;

use crate::ir::{InstRef, Opcode, Type};

/// A caller broke one of the block's invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    #[error("{opcode} takes {expected} arguments, got {got}")]
    ArgCount {
        opcode: Opcode,
        expected: usize,
        got: usize,
    },

    #[error("argument index {index} is out of range for {opcode}")]
    ArgIndex {
        opcode: Opcode,
        index: usize,
    },

    #[error("terminal has already been set")]
    TerminalAlreadySet,

    #[error("terminal has not been set")]
    TerminalNotSet,

    #[error("deserialization target block is not empty")]
    NonEmptyTarget,

    #[error("block holds {count} instructions, more than a cache entry can count")]
    TooManyInstructions {
        count: usize,
    },

    #[error("cycle count {cycles} does not fit in a cache entry")]
    CycleCountTooLarge {
        cycles: usize,
    },

    #[error("encoded block of {words} words does not fit in a cache entry")]
    EntryTooLarge {
        words: usize,
    },

    #[error("instruction {0} does not belong to this block")]
    ForeignInstruction(InstRef),

    #[error("instruction {0} is not linked into the instruction sequence")]
    DetachedInstruction(InstRef),

    #[error("instruction {0} cannot reference itself")]
    SelfReference(InstRef),

    #[error("instruction {inst} still has {uses} uses")]
    InstructionInUse {
        inst: InstRef,
        uses: u32,
    },

    #[error("instruction {user} references {used} which does not precede it")]
    ForwardReference {
        user: InstRef,
        used: InstRef,
    },

    #[error("{opcode} argument {index} has type {actual}, expected {expected}")]
    TypeMismatch {
        opcode: Opcode,
        index: usize,
        actual: Type,
        expected: Type,
    },

    #[error("instruction {inst} records {recorded} uses but {actual} were found")]
    UseCountMismatch {
        inst: InstRef,
        recorded: u32,
        actual: u32,
    },
}

/// A serialized block failed to decode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorruptEntry {
    #[error("bad block magic {found:#06x}")]
    BadBlockMagic {
        found: u16,
    },

    #[error("bad terminal magic {found:#06x}")]
    BadTerminalMagic {
        found: u16,
    },

    #[error("unknown terminal tag {0}")]
    UnknownTerminalTag(u16),

    #[error("unknown opcode {0:#06x}")]
    UnknownOpcode(u16),

    #[error("unknown value tag {0}")]
    UnknownValueTag(u16),

    #[error("invalid {kind} encoding {raw:#06x}")]
    InvalidImmediate {
        kind: &'static str,
        raw: u16,
    },

    #[error("argument references instruction #{position} but only {available} precede it")]
    DanglingReference {
        position: u16,
        available: usize,
    },

    #[error("unexpected end of stream at word {0}")]
    UnexpectedEnd(usize),

    #[error("terminal nesting exceeds {0} levels")]
    TerminalTooDeep(usize),

    #[error("{0} words left over after the block")]
    TrailingWords(usize),

    #[error("bad cache entry header {found:#06x}")]
    BadEntryHeader {
        found: u16,
    },

    #[error("unsupported cache format version {0}")]
    UnsupportedVersion(u16),
}

/// Main error type for block construction and the cache codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IrError {
    #[error("invariant violated: {0}")]
    Contract(#[from] ContractViolation),

    #[error("corrupt cache entry: {0}")]
    Corrupt(#[from] CorruptEntry),
}

impl IrError {
    /// Whether this error came from malformed data rather than a caller bug.
    ///
    /// Corrupt entries are cache misses; everything else is a hard failure.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, IrError::Corrupt(_))
    }
}

/// Result type alias for block operations.
pub type IrResult<T> = Result<T, IrError>;
