//! Block terminals.
//!
//! A [`Terminal`] describes how control leaves a block. Three variants nest
//! further terminals so that the exit itself can branch on a runtime flag;
//! children are owned, so a terminal is always a finite tree.

use std::fmt;

use super::arch::Cond;
use super::location::LocationDescriptor;

/// Control-flow exit of a block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Terminal {
    /// No terminal has been set.
    #[default]
    Invalid,
    /// Hand `num_instructions` guest instructions at `next` to the interpreter.
    Interpret {
        next: LocationDescriptor,
        num_instructions: u16,
    },
    /// Return to the outer dispatch loop.
    ReturnToDispatch,
    /// Chain to the block at `next` through full dispatch.
    LinkBlock { next: LocationDescriptor },
    /// Chain to the block at `next` without re-checking dispatch conditions.
    LinkBlockFast { next: LocationDescriptor },
    /// Predict the return target from the return stack buffer.
    PopRSBHint,
    /// Eligible for the fast indirect dispatch table.
    FastDispatchHint,
    /// Take `then` if `cond` holds, otherwise `else_`.
    If {
        cond: Cond,
        then: Box<Terminal>,
        else_: Box<Terminal>,
    },
    /// Take `then` if the runtime check bit is set, otherwise `else_`.
    CheckBit {
        then: Box<Terminal>,
        else_: Box<Terminal>,
    },
    /// Stop if a halt was requested, otherwise take `else_`.
    CheckHalt { else_: Box<Terminal> },
}

impl Terminal {
    pub const TAG_INVALID: u16 = 0;
    pub const TAG_INTERPRET: u16 = 1;
    pub const TAG_RETURN_TO_DISPATCH: u16 = 2;
    pub const TAG_LINK_BLOCK: u16 = 3;
    pub const TAG_LINK_BLOCK_FAST: u16 = 4;
    pub const TAG_POP_RSB_HINT: u16 = 5;
    pub const TAG_FAST_DISPATCH_HINT: u16 = 6;
    pub const TAG_IF: u16 = 7;
    pub const TAG_CHECK_BIT: u16 = 8;
    pub const TAG_CHECK_HALT: u16 = 9;

    /// Interpret a single instruction at `next`.
    pub fn interpret(next: LocationDescriptor) -> Self {
        Terminal::Interpret {
            next,
            num_instructions: 1,
        }
    }

    pub fn link_block(next: LocationDescriptor) -> Self {
        Terminal::LinkBlock { next }
    }

    pub fn link_block_fast(next: LocationDescriptor) -> Self {
        Terminal::LinkBlockFast { next }
    }

    pub fn if_then_else(cond: Cond, then: Terminal, else_: Terminal) -> Self {
        Terminal::If {
            cond,
            then: Box::new(then),
            else_: Box::new(else_),
        }
    }

    pub fn check_bit(then: Terminal, else_: Terminal) -> Self {
        Terminal::CheckBit {
            then: Box::new(then),
            else_: Box::new(else_),
        }
    }

    pub fn check_halt(else_: Terminal) -> Self {
        Terminal::CheckHalt { else_: Box::new(else_) }
    }

    /// Whether this is anything other than the unset sentinel.
    pub fn is_valid(&self) -> bool {
        !matches!(self, Terminal::Invalid)
    }

    /// Wire tag of this variant.
    pub fn tag(&self) -> u16 {
        match self {
            Terminal::Invalid => Self::TAG_INVALID,
            Terminal::Interpret { .. } => Self::TAG_INTERPRET,
            Terminal::ReturnToDispatch => Self::TAG_RETURN_TO_DISPATCH,
            Terminal::LinkBlock { .. } => Self::TAG_LINK_BLOCK,
            Terminal::LinkBlockFast { .. } => Self::TAG_LINK_BLOCK_FAST,
            Terminal::PopRSBHint => Self::TAG_POP_RSB_HINT,
            Terminal::FastDispatchHint => Self::TAG_FAST_DISPATCH_HINT,
            Terminal::If { .. } => Self::TAG_IF,
            Terminal::CheckBit { .. } => Self::TAG_CHECK_BIT,
            Terminal::CheckHalt { .. } => Self::TAG_CHECK_HALT,
        }
    }

    /// Number of terminal levels in this tree; leaves count as one.
    pub fn depth(&self) -> usize {
        match self {
            Terminal::If { then, else_, .. } | Terminal::CheckBit { then, else_ } => {
                1 + then.depth().max(else_.depth())
            }
            Terminal::CheckHalt { else_ } => 1 + else_.depth(),
            _ => 1,
        }
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminal::Invalid => f.write_str("<invalid terminal>"),
            Terminal::Interpret { next, .. } => write!(f, "Interpret{{{}}}", next),
            Terminal::ReturnToDispatch => f.write_str("ReturnToDispatch{}"),
            Terminal::LinkBlock { next } => write!(f, "LinkBlock{{{}}}", next),
            Terminal::LinkBlockFast { next } => write!(f, "LinkBlockFast{{{}}}", next),
            Terminal::PopRSBHint => f.write_str("PopRSBHint{}"),
            Terminal::FastDispatchHint => f.write_str("FastDispatchHint{}"),
            Terminal::If { cond, then, else_ } => write!(f, "If{{{}, {}, {}}}", cond, then, else_),
            Terminal::CheckBit { then, else_ } => write!(f, "CheckBit{{{}, {}}}", then, else_),
            Terminal::CheckHalt { else_ } => write!(f, "CheckHalt{{{}}}", else_),
        }
    }
}
