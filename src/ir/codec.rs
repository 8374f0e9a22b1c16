// This module implements the cache codec: the symmetric encoding of a Block into a flat stream
// of 16-bit words and back. The layout is
//
//     BLOCK        := MAGIC_BLOCK(0xa91e) INST_COUNT INST* TERMINAL END_LOCATION
//     TERMINAL     := MAGIC_TERM(0xa91f) TAG PAYLOAD
//     END_LOCATION := four little-endian words
//
// Instructions encode themselves and refer to earlier instructions by position, so decoding
// keeps the growing prefix of materialised handles and resolves each new instruction against
// it. Terminal payloads recurse for If, CheckBit and CheckHalt, each child carrying its own
// magic. The format is unversioned; the cache module wraps it in an envelope. Every format
// violation surfaces as CorruptEntry, and a failed decode never leaves a half-built block
// behind: decoding happens in a fresh block that replaces the target only on success.

//! Word-stream codec for blocks and terminals.

use hashbrown::HashMap;

use super::arch::Cond;
use super::block::Block;
use super::inst::{Inst, InstRef};
use super::location::LocationDescriptor;
use super::terminal::Terminal;
use crate::core::{ContractViolation, CorruptEntry, IrResult};

/// Marker opening every serialized block.
pub const MAGIC_BLOCK: u16 = 0xa91e;

/// Marker opening every serialized terminal, nested ones included.
pub const MAGIC_TERMINAL: u16 = 0xa91f;

/// Deepest terminal nesting accepted while decoding.
pub const MAX_TERMINAL_DEPTH: usize = 64;

/// Cursor over a caller-owned word buffer.
#[derive(Debug, Clone)]
pub struct WordReader<'a> {
    words: &'a [u16],
    pos: usize,
}

impl<'a> WordReader<'a> {
    pub fn new(words: &'a [u16]) -> Self {
        Self { words, pos: 0 }
    }

    /// Number of words consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.words.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read(&mut self) -> Result<u16, CorruptEntry> {
        let word = *self.words.get(self.pos).ok_or(CorruptEntry::UnexpectedEnd(self.pos))?;
        self.pos += 1;
        Ok(word)
    }

    /// Two words, low word first.
    pub fn read_u32(&mut self) -> Result<u32, CorruptEntry> {
        let lo = self.read()? as u32;
        let hi = self.read()? as u32;
        Ok(lo | (hi << 16))
    }

    /// Four words, low word first.
    pub fn read_u64(&mut self) -> Result<u64, CorruptEntry> {
        let mut value = 0u64;
        for shift in [0, 16, 32, 48] {
            value |= (self.read()? as u64) << shift;
        }
        Ok(value)
    }

    /// Consume the next `len` words as a slice.
    ///
    /// Like [`WordReader::read`], a short stream is reported at the current
    /// position and nothing is consumed.
    pub fn take(&mut self, len: usize) -> Result<&'a [u16], CorruptEntry> {
        if len > self.remaining() {
            return Err(CorruptEntry::UnexpectedEnd(self.pos));
        }
        let slice = &self.words[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }
}

impl Block {
    /// Append this block's encoding to `out`.
    ///
    /// Empty blocks are encoded with an instruction count of zero. Nothing is
    /// appended if the block cannot be encoded.
    pub fn serialize(&self, out: &mut Vec<u16>) -> IrResult<()> {
        let count = u16::try_from(self.len()).map_err(|_| ContractViolation::TooManyInstructions { count: self.len() })?;

        // Positions exist only for instructions already written.
        let mut positions: HashMap<InstRef, u16> = HashMap::with_capacity(self.len());

        let start = out.len();
        out.push(MAGIC_BLOCK);
        out.push(count);
        for (position, (user, inst)) in self.iter().enumerate() {
            let written = check_backward_references(user, inst, &positions)
                .and_then(|()| inst.serialize(&positions, out));
            if let Err(err) = written {
                out.truncate(start);
                return Err(err);
            }
            positions.insert(user, position as u16);
        }
        serialize_terminal(self.terminal(), out);
        self.end_location().serialize(out);

        log::debug!(
            "serialized block {}: {} instructions, {} words",
            self.location(),
            count,
            out.len() - start
        );
        Ok(())
    }

    /// Decode a fresh block starting at `location`.
    pub fn deserialize(location: LocationDescriptor, reader: &mut WordReader<'_>) -> IrResult<Block> {
        let mut block = Block::new(location);
        block.deserialize_into(reader)?;
        Ok(block)
    }

    /// Populate this empty block from `reader`.
    ///
    /// Entry condition, fallback location and cycle counts are not part of
    /// the encoding and keep their current values. On error the block and
    /// the reader are left as they were.
    pub fn deserialize_into(&mut self, reader: &mut WordReader<'_>) -> IrResult<()> {
        if !self.is_empty() || self.has_terminal() {
            return Err(ContractViolation::NonEmptyTarget.into());
        }

        let mut cursor = reader.clone();
        let mut decoded = Block::with_chunk_capacity(self.location(), self.chunk_capacity());

        let magic = cursor.read()?;
        if magic != MAGIC_BLOCK {
            return Err(CorruptEntry::BadBlockMagic { found: magic }.into());
        }

        let count = cursor.read()?;
        let mut prefix: Vec<InstRef> = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let inst = Inst::deserialize(&prefix, &mut cursor)?;
            prefix.push(decoded.append_inst(inst)?);
        }

        decoded.set_terminal(deserialize_terminal(&mut cursor)?)?;
        decoded.set_end_location(LocationDescriptor::deserialize(&mut cursor)?);

        decoded.set_condition(self.condition());
        if let Some(fail) = self.condition_failed_location() {
            decoded.set_condition_failed_location(fail);
        }
        decoded.set_condition_failed_cycle_count(self.condition_failed_cycle_count());
        decoded.set_cycle_count(self.cycle_count());

        log::debug!(
            "deserialized block {}: {} instructions, {} words",
            decoded.location(),
            count,
            cursor.position() - reader.position()
        );

        *self = decoded;
        *reader = cursor;
        Ok(())
    }
}

fn check_backward_references(user: InstRef, inst: &Inst, positions: &HashMap<InstRef, u16>) -> IrResult<()> {
    for arg in inst.args() {
        if let Some(used) = arg.inst() {
            if !positions.contains_key(&used) {
                return Err(ContractViolation::ForwardReference { user, used }.into());
            }
        }
    }
    Ok(())
}

/// Append `MAGIC_TERM TAG PAYLOAD` for `term` and, recursively, its children.
pub fn serialize_terminal(term: &Terminal, out: &mut Vec<u16>) {
    out.push(MAGIC_TERMINAL);
    out.push(term.tag());

    match term {
        Terminal::Invalid | Terminal::ReturnToDispatch | Terminal::PopRSBHint | Terminal::FastDispatchHint => {}
        Terminal::Interpret { next, num_instructions } => {
            next.serialize(out);
            out.push(*num_instructions);
        }
        Terminal::LinkBlock { next } | Terminal::LinkBlockFast { next } => next.serialize(out),
        Terminal::If { cond, then, else_ } => {
            out.push(cond.raw());
            serialize_terminal(then, out);
            serialize_terminal(else_, out);
        }
        Terminal::CheckBit { then, else_ } => {
            serialize_terminal(then, out);
            serialize_terminal(else_, out);
        }
        Terminal::CheckHalt { else_ } => serialize_terminal(else_, out),
    }
}

/// Decode one terminal tree.
pub fn deserialize_terminal(reader: &mut WordReader<'_>) -> Result<Terminal, CorruptEntry> {
    deserialize_terminal_at(reader, 1)
}

fn deserialize_terminal_at(reader: &mut WordReader<'_>, depth: usize) -> Result<Terminal, CorruptEntry> {
    if depth > MAX_TERMINAL_DEPTH {
        return Err(CorruptEntry::TerminalTooDeep(MAX_TERMINAL_DEPTH));
    }

    let magic = reader.read()?;
    if magic != MAGIC_TERMINAL {
        return Err(CorruptEntry::BadTerminalMagic { found: magic });
    }

    let term = match reader.read()? {
        Terminal::TAG_INVALID => Terminal::Invalid,
        Terminal::TAG_INTERPRET => {
            let next = LocationDescriptor::deserialize(reader)?;
            let num_instructions = reader.read()?;
            Terminal::Interpret { next, num_instructions }
        }
        Terminal::TAG_RETURN_TO_DISPATCH => Terminal::ReturnToDispatch,
        Terminal::TAG_LINK_BLOCK => Terminal::link_block(LocationDescriptor::deserialize(reader)?),
        Terminal::TAG_LINK_BLOCK_FAST => Terminal::link_block_fast(LocationDescriptor::deserialize(reader)?),
        Terminal::TAG_POP_RSB_HINT => Terminal::PopRSBHint,
        Terminal::TAG_FAST_DISPATCH_HINT => Terminal::FastDispatchHint,
        Terminal::TAG_IF => {
            let raw = reader.read()?;
            let cond = Cond::from_raw(raw).ok_or(CorruptEntry::InvalidImmediate { kind: "Cond", raw })?;
            let then = deserialize_terminal_at(reader, depth + 1)?;
            let else_ = deserialize_terminal_at(reader, depth + 1)?;
            Terminal::if_then_else(cond, then, else_)
        }
        Terminal::TAG_CHECK_BIT => {
            let then = deserialize_terminal_at(reader, depth + 1)?;
            let else_ = deserialize_terminal_at(reader, depth + 1)?;
            Terminal::check_bit(then, else_)
        }
        Terminal::TAG_CHECK_HALT => Terminal::check_halt(deserialize_terminal_at(reader, depth + 1)?),
        other => return Err(CorruptEntry::UnknownTerminalTag(other)),
    };
    Ok(term)
}
