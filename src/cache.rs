// This module provides the caller side of JIT cache persistence. The block encoding itself is
// unversioned and leaves out everything the translator decides before lifting a block: the
// entry location, the entry condition, the fallback location and cycle count used when that
// condition fails, and the body's cycle estimate. Every stored block is therefore wrapped in
// an envelope carrying a header marker, a format version, that metadata and the length of the
// encoded body. The length lets a reader step over an entry without decoding it, so a corrupt
// body only costs that one entry. BlockCache keeps encoded entries keyed by location and
// decodes lazily on lookup, restoring the metadata before the body. A corrupt entry is treated
// as a cache miss: it is logged, evicted and counted, and the caller recompiles the block from
// guest code. Contract violations are not misses and are returned to the caller. CacheStats
// tracks hits, misses, insertions and evictions and renders them for the irdump tool.

//! JIT cache envelope and in-memory block cache.
//!
//! # Envelope Format
//!
//! ```text
//! ENTRY := ENTRY_MAGIC(0xa920) VERSION LOCATION(4 words)
//!          COND FLAGS COND_FAIL_LOCATION(4 words) COND_FAIL_CYCLES(2 words) CYCLES(2 words)
//!          LEN_LO LEN_HI BLOCK
//! ```
//!
//! `FLAGS` bit 0 marks a present fallback location; when clear the location
//! words are zero. All other flag bits must be clear.

use std::fmt;

use hashbrown::HashMap;

use crate::core::{ContractViolation, CorruptEntry, IrResult};
use crate::ir::{Block, Cond, LocationDescriptor, WordReader};

/// Marker opening every cache entry.
pub const ENTRY_MAGIC: u16 = 0xa920;

/// Envelope format written by this crate.
pub const FORMAT_VERSION: u16 = 2;

/// Words in an envelope before the block body.
pub const ENTRY_HEADER_WORDS: usize = 2 + LocationDescriptor::WORDS * 2 + 2 + 2 + 2 + 2;

const FLAG_COND_FAILED: u16 = 1;

/// Block metadata that lives outside the block encoding.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    pub cond: Cond,
    pub cond_failed: Option<LocationDescriptor>,
    pub cond_failed_cycle_count: u32,
    pub cycle_count: u32,
}

impl EntryHeader {
    /// Capture the metadata of `block`.
    pub fn from_block(block: &Block) -> IrResult<Self> {
        Ok(Self {
            cond: block.condition(),
            cond_failed: block.condition_failed_location(),
            cond_failed_cycle_count: cycles_to_u32(block.condition_failed_cycle_count())?,
            cycle_count: cycles_to_u32(block.cycle_count())?,
        })
    }

    /// Write this metadata onto `block`.
    pub fn apply(&self, block: &mut Block) {
        block.set_condition(self.cond);
        if let Some(fail) = self.cond_failed {
            block.set_condition_failed_location(fail);
        }
        block.set_condition_failed_cycle_count(self.cond_failed_cycle_count as usize);
        block.set_cycle_count(self.cycle_count as usize);
    }

    fn serialize(&self, out: &mut Vec<u16>) {
        out.push(self.cond.raw());
        match self.cond_failed {
            Some(fail) => {
                out.push(FLAG_COND_FAILED);
                fail.serialize(out);
            }
            None => {
                out.push(0);
                LocationDescriptor::new(0).serialize(out);
            }
        }
        push_u32(out, self.cond_failed_cycle_count);
        push_u32(out, self.cycle_count);
    }

    fn deserialize(reader: &mut WordReader<'_>) -> Result<Self, CorruptEntry> {
        let raw = reader.read()?;
        let cond = Cond::from_raw(raw).ok_or(CorruptEntry::InvalidImmediate { kind: "Cond", raw })?;

        let flags = reader.read()?;
        if flags & !FLAG_COND_FAILED != 0 {
            return Err(CorruptEntry::InvalidImmediate {
                kind: "entry flags",
                raw: flags,
            });
        }
        let fail = LocationDescriptor::deserialize(reader)?;

        Ok(Self {
            cond,
            cond_failed: (flags & FLAG_COND_FAILED != 0).then_some(fail),
            cond_failed_cycle_count: reader.read_u32()?,
            cycle_count: reader.read_u32()?,
        })
    }
}

fn cycles_to_u32(cycles: usize) -> Result<u32, ContractViolation> {
    u32::try_from(cycles).map_err(|_| ContractViolation::CycleCountTooLarge { cycles })
}

fn push_u32(out: &mut Vec<u16>, value: u32) {
    out.push(value as u16);
    out.push((value >> 16) as u16);
}

/// Cache access statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Blocks stored with `insert` or `insert_encoded`.
    pub insertions: usize,

    /// Lookups that produced a block.
    pub hits: usize,

    /// Lookups that found nothing usable, corrupt entries included.
    pub misses: usize,

    /// Entries discarded because they failed to decode.
    pub corrupt_evictions: usize,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Block Cache Statistics:")?;
        writeln!(f, "  Insertions: {}", self.insertions)?;
        writeln!(f, "  Hits: {}", self.hits)?;
        writeln!(f, "  Misses: {}", self.misses)?;
        writeln!(f, "  Corrupt entries evicted: {}", self.corrupt_evictions)?;
        Ok(())
    }
}

#[derive(Debug)]
struct CachedEntry {
    header: EntryHeader,
    /// Body length as written to the envelope.
    len: u32,
    body: Vec<u16>,
}

/// Encoded blocks keyed by entry location.
#[derive(Debug, Default)]
pub struct BlockCache {
    entries: HashMap<LocationDescriptor, CachedEntry>,
    stats: CacheStats,
}

impl BlockCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode `block` and store it under its entry location, replacing any
    /// previous entry.
    pub fn insert(&mut self, block: &Block) -> IrResult<()> {
        let header = EntryHeader::from_block(block)?;
        let mut words = Vec::new();
        block.serialize(&mut words)?;
        self.insert_encoded(block.location(), header, words)
    }

    /// Store an already encoded block body with its metadata.
    pub fn insert_encoded(&mut self, location: LocationDescriptor, header: EntryHeader, body: Vec<u16>) -> IrResult<()> {
        let len = u32::try_from(body.len()).map_err(|_| ContractViolation::EntryTooLarge { words: body.len() })?;
        self.entries.insert(location, CachedEntry { header, len, body });
        self.stats.insertions += 1;
        Ok(())
    }

    /// Decode the block stored for `location`.
    ///
    /// Returns `Ok(None)` on a miss. A corrupt entry is evicted and also
    /// reported as a miss.
    pub fn lookup(&mut self, location: LocationDescriptor) -> IrResult<Option<Block>> {
        let Some(entry) = self.entries.get(&location) else {
            self.stats.misses += 1;
            return Ok(None);
        };

        match decode_entry(location, entry) {
            Ok(block) => {
                self.stats.hits += 1;
                Ok(Some(block))
            }
            Err(err) if err.is_corrupt() => {
                log::warn!("discarding cache entry for {}: {}", location, err);
                self.entries.remove(&location);
                self.stats.corrupt_evictions += 1;
                self.stats.misses += 1;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    pub fn contains(&self, location: LocationDescriptor) -> bool {
        self.entries.contains_key(&location)
    }

    pub fn remove(&mut self, location: LocationDescriptor) -> bool {
        self.entries.remove(&location).is_some()
    }

    /// Encoded body stored for `location`.
    pub fn encoded(&self, location: LocationDescriptor) -> Option<&[u16]> {
        self.entries.get(&location).map(|entry| entry.body.as_slice())
    }

    /// Metadata stored for `location`.
    pub fn header(&self, location: LocationDescriptor) -> Option<&EntryHeader> {
        self.entries.get(&location).map(|entry| &entry.header)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored locations in ascending order.
    pub fn locations(&self) -> Vec<LocationDescriptor> {
        let mut locations: Vec<_> = self.entries.keys().copied().collect();
        locations.sort_unstable();
        locations
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Write every entry, in ascending location order, wrapped in its envelope.
    pub fn to_words(&self) -> Vec<u16> {
        let mut out = Vec::new();
        for location in self.locations() {
            let entry = &self.entries[&location];
            out.push(ENTRY_MAGIC);
            out.push(FORMAT_VERSION);
            location.serialize(&mut out);
            entry.header.serialize(&mut out);
            push_u32(&mut out, entry.len);
            out.extend_from_slice(&entry.body);
        }
        out
    }

    /// Load entries written by [`BlockCache::to_words`].
    ///
    /// Bodies are not decoded here. Loading stops at the first malformed
    /// envelope; the entries before it are kept and the error is returned
    /// alongside them.
    pub fn from_words(words: &[u16]) -> (Self, Option<CorruptEntry>) {
        let mut cache = Self::new();
        let mut reader = WordReader::new(words);

        while !reader.is_empty() {
            let start = reader.position();
            match read_envelope(&mut reader) {
                Ok((location, entry)) => {
                    cache.entries.insert(location, entry);
                }
                Err(err) => {
                    log::warn!("cache envelope at word {} is corrupt: {}", start, err);
                    return (cache, Some(err));
                }
            }
        }

        log::debug!("loaded {} cache entries from {} words", cache.len(), words.len());
        (cache, None)
    }
}

fn read_envelope(reader: &mut WordReader<'_>) -> Result<(LocationDescriptor, CachedEntry), CorruptEntry> {
    let magic = reader.read()?;
    if magic != ENTRY_MAGIC {
        return Err(CorruptEntry::BadEntryHeader { found: magic });
    }

    let version = reader.read()?;
    if version != FORMAT_VERSION {
        return Err(CorruptEntry::UnsupportedVersion(version));
    }

    let location = LocationDescriptor::deserialize(reader)?;
    let header = EntryHeader::deserialize(reader)?;
    let len = reader.read_u32()?;
    let body = reader.take(len as usize)?.to_vec();
    Ok((location, CachedEntry { header, len, body }))
}

fn decode_entry(location: LocationDescriptor, entry: &CachedEntry) -> IrResult<Block> {
    let mut block = Block::new(location);
    entry.header.apply(&mut block);

    let mut reader = WordReader::new(&entry.body);
    block.deserialize_into(&mut reader)?;
    if !reader.is_empty() {
        return Err(CorruptEntry::TrailingWords(reader.remaining()).into());
    }
    Ok(block)
}

/// Reinterpret a little-endian byte buffer as words. A trailing odd byte is
/// ignored.
pub fn words_from_le_bytes(bytes: &[u8]) -> Vec<u16> {
    if bytes.len() % 2 != 0 {
        log::warn!("ignoring trailing byte of {}-byte cache image", bytes.len());
    }
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Flatten words into a little-endian byte buffer.
pub fn words_to_le_bytes(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_le_bytes()).collect()
}
