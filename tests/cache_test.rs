//! Test the block cache through a persisted byte image.

use dynir::cache::{words_from_le_bytes, words_to_le_bytes, ENTRY_HEADER_WORDS, ENTRY_MAGIC};
use dynir::ir::A64Reg;
use dynir::{dump_block, Block, BlockCache, Cond, LocationDescriptor, Opcode, Terminal, Value};

/// Create a block at `pc` that adds `imm` to x0.
fn create_add_block(pc: u64, imm: u64) -> Block {
    let mut block = Block::new(LocationDescriptor::new(pc));
    block.set_end_location(LocationDescriptor::new(pc + 4));

    let x0 = A64Reg::new(0).unwrap();
    let value = block.append_new_inst(Opcode::A64GetX, &[Value::A64Reg(x0)]).unwrap();
    block.set_name(value, 1).unwrap();
    let sum = block
        .append_new_inst(Opcode::Add64, &[Value::Inst(value), Value::U64(imm), Value::U1(false)])
        .unwrap();
    block.set_name(sum, 2).unwrap();
    block.append_new_inst(Opcode::A64SetX, &[Value::A64Reg(x0), Value::Inst(sum)]).unwrap();

    block
        .set_terminal(Terminal::if_then_else(
            Cond::NE,
            Terminal::link_block(LocationDescriptor::new(pc + 4)),
            Terminal::ReturnToDispatch,
        ))
        .unwrap();
    block
}

#[test]
fn test_image_round_trip() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut cache = BlockCache::new();
    for (pc, imm) in [(0x4000, 1), (0x1000, 2), (0x2000, 3)] {
        cache.insert(&create_add_block(pc, imm)).unwrap();
    }

    let image = words_to_le_bytes(&cache.to_words());
    let (mut reloaded, err) = BlockCache::from_words(&words_from_le_bytes(&image));
    assert!(err.is_none());
    assert_eq!(
        reloaded.locations(),
        vec![
            LocationDescriptor::new(0x1000),
            LocationDescriptor::new(0x2000),
            LocationDescriptor::new(0x4000),
        ]
    );

    let block = reloaded.lookup(LocationDescriptor::new(0x2000)).unwrap().unwrap();
    let expected = create_add_block(0x2000, 3);
    block.verify().unwrap();
    assert_eq!(block.len(), 3);
    assert_eq!(block.terminal(), expected.terminal());
    assert!(dump_block(&block).contains("%2     = Add64 %1, #0x3, #0 (uses: 1)"));
}

/// Drop the `[address] ` prefix of every instruction line.
fn strip_addresses(dump: &str) -> String {
    dump.lines()
        .map(|line| match line.strip_prefix('[') {
            Some(rest) if rest.len() > 18 && &rest[16..18] == "] " => &rest[18..],
            _ => line,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn test_conditional_block_reloads_with_its_entry_check() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut block = create_add_block(0x1000, 7);
    block.set_condition(Cond::NE);
    block.set_condition_failed_location(LocationDescriptor::new(0x1004));
    block.set_condition_failed_cycle_count(1);
    block.set_cycle_count(5);

    let mut cache = BlockCache::new();
    cache.insert(&block).unwrap();
    let image = words_to_le_bytes(&cache.to_words());
    let (mut reloaded, err) = BlockCache::from_words(&words_from_le_bytes(&image));
    assert!(err.is_none());

    let restored = reloaded.lookup(block.location()).unwrap().unwrap();
    let dump = dump_block(&restored);
    assert!(dump.contains("cycles=5, entry_cond=ne, cond_fail={0000000000001004}"));
    assert_eq!(restored.condition_failed_cycle_count(), 1);
    assert_eq!(strip_addresses(&dump), strip_addresses(&dump_block(&block)));
}

#[test]
fn test_corrupt_body_becomes_a_miss() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut cache = BlockCache::new();
    cache.insert(&create_add_block(0x1000, 1)).unwrap();
    cache.insert(&create_add_block(0x2000, 2)).unwrap();

    let mut words = cache.to_words();
    // Block magic of the first entry.
    words[ENTRY_HEADER_WORDS] ^= 0xffff;

    let (mut reloaded, err) = BlockCache::from_words(&words);
    assert!(err.is_none());
    assert_eq!(reloaded.len(), 2);

    assert!(reloaded.lookup(LocationDescriptor::new(0x1000)).unwrap().is_none());
    assert!(reloaded.lookup(LocationDescriptor::new(0x2000)).unwrap().is_some());
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded.stats().corrupt_evictions, 1);
    assert_eq!(reloaded.stats().hits, 1);
}

#[test]
fn test_garbage_after_entries_is_reported() {
    let mut cache = BlockCache::new();
    cache.insert(&create_add_block(0x1000, 1)).unwrap();

    let mut words = cache.to_words();
    words.push(ENTRY_MAGIC ^ 0x00ff);

    let (reloaded, err) = BlockCache::from_words(&words);
    assert!(err.is_some());
    assert!(reloaded.contains(LocationDescriptor::new(0x1000)));
}

#[test]
fn test_remove_and_replace() {
    let mut cache = BlockCache::new();
    cache.insert(&create_add_block(0x1000, 1)).unwrap();
    cache.insert(&create_add_block(0x1000, 9)).unwrap();
    assert_eq!(cache.len(), 1);

    let block = cache.lookup(LocationDescriptor::new(0x1000)).unwrap().unwrap();
    assert!(dump_block(&block).contains("#0x9"));

    assert!(cache.remove(LocationDescriptor::new(0x1000)));
    assert!(!cache.remove(LocationDescriptor::new(0x1000)));
    assert!(cache.is_empty());
}
