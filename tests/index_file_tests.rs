//! Loading, presence and audits of index files on disk

mod common;

use common::*;
use waveform_index::constants::FULL_BITMAP;
use waveform_index::{
    BlockStore, ControlBlock, FileBlockStore, IndexFile, IndexFileKind, MasterBlock, MismatchKind,
};

#[test]
fn test_scenario_a_presence_bitset() {
    let dir = create_temp_dir_for_test();
    let idx_path = dir.path().join("2024_123.idx");
    let store = FileBlockStore::create(&idx_path).unwrap();

    let mut control = ControlBlock::new();
    control.add_master_block(5).unwrap();
    control.next_index_block = 11;
    store.write_block(0, &control.encode()).unwrap();

    let mut master = MasterBlock::new(5);
    master.add_channel(bhz(), 10).unwrap();
    store.write_block(5, &master.encode()).unwrap();
    store
        .write_block(10, &index_block(bhz(), 10, -1, &[extent(100, FULL_BITMAP)]).serialize())
        .unwrap();
    drop(store);

    let file = IndexFile::open(&idx_path, true).unwrap();
    assert_eq!(file.kind(), IndexFileKind::Primary);
    assert_eq!(file.control().master_block_numbers(), vec![5]);
    let presence: Vec<usize> = file.presence_bitset().ones().collect();
    assert_eq!(presence, (100..=163).collect::<Vec<_>>());
}

#[test]
fn test_presence_unions_every_chain() {
    let dir = create_temp_dir_for_test();
    let triple = TripleBuilder::new(&dir, "2024_123")
        .channel(bhz(), 2)
        .channel(bhn(), 4)
        .both(index_block(bhz(), 2, 3, &[extent(100, FULL_BITMAP)]))
        .both(index_block(bhz(), 3, -1, &[extent(164, 0b101)]))
        .both(index_block(bhn(), 4, -1, &[extent(300, 0b1)]))
        .build();

    let file = IndexFile::open(triple.idx_path(), true).unwrap();
    let presence = file.presence_bitset();
    assert_eq!(presence.count_ones(..), 64 + 2 + 1);
    assert!(presence.contains(166));
    assert!(!presence.contains(165));
    assert!(presence.contains(300));
}

#[test]
fn test_invalid_blocks_are_absent_not_fatal() {
    let dir = create_temp_dir_for_test();
    let triple = TripleBuilder::new(&dir, "2024_123")
        .channel(bhz(), 2)
        .both(index_block(bhz(), 2, -1, &[extent(100, 0b1)]))
        .idx_raw(3, [0xffu8; 512])
        .build();

    let file = IndexFile::open(triple.idx_path(), true).unwrap();
    assert!(file.block(2).is_some());
    assert!(file.block(3).is_none());
    assert_eq!(file.absent_blocks(), &[3]);
}

#[test]
fn test_shadow_kind_from_extension() {
    let dir = create_temp_dir_for_test();
    let triple = TripleBuilder::new(&dir, "2024_123")
        .channel(bhz(), 2)
        .both(index_block(bhz(), 2, -1, &[]))
        .build();

    let chk = IndexFile::open(triple.chk_path(), true).unwrap();
    assert_eq!(chk.kind(), IndexFileKind::Shadow);
    assert_eq!(chk.channels().len(), 1);
}

#[test]
fn test_audit_follows_idx_chain_into_chk() {
    let dir = create_temp_dir_for_test();
    // chk pointers are garbage; the audit must still visit blocks 2 and 3.
    let triple = TripleBuilder::new(&dir, "2024_123")
        .channel(bhz(), 2)
        .idx(index_block(bhz(), 2, 3, &[extent(100, FULL_BITMAP)]))
        .chk(index_block(bhz(), 2, 77, &[extent(100, FULL_BITMAP)]))
        .idx(index_block(bhz(), 3, -1, &[extent(164, 0b11)]))
        .chk(index_block(bhz(), 3, 2, &[extent(170, 0b11)]))
        .build();

    let idx = IndexFile::open(triple.idx_path(), true).unwrap();
    let chk = IndexFile::open(triple.chk_path(), true).unwrap();

    assert!(idx.compare_master_blocks(&chk).is_consistent());
    let audit = idx.compare_index_blocks(&chk, true);
    assert_eq!(audit.channels, 1);
    assert_eq!(audit.checked, 2);
    assert_eq!(audit.ok, 1);
    assert_eq!(audit.count(MismatchKind::BlockMismatch), 1);
    assert_eq!(audit.mismatches[0].block, Some(3));
    assert!(audit.render().contains("missing 2 blocks: [164, 165]"));
}

#[test]
fn test_audit_between_two_primaries_detects_divergence() {
    let dir = create_temp_dir_for_test();
    let left = TripleBuilder::new(&dir, "left")
        .channel(bhz(), 2)
        .idx(index_block(bhz(), 2, 3, &[extent(100, FULL_BITMAP)]))
        .idx(index_block(bhz(), 3, -1, &[]))
        .idx(index_block(bhz(), 4, -1, &[]))
        .build();
    let right = TripleBuilder::new(&dir, "right")
        .channel(bhz(), 2)
        .idx(index_block(bhz(), 2, 4, &[extent(100, FULL_BITMAP)]))
        .idx(index_block(bhz(), 3, -1, &[]))
        .idx(index_block(bhz(), 4, -1, &[]))
        .build();

    let left = IndexFile::open(left.idx_path(), true).unwrap();
    let right = IndexFile::open(right.idx_path(), true).unwrap();
    let audit = left.compare_index_blocks(&right, false);
    assert_eq!(audit.ok, 1);
    assert_eq!(audit.count(MismatchKind::ChainDivergence), 1);
}
