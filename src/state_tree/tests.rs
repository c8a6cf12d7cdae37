// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::*;
use crate::actors::builtin::{ActorVersion, BuiltinActor};
use crate::db::MemoryDB;
use crate::test_utils::{self, StateTreeBuilder, actor};
use crate::utils::cid::CidCborExt as _;
use pretty_assertions::assert_eq;

fn head(n: u64) -> Cid {
    Cid::from_cbor_blake2b256(&n).unwrap()
}

fn account(n: u64) -> ActorState {
    actor(test_utils::code(BuiltinActor::Account, ActorVersion::V9), head(n))
}

#[test]
fn versioned_and_bare_roots_load() {
    let db = MemoryDB::default();
    for version in [0, 1, 4, 5] {
        let root = StateTreeBuilder::new(version)
            .with_actor(Address::new_id(100), account(1))
            .flush(&db);
        let tree = StateTree::new_from_root(&db, &root).unwrap();
        assert_eq!(tree.version(), version);
        assert_eq!(
            tree.get_actor(&Address::new_id(100)).unwrap(),
            Some(account(1))
        );
        assert_eq!(tree.get_actor(&Address::new_id(101)).unwrap(), None);
    }
}

#[test]
fn for_each_visits_every_actor() {
    let db = MemoryDB::default();
    let mut builder = StateTreeBuilder::new(5);
    for id in 0..50 {
        builder = builder.with_actor(Address::new_id(id), account(id));
    }
    let tree = StateTree::new_from_root(&db, &builder.flush(&db)).unwrap();
    let mut seen = Vec::new();
    tree.for_each(|addr, state| {
        seen.push((addr.id()?, state));
        Ok(())
    })
    .unwrap();
    seen.sort_by_key(|(id, _)| *id);
    assert_eq!(seen, (0..50).map(|id| (id, account(id))).collect::<Vec<_>>());
}

#[test]
fn changes_are_classified_and_sorted() {
    let db = MemoryDB::default();
    let base = StateTreeBuilder::new(5)
        .with_actor(Address::new_id(1), account(1))
        .with_actor(Address::new_id(2), account(2))
        .with_actor(Address::new_id(3), account(3));
    let pre = base.flush(&db);
    let cur = base
        .clone()
        .with_actor(Address::new_id(2), account(20))
        .with_actor(Address::new_id(4), account(4));
    let mut cur = cur;
    cur.actors.remove(&Address::new_id(1).to_bytes());
    let cur = cur.flush(&db);

    let changes = diff_state_tree(&db, &pre, &cur).unwrap();
    let summary: Vec<_> = changes
        .iter()
        .map(|c| (c.address, c.change_type))
        .collect();
    assert_eq!(
        summary,
        vec![
            (Address::new_id(1), ChangeType::Removed),
            (Address::new_id(2), ChangeType::Modified),
            (Address::new_id(4), ChangeType::Added),
        ]
    );
    assert_eq!(changes[0].actor(), Some(&account(1)));
    assert_eq!(changes[1].old, Some(account(2)));
    assert_eq!(changes[1].actor(), Some(&account(20)));
    assert!(diff_state_tree(&db, &pre, &pre).unwrap().is_empty());
}

#[test]
fn version_upgrade_diffs_by_content() {
    let db = MemoryDB::default();
    let pre = StateTreeBuilder::new(0)
        .with_actor(Address::new_id(1), account(1))
        .with_actor(Address::new_id(2), account(2))
        .flush(&db);
    let cur = StateTreeBuilder::new(1)
        .with_actor(Address::new_id(1), account(1))
        .with_actor(Address::new_id(2), account(5))
        .flush(&db);
    let changes = diff_state_tree(&db, &pre, &cur).unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].address, Address::new_id(2));
    assert_eq!(changes[0].change_type, ChangeType::Modified);
}

#[test]
fn change_type_names() {
    assert_eq!(ChangeType::Added.to_string(), "Added");
    assert_eq!("Removed".parse::<ChangeType>().unwrap(), ChangeType::Removed);
}
