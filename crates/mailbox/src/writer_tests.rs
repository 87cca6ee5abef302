// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::paths::MailboxTier;
use sg_core::FakeClock;
use tempfile::tempdir;

#[test]
fn write_lands_in_the_pending_tier() {
    let dir = tempdir().unwrap();
    let root = MailboxRoot::new(dir.path());
    let writer = MessageWriter::with_clock(root.clone(), FakeClock::new());

    let msg = writer
        .write(AgentId::King, AgentId::Shogun, "t1", "task", "調査して")
        .unwrap();

    let path = root.pending_file(AgentId::Shogun, AgentId::King, &msg.id);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "調査して");

    let addr = root.classify(&path).unwrap();
    assert_eq!(addr.tier, MailboxTier::Pending);
    assert_eq!(addr.to, AgentId::Shogun);
    assert_eq!(addr.from, AgentId::King);
    assert_eq!(addr.stem, msg.id);

    let parsed = sg_core::parse_stem(&msg.id);
    assert_eq!(parsed.thread_id.as_deref(), Some("t1"));
    assert_eq!(parsed.title, "task");
}

#[test]
fn write_rejects_delimiter_thread_ids() {
    let dir = tempdir().unwrap();
    let writer = MessageWriter::new(MailboxRoot::new(dir.path()));
    assert!(matches!(
        writer.write(AgentId::King, AgentId::Shogun, "a__b", "t", "b"),
        Err(WriteError::InvalidThreadId(_))
    ));
}

#[test]
fn stems_never_collide() {
    let dir = tempdir().unwrap();
    let writer = MessageWriter::with_clock(MailboxRoot::new(dir.path()), FakeClock::new());

    // Same clock instant, same title: the rand token must keep ids unique.
    let a = writer.write(AgentId::King, AgentId::Shogun, "t1", "task", "a").unwrap();
    let b = writer.write(AgentId::King, AgentId::Shogun, "t1", "task", "b").unwrap();
    assert_ne!(a.id, b.id);
}

#[test]
fn no_temp_litter_after_write() {
    let dir = tempdir().unwrap();
    let root = MailboxRoot::new(dir.path());
    let writer = MessageWriter::new(root.clone());
    let msg = writer.write(AgentId::King, AgentId::Shogun, "t1", "task", "b").unwrap();

    let parent = root.pending_file(AgentId::Shogun, AgentId::King, &msg.id);
    let entries: Vec<_> = std::fs::read_dir(parent.parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(entries, vec![format!("{}.md", msg.id)]);
}
