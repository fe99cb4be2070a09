//! Record collections under concurrent inserts, removes and replaces.

use std::sync::{Arc, Mutex};

use kseq::prelude::*;
use kseq::{Error, OpKind};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Piece {
    id: RecordId,
    square: u32,
    owner: String,
}

impl Record for Piece {
    fn record_id(&self) -> RecordId {
        self.id
    }

    fn set_record_id(&mut self, id: RecordId) {
        self.id = id;
    }
}

fn piece(square: u32, owner: &str) -> Piece {
    Piece {
        square,
        owner: owner.into(),
        ..Piece::default()
    }
}

fn board(name: &str, seed: u64) -> RecordCollection<Piece> {
    RecordCollection::with_config(Config::new(name).with_seed(seed)).unwrap()
}

fn squares(c: &RecordCollection<Piece>) -> Vec<u32> {
    c.iter().map(|p| p.square).collect()
}

#[test]
fn concurrent_replace_smaller_identifier_wins_everywhere() {
    init_tracing();
    let mut a = board("alice", 1);
    let mut b = board("bob", 2);
    let mut c = board("carol", 3);

    let insert = a.push(piece(0, "white")).unwrap();
    b.apply(insert.clone()).unwrap();
    c.apply(insert).unwrap();

    let mut moved_by_a = a.get(0).unwrap().clone();
    moved_by_a.square = 4;
    let set_a = a.replace(moved_by_a).unwrap();

    let mut moved_by_b = b.get(0).unwrap().clone();
    moved_by_b.square = 7;
    let set_b = b.replace(moved_by_b).unwrap();

    let expected = if set_a.id < set_b.id { 4 } else { 7 };

    a.apply(set_b.clone()).unwrap();
    b.apply(set_a.clone()).unwrap();
    c.apply(set_b).unwrap();
    c.apply(set_a).unwrap();

    for replica in [&a, &b, &c] {
        assert_eq!(squares(replica), vec![expected]);
    }
}

#[test]
fn later_set_loses_even_when_applied_last() {
    init_tracing();
    let mut a = board("alice", 4);
    let insert = a.push(piece(1, "black")).unwrap();
    let record = insert.value.clone();

    let mut small = record.clone();
    small.square = 10;
    let small = Operation::set("x", 0, kseq::Ident::lowest(), small);

    let mut large = record;
    large.square = 20;
    // Same depth as the insert but a larger digit, so it sorts after it.
    let digit = insert.id.path()[0].digit() + 1;
    let large_id = kseq::Ident::new(1, vec![kseq::Segment::new(digit, "y")]);
    let large = Operation::set("y", 0, large_id, large);

    assert_eq!(a.apply(small).unwrap(), Applied::Replaced { from: 0, to: 0 });
    assert_eq!(a.apply(large).unwrap(), Applied::Ignored);
    assert_eq!(squares(&a), vec![10]);
}

#[test]
fn replace_overtaking_insert_is_merged() {
    init_tracing();
    let mut a = board("alice", 5);
    let mut b = board("bob", 6);
    let mut late = board("late", 7);

    let insert = a.push(piece(0, "white")).unwrap();
    b.apply(insert.clone()).unwrap();
    let mut edited = b.get(0).unwrap().clone();
    edited.square = 3;
    let set = b.replace(edited).unwrap();

    assert_eq!(late.apply(set.clone()).unwrap(), Applied::Queued);
    assert_eq!(late.apply(insert).unwrap(), Applied::Inserted { index: 0 });
    assert_eq!(squares(&late), vec![3]);

    a.apply(set).unwrap();
    assert_eq!(a.to_vec(), late.to_vec());
    assert_eq!(b.to_vec(), late.to_vec());
}

#[test]
fn queued_set_conflict_is_reported() {
    init_tracing();
    let mut c = board("carol", 8);
    let mut record = piece(0, "white");
    record.id = RecordId::from_raw(99);

    let queued_id = kseq::Ident::new(2, vec![kseq::Segment::new(9, "bob")]);
    let insert_id = kseq::Ident::new(1, vec![kseq::Segment::new(2, "alice")]);
    c.apply(Operation::set("bob", 0, queued_id, record.clone()))
        .unwrap();

    match c.apply(Operation::insert("alice", 0, insert_id, record)) {
        Err(Error::QueuedSetConflict { id, .. }) => assert_eq!(id, RecordId::from_raw(99)),
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn local_notifications_drive_broadcast() {
    init_tracing();
    let mut a = board("alice", 9);
    let mut b = board("bob", 10);

    let outbox = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&outbox);
    a.events_mut()
        .on_local_added(move |e| sink.lock().unwrap().push(("add", e.value.square)));
    let sink = Arc::clone(&outbox);
    a.events_mut()
        .on_local_replaced(move |e| sink.lock().unwrap().push(("set", e.new.square)));

    a.push(piece(1, "white")).unwrap();
    b.apply(a.last_op().cloned().unwrap()).unwrap();

    let remote = b.push(piece(2, "black")).unwrap();
    a.apply(remote).unwrap();

    let mut first = a.get(0).unwrap().clone();
    first.square = 5;
    a.replace(first).unwrap();

    assert_eq!(*outbox.lock().unwrap(), vec![("add", 1), ("set", 5)]);
}

#[test]
fn count_changes_follow_length() {
    init_tracing();
    let mut a = board("alice", 11);
    let counts = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&counts);
    a.events_mut()
        .on_count_changed(move |n| sink.lock().unwrap().push(*n));

    a.push(piece(1, "w")).unwrap();
    a.push(piece(2, "w")).unwrap();
    let mut p = a.get(0).unwrap().clone();
    p.square = 9;
    a.replace(p).unwrap();
    a.remove_at(1);

    assert_eq!(*counts.lock().unwrap(), vec![1, 2, 1]);
}

#[test]
fn out_of_range_and_unknown_records() {
    let mut a = board("alice", 12);
    let err = a.insert(3, piece(0, "w")).unwrap_err();
    assert!(err.is_range_error());

    assert!(a.remove_at(0).is_none());
    assert!(a.last_op().is_none());

    let stray = a.create_record();
    assert!(matches!(a.replace(stray), Err(Error::UnknownRecord { .. })));
}

#[test]
fn randomized_record_convergence() {
    init_tracing();
    let mut rng = StdRng::seed_from_u64(7);
    let mut replicas: Vec<RecordCollection<Piece>> =
        (0..3).map(|i| board(&format!("p{i}"), 200 + i)).collect();
    let mut inboxes: Vec<Vec<Operation<Piece>>> = vec![Vec::new(); replicas.len()];

    let mut inserts = vec![0u32; replicas.len()];
    let mut edits = vec![0u32; replicas.len()];

    while inserts.iter().any(|&n| n < 1000) {
        let who = rng.gen_range(0..replicas.len());
        let local = &mut replicas[who];

        let op = if inserts[who] < 1000 && (edits[who] >= 900 || local.is_empty() || rng.gen_bool(0.55)) {
            inserts[who] += 1;
            let at = rng.gen_range(0..=local.len());
            Some(local.insert(at, piece(inserts[who], local.replica_id())).unwrap())
        } else if edits[who] < 900 && !local.is_empty() {
            edits[who] += 1;
            let at = rng.gen_range(0..local.len());
            if rng.gen_bool(0.5) {
                local.remove_at(at)
            } else {
                let mut record = local.get(at).cloned().unwrap();
                record.square += 1000;
                record.owner = local.replica_id().to_string();
                Some(local.replace(record).unwrap())
            }
        } else {
            None
        };

        if let Some(op) = op {
            for (other, inbox) in inboxes.iter_mut().enumerate() {
                if other != who {
                    inbox.push(op.clone());
                }
            }
        }

        for (target, inbox) in inboxes.iter_mut().enumerate() {
            for _ in 0..rng.gen_range(0..3) {
                if inbox.is_empty() {
                    break;
                }
                let pick = rng.gen_range(0..inbox.len());
                replicas[target].apply(inbox.swap_remove(pick)).unwrap();
            }
        }
    }

    for (target, inbox) in inboxes.iter_mut().enumerate() {
        inbox.shuffle(&mut rng);
        for op in inbox.drain(..) {
            replicas[target].apply(op).unwrap();
        }
    }

    let expected = replicas[0].to_vec();
    for other in &replicas[1..] {
        assert_eq!(other.to_vec(), expected);
        assert_eq!(other.queued_len(), 0);
    }
    for (pos, record) in replicas[0].iter().enumerate() {
        assert_eq!(replicas[0].index_of(record.id), Some(pos));
    }
}

#[test]
fn set_kind_round_trips_through_last_op() {
    let mut a = board("alice", 13);
    a.push(piece(0, "w")).unwrap();
    let mut p = a.get(0).unwrap().clone();
    p.owner = "b".into();
    let op = a.replace(p).unwrap();
    assert_eq!(op.kind, OpKind::Set);
    assert_eq!(a.last_op().map(|op| op.kind), Some(OpKind::Set));
}

/// Capture whatever stands on `to`, then move the piece on `from` there.
fn capture_and_move(
    board: &mut RecordCollection<Piece>,
    from: u32,
    to: u32,
) -> kseq::Result<Vec<Operation<Piece>>> {
    let mut ops = Vec::new();
    let capture = board.iter().position(|p| p.square == to);
    if let Some(index) = capture {
        ops.extend(board.remove_at(index));
    }
    let moving = board.iter().find(|p| p.square == from).cloned();
    if let Some(mut moving) = moving {
        moving.square = to;
        ops.push(board.replace(moving)?);
    }
    Ok(ops)
}

#[test]
fn capture_then_move_replicates() {
    init_tracing();
    let mut a = board("alice", 14);
    let mut b = board("bob", 15);
    for square in [1, 3, 6] {
        let op = a.push(piece(square, "w")).unwrap();
        b.apply(op).unwrap();
    }

    let ops = capture_and_move(&mut a, 1, 3).unwrap();
    assert_eq!(ops.iter().map(|op| op.kind).collect::<Vec<_>>(), vec![OpKind::Remove, OpKind::Set]);
    assert_eq!(squares(&a), vec![3, 6]);

    for op in ops.into_iter().rev() {
        b.apply(op).unwrap();
    }
    assert_eq!(b.to_vec(), a.to_vec());
    for (pos, record) in b.iter().enumerate() {
        assert_eq!(b.index_of(record.id), Some(pos));
    }
}
