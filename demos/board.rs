//! A one-dimensional chess board shared by two players through a hosted
//! session.
//!
//! Run with `cargo run --example board`. Set `RUST_LOG=kseq=debug` to watch the
//! replication decisions.

use std::collections::VecDeque;

use kseq::prelude::*;
use kseq::{Registry, Relay};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    King,
    Knight,
    Rook,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Piece {
    id: RecordId,
    kind: Kind,
    square: i32,
    player: u8,
}

impl Record for Piece {
    fn record_id(&self) -> RecordId {
        self.id
    }

    fn set_record_id(&mut self, id: RecordId) {
        self.id = id;
    }
}

fn piece(kind: Kind, square: i32, player: u8) -> Piece {
    Piece {
        id: RecordId::UNASSIGNED,
        kind,
        square,
        player,
    }
}

fn render(pieces: &RecordCollection<Piece>) -> String {
    let mut row = vec!['.'; 8];
    for p in pieces.iter() {
        let glyph = match (p.kind, p.player) {
            (Kind::King, 0) => 'K',
            (Kind::Knight, 0) => 'N',
            (Kind::Rook, 0) => 'R',
            (Kind::King, _) => 'k',
            (Kind::Knight, _) => 'n',
            (Kind::Rook, _) => 'r',
        };
        if let Some(cell) = usize::try_from(p.square).ok().and_then(|i| row.get_mut(i)) {
            *cell = glyph;
        }
    }
    row.into_iter().collect()
}

/// Move the piece standing on `from` to `to`, capturing whatever is there.
fn play(
    board: &mut RecordCollection<Piece>,
    from: i32,
    to: i32,
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

fn main() -> kseq::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let mut registry = Registry::new();
    let session = registry.open("game-1", RecordCollection::new("_"))?;

    let setup = [
        piece(Kind::King, 0, 0),
        piece(Kind::Knight, 1, 0),
        piece(Kind::Rook, 2, 0),
        piece(Kind::Rook, 5, 1),
        piece(Kind::Knight, 6, 1),
        piece(Kind::King, 7, 1),
    ];
    for p in setup {
        session.host_mut().push(p)?;
    }

    let mut white = RecordCollection::from_snapshot(Config::new("white"), session.join("white"))?;
    let mut black = RecordCollection::from_snapshot(Config::new("black"), session.join("black"))?;
    println!("start  {}", render(session.host()));

    black.events_mut().on_replaced(|e| {
        if e.origin != "black" {
            println!("  black sees {:?} move {} -> {}", e.new.kind, e.old.square, e.new.square);
        }
    });

    // Both players move at once; the network delivers in arbitrary order.
    let mut wire: VecDeque<(&str, Operation<Piece>)> = VecDeque::new();
    wire.extend(play(&mut white, 1, 3)?.into_iter().map(|op| ("white", op)));
    wire.extend(play(&mut black, 6, 4)?.into_iter().map(|op| ("black", op)));
    wire.extend(play(&mut white, 2, 5)?.into_iter().map(|op| ("white", op)));

    while let Some((from, op)) = wire.pop_back() {
        let Relay { op, recipients, .. } = session.relay(from, op)?;
        for peer in recipients {
            match peer.as_str() {
                "white" => white.apply(op.clone())?,
                "black" => black.apply(op.clone())?,
                _ => continue,
            };
        }
    }

    println!("host   {}", render(session.host()));
    println!("white  {}", render(&white));
    println!("black  {}", render(&black));
    assert_eq!(white.to_vec(), black.to_vec());

    let closed = registry.close("game-1")?;
    println!("closed {} with {} pieces", closed.id(), closed.host().len());
    Ok(())
}
