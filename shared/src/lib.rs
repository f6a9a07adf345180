//! Types and protocol plumbing shared by the maze-chase server and client.
//!
//! - [`wire`]: the tagged two-channel wire codec
//! - [`connection`]: the [`Connection`](connection::Connection) multiplexer built on it
//! - [`protocol`]: the text vocabulary exchanged on the text channel
//!
//! The crate root holds the game geometry both sides agree on: arena size,
//! player size, the collectible catalog and the proximity test used to pick
//! collectibles up.

pub mod connection;
pub mod protocol;
pub mod wire;

use serde::{Deserialize, Serialize};

pub const ARENA_WIDTH: i32 = 800;
pub const ARENA_HEIGHT: i32 = 600;
pub const PLAYER_SIZE: i32 = 20;
/// Tiles travelled by one accepted move command.
pub const TILES_PER_MOVE: i32 = 4;
/// Unit steps attempted per move command.
pub const STEPS_PER_MOVE: i32 = TILES_PER_MOVE * PLAYER_SIZE;
pub const COLLECTIBLE_COUNT: usize = 4;
/// Keeps collectibles off the arena walls.
pub const COLLECTIBLE_MARGIN: i32 = 50;
pub const COLLECTIBLE_SIZE: i32 = 15;
/// Centre distance below which the player picks a collectible up.
/// Tunable; derived from the player and collectible sizes.
pub const COLLECT_DISTANCE: f32 = (PLAYER_SIZE + COLLECTIBLE_SIZE) as f32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }

    /// One unit step in `direction`.
    pub fn step(&self, direction: Direction) -> Position {
        let (dx, dy) = direction.delta();
        Position::new(self.x + dx, self.y + dy)
    }
}

/// Returns true if a player square at `pos` lies entirely inside the arena.
pub fn is_in_bounds(pos: Position, width: i32, height: i32) -> bool {
    pos.x >= 0 && pos.y >= 0 && pos.x + PLAYER_SIZE <= width && pos.y + PLAYER_SIZE <= height
}

/// Centre of the player square whose top-left corner is `pos`.
pub fn player_center(pos: Position) -> Position {
    Position::new(pos.x + PLAYER_SIZE / 2, pos.y + PLAYER_SIZE / 2)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Parses a client command into a direction.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace. The
    /// canonical Spanish words, their three-letter abbreviations and the
    /// English names are accepted.
    pub fn parse(command: &str) -> Option<Direction> {
        match command.trim().to_lowercase().as_str() {
            "arriba" | "arr" | "up" | "u" => Some(Direction::Up),
            "abajo" | "aba" | "down" | "d" => Some(Direction::Down),
            "izquierda" | "izq" | "left" | "l" => Some(Direction::Left),
            "derecha" | "der" | "right" | "r" => Some(Direction::Right),
            _ => None,
        }
    }

    pub fn delta(&self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

/// The fixed catalog collectibles are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectibleKind {
    Cherry,
    Strawberry,
    Orange,
    Apple,
    Melon,
    Galaxian,
    Bell,
    Key,
}

impl CollectibleKind {
    pub const CATALOG: [CollectibleKind; 8] = [
        CollectibleKind::Cherry,
        CollectibleKind::Strawberry,
        CollectibleKind::Orange,
        CollectibleKind::Apple,
        CollectibleKind::Melon,
        CollectibleKind::Galaxian,
        CollectibleKind::Bell,
        CollectibleKind::Key,
    ];

    pub fn points(&self) -> i32 {
        match self {
            CollectibleKind::Cherry => 100,
            CollectibleKind::Strawberry => 300,
            CollectibleKind::Orange => 500,
            CollectibleKind::Apple => 700,
            CollectibleKind::Melon => 1000,
            CollectibleKind::Galaxian => 2000,
            CollectibleKind::Bell => 3000,
            CollectibleKind::Key => 5000,
        }
    }

    /// Display name shown to players.
    pub fn name(&self) -> &'static str {
        match self {
            CollectibleKind::Cherry => "Cereza",
            CollectibleKind::Strawberry => "Fresa",
            CollectibleKind::Orange => "Naranja",
            CollectibleKind::Apple => "Manzana",
            CollectibleKind::Melon => "Melón",
            CollectibleKind::Galaxian => "Galaxian",
            CollectibleKind::Bell => "Campana",
            CollectibleKind::Key => "Llave",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collectible {
    pub kind: CollectibleKind,
    /// Centre of the collectible.
    pub position: Position,
    pub collected: bool,
}

impl Collectible {
    pub fn new(kind: CollectibleKind, position: Position) -> Self {
        Self {
            kind,
            position,
            collected: false,
        }
    }

    pub fn points(&self) -> i32 {
        self.kind.points()
    }
}

/// Proximity test between the player square at `player` and a collectible.
/// Already collected items never collide.
pub fn touches(player: Position, collectible: &Collectible) -> bool {
    !collectible.collected && player_center(player).distance(&collectible.position) < COLLECT_DISTANCE
}

/// What the shared board knows about one live game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: u32,
    pub player: Position,
    pub collectibles: Vec<Collectible>,
}

/// One frame of the shared board, as streamed on the frame channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub width: i32,
    pub height: i32,
    pub sessions: Vec<SessionView>,
}

impl BoardSnapshot {
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}
