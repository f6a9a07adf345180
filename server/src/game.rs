use log::{debug, info};
use rand::seq::SliceRandom;
use rand::Rng;
use shared::protocol;
use shared::{
    is_in_bounds, touches, Collectible, CollectibleKind, Direction, Position, ARENA_HEIGHT,
    ARENA_WIDTH, COLLECTIBLE_COUNT, COLLECTIBLE_MARGIN, PLAYER_SIZE, STEPS_PER_MOVE,
};
use std::time::Instant;

/// Result of one move command.
///
/// `BoundaryReached` deliberately carries nothing: the player must not learn
/// how far they got or which way is still open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    BoundaryReached,
    Moved,
    Collected { score: i32 },
    Finished { score: i32 },
    AlreadyFinished,
}

impl MoveOutcome {
    /// True if the full step count was travelled.
    pub fn completed(&self) -> bool {
        !matches!(self, MoveOutcome::BoundaryReached | MoveOutcome::AlreadyFinished)
    }

    pub fn message(&self) -> String {
        match self {
            MoveOutcome::BoundaryReached => protocol::BOUNDARY_REACHED.to_string(),
            MoveOutcome::Moved => protocol::MOVE_OK.to_string(),
            MoveOutcome::Collected { score } => protocol::item_collected(*score),
            MoveOutcome::Finished { score } => protocol::all_items_collected(*score),
            MoveOutcome::AlreadyFinished => protocol::GAME_ALREADY_FINISHED.to_string(),
        }
    }
}

/// One single-player game. Pure simulation, no I/O.
#[derive(Debug, Clone)]
pub struct GameState {
    width: i32,
    height: i32,
    player: Position,
    collectibles: Vec<Collectible>,
    score: i32,
    started_at: Instant,
    terminated: bool,
}

impl GameState {
    pub fn new() -> Self {
        Self::with_rng(&mut rand::thread_rng())
    }

    /// Places `COLLECTIBLE_COUNT` distinct kinds at random inset positions.
    pub fn with_rng<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let collectibles = CollectibleKind::CATALOG
            .choose_multiple(rng, COLLECTIBLE_COUNT)
            .map(|kind| {
                let x = COLLECTIBLE_MARGIN + rng.gen_range(0..ARENA_WIDTH - 2 * COLLECTIBLE_MARGIN);
                let y = COLLECTIBLE_MARGIN + rng.gen_range(0..ARENA_HEIGHT - 2 * COLLECTIBLE_MARGIN);
                Collectible::new(*kind, Position::new(x, y))
            })
            .collect();

        Self::with_collectibles(ARENA_WIDTH, ARENA_HEIGHT, collectibles)
    }

    /// Starts a game on a `width` x `height` arena with a fixed layout.
    /// The player starts centred.
    pub fn with_collectibles(width: i32, height: i32, collectibles: Vec<Collectible>) -> Self {
        let player = Position::new(width / 2 - PLAYER_SIZE / 2, height / 2 - PLAYER_SIZE / 2);
        debug!(
            "New game {}x{} with {} collectibles",
            width,
            height,
            collectibles.len()
        );

        Self {
            width,
            height,
            player,
            collectibles,
            score: 0,
            started_at: Instant::now(),
            terminated: false,
        }
    }

    pub fn apply_move(&mut self, direction: Direction) -> MoveOutcome {
        if self.terminated {
            return MoveOutcome::AlreadyFinished;
        }

        if !self.step(direction) {
            return MoveOutcome::BoundaryReached;
        }

        let player = self.player;
        let mut collected_any = false;
        for item in self.collectibles.iter_mut().filter(|item| touches(player, item)) {
            item.collected = true;
            self.score += item.points();
            collected_any = true;
            info!("Collected {} (+{})", item.kind.name(), item.points());
        }

        if !collected_any {
            return MoveOutcome::Moved;
        }

        if self.collectibles.iter().all(|item| item.collected) {
            self.terminated = true;
            MoveOutcome::Finished { score: self.score }
        } else {
            MoveOutcome::Collected { score: self.score }
        }
    }

    /// Walks one unit at a time and stops before the first step that would
    /// leave the arena. Returns true if every step was taken.
    fn step(&mut self, direction: Direction) -> bool {
        for _ in 0..STEPS_PER_MOVE {
            let next = self.player.step(direction);
            if !is_in_bounds(next, self.width, self.height) {
                return false;
            }
            self.player = next;
        }
        true
    }

    pub fn player(&self) -> Position {
        self.player
    }

    pub fn collectibles(&self) -> Vec<Collectible> {
        self.collectibles.clone()
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn elapsed_secs(&self) -> i64 {
        self.started_at.elapsed().as_secs() as i64
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}
