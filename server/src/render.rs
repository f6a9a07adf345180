//! Shared visual state and frame streaming.
//!
//! The drawing itself belongs to whatever front end embeds the server. The
//! core only pushes state through [`RenderSurface`] and pulls encoded frames
//! through [`FrameSource`]. [`SharedBoard`] implements both sides: it keeps
//! the latest view of every live game and encodes the whole board as one
//! bincode [`BoardSnapshot`] per frame.

use bincode::serialize;
use log::{debug, error};
use shared::connection::Connection;
use shared::{BoardSnapshot, Collectible, Position, SessionView, ARENA_HEIGHT, ARENA_WIDTH};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Receives the state of one game after every change.
pub trait RenderSurface: Send + Sync {
    fn update_state(&self, player: Position, collectibles: &[Collectible]);
}

/// Produces the next encoded frame for the binary channel.
pub trait FrameSource: Send + Sync {
    fn capture(&self) -> Option<Vec<u8>>;
}

pub struct SharedBoard {
    width: i32,
    height: i32,
    views: RwLock<BTreeMap<u32, SessionView>>,
}

impl SharedBoard {
    pub fn new() -> Self {
        Self {
            width: ARENA_WIDTH,
            height: ARENA_HEIGHT,
            views: RwLock::new(BTreeMap::new()),
        }
    }

    /// Hands out the surface a single session draws on. The session's entry
    /// disappears from the board when the view is dropped.
    pub fn view(self: &Arc<Self>, session_id: u32) -> BoardView {
        BoardView {
            board: Arc::clone(self),
            session_id,
        }
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        let views = self.views.read().unwrap_or_else(|p| p.into_inner());
        BoardSnapshot {
            width: self.width,
            height: self.height,
            sessions: views.values().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.views.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn put(&self, view: SessionView) {
        let mut views = self.views.write().unwrap_or_else(|p| p.into_inner());
        views.insert(view.session_id, view);
    }

    fn remove(&self, session_id: u32) {
        let mut views = self.views.write().unwrap_or_else(|p| p.into_inner());
        views.remove(&session_id);
    }
}

impl Default for SharedBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for SharedBoard {
    fn capture(&self) -> Option<Vec<u8>> {
        match serialize(&self.snapshot()) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                error!("Failed to encode board snapshot: {}", e);
                None
            }
        }
    }
}

/// One session's slot on the [`SharedBoard`].
pub struct BoardView {
    board: Arc<SharedBoard>,
    session_id: u32,
}

impl RenderSurface for BoardView {
    fn update_state(&self, player: Position, collectibles: &[Collectible]) {
        self.board.put(SessionView {
            session_id: self.session_id,
            player,
            collectibles: collectibles.to_vec(),
        });
    }
}

impl Drop for BoardView {
    fn drop(&mut self) {
        self.board.remove(self.session_id);
    }
}

/// Surface for games nobody watches.
pub struct NullSurface;

impl RenderSurface for NullSurface {
    fn update_state(&self, _player: Position, _collectibles: &[Collectible]) {}
}

/// Sends one captured frame per `period` until the connection closes.
pub fn spawn_frame_streamer(
    connection: Arc<Connection>,
    source: Arc<dyn FrameSource>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut sent: u64 = 0;
        while !connection.is_closed() {
            ticker.tick().await;
            let frame = source.capture();
            connection.send_frame(frame.as_deref()).await;
            sent += 1;
        }

        debug!("Frame streamer stopped after {} frames", sent);
    })
}
