//! Per-connection protocol driver.
//!
//! A [`Session`] walks one connection through
//! `AwaitingUser -> AwaitingPassword -> Authenticating -> Playing -> Terminated`.
//! A failed authentication jumps straight to `Terminated`. Exactly one task
//! drives a session; the only state it shares with other sessions is the
//! result store and the shared board behind its render surface.

use crate::auth::{Authenticator, Player};
use crate::game::GameState;
use crate::render::{spawn_frame_streamer, FrameSource, NullSurface, RenderSurface};
use crate::results::{ResultRecord, ResultStore};
use log::{debug, error, info};
use shared::connection::Connection;
use shared::protocol::{self, GameSummary};
use shared::Direction;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingUser,
    AwaitingPassword,
    Authenticating,
    Playing,
    Terminated,
}

/// Why a session reached `Terminated`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    AuthFailed,
    Quit,
    Disconnected,
    Finished(ResultRecord),
}

pub type GameFactory = Arc<dyn Fn() -> GameState + Send + Sync>;

pub struct Session {
    id: u32,
    connection: Arc<Connection>,
    authenticator: Arc<dyn Authenticator>,
    results: Arc<ResultStore>,
    surface: Box<dyn RenderSurface>,
    frames: Option<(Arc<dyn FrameSource>, Duration)>,
    new_game: GameFactory,

    state: SessionState,
    username: Option<String>,
    password: Option<String>,
    user: Option<Player>,
    game: Option<GameState>,
    streamer: Option<JoinHandle<()>>,
    end: Option<SessionEnd>,
}

impl Session {
    pub fn new(
        id: u32,
        connection: Arc<Connection>,
        authenticator: Arc<dyn Authenticator>,
        results: Arc<ResultStore>,
    ) -> Self {
        Self {
            id,
            connection,
            authenticator,
            results,
            surface: Box::new(NullSurface),
            frames: None,
            new_game: Arc::new(GameState::new),
            state: SessionState::AwaitingUser,
            username: None,
            password: None,
            user: None,
            game: None,
            streamer: None,
            end: None,
        }
    }

    pub fn with_surface(mut self, surface: Box<dyn RenderSurface>) -> Self {
        self.surface = surface;
        self
    }

    /// Streams frames from `source` every `period` while the game runs.
    pub fn with_frames(mut self, source: Arc<dyn FrameSource>, period: Duration) -> Self {
        self.frames = Some((source, period));
        self
    }

    pub fn with_game_factory(mut self, factory: GameFactory) -> Self {
        self.new_game = factory;
        self
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn user(&self) -> Option<&Player> {
        self.user.as_ref()
    }

    /// Drives the session to `Terminated` and releases the connection.
    pub async fn run(mut self) -> SessionEnd {
        while self.state != SessionState::Terminated {
            let next = self.step().await;
            if next != self.state {
                debug!("Session {}: {:?} -> {:?}", self.id, self.state, next);
            }
            self.state = next;
        }

        self.teardown().await;
        let end = self.end.take().unwrap_or(SessionEnd::Disconnected);
        info!("Session {} ended: {:?}", self.id, end);
        end
    }

    async fn step(&mut self) -> SessionState {
        match self.state {
            SessionState::AwaitingUser => self.request_username().await,
            SessionState::AwaitingPassword => self.request_password().await,
            SessionState::Authenticating => self.authenticate().await,
            SessionState::Playing => self.play_turn().await,
            SessionState::Terminated => SessionState::Terminated,
        }
    }

    async fn request_username(&mut self) -> SessionState {
        self.connection.send_text(protocol::PROMPT_USER).await;
        match self.read_credential().await {
            Some(username) => {
                self.username = Some(username);
                SessionState::AwaitingPassword
            }
            None => self.reject().await,
        }
    }

    async fn request_password(&mut self) -> SessionState {
        self.connection.send_text(protocol::PROMPT_PASSWORD).await;
        match self.read_credential().await {
            Some(password) => {
                self.password = Some(password);
                SessionState::Authenticating
            }
            None => self.reject().await,
        }
    }

    /// Next text reply, trimmed. `None` if absent or empty.
    async fn read_credential(&mut self) -> Option<String> {
        let reply = self.connection.receive_text().await;
        if reply.is_none() {
            self.end = Some(SessionEnd::Disconnected);
        }

        reply
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
    }

    async fn authenticate(&mut self) -> SessionState {
        let username = self.username.take().unwrap_or_default();
        let password = self.password.take().unwrap_or_default();

        let Some(player) = self.authenticator.validate(&username, &password) else {
            info!("Session {}: rejected credentials for '{}'", self.id, username);
            return self.reject().await;
        };

        info!("Session {}: '{}' authenticated", self.id, player.name);
        self.connection
            .send_text(&protocol::welcome(&player.name))
            .await;
        self.user = Some(player);
        self.start_game().await;
        SessionState::Playing
    }

    async fn reject(&mut self) -> SessionState {
        self.connection
            .send_text(protocol::INVALID_CREDENTIALS)
            .await;
        if self.end.is_none() {
            self.end = Some(SessionEnd::AuthFailed);
        }
        SessionState::Terminated
    }

    async fn start_game(&mut self) {
        let game = (self.new_game)();
        self.surface
            .update_state(game.player(), &game.collectibles());
        self.game = Some(game);

        self.connection.send_text(protocol::GAME_STARTED).await;

        if let Some((source, period)) = &self.frames {
            self.streamer = Some(spawn_frame_streamer(
                Arc::clone(&self.connection),
                Arc::clone(source),
                *period,
            ));
        }
    }

    async fn play_turn(&mut self) -> SessionState {
        let Some(command) = self.connection.receive_text().await else {
            self.end = Some(SessionEnd::Disconnected);
            return SessionState::Terminated;
        };

        if protocol::is_quit(&command) {
            self.end = Some(SessionEnd::Quit);
            return SessionState::Terminated;
        }

        let Some(direction) = Direction::parse(&command) else {
            self.connection.send_text(protocol::INVALID_COMMAND).await;
            return SessionState::Playing;
        };

        let Some(game) = self.game.as_mut() else {
            self.end = Some(SessionEnd::Disconnected);
            return SessionState::Terminated;
        };

        let outcome = game.apply_move(direction);
        self.surface
            .update_state(game.player(), &game.collectibles());
        self.connection.send_text(&outcome.message()).await;

        if !game.is_terminated() {
            return SessionState::Playing;
        }

        let summary = GameSummary {
            score: game.score(),
            elapsed_secs: game.elapsed_secs(),
        };
        let record = self.persist(summary).await;
        self.connection.send_text(&summary.to_line()).await;
        self.end = Some(SessionEnd::Finished(record));
        SessionState::Terminated
    }

    async fn persist(&self, summary: GameSummary) -> ResultRecord {
        let name = self
            .user
            .as_ref()
            .map(|p| p.name.as_str())
            .unwrap_or_default();

        match self
            .results
            .append(name, summary.score, summary.elapsed_secs)
            .await
        {
            Ok(record) => record,
            Err(e) => {
                error!(
                    "Session {}: failed to store result in {}: {}",
                    self.id,
                    self.results.path().display(),
                    e
                );
                ResultRecord::new(name, summary.score, summary.elapsed_secs)
            }
        }
    }

    async fn teardown(&mut self) {
        if let Some(streamer) = self.streamer.take() {
            streamer.abort();
        }
        self.game = None;
        self.surface = Box::new(NullSurface);
        self.connection.close().await;
    }
}
