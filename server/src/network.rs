//! TCP front of the server: accept loop, session tasks and shutdown

use crate::auth::Authenticator;
use crate::config::ServerConfig;
use crate::game::GameState;
use crate::render::SharedBoard;
use crate::results::{best_result, ResultRecord, ResultStore};
use crate::session::{GameFactory, Session, SessionEnd};
use crate::session_manager::{close_all, SessionManager};
use log::{error, info, warn};
use shared::connection::Connection;
use shared::protocol;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};

/// How long session tasks get to wind down after their connections close.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Accepts connections and runs one [`Session`] task per connection.
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    authenticator: Arc<dyn Authenticator>,
    results: Arc<ResultStore>,
    sessions: Arc<RwLock<SessionManager>>,
    board: Arc<SharedBoard>,
    new_game: GameFactory,
}

impl Server {
    pub async fn bind(
        config: ServerConfig,
        authenticator: Arc<dyn Authenticator>,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(config.bind_address()).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            results: Arc::new(ResultStore::new(config.results_path.clone())),
            sessions: Arc::new(RwLock::new(SessionManager::new(config.max_sessions))),
            board: Arc::new(SharedBoard::new()),
            new_game: Arc::new(GameState::new),
            authenticator,
            config,
        })
    }

    /// Replaces the random game layout, mostly for tests.
    pub fn with_game_factory(mut self, factory: GameFactory) -> Self {
        self.new_game = factory;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn results(&self) -> Arc<ResultStore> {
        Arc::clone(&self.results)
    }

    pub fn board(&self) -> Arc<SharedBoard> {
        Arc::clone(&self.board)
    }

    /// Serves until `shutdown` resolves, then closes every session and
    /// returns the best stored result.
    pub async fn run<F>(self, shutdown: F) -> Option<ResultRecord>
    where
        F: Future<Output = ()>,
    {
        let mut tasks: JoinSet<SessionEnd> = JoinSet::new();
        tokio::pin!(shutdown);

        info!("Server started successfully");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.accept(stream, addr, &mut tasks).await,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        sleep(Duration::from_millis(10)).await;
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!("Session task failed: {}", e);
                    }
                }
            }
        }

        self.shutdown(tasks).await
    }

    async fn accept(&self, stream: TcpStream, addr: SocketAddr, tasks: &mut JoinSet<SessionEnd>) {
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
        }
        let connection = Connection::spawn(stream);

        let session_id = {
            let mut sessions = self.sessions.write().await;
            sessions.add_session(addr, Arc::clone(&connection))
        };

        let Some(session_id) = session_id else {
            warn!("Rejecting {}: server full", addr);
            connection.send_text(protocol::SERVER_FULL).await;
            connection.close().await;
            return;
        };

        let mut session = Session::new(
            session_id,
            connection,
            Arc::clone(&self.authenticator),
            Arc::clone(&self.results),
        )
        .with_surface(Box::new(self.board.view(session_id)))
        .with_game_factory(Arc::clone(&self.new_game));

        if self.config.stream_frames {
            session = session.with_frames(self.board.clone(), self.config.frame_interval);
        }

        let sessions = Arc::clone(&self.sessions);
        tasks.spawn(async move {
            let end = session.run().await;
            sessions.write().await.remove_session(&session_id);
            end
        });
    }

    async fn shutdown(self, mut tasks: JoinSet<SessionEnd>) -> Option<ResultRecord> {
        drop(self.listener);

        let connections = self.sessions.read().await.connections();
        if !connections.is_empty() {
            info!("Closing {} active sessions", connections.len());
        }
        close_all(connections).await;

        let drained = timeout(SHUTDOWN_GRACE, async {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    error!("Session task failed: {}", e);
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!("Session tasks still running after {:?}, aborting", SHUTDOWN_GRACE);
            tasks.abort_all();
        }

        let records = self.results.read_all().await;
        let best = best_result(&records).cloned();
        match &best {
            Some(record) => info!(
                "Best result of {} games: {} with {} points in {}s",
                records.len(),
                record.name,
                record.score,
                record.elapsed_secs
            ),
            None => info!("No results recorded"),
        }

        best
    }
}
