//! Integration tests for the maze-chase server and client
//!
//! These tests validate cross-component interactions over real TCP sockets.

use bincode::deserialize;
use client::network::{Client, ClientState};
use server::auth::UserDirectory;
use server::config::ServerConfig;
use server::game::GameState;
use server::network::Server;
use server::results::{best_result, ResultRecord, ResultStore, RECORD_SIZE};
use shared::connection::Connection;
use shared::protocol::{self, GameSummary};
use shared::{BoardSnapshot, Collectible, CollectibleKind, Position, ARENA_HEIGHT, ARENA_WIDTH};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Connected TCP pair wrapped in connections with the given queue sizes.
async fn tcp_pair(capacity: usize) -> (Arc<Connection>, Arc<Connection>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (accepted, connected) = tokio::join!(listener.accept(), TcpStream::connect(addr));
    let (server_stream, _) = accepted.unwrap();

    (
        Connection::with_capacity(server_stream, capacity, capacity),
        Connection::with_capacity(connected.unwrap(), capacity, capacity),
    )
}

/// MULTIPLEXER TESTS
mod connection_tests {
    use super::*;

    /// Interleaved text and frames arrive in order on their own channels
    #[tokio::test]
    async fn interleaved_channels_keep_order() {
        let (sender, receiver) = tcp_pair(1024).await;
        let pairs = 500;

        let writer = tokio::spawn(async move {
            for i in 0..pairs {
                sender.send_text(&format!("line {}", i)).await;
                sender.send_frame(Some(&(i as u32).to_be_bytes())).await;
            }
            sender.close().await;
        });

        let mut texts = Vec::new();
        while let Some(text) = receiver.receive_text().await {
            texts.push(text);
        }
        let mut frames = Vec::new();
        while let Some(frame) = receiver.receive_frame().await {
            frames.push(u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]));
        }
        writer.await.unwrap();

        assert_eq!(texts.len(), pairs);
        assert_eq!(frames.len(), pairs);
        for i in 0..pairs {
            assert_eq!(texts[i], format!("line {}", i));
            assert_eq!(frames[i], i as u32);
        }
    }

    /// A receive parked on an idle connection returns once it is closed
    #[tokio::test]
    async fn close_unblocks_pending_receive() {
        let (local, _remote) = tcp_pair(16).await;

        let waiting = {
            let local = Arc::clone(&local);
            tokio::spawn(async move { local.receive_text().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        local.close().await;
        let result = timeout(Duration::from_secs(1), waiting)
            .await
            .expect("receive still blocked")
            .unwrap();
        assert!(result.is_none());
        assert!(local.is_closed());
    }

    /// A message with an unknown tag ends the connection
    #[tokio::test]
    async fn unknown_tag_closes_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut raw = TcpStream::connect(addr).await.unwrap();
        let (accepted, _) = listener.accept().await.unwrap();
        let connection = Connection::spawn(accepted);

        let mut bytes = shared::wire::encode_text("antes").unwrap();
        bytes.extend_from_slice(&7i32.to_be_bytes());
        bytes.extend_from_slice(&[0, 0, 0, 1]);
        raw.write_all(&bytes).await.unwrap();

        assert_eq!(connection.receive_text().await.as_deref(), Some("antes"));
        assert!(connection.receive_text().await.is_none());
        assert!(connection.receive_frame().await.is_none());
        assert!(connection.is_closed());
    }
}

struct RunningServer {
    addr: std::net::SocketAddr,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<Option<ResultRecord>>,
}

impl RunningServer {
    async fn start(results: &Path, stream_frames: bool) -> Self {
        let config = ServerConfig {
            port: 0,
            results_path: results.to_path_buf(),
            stream_frames,
            frame_interval: Duration::from_millis(10),
            ..ServerConfig::default()
        };

        let server = Server::bind(config, Arc::new(UserDirectory::from_list("ana:uno,bob:dos")))
            .await
            .unwrap()
            .with_game_factory(Arc::new(two_item_game));
        let addr = server.local_addr().unwrap();

        let (stop, stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run(async {
            let _ = stop_rx.await;
        }));

        RunningServer { addr, stop, handle }
    }

    async fn stop(self) -> Option<ResultRecord> {
        let _ = self.stop.send(());
        timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop")
            .unwrap()
    }
}

/// A cherry one move up and an orange one move right of the start.
fn two_item_game() -> GameState {
    let items = vec![
        Collectible::new(CollectibleKind::Cherry, Position::new(400, 220)),
        Collectible::new(CollectibleKind::Orange, Position::new(480, 300)),
    ];
    GameState::with_collectibles(ARENA_WIDTH, ARENA_HEIGHT, items)
}

async fn commands(lines: &[&str]) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(lines.len().max(1));
    for line in lines {
        tx.send(line.to_string()).await.unwrap();
    }
    rx
}

/// END-TO-END SESSION TESTS
mod session_tests {
    use super::*;
    use tempfile::tempdir;

    /// Full game through the terminal client: both items, then the summary
    #[tokio::test]
    async fn client_plays_full_game() {
        let dir = tempdir().unwrap();
        let results = dir.path().join("resultados.dat");
        let server = RunningServer::start(&results, true).await;

        let mut client = Client::connect(&server.addr.to_string())
            .await
            .unwrap()
            .with_credentials(Some("ana".into()), Some("uno".into()));
        let input = commands(&["arriba", "abajo", "derecha"]).await;
        let report = client.run(input).await;

        assert_eq!(client.state(), ClientState::Closed);
        assert!(!report.rejected);
        assert!(report.lines.contains(&protocol::item_collected(100)));
        assert!(report.lines.contains(&protocol::all_items_collected(600)));
        let summary = report.summary.expect("no summary line");
        assert_eq!(summary.score, 600);

        let best = server.stop().await.expect("no best result");
        assert_eq!(best.name, "ana");
        assert_eq!(best.score, 600);

        let bytes = std::fs::read(&results).unwrap();
        assert_eq!(bytes.len(), RECORD_SIZE);
        assert_eq!(&bytes[..6], &[0, b'a', 0, b'n', 0, b'a']);
    }

    /// Wrong password: rejection line, then the server hangs up
    #[tokio::test]
    async fn client_rejected_with_bad_password() {
        let dir = tempdir().unwrap();
        let results = dir.path().join("resultados.dat");
        let server = RunningServer::start(&results, false).await;

        let mut client = Client::connect(&server.addr.to_string())
            .await
            .unwrap()
            .with_credentials(Some("ana".into()), Some("dos".into()));
        let report = client.run(commands(&[]).await).await;

        assert!(report.rejected);
        assert!(report.summary.is_none());
        assert_eq!(
            report.lines.last().map(String::as_str),
            Some(protocol::INVALID_CREDENTIALS)
        );

        assert!(server.stop().await.is_none());
        assert!(!results.exists());
    }

    /// Two players at once; the better score is reported on shutdown
    #[tokio::test]
    async fn concurrent_sessions_store_both_results() {
        let dir = tempdir().unwrap();
        let results = dir.path().join("resultados.dat");
        let server = RunningServer::start(&results, false).await;
        let addr = server.addr.to_string();

        let ana = {
            let addr = addr.clone();
            tokio::spawn(async move {
                let mut client = Client::connect(&addr)
                    .await
                    .unwrap()
                    .with_credentials(Some("ana".into()), Some("uno".into()));
                client
                    .run(commands(&["arriba", "abajo", "derecha"]).await)
                    .await
            })
        };
        let bob = tokio::spawn(async move {
            let mut client = Client::connect(&addr)
                .await
                .unwrap()
                .with_credentials(Some("bob".into()), Some("dos".into()));
            // Only the cherry, then quit
            client.run(commands(&["arriba", "salir"]).await).await
        });

        let ana = ana.await.unwrap();
        let bob = bob.await.unwrap();
        assert_eq!(ana.summary.map(|s| s.score), Some(600));
        assert!(bob.summary.is_none());

        let best = server.stop().await.unwrap();
        assert_eq!(best.name, "ana");

        let stored = ResultStore::new(&results).read_all().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(best_result(&stored), Some(&best));
    }

    /// Frames streamed by the server decode as board snapshots
    #[tokio::test]
    async fn streamed_frames_decode() {
        let dir = tempdir().unwrap();
        let server = RunningServer::start(&dir.path().join("r.dat"), true).await;

        let connection = Connection::spawn(TcpStream::connect(server.addr).await.unwrap());
        for (prompt, answer) in [(protocol::PROMPT_USER, "bob"), (protocol::PROMPT_PASSWORD, "dos")] {
            assert_eq!(connection.receive_text().await.as_deref(), Some(prompt));
            connection.send_text(answer).await;
        }
        assert_eq!(connection.receive_text().await, Some(protocol::welcome("bob")));

        let frame = timeout(Duration::from_secs(2), connection.receive_frame())
            .await
            .expect("no frame streamed")
            .unwrap();
        let snapshot: BoardSnapshot = deserialize(&frame).unwrap();
        assert_eq!(snapshot.width, ARENA_WIDTH);
        assert_eq!(snapshot.sessions.len(), 1);
        assert_eq!(snapshot.sessions[0].player, Position::new(390, 290));
        assert_eq!(snapshot.sessions[0].collectibles.len(), 2);

        connection.send_text(protocol::QUIT_COMMAND).await;
        assert!(server.stop().await.is_none());
    }

    /// The final line parses back into the score the game reported
    #[test]
    fn summary_line_matches_record() {
        let record = ResultRecord::new("ana", 600, 12);
        let line = GameSummary {
            score: record.score,
            elapsed_secs: record.elapsed_secs,
        }
        .to_line();
        assert_eq!(line, "FIN_JUEGO:Puntaje=600,Tiempo=12s");
        assert_eq!(GameSummary::parse(&line).unwrap().score, 600);
    }
}
