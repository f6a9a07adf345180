use log::{debug, info, warn};
use shared::connection::Connection;
use shared::protocol::{self, GameSummary, ServerLine};
use shared::BoardSnapshot;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    LoggingIn,
    Playing,
    Closed,
}

/// What happened during one session, for the caller to report.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionReport {
    /// Every text line the server sent, in order
    pub lines: Vec<String>,
    pub summary: Option<GameSummary>,
    pub rejected: bool,
    pub frames: u64,
}

pub struct Client {
    connection: Arc<Connection>,
    username: Option<String>,
    password: Option<String>,
    state: ClientState,
    echo: bool,
    frames: Arc<AtomicU64>,
}

impl Client {
    pub async fn connect(server_addr: &str) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Connecting to {}...", server_addr);
        let stream = TcpStream::connect(server_addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(Connection::spawn(stream)))
    }

    pub fn new(connection: Arc<Connection>) -> Self {
        Client {
            connection,
            username: None,
            password: None,
            state: ClientState::LoggingIn,
            echo: false,
            frames: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Answers the login prompts without asking for input.
    pub fn with_credentials(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username;
        self.password = password;
        self
    }

    /// Prints every server line to stdout.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Plays one session. Lines from `input` answer prompts that have no
    /// preset credential and are sent as commands once the game starts.
    pub async fn run(&mut self, mut input: mpsc::Receiver<String>) -> SessionReport {
        let watcher = self.spawn_frame_watcher();
        let mut report = SessionReport::default();
        let mut input_open = true;

        while self.state != ClientState::Closed {
            tokio::select! {
                line = self.connection.receive_text() => match line {
                    Some(line) => self.handle_line(line, &mut input, &mut report).await,
                    None => {
                        info!("Server closed the connection");
                        self.state = ClientState::Closed;
                    }
                },
                command = input.recv(), if input_open && self.state == ClientState::Playing => {
                    match command {
                        Some(command) => self.send_command(&command).await,
                        None => {
                            // Input ended: leave the game
                            input_open = false;
                            self.connection.send_text(protocol::QUIT_COMMAND).await;
                        }
                    }
                }
            }
        }

        self.connection.close().await;
        if let Err(e) = watcher.await {
            warn!("Frame watcher failed: {}", e);
        }
        report.frames = self.frames.load(Ordering::Relaxed);
        report
    }

    async fn handle_line(
        &mut self,
        line: String,
        input: &mut mpsc::Receiver<String>,
        report: &mut SessionReport,
    ) {
        if self.echo {
            println!("{}", line);
            if let Err(e) = std::io::stdout().flush() {
                debug!("Failed to flush stdout: {}", e);
            }
        }

        match ServerLine::classify(&line) {
            ServerLine::UserPrompt => {
                let answer = match self.username.clone() {
                    Some(username) => Some(username),
                    None => input.recv().await,
                };
                self.answer(answer).await;
            }
            ServerLine::PasswordPrompt => {
                let answer = match self.password.clone() {
                    Some(password) => Some(password),
                    None => input.recv().await,
                };
                self.answer(answer).await;
            }
            ServerLine::Authenticated => {
                info!("Logged in");
                self.state = ClientState::Playing;
            }
            ServerLine::Rejected => {
                warn!("Login rejected");
                report.rejected = true;
            }
            ServerLine::ServerFull => warn!("Server is full"),
            ServerLine::GameOver(summary) => {
                info!(
                    "Game over: {} points in {}s",
                    summary.score, summary.elapsed_secs
                );
                report.summary = Some(summary);
            }
            ServerLine::Info(_) => {}
        }

        report.lines.push(line);
    }

    async fn answer(&mut self, answer: Option<String>) {
        match answer {
            Some(answer) => self.connection.send_text(answer.trim()).await,
            None => {
                // Nothing left to answer with
                self.connection.close().await;
                self.state = ClientState::Closed;
            }
        }
    }

    async fn send_command(&self, command: &str) {
        let command = command.trim();
        if command.is_empty() {
            return;
        }
        debug!("Sending command '{}'", command);
        self.connection.send_text(command).await;
    }

    fn spawn_frame_watcher(&self) -> JoinHandle<()> {
        let connection = Arc::clone(&self.connection);
        let frames = Arc::clone(&self.frames);

        tokio::spawn(async move {
            while let Some(frame) = connection.receive_frame().await {
                frames.fetch_add(1, Ordering::Relaxed);
                match BoardSnapshot::decode(&frame) {
                    Ok(snapshot) => debug!(
                        "Frame: {} sessions on a {}x{} board",
                        snapshot.sessions.len(),
                        snapshot.width,
                        snapshot.height
                    ),
                    Err(e) => debug!("Undecodable frame of {} bytes: {}", frame.len(), e),
                }
            }
        })
    }
}
