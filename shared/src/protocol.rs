//! Text lines exchanged on the text channel.

pub const PROMPT_USER: &str = "Usuario:";
pub const PROMPT_PASSWORD: &str = "Contraseña:";
pub const AUTH_SUCCESS: &str = "Autenticación exitosa";
pub const INVALID_CREDENTIALS: &str = "Credenciales inválidas";
pub const GAME_STARTED: &str = "Juego iniciado. Envía comandos: arriba, abajo, izquierda, derecha";
pub const INVALID_COMMAND: &str = "Comando inválido. Usa: arriba, abajo, izquierda, derecha";
pub const SERVER_FULL: &str = "Servidor lleno";

pub const BOUNDARY_REACHED: &str = "Límite alcanzado";
pub const MOVE_OK: &str = "Movimiento exitoso";
pub const GAME_ALREADY_FINISHED: &str = "El juego ha terminado";

pub const QUIT_COMMAND: &str = "salir";
pub const END_OF_GAME_PREFIX: &str = "FIN_JUEGO:";

pub fn welcome(name: &str) -> String {
    format!("{}. Bienvenido {}", AUTH_SUCCESS, name)
}

pub fn item_collected(score: i32) -> String {
    format!("¡Ítem recogido! Puntaje: {}", score)
}

pub fn all_items_collected(score: i32) -> String {
    format!(
        "{}. ¡Juego terminado! Todos los ítems recogidos.",
        item_collected(score)
    )
}

pub fn is_quit(command: &str) -> bool {
    command.trim().eq_ignore_ascii_case(QUIT_COMMAND)
}

/// Final score line sent once a game is over: `FIN_JUEGO:Puntaje=N,Tiempo=Ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSummary {
    pub score: i32,
    pub elapsed_secs: i64,
}

impl GameSummary {
    pub fn to_line(&self) -> String {
        format!(
            "{}Puntaje={},Tiempo={}s",
            END_OF_GAME_PREFIX, self.score, self.elapsed_secs
        )
    }

    pub fn parse(line: &str) -> Option<GameSummary> {
        let body = line.trim().strip_prefix(END_OF_GAME_PREFIX)?;
        let (score_part, time_part) = body.split_once(',')?;
        let score = score_part.trim().strip_prefix("Puntaje=")?.parse().ok()?;
        let elapsed_secs = time_part
            .trim()
            .strip_prefix("Tiempo=")?
            .strip_suffix('s')?
            .parse()
            .ok()?;

        Some(GameSummary {
            score,
            elapsed_secs,
        })
    }
}

/// How a client should treat a line received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLine {
    UserPrompt,
    PasswordPrompt,
    Authenticated,
    Rejected,
    ServerFull,
    GameOver(GameSummary),
    Info(String),
}

impl ServerLine {
    pub fn classify(line: &str) -> ServerLine {
        if line.starts_with(PROMPT_USER) {
            ServerLine::UserPrompt
        } else if line.starts_with(PROMPT_PASSWORD) {
            ServerLine::PasswordPrompt
        } else if line.contains(AUTH_SUCCESS) {
            ServerLine::Authenticated
        } else if line.contains(INVALID_CREDENTIALS) {
            ServerLine::Rejected
        } else if line.starts_with(SERVER_FULL) {
            ServerLine::ServerFull
        } else if let Some(summary) = GameSummary::parse(line) {
            ServerLine::GameOver(summary)
        } else {
            ServerLine::Info(line.to_string())
        }
    }

    /// True if the server closes the session after sending this line.
    pub fn ends_session(&self) -> bool {
        matches!(
            self,
            ServerLine::Rejected | ServerLine::ServerFull | ServerLine::GameOver(_)
        )
    }
}
