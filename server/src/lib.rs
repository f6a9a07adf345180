//! # Maze Chase Server Library
//!
//! This library implements the authoritative server for the maze-chase game.
//! Every player gets a private game on a shared TCP endpoint: they log in,
//! steer their character with text commands, collect every item on the board
//! and have their result appended to the results file.
//!
//! ## Core Responsibilities
//!
//! ### Session Protocol
//! Each accepted connection is driven by its own [`session::Session`] task
//! through the login handshake and the command loop. Sessions never block each
//! other; the results file and the shared board are the only state they share.
//!
//! ### Authoritative Simulation
//! Movement, boundary checks and collection all run on the server in
//! [`game::GameState`]. Clients only ever see the text replies and, when
//! streaming is enabled, encoded board frames.
//!
//! ### Result Persistence
//! Finished games are appended as fixed-width records to the file managed by
//! [`results::ResultStore`]. On shutdown the server scans the file and reports
//! the best result.
//!
//! ## Architecture Design
//!
//! ### Task Per Connection
//! The [`network::Server`] accept loop registers connections with the
//! [`session_manager::SessionManager`], which enforces the capacity limit, and
//! spawns one task per session on the tokio runtime.
//!
//! ### Two-Channel Connections
//! Every connection is a `shared::connection::Connection`: a text channel
//! for the protocol and a binary frame channel for board snapshots,
//! multiplexed over one byte stream.
//!
//! ### Capabilities At The Seams
//! Sessions depend on [`auth::Authenticator`] for credentials and on
//! [`render::RenderSurface`] / [`render::FrameSource`] for visuals, so the
//! credential backend and the renderer can be swapped without touching the
//! protocol.
//!
//! ## Module Organization
//!
//! - `auth`: credential checking and the in-memory user directory
//! - `config`: TOML settings with defaults
//! - `game`: single-player game simulation
//! - `network`: TCP accept loop and shutdown
//! - `render`: shared board, frame capture and frame streaming
//! - `results`: the fixed-record results file and ranking helpers
//! - `session`: the per-connection state machine
//! - `session_manager`: registry of live sessions

pub mod auth;
pub mod config;
pub mod game;
pub mod network;
pub mod render;
pub mod results;
pub mod session;
pub mod session_manager;
