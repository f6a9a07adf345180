//! # Maze Chase Client Library
//!
//! A terminal client for the maze-chase server. It connects over TCP, answers
//! the login prompts, forwards typed lines as move commands and reports the
//! final score line when the game ends.
//!
//! ## Architecture Overview
//!
//! The client speaks the same two-channel protocol as the server through
//! `shared::connection::Connection`:
//!
//! ### Text Channel
//! Every server line is classified with `shared::protocol::ServerLine`.
//! Prompts are answered from preset credentials or from the input stream;
//! once the server confirms the login, input lines are sent as commands.
//!
//! ### Frame Channel
//! When the server streams board snapshots, a watcher task decodes each
//! frame and logs it at debug level. Frames are counted but never drawn.
//!
//! ## Usage Example
//!
//! ```no_run
//! use client::network::Client;
//! use tokio::sync::mpsc;
//!
//! # async fn play() -> Result<(), Box<dyn std::error::Error>> {
//! let (tx, rx) = mpsc::channel(16);
//! let mut client = Client::connect("127.0.0.1:9090")
//!     .await?
//!     .with_credentials(Some("ana".into()), Some("secreto".into()));
//!
//! tx.send("derecha".to_string()).await?;
//! let report = client.run(rx).await;
//! println!("{:?}", report.summary);
//! # Ok(())
//! # }
//! ```

pub mod network;
