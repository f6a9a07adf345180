//! Registry of live sessions.
//!
//! The accept loop registers every connection here before its session task
//! starts, which is where the server enforces its capacity limit. On
//! shutdown the registry hands back every open connection so the server can
//! close them and unblock the session tasks waiting on them.

use log::info;
use shared::connection::Connection;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A connection with a running session task.
pub struct SessionEntry {
    /// Identifier assigned by the server, also used on the shared board
    pub id: u32,
    /// Peer address, for logging
    pub addr: SocketAddr,
    pub connection: Arc<Connection>,
    pub connected_at: Instant,
}

impl SessionEntry {
    pub fn new(id: u32, addr: SocketAddr, connection: Arc<Connection>) -> Self {
        Self {
            id,
            addr,
            connection,
            connected_at: Instant::now(),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

/// Tracks sessions and enforces the server's capacity limit.
pub struct SessionManager {
    sessions: HashMap<u32, SessionEntry>,
    next_session_id: u32,
    max_sessions: usize,
}

impl SessionManager {
    /// Session ids start from 1 and are never reused.
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            next_session_id: 1,
            max_sessions,
        }
    }

    /// Registers a connection. Returns `None` when the server is full.
    pub fn add_session(&mut self, addr: SocketAddr, connection: Arc<Connection>) -> Option<u32> {
        if self.is_full() {
            return None;
        }

        let session_id = self.next_session_id;
        self.next_session_id += 1;

        info!("Session {} connected from {}", session_id, addr);
        self.sessions
            .insert(session_id, SessionEntry::new(session_id, addr, connection));

        Some(session_id)
    }

    /// Returns true if the session was still registered.
    pub fn remove_session(&mut self, session_id: &u32) -> bool {
        if let Some(entry) = self.sessions.remove(session_id) {
            info!(
                "Session {} from {} removed after {:.1}s",
                entry.id,
                entry.addr,
                entry.uptime().as_secs_f32()
            );
            true
        } else {
            false
        }
    }

    /// Connections of every registered session, ordered by id.
    pub fn connections(&self) -> Vec<(u32, Arc<Connection>)> {
        let mut connections: Vec<_> = self
            .sessions
            .iter()
            .map(|(id, entry)| (*id, Arc::clone(&entry.connection)))
            .collect();
        connections.sort_by_key(|(id, _)| *id);
        connections
    }

    pub fn is_full(&self) -> bool {
        self.sessions.len() >= self.max_sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Closes every connection in `connections`.
pub async fn close_all(connections: Vec<(u32, Arc<Connection>)>) {
    for (id, connection) in connections {
        info!("Closing session {}", id);
        connection.close().await;
    }
}
