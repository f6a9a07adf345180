//! Credential checking.
//!
//! Sessions only see the [`Authenticator`] capability. [`UserDirectory`] is
//! the in-memory implementation the server binary builds from the
//! `users` configuration key.

use log::warn;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: u32,
    pub name: String,
}

pub trait Authenticator: Send + Sync {
    /// Returns the player for a valid username/password pair.
    fn validate(&self, username: &str, password: &str) -> Option<Player>;
}

struct Account {
    id: u32,
    password: String,
}

#[derive(Default)]
pub struct UserDirectory {
    accounts: HashMap<String, Account>,
    next_id: u32,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self {
            accounts: HashMap::new(),
            next_id: 1,
        }
    }

    /// Builds a directory from `user:password` pairs separated by commas.
    /// Malformed entries are skipped with a warning.
    pub fn from_list(list: &str) -> Self {
        let mut directory = Self::new();

        for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            match entry.split_once(':') {
                Some((user, password)) if !user.trim().is_empty() && !password.trim().is_empty() => {
                    directory.add_user(user.trim(), password.trim());
                }
                _ => warn!("Skipping malformed user entry '{}'", entry),
            }
        }

        directory
    }

    /// Registers a user. An existing user keeps their id and password.
    pub fn add_user(&mut self, username: &str, password: &str) -> u32 {
        if let Some(account) = self.accounts.get(username) {
            return account.id;
        }

        let id = self.next_id.max(1);
        self.next_id = id + 1;
        self.accounts.insert(
            username.to_string(),
            Account {
                id,
                password: password.to_string(),
            },
        );
        id
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl Authenticator for UserDirectory {
    fn validate(&self, username: &str, password: &str) -> Option<Player> {
        let account = self.accounts.get(username)?;
        if account.password != password {
            return None;
        }

        Some(Player {
            id: account.id,
            name: username.to_string(),
        })
    }
}
