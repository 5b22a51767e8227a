pub mod config;
pub mod note;
pub mod score;
pub mod session;
pub mod stats;
pub mod streak;
pub mod task;

use std::path::PathBuf;

use focusroom_core::{Config, CoreError, Focusroom};
use serde::Serialize;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Global options shared by every command.
pub struct Context {
    user: Option<String>,
    db: Option<PathBuf>,
}

impl Context {
    pub fn new(user: Option<String>, db: Option<PathBuf>) -> Self {
        Self { user, db }
    }

    /// The acting user; missing or blank is unauthorized.
    pub fn user(&self) -> Result<&str, CoreError> {
        self.user
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(CoreError::Unauthorized)
    }

    pub fn app(&self) -> Result<Focusroom, Box<dyn std::error::Error>> {
        let config = Config::load()?;
        tracing::debug!(db = ?self.db, "opening focusroom");
        Ok(Focusroom::open(config, self.db.as_deref())?)
    }
}

pub fn print_json<T: Serialize>(value: &T) -> CommandResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
