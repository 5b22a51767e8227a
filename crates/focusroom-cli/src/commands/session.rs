use clap::Subcommand;
use focusroom_core::CoreError;

use super::{print_json, CommandResult, Context};

#[derive(Subcommand)]
pub enum SessionAction {
    /// Start a focus session
    Start {
        /// Task the session works on
        #[arg(long)]
        task: Option<String>,
        /// Planned length in minutes (informational only)
        #[arg(long)]
        planned: Option<u32>,
    },
    /// End a focus session
    Stop {
        /// Session to end (defaults to the active one)
        session_id: Option<String>,
        /// Record the session as not completed
        #[arg(long)]
        abandon: bool,
    },
    /// Show the active session
    Active,
    /// List recent sessions
    List {
        /// How many days back to look
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
    /// Close every session left open past the stale threshold
    Sweep,
}

pub fn run(ctx: &Context, action: SessionAction) -> CommandResult {
    let app = ctx.app()?;
    match action {
        SessionAction::Start { task, planned } => {
            let session = app.start_session(ctx.user()?, task.as_deref(), planned)?;
            print_json(&session)?;
        }
        SessionAction::Stop {
            session_id,
            abandon,
        } => {
            let user = ctx.user()?;
            let session_id = match session_id {
                Some(id) => id,
                None => app
                    .get_active_session(user)?
                    .map(|active| active.session.id)
                    .ok_or_else(|| CoreError::InvalidState("no active session".into()))?,
            };
            let closed = app.end_session(user, &session_id, !abandon)?;
            print_json(&closed)?;
        }
        SessionAction::Active => {
            let active = app.get_active_session(ctx.user()?)?;
            print_json(&active)?;
        }
        SessionAction::List { days } => {
            let sessions = app.recent_sessions(ctx.user()?, days)?;
            print_json(&sessions)?;
        }
        SessionAction::Sweep => {
            let closed = app.sweep_stale_sessions()?;
            print_json(&serde_json::json!({ "closed": closed }))?;
        }
    }
    Ok(())
}
