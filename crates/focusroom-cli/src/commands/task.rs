use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::Subcommand;
use focusroom_core::CanonicalZone;

use super::{print_json, CommandResult, Context};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a task
    Add {
        /// Task title
        title: String,
        /// Due date (YYYY-MM-DD, due by the end of that day) or RFC 3339 timestamp
        #[arg(long)]
        due: Option<String>,
    },
    /// Mark a task completed
    Done {
        /// Task ID
        id: String,
    },
    /// List tasks
    List,
}

fn parse_due(raw: &str, zone: &CanonicalZone) -> Result<DateTime<Utc>, String> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|date| zone.start_of_day(date + Duration::days(1)))
        .map_err(|_| format!("invalid due date '{raw}': expected YYYY-MM-DD or RFC 3339"))
}

pub fn run(ctx: &Context, action: TaskAction) -> CommandResult {
    let app = ctx.app()?;
    match action {
        TaskAction::Add { title, due } => {
            let zone = app.config().zone()?;
            let due_at = due.as_deref().map(|d| parse_due(d, &zone)).transpose()?;
            let task = app.add_task(ctx.user()?, &title, due_at)?;
            print_json(&task)?;
        }
        TaskAction::Done { id } => {
            let done = app.complete_task(ctx.user()?, &id)?;
            print_json(&done)?;
        }
        TaskAction::List => {
            let tasks = app.list_tasks(ctx.user()?)?;
            print_json(&tasks)?;
        }
    }
    Ok(())
}
