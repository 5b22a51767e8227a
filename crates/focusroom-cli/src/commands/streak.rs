use clap::Subcommand;
use focusroom_core::ActivityType;

use super::{print_json, CommandResult, Context};

#[derive(Subcommand)]
pub enum StreakAction {
    /// Show a streak with its derived state
    Status {
        /// Activity type: "focus" or "task"
        #[arg(default_value = "focus")]
        activity: ActivityType,
    },
}

pub fn run(ctx: &Context, action: StreakAction) -> CommandResult {
    let app = ctx.app()?;
    match action {
        StreakAction::Status { activity } => {
            let status = app.streak_status(ctx.user()?, activity)?;
            print_json(&status)?;
        }
    }
    Ok(())
}
