use clap::Subcommand;

use super::{print_json, CommandResult, Context};

#[derive(Subcommand)]
pub enum NoteAction {
    /// Record that a note was written
    Add,
}

pub fn run(ctx: &Context, action: NoteAction) -> CommandResult {
    let app = ctx.app()?;
    match action {
        NoteAction::Add => print_json(&app.add_note(ctx.user()?)?),
    }
}
