use clap::Args;

use super::{print_json, CommandResult, Context};

#[derive(Args)]
pub struct ScoreArgs {
    /// Print only the gathered inputs
    #[arg(long)]
    inputs: bool,
}

pub fn run(ctx: &Context, args: ScoreArgs) -> CommandResult {
    let app = ctx.app()?;
    let user = ctx.user()?;
    if args.inputs {
        print_json(&app.score_inputs(user)?)
    } else {
        print_json(&app.score_report(user)?)
    }
}
