use chrono::NaiveDate;
use clap::Args;
use focusroom_core::Period;

use super::{print_json, CommandResult, Context};

#[derive(Args)]
pub struct StatsArgs {
    /// day, week or month
    period: Period,
    /// Any date inside the window (YYYY-MM-DD); defaults to today
    #[arg(long)]
    date: Option<NaiveDate>,
}

pub fn run(ctx: &Context, args: StatsArgs) -> CommandResult {
    let app = ctx.app()?;
    let user = ctx.user()?;
    let stats = match args.date {
        Some(date) => app.reporter().aggregate_stats_at(user, args.period, date)?,
        None => app.get_aggregate_stats(user, args.period)?,
    };
    print_json(&stats)
}
