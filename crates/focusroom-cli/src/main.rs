use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use focusroom_core::{CoreError, ErrorKind};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "focusroom", version, about = "Focus sessions, streaks and productivity score")]
struct Cli {
    /// User the command acts for
    #[arg(long, global = true, env = "FOCUSROOM_USER")]
    user: Option<String>,

    /// Database file (defaults to ~/.config/focusroom/focusroom.db)
    #[arg(long, global = true, env = "FOCUSROOM_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Focus session control
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },
    /// Day streaks
    Streak {
        #[command(subcommand)]
        action: commands::streak::StreakAction,
    },
    /// Productivity score with weekly trend
    Score(commands::score::ScoreArgs),
    /// Activity rollups for a day, week or month
    Stats(commands::stats::StatsArgs),
    /// Task registry
    Task {
        #[command(subcommand)]
        action: commands::task::TaskAction,
    },
    /// Notes
    Note {
        #[command(subcommand)]
        action: commands::note::NoteAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Generate shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("FOCUSROOM_LOG")
        .unwrap_or_else(|_| EnvFilter::new("warn,focusroom_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Distinct exit code per error kind.
fn exit_code(err: &(dyn std::error::Error + 'static)) -> i32 {
    match err.downcast_ref::<CoreError>().map(CoreError::kind) {
        Some(ErrorKind::Unauthorized) => 3,
        Some(ErrorKind::NotFound) => 4,
        Some(ErrorKind::Conflict) => 5,
        Some(ErrorKind::InvalidState) => 6,
        Some(ErrorKind::ClockAnomaly) => 7,
        Some(ErrorKind::Internal) | None => 1,
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let ctx = commands::Context::new(cli.user, cli.db);

    let result = match cli.command {
        Commands::Session { action } => commands::session::run(&ctx, action),
        Commands::Streak { action } => commands::streak::run(&ctx, action),
        Commands::Score(args) => commands::score::run(&ctx, args),
        Commands::Stats(args) => commands::stats::run(&ctx, args),
        Commands::Task { action } => commands::task::run(&ctx, action),
        Commands::Note { action } => commands::note::run(&ctx, action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "focusroom",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(exit_code(e.as_ref()));
    }
}
