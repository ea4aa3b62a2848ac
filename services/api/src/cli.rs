use crate::demo::{run_blocklist_check, run_demo, BlocklistCheckArgs, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use storefront_risk::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Storefront Risk",
    about = "Run the cash-on-delivery checkout risk service or explore its scoring from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Score the reference checkout scenarios against an in-memory storefront
    Demo(DemoArgs),
    /// Inspect blocklist exports
    Blocklist {
        #[command(subcommand)]
        command: BlocklistCommand,
    },
}

#[derive(Subcommand, Debug)]
enum BlocklistCommand {
    /// Show which entries of a CSV export would match a checkout
    Check(BlocklistCheckArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Seed the blocklist from a CSV export before accepting traffic
    #[arg(long)]
    pub(crate) blocklist_csv: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
        Command::Blocklist {
            command: BlocklistCommand::Check(args),
        } => run_blocklist_check(args),
    }
}
