/*!
 * btswitch
 * Switch Bluetooth device connections from the terminal (macOS, via blueutil)
 */

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;

mod app;
mod blueutil;
mod commands;
mod config;
mod errors;
mod logging;
mod output;
mod picker;
mod ui;

use btswitch_core::TerminalGate;
use commands::Env;
use config::Config;
use errors::{exit_code_for, user_message, EXIT_OK};
use output::Format;

#[derive(Parser)]
#[command(name = "btswitch")]
#[command(about = "Switch Bluetooth device connections on macOS")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    // Flags for the implicit `list`
    #[command(flatten)]
    list: ListArgs,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List paired devices
    List(ListArgs),
    /// Connect to a device
    Connect(SelectArgs),
    /// Disconnect a device
    Disconnect(SelectArgs),
    /// Discover, pair and connect a new device
    Pair(PairArgs),
    /// Unpair a device, then pair and connect it again
    Repair(RepairArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Show connected devices only
    #[arg(short, long, conflicts_with = "disconnected")]
    pub connected: bool,

    /// Show disconnected devices only
    #[arg(short, long)]
    pub disconnected: bool,

    /// Print device names only, one per line
    #[arg(short = 'N', long)]
    pub names_only: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Tsv)]
    pub format: Format,

    /// Do not print the header (tsv only)
    #[arg(short = 'H', long)]
    pub no_header: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SelectArgs {
    /// Device name or name prefix; omit to pick interactively
    pub name: Option<String>,

    /// Match the device name exactly
    #[arg(short, long)]
    pub exact: bool,

    /// Always use the interactive picker (TTY required)
    #[arg(short, long)]
    pub interactive: bool,

    /// Select several devices in the picker (implies --interactive)
    #[arg(short, long)]
    pub multi: bool,

    /// Only resolve and print the target device
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Tsv)]
    pub format: Format,

    /// Do not print the header (tsv only)
    #[arg(short = 'H', long)]
    pub no_header: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PairArgs {
    /// Use the interactive picker (TTY required); `--interactive=false` turns it off
    #[arg(
        short,
        long,
        value_name = "BOOL",
        default_value_t = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        action = ArgAction::Set
    )]
    pub interactive: bool,

    /// Discovery window in seconds
    #[arg(long, value_name = "SECS")]
    pub inquiry: Option<u64>,

    /// PIN, if the device asks for one
    #[arg(long)]
    pub pin: Option<String>,

    /// Total seconds to wait for the connection across retries
    #[arg(long, value_name = "SECS")]
    pub wait_connect: Option<u64>,

    /// Connect attempts
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,
}

impl Default for PairArgs {
    fn default() -> Self {
        Self {
            interactive: true,
            inquiry: None,
            pin: None,
            wait_connect: None,
            max_attempts: None,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct RepairArgs {
    #[command(flatten)]
    pub pair: PairArgs,

    /// Keep the old pairing and only pair again
    #[arg(long)]
    pub skip_unpair: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let gate = TerminalGate::new();
    logging::init(cli.verbose, gate.clone());

    let code = match run(cli, gate).await {
        Ok(()) => EXIT_OK,
        Err(err) => {
            debug!(error = ?err, "command failed");
            eprintln!("{}", user_message(&err));
            exit_code_for(&err)
        }
    };
    process::exit(code);
}

async fn run(cli: Cli, gate: TerminalGate) -> Result<()> {
    let config = Config::load_or_default(cli.config.as_deref())?;
    let env = Env::new(config, gate);
    let cancel = env.cancel_on_interrupt();

    match cli.command {
        None => commands::list(&env, &cli.list, &cancel).await,
        Some(Commands::List(args)) => commands::list(&env, &args, &cancel).await,
        Some(Commands::Connect(args)) => {
            commands::select(&env, btswitch_core::Action::Connect, &args, &cancel).await
        }
        Some(Commands::Disconnect(args)) => {
            commands::select(&env, btswitch_core::Action::Disconnect, &args, &cancel).await
        }
        Some(Commands::Pair(args)) => commands::pair(&env, &args, &cancel).await,
        Some(Commands::Repair(args)) => commands::repair(&env, &args, &cancel).await,
    }
}
