//! CLI frontend for the HUD framework.

mod commands;

use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "hud",
    about = "Drive the HUD layout framework from the command line",
    version,
    propagate_version = true
)]
struct Cli {
    /// Log framework activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted HUD session and report every slot/extension delivery
    Demo {
        /// Number of local players to add
        #[arg(short, long, default_value = "2")]
        players: u32,

        /// Print the session report as JSON
        #[arg(long)]
        json: bool,

        /// Also print each player's widget tree
        #[arg(long)]
        tree: bool,

        /// Destroy popped layer widgets instead of pooling them
        #[arg(long)]
        no_pool: bool,
    },

    /// Check whether an extension tag reaches a slot tag
    Match {
        /// Slot tag (e.g. HUD.Slot.TopBar)
        slot: String,

        /// Extension tag (e.g. HUD.Slot)
        extension: String,

        /// Player owning the slot (default: unscoped)
        #[arg(long)]
        slot_player: Option<u32>,

        /// Player owning the extension (default: unscoped)
        #[arg(long)]
        extension_player: Option<u32>,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Demo {
            players,
            json,
            tree,
            no_pool,
        } => commands::demo::run(players, json, tree, !no_pool),
        Commands::Match {
            slot,
            extension,
            slot_player,
            extension_player,
        } => commands::match_tags::run(&slot, &extension, slot_player, extension_player),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
