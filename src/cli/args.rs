//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--user <id>`: Act as this user (overrides `default_user`)
//! - `--data-dir <path>`: Ledger directory (overrides `data_dir`)
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output
//! - `--json`: Machine-readable output

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::core::entry::schema::AdjustmentReason;

/// bean - An append-only ledger for coffee roasting and brewing
#[derive(Parser, Debug)]
#[command(name = "bean")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// User whose ledger to read and write
    #[arg(long, global = true, value_name = "ID")]
    pub user: Option<String>,

    /// Directory holding the ledger files
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    // ========== Recording ==========
    /// Record a green coffee purchase
    #[command(
        name = "purchase",
        long_about = "Record a green coffee purchase.\n\n\
            Adds the purchased weight to the green lot for this coffee. Repeated \
            purchases of the same coffee (names compare case- and \
            whitespace-insensitively) accumulate in one lot.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Minimal purchase
    bean purchase --name \"Ethiopia Sidamo\" --origin Ethiopia --weight 1000

    # With sourcing details
    bean purchase --name \"Kenya AA\" --origin Kenya --weight 2268 \\
        --process washed --supplier \"Sweet Maria's\" --cost 42.50"
    )]
    Purchase {
        /// Coffee name
        #[arg(long)]
        name: String,

        /// Country or region of origin
        #[arg(long)]
        origin: String,

        /// Purchased weight in grams
        #[arg(long)]
        weight: f64,

        /// Farm or washing station
        #[arg(long)]
        farm: Option<String>,

        /// Varietal
        #[arg(long)]
        variety: Option<String>,

        /// Processing method
        #[arg(long)]
        process: Option<String>,

        /// Total cost of this purchase
        #[arg(long)]
        cost: Option<f64>,

        /// Where it was bought
        #[arg(long)]
        supplier: Option<String>,

        /// Purchase date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Record a completed roast
    #[command(
        name = "roast",
        long_about = "Record a completed roast.\n\n\
            Adds the roasted weight as a new batch and draws the green weight from \
            the green lot. Both sides are recorded together. If an open schedule \
            for this coffee plans a similar green weight, it is marked completed.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Record a roast (batch number is assigned automatically)
    bean roast --coffee \"Ethiopia Sidamo\" --green 220 --roasted 185 --level City+

    # With profile timings in seconds
    bean roast --coffee \"Kenya AA\" --green 250 --roasted 212 \\
        --first-crack 480 --development 90 --total-time 600"
    )]
    Roast {
        /// Coffee name (must match the green purchase)
        #[arg(long)]
        coffee: String,

        /// Green weight charged, in grams
        #[arg(long)]
        green: f64,

        /// Roasted weight out, in grams
        #[arg(long)]
        roasted: f64,

        /// Roast level, e.g. City+
        #[arg(long)]
        level: Option<String>,

        /// Batch number (assigned automatically if omitted)
        #[arg(long)]
        batch: Option<u64>,

        /// Roast date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Charge temperature
        #[arg(long)]
        charge_temp: Option<f64>,

        /// Drop temperature
        #[arg(long)]
        drop_temp: Option<f64>,

        /// Seconds to first crack
        #[arg(long, value_name = "SECS")]
        first_crack: Option<u32>,

        /// Development time in seconds
        #[arg(long, value_name = "SECS")]
        development: Option<u32>,

        /// Total roast time in seconds
        #[arg(long, value_name = "SECS")]
        total_time: Option<u32>,

        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Record coffee leaving inventory
    #[command(
        name = "consume",
        long_about = "Record coffee leaving inventory.\n\n\
            Draws from roasted coffee by default; pass --green to draw from green \
            coffee instead.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Gave away a bag
    bean consume --coffee \"Kenya AA\" --amount 250 --notes \"for Sam\"

    # Green beans used as a sample
    bean consume --coffee \"Kenya AA\" --amount 100 --green"
    )]
    Consume {
        /// Coffee name
        #[arg(long)]
        coffee: String,

        /// Amount in grams
        #[arg(long)]
        amount: f64,

        /// Draw from green instead of roasted coffee
        #[arg(long)]
        green: bool,

        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Set inventory to a counted amount
    #[command(
        name = "adjust",
        long_about = "Set a coffee's inventory to a counted amount.\n\n\
            Records the difference between the current amount and the new one. \
            Pass --expect with the amount you believe is current to fail instead \
            of adjusting if the ledger changed in the meantime.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Weighed the jar; it holds 40g
    bean adjust --coffee \"Kenya AA\" --to 40 --reason physical_count

    # Green lot lost moisture
    bean adjust --coffee \"Kenya AA\" --to 1950 --reason shrinkage --green

REASONS:
    physical_count, spillage, found, other
    shrinkage (green only), stale (roasted only)"
    )]
    Adjust {
        /// Coffee name
        #[arg(long)]
        coffee: String,

        /// New amount in grams
        #[arg(long = "to", value_name = "AMOUNT")]
        new_amount: f64,

        /// Reason for the adjustment
        #[arg(long)]
        reason: AdjustmentReason,

        /// Adjust green instead of roasted coffee
        #[arg(long)]
        green: bool,

        /// Fail unless the current amount is this
        #[arg(long, value_name = "AMOUNT")]
        expect: Option<f64>,

        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Log a brew
    #[command(
        name = "brew",
        long_about = "Log a brew.\n\n\
            Records the recipe and, with --consume, draws the dose from roasted \
            inventory.",
        after_help = "\
WORKFLOW EXAMPLES:
    # A V60 that used up 18g of beans
    bean brew --coffee \"Kenya AA\" --dose 18 --water 300 --method v60 --consume

    # Rate it
    bean brew --coffee \"Kenya AA\" --dose 18 --water 300 --rating 5"
    )]
    Brew {
        /// Coffee name
        #[arg(long)]
        coffee: String,

        /// Dose in grams
        #[arg(long)]
        dose: f64,

        /// Water in grams
        #[arg(long)]
        water: f64,

        /// Brew method
        #[arg(long)]
        method: Option<String>,

        /// Grind setting
        #[arg(long)]
        grind: Option<String>,

        /// Brew time in seconds
        #[arg(long, value_name = "SECS")]
        time: Option<u32>,

        /// Water temperature in Celsius
        #[arg(long)]
        temp: Option<f64>,

        /// Rating from 1 to 5
        #[arg(long)]
        rating: Option<u8>,

        /// Draw the dose from roasted inventory
        #[arg(long)]
        consume: bool,

        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },

    // ========== Reading ==========
    /// Show current inventory
    #[command(
        name = "inventory",
        long_about = "Show current inventory.\n\n\
            Replays the ledger to compute green and roasted amounts. Coffees that \
            are used up are hidden; coffees whose ledger sums below zero are \
            hidden too and reported as warnings (see `bean audit`)."
    )]
    Inventory,

    /// List ledger entries, newest first
    #[command(name = "entries")]
    Entries {
        /// Maximum number of entries
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Entries to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Show every entry for one entity, oldest first
    #[command(name = "history")]
    History {
        /// Entity id, e.g. green-3f1a...
        entity_id: String,
    },

    /// Manage roast schedules
    #[command(
        name = "schedule",
        after_help = "\
WORKFLOW EXAMPLES:
    # Plan a roast
    bean schedule add --coffee \"Kenya AA\" --date 2024-06-20 --green 250

    # What's coming up this week
    bean schedule upcoming

    # Move it
    bean schedule edit schedule-... --date 2024-06-21

NOTES:
    Recording a roast with `bean roast` completes the matching schedule."
    )]
    Schedule {
        #[command(subcommand)]
        action: ScheduleCommand,
    },

    /// Manage brewing and roasting equipment
    #[command(name = "equipment")]
    Equipment {
        #[command(subcommand)]
        action: EquipmentCommand,
    },

    /// Recompute every inventory group and report problems
    #[command(
        name = "audit",
        long_about = "Recompute every inventory group and report problems.\n\n\
            Unlike `bean inventory`, the audit shows used-up coffees and the true \
            total of coffees whose ledger sums below zero. It also checks the \
            replay against a plain sum and lists compensating entries."
    )]
    Audit,

    // ========== Setup ==========
    /// Get, set, or list configuration values
    #[command(
        name = "config",
        after_help = "\
WORKFLOW EXAMPLES:
    # See current configuration
    bean config list

    # Set the default user
    bean config set default_user alice

    # Widen schedule matching
    bean config set ledger.schedule_match_tolerance_grams 10"
    )]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        long_about = "Generate shell completion scripts for tab-completion.\n\n\
            Outputs a completion script for the specified shell. Add the output \
            to your shell's configuration to enable tab-completion for bean commands.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bash (add to ~/.bashrc)
    bean completion bash >> ~/.bashrc

    # Zsh (add to ~/.zshrc)
    bean completion zsh >> ~/.zshrc

    # Fish
    bean completion fish > ~/.config/fish/completions/bean.fish"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Schedule subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ScheduleCommand {
    /// Plan a roast
    Add {
        /// Coffee name
        #[arg(long)]
        coffee: String,

        /// Planned date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Planned green weight in grams
        #[arg(long)]
        green: f64,

        /// Target roast level
        #[arg(long)]
        level: Option<String>,

        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// Change a planned roast
    Edit {
        /// Schedule id
        id: String,

        #[arg(long)]
        coffee: Option<String>,

        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(long)]
        green: Option<f64>,

        #[arg(long)]
        level: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },
    /// Mark a planned roast as done
    Complete {
        /// Schedule id
        id: String,

        /// Completion date (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Cancel a planned roast
    Delete {
        /// Schedule id
        id: String,
    },
    /// List all schedules that are not deleted
    List,
    /// Open schedules due within the horizon
    Upcoming {
        /// Horizon in days (defaults to config)
        #[arg(long)]
        days: Option<u32>,
    },
    /// Open schedules whose date has passed
    Overdue,
}

/// Equipment subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum EquipmentCommand {
    /// Register equipment
    Add {
        /// Unique name
        #[arg(long)]
        name: String,

        /// Kind, e.g. grinder or roaster
        #[arg(long)]
        kind: String,

        #[arg(long)]
        brand: Option<String>,

        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },
    /// Change registered equipment
    Update {
        /// Name of the equipment
        name: String,

        #[arg(long)]
        kind: Option<String>,

        #[arg(long)]
        brand: Option<String>,

        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },
    /// List registered equipment
    List,
}

/// Config subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },
    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Value to set
        value: String,
    },
    /// List all configuration values
    List,
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
