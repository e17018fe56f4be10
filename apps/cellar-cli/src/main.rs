//! cellar-ttb - Operator CLI for TTB opening-balance onboarding
//!
//! Drives the four-step onboarding wizard against a file-backed draft:
//! - Enter the opening balance date and per-class balances
//! - Reconcile against a system inventory export
//! - Explain the gap with legacy batches
//! - Confirm and preview what the commit will write

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;

use cellar_core::OrganizationId;
use cellar_ttb::tax_class::LegacyTaxClass;

mod commands;
mod error;
mod logging;
mod output;

use error::CliResult;

/// TTB opening-balance onboarding
#[derive(Parser)]
#[command(name = "cellar-ttb")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Organization to onboard
    #[arg(long, env = "CELLAR_ORG_ID", global = true)]
    org: Option<OrganizationId>,

    /// Directory holding wizard drafts
    #[arg(long, global = true)]
    draft_dir: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the wizard's current step, figures and warnings
    Status,

    /// Set the opening balance date and balances (step 1)
    Balances(BalancesArgs),

    /// Reconcile against a system inventory export (step 2)
    Reconcile(ReconcileArgs),

    /// Manage legacy batches (step 3)
    #[command(subcommand)]
    Legacy(LegacyCommand),

    /// Record why the figures differ (step 3)
    Explain {
        /// Explanation text; omit to clear
        text: Option<String>,
    },

    /// Advance to the next step
    Next,

    /// Go back one step
    Back,

    /// Jump to a step by number
    Goto {
        /// Step number (1-4)
        step: u8,
    },

    /// Confirm the figures in the draft (step 4); preview only, nothing is persisted
    #[command(
        long_about = "Confirm the figures in the draft (step 4).\n\n\
            This CLI has no persistence backend: confirming only marks the draft as \
            confirmed. Use `plan` to see what an application commit would write."
    )]
    Confirm {
        /// Record the confirmation instead of printing the summary
        #[arg(long)]
        yes: bool,
    },

    /// Print what a commit would write, without writing anything
    Plan,

    /// Discard the draft and start over
    Reset,
}

#[derive(Args)]
struct BalancesArgs {
    /// Opening balance date (YYYY-MM-DD)
    #[arg(long)]
    date: Option<chrono::NaiveDate>,

    /// JSON file with bulk/bottled/spirits balances
    #[arg(long)]
    file: Option<PathBuf>,

    /// Reconciliation notes; an empty string clears them
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Args)]
struct ReconcileArgs {
    /// JSON file with a system inventory or a list of inventory items
    #[arg(long)]
    inventory: PathBuf,
}

#[derive(Subcommand)]
enum LegacyCommand {
    /// List legacy batches
    List,

    /// Add a legacy batch
    Add(LegacyAddArgs),

    /// Remove a legacy batch by index
    Remove { index: usize },
}

#[derive(Args)]
struct LegacyAddArgs {
    #[arg(long)]
    name: String,

    /// Volume in gallons
    #[arg(long)]
    gallons: Decimal,

    /// Tax class key, e.g. hardCider or appleBrandy
    #[arg(long)]
    tax_class: LegacyTaxClass,

    #[arg(long)]
    notes: Option<String>,

    #[arg(long)]
    ph: Option<Decimal>,

    #[arg(long)]
    original_gravity: Option<Decimal>,

    #[arg(long)]
    final_gravity: Option<Decimal>,

    /// Batch start date (YYYY-MM-DD)
    #[arg(long)]
    start_date: Option<chrono::NaiveDate>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = cellar_ttb::OnboardingConfig::from_env()?;
    logging::init_logging(&config.log_filter, cli.json);

    let mut session = commands::Session::open(cli.org, cli.draft_dir, config, cli.json)?;
    match cli.command {
        Commands::Status => session.status(),
        Commands::Balances(args) => session.balances(args.date, args.file, args.notes),
        Commands::Reconcile(args) => session.reconcile(&args.inventory).await,
        Commands::Legacy(LegacyCommand::List) => session.legacy_list(),
        Commands::Legacy(LegacyCommand::Add(args)) => session.legacy_add(commands::NewLegacy {
            name: args.name,
            gallons: args.gallons,
            tax_class: args.tax_class,
            notes: args.notes,
            ph: args.ph,
            original_gravity: args.original_gravity,
            final_gravity: args.final_gravity,
            start_date: args.start_date,
        }),
        Commands::Legacy(LegacyCommand::Remove { index }) => session.legacy_remove(index),
        Commands::Explain { text } => session.explain(text),
        Commands::Next => session.next(),
        Commands::Back => session.back(),
        Commands::Goto { step } => session.goto(step),
        Commands::Confirm { yes } => session.confirm(yes),
        Commands::Plan => session.plan(),
        Commands::Reset => session.reset(),
    }
}
