use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "bankfeed",
    version,
    about = "Import bank-statement CSV into the ledger, with rule previews and transfer matching."
)]
pub struct Cli {
    /// Config file (default: the platform config directory's config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a statement and create one ledger transaction per selected row.
    Import(ImportArgs),
    /// List the company's accounts.
    Accounts,
    /// Manage bank rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Statement file; `-` reads standard input
    pub file: PathBuf,

    /// Single-character delimiter; `\t` or `tab` for tabs
    #[arg(long)]
    pub delimiter: Option<String>,

    /// The first line is data, not column names
    #[arg(long)]
    pub no_header: bool,

    /// Column holding the date
    #[arg(long = "date-col")]
    pub date_col: Option<String>,

    /// Column holding the signed amount
    #[arg(long = "amount-col")]
    pub amount_col: Option<String>,

    /// Column holding the description
    #[arg(long = "description-col")]
    pub description_col: Option<String>,

    /// ISO currency code for created transactions
    #[arg(long)]
    pub currency: Option<String>,

    /// Run the server's bank rules before submitting
    #[arg(long)]
    pub preview: bool,

    /// Evaluate rules from a local TOML file instead of the server
    #[arg(long = "offline-rules", value_name = "FILE")]
    pub offline_rules: Option<PathBuf>,

    /// Confirm detected transfer pairs before submitting
    #[arg(long = "confirm-transfers")]
    pub confirm_transfers: bool,

    /// Source account for transfer postings
    #[arg(long = "from-account")]
    pub from_account: Option<String>,

    /// Destination account for transfer postings
    #[arg(long = "to-account")]
    pub to_account: Option<String>,

    /// Zero-based rows to submit, comma separated (default: all)
    #[arg(long, value_delimiter = ',')]
    pub rows: Option<Vec<usize>>,

    /// Override a row's category, e.g. `--category 3=Meals`
    #[arg(long = "category", value_name = "ROW=LABEL", value_parser = parse_category)]
    pub categories: Vec<(usize, String)>,

    /// Print the transactions instead of creating them
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the remaining rows after the first failure
    #[arg(long)]
    pub stop_on_error: bool,
}

impl ImportArgs {
    pub fn wants_preview(&self) -> bool {
        self.preview || self.offline_rules.is_some() || self.confirm_transfers
    }

    /// Whether any step of this import talks to the server.
    pub fn needs_api(&self) -> bool {
        !self.dry_run || (self.wants_preview() && self.offline_rules.is_none())
    }
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// List rules in evaluation order.
    List {
        /// Print the raw JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Create or replace a rule from a JSON file (replaces when it has an id).
    Upsert {
        file: PathBuf,
    },
    /// Delete a rule by id.
    Delete {
        id: String,
    },
}

fn parse_category(s: &str) -> Result<(usize, String), String> {
    let (row, label) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ROW=LABEL, got {s:?}"))?;
    let row = row
        .trim()
        .parse()
        .map_err(|_| format!("row must be a non-negative integer, got {row:?}"))?;
    Ok((row, label.trim().to_string()))
}
