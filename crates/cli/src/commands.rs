use std::io::{Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use bankfeed_client::{
    confirm_transfers, preview_rules, submit_selected, ApiClient, LedgerApi, SubmitPolicy,
};
use bankfeed_core::{suggest_transfer_accounts, AccountId, BankRule, DefaultAccounts};
use bankfeed_import::{
    Field, ImportSession, LocalEvaluator, ParseOptions, PreviewSummary, TransferCandidate,
};
use tokio::sync::Mutex;
use tracing::info;

use crate::cli::{ImportArgs, RulesCommands};
use crate::config::Settings;

fn client(settings: &Settings) -> Result<ApiClient> {
    let config = settings.api.client_config()?;
    ApiClient::new(config).context("Failed to build API client")
}

fn require_api(api: Option<&dyn LedgerApi>) -> Result<&dyn LedgerApi> {
    api.context("This step talks to the ledger API, which is not available in this mode")
}

fn read_statement(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read statement from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

pub async fn import(settings: &Settings, args: &ImportArgs) -> Result<()> {
    let text = read_statement(&args.file)?;
    let api = if args.needs_api() {
        Some(client(settings)?)
    } else {
        None
    };
    let api = api.as_ref().map(|a| a as &dyn LedgerApi);
    run_import(api, settings, args, &text, &mut std::io::stdout()).await
}

/// The import flow behind `bankfeed import`. `api` may be absent only for
/// offline dry runs.
pub async fn run_import(
    api: Option<&dyn LedgerApi>,
    settings: &Settings,
    args: &ImportArgs,
    text: &str,
    out: &mut dyn Write,
) -> Result<()> {
    let delimiter = args.delimiter.as_deref().unwrap_or(&settings.import.delimiter);
    let options = ParseOptions::new(delimiter, settings.import.has_header && !args.no_header)?;

    let mut field_map = settings.import.field_map.clone();
    for (field, column) in [
        (Field::Date, &args.date_col),
        (Field::Amount, &args.amount_col),
        (Field::Description, &args.description_col),
    ] {
        if let Some(column) = column {
            field_map.set(field, column.as_str());
        }
    }
    let currency = args.currency.as_deref().unwrap_or(&settings.import.currency);

    let mut session = ImportSession::new(field_map).with_currency(currency);
    let rows = session.parse(text, &options)?;
    writeln!(out, "Parsed {rows} rows; columns: {}", session.columns().join(", "))?;
    if rows == 0 {
        return Ok(());
    }
    if let Some(indices) = &args.rows {
        session.selection_mut().replace(indices.iter().copied())?;
    }

    if args.wants_preview() {
        let summary = match &args.offline_rules {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read rules {}", path.display()))?;
                let evaluator = LocalEvaluator::from_toml(&content)?;
                info!(rules = evaluator.rule_count(), "Evaluating rules locally");
                preview_offline(&mut session, &evaluator)?
            }
            None => {
                let session_lock = Mutex::new(session);
                let summary = preview_rules(require_api(api)?, &session_lock).await?;
                session = session_lock.into_inner();
                summary
            }
        };
        writeln!(
            out,
            "Preview: {} categorized, {} transfer pair(s)",
            summary.categorized, summary.transfers
        )?;
    }

    for (row, label) in &args.categories {
        session.set_category(*row, label)?;
    }

    let session = Mutex::new(session);
    handle_transfers(api, args, &session, out).await?;

    let session = session.into_inner();
    if args.dry_run {
        let company_id = settings.api.company_id.as_deref().unwrap_or_default();
        for draft in session.drafts(company_id)? {
            match draft.result {
                Ok(tx) => writeln!(out, "row {}: {}", draft.index, serde_json::to_string(&tx)?)?,
                Err(e) => writeln!(out, "row {}: invalid: {e}", draft.index)?,
            }
        }
        return Ok(());
    }

    let api = require_api(api)?;
    let policy = if args.stop_on_error {
        SubmitPolicy::StopOnError
    } else {
        SubmitPolicy::BestEffort
    };
    let session = Mutex::new(session);
    let report = submit_selected(api, &session, policy).await?;
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(receipt) => writeln!(
                out,
                "row {}: created {}",
                outcome.index,
                receipt.id.as_deref().unwrap_or("(no id)")
            )?,
            Err(e) => writeln!(out, "row {}: {e}", outcome.index)?,
        }
    }
    writeln!(
        out,
        "Created {} of {} transactions",
        report.created(),
        report.outcomes.len()
    )?;
    if !report.is_complete() {
        bail!("{} row(s) were not submitted", report.failed_count());
    }
    Ok(())
}

/// Applies a [`LocalEvaluator`] the same way a server preview is applied.
pub fn preview_offline(
    session: &mut ImportSession,
    evaluator: &LocalEvaluator,
) -> Result<PreviewSummary> {
    let ticket = session.begin_preview()?;
    let data = evaluator.evaluate(&ticket.request);
    Ok(session.apply_preview(ticket.generation, data)?)
}

async fn handle_transfers(
    api: Option<&dyn LedgerApi>,
    args: &ImportArgs,
    session: &Mutex<ImportSession>,
    out: &mut dyn Write,
) -> Result<()> {
    let pairs = session.lock().await.transfers().len();
    if pairs == 0 {
        return Ok(());
    }
    if !args.confirm_transfers {
        writeln!(
            out,
            "{pairs} transfer pair(s) detected; pass --confirm-transfers to post them"
        )?;
        return Ok(());
    }

    let mut defaults = DefaultAccounts {
        from: args.from_account.as_deref().map(AccountId::new),
        to: args.to_account.as_deref().map(AccountId::new),
    };
    if defaults.from.is_none() || defaults.to.is_none() {
        if let Some(api) = api {
            let suggested = suggest_transfer_accounts(&api.list_accounts().await?);
            defaults.from = defaults.from.or(suggested.from);
            defaults.to = defaults.to.or(suggested.to);
        }
    }

    let today = chrono::Local::now().date_naive();
    {
        let mut session = session.lock().await;
        for candidate in session.begin_transfer_confirmation(&defaults, today)? {
            writeln!(out, "{}", describe_candidate(candidate))?;
        }
    }

    if args.dry_run {
        let mut session = session.lock().await;
        let ticket = session.transfer_confirmation()?;
        writeln!(out, "Would confirm: {}", serde_json::to_string(&ticket.request)?)?;
        // Nothing is created, but the drafts still treat the pair as transfers.
        session.mark_transfers_confirmed(ticket.generation, 0)?;
        return Ok(());
    }

    let created = confirm_transfers(require_api(api)?, session).await?;
    writeln!(out, "Confirmed {pairs} transfer pair(s); server created {created}")?;
    Ok(())
}

fn describe_candidate(c: &TransferCandidate) -> String {
    let account = |id: &Option<AccountId>| id.as_ref().map_or("?", AccountId::as_str).to_string();
    format!(
        "  rows {} & {}: {} on {} from {} to {}",
        c.i,
        c.j,
        c.amount,
        c.date,
        account(&c.from_account_id),
        account(&c.to_account_id)
    )
}

pub async fn accounts(settings: &Settings) -> Result<()> {
    let api = client(settings)?;
    let accounts = api.list_accounts().await?;
    if accounts.is_empty() {
        println!("No accounts.");
        return Ok(());
    }
    for account in &accounts {
        let marker = if account.is_bank_or_cash() { "*" } else { " " };
        println!(
            "{marker} {:<12} {:<32} {}",
            account.id.as_str(),
            account.name,
            account.account_type.as_deref().unwrap_or("")
        );
    }
    println!("\n* eligible as a default transfer account");
    Ok(())
}

pub async fn rules(settings: &Settings, command: RulesCommands) -> Result<()> {
    let api = client(settings)?;
    match command {
        RulesCommands::List { json } => {
            let mut rules = api.list_rules().await?;
            rules.sort_by_key(|r| r.order);
            if json {
                println!("{}", serde_json::to_string_pretty(&rules)?);
                return Ok(());
            }
            for rule in &rules {
                println!("{}", describe_rule(rule));
            }
        }
        RulesCommands::Upsert { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let rule: BankRule = serde_json::from_str(&content)
                .with_context(|| format!("Invalid rule JSON in {}", file.display()))?;
            let saved = api.upsert_rule(&rule).await?;
            println!("Saved {}", describe_rule(&saved));
        }
        RulesCommands::Delete { id } => {
            api.delete_rule(&id).await?;
            println!("Deleted rule {id}");
        }
    }
    Ok(())
}

fn describe_rule(rule: &BankRule) -> String {
    format!(
        "[{}] {} {}: {} condition(s) -> {}{}",
        rule.order,
        rule.id.as_deref().unwrap_or("-"),
        rule.name.as_deref().unwrap_or("(unnamed)"),
        rule.conditions.len(),
        rule.category().unwrap_or("no category"),
        match (rule.flags(), rule.is_active) {
            (_, false) => " (inactive)",
            (true, true) => " (flags)",
            (false, true) => "",
        }
    )
}
