//! The import workflow as an explicit state machine.
//!
//! `Idle → Parsed → Previewed → ConfirmingTransfers → Submitted → Idle`.
//! Preview and confirmation are optional; a re-parse from any stage lands
//! in `Parsed` and discards preview and confirmation state. Every remote
//! round-trip is tagged with a [`Generation`] so a response that arrives
//! after the session moved on is rejected instead of applied.

use bankfeed_core::{
    DefaultAccounts, NewTransaction, StatementLine, ValidationError, DEFAULT_CURRENCY,
};
use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::delimited::{parse_text, ParseError, ParseOptions, ParsedRow, ParsedTable};
use crate::mapping::{FieldMap, MappedRow};
use crate::preview::{CategorySuggestions, EvaluateData, EvaluateRequest, PreviewTransaction};
use crate::selection::Selection;
use crate::transfer::{
    build_candidates, ConfirmTransfersRequest, TransferCandidate, TransferEdit, TransferPair,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Parsed,
    Previewed,
    ConfirmingTransfers,
    Submitted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Idle => write!(f, "idle"),
            Stage::Parsed => write!(f, "parsed"),
            Stage::Previewed => write!(f, "previewed"),
            Stage::ConfirmingTransfers => write!(f, "confirming transfers"),
            Stage::Submitted => write!(f, "submitted"),
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Cannot {action} while {stage}")]
    InvalidStage { action: &'static str, stage: Stage },
    #[error("Discarded stale response (issued at generation {issued}, now {current})")]
    StaleResponse { issued: u64, current: u64 },
    #[error("Row {index} is out of range ({len} rows)")]
    RowOutOfRange { index: usize, len: usize },
    #[error("Transfer candidate {index} is out of range ({len} candidates)")]
    CandidateOutOfRange { index: usize, len: usize },
    #[error("The preview found no transfer pairs")]
    NoTransfers,
    #[error("Transfer candidate {index} is invalid: {source}")]
    InvalidCandidate {
        index: usize,
        #[source]
        source: ValidationError,
    },
}

/// Monotonic tag identifying the session state a request was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct PreviewTicket {
    pub generation: Generation,
    pub request: EvaluateRequest,
}

#[derive(Debug, Clone)]
pub struct ConfirmTicket {
    pub generation: Generation,
    pub request: ConfirmTransfersRequest,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreviewSummary {
    pub categorized: usize,
    pub transfers: usize,
    pub dropped_pairs: usize,
}

/// A selected row turned into a transaction body, or the reason it cannot
/// be submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftRow {
    pub index: usize,
    pub result: Result<NewTransaction, ValidationError>,
}

#[derive(Debug, Clone)]
pub struct ImportSession {
    stage: Stage,
    generation: Generation,
    field_map: FieldMap,
    currency: String,
    table: ParsedTable,
    selection: Selection,
    categories: CategorySuggestions,
    transfers: Vec<TransferPair>,
    candidates: Vec<TransferCandidate>,
    confirmed: Vec<TransferPair>,
}

impl Default for ImportSession {
    fn default() -> Self {
        Self::new(FieldMap::default())
    }
}

impl ImportSession {
    pub fn new(field_map: FieldMap) -> Self {
        Self {
            stage: Stage::Idle,
            generation: Generation(0),
            field_map,
            currency: DEFAULT_CURRENCY.to_string(),
            table: ParsedTable::default(),
            selection: Selection::default(),
            categories: CategorySuggestions::default(),
            transfers: Vec::new(),
            candidates: Vec::new(),
            confirmed: Vec::new(),
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn columns(&self) -> &[String] {
        &self.table.columns
    }

    pub fn rows(&self) -> &[ParsedRow] {
        &self.table.rows
    }

    pub fn field_map(&self) -> &FieldMap {
        &self.field_map
    }

    /// The field map survives re-parses; edits take effect on the next
    /// preview or submission.
    pub fn field_map_mut(&mut self) -> &mut FieldMap {
        &mut self.field_map
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    pub fn categories(&self) -> &CategorySuggestions {
        &self.categories
    }

    /// Pairs reported by the last applied preview.
    pub fn transfers(&self) -> &[TransferPair] {
        &self.transfers
    }

    pub fn candidates(&self) -> &[TransferCandidate] {
        &self.candidates
    }

    pub fn confirmed_transfers(&self) -> &[TransferPair] {
        &self.confirmed
    }

    pub fn is_confirmed_transfer_row(&self, index: usize) -> bool {
        self.confirmed.iter().any(|p| p.contains(index))
    }

    pub fn mapped_rows(&self) -> Vec<MappedRow> {
        self.table
            .rows
            .iter()
            .map(|row| self.field_map.map_row(row))
            .collect()
    }

    /// Parses `text` and starts over from `Parsed` with every row selected.
    pub fn parse(&mut self, text: &str, options: &ParseOptions) -> Result<usize, ParseError> {
        let table = parse_text(text, options)?;
        let rows = table.rows.len();

        self.bump();
        self.selection = Selection::all(rows);
        self.table = table;
        self.clear_derived();
        self.stage = Stage::Parsed;

        info!(
            rows,
            columns = self.table.columns.len(),
            delimiter = %options.delimiter.as_char().escape_default(),
            has_header = options.has_header,
            "Parsed statement text"
        );
        Ok(rows)
    }

    /// Builds the evaluate request for every row, selected or not. Any
    /// earlier outstanding preview becomes stale.
    pub fn begin_preview(&mut self) -> Result<PreviewTicket, WorkflowError> {
        self.require_rows("preview rules")?;
        self.bump();
        let transactions = self.mapped_rows().iter().map(PreviewTransaction::from).collect();
        debug!(generation = self.generation.0, "Issued rule preview");
        Ok(PreviewTicket {
            generation: self.generation,
            request: EvaluateRequest { transactions },
        })
    }

    pub fn apply_preview(
        &mut self,
        generation: Generation,
        data: EvaluateData,
    ) -> Result<PreviewSummary, WorkflowError> {
        self.check_generation(generation)?;
        self.require_rows("apply a rule preview")?;

        let row_count = self.table.rows.len();
        let categorized = self.categories.merge_preview(data.verdicts(), row_count);

        let offered = data.transfers.len();
        let mut transfers = Vec::with_capacity(offered);
        for pair in data.transfers {
            if pair.is_valid_for(row_count) && !transfers.contains(&pair) {
                transfers.push(pair);
            } else {
                warn!(i = pair.i, j = pair.j, row_count, "Dropping invalid transfer pair");
            }
        }
        let dropped_pairs = offered - transfers.len();

        self.transfers = transfers;
        self.candidates.clear();
        self.confirmed.clear();
        self.stage = Stage::Previewed;

        let summary = PreviewSummary {
            categorized,
            transfers: self.transfers.len(),
            dropped_pairs,
        };
        info!(
            categorized = summary.categorized,
            transfers = summary.transfers,
            dropped = summary.dropped_pairs,
            "Applied rule preview"
        );
        Ok(summary)
    }

    /// A user's category choice for one row.
    pub fn set_category(&mut self, index: usize, label: &str) -> Result<(), WorkflowError> {
        self.require_rows("edit categories")?;
        let len = self.table.rows.len();
        if index >= len {
            return Err(WorkflowError::RowOutOfRange { index, len });
        }
        self.categories.set(index, label);
        Ok(())
    }

    /// Derives editable transfer postings from the detected pairs.
    pub fn begin_transfer_confirmation(
        &mut self,
        defaults: &DefaultAccounts,
        today: NaiveDate,
    ) -> Result<&[TransferCandidate], WorkflowError> {
        if !matches!(self.stage, Stage::Previewed | Stage::ConfirmingTransfers) {
            return Err(WorkflowError::InvalidStage {
                action: "confirm transfers",
                stage: self.stage,
            });
        }
        if self.transfers.is_empty() {
            return Err(WorkflowError::NoTransfers);
        }
        self.candidates = build_candidates(&self.transfers, &self.mapped_rows(), defaults, today);
        self.confirmed.clear();
        self.stage = Stage::ConfirmingTransfers;
        Ok(&self.candidates)
    }

    pub fn edit_candidate(&mut self, index: usize, edit: TransferEdit) -> Result<(), WorkflowError> {
        self.require_stage(Stage::ConfirmingTransfers, "edit transfer candidates")?;
        let len = self.candidates.len();
        let candidate = self
            .candidates
            .get_mut(index)
            .ok_or(WorkflowError::CandidateOutOfRange { index, len })?;
        candidate.apply(edit);
        Ok(())
    }

    /// Validates every candidate and builds the confirm request.
    pub fn transfer_confirmation(&self) -> Result<ConfirmTicket, WorkflowError> {
        self.require_stage(Stage::ConfirmingTransfers, "confirm transfers")?;
        let pairs = self
            .candidates
            .iter()
            .enumerate()
            .map(|(index, c)| {
                c.to_posting()
                    .map_err(|source| WorkflowError::InvalidCandidate { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ConfirmTicket {
            generation: self.generation,
            request: ConfirmTransfersRequest { pairs },
        })
    }

    /// Records a successful confirmation. From here on both rows of every
    /// pair are submitted as transfers.
    pub fn mark_transfers_confirmed(
        &mut self,
        generation: Generation,
        created_count: usize,
    ) -> Result<(), WorkflowError> {
        self.check_generation(generation)?;
        self.require_stage(Stage::ConfirmingTransfers, "record confirmed transfers")?;
        self.confirmed = self.candidates.iter().map(TransferCandidate::pair).collect();
        info!(pairs = self.confirmed.len(), created_count, "Transfers confirmed");
        Ok(())
    }

    pub fn cancel_transfer_confirmation(&mut self) -> Result<(), WorkflowError> {
        self.require_stage(Stage::ConfirmingTransfers, "cancel transfer confirmation")?;
        self.candidates.clear();
        self.confirmed.clear();
        self.stage = Stage::Previewed;
        Ok(())
    }

    /// Turns every selected row, in ascending order, into a transaction
    /// body or a validation failure.
    pub fn drafts(&self, company_id: &str) -> Result<Vec<DraftRow>, WorkflowError> {
        self.require_rows("submit")?;
        let drafts = self
            .selection
            .iter()
            .filter_map(|index| self.table.rows.get(index).map(|row| (index, row)))
            .map(|(index, row)| {
                let mapped = self.field_map.map_row(row);
                let result = mapped.amount().and_then(|amount| {
                    NewTransaction::from_statement_line(
                        StatementLine {
                            date: &mapped.date,
                            amount,
                            description: &mapped.description,
                            category: self.categories.get(index),
                            is_transfer: self.is_confirmed_transfer_row(index),
                        },
                        company_id,
                        &self.currency,
                    )
                });
                DraftRow { index, result }
            })
            .collect();
        Ok(drafts)
    }

    pub fn mark_submitted(&mut self) -> Result<(), WorkflowError> {
        self.require_rows("finish submission")?;
        self.stage = Stage::Submitted;
        Ok(())
    }

    /// Drops all rows and returns to `Idle`. The field map is kept.
    pub fn reset(&mut self) {
        self.bump();
        self.table = ParsedTable::default();
        self.selection = Selection::default();
        self.clear_derived();
        self.stage = Stage::Idle;
    }

    fn bump(&mut self) {
        self.generation = Generation(self.generation.0 + 1);
    }

    fn clear_derived(&mut self) {
        self.categories.clear();
        self.transfers.clear();
        self.candidates.clear();
        self.confirmed.clear();
    }

    fn check_generation(&self, issued: Generation) -> Result<(), WorkflowError> {
        if issued == self.generation {
            Ok(())
        } else {
            warn!(issued = issued.0, current = self.generation.0, "Stale response ignored");
            Err(WorkflowError::StaleResponse {
                issued: issued.0,
                current: self.generation.0,
            })
        }
    }

    fn require_rows(&self, action: &'static str) -> Result<(), WorkflowError> {
        match self.stage {
            Stage::Idle | Stage::Submitted => Err(WorkflowError::InvalidStage {
                action,
                stage: self.stage,
            }),
            _ => Ok(()),
        }
    }

    fn require_stage(&self, stage: Stage, action: &'static str) -> Result<(), WorkflowError> {
        if self.stage == stage {
            Ok(())
        } else {
            Err(WorkflowError::InvalidStage {
                action,
                stage: self.stage,
            })
        }
    }
}
