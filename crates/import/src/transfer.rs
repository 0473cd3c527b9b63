use bankfeed_core::{AccountId, DefaultAccounts, Money, ValidationError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::mapping::MappedRow;

pub const TRANSFER_MEMO: &str = "Matched transfer";

/// Two rows believed to be the opposite sides of one internal transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferPair {
    pub i: usize,
    pub j: usize,
}

impl TransferPair {
    pub fn new(i: usize, j: usize) -> Self {
        Self { i, j }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.i == index || self.j == index
    }

    /// Distinct indices that both exist in a table of `row_count` rows.
    pub fn is_valid_for(&self, row_count: usize) -> bool {
        self.i != self.j && self.i < row_count && self.j < row_count
    }
}

/// An editable transfer posting derived from a detected pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferCandidate {
    pub i: usize,
    pub j: usize,
    pub amount: Money,
    pub date: String,
    pub from_account_id: Option<AccountId>,
    pub to_account_id: Option<AccountId>,
    pub memo: String,
}

/// Field-by-field changes to one candidate; `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferEdit {
    pub amount: Option<Money>,
    pub date: Option<String>,
    pub from_account_id: Option<AccountId>,
    pub to_account_id: Option<AccountId>,
    pub memo: Option<String>,
}

impl TransferCandidate {
    pub fn from_pair(
        pair: TransferPair,
        rows: &[MappedRow],
        defaults: &DefaultAccounts,
        today: NaiveDate,
    ) -> Self {
        let side = |index: usize| rows.get(index);

        let amount = [pair.i, pair.j]
            .into_iter()
            .filter_map(side)
            .map(|row| row.amount_or_zero().abs())
            .find(|amount| !amount.is_zero())
            .unwrap_or_default();

        let date = [pair.i, pair.j]
            .into_iter()
            .filter_map(side)
            .map(|row| row.date.trim())
            .find(|date| !date.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| today.format("%Y-%m-%d").to_string());

        TransferCandidate {
            i: pair.i,
            j: pair.j,
            amount,
            date,
            from_account_id: defaults.from.clone(),
            to_account_id: defaults.to.clone(),
            memo: TRANSFER_MEMO.to_string(),
        }
    }

    pub fn pair(&self) -> TransferPair {
        TransferPair::new(self.i, self.j)
    }

    pub fn apply(&mut self, edit: TransferEdit) {
        if let Some(amount) = edit.amount {
            self.amount = amount;
        }
        if let Some(date) = edit.date {
            self.date = date;
        }
        if let Some(from) = edit.from_account_id {
            self.from_account_id = Some(from);
        }
        if let Some(to) = edit.to_account_id {
            self.to_account_id = Some(to);
        }
        if let Some(memo) = edit.memo {
            self.memo = memo;
        }
    }

    /// Checks the candidate is postable and produces its wire form.
    pub fn to_posting(&self) -> Result<TransferPosting, ValidationError> {
        let from = self
            .from_account_id
            .clone()
            .ok_or(ValidationError::MissingAccount("source"))?;
        let to = self
            .to_account_id
            .clone()
            .ok_or(ValidationError::MissingAccount("destination"))?;
        if from == to {
            return Err(ValidationError::SameAccount(from.to_string()));
        }
        if self.amount.is_zero() {
            return Err(ValidationError::ZeroAmount);
        }
        if self.date.trim().is_empty() {
            return Err(ValidationError::MissingDate);
        }
        Ok(TransferPosting {
            i: self.i,
            j: self.j,
            amount: self.amount.abs(),
            date: self.date.trim().to_string(),
            from_account_id: from,
            to_account_id: to,
            memo: self.memo.clone(),
        })
    }
}

pub fn build_candidates(
    pairs: &[TransferPair],
    rows: &[MappedRow],
    defaults: &DefaultAccounts,
    today: NaiveDate,
) -> Vec<TransferCandidate> {
    pairs
        .iter()
        .map(|&pair| TransferCandidate::from_pair(pair, rows, defaults, today))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferPosting {
    pub i: usize,
    pub j: usize,
    pub amount: Money,
    pub date: String,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub memo: String,
}

/// Body of `POST /api/bank-rules/:companyId/transfers/confirm`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmTransfersRequest {
    pub pairs: Vec<TransferPosting>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmTransfersResponse {
    #[serde(default)]
    pub created_count: usize,
}
