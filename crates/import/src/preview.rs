use bankfeed_core::Money;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::mapping::MappedRow;
use crate::transfer::TransferPair;

/// One row as sent to the rule evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewTransaction {
    pub date: String,
    pub amount: Money,
    pub description: String,
}

impl From<&MappedRow> for PreviewTransaction {
    fn from(row: &MappedRow) -> Self {
        PreviewTransaction {
            date: row.date.clone(),
            amount: row.amount_or_zero(),
            description: row.description.clone(),
        }
    }
}

/// Body of `POST /api/bank-rules/:companyId/evaluate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluateRequest {
    pub transactions: Vec<PreviewTransaction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluateResponse {
    #[serde(default)]
    pub data: EvaluateData,
}

/// Per-row verdicts are positional: entry `k` describes request row `k`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluateData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<RowVerdict>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<RowVerdict>>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub transfers: Vec<TransferPair>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl EvaluateData {
    /// `results` when present, otherwise the older `items` key.
    pub fn verdicts(&self) -> &[RowVerdict] {
        self.results
            .as_deref()
            .or(self.items.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowVerdict {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub flagged: bool,
}

/// Category per row. Server suggestions and user edits share one slot; a
/// later preview with a non-empty suggestion replaces a user edit, a blank
/// one leaves it alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategorySuggestions {
    entries: BTreeMap<usize, String>,
    edited: BTreeSet<usize>,
}

impl CategorySuggestions {
    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(&index).map(String::as_str)
    }

    pub fn is_user_edited(&self, index: usize) -> bool {
        self.edited.contains(&index)
    }

    /// Records a user edit. An empty label removes the category.
    pub fn set(&mut self, index: usize, label: &str) {
        let label = label.trim();
        if label.is_empty() {
            self.entries.remove(&index);
        } else {
            self.entries.insert(index, label.to_string());
        }
        self.edited.insert(index);
    }

    /// Applies server verdicts, returning how many rows received a
    /// category. Verdicts beyond `row_count` are ignored.
    pub fn merge_preview(&mut self, verdicts: &[RowVerdict], row_count: usize) -> usize {
        let mut applied = 0;
        for (index, verdict) in verdicts.iter().enumerate().take(row_count) {
            let Some(category) = verdict.category.as_deref().map(str::trim) else {
                continue;
            };
            if category.is_empty() {
                continue;
            }
            self.entries.insert(index, category.to_string());
            self.edited.remove(&index);
            applied += 1;
        }
        applied
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.edited.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
