use bankfeed_core::{parse_amount, Money, ValidationError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::delimited::ParsedRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Date,
    Amount,
    Description,
}

impl Field {
    /// Column names tried, in order, when the mapped column is absent or
    /// empty. Matching is case-sensitive.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Field::Date => &["date", "Date"],
            Field::Amount => &["amount", "Amount"],
            Field::Description => &["description", "Description", "Details"],
        }
    }
}

/// Which column supplies each logical field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMap {
    pub date: String,
    pub amount: String,
    pub description: String,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            date: "date".to_string(),
            amount: "amount".to_string(),
            description: "description".to_string(),
        }
    }
}

impl FieldMap {
    pub fn column(&self, field: Field) -> &str {
        match field {
            Field::Date => &self.date,
            Field::Amount => &self.amount,
            Field::Description => &self.description,
        }
    }

    pub fn set(&mut self, field: Field, column: impl Into<String>) {
        let column = column.into();
        match field {
            Field::Date => self.date = column,
            Field::Amount => self.amount = column,
            Field::Description => self.description = column,
        }
    }

    /// First non-empty value among the mapped column and the field's
    /// aliases.
    pub fn resolve<'r>(&self, row: &'r ParsedRow, field: Field) -> Option<&'r str> {
        let mapped = self.column(field);
        std::iter::once(mapped)
            .filter(|c| !c.is_empty())
            .chain(field.aliases().iter().copied())
            .filter_map(|column| row.get(column))
            .find(|value| !value.is_empty())
    }

    pub fn map_row(&self, row: &ParsedRow) -> MappedRow {
        let text = |field| self.resolve(row, field).unwrap_or_default().to_string();
        MappedRow {
            date: text(Field::Date),
            amount_raw: text(Field::Amount),
            description: text(Field::Description),
        }
    }
}

/// A row reduced to the three logical fields. The amount stays raw so
/// callers choose between strict and lenient interpretation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappedRow {
    pub date: String,
    pub amount_raw: String,
    pub description: String,
}

impl MappedRow {
    pub fn amount(&self) -> Result<Money, ValidationError> {
        parse_amount(&self.amount_raw)
    }

    /// Non-numeric amounts count as zero.
    pub fn amount_or_zero(&self) -> Money {
        Money::lenient(&self.amount_raw)
    }

    pub fn parsed_date(&self) -> Option<NaiveDate> {
        parse_date(&self.date)
    }
}

/// Parses the date layouts banks commonly export. ISO dates are tried
/// first, then US and European orderings.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    [
        "%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d", "%m-%d-%Y", "%d-%m-%Y", "%d.%m.%Y",
    ]
    .iter()
    .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}
