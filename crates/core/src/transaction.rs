use serde::{Deserialize, Serialize};
use std::fmt;

use super::money::{Money, ValidationError};

pub const DEFAULT_CURRENCY: &str = "USD";
pub const TRANSFER_CATEGORY: &str = "Transfer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Transfer,
}

impl TransactionType {
    /// Transfers win over the sign of the amount; otherwise non-negative
    /// amounts are deposits.
    pub fn classify(amount: Money, is_transfer: bool) -> Self {
        if is_transfer {
            TransactionType::Transfer
        } else if amount.is_negative() {
            TransactionType::Withdrawal
        } else {
            TransactionType::Deposit
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Deposit => write!(f, "deposit"),
            TransactionType::Withdrawal => write!(f, "withdrawal"),
            TransactionType::Transfer => write!(f, "transfer"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Posted,
    Pending,
}

/// Body of `POST /api/transactions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub transaction_type: TransactionType,
    /// Always non-negative; direction is carried by `transaction_type`.
    pub amount: Money,
    pub currency: String,
    pub transaction_date: String,
    pub status: TransactionStatus,
    pub company_id: String,
    pub memo: String,
    pub category: Option<String>,
}

/// One imported statement line, ready to be turned into a ledger
/// transaction.
#[derive(Debug, Clone)]
pub struct StatementLine<'a> {
    pub date: &'a str,
    pub amount: Money,
    pub description: &'a str,
    pub category: Option<&'a str>,
    pub is_transfer: bool,
}

impl NewTransaction {
    pub fn from_statement_line(
        line: StatementLine<'_>,
        company_id: &str,
        currency: &str,
    ) -> Result<Self, ValidationError> {
        if line.date.trim().is_empty() {
            return Err(ValidationError::MissingDate);
        }
        if line.amount.is_zero() {
            return Err(ValidationError::ZeroAmount);
        }

        let transaction_type = TransactionType::classify(line.amount, line.is_transfer);
        let category = if line.is_transfer {
            Some(TRANSFER_CATEGORY.to_string())
        } else {
            line.category
                .filter(|c| !c.trim().is_empty())
                .map(str::to_string)
        };

        Ok(NewTransaction {
            transaction_type,
            amount: line.amount.abs(),
            currency: currency.to_string(),
            transaction_date: line.date.trim().to_string(),
            status: TransactionStatus::Posted,
            company_id: company_id.to_string(),
            memo: line.description.to_string(),
            category,
        })
    }
}
