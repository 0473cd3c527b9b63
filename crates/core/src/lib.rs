pub mod account;
pub mod money;
pub mod rule;
pub mod transaction;

pub use account::{suggest_transfer_accounts, Account, AccountId, DefaultAccounts};
pub use money::{parse_amount, Money, ValidationError};
pub use rule::{ActionKind, BankRule, ConditionField, ConditionOperator, RuleAction, RuleCondition};
pub use transaction::{
    NewTransaction, StatementLine, TransactionStatus, TransactionType, DEFAULT_CURRENCY,
    TRANSFER_CATEGORY,
};
