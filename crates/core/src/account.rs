use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Server-assigned account identifier. The ledger API emits both numeric
/// and string ids, so both are accepted and normalized to a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        AccountId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Int(i64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Int(n) => n.to_string(),
        }
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawId::deserialize(deserializer).map(|raw| AccountId(raw.into()))
    }
}

/// Reads an optional server id that may arrive as a string or a number.
pub(crate) fn deserialize_optional_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<RawId>::deserialize(deserializer)?.map(String::from))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default, rename = "type")]
    pub account_type: Option<String>,
}

impl Account {
    pub fn new(id: &str, name: &str) -> Self {
        Account {
            id: AccountId::new(id),
            name: name.to_string(),
            code: None,
            account_type: None,
        }
    }

    /// Whether the account looks like a bank or cash account, judged by
    /// its name, code or type.
    pub fn is_bank_or_cash(&self) -> bool {
        let re = bank_or_cash_pattern();
        re.is_match(&self.name)
            || self.code.as_deref().is_some_and(|c| re.is_match(c))
            || self.account_type.as_deref().is_some_and(|t| re.is_match(t))
    }
}

fn bank_or_cash_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)bank|cash|checking|chequing|saving").expect("static pattern is valid")
    })
}

/// Accounts pre-filled into every transfer candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultAccounts {
    pub from: Option<AccountId>,
    pub to: Option<AccountId>,
}

/// Picks the first two bank/cash-looking accounts as the default transfer
/// source and destination.
pub fn suggest_transfer_accounts(accounts: &[Account]) -> DefaultAccounts {
    let mut candidates = accounts.iter().filter(|a| a.is_bank_or_cash());
    DefaultAccounts {
        from: candidates.next().map(|a| a.id.clone()),
        to: candidates.next().map(|a| a.id.clone()),
    }
}
