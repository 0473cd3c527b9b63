use bankfeed_core::{parse_amount, BankRule, ConditionField, ConditionOperator, RuleCondition};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::mapping::parse_date;
use crate::pairing::{detect_transfers, DEFAULT_WINDOW_DAYS};
use crate::preview::{EvaluateData, EvaluateRequest, PreviewTransaction, RowVerdict};

#[derive(Error, Debug)]
pub enum RuleFileError {
    #[error("Failed to parse rule file: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<BankRule>,
}

/// Pairing of a rule with precompiled regexes, one slot per condition.
struct CompiledRule {
    rule: BankRule,
    patterns: Vec<Option<regex::Regex>>,
}

/// Offline stand-in for the remote evaluate endpoint. Produces the same
/// response shape from a local rule set.
pub struct LocalEvaluator {
    rules: Vec<CompiledRule>,
    transfer_window_days: i64,
}

impl LocalEvaluator {
    /// Inactive rules are discarded; the rest run in ascending `order`,
    /// ties keeping their input order.
    pub fn new(rules: Vec<BankRule>) -> Self {
        let mut compiled: Vec<CompiledRule> = rules
            .into_iter()
            .filter(|rule| rule.is_active)
            .map(|rule| {
                let patterns = rule
                    .conditions
                    .iter()
                    .map(|c| compile_pattern(&rule, c))
                    .collect();
                CompiledRule { rule, patterns }
            })
            .collect();
        compiled.sort_by_key(|cr| cr.rule.order);
        Self {
            rules: compiled,
            transfer_window_days: DEFAULT_WINDOW_DAYS,
        }
    }

    pub fn from_toml(toml_content: &str) -> Result<Self, RuleFileError> {
        let file: RuleFile = toml::from_str(toml_content)?;
        Ok(Self::new(file.rules))
    }

    pub fn with_transfer_window(mut self, days: i64) -> Self {
        self.transfer_window_days = days;
        self
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn find_matching_rule(&self, tx: &PreviewTransaction) -> Option<&BankRule> {
        self.rules
            .iter()
            .find(|cr| rule_matches(cr, tx))
            .map(|cr| &cr.rule)
    }

    pub fn evaluate(&self, request: &EvaluateRequest) -> EvaluateData {
        let results = request
            .transactions
            .iter()
            .map(|tx| RowVerdict {
                category: self
                    .matching(tx)
                    .find_map(|rule| rule.category())
                    .map(str::to_string),
                flagged: self.matching(tx).any(BankRule::flags),
            })
            .collect();
        EvaluateData {
            results: Some(results),
            items: None,
            transfers: detect_transfers(&request.transactions, self.transfer_window_days),
        }
    }

    fn matching<'a>(&'a self, tx: &'a PreviewTransaction) -> impl Iterator<Item = &'a BankRule> + 'a {
        self.rules
            .iter()
            .filter(move |cr| rule_matches(cr, tx))
            .map(|cr| &cr.rule)
    }
}

fn compile_pattern(rule: &BankRule, condition: &RuleCondition) -> Option<regex::Regex> {
    if condition.operator != ConditionOperator::Regex {
        return None;
    }
    let pattern = condition.value_text()?;
    match regex::Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(rule = ?rule.id, %pattern, error = %e, "Ignoring invalid rule regex");
            None
        }
    }
}

// A rule with no conditions never matches.
fn rule_matches(cr: &CompiledRule, tx: &PreviewTransaction) -> bool {
    !cr.rule.conditions.is_empty()
        && cr
            .rule
            .conditions
            .iter()
            .zip(&cr.patterns)
            .all(|(condition, pattern)| condition_matches(condition, pattern.as_ref(), tx))
}

fn condition_matches(
    condition: &RuleCondition,
    pattern: Option<&regex::Regex>,
    tx: &PreviewTransaction,
) -> bool {
    let Some(value) = condition.value_text() else {
        return false;
    };
    match condition.field {
        ConditionField::Description => text_matches(&condition.operator, pattern, &tx.description, &value),
        ConditionField::Amount => {
            let Ok(operand) = parse_amount(&value) else {
                return false;
            };
            match condition.operator {
                ConditionOperator::Equals => tx.amount == operand,
                ConditionOperator::GreaterThan => tx.amount > operand,
                ConditionOperator::LessThan => tx.amount < operand,
                _ => false,
            }
        }
        ConditionField::Date => match condition.operator {
            ConditionOperator::GreaterThan | ConditionOperator::LessThan => {
                match (parse_date(&tx.date), parse_date(&value)) {
                    (Some(date), Some(operand)) => {
                        if condition.operator == ConditionOperator::GreaterThan {
                            date > operand
                        } else {
                            date < operand
                        }
                    }
                    _ => false,
                }
            }
            _ => text_matches(&condition.operator, pattern, &tx.date, &value),
        },
        ConditionField::Unknown => false,
    }
}

fn text_matches(
    operator: &ConditionOperator,
    pattern: Option<&regex::Regex>,
    text: &str,
    value: &str,
) -> bool {
    let haystack = text.to_lowercase();
    let needle = value.to_lowercase();
    match operator {
        ConditionOperator::Contains => haystack.contains(&needle),
        ConditionOperator::Equals => haystack.trim() == needle.trim(),
        ConditionOperator::StartsWith => haystack.starts_with(&needle),
        ConditionOperator::EndsWith => haystack.ends_with(&needle),
        ConditionOperator::Regex => pattern.is_some_and(|re| re.is_match(text)),
        _ => false,
    }
}
