use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Transaction attribute a rule condition inspects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionField {
    Description,
    Amount,
    Date,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Contains,
    #[serde(alias = "eq")]
    Equals,
    StartsWith,
    EndsWith,
    Regex,
    #[serde(alias = "gt")]
    GreaterThan,
    #[serde(alias = "lt")]
    LessThan,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCondition {
    pub field: ConditionField,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: Value,
}

impl RuleCondition {
    /// The comparison operand as text; numbers are rendered in their JSON
    /// form.
    pub fn value_text(&self) -> Option<String> {
        match &self.value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    #[serde(alias = "category", alias = "categorize")]
    SetCategory,
    Flag,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// A categorization rule owned by the ledger service. Lower `order` runs
/// first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankRule {
    #[serde(
        default,
        deserialize_with = "crate::account::deserialize_optional_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    #[serde(default)]
    pub actions: Vec<RuleAction>,
    #[serde(default)]
    pub order: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl BankRule {
    /// The category assigned by the first `set_category` action, if any.
    pub fn category(&self) -> Option<&str> {
        self.actions
            .iter()
            .find(|a| a.kind == ActionKind::SetCategory)
            .and_then(|a| a.value.as_deref())
            .filter(|v| !v.trim().is_empty())
    }

    pub fn flags(&self) -> bool {
        self.actions.iter().any(|a| a.kind == ActionKind::Flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_wire_rule() {
        let json = r#"{
            "id": "r1",
            "companyId": "co_1",
            "conditions": [
                {"field": "description", "operator": "contains", "value": "AMAZON"},
                {"field": "amount", "operator": "lt", "value": -10}
            ],
            "actions": [{"type": "set_category", "value": "Office Supplies"}],
            "order": 2,
            "isActive": false
        }"#;
        let rule: BankRule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.id.as_deref(), Some("r1"));
        assert_eq!(rule.conditions[1].operator, ConditionOperator::LessThan);
        assert_eq!(rule.conditions[1].value_text().as_deref(), Some("-10"));
        assert_eq!(rule.category(), Some("Office Supplies"));
        assert!(!rule.is_active);
    }

    #[test]
    fn unknown_operator_and_action_are_tolerated() {
        let json = r#"{
            "conditions": [{"field": "payee", "operator": "sounds_like", "value": "x"}],
            "actions": [{"type": "split"}]
        }"#;
        let rule: BankRule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.conditions[0].field, ConditionField::Unknown);
        assert_eq!(rule.conditions[0].operator, ConditionOperator::Unknown);
        assert_eq!(rule.actions[0].kind, ActionKind::Unknown);
        assert!(rule.is_active);
        assert_eq!(rule.category(), None);
    }

    #[test]
    fn new_rule_omits_id_on_the_wire() {
        let rule = BankRule {
            id: None,
            company_id: None,
            name: Some("Coffee".into()),
            conditions: vec![],
            actions: vec![RuleAction { kind: ActionKind::Flag, value: None }],
            order: 0,
            is_active: true,
        };
        let json = serde_json::to_value(&rule).unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["isActive"], true);
        assert_eq!(json["actions"][0]["type"], "flag");
        assert!(rule.flags());
    }

    #[test]
    fn numeric_rule_id_is_read_as_text() {
        let rule: BankRule = serde_json::from_str(r#"{"id": 7, "order": 1}"#).unwrap();
        assert_eq!(rule.id.as_deref(), Some("7"));

        let rule: BankRule = serde_json::from_str(r#"{"id": null}"#).unwrap();
        assert_eq!(rule.id, None);
        let rule: BankRule = serde_json::from_str(r#"{"id": "r_9"}"#).unwrap();
        assert_eq!(rule.id.as_deref(), Some("r_9"));
    }
}
