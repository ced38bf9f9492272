use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// One reimbursable expense attached to a timecard. Expenses are never
/// taxed; they ride along on the invoice total as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseItem {
    #[serde(default)]
    pub merchant: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub amount: f64,
}

impl ExpenseItem {
    /// Parse the JSON list stored on an invoice row. Rows written by hand or
    /// by older tools may hold anything, so malformed input yields an empty
    /// list instead of an error.
    pub fn parse_list(raw: &str) -> Vec<ExpenseItem> {
        serde_json::from_str(raw).unwrap_or_default()
    }

    pub fn total(items: &[ExpenseItem]) -> f64 {
        items.iter().map(|item| item.amount).sum()
    }
}

/// Amounts arrive as JSON numbers or as strings typed into a form. Anything
/// that does not read as a finite number counts as zero rather than
/// poisoning the row.
fn lenient_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    let amount = match Raw::deserialize(deserializer)? {
        Raw::Number(n) => n,
        Raw::Text(s) => s.trim().parse::<f64>().unwrap_or(0.0),
    };
    Ok(if amount.is_finite() { amount } else { 0.0 })
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected MERCHANT:AMOUNT[:DESCRIPTION], got `{0}`")]
pub struct ParseExpenseError(pub String);

impl FromStr for ExpenseItem {
    type Err = ParseExpenseError;

    /// Command line form: `MERCHANT:AMOUNT` or `MERCHANT:AMOUNT:DESCRIPTION`.
    /// The description may itself contain colons.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let merchant = parts.next().unwrap_or_default().trim();
        let amount = parts
            .next()
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|amount| amount.is_finite() && *amount >= 0.0);
        match (merchant.is_empty(), amount) {
            (false, Some(amount)) => Ok(ExpenseItem {
                merchant: merchant.to_string(),
                description: parts.next().unwrap_or_default().trim().to_string(),
                amount,
            }),
            _ => Err(ParseExpenseError(s.to_string())),
        }
    }
}
