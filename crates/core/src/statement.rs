use serde::{Deserialize, Deserializer, Serialize};

use crate::money::Money;

/// Column headings of the exported transaction table.
pub const TABLE_COLUMNS: [&str; 4] = ["Date", "Description", "Amount", "Balance"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementHeader {
    #[serde(deserialize_with = "lenient_string")]
    pub account_holder: String,
    #[serde(deserialize_with = "lenient_string")]
    pub bank: String,
    #[serde(deserialize_with = "lenient_string")]
    pub date_range: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementTransaction {
    #[serde(deserialize_with = "lenient_string")]
    pub date: String,
    #[serde(deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(deserialize_with = "lenient_string")]
    pub amount: String,
    #[serde(deserialize_with = "lenient_string")]
    pub balance: String,
    /// Cleared by post-processing when `date` is not a recognised date.
    #[serde(skip_serializing_if = "is_true")]
    pub date_valid: bool,
    /// Cleared by post-processing when `amount` is not a number.
    #[serde(skip_serializing_if = "is_true")]
    pub amount_valid: bool,
}

impl Default for StatementTransaction {
    fn default() -> Self {
        Self {
            date: String::new(),
            description: String::new(),
            amount: String::new(),
            balance: String::new(),
            date_valid: true,
            amount_valid: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementSummary {
    #[serde(deserialize_with = "lenient_string")]
    pub final_balance: String,
    #[serde(deserialize_with = "lenient_string")]
    pub total_debit: String,
    #[serde(deserialize_with = "lenient_string")]
    pub total_credit: String,
}

/// Structured content of one bank statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsedStatement {
    pub header: StatementHeader,
    pub transactions: Vec<StatementTransaction>,
    pub summary: StatementSummary,
}

impl ParsedStatement {
    /// Rows for the tabular export: transactions with both a date and an amount.
    pub fn table_rows(&self) -> Vec<[String; 4]> {
        self.transactions
            .iter()
            .filter(|t| !t.date.is_empty() && !t.amount.is_empty())
            .map(|t| [t.date.clone(), t.description.clone(), t.amount.clone(), t.balance.clone()])
            .collect()
    }

    /// Sum of all amounts that parse; `None` when none do.
    pub fn amount_total(&self) -> Option<Money> {
        self.transactions
            .iter()
            .filter_map(|t| Money::parse_amount(&t.amount).ok())
            .reduce(|a, b| a + b)
    }
}

fn is_true(v: &bool) -> bool {
    *v
}

/// Accept strings, numbers, booleans or null where a string is expected.
fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    use serde_json::Value;
    Ok(match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_default_to_empty() {
        let s: ParsedStatement = serde_json::from_str(r#"{"transactions":[{"date":"05/11/2019"}]}"#).unwrap();
        assert_eq!(s.header, StatementHeader::default());
        assert_eq!(s.transactions[0].amount, "");
        assert!(s.transactions[0].date_valid);
    }

    #[test]
    fn numbers_and_nulls_become_strings() {
        let s: ParsedStatement = serde_json::from_str(
            r#"{"transactions":[{"date":"05/11/2019","amount":-54.2,"balance":null}],
                "summary":{"final_balance":1204.33}}"#,
        )
        .unwrap();
        assert_eq!(s.transactions[0].amount, "-54.2");
        assert_eq!(s.transactions[0].balance, "");
        assert_eq!(s.summary.final_balance, "1204.33");
    }

    #[test]
    fn validity_flags_only_serialized_when_false() {
        let mut t = StatementTransaction { date: "x".into(), ..Default::default() };
        let json = serde_json::to_string(&t).unwrap();
        assert!(!json.contains("date_valid"));
        t.date_valid = false;
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("\"date_valid\":false"));
        assert!(!json.contains("amount_valid"));
    }

    #[test]
    fn table_rows_need_date_and_amount() {
        let s = ParsedStatement {
            transactions: vec![
                StatementTransaction {
                    date: "05/11/2019".into(),
                    description: "PRLV EDF".into(),
                    amount: "-54.20".into(),
                    balance: "1204.33".into(),
                    ..Default::default()
                },
                StatementTransaction { date: "06/11/2019".into(), ..Default::default() },
                StatementTransaction { amount: "12".into(), ..Default::default() },
            ],
            ..Default::default()
        };
        let rows = s.table_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][1], "PRLV EDF");
    }

    #[test]
    fn amount_total_skips_unparseable() {
        let s = ParsedStatement {
            transactions: vec![
                StatementTransaction { amount: "-54.20".into(), ..Default::default() },
                StatementTransaction { amount: "12,50".into(), ..Default::default() },
                StatementTransaction { amount: "n/a".into(), ..Default::default() },
            ],
            ..Default::default()
        };
        assert_eq!(s.amount_total().unwrap().to_string(), "-41.70");
        assert_eq!(ParsedStatement::default().amount_total(), None);
    }
}
