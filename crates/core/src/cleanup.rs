use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::money::Money;
use crate::statement::ParsedStatement;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_spaces, r"\s+");

/// Date layouts accepted on statements, day first.
const DATE_FORMATS: [&str; 2] = ["%d/%m/%Y", "%d-%m-%Y"];

/// Undo the usual letter-for-digit confusions in numeric OCR fields.
///
/// `O`/`o` → `0`, `l`/`I` → `1`, `,` → `.`, `|` dropped, then trimmed.
pub fn fix_ocr_digits(s: &str) -> String {
    s.chars()
        .filter_map(|c| match c {
            'O' | 'o' => Some('0'),
            'l' | 'I' => Some('1'),
            ',' => Some('.'),
            '|' => None,
            other => Some(other),
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Drop table rules (`|`) and collapse whitespace runs in free text.
pub fn clean_description(s: &str) -> String {
    re_spaces().replace_all(&s.replace('|', " "), " ").trim().to_string()
}

pub fn parse_statement_date(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s.trim(), fmt).ok())
}

/// Normalise LLM output: fix digits in numeric fields, tidy descriptions and
/// flag transactions whose date or amount does not parse.
pub fn postprocess(mut statement: ParsedStatement) -> ParsedStatement {
    for txn in &mut statement.transactions {
        txn.date = fix_ocr_digits(&txn.date);
        txn.description = clean_description(&txn.description);
        txn.amount = fix_ocr_digits(&txn.amount);
        txn.balance = fix_ocr_digits(&txn.balance);
        txn.date_valid = parse_statement_date(&txn.date).is_some();
        txn.amount_valid = Money::parse_amount(&txn.amount).is_ok();
    }
    statement
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::StatementTransaction;

    #[test]
    fn fix_digits_swaps_lookalikes() {
        assert_eq!(fix_ocr_digits(" 1O4,5O "), "104.50");
        assert_eq!(fix_ocr_digits("l2/I1/2O19"), "12/11/2019");
        assert_eq!(fix_ocr_digits("|54,20|"), "54.20");
    }

    #[test]
    fn description_keeps_letters() {
        assert_eq!(clean_description("PRLV  SEPA | EDF  Clients"), "PRLV SEPA EDF Clients");
    }

    #[test]
    fn dates_accept_slash_and_dash() {
        let expected = NaiveDate::from_ymd_opt(2019, 11, 5).unwrap();
        assert_eq!(parse_statement_date("05/11/2019"), Some(expected));
        assert_eq!(parse_statement_date("05-11-2019"), Some(expected));
        assert_eq!(parse_statement_date("2019-11-05"), None);
        assert_eq!(parse_statement_date("31/02/2019"), None);
    }

    #[test]
    fn postprocess_flags_invalid_rows() {
        let statement = ParsedStatement {
            transactions: vec![
                StatementTransaction {
                    date: "O5/11/2O19".into(),
                    description: "CB  CARREFOUR".into(),
                    amount: "-23,1O".into(),
                    balance: "1 181,23".into(),
                    ..Default::default()
                },
                StatementTransaction {
                    date: "Nov 5".into(),
                    amount: "debit".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let out = postprocess(statement);
        let good = &out.transactions[0];
        assert_eq!(good.date, "05/11/2019");
        assert_eq!(good.amount, "-23.10");
        assert_eq!(good.description, "CB CARREFOUR");
        assert!(good.date_valid && good.amount_valid);

        let bad = &out.transactions[1];
        assert!(!bad.date_valid);
        assert!(!bad.amount_valid);
    }
}
