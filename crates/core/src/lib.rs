pub mod cleanup;
pub mod money;
pub mod statement;

pub use cleanup::{clean_description, fix_ocr_digits, parse_statement_date, postprocess};
pub use money::{AmountError, Money};
pub use statement::{
    ParsedStatement, StatementHeader, StatementSummary, StatementTransaction, TABLE_COLUMNS,
};
