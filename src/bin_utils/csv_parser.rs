use std::io::Read;

use csv::{DeserializeRecordsIntoIter, Trim};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{
    access::{Role, UserId},
    account::AccountType,
};

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Register,
    Verify,
    Reject,
    Open,
    Transfer,
}

/// One row of a ledger script.
///
/// `user` is the acting user. `account` and `to` are labels; an `open` row
/// binds its label to the generated account number. `subject` is the user
/// under KYC review, `origin` an `X-Forwarded-For` style address list.
#[derive(Debug, Deserialize)]
pub struct Step {
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub user: UserId,
    pub account: Option<String>,
    pub to: Option<String>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub amount: Option<Decimal>,
    pub account_type: Option<AccountType>,
    pub role: Option<Role>,
    pub subject: Option<UserId>,
    pub origin: Option<String>,
}

/// Parses a ledger script in CSV format, yielding each row with its line number.
pub struct CsvStepParser<R> {
    iter: DeserializeRecordsIntoIter<R, Step>,
}

impl<R> CsvStepParser<R>
where
    R: Read,
{
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(source);

        Self {
            iter: reader.into_deserialize(),
        }
    }
}

impl<R> Iterator for CsvStepParser<R>
where
    R: Read,
{
    type Item = (u64, Result<Step, csv::Error>);

    fn next(&mut self) -> Option<Self::Item> {
        let curr_line = self.iter.reader().position().line();
        self.iter.next().map(|row| (curr_line, row))
    }
}
