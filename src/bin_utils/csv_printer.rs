use std::io::Write;

use anyhow::Context;
use csv::Writer;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    access::UserId,
    account::{AccountNumber, AccountType},
};

#[derive(Debug, Serialize)]
pub struct AccountRow {
    pub label: String,
    pub account_number: AccountNumber,
    pub owner: UserId,
    pub account_type: AccountType,
    pub balance: Decimal,
}

pub fn print_accounts<W>(
    output: &mut W,
    rows: impl IntoIterator<Item = AccountRow>,
) -> anyhow::Result<()>
where
    W: Write,
{
    let mut writer = Writer::from_writer(output);
    for row in rows {
        writer
            .serialize(&row)
            .with_context(|| format!("Failed to write account `{}` as CSV", row.label))?;
    }
    writer.flush().context("Failed to flush CSV writer")
}
