use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    account::{AccountNumber, AccountType},
    api::{OpenAccountRequest, TransferRequest},
};

/// Decimal places accepted on any amount.
pub const AMOUNT_SCALE: u32 = 2;
/// Total significant digits accepted on any amount.
pub const AMOUNT_MAX_DIGITS: u32 = 15;

/// Smallest amount that can be transferred.
pub const MIN_TRANSFER_AMOUNT: Decimal = Decimal::from_parts(1, 0, 0, false, AMOUNT_SCALE);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    Transfer,
    OpenAccount,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Amount is required for {action:?}")]
    AmountRequired { action: CommandAction },
    #[error("Amount must be at least {minimum} for {action:?}")]
    AmountTooSmall {
        action: CommandAction,
        minimum: Decimal,
    },
    #[error("Amount must have no more than 2 decimal places")]
    TooManyDecimalPlaces { action: CommandAction },
    #[error("Amount must have no more than 15 digits in total")]
    TooManyDigits { action: CommandAction },
    #[error("Field `{field}` is required")]
    FieldRequired { field: &'static str },
}

/// A transfer that passed format-level validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCommand {
    pub from_account: AccountNumber,
    pub to_account: AccountNumber,
    pub amount: Decimal,
}

impl TransferCommand {
    pub fn parse(request: &TransferRequest) -> Result<Self, CommandError> {
        let from_account = required_account(request.from_account.as_deref(), "from_account")?;
        let to_account = required_account(request.to_account.as_deref(), "to_account")?;
        let amount = parse_amount(
            request.amount,
            CommandAction::Transfer,
            MIN_TRANSFER_AMOUNT,
        )?;
        Ok(Self {
            from_account,
            to_account,
            amount,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAccountCommand {
    pub account_type: AccountType,
    pub initial_deposit: Decimal,
}

impl OpenAccountCommand {
    pub fn parse(request: &OpenAccountRequest) -> Result<Self, CommandError> {
        let account_type = request.account_type.ok_or(CommandError::FieldRequired {
            field: "account_type",
        })?;
        let initial_deposit = parse_amount(
            request.initial_deposit,
            CommandAction::OpenAccount,
            Decimal::ZERO,
        )?;
        Ok(Self {
            account_type,
            initial_deposit,
        })
    }
}

fn required_account(
    value: Option<&str>,
    field: &'static str,
) -> Result<AccountNumber, CommandError> {
    match value.map(str::trim) {
        Some(number) if !number.is_empty() => Ok(AccountNumber::from(number)),
        _ => Err(CommandError::FieldRequired { field }),
    }
}

fn parse_amount(
    amount: Option<Decimal>,
    action: CommandAction,
    minimum: Decimal,
) -> Result<Decimal, CommandError> {
    let Some(amount) = amount else {
        return Err(CommandError::AmountRequired { action });
    };
    if amount.normalize().scale() > AMOUNT_SCALE {
        return Err(CommandError::TooManyDecimalPlaces { action });
    }
    let integer_digits_limit = Decimal::from(10_i64.pow(AMOUNT_MAX_DIGITS - AMOUNT_SCALE));
    if amount.trunc().abs() >= integer_digits_limit {
        return Err(CommandError::TooManyDigits { action });
    }
    if amount < minimum {
        return Err(CommandError::AmountTooSmall { action, minimum });
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn transfer(amount: Option<Decimal>) -> TransferRequest {
        TransferRequest {
            from_account: Some("000000000001".into()),
            to_account: Some("000000000002".into()),
            amount,
        }
    }

    #[test]
    fn parse_transfer() {
        let cmd = TransferCommand::parse(&transfer(Some(dec!(150.00)))).unwrap();
        assert_eq!(cmd.amount, dec!(150.00));
        assert_eq!(cmd.from_account.as_str(), "000000000001");
        assert_eq!(cmd.to_account.as_str(), "000000000002");

        // trailing zeros beyond the scale are fine
        assert!(TransferCommand::parse(&transfer(Some(dec!(1.500)))).is_ok());
        assert_eq!(
            TransferCommand::parse(&transfer(Some(dec!(0.01)))).unwrap().amount,
            MIN_TRANSFER_AMOUNT
        );
    }

    #[test]
    fn reject_bad_transfer_amounts() {
        assert_eq!(
            TransferCommand::parse(&transfer(None)).unwrap_err(),
            CommandError::AmountRequired {
                action: CommandAction::Transfer
            }
        );
        assert!(matches!(
            TransferCommand::parse(&transfer(Some(dec!(0)))).unwrap_err(),
            CommandError::AmountTooSmall { .. }
        ));
        assert!(matches!(
            TransferCommand::parse(&transfer(Some(dec!(-5.00)))).unwrap_err(),
            CommandError::AmountTooSmall { .. }
        ));
        assert_eq!(
            TransferCommand::parse(&transfer(Some(dec!(1.005)))).unwrap_err(),
            CommandError::TooManyDecimalPlaces {
                action: CommandAction::Transfer
            }
        );
        assert_eq!(
            TransferCommand::parse(&transfer(Some(dec!(10000000000000.00)))).unwrap_err(),
            CommandError::TooManyDigits {
                action: CommandAction::Transfer
            }
        );
        assert!(TransferCommand::parse(&transfer(Some(dec!(9999999999999.99)))).is_ok());
    }

    #[test]
    fn reject_missing_accounts() {
        let request = TransferRequest {
            from_account: Some("  ".into()),
            ..transfer(Some(dec!(1)))
        };
        assert_eq!(
            TransferCommand::parse(&request).unwrap_err(),
            CommandError::FieldRequired {
                field: "from_account"
            }
        );
        let request = TransferRequest {
            to_account: None,
            ..transfer(Some(dec!(1)))
        };
        assert_eq!(
            TransferCommand::parse(&request).unwrap_err(),
            CommandError::FieldRequired { field: "to_account" }
        );
    }

    #[test]
    fn parse_open_account() {
        let cmd = OpenAccountCommand::parse(&OpenAccountRequest {
            account_type: Some(AccountType::Current),
            initial_deposit: Some(dec!(0)),
        })
        .unwrap();
        assert_eq!(cmd.account_type, AccountType::Current);
        assert_eq!(cmd.initial_deposit, dec!(0));

        let err = OpenAccountCommand::parse(&OpenAccountRequest {
            account_type: None,
            initial_deposit: Some(dec!(10)),
        })
        .unwrap_err();
        assert_eq!(
            err,
            CommandError::FieldRequired {
                field: "account_type"
            }
        );

        let err = OpenAccountCommand::parse(&OpenAccountRequest {
            account_type: Some(AccountType::Savings),
            initial_deposit: Some(dec!(-1)),
        })
        .unwrap_err();
        assert!(matches!(err, CommandError::AmountTooSmall { .. }));
        assert_eq!(
            err.to_string(),
            "Amount must be at least 0 for OpenAccount"
        );
    }
}
