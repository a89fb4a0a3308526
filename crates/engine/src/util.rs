//! Internal helpers for input validation and normalization.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation so every command enforces the same invariants before touching
//! storage.

use crate::{AccountDetails, ChildAccount, EngineError, ResultEngine};

pub(crate) fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidAccount(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

pub(crate) fn normalize_details(details: AccountDetails) -> ResultEngine<AccountDetails> {
    Ok(AccountDetails {
        name: normalize_required_name(&details.name, "account")?,
        description: normalize_optional_text(details.description.as_deref()),
        color: details.color.trim().to_string(),
        icon: details.icon.trim().to_string(),
        currency: details.currency,
    })
}

pub(crate) fn normalize_child(child: ChildAccount) -> ResultEngine<ChildAccount> {
    Ok(ChildAccount {
        id: child.id,
        name: normalize_required_name(&child.name, "child account")?,
        description: normalize_optional_text(child.description.as_deref()),
        color: child.color.trim().to_string(),
        icon: child.icon.trim().to_string(),
    })
}

pub(crate) fn validate_positive_amount(amount: i64, label: &str) -> ResultEngine<()> {
    if amount <= 0 {
        return Err(EngineError::InvalidAmount(format!("{label} must be > 0")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Currency;

    #[test]
    fn names_are_trimmed_and_required() {
        assert_eq!(
            normalize_required_name("  Checking ", "account"),
            Ok("Checking".to_string())
        );
        assert_eq!(
            normalize_required_name("   ", "account"),
            Err(EngineError::InvalidAccount(
                "account name must not be empty".to_string()
            ))
        );
    }

    #[test]
    fn blank_descriptions_are_dropped() {
        let details = AccountDetails::new("Card", Currency::Eur).description("  ");
        assert_eq!(normalize_details(details).unwrap().description, None);
    }

    #[test]
    fn amounts_must_be_positive() {
        assert_eq!(validate_positive_amount(1, "amount"), Ok(()));
        assert!(validate_positive_amount(0, "amount").is_err());
        assert!(validate_positive_amount(-5, "amount").is_err());
    }
}
