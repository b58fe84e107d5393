//! Stateless validation of ledger records.

use crate::amount::Amount;
use crate::chunk::LedgerToEntries;
use crate::error::{LedgerError, LedgerResult};
use crate::model::{
    BucketBalance, Ledger, LedgerBucketAmount, LedgerClass, LedgerClassType, LedgerEntry, LedgerKey,
};

pub const MAX_LEN_KEY_ID: usize = 128;
pub const MAX_LEN_LEDGER_CLASS_ID: usize = 50;
pub const MAX_LEN_CORRELATION_ID: usize = 50;
pub const MAX_LEN_CODE: usize = 50;
pub const MAX_LEN_DESCRIPTION: usize = 100;
pub const MAX_LEN_DENOM: usize = 128;
pub const MAX_LEN_ADDRESS: usize = 256;

/// Exclusive upper bound on entry sequence numbers, applied on every path.
pub const MAX_ENTRY_SEQUENCE: u32 = 299;

/// Interest rates are scaled so that 100_000_000 is 100%.
pub const MAX_INTEREST_RATE: i32 = 100_000_000;

fn len_check(field: &str, value: &str, min: usize, max: usize) -> LedgerResult<()> {
    let len = value.chars().count();
    if len < min || len > max {
        if min == max {
            return Err(LedgerError::invalid_field(
                field,
                format!("must be exactly {} characters", min),
            ));
        }
        return Err(LedgerError::invalid_field(
            field,
            format!("must be between {} and {} characters", min, max),
        ));
    }
    Ok(())
}

fn no_null_byte(field: &str, value: &str) -> LedgerResult<()> {
    if value.contains('\0') {
        return Err(LedgerError::invalid_field(field, "must not contain a null byte"));
    }
    Ok(())
}

fn alnum_dash(field: &str, value: &str) -> LedgerResult<()> {
    if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(LedgerError::invalid_field(
            field,
            "must only contain alphanumeric and dashes",
        ));
    }
    Ok(())
}

pub fn validate_sequence(sequence: u32) -> LedgerResult<()> {
    if sequence >= MAX_ENTRY_SEQUENCE {
        return Err(LedgerError::invalid_field(
            "sequence",
            format!("must be less than {}", MAX_ENTRY_SEQUENCE),
        ));
    }
    Ok(())
}

/// `total_amt` must equal the absolute value of the applied amounts' sum.
pub fn validate_entry_amounts(total: Amount, applied: &[LedgerBucketAmount]) -> LedgerResult<()> {
    let sum = applied
        .iter()
        .try_fold(Amount::ZERO, |acc, a| acc.checked_add(a.applied_amt))
        .ok_or_else(|| LedgerError::invalid_field("applied_amounts", "sum overflows"))?;
    if sum.abs() != total {
        return Err(LedgerError::invalid_field(
            "total_amt",
            format!(
                "must equal abs(sum of applied amounts): total {} != abs({})",
                total, sum
            ),
        ));
    }
    Ok(())
}

/// Checks used by the balance-correction path.
pub fn validate_ledger_entry_amounts(
    total: Amount,
    applied: &[LedgerBucketAmount],
    balances: &[BucketBalance],
) -> LedgerResult<()> {
    if total.is_negative() {
        return Err(LedgerError::invalid_field(
            "total_amt",
            "must be a non-negative integer",
        ));
    }
    for (i, a) in applied.iter().enumerate() {
        a.validate()
            .map_err(|e| e.within(&format!("applied_amounts[{}]", i)))?;
    }
    for (i, b) in balances.iter().enumerate() {
        b.validate()
            .map_err(|e| e.within(&format!("balance_amounts[{}]", i)))?;
    }
    validate_entry_amounts(total, applied)
}

impl LedgerKey {
    pub fn validate(&self) -> LedgerResult<()> {
        no_null_byte("nft_id", &self.nft_id)?;
        len_check("nft_id", &self.nft_id, 1, MAX_LEN_KEY_ID)?;
        len_check("asset_class_id", &self.asset_class_id, 1, MAX_LEN_KEY_ID)?;
        no_null_byte("asset_class_id", &self.asset_class_id)?;
        Ok(())
    }
}

impl Ledger {
    pub fn validate(&self) -> LedgerResult<()> {
        let key = self.key.as_ref().ok_or_else(|| LedgerError::missing_field("key"))?;
        key.validate()?;
        len_check("ledger_class_id", &self.ledger_class_id, 1, MAX_LEN_LEDGER_CLASS_ID)?;
        if self.status_type_id <= 0 {
            return Err(LedgerError::invalid_field(
                "status_type_id",
                "must be a positive integer",
            ));
        }
        if self.next_pmt_date < 0 {
            return Err(LedgerError::invalid_field(
                "next_pmt_date",
                "must be after 1970-01-01",
            ));
        }
        if self.next_pmt_amt.is_negative() {
            return Err(LedgerError::invalid_field(
                "next_pmt_amt",
                "must be a non-negative integer",
            ));
        }
        if !(0..=MAX_INTEREST_RATE).contains(&self.interest_rate) {
            return Err(LedgerError::invalid_field(
                "interest_rate",
                format!("must be between 0 and {}", MAX_INTEREST_RATE),
            ));
        }
        if self.maturity_date < 0 {
            return Err(LedgerError::invalid_field(
                "maturity_date",
                "must be after 1970-01-01",
            ));
        }
        Ok(())
    }
}

impl LedgerEntry {
    pub fn validate(&self) -> LedgerResult<()> {
        len_check("correlation_id", &self.correlation_id, 1, MAX_LEN_CORRELATION_ID)?;
        if !self.reverses_correlation_id.is_empty() {
            len_check(
                "reverses_correlation_id",
                &self.reverses_correlation_id,
                1,
                MAX_LEN_CORRELATION_ID,
            )?;
        }
        validate_sequence(self.sequence)?;
        if self.entry_type_id <= 0 {
            return Err(LedgerError::invalid_field(
                "entry_type_id",
                "must be a positive integer",
            ));
        }
        if self.posted_date <= 0 {
            return Err(LedgerError::invalid_field("posted_date", "must be a valid integer"));
        }
        if self.effective_date <= 0 {
            return Err(LedgerError::invalid_field(
                "effective_date",
                "must be a valid integer",
            ));
        }
        if self.total_amt.is_negative() {
            return Err(LedgerError::invalid_field(
                "total_amt",
                "must be a non-negative integer",
            ));
        }
        if !self.total_amt.is_zero() && self.applied_amounts.is_empty() {
            return Err(LedgerError::invalid_field("applied_amounts", "cannot be empty"));
        }
        validate_ledger_entry_amounts(self.total_amt, &self.applied_amounts, &self.balance_amounts)
    }
}

impl LedgerBucketAmount {
    pub fn validate(&self) -> LedgerResult<()> {
        if self.bucket_type_id <= 0 {
            return Err(LedgerError::invalid_field(
                "bucket_type_id",
                "must be a positive integer",
            ));
        }
        Ok(())
    }
}

impl BucketBalance {
    pub fn validate(&self) -> LedgerResult<()> {
        if self.bucket_type_id <= 0 {
            return Err(LedgerError::invalid_field(
                "bucket_type_id",
                "must be a positive integer",
            ));
        }
        Ok(())
    }
}

impl LedgerClass {
    pub fn validate(&self) -> LedgerResult<()> {
        len_check("ledger_class_id", &self.ledger_class_id, 1, MAX_LEN_LEDGER_CLASS_ID)?;
        alnum_dash("ledger_class_id", &self.ledger_class_id)?;
        len_check("asset_class_id", &self.asset_class_id, 1, MAX_LEN_KEY_ID)?;
        alnum_dash("asset_class_id", &self.asset_class_id)?;
        len_check("denom", &self.denom, 3, MAX_LEN_DENOM)?;
        let mut chars = self.denom.chars();
        let valid_denom = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '/');
        if !valid_denom {
            return Err(LedgerError::invalid_field(
                "denom",
                "must be a valid coin denomination",
            ));
        }
        len_check("maintainer_address", &self.maintainer_address, 1, MAX_LEN_ADDRESS)?;
        Ok(())
    }
}

impl LedgerClassType {
    pub fn validate(&self) -> LedgerResult<()> {
        if self.id < 0 {
            return Err(LedgerError::invalid_field("id", "must be a non-negative integer"));
        }
        len_check("code", &self.code, 1, MAX_LEN_CODE)?;
        len_check("description", &self.description, 1, MAX_LEN_DESCRIPTION)?;
        Ok(())
    }
}

impl LedgerToEntries {
    /// Full validation of a record before it is applied: the key, the ledger
    /// (whose key must match the record's when given) and every entry.
    pub fn validate(&self) -> LedgerResult<()> {
        self.ledger_key
            .validate()
            .map_err(|e| e.within("ledger_key"))?;
        if let Some(ledger) = &self.ledger {
            if let Some(key) = &ledger.key {
                if key != &self.ledger_key {
                    return Err(LedgerError::invalid_field(
                        "ledger_key, ledger.key",
                        "must be the same value",
                    ));
                }
            }
            let mut ledger = ledger.clone();
            ledger.key = Some(self.ledger_key.clone());
            ledger.validate().map_err(|e| e.within("ledger"))?;
        }
        for (i, entry) in self.entries.iter().enumerate() {
            entry
                .validate()
                .map_err(|e| e.within(&format!("entries[{}]", i)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_entry() -> LedgerEntry {
        LedgerEntry {
            correlation_id: "corr-1".to_string(),
            sequence: 1,
            entry_type_id: 1,
            posted_date: 19000,
            effective_date: 19000,
            total_amt: Amount::new(150),
            applied_amounts: vec![
                LedgerBucketAmount {
                    bucket_type_id: 1,
                    applied_amt: Amount::new(-100),
                },
                LedgerBucketAmount {
                    bucket_type_id: 2,
                    applied_amt: Amount::new(-50),
                },
            ],
            balance_amounts: vec![BucketBalance::new(1, 900i64)],
            ..Default::default()
        }
    }

    fn valid_ledger() -> Ledger {
        Ledger {
            key: Some(LedgerKey::new("asset-1", "nft-1")),
            ledger_class_id: "class-1".to_string(),
            status_type_id: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_ledger_key_rules() {
        assert!(LedgerKey::new("asset", "nft").validate().is_ok());
        assert!(matches!(
            LedgerKey::new("asset", "").validate(),
            Err(LedgerError::InvalidField { field, .. }) if field == "nft_id"
        ));
        assert!(LedgerKey::new("", "nft").validate().is_err());
        assert!(LedgerKey::new("asset", "n\0ft").validate().is_err());
        assert!(LedgerKey::new("a".repeat(129), "nft").validate().is_err());
        assert!(LedgerKey::new("a".repeat(128), "nft").validate().is_ok());
    }

    #[test]
    fn test_entry_amount_invariant() {
        assert!(valid_entry().validate().is_ok());

        let mut e = valid_entry();
        e.total_amt = Amount::new(149);
        assert!(matches!(
            e.validate(),
            Err(LedgerError::InvalidField { field, .. }) if field == "total_amt"
        ));

        let mut e = valid_entry();
        e.applied_amounts.clear();
        assert!(e.validate().is_err());

        let mut e = valid_entry();
        e.total_amt = Amount::ZERO;
        e.applied_amounts.clear();
        assert!(e.validate().is_ok());
    }

    #[test]
    fn test_entry_field_rules() {
        let mut e = valid_entry();
        e.sequence = MAX_ENTRY_SEQUENCE;
        assert!(e.validate().is_err());
        e.sequence = MAX_ENTRY_SEQUENCE - 1;
        assert!(e.validate().is_ok());

        let mut e = valid_entry();
        e.correlation_id = "x".repeat(51);
        assert!(e.validate().is_err());

        let mut e = valid_entry();
        e.entry_type_id = 0;
        assert!(e.validate().is_err());

        let mut e = valid_entry();
        e.effective_date = 0;
        assert!(e.validate().is_err());

        let mut e = valid_entry();
        e.balance_amounts.push(BucketBalance::new(0, 1i64));
        assert!(matches!(
            e.validate(),
            Err(LedgerError::InvalidField { field, .. }) if field == "balance_amounts[1].bucket_type_id"
        ));
    }

    #[test]
    fn test_ledger_rules() {
        assert!(valid_ledger().validate().is_ok());

        let mut l = valid_ledger();
        l.key = None;
        assert_eq!(l.validate(), Err(LedgerError::missing_field("key")));

        let mut l = valid_ledger();
        l.status_type_id = 0;
        assert!(l.validate().is_err());

        let mut l = valid_ledger();
        l.interest_rate = MAX_INTEREST_RATE + 1;
        assert!(l.validate().is_err());

        let mut l = valid_ledger();
        l.next_pmt_amt = Amount::new(-1);
        assert!(l.validate().is_err());
    }

    #[test]
    fn test_record_key_mismatch() {
        let record = LedgerToEntries::new(
            LedgerKey::new("asset-1", "nft-2"),
            Some(valid_ledger()),
            vec![valid_entry()],
        );
        assert!(matches!(
            record.validate(),
            Err(LedgerError::InvalidField { field, .. }) if field == "ledger_key, ledger.key"
        ));

        let mut ledger = valid_ledger();
        ledger.key = None;
        let record = LedgerToEntries::new(
            LedgerKey::new("asset-1", "nft-2"),
            Some(ledger),
            vec![valid_entry()],
        );
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_ledger_class_rules() {
        let class = LedgerClass {
            ledger_class_id: "class-1".to_string(),
            asset_class_id: "asset-1".to_string(),
            denom: "nhash".to_string(),
            maintainer_address: "maintainer".to_string(),
        };
        assert!(class.validate().is_ok());

        let mut bad = class.clone();
        bad.ledger_class_id = "class_1".to_string();
        assert!(bad.validate().is_err());

        let mut bad = class;
        bad.denom = "1abc".to_string();
        assert!(bad.validate().is_err());
    }
}
