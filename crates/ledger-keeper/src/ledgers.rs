//! Ledger lifecycle: create, update in place, destroy, read.

use tracing::info;

use ledger_types::{
    Amount, DayCountConvention, InterestAccrualMethod, Ledger, LedgerError, LedgerKey,
    LedgerResult, PaymentFrequency,
};

use crate::events::{LedgerEvent, UpdateType};
use crate::keeper::Keeper;
use crate::keys::{self, ClassTypeKind};
use crate::store::{get_json, scan_json, set_json};

impl Keeper {
    pub fn add_ledger(&self, ledger: Ledger) -> LedgerResult<()> {
        ledger.validate()?;
        let key = ledger
            .key
            .clone()
            .ok_or_else(|| LedgerError::missing_field("key"))?;

        if self.has_ledger(&key)? {
            return Err(LedgerError::already_exists("ledger"));
        }

        let class = self.require_get_ledger_class(&ledger.ledger_class_id)?;
        if class.asset_class_id != key.asset_class_id {
            return Err(LedgerError::invalid_field(
                "ledger class",
                "ledger class not allowed for asset class id",
            ));
        }

        if !self.registry.has_nft(&key)? {
            return Err(LedgerError::not_found("nft"));
        }

        if !self.has_class_type(ClassTypeKind::Status, &ledger.ledger_class_id, ledger.status_type_id)? {
            return Err(LedgerError::invalid_field(
                "status_type_id",
                "status type doesn't exist",
            ));
        }

        self.put_ledger(&key, ledger)?;
        info!(ledger = %key, "ledger created");
        self.emit(LedgerEvent::LedgerCreated { key });
        Ok(())
    }

    pub fn update_ledger_status(&self, key: &LedgerKey, status_type_id: i32) -> LedgerResult<()> {
        let mut ledger = self.require_get_ledger(key)?;
        if !self.has_class_type(ClassTypeKind::Status, &ledger.ledger_class_id, status_type_id)? {
            return Err(LedgerError::invalid_field(
                "status_type_id",
                "status type doesn't exist",
            ));
        }
        ledger.status_type_id = status_type_id;
        self.save_update(key, ledger, UpdateType::Status)
    }

    pub fn update_ledger_interest_rate(
        &self,
        key: &LedgerKey,
        interest_rate: i32,
        day_count_convention: DayCountConvention,
        accrual_method: InterestAccrualMethod,
    ) -> LedgerResult<()> {
        let mut ledger = self.require_get_ledger(key)?;
        ledger.interest_rate = interest_rate;
        ledger.interest_day_count_convention = day_count_convention;
        ledger.interest_accrual_method = accrual_method;
        self.save_update(key, ledger, UpdateType::InterestRate)
    }

    pub fn update_ledger_payment(
        &self,
        key: &LedgerKey,
        next_pmt_amt: Amount,
        next_pmt_date: i32,
        payment_frequency: PaymentFrequency,
    ) -> LedgerResult<()> {
        let mut ledger = self.require_get_ledger(key)?;
        ledger.next_pmt_amt = next_pmt_amt;
        ledger.next_pmt_date = next_pmt_date;
        ledger.payment_frequency = payment_frequency;
        self.save_update(key, ledger, UpdateType::Payment)
    }

    pub fn update_ledger_maturity_date(&self, key: &LedgerKey, maturity_date: i32) -> LedgerResult<()> {
        let mut ledger = self.require_get_ledger(key)?;
        ledger.maturity_date = maturity_date;
        self.save_update(key, ledger, UpdateType::MaturityDate)
    }

    /// Remove a ledger and all of its entries.
    pub fn destroy_ledger(&self, key: &LedgerKey) -> LedgerResult<()> {
        if !self.has_ledger(key)? {
            return Err(LedgerError::not_found("ledger"));
        }
        self.store.delete(&keys::ledger_key(key))?;

        let entries = self.store.iterate_prefix(&keys::entries_prefix(key))?;
        let removed = entries.len();
        for (entry_key, _) in entries {
            self.store.delete(&entry_key)?;
        }

        info!(ledger = %key, entries = removed, "ledger destroyed");
        self.emit(LedgerEvent::LedgerDestroyed { key: key.clone() });
        Ok(())
    }

    pub fn get_ledger(&self, key: &LedgerKey) -> LedgerResult<Option<Ledger>> {
        let stored: Option<Ledger> = get_json(self.store.as_ref(), &keys::ledger_key(key))?;
        Ok(stored.map(|mut ledger| {
            ledger.key = Some(key.clone());
            ledger
        }))
    }

    pub fn require_get_ledger(&self, key: &LedgerKey) -> LedgerResult<Ledger> {
        self.get_ledger(key)?
            .ok_or_else(|| LedgerError::not_found("ledger"))
    }

    pub fn has_ledger(&self, key: &LedgerKey) -> LedgerResult<bool> {
        self.store.has(&keys::ledger_key(key))
    }

    /// Every ledger, key populated, in store order.
    pub fn get_all_ledgers(&self) -> LedgerResult<Vec<Ledger>> {
        scan_json::<Ledger>(self.store.as_ref(), &keys::ledger_prefix())?
            .into_iter()
            .map(|(raw, mut ledger)| {
                let key = keys::decode_ledger_key(&raw)
                    .ok_or_else(|| LedgerError::internal("invalid ledger store key"))?;
                ledger.key = Some(key);
                Ok(ledger)
            })
            .collect()
    }

    /// Ledgers are stored without their key; it is the store key.
    pub(crate) fn put_ledger(&self, key: &LedgerKey, mut ledger: Ledger) -> LedgerResult<()> {
        ledger.key = None;
        set_json(self.store.as_ref(), &keys::ledger_key(key), &ledger)
    }

    fn save_update(&self, key: &LedgerKey, ledger: Ledger, update_type: UpdateType) -> LedgerResult<()> {
        ledger.validate()?;
        self.put_ledger(key, ledger)?;
        self.emit(LedgerEvent::LedgerUpdated {
            key: key.clone(),
            update_type,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::events::{LedgerEvent, UpdateType};
    use crate::keeper::test_support::*;
    use anyhow::Result;
    use ledger_types::{
        Amount, DayCountConvention, InterestAccrualMethod, LedgerError, LedgerKey, PaymentFrequency,
    };

    #[test]
    fn test_add_and_get_ledger() -> Result<()> {
        let f = fixture();
        let key = f.with_ledger("nft-1");

        let ledger = f.keeper.require_get_ledger(&key)?;
        assert_eq!(ledger.key.as_ref(), Some(&key));
        assert_eq!(ledger.status_type_id, 1);
        assert_eq!(f.keeper.get_all_ledgers()?.len(), 1);
        assert_eq!(f.events.take(), vec![LedgerEvent::LedgerCreated { key }]);
        Ok(())
    }

    #[test]
    fn test_add_ledger_rejections() -> Result<()> {
        let f = fixture();
        f.with_ledger("nft-1");
        assert_eq!(
            f.keeper.add_ledger(ledger_for("nft-1")),
            Err(LedgerError::already_exists("ledger"))
        );

        // no NFT minted
        assert_eq!(
            f.keeper.add_ledger(ledger_for("nft-2")),
            Err(LedgerError::not_found("nft"))
        );

        f.registry
            .set_nft_owner(LedgerKey::new("asset-1", "nft-3"), OWNER);
        let mut bad_status = ledger_for("nft-3");
        bad_status.status_type_id = 9;
        assert!(matches!(
            f.keeper.add_ledger(bad_status),
            Err(LedgerError::InvalidField { field, .. }) if field == "status_type_id"
        ));

        let mut unknown_class = ledger_for("nft-3");
        unknown_class.ledger_class_id = "class-9".to_string();
        assert_eq!(
            f.keeper.add_ledger(unknown_class),
            Err(LedgerError::not_found("ledger class"))
        );

        f.registry.set_nft_owner(LedgerKey::new("asset-2", "nft-4"), OWNER);
        let mut wrong_asset = ledger_for("nft-4");
        wrong_asset.key = Some(LedgerKey::new("asset-2", "nft-4"));
        assert!(matches!(
            f.keeper.add_ledger(wrong_asset),
            Err(LedgerError::InvalidField { field, .. }) if field == "ledger class"
        ));
        Ok(())
    }

    #[test]
    fn test_updates_emit_events() -> Result<()> {
        let f = fixture();
        let key = f.with_ledger("nft-1");
        f.events.take();

        f.keeper.update_ledger_status(&key, 2)?;
        f.keeper.update_ledger_interest_rate(
            &key,
            5_250_000,
            DayCountConvention::Actual360,
            InterestAccrualMethod::SimpleInterest,
        )?;
        f.keeper
            .update_ledger_payment(&key, Amount::new(1_000), 20_030, PaymentFrequency::Monthly)?;
        f.keeper.update_ledger_maturity_date(&key, 30_000)?;

        let ledger = f.keeper.require_get_ledger(&key)?;
        assert_eq!(ledger.status_type_id, 2);
        assert_eq!(ledger.interest_rate, 5_250_000);
        assert_eq!(ledger.interest_day_count_convention, DayCountConvention::Actual360);
        assert_eq!(ledger.next_pmt_amt, Amount::new(1_000));
        assert_eq!(ledger.payment_frequency, PaymentFrequency::Monthly);
        assert_eq!(ledger.maturity_date, 30_000);

        let updates: Vec<UpdateType> = f
            .events
            .take()
            .into_iter()
            .filter_map(|e| match e {
                LedgerEvent::LedgerUpdated { update_type, .. } => Some(update_type),
                _ => None,
            })
            .collect();
        assert_eq!(
            updates,
            vec![
                UpdateType::Status,
                UpdateType::InterestRate,
                UpdateType::Payment,
                UpdateType::MaturityDate
            ]
        );

        assert!(f.keeper.update_ledger_status(&key, 7).is_err());
        assert!(f
            .keeper
            .update_ledger_interest_rate(
                &key,
                -1,
                DayCountConvention::Actual360,
                InterestAccrualMethod::SimpleInterest
            )
            .is_err());
        assert_eq!(f.keeper.require_get_ledger(&key)?.status_type_id, 2);
        Ok(())
    }

    #[test]
    fn test_destroy_removes_entries() -> Result<()> {
        let f = fixture();
        let key = f.with_ledger("nft-1");
        let sibling = f.with_ledger("nft-10");
        f.keeper.append_entries(&key, &[entry("c1", 1, 19_000)])?;
        f.keeper.append_entries(&sibling, &[entry("c1", 1, 19_000)])?;

        f.keeper.destroy_ledger(&key)?;
        assert!(!f.keeper.has_ledger(&key)?);
        assert!(f.keeper.list_ledger_entries(&key)?.is_empty());
        assert_eq!(f.keeper.list_ledger_entries(&sibling)?.len(), 1);
        assert_eq!(
            f.keeper.destroy_ledger(&key),
            Err(LedgerError::not_found("ledger"))
        );
        Ok(())
    }

    fn entry(id: &str, sequence: u32, effective_date: i32) -> ledger_types::LedgerEntry {
        ledger_types::LedgerEntry {
            correlation_id: id.to_string(),
            sequence,
            entry_type_id: 1,
            posted_date: effective_date,
            effective_date,
            ..Default::default()
        }
    }
}
