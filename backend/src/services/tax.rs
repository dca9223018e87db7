//! Tax rate registry service
//!
//! Rates are append-only. Resolution picks the active row with the latest
//! effective date on or before the requested day; same-day rows resolve to
//! the most recently appended one.

use std::sync::Arc;

use chrono::NaiveDate;
use shared::{AddTaxRateInput, TaxRate, TaxRateRegistry};

use crate::error::AppResult;
use crate::store::ProcurementStore;

#[derive(Clone)]
pub struct TaxService {
    store: Arc<dyn ProcurementStore>,
}

impl TaxService {
    pub fn new(store: Arc<dyn ProcurementStore>) -> Self {
        Self { store }
    }

    pub async fn add_rate(&self, input: AddTaxRateInput) -> AppResult<TaxRate> {
        let rate = self.store.append_tax_rate(TaxRate::create(input)?).await?;
        tracing::info!(
            code = %rate.code,
            rate_percent = %rate.rate_percent,
            effective_date = %rate.effective_date,
            is_active = rate.is_active,
            "Tax rate added"
        );
        Ok(rate)
    }

    /// Full history ordered by code then effective date
    pub async fn list_rates(&self) -> AppResult<Vec<TaxRate>> {
        Ok(self.registry().await?.list())
    }

    pub async fn resolve(&self, code: &str, as_of: NaiveDate) -> AppResult<TaxRate> {
        let registry = self.registry().await?;
        let rate = registry.resolve(code, as_of)?.clone();
        tracing::debug!(code = %rate.code, %as_of, rate_percent = %rate.rate_percent, "Tax rate resolved");
        Ok(rate)
    }

    /// Like [`Self::resolve`] but a missing rate is `None`
    pub async fn try_resolve(&self, code: &str, as_of: NaiveDate) -> AppResult<Option<TaxRate>> {
        let registry = self.registry().await?;
        Ok(registry.resolve(code, as_of).ok().cloned())
    }

    async fn registry(&self) -> AppResult<TaxRateRegistry> {
        Ok(TaxRateRegistry::from_rates(self.store.tax_rates().await?))
    }
}
