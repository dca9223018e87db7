//! Versioned tax rates and point-in-time resolution

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{DomainError, DomainResult};
use crate::types::{default_true, deserialize_flag};
use crate::validation::{clean_optional, clean_required, not_blank, validate_non_negative};

/// A dated tax rate row. Rows are append-only; several may share a code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaxRate {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub rate_percent: Decimal,
    pub effective_date: NaiveDate,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for appending a tax rate
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddTaxRateInput {
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub code: String,
    pub name: Option<String>,
    pub rate_percent: Decimal,
    pub effective_date: NaiveDate,
    #[serde(default = "default_true", deserialize_with = "deserialize_flag")]
    pub is_active: bool,
}

impl TaxRate {
    pub fn create(input: AddTaxRateInput) -> DomainResult<Self> {
        input.validate()?;
        validate_non_negative("rate_percent", input.rate_percent)?;

        let code = clean_required(&input.code);
        let name = clean_optional(input.name).unwrap_or_else(|| code.clone());

        Ok(Self {
            id: Uuid::new_v4(),
            code,
            name,
            rate_percent: input.rate_percent,
            effective_date: input.effective_date,
            is_active: input.is_active,
            created_at: Utc::now(),
        })
    }
}

/// Picks the active row for `code` with the latest `effective_date` on or
/// before `as_of`.
///
/// `rates` must be in append order: when two rows share an effective date the
/// later one wins, so resolution is deterministic for identical state.
pub fn resolve_rate<'a, I>(rates: I, code: &str, as_of: NaiveDate) -> Option<&'a TaxRate>
where
    I: IntoIterator<Item = &'a TaxRate>,
{
    let code = code.trim();
    rates
        .into_iter()
        .filter(|r| r.is_active && r.code == code && r.effective_date <= as_of)
        // max_by_key keeps the last of equal maxima
        .max_by_key(|r| r.effective_date)
}

/// In-memory tax rate history
#[derive(Debug, Clone, Default)]
pub struct TaxRateRegistry {
    rates: Vec<TaxRate>,
}

impl TaxRateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from rows already in append order
    pub fn from_rates(rates: Vec<TaxRate>) -> Self {
        Self { rates }
    }

    pub fn add_rate(&mut self, input: AddTaxRateInput) -> DomainResult<&TaxRate> {
        let rate = TaxRate::create(input)?;
        self.push(rate);
        Ok(&self.rates[self.rates.len() - 1])
    }

    /// Appends a row that has already been validated
    pub fn push(&mut self, rate: TaxRate) {
        self.rates.push(rate);
    }

    pub fn resolve(&self, code: &str, as_of: NaiveDate) -> DomainResult<&TaxRate> {
        resolve_rate(&self.rates, code, as_of).ok_or_else(|| {
            DomainError::not_found("Tax rate", format!("{} as of {}", code.trim(), as_of))
        })
    }

    /// Full history ordered by code then effective date
    pub fn list(&self) -> Vec<TaxRate> {
        let mut rates = self.rates.clone();
        rates.sort_by(|a, b| {
            a.code
                .cmp(&b.code)
                .then(a.effective_date.cmp(&b.effective_date))
        });
        rates
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}
