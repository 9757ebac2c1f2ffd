use crate::data_structures::{Subscription, YearMonth};

/// Rounds `monthly_price_in_cents / days_in_month` to the nearest cent, halves
/// rounding up. Integer arithmetic only, so exact `.5` boundaries are stable.
pub fn daily_rate(monthly_price_in_cents: u64, days_in_month: u32) -> u64 {
    if days_in_month == 0 {
        return 0;
    }

    let price = monthly_price_in_cents as u128;
    let days = days_in_month as u128;
    ((2 * price + days) / (2 * days)) as u64
}

/// The per-day price of a subscription in one month.
///
/// It is rounded once and then shared by every user billed for that month,
/// which keeps charges additive across users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyRate {
    monthly_price_in_cents: u64,
    days_in_month: u32,
    cents: u64,
}

impl DailyRate {
    pub fn new(monthly_price_in_cents: u64, days_in_month: u32) -> Self {
        Self {
            monthly_price_in_cents,
            days_in_month,
            cents: daily_rate(monthly_price_in_cents, days_in_month),
        }
    }

    pub fn for_month(subscription: &Subscription, month: &YearMonth) -> Self {
        Self::new(subscription.monthly_price_in_cents(), month.days_in_month())
    }

    pub fn cents(&self) -> u64 {
        self.cents
    }

    pub fn monthly_price_in_cents(&self) -> u64 {
        self.monthly_price_in_cents
    }

    pub fn days_in_month(&self) -> u32 {
        self.days_in_month
    }

    pub fn charge_for(&self, active_days: u32) -> u64 {
        self.cents.saturating_mul(active_days as u64)
    }

    /// Difference between a full month billed day by day and the list price.
    /// Positive means the rounded rate over-bills a full month.
    pub fn full_month_rounding_error(&self) -> i128 {
        self.charge_for(self.days_in_month) as i128 - self.monthly_price_in_cents as i128
    }
}
