use crate::data_structures::{ChargeBreakdown, Subscription, User, UserCharge, YearMonth};
use crate::error::BillingResult;
use crate::pricing::DailyRate;
use chrono::NaiveDate;
use log::debug;

/// Computes the total charge for `year_month` (`"YYYY-MM"`), in cents.
///
/// Returns `Ok(0)` without a subscription, before `year_month` is even looked
/// at, and `Ok(0)` without users. Otherwise a month string that is not `YYYY-MM`
/// with a month in `01..=12` is rejected.
pub fn monthly_charge(
    year_month: &str,
    subscription: Option<&Subscription>,
    users: &[User],
) -> BillingResult<u64> {
    if subscription.is_none() {
        return Ok(0);
    }

    let month: YearMonth = year_month.parse()?;
    Ok(ProrationCalculator::new().monthly_charge(month, subscription, users))
}

/// Daily-linear proration of a per-user monthly price.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProrationCalculator;

impl ProrationCalculator {
    pub fn new() -> Self {
        Self
    }

    pub fn daily_rate(&self, month: YearMonth, subscription: Option<&Subscription>) -> u64 {
        subscription
            .map(|subscription| DailyRate::for_month(subscription, &month).cents())
            .unwrap_or(0)
    }

    /// The inclusive range of days within `month` on which `user` is billable.
    pub fn active_period(&self, month: YearMonth, user: &User) -> Option<(NaiveDate, NaiveDate)> {
        let active_from = user.activated_on().max(month.first_day());
        let active_until = user
            .deactivated_on()
            .unwrap_or(month.last_day())
            .min(month.last_day());

        if active_from > active_until {
            return None;
        }

        Some((active_from, active_until))
    }

    pub fn active_days(&self, month: YearMonth, user: &User) -> u32 {
        self.active_period(month, user)
            .map(|(from, until)| (until - from).num_days() as u32 + 1)
            .unwrap_or(0)
    }

    pub fn monthly_charge(
        &self,
        month: YearMonth,
        subscription: Option<&Subscription>,
        users: &[User],
    ) -> u64 {
        self.charge_breakdown(month, subscription, users)
            .total_in_cents()
    }

    pub fn charge_breakdown(
        &self,
        month: YearMonth,
        subscription: Option<&Subscription>,
        users: &[User],
    ) -> ChargeBreakdown {
        let Some(subscription) = subscription else {
            return ChargeBreakdown::new(month, 0);
        };

        let rate = DailyRate::for_month(subscription, &month);
        debug!(
            "Daily rate for subscription {} in {}: {}",
            subscription.id(),
            month,
            rate.cents()
        );

        let mut breakdown = ChargeBreakdown::new(month, rate.cents());
        for user in users {
            let active_days = self.active_days(month, user);
            debug!("User {} active days: {}", user.id(), active_days);
            breakdown.add_line(UserCharge::new(
                user.id(),
                active_days,
                rate.charge_for(active_days),
            ));
        }

        debug!("Total charge for {}: {}", month, breakdown.total_in_cents());
        breakdown
    }
}
