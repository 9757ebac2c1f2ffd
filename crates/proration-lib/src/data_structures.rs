use crate::error::{BillingError, BillingResult};
use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// A calendar month, written as `YYYY-MM`.
///
/// Both boundary days are resolved at construction, so a `YearMonth` that
/// exists is always a valid month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    first_day: NaiveDate,
    last_day: NaiveDate,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> BillingResult<Self> {
        let out_of_range = || BillingError::MonthOutOfRange { year, month };

        let first_day = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(out_of_range)?;
        let last_day = first_day
            .checked_add_months(Months::new(1))
            .and_then(|next_month| next_month.pred_opt())
            .ok_or_else(out_of_range)?;

        Ok(Self {
            first_day,
            last_day,
        })
    }

    pub fn year(&self) -> i32 {
        self.first_day.year()
    }

    pub fn month(&self) -> u32 {
        self.first_day.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first_day
    }

    pub fn last_day(&self) -> NaiveDate {
        self.last_day
    }

    pub fn days_in_month(&self) -> u32 {
        self.last_day.day()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first_day <= date && date <= self.last_day
    }
}

impl FromStr for YearMonth {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BillingError::InvalidMonthFormat(s.to_string());

        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if year.len() != 4 || month.len() != 2 || !all_digits(year) || !all_digits(month) {
            return Err(invalid());
        }

        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;

        Self::new(year, month)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = BillingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    id: u64,
    customer_id: u64,
    /// Full-month price for one active user.
    monthly_price_in_cents: u64,
}

impl Subscription {
    pub fn new(id: u64, customer_id: u64, monthly_price_in_cents: u64) -> Self {
        Self {
            id,
            customer_id,
            monthly_price_in_cents,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn customer_id(&self) -> u64 {
        self.customer_id
    }

    pub fn monthly_price_in_cents(&self) -> u64 {
        self.monthly_price_in_cents
    }
}

/// Reads a calendar date (`2022-04-05`) or an RFC 3339 timestamp, keeping
/// only the UTC calendar day of the latter.
pub fn parse_calendar_day(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).date_naive())
    })
}

fn deserialize_calendar_day<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    parse_calendar_day(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("Failed to parse date: {}", value)))
}

fn deserialize_optional_calendar_day<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(value) => parse_calendar_day(&value)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("Failed to parse date: {}", value))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    id: u64,
    #[serde(default)]
    name: String,
    customer_id: u64,
    #[serde(deserialize_with = "deserialize_calendar_day")]
    activated_on: NaiveDate,
    /// Last billable day, inclusive. `None` while the user is still active.
    #[serde(default, deserialize_with = "deserialize_optional_calendar_day")]
    deactivated_on: Option<NaiveDate>,
}

impl User {
    pub fn new(
        id: u64,
        name: impl Into<String>,
        customer_id: u64,
        activated_on: NaiveDate,
        deactivated_on: Option<NaiveDate>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            customer_id,
            activated_on,
            deactivated_on,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn customer_id(&self) -> u64 {
        self.customer_id
    }

    pub fn activated_on(&self) -> NaiveDate {
        self.activated_on
    }

    pub fn deactivated_on(&self) -> Option<NaiveDate> {
        self.deactivated_on
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCharge {
    user_id: u64,
    active_days: u32,
    amount_in_cents: u64,
}

impl UserCharge {
    pub fn new(user_id: u64, active_days: u32, amount_in_cents: u64) -> Self {
        Self {
            user_id,
            active_days,
            amount_in_cents,
        }
    }

    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    pub fn active_days(&self) -> u32 {
        self.active_days
    }

    pub fn amount_in_cents(&self) -> u64 {
        self.amount_in_cents
    }
}

/// Per-user line items of one month's charge. The total is kept in step with
/// the lines as they are added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeBreakdown {
    month: YearMonth,
    daily_rate_in_cents: u64,
    lines: Vec<UserCharge>,
    total_in_cents: u64,
}

impl ChargeBreakdown {
    pub fn new(month: YearMonth, daily_rate_in_cents: u64) -> Self {
        Self {
            month,
            daily_rate_in_cents,
            lines: Vec::new(),
            total_in_cents: 0,
        }
    }

    pub fn add_line(&mut self, line: UserCharge) {
        self.total_in_cents = self.total_in_cents.saturating_add(line.amount_in_cents);
        self.lines.push(line);
    }

    pub fn month(&self) -> YearMonth {
        self.month
    }

    pub fn daily_rate_in_cents(&self) -> u64 {
        self.daily_rate_in_cents
    }

    pub fn lines(&self) -> &[UserCharge] {
        &self.lines
    }

    pub fn total_in_cents(&self) -> u64 {
        self.total_in_cents
    }

    pub fn total_active_days(&self) -> u64 {
        self.lines.iter().map(|line| line.active_days as u64).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Everything one charge computation needs, as handed over by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingRequest {
    month: YearMonth,
    subscription: Option<Subscription>,
    users: Vec<User>,
}

impl BillingRequest {
    pub fn new(month: YearMonth, subscription: Option<Subscription>, users: Vec<User>) -> Self {
        Self {
            month,
            subscription,
            users,
        }
    }

    pub fn with_month(mut self, month: YearMonth) -> Self {
        self.month = month;
        self
    }

    pub fn with_users(mut self, users: Vec<User>) -> Self {
        self.users = users;
        self
    }

    pub fn month(&self) -> YearMonth {
        self.month
    }

    pub fn subscription(&self) -> Option<&Subscription> {
        self.subscription.as_ref()
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }
}
