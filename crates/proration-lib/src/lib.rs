pub mod calculator;
pub mod data_structures;
pub mod error;
pub mod ledger;
pub mod loader;
pub mod pricing;

pub use calculator::{monthly_charge, ProrationCalculator};
pub use data_structures::{
    parse_calendar_day, BillingRequest, ChargeBreakdown, Subscription, User, UserCharge,
    YearMonth,
};
pub use error::{BillingError, BillingResult};
pub use ledger::BillingLedger;
pub use loader::InputLoader;
pub use pricing::{daily_rate, DailyRate};

pub use chrono::NaiveDate;

pub mod prelude {
    pub use crate::calculator::{monthly_charge, ProrationCalculator};
    pub use crate::data_structures::{ChargeBreakdown, Subscription, User, YearMonth};
    pub use crate::error::BillingError;
    pub use crate::ledger::BillingLedger;
    pub use anyhow::Result;
    pub use chrono::NaiveDate;
}
