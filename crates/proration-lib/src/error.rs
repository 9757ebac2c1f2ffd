use thiserror::Error;

pub type BillingResult<T> = Result<T, BillingError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BillingError {
    #[error("Invalid month format: {0:?} (expected YYYY-MM)")]
    InvalidMonthFormat(String),

    #[error("Month out of range: {year}-{month:02}")]
    MonthOutOfRange { year: i32, month: u32 },
}
