use prorated_billing::prelude::*;
use std::env;

fn date(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| anyhow::anyhow!("invalid date {}-{}-{}", year, month, day))
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let month = args.get(1).map(String::as_str).unwrap_or("2022-04");

    let plan = Subscription::new(1, 1, 5000);
    let users = vec![
        User::new(1, "Employee #1", 1, date(2022, 4, 1)?, Some(date(2022, 4, 15)?)),
        User::new(2, "Employee #2", 1, date(2022, 4, 10)?, Some(date(2022, 4, 20)?)),
        User::new(3, "Employee #3", 1, date(2022, 3, 25)?, None),
    ];

    let total = monthly_charge(month, Some(&plan), &users)?;
    println!("Charge for {}: {} cents", month, total);

    let month: YearMonth = month.parse()?;
    let breakdown = ProrationCalculator::new().charge_breakdown(month, Some(&plan), &users);

    println!("\n--- Breakdown ---");
    println!("Days in month: {}", month.days_in_month());
    println!("Daily rate: {} cents", breakdown.daily_rate_in_cents());
    for (user, line) in users.iter().zip(breakdown.lines()) {
        println!(
            "{}: {} active days, {} cents",
            user.name(),
            line.active_days(),
            line.amount_in_cents()
        );
    }

    let mut ledger = BillingLedger::new();
    ledger.add_subscription(plan);
    for user in users {
        ledger.add_user(user);
    }

    println!("\n--- Ledger ---");
    for (customer_id, charge) in ledger.charges_for_month(month) {
        println!("Customer {}: {} cents", customer_id, charge);
    }

    Ok(())
}
