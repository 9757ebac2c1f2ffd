use crate::calculator::ProrationCalculator;
use crate::data_structures::{BillingRequest, ChargeBreakdown, Subscription, User, YearMonth};
use crate::loader::InputLoader;
use anyhow::Result;
use log::info;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Subscriptions and users of many customers, billed month by month.
///
/// Each customer's users are charged against that customer's subscription
/// only. A customer with users but no subscription is billed 0.
pub struct BillingLedger {
    subscriptions: BTreeMap<u64, Subscription>,
    users: Vec<User>,
    calculator: ProrationCalculator,
    loader: InputLoader,
}

impl BillingLedger {
    pub fn new() -> Self {
        Self {
            subscriptions: BTreeMap::new(),
            users: Vec::new(),
            calculator: ProrationCalculator::new(),
            loader: InputLoader::new(),
        }
    }

    /// Registers `subscription` for its customer, returning the one it replaces.
    pub fn add_subscription(&mut self, subscription: Subscription) -> Option<Subscription> {
        self.subscriptions
            .insert(subscription.customer_id(), subscription)
    }

    pub fn add_user(&mut self, user: User) {
        self.users.push(user);
    }

    pub fn load_users<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let users = self.loader.load_users(path)?;
        let count = users.len();
        self.users.extend(users);
        info!("Loaded {} users into the ledger", count);
        Ok(count)
    }

    pub fn load_users_from_directory<P: AsRef<Path>>(&mut self, dir_path: P) -> Result<usize> {
        let users = self.loader.load_users_from_directory(dir_path)?;
        let count = users.len();
        self.users.extend(users);
        info!("Loaded {} users into the ledger", count);
        Ok(count)
    }

    /// Adds the subscription and users of a billing request and returns its month.
    pub fn load_request<P: AsRef<Path>>(&mut self, path: P) -> Result<YearMonth> {
        let request = self.loader.load_request(path)?;
        Ok(self.add_request(request))
    }

    pub fn add_request(&mut self, request: BillingRequest) -> YearMonth {
        let month = request.month();
        if let Some(subscription) = request.subscription() {
            self.add_subscription(subscription.clone());
        }
        self.users.extend(request.users().iter().cloned());
        month
    }

    pub fn subscription_for_customer(&self, customer_id: u64) -> Option<&Subscription> {
        self.subscriptions.get(&customer_id)
    }

    pub fn users_for_customer(&self, customer_id: u64) -> Vec<User> {
        self.users
            .iter()
            .filter(|user| user.customer_id() == customer_id)
            .cloned()
            .collect()
    }

    pub fn charge_for_customer(&self, customer_id: u64, month: YearMonth) -> u64 {
        self.breakdown_for_customer(customer_id, month)
            .total_in_cents()
    }

    pub fn breakdown_for_customer(&self, customer_id: u64, month: YearMonth) -> ChargeBreakdown {
        let users = self.users_for_customer(customer_id);
        self.calculator.charge_breakdown(
            month,
            self.subscription_for_customer(customer_id),
            &users,
        )
    }

    pub fn charges_for_month(&self, month: YearMonth) -> BTreeMap<u64, u64> {
        self.customer_ids()
            .into_iter()
            .map(|customer_id| (customer_id, self.charge_for_customer(customer_id, month)))
            .collect()
    }

    pub fn total_for_month(&self, month: YearMonth) -> u64 {
        self.charges_for_month(month)
            .values()
            .fold(0u64, |total, charge| total.saturating_add(*charge))
    }

    pub fn customer_ids(&self) -> BTreeSet<u64> {
        self.subscriptions
            .keys()
            .copied()
            .chain(self.users.iter().map(|user| user.customer_id()))
            .collect()
    }

    pub fn customer_count(&self) -> usize {
        self.customer_ids().len()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty() && self.users.is_empty()
    }

    pub fn clear(&mut self) {
        self.subscriptions.clear();
        self.users.clear();
    }
}

impl Default for BillingLedger {
    fn default() -> Self {
        Self::new()
    }
}
