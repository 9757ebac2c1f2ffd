use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::{debug, warn};
use prorated_billing::prelude::*;
use prorated_billing::{BillingRequest, InputLoader};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "~/.config/proration/config.json";

#[derive(Parser, Debug)]
#[clap(version, about)]
struct Args {
    #[arg(short = 'v')]
    verbose: bool,

    /// Billing request: {"month": "YYYY-MM", "subscription": {...} | null, "users": [...]}
    #[arg(short = 'i', long = "input")]
    input: Option<String>,

    /// Bill this month instead of the one in the request
    #[arg(short = 'm', long = "month")]
    month: Option<String>,

    /// JSONL file of users, replacing the request's users
    #[arg(short = 'u', long = "users", conflicts_with = "users_dir")]
    users: Option<String>,

    /// Directory searched recursively for *.jsonl user files
    #[arg(long = "users-dir")]
    users_dir: Option<String>,

    #[arg(short = 'b', long = "breakdown")]
    breakdown: bool,

    /// Print the breakdown as JSON
    #[arg(long = "json")]
    json: bool,

    #[arg(short = 'c', long = "config")]
    config: Option<String>,

    /// Remember --input and --breakdown as defaults
    #[arg(long = "save-config")]
    save_config: bool,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq)]
struct ProrationConfig {
    #[serde(default)]
    input: Option<String>,
    #[serde(default)]
    breakdown: bool,
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

fn get_config_path(explicit: Option<&str>) -> PathBuf {
    expand_path(explicit.unwrap_or(DEFAULT_CONFIG_PATH))
}

fn load_config(config_path: &Path) -> Result<ProrationConfig> {
    if config_path.exists() {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config: {}", config_path.display()))?;
        let config: ProrationConfig = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config: {}", config_path.display()))?;
        Ok(config)
    } else {
        Ok(ProrationConfig::default())
    }
}

fn save_config(config_path: &Path, config: &ProrationConfig) -> Result<()> {
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(config)?;
    fs::write(config_path, content)?;
    Ok(())
}

fn build_request(args: &Args, config: &ProrationConfig) -> Result<BillingRequest> {
    let loader = InputLoader::new();

    let input = args
        .input
        .as_deref()
        .or(config.input.as_deref())
        .ok_or_else(|| anyhow::anyhow!("No billing request given (use --input or set it in the config)"))?;
    let mut request = loader.load_request(expand_path(input))?;

    if let Some(month) = &args.month {
        let month: YearMonth = month.parse()?;
        request = request.with_month(month);
    }

    if let Some(users) = &args.users {
        request = request.with_users(loader.load_users(expand_path(users))?);
    } else if let Some(users_dir) = &args.users_dir {
        request = request.with_users(loader.load_users_from_directory(expand_path(users_dir))?);
    }

    Ok(request)
}

fn print_breakdown(request: &BillingRequest, breakdown: &ChargeBreakdown) {
    println!("Month: {}", breakdown.month());
    println!("Days in month: {}", breakdown.month().days_in_month());
    println!("Daily rate: {}", breakdown.daily_rate_in_cents());

    for (user, line) in request.users().iter().zip(breakdown.lines()) {
        println!(
            "  {} ({}): {} active days, {}",
            user.name(),
            user.id(),
            line.active_days(),
            line.amount_in_cents()
        );
    }

    println!("Total: {}", breakdown.total_in_cents());
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let config_path = get_config_path(args.config.as_deref());
    let mut config = load_config(&config_path).unwrap_or_else(|e| {
        warn!("Ignoring config {}: {:#}", config_path.display(), e);
        ProrationConfig::default()
    });

    if args.save_config {
        if let Some(input) = &args.input {
            config.input = Some(input.clone());
        }
        config.breakdown = args.breakdown;
        if let Err(e) = save_config(&config_path, &config) {
            warn!("Could not save config {}: {:#}", config_path.display(), e);
        }
    }

    let request = build_request(&args, &config)?;
    debug!(
        "Billing {} users for {} ({})",
        request.users().len(),
        request.month(),
        if request.subscription().is_some() { "subscribed" } else { "no subscription" }
    );

    let breakdown = ProrationCalculator::new().charge_breakdown(
        request.month(),
        request.subscription(),
        request.users(),
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&breakdown)?);
    } else if args.breakdown || config.breakdown {
        print_breakdown(&request, &breakdown);
    } else {
        println!("{}", breakdown.total_in_cents());
    }

    Ok(())
}
