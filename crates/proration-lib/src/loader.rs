use crate::data_structures::{BillingRequest, Subscription, User, YearMonth};
use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Reads billing input from JSON documents and JSONL user exports.
///
/// Users and subscriptions are read through their serde impls, so dates may be
/// plain calendar dates or RFC 3339 timestamps reduced to their UTC day.
pub struct InputLoader;

impl InputLoader {
    pub fn new() -> Self {
        Self
    }

    pub fn load_request<P: AsRef<Path>>(&self, path: P) -> Result<BillingRequest> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to open file: {}", path.as_ref().display()))?;

        self.parse_request(&content)
            .with_context(|| format!("Invalid billing request: {}", path.as_ref().display()))
    }

    pub fn load_users<P: AsRef<Path>>(&self, path: P) -> Result<Vec<User>> {
        let file = File::open(&path)
            .with_context(|| format!("Failed to open file: {}", path.as_ref().display()))?;

        let reader = BufReader::new(file);
        let mut users = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read line {}", line_num + 1))?;

            if line.trim().is_empty() {
                continue;
            }

            let json: Value = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse JSON on line {}", line_num + 1))?;
            let user = self
                .parse_user(&json)
                .with_context(|| format!("Invalid user on line {}", line_num + 1))?;
            users.push(user);
        }

        Ok(users)
    }

    pub fn load_users_from_directory<P: AsRef<Path>>(&self, dir_path: P) -> Result<Vec<User>> {
        let mut all_users = Vec::new();
        self.load_users_recursive(dir_path.as_ref(), &mut all_users)?;
        all_users.sort_by_key(|user| user.id());
        Ok(all_users)
    }

    /// Symlinks are not followed. Any unreadable `*.jsonl` file fails the whole
    /// scan, since dropping its users would under-bill.
    fn load_users_recursive(&self, dir_path: &Path, users: &mut Vec<User>) -> Result<()> {
        let dir = std::fs::read_dir(dir_path)
            .with_context(|| format!("Failed to read directory: {}", dir_path.display()))?;

        for entry in dir {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();
            let file_type = entry
                .file_type()
                .with_context(|| format!("Failed to stat: {}", path.display()))?;

            if file_type.is_file() {
                if path.extension().is_some_and(|extension| extension == "jsonl") {
                    let mut file_users = self.load_users(&path)?;
                    users.append(&mut file_users);
                }
            } else if file_type.is_dir() {
                self.load_users_recursive(&path, users)?;
            } else if file_type.is_symlink() {
                debug!("Not following symlink {}", path.display());
            }
        }

        Ok(())
    }

    pub fn parse_request(&self, content: &str) -> Result<BillingRequest> {
        let json: Value = serde_json::from_str(content).context("Failed to parse JSON")?;

        let month = self
            .extract_string(&json, "month")?
            .parse::<YearMonth>()
            .context("Invalid 'month' field")?;

        let subscription = match json.get("subscription") {
            None | Some(Value::Null) => None,
            Some(value) => Some(self.parse_subscription(value).context("Invalid 'subscription'")?),
        };

        let users = match json.get("users") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(values)) => values
                .iter()
                .enumerate()
                .map(|(index, value)| {
                    self.parse_user(value)
                        .with_context(|| format!("Invalid user at index {}", index))
                })
                .collect::<Result<Vec<_>>>()?,
            Some(_) => return Err(anyhow::anyhow!("'users' must be an array")),
        };

        Ok(BillingRequest::new(month, subscription, users))
    }

    pub fn parse_subscription(&self, json: &Value) -> Result<Subscription> {
        Subscription::deserialize(json).context("Missing or invalid subscription field")
    }

    pub fn parse_user(&self, json: &Value) -> Result<User> {
        User::deserialize(json).context("Missing or invalid user field")
    }

    fn extract_string(&self, json: &Value, key: &str) -> Result<String> {
        json.get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("Missing or invalid '{}' field", key))
    }
}

impl Default for InputLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_parse_request() {
        let loader = InputLoader::new();
        let content = r#"{
            "month": "2022-04",
            "subscription": {"id": 763, "customerId": 328, "monthlyPriceInCents": 359},
            "users": [
                {"id": 1, "name": "Employee #1", "customerId": 328, "activatedOn": "2021-11-04", "deactivatedOn": "2022-04-10"},
                {"id": 2, "name": "Employee #2", "customerId": 328, "activatedOn": "2021-12-04", "deactivatedOn": null}
            ]
        }"#;

        let request = loader.parse_request(content).unwrap();
        assert_eq!(request.month().to_string(), "2022-04");
        assert_eq!(request.subscription().unwrap().monthly_price_in_cents(), 359);
        assert_eq!(request.users().len(), 2);
        assert_eq!(request.users()[0].deactivated_on(), Some(date(2022, 4, 10)));
        assert_eq!(request.users()[1].deactivated_on(), None);
    }

    #[test]
    fn test_parse_request_without_subscription() {
        let loader = InputLoader::new();
        let request = loader
            .parse_request(r#"{"month": "2022-04", "subscription": null, "users": []}"#)
            .unwrap();
        assert!(request.subscription().is_none());
        assert!(request.users().is_empty());
    }

    #[test]
    fn test_parse_request_rejects_bad_month() {
        let loader = InputLoader::new();
        assert!(loader.parse_request(r#"{"month": "04/2022"}"#).is_err());
        assert!(loader.parse_request(r#"{"users": []}"#).is_err());
    }

    #[test]
    fn test_timestamps_are_normalized_to_utc_day() {
        let loader = InputLoader::new();
        let json: Value = serde_json::from_str(
            r#"{"id": 1, "customerId": 1, "activatedOn": "2022-04-05T23:30:00-02:00", "deactivatedOn": "2022-04-10T08:15:00Z"}"#,
        )
        .unwrap();

        let user = loader.parse_user(&json).unwrap();
        assert_eq!(user.activated_on(), date(2022, 4, 6));
        assert_eq!(user.deactivated_on(), Some(date(2022, 4, 10)));
        assert_eq!(user.name(), "");
    }

    #[test]
    fn test_parse_user_missing_fields() {
        let loader = InputLoader::new();
        let json: Value = serde_json::from_str(r#"{"id": 1, "activatedOn": "2022-04-05"}"#).unwrap();
        assert!(loader.parse_user(&json).is_err());

        let json: Value =
            serde_json::from_str(r#"{"id": 1, "customerId": 1, "activatedOn": "yesterday"}"#)
                .unwrap();
        assert!(loader.parse_user(&json).is_err());
    }

    #[test]
    fn test_load_users_from_file() {
        let loader = InputLoader::new();
        let mut temp_file = NamedTempFile::new().unwrap();

        let content = r#"{"id": 1, "name": "Employee #1", "customerId": 1, "activatedOn": "2022-04-05", "deactivatedOn": "2022-04-10"}

{"id": 2, "name": "Employee #2", "customerId": 1, "activatedOn": "2022-03-15"}"#;

        temp_file.write_all(content.as_bytes()).unwrap();

        let users = loader.load_users(temp_file.path()).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].name(), "Employee #1");
        assert!(users[1].deactivated_on().is_none());
    }

    #[test]
    fn test_load_users_reports_bad_line() {
        let loader = InputLoader::new();
        let mut temp_file = NamedTempFile::new().unwrap();

        let content = r#"{"id": 1, "customerId": 1, "activatedOn": "2022-04-05"}
{"id": 2, "customerId": 1"#;
        temp_file.write_all(content.as_bytes()).unwrap();

        let err = loader.load_users(temp_file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }

    #[test]
    fn test_loader_and_serde_read_users_alike() {
        let loader = InputLoader::new();
        let line = r#"{"id": 1, "customerId": 1, "activatedOn": "2022-04-05T23:30:00-02:00", "deactivatedOn": null}"#;

        let from_loader = loader.parse_user(&serde_json::from_str(line).unwrap()).unwrap();
        let from_serde: User = serde_json::from_str(line).unwrap();
        assert_eq!(from_loader, from_serde);
        assert_eq!(from_serde.activated_on(), date(2022, 4, 6));
    }

    #[test]
    fn test_load_users_from_directory() {
        let loader = InputLoader::new();
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("customer-1");
        std::fs::create_dir(&nested).unwrap();

        std::fs::write(
            dir.path().join("b.jsonl"),
            r#"{"id": 3, "customerId": 2, "activatedOn": "2022-01-01"}"#,
        )
        .unwrap();
        std::fs::write(
            nested.join("a.jsonl"),
            r#"{"id": 1, "customerId": 1, "activatedOn": "2022-01-01"}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let users = loader.load_users_from_directory(dir.path()).unwrap();
        let ids: Vec<u64> = users.iter().map(|user| user.id()).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_broken_file_fails_directory_scan() {
        let loader = InputLoader::new();
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("customer-1");
        std::fs::create_dir(&nested).unwrap();

        std::fs::write(
            dir.path().join("good.jsonl"),
            r#"{"id": 1, "customerId": 1, "activatedOn": "2022-01-01"}"#,
        )
        .unwrap();
        std::fs::write(nested.join("broken.jsonl"), "not json").unwrap();

        let err = loader.load_users_from_directory(dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("line 1"));
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_scan_does_not_follow_symlinks() {
        let loader = InputLoader::new();
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("customer-1");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(
            nested.join("users.jsonl"),
            r#"{"id": 1, "customerId": 1, "activatedOn": "2022-01-01"}"#,
        )
        .unwrap();
        std::os::unix::fs::symlink(dir.path(), nested.join("loop")).unwrap();
        std::os::unix::fs::symlink(nested.join("users.jsonl"), dir.path().join("linked.jsonl"))
            .unwrap();

        let users = loader.load_users_from_directory(dir.path()).unwrap();
        assert_eq!(users.len(), 1);
    }

    #[test]
    fn test_load_request_missing_file() {
        let loader = InputLoader::new();
        assert!(loader.load_request("/nonexistent/request.json").is_err());
    }
}
