//! Doctor command - validate configuration and show status

use anyhow::Result;
use askfeed_adapters::store::SqliteStore;
use askfeed_domain::UserStore;
use serde::Serialize;
use std::path::PathBuf;

use crate::args::DoctorArgs;
use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct DoctorReport {
    config: CheckResult,
    database: CheckResult,
    feed: CheckResult,
    media: CheckResult,
    overall: String,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    status: String,
    message: String,
    details: Option<serde_json::Value>,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            status: "warn".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    fn is_error(&self) -> bool {
        self.status == "error"
    }
}

pub async fn execute(args: DoctorArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut report = DoctorReport {
        config: CheckResult::error("Not checked"),
        database: CheckResult::error("Not checked"),
        feed: CheckResult::error("Not checked"),
        media: CheckResult::error("Not checked"),
        overall: "error".to_string(),
    };

    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(c) => {
            report.config = CheckResult::ok("Configuration loaded successfully");
            Some(c)
        }
        Err(e) => {
            report.config = CheckResult::error(format!("Failed to load config: {:#}", e));
            None
        }
    };

    if let Some(ref config) = config {
        report.database = check_database(config).await;
        report.feed = check_feed(config);
        report.media = check_media(config);
    }

    let checks = [&report.config, &report.database, &report.feed, &report.media];

    let has_error = checks.iter().any(|c| c.is_error());
    let all_ok = checks.iter().all(|c| c.is_ok());

    report.overall = if has_error {
        "error".to_string()
    } else if all_ok {
        "ok".to_string()
    } else {
        "warn".to_string()
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.overall == "error" {
        std::process::exit(1);
    }

    Ok(())
}

async fn check_database(config: &AppConfig) -> CheckResult {
    let path = &config.general.database_path;

    let store = match SqliteStore::new(path).await {
        Ok(s) => s,
        Err(e) => {
            return CheckResult::error(format!(
                "Failed to open database {}: {}",
                path.display(),
                e
            ));
        }
    };

    match store.list_users().await {
        Ok(users) if users.is_empty() => CheckResult::warn(format!(
            "Database {} has no users; add one with 'askfeed user add'",
            path.display()
        )),
        Ok(users) => CheckResult::ok(format!("{} users in {}", users.len(), path.display()))
            .with_details(serde_json::json!({
                "count": users.len(),
                "handles": users.iter().map(|u| &u.handle).collect::<Vec<_>>()
            })),
        Err(e) => CheckResult::error(format!("Failed to read users: {}", e)),
    }
}

fn check_feed(config: &AppConfig) -> CheckResult {
    let env_var = &config.feed.api_key_env;

    if env_var.is_empty() {
        return CheckResult::error("No feed API key env var configured");
    }

    match std::env::var(env_var) {
        Ok(val) if !val.is_empty() => CheckResult::ok(format!(
            "API key: {} (set), base_url: {}",
            env_var, config.feed.base_url
        )),
        _ => CheckResult::warn(format!(
            "API key: {} (not set), base_url: {}",
            env_var, config.feed.base_url
        )),
    }
}

fn check_media(config: &AppConfig) -> CheckResult {
    if !config.media.enabled {
        return CheckResult::ok("Media enrichment disabled");
    }

    let env_var = &config.media.api_key_env;

    if env_var.is_empty() {
        return CheckResult::error("No media API key env var configured");
    }

    match std::env::var(env_var) {
        Ok(val) if !val.is_empty() => CheckResult::ok(format!(
            "API key: {} (set), Model: {}",
            env_var, config.media.model
        )),
        _ => CheckResult::warn(format!(
            "API key: {} (not set), Model: {}",
            env_var, config.media.model
        )),
    }
}

fn print_report(report: &DoctorReport) {
    println!("askfeed Doctor Report");
    println!("=====================");
    println!();

    print_check("Config", &report.config);
    print_check("Database", &report.database);
    print_check("Feed API", &report.feed);
    print_check("Media", &report.media);

    println!();
    let symbol = match report.overall.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} Overall: {}", symbol, report.overall.to_uppercase());

    if report.overall == "ok" {
        println!();
        println!("Ready to run! Try: askfeed schedule --once");
    }
}

fn print_check(name: &str, result: &CheckResult) {
    let symbol = match result.status.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} {}: {}", symbol, name, result.message);
}
