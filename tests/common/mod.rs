// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use solvo::application::{Clock, StatementService};
use solvo::domain::{EntryDraft, User};
use solvo::storage::Repository;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(StatementService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = StatementService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to create a test service whose report dates come from a manual clock
pub async fn test_service_with_clock() -> Result<(StatementService, Arc<ManualClock>, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let repo = Repository::init(&format!("sqlite:{}?mode=rwc", db_path.to_str().unwrap())).await?;
    let clock = ManualClock::new(parse_date("2024-01-01"));
    let service = StatementService::with_clock(repo, clock.clone());
    Ok((service, clock, temp_dir))
}

/// Helper to create a test service over a pool the test can also query directly
pub async fn test_service_with_pool() -> Result<(StatementService, SqlitePool, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", db_path.to_str().unwrap())).await?;
    let repo = Repository::new(pool.clone());
    repo.migrate().await?;
    Ok((StatementService::new(repo), pool, temp_dir))
}

/// Helper to parse a date string into DateTime<Utc>
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

/// Shorthand for a line item draft
pub fn item(category: &str, amount: f64) -> EntryDraft {
    EntryDraft::new(category, amount)
}

/// Register a user with a throwaway password
pub async fn create_user(service: &StatementService, username: &str) -> Result<User> {
    Ok(service.create_user(username, "secret").await?)
}

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(start),
        })
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
