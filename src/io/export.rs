use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::StatementService;
use crate::domain::{Statement, UserId};

/// JSON snapshot of a user's statements in a period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub user_id: UserId,
    pub statements: Vec<Statement>,
}

/// Exporter for writing statements to various formats.
/// Both exports go through the period query, so an empty period fails with
/// `StatementNotFound` rather than producing an empty file.
pub struct Exporter<'a> {
    service: &'a StatementService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a StatementService) -> Self {
        Self { service }
    }

    /// Export line items as CSV, one row per income or expenditure.
    /// Returns the number of rows written.
    pub async fn export_statements_csv<W: Write>(
        &self,
        user_id: UserId,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
        writer: W,
    ) -> Result<usize> {
        let statements = self
            .service
            .get_statements_in_period(user_id, start_date, end_date)
            .await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["statement_id", "report_date", "kind", "category", "amount"])?;

        let mut count = 0;
        for statement in &statements {
            let report_date = statement
                .report_date
                .to_rfc3339_opts(SecondsFormat::Secs, true);

            for entry in statement.entries() {
                csv_writer.write_record([
                    statement.id.to_string(),
                    report_date.clone(),
                    entry.kind.as_str().to_string(),
                    entry.category.clone(),
                    entry.amount.to_string(),
                ])?;
                count += 1;
            }
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export statements as a pretty-printed JSON snapshot
    pub async fn export_statements_json<W: Write>(
        &self,
        user_id: UserId,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
        mut writer: W,
    ) -> Result<StatementSnapshot> {
        let statements = self
            .service
            .get_statements_in_period(user_id, start_date, end_date)
            .await?;

        let snapshot = StatementSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            user_id,
            statements,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
