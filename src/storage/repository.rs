use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};

use crate::domain::{
    EntryId, EntryKind, LedgerEntry, Statement, StatementId, User, UserId, ValidEntry,
};

use super::MIGRATION_001_INITIAL;

/// Repository for persisting and querying users, statements and line items.
pub struct Repository {
    pool: SqlitePool,
}

/// Which statements a read selects. Rendered as a `WHERE` clause so headers
/// and line items are selected by the same condition.
struct StatementFilter {
    user_id: UserId,
    id: Option<StatementId>,
    from: Option<String>,
    to: Option<String>,
}

impl StatementFilter {
    fn where_clause(&self) -> String {
        let mut clause = String::from("user_id = ?");
        if self.id.is_some() {
            clause.push_str(" AND id = ?");
        }
        if self.from.is_some() {
            clause.push_str(" AND report_date >= ?");
        }
        if self.to.is_some() {
            clause.push_str(" AND report_date <= ?");
        }
        clause
    }

    /// Bind values in the order `where_clause` lists them.
    fn bind<'q>(
        &'q self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        let mut query = query.bind(self.user_id);
        if let Some(id) = self.id {
            query = query.bind(id);
        }
        if let Some(ref from) = self.from {
            query = query.bind(from.as_str());
        }
        if let Some(ref to) = self.to {
            query = query.bind(to.as_str());
        }
        query
    }
}

/// Statement header as stored, before its line items are attached.
struct StatementHeader {
    id: StatementId,
    user_id: UserId,
    report_date: DateTime<Utc>,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations. Safe to run more than once.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Start a unit of work. Dropping the transaction without committing
    /// rolls it back.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .context("Failed to begin transaction")
    }

    // ========================
    // User operations
    // ========================

    /// Save a new user and return it with its assigned id.
    pub async fn save_user(&self, username: &str, password_hash: &str) -> Result<User> {
        let result = sqlx::query("INSERT INTO users (username, password_hash) VALUES (?, ?)")
            .bind(username)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .context("Failed to save user")?;

        Ok(User {
            id: result.last_insert_rowid(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        })
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, username, password_hash FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user")?;

        Ok(row.as_ref().map(Self::row_to_user))
    }

    /// Get a user by username.
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, username, password_hash FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by username")?;

        Ok(row.as_ref().map(Self::row_to_user))
    }

    fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> User {
        User {
            id: row.get("id"),
            username: row.get("username"),
            password_hash: row.get("password_hash"),
        }
    }

    // ========================
    // Statement writes
    // ========================

    /// Insert a statement header inside the caller's transaction.
    pub async fn insert_statement(
        conn: &mut SqliteConnection,
        user_id: UserId,
        report_date: DateTime<Utc>,
    ) -> Result<StatementId> {
        let result = sqlx::query("INSERT INTO statements (user_id, report_date) VALUES (?, ?)")
            .bind(user_id)
            .bind(format_timestamp(report_date))
            .execute(&mut *conn)
            .await
            .context("Failed to save statement")?;

        Ok(result.last_insert_rowid())
    }

    /// Insert a validated line item inside the caller's transaction.
    pub async fn insert_entry(
        conn: &mut SqliteConnection,
        statement_id: StatementId,
        kind: EntryKind,
        entry: &ValidEntry,
    ) -> Result<EntryId> {
        let query = format!(
            "INSERT INTO {} (category, amount, statement_id) VALUES (?, ?, ?)",
            entry_table(kind)
        );

        let result = sqlx::query(&query)
            .bind(entry.category())
            .bind(entry.amount())
            .bind(statement_id)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to save {}", kind))?;

        Ok(result.last_insert_rowid())
    }

    // ========================
    // Statement reads
    // ========================

    /// Get a statement by ID, only if it belongs to the given user.
    pub async fn get_statement(
        &self,
        id: StatementId,
        user_id: UserId,
    ) -> Result<Option<Statement>> {
        let filter = StatementFilter {
            user_id,
            id: Some(id),
            from: None,
            to: None,
        };

        let mut statements = self.load_statements(&filter).await?;
        Ok(statements.pop())
    }

    /// List a user's statements, optionally bounded by report date.
    /// Both bounds are inclusive. Ordered by id.
    pub async fn list_statements(
        &self,
        user_id: UserId,
        from_date: Option<DateTime<Utc>>,
        to_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<Statement>> {
        let filter = StatementFilter {
            user_id,
            id: None,
            from: from_date.map(lower_bound),
            to: to_date.map(upper_bound),
        };

        self.load_statements(&filter).await
    }

    /// Load the headers matching `filter`, then their line items with one
    /// query per entry table. Every query binds the same fixed set of values.
    async fn load_statements(&self, filter: &StatementFilter) -> Result<Vec<Statement>> {
        let query = format!(
            "SELECT id, user_id, report_date FROM statements WHERE {} ORDER BY id",
            filter.where_clause()
        );

        let rows = filter
            .bind(sqlx::query(&query))
            .fetch_all(&self.pool)
            .await
            .context("Failed to list statements")?;

        let headers = rows
            .iter()
            .map(Self::row_to_header)
            .collect::<Result<Vec<_>>>()?;

        if headers.is_empty() {
            return Ok(Vec::new());
        }

        let mut incomes = self.load_entries(EntryKind::Income, filter).await?;
        let mut expenditures = self.load_entries(EntryKind::Expenditure, filter).await?;

        Ok(headers
            .into_iter()
            .map(|header| Statement {
                id: header.id,
                user_id: header.user_id,
                report_date: header.report_date,
                incomes: incomes.remove(&header.id).unwrap_or_default(),
                expenditures: expenditures.remove(&header.id).unwrap_or_default(),
            })
            .collect())
    }

    async fn load_entries(
        &self,
        kind: EntryKind,
        filter: &StatementFilter,
    ) -> Result<HashMap<StatementId, Vec<LedgerEntry>>> {
        let query = format!(
            r#"
            SELECT id, category, amount, statement_id
            FROM {}
            WHERE statement_id IN (SELECT id FROM statements WHERE {})
            ORDER BY id
            "#,
            entry_table(kind),
            filter.where_clause()
        );

        let rows = filter
            .bind(sqlx::query(&query))
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to load {} entries", kind))?;

        let mut entries: HashMap<StatementId, Vec<LedgerEntry>> = HashMap::new();
        for row in rows {
            let statement_id: StatementId = row.get("statement_id");
            entries.entry(statement_id).or_default().push(LedgerEntry {
                id: row.get("id"),
                kind,
                category: row.get("category"),
                amount: row.get("amount"),
            });
        }

        Ok(entries)
    }

    fn row_to_header(row: &sqlx::sqlite::SqliteRow) -> Result<StatementHeader> {
        let report_date_str: String = row.get("report_date");

        Ok(StatementHeader {
            id: row.get("id"),
            user_id: row.get("user_id"),
            report_date: DateTime::parse_from_rfc3339(&report_date_str)
                .context("Invalid report_date timestamp")?
                .with_timezone(&Utc),
        })
    }
}

fn entry_table(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::Income => "income",
        EntryKind::Expenditure => "expenditure",
    }
}

/// Whether a storage error is a `UNIQUE` constraint violation.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
        _ => false,
    }
}

/// Fixed-width UTC form, so SQL string comparison orders chronologically.
/// Precision is microseconds; anything finer is truncated.
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Earliest storable timestamp that is not before `dt`.
fn lower_bound(dt: DateTime<Utc>) -> String {
    let truncated = dt.trunc_subsecs(6);
    if truncated < dt {
        format_timestamp(truncated + Duration::microseconds(1))
    } else {
        format_timestamp(truncated)
    }
}

/// Latest storable timestamp that is not after `dt`.
fn upper_bound(dt: DateTime<Utc>) -> String {
    format_timestamp(dt.trunc_subsecs(6))
}
