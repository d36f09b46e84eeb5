use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, info, warn};

use crate::domain::{
    calculate_rating, EntryDraft, EntryKind, RatingResult, Statement, StatementId, User, UserId,
    DEFAULT_USERS,
};
use crate::storage::{is_unique_violation, Repository};

use super::{credentials, AppError, Clock, SystemClock};

/// Application service providing the statement and rating operations.
/// This is the primary interface for any client (CLI, API, etc.).
pub struct StatementService {
    repo: Repository,
    clock: Arc<dyn Clock>,
}

impl StatementService {
    /// Create a new service with the given repository and the system clock.
    pub fn new(repo: Repository) -> Self {
        Self::with_clock(repo, Arc::new(SystemClock))
    }

    /// Create a new service that stamps statements using `clock`.
    pub fn with_clock(repo: Repository, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // User operations
    // ========================

    /// Register a user. The password is stored hashed.
    pub async fn create_user(&self, username: &str, password: &str) -> Result<User, AppError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::InvalidUsername);
        }

        if self.repo.get_user_by_username(username).await?.is_some() {
            return Err(AppError::UsernameTaken(username.to_string()));
        }

        let password_hash =
            credentials::hash_password(password).map_err(AppError::Credentials)?;

        // The check above can race another writer; the UNIQUE index decides.
        let user = match self.repo.save_user(username, &password_hash).await {
            Ok(user) => user,
            Err(err) if is_unique_violation(&err) => {
                return Err(AppError::UsernameTaken(username.to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        info!(user_id = user.id, username = %user.username, "created user");
        Ok(user)
    }

    /// Resolve a user id. Absence is final.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AppError> {
        self.repo
            .get_user(user_id)
            .await?
            .ok_or(AppError::UserNotFound(user_id))
    }

    /// Look up a user by username.
    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self.repo.get_user_by_username(username.trim()).await?)
    }

    /// Check a username/password pair. Unknown users simply fail to verify.
    pub async fn verify_credentials(&self, username: &str, password: &str) -> Result<bool, AppError> {
        match self.find_user_by_username(username).await? {
            Some(user) => credentials::verify_password(password, &user.password_hash)
                .map_err(AppError::Credentials),
            None => Ok(false),
        }
    }

    /// Create the default accounts that do not exist yet.
    /// Returns only the users created by this call, so a second run returns none.
    pub async fn seed_default_users(&self) -> Result<Vec<User>, AppError> {
        let mut created = Vec::new();

        for (username, password) in DEFAULT_USERS {
            if self.repo.get_user_by_username(username).await?.is_some() {
                debug!(username, "default user already present");
                continue;
            }
            created.push(self.create_user(username, password).await?);
        }

        info!(count = created.len(), "seeded default users");
        Ok(created)
    }

    // ========================
    // Statement operations
    // ========================

    /// Create a statement with its line items in one transaction.
    ///
    /// The report date comes from the service clock. Items are validated in
    /// order, incomes first; the first invalid one rolls everything back,
    /// header included.
    pub async fn create_statement(
        &self,
        user_id: UserId,
        incomes: &[EntryDraft],
        expenditures: &[EntryDraft],
    ) -> Result<Statement, AppError> {
        self.get_user(user_id).await?;

        // Stored timestamps carry microseconds
        let report_date = self.clock.now().trunc_subsecs(6);

        let mut tx = self.repo.begin().await?;
        let statement_id = Repository::insert_statement(&mut *tx, user_id, report_date).await?;

        for (kind, drafts) in [
            (EntryKind::Income, incomes),
            (EntryKind::Expenditure, expenditures),
        ] {
            for draft in drafts {
                let entry = draft.validate().map_err(|err| {
                    warn!(user_id, %kind, error = %err, "rejected line item");
                    AppError::from_entry(kind, err)
                })?;
                Repository::insert_entry(&mut *tx, statement_id, kind, &entry).await?;
            }
        }

        tx.commit().await.context("Failed to commit statement")?;

        info!(
            statement_id,
            user_id,
            incomes = incomes.len(),
            expenditures = expenditures.len(),
            "created statement"
        );

        self.repo
            .get_statement(statement_id, user_id)
            .await?
            .ok_or(AppError::StatementNotFound)
    }

    /// Get one of the user's statements. A statement owned by someone else
    /// is reported exactly like a missing one.
    pub async fn get_statement(
        &self,
        statement_id: StatementId,
        user_id: UserId,
    ) -> Result<Statement, AppError> {
        self.get_user(user_id).await?;

        debug!(statement_id, user_id, "fetching statement");
        self.repo
            .get_statement(statement_id, user_id)
            .await?
            .ok_or(AppError::StatementNotFound)
    }

    /// List every statement of a user, possibly none.
    pub async fn list_statements(&self, user_id: UserId) -> Result<Vec<Statement>, AppError> {
        self.get_user(user_id).await?;
        Ok(self.repo.list_statements(user_id, None, None).await?)
    }

    /// Get the user's statements reported within `[start_date, end_date]`.
    /// Either bound may be omitted. An empty result is `StatementNotFound`.
    pub async fn get_statements_in_period(
        &self,
        user_id: UserId,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<Statement>, AppError> {
        self.get_user(user_id).await?;

        let statements = self
            .repo
            .list_statements(user_id, start_date, end_date)
            .await?;
        debug!(
            user_id,
            ?start_date,
            ?end_date,
            count = statements.len(),
            "period query"
        );

        if statements.is_empty() {
            return Err(AppError::StatementNotFound);
        }
        Ok(statements)
    }

    // ========================
    // Rating operations
    // ========================

    /// Rate a single statement.
    pub async fn calculate_statement_rating(
        &self,
        statement_id: StatementId,
        user_id: UserId,
    ) -> Result<RatingResult, AppError> {
        let statement = self.get_statement(statement_id, user_id).await?;
        Ok(calculate_rating(std::slice::from_ref(&statement)))
    }

    /// Rate all of a user's statements within a period.
    pub async fn calculate_period_rating(
        &self,
        user_id: UserId,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<RatingResult, AppError> {
        let statements = self
            .get_statements_in_period(user_id, start_date, end_date)
            .await?;
        Ok(calculate_rating(&statements))
    }
}
