use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, Write};

use crate::application::{AppError, ErrorClass, StatementService};
use crate::domain::{format_amount, EntryDraft, RatingResult, Statement};
use crate::io::Exporter;

/// Solvo - income and expenditure statements with affordability ratings
#[derive(Parser)]
#[command(name = "solvo")]
#[command(about = "Record income and expenditure statements and rate their affordability")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "SOLVO_DATABASE", default_value = "solvo.db")]
    pub database: String,

    /// Enable verbose (debug) logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database and create the default users
    Init {
        /// Skip creating the default users
        #[arg(long)]
        no_seed: bool,
    },

    /// User management commands
    #[command(subcommand)]
    User(UserCommands),

    /// Statement commands
    #[command(subcommand)]
    Statement(StatementCommands),

    /// Rating commands
    #[command(subcommand)]
    Rating(RatingCommands),

    /// Export a user's statements
    Export {
        /// Owner user ID
        #[arg(long)]
        user: i64,

        /// Start date, inclusive (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)
        #[arg(long)]
        from: Option<String>,

        /// End date, inclusive (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)
        #[arg(long)]
        to: Option<String>,

        /// Output format: csv, json
        #[arg(long, default_value = "csv")]
        format: String,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Register a new user
    Add {
        /// Username
        username: String,

        /// Password (stored hashed)
        #[arg(long)]
        password: String,
    },

    /// Show a user
    Show {
        /// Username
        username: String,
    },

    /// Check a username and password
    Verify {
        /// Username
        username: String,

        /// Password to check
        #[arg(long)]
        password: String,
    },
}

#[derive(Subcommand)]
pub enum StatementCommands {
    /// Create a statement; the report date is set to now
    Create {
        /// Owner user ID
        #[arg(long)]
        user: i64,

        /// Income line item as CATEGORY=AMOUNT (repeatable)
        #[arg(long = "income")]
        incomes: Vec<String>,

        /// Expenditure line item as CATEGORY=AMOUNT (repeatable)
        #[arg(long = "expenditure")]
        expenditures: Vec<String>,
    },

    /// Show a statement with its line items
    Show {
        /// Statement ID
        id: i64,

        /// Owner user ID
        #[arg(long)]
        user: i64,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// List a user's statements
    List {
        /// Owner user ID
        #[arg(long)]
        user: i64,

        /// Start date, inclusive (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)
        #[arg(long)]
        from: Option<String>,

        /// End date, inclusive (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)
        #[arg(long)]
        to: Option<String>,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum RatingCommands {
    /// Rate a single statement
    Statement {
        /// Statement ID
        id: i64,

        /// Owner user ID
        #[arg(long)]
        user: i64,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Rate all statements reported within a period
    Period {
        /// Owner user ID
        #[arg(long)]
        user: i64,

        /// Start date, inclusive (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)
        #[arg(long)]
        from: Option<String>,

        /// End date, inclusive (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)
        #[arg(long)]
        to: Option<String>,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init { no_seed } => {
                let service = StatementService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);

                if !no_seed {
                    let created = service.seed_default_users().await?;
                    for user in created {
                        println!("Created default user: {} (id {})", user.username, user.id);
                    }
                }
            }

            Commands::User(user_cmd) => {
                let service = StatementService::connect(&self.database).await?;
                run_user_command(&service, user_cmd).await?;
            }

            Commands::Statement(statement_cmd) => {
                let service = StatementService::connect(&self.database).await?;
                run_statement_command(&service, statement_cmd).await?;
            }

            Commands::Rating(rating_cmd) => {
                let service = StatementService::connect(&self.database).await?;
                run_rating_command(&service, rating_cmd).await?;
            }

            Commands::Export {
                user,
                from,
                to,
                format,
                output,
            } => {
                let service = StatementService::connect(&self.database).await?;
                run_export_command(&service, user, from, to, &format, output.as_deref()).await?;
            }
        }

        Ok(())
    }
}

/// Process exit code for a failed command, by error class.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<AppError>().map(AppError::class) {
        Some(ErrorClass::InvalidInput) => 2,
        Some(ErrorClass::NotFound) => 3,
        Some(ErrorClass::Conflict) => 4,
        Some(ErrorClass::Internal) | None => 1,
    }
}

async fn run_user_command(service: &StatementService, cmd: UserCommands) -> Result<()> {
    match cmd {
        UserCommands::Add { username, password } => {
            let user = service.create_user(&username, &password).await?;
            println!("Created user: {} (id {})", user.username, user.id);
        }

        UserCommands::Show { username } => {
            let user = service
                .find_user_by_username(&username)
                .await?
                .with_context(|| format!("User not found: {}", username))?;
            println!("User: {}", user.username);
            println!("  ID: {}", user.id);
        }

        UserCommands::Verify { username, password } => {
            if service.verify_credentials(&username, &password).await? {
                println!("Credentials valid");
            } else {
                anyhow::bail!("Invalid username or password");
            }
        }
    }

    Ok(())
}

async fn run_statement_command(service: &StatementService, cmd: StatementCommands) -> Result<()> {
    match cmd {
        StatementCommands::Create {
            user,
            incomes,
            expenditures,
        } => {
            let incomes = parse_drafts(&incomes, "income")?;
            let expenditures = parse_drafts(&expenditures, "expenditure")?;

            let statement = service
                .create_statement(user, &incomes, &expenditures)
                .await?;
            println!("{}", statement.id);
        }

        StatementCommands::Show { id, user, format } => {
            let statement = service.get_statement(id, user).await?;
            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&statement)?),
                _ => print_statement(&statement),
            }
        }

        StatementCommands::List {
            user,
            from,
            to,
            format,
        } => {
            let (from_date, to_date) = parse_period(from, to)?;
            let statements = if from_date.is_none() && to_date.is_none() {
                service.list_statements(user).await?
            } else {
                service
                    .get_statements_in_period(user, from_date, to_date)
                    .await?
            };

            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&statements)?),
                _ => {
                    if statements.is_empty() {
                        println!("No statements found.");
                        return Ok(());
                    }
                    println!(
                        "{:<8} {:<20} {:>14} {:>14}",
                        "ID", "REPORTED", "INCOME", "EXPENDITURE"
                    );
                    println!("{}", "-".repeat(59));
                    for statement in &statements {
                        println!(
                            "{:<8} {:<20} {:>14} {:>14}",
                            statement.id,
                            statement.report_date.format("%Y-%m-%d %H:%M:%S").to_string(),
                            format_amount(statement.total_income()),
                            format_amount(statement.total_expenditure())
                        );
                    }
                }
            }
        }
    }

    Ok(())
}

async fn run_rating_command(service: &StatementService, cmd: RatingCommands) -> Result<()> {
    match cmd {
        RatingCommands::Statement { id, user, format } => {
            let rating = service.calculate_statement_rating(id, user).await?;
            print_rating(&rating, &format)?;
        }

        RatingCommands::Period {
            user,
            from,
            to,
            format,
        } => {
            let (from_date, to_date) = parse_period(from, to)?;
            let rating = service
                .calculate_period_rating(user, from_date, to_date)
                .await?;
            print_rating(&rating, &format)?;
        }
    }

    Ok(())
}

async fn run_export_command(
    service: &StatementService,
    user: i64,
    from: Option<String>,
    to: Option<String>,
    format: &str,
    output: Option<&str>,
) -> Result<()> {
    let (from_date, to_date) = parse_period(from, to)?;
    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("Failed to create {}", path))?,
        ),
        None => Box::new(io::stdout()),
    };

    let exporter = Exporter::new(service);
    match format {
        "csv" => {
            let count = exporter
                .export_statements_csv(user, from_date, to_date, writer)
                .await?;
            eprintln!("Exported {} line items", count);
        }
        "json" => {
            let snapshot = exporter
                .export_statements_json(user, from_date, to_date, writer)
                .await?;
            eprintln!("Exported {} statements", snapshot.statements.len());
        }
        _ => {
            anyhow::bail!("Invalid export format '{}'. Valid formats: csv, json", format);
        }
    }

    Ok(())
}

fn print_statement(statement: &Statement) {
    println!("Statement {}", statement.id);
    println!("  User:      {}", statement.user_id);
    println!(
        "  Reported:  {}",
        statement.report_date.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();

    if statement.is_empty() {
        println!("  (no line items)");
        return;
    }

    println!("  {:<12} {:<24} {:>14}", "KIND", "CATEGORY", "AMOUNT");
    println!("  {}", "-".repeat(52));
    for entry in statement.entries() {
        println!(
            "  {:<12} {:<24} {:>14}",
            entry.kind,
            entry.category,
            format_amount(entry.amount)
        );
    }
}

fn print_rating(rating: &RatingResult, format: &str) -> Result<()> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(rating)?);
        }
        "csv" => {
            let mut writer = csv::Writer::from_writer(io::stdout());
            writer.write_record([
                "total_income",
                "total_expenditure",
                "disposable_income",
                "ratio",
                "grade",
            ])?;
            writer.write_record([
                rating.total_income.to_string(),
                rating.total_expenditure.to_string(),
                rating.disposable_income.to_string(),
                rating.ratio.to_string(),
                rating.grade.to_string(),
            ])?;
            writer.flush()?;
        }
        _ => {
            println!("Affordability Rating");
            println!(
                "  Total income:       {:>14}",
                format_amount(rating.total_income)
            );
            println!(
                "  Total expenditure:  {:>14}",
                format_amount(rating.total_expenditure)
            );
            println!(
                "  Disposable income:  {:>14}",
                format_amount(rating.disposable_income)
            );
            println!("  Ratio:              {:>14.4}", rating.ratio);
            println!("  Grade:              {:>14}", rating.grade);
        }
    }

    Ok(())
}

fn parse_drafts(items: &[String], kind: &str) -> Result<Vec<EntryDraft>> {
    items
        .iter()
        .map(|item| {
            item.parse::<EntryDraft>()
                .with_context(|| format!("Invalid {} '{}'", kind, item))
        })
        .collect()
}

fn parse_period(
    from: Option<String>,
    to: Option<String>,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
    let from_date = from.as_deref().map(parse_date).transpose()?;
    let to_date = to.as_deref().map(parse_date).transpose()?;
    Ok((from_date, to_date))
}

/// Parse an ISO 8601 date or date-time. Values without an offset are UTC;
/// a bare date means midnight.
fn parse_date(date_str: &str) -> Result<DateTime<Utc>> {
    let date_str = date_str.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(date_str, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }

    let naive_date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").with_context(|| {
        format!(
            "Invalid date format: {}. Use ISO 8601 format (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)",
            date_str
        )
    })?;

    let naive_datetime = naive_date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("Invalid date"))?;

    Ok(naive_datetime.and_utc())
}
