use std::path::PathBuf;
use std::process::ExitCode;

use cc_statement_tracker::config::{AppConfig, DB_ENV};
use cc_statement_tracker::db;
use cc_statement_tracker::error::{Result, TrackerError};
use cc_statement_tracker::models::{
    CardRow, NewCard, NewPayment, NewTransaction, PaymentMethod, PaymentRow, StatementRow,
    TransactionRow, TransactionUpdate,
};
use cc_statement_tracker::service::{self, Removal};
use cc_statement_tracker::validation::{Severity, ValidationIssue, has_errors, validate_card_settings};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;
use tabled::Table;
use tracing::debug;
use uuid::Uuid;

/// Credit Card Statement Tracker — billing cycles, interest and minimum payments
#[derive(Parser)]
#[command(name = "cc-tracker", version, about)]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = DB_ENV)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Card settings shared by add-card, edit-card and validate-card
#[derive(Args, Clone)]
struct CardArgs {
    /// Card name (e.g. "Everyday Visa")
    #[arg(long)]
    name: String,
    /// Last four digits of the card number
    #[arg(long)]
    last4: String,
    /// Credit limit
    #[arg(long)]
    credit_limit: f64,
    /// Day of month the statement closes (1-28)
    #[arg(long)]
    statement_day: u32,
    /// Day of month the payment is due (1-28)
    #[arg(long)]
    due_day: u32,
    /// Grace period in days between statement and due date
    #[arg(long, default_value_t = 21)]
    grace_days: u32,
    /// Purchase APR as a fraction (0.1999 = 19.99%)
    #[arg(long)]
    apr: f64,
    /// Minimum payment as a fraction of the balance
    #[arg(long, default_value_t = 0.02)]
    min_payment_percent: f64,
    /// Minimum payment floor
    #[arg(long, default_value_t = 0.0)]
    min_payment_floor: f64,
}

impl From<CardArgs> for NewCard {
    fn from(args: CardArgs) -> Self {
        NewCard {
            name: args.name,
            last4: args.last4,
            credit_limit: args.credit_limit,
            statement_day: args.statement_day,
            due_day: args.due_day,
            grace_period_days: args.grace_days,
            purchase_apr: args.apr,
            min_payment_percent: args.min_payment_percent,
            min_payment_floor: args.min_payment_floor,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new credit card
    AddCard(CardArgs),

    /// Replace the settings of an existing card
    EditCard {
        /// Card ID to edit
        #[arg(long)]
        id: i64,
        #[command(flatten)]
        card: CardArgs,
    },

    /// List saved credit cards
    ListCards {
        /// Include archived cards
        #[arg(long)]
        all: bool,
    },

    /// Remove a card; cards with history are archived unless --purge is given
    RemoveCard {
        /// Card ID to remove
        #[arg(long)]
        id: i64,
        /// Delete the card with all its transactions, payments and statements
        #[arg(long)]
        purge: bool,
    },

    /// Check card settings without saving them
    ValidateCard(CardArgs),

    /// Record a charge (positive) or credit/refund (negative)
    AddTransaction {
        #[arg(long)]
        card: i64,
        #[arg(long, allow_hyphen_values = true)]
        amount: f64,
        #[arg(long)]
        description: String,
        #[arg(long, default_value = "uncategorized")]
        category: String,
        /// Transaction date (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Post date (YYYY-MM-DD)
        #[arg(long)]
        post_date: Option<NaiveDate>,
        /// Mark the transaction as pending
        #[arg(long)]
        pending: bool,
    },

    /// Edit fields of a recorded transaction
    EditTransaction {
        #[arg(long)]
        id: i64,
        #[arg(long, allow_hyphen_values = true)]
        amount: Option<f64>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, conflicts_with = "clear_post_date")]
        post_date: Option<NaiveDate>,
        /// Remove the post date
        #[arg(long)]
        clear_post_date: bool,
        /// Set the pending flag (true/false)
        #[arg(long)]
        pending: Option<bool>,
    },

    /// List transactions of a card
    ListTransactions {
        #[arg(long)]
        card: i64,
    },

    /// Delete a transaction by ID
    RemoveTransaction {
        #[arg(long)]
        id: i64,
    },

    /// Record a payment against a card
    AddPayment {
        #[arg(long)]
        card: i64,
        #[arg(long)]
        amount: f64,
        /// Payment date (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, value_enum, default_value_t = PaymentMethod::BankTransfer)]
        method: PaymentMethod,
        #[arg(long)]
        note: Option<String>,
    },

    /// List payments of a card
    ListPayments {
        #[arg(long)]
        card: i64,
    },

    /// Delete a payment by ID
    RemovePayment {
        #[arg(long)]
        id: i64,
    },

    /// Compute and store the statement closing on a date
    GenerateStatement {
        #[arg(long)]
        card: i64,
        /// Statement date (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// List stored statements of a card
    ListStatements {
        #[arg(long)]
        card: i64,
    },

    /// Show one statement with the activity it covers
    ShowStatement {
        #[arg(long)]
        id: Uuid,
    },

    /// Current balance, available credit and utilization
    Balance {
        #[arg(long)]
        card: i64,
    },
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn print_issues(issues: &[ValidationIssue]) {
    for issue in issues {
        let label = match issue.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        eprintln!("{}: {}", label, issue.message);
    }
}

fn open_db(path: Option<PathBuf>, config: &AppConfig) -> Result<Connection> {
    let path = path.unwrap_or_else(|| config.db_path.clone());
    debug!("opening database {}", path.display());
    db::init_db(path)
}

fn run(cli: Cli, config: &AppConfig) -> Result<()> {
    if let Commands::ValidateCard(args) = &cli.command {
        let issues = validate_card_settings(&NewCard::from(args.clone()));
        if issues.is_empty() {
            println!("Card settings are valid");
            return Ok(());
        }
        print_issues(&issues);
        if has_errors(&issues) {
            return Err(TrackerError::Validation(issues));
        }
        return Ok(());
    }

    let conn = open_db(cli.db, config)?;

    match cli.command {
        Commands::ValidateCard(_) => {}

        Commands::AddCard(args) => {
            let (card, warnings) = service::create_card(&conn, args.into())?;
            print_issues(&warnings);
            println!("Added card '{}' with ID {}", card.settings.name, card.id);
        }

        Commands::EditCard { id, card } => {
            let (card, warnings) = service::edit_card(&conn, id, card.into())?;
            print_issues(&warnings);
            println!("Updated card '{}' (ID {})", card.settings.name, card.id);
        }

        Commands::ListCards { all } => {
            let cards = db::list_cards(&conn, all)?;
            if cards.is_empty() {
                println!("No cards found. Add one with: cc-tracker add-card --name \"...\" --last4 1234 ...");
            } else {
                let rows: Vec<CardRow> = cards.iter().map(CardRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::RemoveCard { id, purge } => match service::remove_card(&conn, id, purge)? {
            Removal::Archived => println!("Card {} has history and was archived (use --purge to delete it)", id),
            Removal::Deleted => println!("Removed card with ID {}", id),
        },

        Commands::AddTransaction {
            card,
            amount,
            description,
            category,
            date,
            post_date,
            pending,
        } => {
            let txn = service::record_transaction(
                &conn,
                card,
                NewTransaction {
                    amount,
                    description,
                    category,
                    transaction_date: date.unwrap_or_else(today),
                    post_date,
                    is_pending: pending,
                },
            )?;
            println!("Recorded transaction {} on card {}", txn.id, card);
        }

        Commands::EditTransaction {
            id,
            amount,
            description,
            category,
            date,
            post_date,
            clear_post_date,
            pending,
        } => {
            let update = TransactionUpdate {
                amount,
                description,
                category,
                transaction_date: date,
                post_date,
                clear_post_date,
                is_pending: pending,
            };
            let txn = service::edit_transaction(&conn, id, update)?;
            println!("{}", Table::new([TransactionRow::from(&txn)]));
        }

        Commands::ListTransactions { card } => {
            service::get_card(&conn, card)?;
            let txns = db::list_transactions(&conn, card)?;
            if txns.is_empty() {
                println!("No transactions for card {}", card);
            } else {
                let rows: Vec<TransactionRow> = txns.iter().map(TransactionRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::RemoveTransaction { id } => {
            if db::delete_transaction(&conn, id)? {
                println!("Removed transaction with ID {}", id);
            } else {
                println!("No transaction found with ID {}", id);
            }
        }

        Commands::AddPayment {
            card,
            amount,
            date,
            method,
            note,
        } => {
            let payment = service::record_payment(
                &conn,
                card,
                NewPayment {
                    amount,
                    payment_date: date.unwrap_or_else(today),
                    method,
                    note,
                },
            )?;
            println!("Recorded payment {} on card {}", payment.id, card);
        }

        Commands::ListPayments { card } => {
            service::get_card(&conn, card)?;
            let payments = db::list_payments(&conn, card)?;
            if payments.is_empty() {
                println!("No payments for card {}", card);
            } else {
                let rows: Vec<PaymentRow> = payments.iter().map(PaymentRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::RemovePayment { id } => {
            if db::delete_payment(&conn, id)? {
                println!("Removed payment with ID {}", id);
            } else {
                println!("No payment found with ID {}", id);
            }
        }

        Commands::GenerateStatement { card, date } => {
            let statement = service::generate_statement(&conn, card, date.unwrap_or_else(today))?;
            println!("Statement {} generated", statement.id);
            println!("{}", Table::new([StatementRow::from(&statement)]));
        }

        Commands::ListStatements { card } => {
            service::get_card(&conn, card)?;
            let statements = db::list_statements(&conn, card)?;
            if statements.is_empty() {
                println!("No statements for card {}. Create one with: cc-tracker generate-statement --card {}", card, card);
            } else {
                let rows: Vec<StatementRow> = statements.iter().map(StatementRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::ShowStatement { id } => {
            let statement = db::get_statement(&conn, id)?
                .ok_or_else(|| TrackerError::NotFound(format!("statement {}", id)))?;
            println!("{}", Table::new([StatementRow::from(&statement)]));
            if !statement.transactions.is_empty() {
                println!("Transactions:");
                let rows: Vec<TransactionRow> = statement.transactions.iter().map(TransactionRow::from).collect();
                println!("{}", Table::new(rows));
            }
            if !statement.payments.is_empty() {
                println!("Payments:");
                let rows: Vec<PaymentRow> = statement.payments.iter().map(PaymentRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::Balance { card } => {
            let summary = service::current_balance(&conn, card)?;
            println!("Current balance:  {:.2}", summary.current_balance);
            println!("Credit limit:     {:.2}", summary.credit_limit);
            println!("Available credit: {:.2}", summary.available_credit);
            println!("Utilization:      {:.1}%", summary.utilization);
            match summary.last_statement_date {
                Some(date) => println!("Last statement:   {}", date),
                None => println!("Last statement:   none"),
            }
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = AppConfig::from_env();
    cc_statement_tracker::init_tracing(&config.log_filter);

    match run(cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
