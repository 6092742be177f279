use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tabled::Tabled;
use uuid::Uuid;

/// Billing configuration of one credit card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: i64,
    #[serde(flatten)]
    pub settings: NewCard,
    /// Archived cards keep their history but accept no new activity.
    pub archived: bool,
}

/// Editable card settings, as submitted by a card form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCard {
    pub name: String,
    /// Last four digits printed on the card
    pub last4: String,
    pub credit_limit: f64,
    /// Day of month the statement closes (1-28)
    pub statement_day: u32,
    /// Day of month the payment is due (1-28)
    pub due_day: u32,
    pub grace_period_days: u32,
    /// Annual purchase rate as a fraction (0.1999 = 19.99%)
    pub purchase_apr: f64,
    /// Minimum payment as a fraction of the statement balance
    pub min_payment_percent: f64,
    pub min_payment_floor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub card_id: i64,
    /// Positive for charges, negative for credits and refunds
    pub amount: f64,
    pub description: String,
    pub category: String,
    pub transaction_date: NaiveDate,
    pub post_date: Option<NaiveDate>,
    pub is_pending: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub amount: f64,
    pub description: String,
    #[serde(default = "default_category")]
    pub category: String,
    pub transaction_date: NaiveDate,
    #[serde(default)]
    pub post_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_pending: bool,
}

/// Partial edit of a transaction; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionUpdate {
    pub amount: Option<f64>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub transaction_date: Option<NaiveDate>,
    pub post_date: Option<NaiveDate>,
    /// Removes the post date; takes precedence over `post_date`.
    #[serde(default)]
    pub clear_post_date: bool,
    pub is_pending: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
    Autopay,
    DebitCard,
    Cash,
    Other,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Autopay => "autopay",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Other => "other",
        };
        f.write_str(label)
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "autopay" => Ok(PaymentMethod::Autopay),
            "debit_card" => Ok(PaymentMethod::DebitCard),
            "cash" => Ok(PaymentMethod::Cash),
            "other" => Ok(PaymentMethod::Other),
            other => Err(format!("unknown payment method '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub card_id: i64,
    pub amount: f64,
    pub payment_date: NaiveDate,
    pub method: PaymentMethod,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPayment {
    pub amount: f64,
    pub payment_date: NaiveDate,
    pub method: PaymentMethod,
    #[serde(default)]
    pub note: Option<String>,
}

/// Point-in-time billing snapshot. Generated once, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub id: Uuid,
    pub card_id: i64,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub statement_date: NaiveDate,
    pub due_date: NaiveDate,
    pub previous_balance: f64,
    pub new_charges: f64,
    pub payments_total: f64,
    pub credits: f64,
    /// Always zero for now; late and over-limit fees are not assessed.
    pub fees: f64,
    pub interest: f64,
    pub statement_balance: f64,
    pub minimum_payment_due: f64,
    pub transactions: Vec<Transaction>,
    pub payments: Vec<Payment>,
    pub generated_at: DateTime<Utc>,
}

/// Live position of a card between statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSummary {
    pub card_id: i64,
    pub current_balance: f64,
    pub credit_limit: f64,
    pub available_credit: f64,
    /// Percentage of the limit in use; exceeds 100 when over limit
    pub utilization: f64,
    pub last_statement_date: Option<NaiveDate>,
}

fn default_category() -> String {
    "uncategorized".to_string()
}

/// Row view for card tables.
#[derive(Debug, Clone, Tabled)]
pub struct CardRow {
    pub id: i64,
    pub name: String,
    pub last4: String,
    pub credit_limit: f64,
    pub statement_day: u32,
    pub due_day: u32,
    pub grace_days: u32,
    #[tabled(rename = "apr_%")]
    pub apr_percent: String,
    #[tabled(rename = "min_pay_%")]
    pub min_payment_percent: String,
    pub min_floor: f64,
    pub archived: bool,
}

impl From<&Card> for CardRow {
    fn from(card: &Card) -> Self {
        let s = &card.settings;
        Self {
            id: card.id,
            name: s.name.clone(),
            last4: s.last4.clone(),
            credit_limit: s.credit_limit,
            statement_day: s.statement_day,
            due_day: s.due_day,
            grace_days: s.grace_period_days,
            apr_percent: format!("{:.2}", s.purchase_apr * 100.0),
            min_payment_percent: format!("{:.2}", s.min_payment_percent * 100.0),
            min_floor: s.min_payment_floor,
            archived: card.archived,
        }
    }
}

#[derive(Debug, Clone, Tabled)]
pub struct TransactionRow {
    pub id: i64,
    pub date: NaiveDate,
    pub amount: f64,
    pub description: String,
    pub category: String,
    pub posted: String,
    pub pending: bool,
}

impl From<&Transaction> for TransactionRow {
    fn from(txn: &Transaction) -> Self {
        Self {
            id: txn.id,
            date: txn.transaction_date,
            amount: txn.amount,
            description: txn.description.clone(),
            category: txn.category.clone(),
            posted: txn.post_date.map(|d| d.to_string()).unwrap_or_default(),
            pending: txn.is_pending,
        }
    }
}

#[derive(Debug, Clone, Tabled)]
pub struct PaymentRow {
    pub id: i64,
    pub date: NaiveDate,
    pub amount: f64,
    pub method: PaymentMethod,
    pub note: String,
}

impl From<&Payment> for PaymentRow {
    fn from(payment: &Payment) -> Self {
        Self {
            id: payment.id,
            date: payment.payment_date,
            amount: payment.amount,
            method: payment.method,
            note: payment.note.clone().unwrap_or_default(),
        }
    }
}

/// Summary line for a statement; the embedded activity is listed separately.
#[derive(Debug, Clone, Tabled)]
pub struct StatementRow {
    pub statement_date: NaiveDate,
    pub period: String,
    pub due_date: NaiveDate,
    pub previous: f64,
    pub charges: f64,
    pub payments: f64,
    pub credits: f64,
    pub interest: f64,
    pub balance: f64,
    pub minimum_due: f64,
}

impl From<&Statement> for StatementRow {
    fn from(st: &Statement) -> Self {
        Self {
            statement_date: st.statement_date,
            period: format!("{} .. {}", st.period_start, st.period_end),
            due_date: st.due_date,
            previous: st.previous_balance,
            charges: st.new_charges,
            payments: st.payments_total,
            credits: st.credits,
            interest: st.interest,
            balance: st.statement_balance,
            minimum_due: st.minimum_payment_due,
        }
    }
}
