//! Card workflows: validate, load a consistent snapshot, run the engine, persist.

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::db;
use crate::engine;
use crate::error::{Result, TrackerError};
use crate::models::{
    BalanceSummary, Card, NewCard, NewPayment, NewTransaction, Payment, Statement, Transaction,
    TransactionUpdate,
};
use crate::validation::{ValidationIssue, has_errors, validate_card_settings};

/// What `remove_card` ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Removal {
    Archived,
    Deleted,
}

fn check_settings(card: &NewCard) -> Result<Vec<ValidationIssue>> {
    let issues = validate_card_settings(card);
    if has_errors(&issues) {
        return Err(TrackerError::Validation(issues));
    }
    for issue in &issues {
        warn!(code = ?issue.code, "{}", issue.message);
    }
    Ok(issues)
}

fn require_card(conn: &Connection, card_id: i64) -> Result<Card> {
    db::get_card(conn, card_id)?.ok_or_else(|| TrackerError::NotFound(format!("card {}", card_id)))
}

fn require_active_card(conn: &Connection, card_id: i64) -> Result<Card> {
    let card = require_card(conn, card_id)?;
    if card.archived {
        return Err(TrackerError::InvalidInput(format!(
            "card {} is archived",
            card_id
        )));
    }
    Ok(card)
}

pub fn get_card(conn: &Connection, card_id: i64) -> Result<Card> {
    require_card(conn, card_id)
}

/// Stores a new card; returns it together with any non-blocking warnings.
pub fn create_card(conn: &Connection, settings: NewCard) -> Result<(Card, Vec<ValidationIssue>)> {
    let warnings = check_settings(&settings)?;
    let id = db::add_card(conn, &settings)?;
    info!(card_id = id, name = %settings.name, "card created");
    Ok((
        Card {
            id,
            settings,
            archived: false,
        },
        warnings,
    ))
}

pub fn edit_card(conn: &Connection, card_id: i64, settings: NewCard) -> Result<(Card, Vec<ValidationIssue>)> {
    let existing = require_card(conn, card_id)?;
    let warnings = check_settings(&settings)?;
    db::update_card(conn, card_id, &settings)?;
    info!(card_id, "card updated");
    Ok((
        Card {
            id: card_id,
            settings,
            archived: existing.archived,
        },
        warnings,
    ))
}

/// Archives a card that still has history, unless `purge` asks for a cascading delete.
pub fn remove_card(conn: &Connection, card_id: i64, purge: bool) -> Result<Removal> {
    require_card(conn, card_id)?;
    if !purge && db::card_has_history(conn, card_id)? {
        db::archive_card(conn, card_id)?;
        info!(card_id, "card archived");
        return Ok(Removal::Archived);
    }
    db::delete_card(conn, card_id)?;
    info!(card_id, purge, "card deleted");
    Ok(Removal::Deleted)
}

pub fn record_transaction(conn: &Connection, card_id: i64, txn: NewTransaction) -> Result<Transaction> {
    require_active_card(conn, card_id)?;
    if !txn.amount.is_finite() || txn.amount == 0.0 {
        return Err(TrackerError::InvalidInput(
            "transaction amount must be a non-zero number".into(),
        ));
    }
    if txn.description.trim().is_empty() {
        return Err(TrackerError::InvalidInput("description is required".into()));
    }
    let id = db::add_transaction(conn, card_id, &txn)?;
    debug!(card_id, transaction_id = id, amount = txn.amount, "transaction recorded");
    Ok(Transaction {
        id,
        card_id,
        amount: txn.amount,
        description: txn.description,
        category: txn.category,
        transaction_date: txn.transaction_date,
        post_date: txn.post_date,
        is_pending: txn.is_pending,
    })
}

pub fn edit_transaction(conn: &Connection, transaction_id: i64, update: TransactionUpdate) -> Result<Transaction> {
    let existing = db::get_transaction(conn, transaction_id)?
        .ok_or_else(|| TrackerError::NotFound(format!("transaction {}", transaction_id)))?;
    require_active_card(conn, existing.card_id)?;
    if let Some(amount) = update.amount {
        if !amount.is_finite() || amount == 0.0 {
            return Err(TrackerError::InvalidInput(
                "transaction amount must be a non-zero number".into(),
            ));
        }
    }
    let txn = db::update_transaction(conn, transaction_id, &update)?;
    debug!(transaction_id, "transaction updated");
    Ok(txn)
}

pub fn record_payment(conn: &Connection, card_id: i64, payment: NewPayment) -> Result<Payment> {
    require_active_card(conn, card_id)?;
    if !payment.amount.is_finite() || payment.amount <= 0.0 {
        return Err(TrackerError::InvalidInput(
            "payment amount must be greater than zero".into(),
        ));
    }
    let id = db::add_payment(conn, card_id, &payment)?;
    debug!(card_id, payment_id = id, amount = payment.amount, "payment recorded");
    Ok(Payment {
        id,
        card_id,
        amount: payment.amount,
        payment_date: payment.payment_date,
        method: payment.method,
        note: payment.note,
    })
}

/// Computes and stores the statement closing on `statement_date`.
///
/// Statements form an append-only chain: the new one must close a billing
/// cycle later than the latest stored statement, which becomes its predecessor.
pub fn generate_statement(conn: &Connection, card_id: i64, statement_date: NaiveDate) -> Result<Statement> {
    let card = require_active_card(conn, card_id)?;
    let previous = db::latest_statement(conn, card_id)?;
    if let Some(latest) = &previous {
        let (_, period_end) = engine::billing_period(statement_date, card.settings.statement_day);
        if statement_date <= latest.statement_date || period_end <= latest.period_end {
            return Err(TrackerError::InvalidInput(format!(
                "card {} already has a statement dated {} covering through {}; {} does not close a later cycle",
                card_id, latest.statement_date, latest.period_end, statement_date
            )));
        }
    }

    let transactions = db::list_transactions(conn, card_id)?;
    let payments = db::list_payments(conn, card_id)?;
    debug!(
        card_id,
        transactions = transactions.len(),
        payments = payments.len(),
        has_previous = previous.is_some(),
        "computing statement"
    );

    let statement =
        engine::compute_statement(&card, previous.as_ref(), &transactions, &payments, statement_date)?;
    db::insert_statement(conn, &statement)?;
    info!(
        card_id,
        statement_id = %statement.id,
        balance = statement.statement_balance,
        due = %statement.due_date,
        "statement generated"
    );
    Ok(statement)
}

pub fn current_balance(conn: &Connection, card_id: i64) -> Result<BalanceSummary> {
    let card = require_card(conn, card_id)?;
    let last = db::latest_statement(conn, card_id)?;
    let transactions = db::list_transactions(conn, card_id)?;
    let payments = db::list_payments(conn, card_id)?;

    let balance = engine::get_current_balance(last.as_ref(), &transactions, &payments);
    let limit = card.settings.credit_limit;
    Ok(BalanceSummary {
        card_id,
        current_balance: balance,
        credit_limit: limit,
        available_credit: engine::round_currency(limit - balance),
        utilization: engine::calculate_utilization(balance, limit),
        last_statement_date: last.map(|st| st.statement_date),
    })
}
