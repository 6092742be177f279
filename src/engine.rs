//! Statement engine: pure billing-cycle arithmetic for one card.
//!
//! Nothing here touches storage. Callers hand in a consistent snapshot of a
//! card's history and persist the returned [`Statement`] as-is.

use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::dates::{epoch, shift_months, with_day_clamped};
use crate::error::EngineError;
use crate::models::{Card, Payment, Statement, Transaction};
use crate::validation::{MAX_CYCLE_DAY, MIN_CYCLE_DAY};

/// Rounds a currency amount to two decimal places, half away from zero.
pub fn round_currency(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// One month of interest on `balance` at annual rate `apr` (a fraction).
pub fn calculate_monthly_interest(balance: f64, apr: f64) -> f64 {
    round_currency(balance * (apr / 12.0))
}

/// Percentage-based minimum payment. The card's floor is not applied here;
/// callers that want it take `max(result, floor)` themselves.
pub fn calculate_minimum_payment(balance: f64, min_payment_percent: f64) -> f64 {
    round_currency(balance * min_payment_percent)
}

/// Share of the credit limit in use, on a 0-100 scale.
pub fn calculate_utilization(balance: f64, credit_limit: f64) -> f64 {
    if credit_limit == 0.0 {
        return 0.0;
    }
    balance / credit_limit * 100.0
}

/// Due date for a statement: grace period first, then snapped to `due_day`.
/// Always strictly after `statement_date`.
pub fn get_next_due_date(statement_date: NaiveDate, due_day: u32, grace_period_days: u32) -> NaiveDate {
    let after_grace = statement_date + Duration::days(i64::from(grace_period_days));
    let due = with_day_clamped(after_grace, due_day);
    if due > statement_date {
        due
    } else {
        with_day_clamped(shift_months(due, 1), due_day)
    }
}

/// Inclusive `[start, end]` window a statement covers.
pub fn billing_period(statement_date: NaiveDate, statement_day: u32) -> (NaiveDate, NaiveDate) {
    let period_end = with_day_clamped(statement_date, statement_day);
    let previous_close = with_day_clamped(shift_months(statement_date, -1), statement_day);
    (previous_close + Duration::days(1), period_end)
}

fn check_inputs(card: &Card, transactions: &[Transaction], payments: &[Payment]) -> Result<(), EngineError> {
    let s = &card.settings;
    let cycle = MIN_CYCLE_DAY..=MAX_CYCLE_DAY;
    if !cycle.contains(&s.statement_day) {
        return Err(EngineError::InvalidInput(format!(
            "card {} has statement day {}",
            card.id, s.statement_day
        )));
    }
    if !cycle.contains(&s.due_day) {
        return Err(EngineError::InvalidInput(format!(
            "card {} has due day {}",
            card.id, s.due_day
        )));
    }
    if !s.purchase_apr.is_finite() || !s.min_payment_percent.is_finite() {
        return Err(EngineError::InvalidInput(format!(
            "card {} has a non-numeric rate",
            card.id
        )));
    }
    if let Some(txn) = transactions.iter().find(|t| !t.amount.is_finite()) {
        return Err(EngineError::InvalidInput(format!(
            "transaction {} has a non-numeric amount",
            txn.id
        )));
    }
    if let Some(payment) = payments.iter().find(|p| !p.amount.is_finite()) {
        return Err(EngineError::InvalidInput(format!(
            "payment {} has a non-numeric amount",
            payment.id
        )));
    }
    Ok(())
}

/// Computes the statement closing on `statement_date`.
///
/// `previous` is the latest statement before this one, if any. Interest is
/// charged on whatever part of its balance its own payments did not cover;
/// a fully paid previous statement earns none.
pub fn compute_statement(
    card: &Card,
    previous: Option<&Statement>,
    transactions: &[Transaction],
    payments: &[Payment],
    statement_date: NaiveDate,
) -> Result<Statement, EngineError> {
    check_inputs(card, transactions, payments)?;
    let settings = &card.settings;

    let (period_start, period_end) = billing_period(statement_date, settings.statement_day);
    let in_period = |date: NaiveDate| date >= period_start && date <= period_end;

    let previous_balance = previous.map_or(0.0, |st| st.statement_balance);
    let interest = match previous {
        Some(st) => {
            let paid: f64 = st.payments.iter().map(|p| p.amount).sum();
            let unpaid = round_currency(st.statement_balance - paid);
            if unpaid > 0.0 {
                calculate_monthly_interest(unpaid, settings.purchase_apr)
            } else {
                0.0
            }
        }
        None => 0.0,
    };

    let period_transactions: Vec<Transaction> = transactions
        .iter()
        .filter(|t| !t.is_pending && in_period(t.transaction_date))
        .cloned()
        .collect();
    let period_payments: Vec<Payment> = payments
        .iter()
        .filter(|p| in_period(p.payment_date))
        .cloned()
        .collect();

    let new_charges = round_currency(
        period_transactions
            .iter()
            .filter(|t| t.amount > 0.0)
            .map(|t| t.amount.abs())
            .sum(),
    );
    let credits = round_currency(
        period_transactions
            .iter()
            .filter(|t| t.amount < 0.0)
            .map(|t| t.amount.abs())
            .sum(),
    );
    let payments_total = round_currency(period_payments.iter().map(|p| p.amount).sum());
    let fees = 0.0;

    let statement_balance =
        round_currency(previous_balance + new_charges - payments_total - credits + fees + interest);
    let minimum_payment_due = calculate_minimum_payment(statement_balance, settings.min_payment_percent);
    let due_date = get_next_due_date(statement_date, settings.due_day, settings.grace_period_days);

    Ok(Statement {
        id: Uuid::new_v4(),
        card_id: card.id,
        period_start,
        period_end,
        statement_date,
        due_date,
        previous_balance,
        new_charges,
        payments_total,
        credits,
        fees,
        interest,
        statement_balance,
        minimum_payment_due,
        transactions: period_transactions,
        payments: period_payments,
        generated_at: Utc::now(),
    })
}

/// Balance as of today: the last statement plus everything posted after it.
pub fn get_current_balance(
    last_statement: Option<&Statement>,
    recent_transactions: &[Transaction],
    recent_payments: &[Payment],
) -> f64 {
    let statement_balance = last_statement.map_or(0.0, |st| st.statement_balance);
    let since = last_statement.map_or_else(epoch, |st| st.statement_date);

    let transactions_total: f64 = recent_transactions
        .iter()
        .filter(|t| !t.is_pending && t.transaction_date > since)
        .map(|t| t.amount)
        .sum();
    let payments_total: f64 = recent_payments
        .iter()
        .filter(|p| p.payment_date > since)
        .map(|p| p.amount)
        .sum();

    round_currency(statement_balance + transactions_total - payments_total)
}
