use std::path::Path;

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use crate::error::{Result, TrackerError};
use crate::models::{
    Card, NewCard, NewPayment, NewTransaction, Payment, PaymentMethod, Statement, Transaction,
    TransactionUpdate,
};

/// Creates tables on the given connection.
pub fn init_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS cards (
            id                   INTEGER PRIMARY KEY AUTOINCREMENT,
            name                 TEXT NOT NULL,
            last4                TEXT NOT NULL,
            credit_limit         REAL NOT NULL,
            statement_day        INTEGER NOT NULL,
            due_day              INTEGER NOT NULL,
            grace_period_days    INTEGER NOT NULL DEFAULT 0,
            purchase_apr         REAL NOT NULL,
            min_payment_percent  REAL NOT NULL,
            min_payment_floor    REAL NOT NULL DEFAULT 0.0,
            archived             INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS transactions (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            card_id           INTEGER NOT NULL REFERENCES cards(id),
            amount            REAL NOT NULL,
            description       TEXT NOT NULL,
            category          TEXT NOT NULL,
            transaction_date  TEXT NOT NULL,
            post_date         TEXT,
            is_pending        INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS payments (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            card_id       INTEGER NOT NULL REFERENCES cards(id),
            amount        REAL NOT NULL,
            payment_date  TEXT NOT NULL,
            method        TEXT NOT NULL,
            note          TEXT
        );
        CREATE TABLE IF NOT EXISTS statements (
            id                   TEXT PRIMARY KEY,
            card_id              INTEGER NOT NULL REFERENCES cards(id),
            period_start         TEXT NOT NULL,
            period_end           TEXT NOT NULL,
            statement_date       TEXT NOT NULL,
            due_date             TEXT NOT NULL,
            previous_balance     REAL NOT NULL,
            new_charges          REAL NOT NULL,
            payments_total       REAL NOT NULL,
            credits              REAL NOT NULL,
            fees                 REAL NOT NULL,
            interest             REAL NOT NULL,
            statement_balance    REAL NOT NULL,
            minimum_payment_due  REAL NOT NULL,
            transactions_json    TEXT NOT NULL,
            payments_json        TEXT NOT NULL,
            generated_at         TEXT NOT NULL,
            UNIQUE (card_id, statement_date)
        );
        CREATE INDEX IF NOT EXISTS idx_transactions_card ON transactions(card_id, transaction_date);
        CREATE INDEX IF NOT EXISTS idx_payments_card ON payments(card_id, payment_date);",
    )?;
    Ok(())
}

/// Opens (or creates) the SQLite database file and ensures tables exist.
pub fn init_db(path: impl AsRef<Path>) -> Result<Connection> {
    let conn = Connection::open(path)?;
    init_tables(&conn)?;
    Ok(conn)
}

// ---- cards ----

const CARD_COLUMNS: &str = "id, name, last4, credit_limit, statement_day, due_day, grace_period_days,
                purchase_apr, min_payment_percent, min_payment_floor, archived";

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<Card> {
    Ok(Card {
        id: row.get(0)?,
        settings: NewCard {
            name: row.get(1)?,
            last4: row.get(2)?,
            credit_limit: row.get(3)?,
            statement_day: row.get(4)?,
            due_day: row.get(5)?,
            grace_period_days: row.get(6)?,
            purchase_apr: row.get(7)?,
            min_payment_percent: row.get(8)?,
            min_payment_floor: row.get(9)?,
        },
        archived: row.get(10)?,
    })
}

pub fn add_card(conn: &Connection, card: &NewCard) -> Result<i64> {
    conn.execute(
        "INSERT INTO cards (name, last4, credit_limit, statement_day, due_day, grace_period_days,
                            purchase_apr, min_payment_percent, min_payment_floor)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            card.name,
            card.last4,
            card.credit_limit,
            card.statement_day,
            card.due_day,
            card.grace_period_days,
            card.purchase_apr,
            card.min_payment_percent,
            card.min_payment_floor
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_card(conn: &Connection, id: i64) -> Result<Option<Card>> {
    let sql = format!("SELECT {} FROM cards WHERE id = ?1", CARD_COLUMNS);
    let card = conn.query_row(&sql, params![id], card_from_row).optional()?;
    Ok(card)
}

pub fn list_cards(conn: &Connection, include_archived: bool) -> Result<Vec<Card>> {
    let sql = format!(
        "SELECT {} FROM cards WHERE archived = 0 OR ?1 ORDER BY id",
        CARD_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![include_archived], card_from_row)?;

    let mut cards = Vec::new();
    for card in rows {
        cards.push(card?);
    }
    Ok(cards)
}

pub fn update_card(conn: &Connection, id: i64, card: &NewCard) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE cards SET name = ?2, last4 = ?3, credit_limit = ?4, statement_day = ?5, due_day = ?6,
                          grace_period_days = ?7, purchase_apr = ?8, min_payment_percent = ?9,
                          min_payment_floor = ?10
         WHERE id = ?1",
        params![
            id,
            card.name,
            card.last4,
            card.credit_limit,
            card.statement_day,
            card.due_day,
            card.grace_period_days,
            card.purchase_apr,
            card.min_payment_percent,
            card.min_payment_floor
        ],
    )?;
    Ok(changed > 0)
}

pub fn archive_card(conn: &Connection, id: i64) -> Result<bool> {
    let changed = conn.execute("UPDATE cards SET archived = 1 WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

/// True when the card owns any transactions, payments or statements.
pub fn card_has_history(conn: &Connection, id: i64) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM transactions WHERE card_id = ?1)
              + (SELECT COUNT(*) FROM payments WHERE card_id = ?1)
              + (SELECT COUNT(*) FROM statements WHERE card_id = ?1)",
        params![id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Deletes the card together with everything it owns.
pub fn delete_card(conn: &Connection, id: i64) -> Result<bool> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM statements WHERE card_id = ?1", params![id])?;
    tx.execute("DELETE FROM payments WHERE card_id = ?1", params![id])?;
    tx.execute("DELETE FROM transactions WHERE card_id = ?1", params![id])?;
    let changed = tx.execute("DELETE FROM cards WHERE id = ?1", params![id])?;
    tx.commit()?;
    Ok(changed > 0)
}

// ---- transactions ----

const TRANSACTION_COLUMNS: &str =
    "id, card_id, amount, description, category, transaction_date, post_date, is_pending";

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: row.get(0)?,
        card_id: row.get(1)?,
        amount: row.get(2)?,
        description: row.get(3)?,
        category: row.get(4)?,
        transaction_date: row.get(5)?,
        post_date: row.get(6)?,
        is_pending: row.get(7)?,
    })
}

pub fn add_transaction(conn: &Connection, card_id: i64, txn: &NewTransaction) -> Result<i64> {
    conn.execute(
        "INSERT INTO transactions (card_id, amount, description, category, transaction_date, post_date, is_pending)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            card_id,
            txn.amount,
            txn.description,
            txn.category,
            txn.transaction_date,
            txn.post_date,
            txn.is_pending
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_transaction(conn: &Connection, id: i64) -> Result<Option<Transaction>> {
    let sql = format!("SELECT {} FROM transactions WHERE id = ?1", TRANSACTION_COLUMNS);
    let txn = conn.query_row(&sql, params![id], transaction_from_row).optional()?;
    Ok(txn)
}

pub fn list_transactions(conn: &Connection, card_id: i64) -> Result<Vec<Transaction>> {
    let sql = format!(
        "SELECT {} FROM transactions WHERE card_id = ?1 ORDER BY transaction_date, id",
        TRANSACTION_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![card_id], transaction_from_row)?;

    let mut txns = Vec::new();
    for txn in rows {
        txns.push(txn?);
    }
    Ok(txns)
}

/// Applies the given fields and returns the edited transaction.
pub fn update_transaction(conn: &Connection, id: i64, update: &TransactionUpdate) -> Result<Transaction> {
    let mut txn = get_transaction(conn, id)?
        .ok_or_else(|| TrackerError::NotFound(format!("transaction {}", id)))?;

    if let Some(amount) = update.amount {
        txn.amount = amount;
    }
    if let Some(description) = &update.description {
        txn.description = description.clone();
    }
    if let Some(category) = &update.category {
        txn.category = category.clone();
    }
    if let Some(date) = update.transaction_date {
        txn.transaction_date = date;
    }
    if update.clear_post_date {
        txn.post_date = None;
    } else if let Some(date) = update.post_date {
        txn.post_date = Some(date);
    }
    if let Some(pending) = update.is_pending {
        txn.is_pending = pending;
    }

    conn.execute(
        "UPDATE transactions SET amount = ?2, description = ?3, category = ?4, transaction_date = ?5,
                                 post_date = ?6, is_pending = ?7
         WHERE id = ?1",
        params![
            id,
            txn.amount,
            txn.description,
            txn.category,
            txn.transaction_date,
            txn.post_date,
            txn.is_pending
        ],
    )?;
    Ok(txn)
}

pub fn delete_transaction(conn: &Connection, id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM transactions WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

// ---- payments ----

fn payment_from_row(row: &Row<'_>) -> rusqlite::Result<Payment> {
    let method: String = row.get(4)?;
    let method = method.parse::<PaymentMethod>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, Type::Text, e.into())
    })?;
    Ok(Payment {
        id: row.get(0)?,
        card_id: row.get(1)?,
        amount: row.get(2)?,
        payment_date: row.get(3)?,
        method,
        note: row.get(5)?,
    })
}

pub fn add_payment(conn: &Connection, card_id: i64, payment: &NewPayment) -> Result<i64> {
    conn.execute(
        "INSERT INTO payments (card_id, amount, payment_date, method, note)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            card_id,
            payment.amount,
            payment.payment_date,
            payment.method.to_string(),
            payment.note
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_payments(conn: &Connection, card_id: i64) -> Result<Vec<Payment>> {
    let mut stmt = conn.prepare(
        "SELECT id, card_id, amount, payment_date, method, note
         FROM payments WHERE card_id = ?1 ORDER BY payment_date, id",
    )?;
    let rows = stmt.query_map(params![card_id], payment_from_row)?;

    let mut payments = Vec::new();
    for payment in rows {
        payments.push(payment?);
    }
    Ok(payments)
}

pub fn delete_payment(conn: &Connection, id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM payments WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

// ---- statements ----

const STATEMENT_COLUMNS: &str = "id, card_id, period_start, period_end, statement_date, due_date,
                previous_balance, new_charges, payments_total, credits, fees, interest,
                statement_balance, minimum_payment_due, transactions_json, payments_json, generated_at";

fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn statement_from_row(row: &Row<'_>) -> rusqlite::Result<Statement> {
    let id: String = row.get(0)?;
    let id = Uuid::parse_str(&id)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
    Ok(Statement {
        id,
        card_id: row.get(1)?,
        period_start: row.get(2)?,
        period_end: row.get(3)?,
        statement_date: row.get(4)?,
        due_date: row.get(5)?,
        previous_balance: row.get(6)?,
        new_charges: row.get(7)?,
        payments_total: row.get(8)?,
        credits: row.get(9)?,
        fees: row.get(10)?,
        interest: row.get(11)?,
        statement_balance: row.get(12)?,
        minimum_payment_due: row.get(13)?,
        transactions: json_column(row, 14)?,
        payments: json_column(row, 15)?,
        generated_at: row.get(16)?,
    })
}

pub fn insert_statement(conn: &Connection, st: &Statement) -> Result<()> {
    let transactions_json = serde_json::to_string(&st.transactions)?;
    let payments_json = serde_json::to_string(&st.payments)?;
    conn.execute(
        "INSERT INTO statements (id, card_id, period_start, period_end, statement_date, due_date,
                                 previous_balance, new_charges, payments_total, credits, fees, interest,
                                 statement_balance, minimum_payment_due, transactions_json, payments_json,
                                 generated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            st.id.to_string(),
            st.card_id,
            st.period_start,
            st.period_end,
            st.statement_date,
            st.due_date,
            st.previous_balance,
            st.new_charges,
            st.payments_total,
            st.credits,
            st.fees,
            st.interest,
            st.statement_balance,
            st.minimum_payment_due,
            transactions_json,
            payments_json,
            st.generated_at
        ],
    )?;
    Ok(())
}

pub fn get_statement(conn: &Connection, id: Uuid) -> Result<Option<Statement>> {
    let sql = format!("SELECT {} FROM statements WHERE id = ?1", STATEMENT_COLUMNS);
    let st = conn
        .query_row(&sql, params![id.to_string()], statement_from_row)
        .optional()?;
    Ok(st)
}

pub fn list_statements(conn: &Connection, card_id: i64) -> Result<Vec<Statement>> {
    let sql = format!(
        "SELECT {} FROM statements WHERE card_id = ?1 ORDER BY statement_date",
        STATEMENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![card_id], statement_from_row)?;

    let mut statements = Vec::new();
    for st in rows {
        statements.push(st?);
    }
    Ok(statements)
}

pub fn latest_statement(conn: &Connection, card_id: i64) -> Result<Option<Statement>> {
    let sql = format!(
        "SELECT {} FROM statements WHERE card_id = ?1 ORDER BY statement_date DESC LIMIT 1",
        STATEMENT_COLUMNS
    );
    let st = conn
        .query_row(&sql, params![card_id], statement_from_row)
        .optional()?;
    Ok(st)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::engine::compute_statement;

    /// Helper: creates an in-memory DB with tables ready to go.
    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_tables(&conn).unwrap();
        conn
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn new_card(name: &str) -> NewCard {
        NewCard {
            name: name.into(),
            last4: "4242".into(),
            credit_limit: 5_000.0,
            statement_day: 15,
            due_day: 28,
            grace_period_days: 21,
            purchase_apr: 0.1999,
            min_payment_percent: 0.03,
            min_payment_floor: 25.0,
        }
    }

    fn new_txn(amount: f64, date: NaiveDate) -> NewTransaction {
        NewTransaction {
            amount,
            description: "Coffee".into(),
            category: "dining".into(),
            transaction_date: date,
            post_date: None,
            is_pending: false,
        }
    }

    fn new_payment(amount: f64, date: NaiveDate) -> NewPayment {
        NewPayment {
            amount,
            payment_date: date,
            method: PaymentMethod::Autopay,
            note: Some("monthly".into()),
        }
    }

    #[test]
    fn test_add_card() {
        let conn = test_db();

        let id = add_card(&conn, &new_card("DBS Altitude")).unwrap();
        assert_eq!(id, 1);

        let card = get_card(&conn, id).unwrap().unwrap();
        assert_eq!(card.settings, new_card("DBS Altitude"));
        assert!(!card.archived);
    }

    #[test]
    fn test_get_card_missing() {
        let conn = test_db();
        assert!(get_card(&conn, 42).unwrap().is_none());
    }

    #[test]
    fn test_list_cards_empty() {
        let conn = test_db();
        assert!(list_cards(&conn, true).unwrap().is_empty());
    }

    #[test]
    fn test_list_cards_hides_archived() {
        let conn = test_db();

        add_card(&conn, &new_card("Card A")).unwrap();
        let b = add_card(&conn, &new_card("Card B")).unwrap();
        add_card(&conn, &new_card("Card C")).unwrap();
        assert!(archive_card(&conn, b).unwrap());

        let active = list_cards(&conn, false).unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].settings.name, "Card A");
        assert_eq!(active[1].settings.name, "Card C");

        let all = list_cards(&conn, true).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[1].archived);
    }

    #[test]
    fn test_update_card() {
        let conn = test_db();
        let id = add_card(&conn, &new_card("Card A")).unwrap();

        let edited = NewCard { credit_limit: 8_000.0, due_day: 10, ..new_card("Card A+") };
        assert!(update_card(&conn, id, &edited).unwrap());
        assert_eq!(get_card(&conn, id).unwrap().unwrap().settings, edited);

        assert!(!update_card(&conn, 999, &edited).unwrap());
    }

    #[test]
    fn test_delete_card_cascades() {
        let conn = test_db();
        let keep = add_card(&conn, &new_card("Keep")).unwrap();
        let gone = add_card(&conn, &new_card("Gone")).unwrap();

        add_transaction(&conn, gone, &new_txn(10.0, d(2024, 1, 3))).unwrap();
        add_transaction(&conn, keep, &new_txn(20.0, d(2024, 1, 3))).unwrap();
        add_payment(&conn, gone, &new_payment(5.0, d(2024, 1, 4))).unwrap();
        let card = get_card(&conn, gone).unwrap().unwrap();
        let st = compute_statement(&card, None, &[], &[], d(2024, 1, 15)).unwrap();
        insert_statement(&conn, &st).unwrap();
        assert!(card_has_history(&conn, gone).unwrap());

        assert!(delete_card(&conn, gone).unwrap());
        assert!(get_card(&conn, gone).unwrap().is_none());
        assert!(list_transactions(&conn, gone).unwrap().is_empty());
        assert!(list_payments(&conn, gone).unwrap().is_empty());
        assert!(list_statements(&conn, gone).unwrap().is_empty());
        assert!(!card_has_history(&conn, gone).unwrap());

        assert_eq!(list_transactions(&conn, keep).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_card_nonexistent() {
        let conn = test_db();
        assert!(!delete_card(&conn, 999).unwrap());
    }

    #[test]
    fn test_transactions_ordered_by_date() {
        let conn = test_db();
        let card = add_card(&conn, &new_card("Card A")).unwrap();

        add_transaction(&conn, card, &new_txn(3.0, d(2024, 2, 3))).unwrap();
        add_transaction(&conn, card, &new_txn(1.0, d(2024, 2, 1))).unwrap();
        add_transaction(&conn, card, &new_txn(2.0, d(2024, 2, 2))).unwrap();

        let amounts: Vec<f64> = list_transactions(&conn, card)
            .unwrap()
            .iter()
            .map(|t| t.amount)
            .collect();
        assert_eq!(amounts, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_update_transaction() {
        let conn = test_db();
        let card = add_card(&conn, &new_card("Card A")).unwrap();
        let id = add_transaction(
            &conn,
            card,
            &NewTransaction { is_pending: true, ..new_txn(12.5, d(2024, 2, 3)) },
        )
        .unwrap();

        let update = TransactionUpdate {
            is_pending: Some(false),
            post_date: Some(d(2024, 2, 5)),
            description: Some("Coffee beans".into()),
            ..TransactionUpdate::default()
        };
        let edited = update_transaction(&conn, id, &update).unwrap();
        assert!(!edited.is_pending);
        assert_eq!(edited.post_date, Some(d(2024, 2, 5)));
        assert_eq!(edited.amount, 12.5);

        let stored = get_transaction(&conn, id).unwrap().unwrap();
        assert_eq!(stored, edited);
        assert_eq!(stored.description, "Coffee beans");
    }

    #[test]
    fn test_update_transaction_clears_post_date() {
        let conn = test_db();
        let card = add_card(&conn, &new_card("Card A")).unwrap();
        let id = add_transaction(
            &conn,
            card,
            &NewTransaction { post_date: Some(d(2024, 2, 4)), ..new_txn(12.5, d(2024, 2, 3)) },
        )
        .unwrap();

        let update = TransactionUpdate {
            clear_post_date: true,
            post_date: Some(d(2024, 2, 9)),
            is_pending: Some(true),
            ..TransactionUpdate::default()
        };
        let edited = update_transaction(&conn, id, &update).unwrap();
        assert_eq!(edited.post_date, None);
        assert!(edited.is_pending);
        assert_eq!(get_transaction(&conn, id).unwrap().unwrap().post_date, None);
    }

    #[test]
    fn test_update_transaction_missing() {
        let conn = test_db();
        let err = update_transaction(&conn, 7, &TransactionUpdate::default()).unwrap_err();
        assert!(matches!(err, TrackerError::NotFound(_)));
    }

    #[test]
    fn test_delete_transaction() {
        let conn = test_db();
        let card = add_card(&conn, &new_card("Card A")).unwrap();
        let id = add_transaction(&conn, card, &new_txn(1.0, d(2024, 2, 3))).unwrap();

        assert!(delete_transaction(&conn, id).unwrap());
        assert!(!delete_transaction(&conn, id).unwrap());
    }

    #[test]
    fn test_payments_round_trip_method() {
        let conn = test_db();
        let card = add_card(&conn, &new_card("Card A")).unwrap();
        let id = add_payment(&conn, card, &new_payment(75.0, d(2024, 2, 10))).unwrap();

        let payments = list_payments(&conn, card).unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].id, id);
        assert_eq!(payments[0].method, PaymentMethod::Autopay);
        assert_eq!(payments[0].note.as_deref(), Some("monthly"));

        assert!(delete_payment(&conn, id).unwrap());
        assert!(list_payments(&conn, card).unwrap().is_empty());
    }

    #[test]
    fn test_statement_storage_keeps_embedded_activity() {
        let conn = test_db();
        let card_id = add_card(&conn, &new_card("Card A")).unwrap();
        add_transaction(&conn, card_id, &new_txn(100.0, d(2024, 2, 20))).unwrap();
        add_payment(&conn, card_id, &new_payment(40.0, d(2024, 2, 25))).unwrap();

        let card = get_card(&conn, card_id).unwrap().unwrap();
        let txns = list_transactions(&conn, card_id).unwrap();
        let payments = list_payments(&conn, card_id).unwrap();
        let st = compute_statement(&card, None, &txns, &payments, d(2024, 3, 15)).unwrap();
        insert_statement(&conn, &st).unwrap();

        // Live history changes do not leak into the stored snapshot.
        delete_transaction(&conn, txns[0].id).unwrap();

        let stored = get_statement(&conn, st.id).unwrap().unwrap();
        assert_eq!(stored.transactions.len(), 1);
        assert_eq!(stored.payments.len(), 1);
        assert_eq!(stored.statement_balance, 60.0);
        assert_eq!(stored.id, st.id);
    }

    #[test]
    fn test_duplicate_statement_date_rejected() {
        let conn = test_db();
        let card_id = add_card(&conn, &new_card("Card A")).unwrap();
        let card = get_card(&conn, card_id).unwrap().unwrap();

        let st = compute_statement(&card, None, &[], &[], d(2024, 3, 15)).unwrap();
        insert_statement(&conn, &st).unwrap();
        let again = compute_statement(&card, None, &[], &[], d(2024, 3, 15)).unwrap();
        assert!(insert_statement(&conn, &again).is_err());
    }

    #[test]
    fn test_latest_statement_lookups() {
        let conn = test_db();
        let card_id = add_card(&conn, &new_card("Card A")).unwrap();
        let card = get_card(&conn, card_id).unwrap().unwrap();

        for month in [1, 2, 3] {
            let st = compute_statement(&card, None, &[], &[], d(2024, month, 15)).unwrap();
            insert_statement(&conn, &st).unwrap();
        }

        assert!(latest_statement(&conn, 99).unwrap().is_none());

        let latest = latest_statement(&conn, card_id).unwrap().unwrap();
        assert_eq!(latest.statement_date, d(2024, 3, 15));

        assert_eq!(list_statements(&conn, card_id).unwrap().len(), 3);
    }
}
