use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

use crate::db;
use crate::error::{Result, TrackerError};
use crate::models::{
    BalanceSummary, Card, NewCard, NewPayment, NewTransaction, Payment, Statement, Transaction,
    TransactionUpdate,
};
use crate::service::{self, Removal};
use crate::validation::{ValidationIssue, validate_card_settings};

/// Shared handler state: one SQLite connection, serialized behind a mutex.
#[derive(Clone)]
pub struct AppState {
    conn: Arc<Mutex<Connection>>,
}

impl AppState {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }
}

impl IntoResponse for TrackerError {
    fn into_response(self) -> Response {
        let status = match &self {
            TrackerError::Validation(issues) => {
                return (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({ "error": self.to_string(), "issues": issues })),
                )
                    .into_response();
            }
            TrackerError::NotFound(_) => StatusCode::NOT_FOUND,
            TrackerError::InvalidInput(_) | TrackerError::Engine(_) => StatusCode::BAD_REQUEST,
            TrackerError::Db(_) | TrackerError::Serde(_) | TrackerError::Io(_) => {
                error!("request failed: {:?}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct SavedCard {
    pub card: Card,
    pub warnings: Vec<ValidationIssue>,
}

#[derive(Debug, Deserialize)]
pub struct ListCardsQuery {
    #[serde(default)]
    pub include_archived: bool,
}

#[derive(Debug, Deserialize)]
pub struct RemoveCardQuery {
    #[serde(default)]
    pub purge: bool,
}

#[derive(Debug, Deserialize)]
pub struct GenerateStatementRequest {
    pub statement_date: NaiveDate,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/cards", get(list_cards).post(create_card))
        .route("/cards/validate", post(validate_card))
        .route("/cards/:id", get(get_card).put(edit_card).delete(remove_card))
        .route("/cards/:id/transactions", get(list_transactions).post(create_transaction))
        .route("/cards/:id/payments", get(list_payments).post(create_payment))
        .route("/cards/:id/statements", get(list_statements).post(generate_statement))
        .route("/cards/:id/balance", get(card_balance))
        .route("/transactions/:id", patch(edit_transaction).delete(remove_transaction))
        .route("/payments/:id", delete(remove_payment))
        .route("/statements/:id", get(get_statement))
        .with_state(state)
}

async fn list_cards(
    State(state): State<AppState>,
    Query(query): Query<ListCardsQuery>,
) -> Result<Json<Vec<Card>>> {
    let conn = state.conn.lock().await;
    Ok(Json(db::list_cards(&conn, query.include_archived)?))
}

async fn create_card(
    State(state): State<AppState>,
    Json(settings): Json<NewCard>,
) -> Result<(StatusCode, Json<SavedCard>)> {
    info!("POST /api/cards - name: {}", settings.name);
    let conn = state.conn.lock().await;
    let (card, warnings) = service::create_card(&conn, settings)?;
    Ok((StatusCode::CREATED, Json(SavedCard { card, warnings })))
}

async fn validate_card(Json(settings): Json<NewCard>) -> Json<Vec<ValidationIssue>> {
    Json(validate_card_settings(&settings))
}

async fn get_card(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Card>> {
    let conn = state.conn.lock().await;
    Ok(Json(service::get_card(&conn, id)?))
}

async fn edit_card(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(settings): Json<NewCard>,
) -> Result<Json<SavedCard>> {
    info!("PUT /api/cards/{}", id);
    let conn = state.conn.lock().await;
    let (card, warnings) = service::edit_card(&conn, id, settings)?;
    Ok(Json(SavedCard { card, warnings }))
}

async fn remove_card(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<RemoveCardQuery>,
) -> Result<Json<serde_json::Value>> {
    info!("DELETE /api/cards/{} - purge: {}", id, query.purge);
    let conn = state.conn.lock().await;
    let removal: Removal = service::remove_card(&conn, id, query.purge)?;
    Ok(Json(json!({ "id": id, "removal": removal })))
}

async fn list_transactions(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Transaction>>> {
    let conn = state.conn.lock().await;
    service::get_card(&conn, id)?;
    Ok(Json(db::list_transactions(&conn, id)?))
}

async fn create_transaction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(txn): Json<NewTransaction>,
) -> Result<(StatusCode, Json<Transaction>)> {
    info!("POST /api/cards/{}/transactions - amount: {}", id, txn.amount);
    let conn = state.conn.lock().await;
    let txn = service::record_transaction(&conn, id, txn)?;
    Ok((StatusCode::CREATED, Json(txn)))
}

async fn edit_transaction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<TransactionUpdate>,
) -> Result<Json<Transaction>> {
    let conn = state.conn.lock().await;
    Ok(Json(service::edit_transaction(&conn, id, update)?))
}

async fn remove_transaction(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    let conn = state.conn.lock().await;
    if db::delete_transaction(&conn, id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(TrackerError::NotFound(format!("transaction {}", id)))
    }
}

async fn list_payments(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Payment>>> {
    let conn = state.conn.lock().await;
    service::get_card(&conn, id)?;
    Ok(Json(db::list_payments(&conn, id)?))
}

async fn create_payment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payment): Json<NewPayment>,
) -> Result<(StatusCode, Json<Payment>)> {
    info!("POST /api/cards/{}/payments - amount: {}", id, payment.amount);
    let conn = state.conn.lock().await;
    let payment = service::record_payment(&conn, id, payment)?;
    Ok((StatusCode::CREATED, Json(payment)))
}

async fn remove_payment(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    let conn = state.conn.lock().await;
    if db::delete_payment(&conn, id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(TrackerError::NotFound(format!("payment {}", id)))
    }
}

async fn list_statements(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Statement>>> {
    let conn = state.conn.lock().await;
    service::get_card(&conn, id)?;
    Ok(Json(db::list_statements(&conn, id)?))
}

async fn generate_statement(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<GenerateStatementRequest>,
) -> Result<(StatusCode, Json<Statement>)> {
    info!("POST /api/cards/{}/statements - date: {}", id, request.statement_date);
    let conn = state.conn.lock().await;
    let statement = service::generate_statement(&conn, id, request.statement_date)?;
    Ok((StatusCode::CREATED, Json(statement)))
}

async fn get_statement(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Statement>> {
    let conn = state.conn.lock().await;
    db::get_statement(&conn, id)?
        .map(Json)
        .ok_or_else(|| TrackerError::NotFound(format!("statement {}", id)))
}

async fn card_balance(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<BalanceSummary>> {
    let conn = state.conn.lock().await;
    Ok(Json(service::current_balance(&conn, id)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let conn = Connection::open_in_memory().unwrap();
        db::init_tables(&conn).unwrap();
        router(AppState::new(conn))
    }

    fn card_json() -> Value {
        json!({
            "name": "Everyday Visa",
            "last4": "1234",
            "credit_limit": 10000000.0,
            "statement_day": 5,
            "due_day": 25,
            "grace_period_days": 20,
            "purchase_apr": 0.24,
            "min_payment_percent": 0.02,
            "min_payment_floor": 0.0
        })
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_create_and_get_card() {
        let app = test_app();

        let (status, body) = send(&app, Method::POST, "/cards", Some(card_json())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["card"]["id"], 1);
        assert_eq!(body["warnings"], json!([]));

        let (status, body) = send(&app, Method::GET, "/cards/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Everyday Visa");
        assert_eq!(body["archived"], false);
    }

    #[tokio::test]
    async fn test_invalid_card_is_unprocessable() {
        let app = test_app();
        let mut card = card_json();
        card["last4"] = json!("12a4");

        let (status, body) = send(&app, Method::POST, "/cards", Some(card)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["issues"][0]["code"], "invalid_last4");
        assert_eq!(body["issues"][0]["severity"], "error");
    }

    #[tokio::test]
    async fn test_validate_endpoint_reports_warnings() {
        let app = test_app();
        let mut card = card_json();
        card["statement_day"] = json!(20);
        card["due_day"] = json!(10);

        let (status, body) = send(&app, Method::POST, "/cards/validate", Some(card)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["severity"], "warning");
        assert_eq!(body[0]["code"], "due_day_before_statement_day");
    }

    #[tokio::test]
    async fn test_missing_card_is_not_found() {
        let app = test_app();
        let (status, _) = send(&app, Method::GET, "/cards/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, Method::GET, "/cards/42/balance", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_statement_flow() {
        let app = test_app();
        send(&app, Method::POST, "/cards", Some(card_json())).await;

        let txn = json!({
            "amount": 500000.0,
            "description": "Laptop",
            "category": "shopping",
            "transaction_date": "2024-02-20"
        });
        let (status, body) = send(&app, Method::POST, "/cards/1/transactions", Some(txn)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["is_pending"], false);

        let (status, body) = send(
            &app,
            Method::POST,
            "/cards/1/statements",
            Some(json!({ "statement_date": "2024-03-05" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["statement_balance"], 500000.0);
        assert_eq!(body["minimum_payment_due"], 10000.0);
        assert_eq!(body["due_date"], "2024-03-25");
        let statement_id = body["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, Method::GET, &format!("/statements/{}", statement_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transactions"].as_array().unwrap().len(), 1);

        let (status, _) = send(
            &app,
            Method::POST,
            "/cards/1/statements",
            Some(json!({ "statement_date": "2024-03-05" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let payment = json!({ "amount": 100000.0, "payment_date": "2024-03-10", "method": "bank_transfer" });
        let (status, _) = send(&app, Method::POST, "/cards/1/payments", Some(payment)).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(&app, Method::GET, "/cards/1/balance", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["current_balance"], 400000.0);
        assert_eq!(body["utilization"], 4.0);
    }

    #[tokio::test]
    async fn test_remove_card_archives_then_purges() {
        let app = test_app();
        send(&app, Method::POST, "/cards", Some(card_json())).await;
        let payment = json!({ "amount": 10.0, "payment_date": "2024-03-10", "method": "cash" });
        send(&app, Method::POST, "/cards/1/payments", Some(payment)).await;

        let (status, body) = send(&app, Method::DELETE, "/cards/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removal"], "archived");

        let (_, body) = send(&app, Method::GET, "/cards", None).await;
        assert_eq!(body, json!([]));
        let (_, body) = send(&app, Method::GET, "/cards?include_archived=true", None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (_, body) = send(&app, Method::DELETE, "/cards/1?purge=true", None).await;
        assert_eq!(body["removal"], "deleted");
        let (status, _) = send(&app, Method::GET, "/cards/1/payments", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_edit_and_delete_transaction() {
        let app = test_app();
        send(&app, Method::POST, "/cards", Some(card_json())).await;
        let txn = json!({
            "amount": 12.0,
            "description": "Taxi",
            "transaction_date": "2024-02-20",
            "is_pending": true
        });
        let (_, body) = send(&app, Method::POST, "/cards/1/transactions", Some(txn)).await;
        assert_eq!(body["category"], "uncategorized");

        let (status, body) = send(
            &app,
            Method::PATCH,
            "/transactions/1",
            Some(json!({ "is_pending": false, "post_date": "2024-02-21" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_pending"], false);
        assert_eq!(body["post_date"], "2024-02-21");

        let (status, _) = send(&app, Method::DELETE, "/transactions/1", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, Method::DELETE, "/transactions/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
