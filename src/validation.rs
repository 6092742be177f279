//! Card settings validation.
//!
//! Hard errors block saving a card; warnings are informational only.

use serde::{Deserialize, Serialize};

use crate::models::NewCard;

pub const MIN_CYCLE_DAY: u32 = 1;
pub const MAX_CYCLE_DAY: u32 = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    StatementDayOutOfRange,
    DueDayOutOfRange,
    CreditLimitNotPositive,
    AprOutOfRange,
    MinPaymentPercentOutOfRange,
    MinPaymentFloorNegative,
    InvalidLast4,
    DueDayBeforeStatementDay,
}

impl IssueCode {
    pub fn severity(self) -> Severity {
        match self {
            IssueCode::DueDayBeforeStatementDay => Severity::Warning,
            _ => Severity::Error,
        }
    }

    fn message(self) -> &'static str {
        match self {
            IssueCode::StatementDayOutOfRange => "statement day must be between 1 and 28",
            IssueCode::DueDayOutOfRange => "due day must be between 1 and 28",
            IssueCode::CreditLimitNotPositive => "credit limit must be greater than zero",
            IssueCode::AprOutOfRange => "purchase APR must be a fraction between 0 and 1",
            IssueCode::MinPaymentPercentOutOfRange => {
                "minimum payment percent must be a fraction between 0 and 1"
            }
            IssueCode::MinPaymentFloorNegative => "minimum payment floor cannot be negative",
            IssueCode::InvalidLast4 => "last4 must be exactly 4 digits",
            IssueCode::DueDayBeforeStatementDay => {
                "due day falls earlier in the month than the statement day; payments are due the following month"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: IssueCode,
    pub message: String,
}

impl From<IssueCode> for ValidationIssue {
    fn from(code: IssueCode) -> Self {
        Self {
            severity: code.severity(),
            code,
            message: code.message().to_string(),
        }
    }
}

impl ValidationIssue {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// True when any issue should block submission.
pub fn has_errors(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(ValidationIssue::is_error)
}

fn in_cycle_range(day: u32) -> bool {
    (MIN_CYCLE_DAY..=MAX_CYCLE_DAY).contains(&day)
}

fn is_fraction(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

pub fn validate_card_settings(card: &NewCard) -> Vec<ValidationIssue> {
    let mut codes = Vec::new();

    let statement_day_ok = in_cycle_range(card.statement_day);
    let due_day_ok = in_cycle_range(card.due_day);
    if !statement_day_ok {
        codes.push(IssueCode::StatementDayOutOfRange);
    }
    if !due_day_ok {
        codes.push(IssueCode::DueDayOutOfRange);
    }
    if !(card.credit_limit.is_finite() && card.credit_limit > 0.0) {
        codes.push(IssueCode::CreditLimitNotPositive);
    }
    if !is_fraction(card.purchase_apr) {
        codes.push(IssueCode::AprOutOfRange);
    }
    if !is_fraction(card.min_payment_percent) {
        codes.push(IssueCode::MinPaymentPercentOutOfRange);
    }
    if !(card.min_payment_floor.is_finite() && card.min_payment_floor >= 0.0) {
        codes.push(IssueCode::MinPaymentFloorNegative);
    }
    if card.last4.len() != 4 || !card.last4.chars().all(|c| c.is_ascii_digit()) {
        codes.push(IssueCode::InvalidLast4);
    }
    if statement_day_ok && due_day_ok && card.due_day < card.statement_day {
        codes.push(IssueCode::DueDayBeforeStatementDay);
    }

    codes.into_iter().map(ValidationIssue::from).collect()
}
