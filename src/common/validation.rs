// src/common/validation.rs
//
// Regras declarativas usadas pelos payloads (`#[validate(custom(...))]`)
// e conversões de texto para os tipos do domínio.

use chrono::{DateTime, NaiveDate};
use validator::ValidationError;

use crate::{common::error::AppError, models::profile::UserType};

pub fn validate_user_type(value: &str) -> Result<(), ValidationError> {
    if UserType::parse(value).is_some() {
        return Ok(());
    }
    let mut err = ValidationError::new("invalid_user_type");
    err.message = Some("User type must be either \"broker\" or \"investor\"".into());
    Err(err)
}

/// Converte o tipo de usuário opcional do payload, assumindo `broker`.
pub fn user_type_or_default(value: Option<&str>) -> Result<UserType, AppError> {
    match value {
        None => Ok(UserType::Broker),
        Some(raw) => UserType::parse(raw).ok_or_else(|| {
            AppError::invalid(
                "INVALID_USER_TYPE",
                "Invalid user type. Must be broker or investor",
            )
        }),
    }
}

/// Aceita `YYYY-MM-DD` ou um timestamp RFC 3339 (a data é a parte UTC).
pub fn parse_activity_date(raw: &str) -> Result<NaiveDate, AppError> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_utc().date())
        .map_err(|_| AppError::invalid("INVALID_DATE", "Invalid date format"))
}
