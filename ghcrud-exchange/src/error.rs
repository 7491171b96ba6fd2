use std::fmt::{Debug, Display};

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::{Serialize, ser::SerializeStruct};

/// Failure reported to the browser as `{"error": message}`.
#[derive(Debug, Clone, thiserror::Error)]
pub struct ExchangeError {
    pub status: StatusCode,
    pub message: String,
    // may include provider internals, never sent to the browser
    pub verbose_message: String,
}

impl ExchangeError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status,
            verbose_message: message.clone(),
            message,
        }
    }
}

impl Display for ExchangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.status)
    }
}

impl Serialize for ExchangeError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut serializer = serializer.serialize_struct("ExchangeError", 1)?;
        serializer.serialize_field("error", &self.message)?;
        serializer.end()
    }
}

pub trait ToExchangeError {
    type Value;
    fn exchange_error(self, status: StatusCode, message: &str) -> Result<Self::Value, ExchangeError>;
}

impl<T, E: std::error::Error> ToExchangeError for Result<T, E> {
    type Value = T;

    fn exchange_error(self, status: StatusCode, message: &str) -> Result<Self::Value, ExchangeError> {
        self.map_err(|e| ExchangeError {
            status,
            message: message.to_string(),
            verbose_message: format!("{e:?}"),
        })
    }
}

impl IntoResponse for ExchangeError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self)).into_response()
    }
}
