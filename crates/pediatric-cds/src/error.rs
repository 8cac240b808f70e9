use crate::clinical::{PatientServiceError, StoreError};
use crate::config::ConfigError;
use crate::etl::EtlError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Import(EtlError),
    Patient(PatientServiceError),
    InvalidRequest(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Import(err) => write!(f, "import error: {}", err),
            AppError::Patient(err) => write!(f, "patient error: {}", err),
            AppError::InvalidRequest(message) => write!(f, "invalid request: {}", message),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Import(err) => Some(err),
            AppError::Patient(err) => Some(err),
            AppError::InvalidRequest(_) => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Import(_) | AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Patient(err) => patient_status(err),
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

fn patient_status(error: &PatientServiceError) -> StatusCode {
    match error {
        PatientServiceError::Intake(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PatientServiceError::NotFound(_) | PatientServiceError::Store(StoreError::NotFound) => {
            StatusCode::NOT_FOUND
        }
        PatientServiceError::Store(StoreError::Conflict) => StatusCode::CONFLICT,
        PatientServiceError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        PatientServiceError::Store(StoreError::IdSpaceExhausted { .. })
        | PatientServiceError::InvalidBirthdate(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<EtlError> for AppError {
    fn from(value: EtlError) -> Self {
        Self::Import(value)
    }
}

impl From<PatientServiceError> for AppError {
    fn from(value: PatientServiceError) -> Self {
        Self::Patient(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clinical::{IntakeError, PersonId};

    #[test]
    fn patient_errors_map_to_client_statuses() {
        let missing = AppError::from(PatientServiceError::NotFound(PersonId(5))).into_response();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let invalid =
            AppError::from(PatientServiceError::Intake(IntakeError::MissingName)).into_response();
        assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn store_failures_follow_one_status_table() {
        let status = |error: StoreError| {
            AppError::from(PatientServiceError::Store(error))
                .into_response()
                .status()
        };

        assert_eq!(status(StoreError::Conflict), StatusCode::CONFLICT);
        assert_eq!(status(StoreError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status(StoreError::Unavailable("offline".to_string())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(StoreError::IdSpaceExhausted {
                table: crate::clinical::OmopTable::Person,
                attempts: 3,
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn invalid_requests_are_bad_requests() {
        let error = AppError::InvalidRequest("unknown disease 'measles'".to_string());

        assert!(std::error::Error::source(&error).is_none());
        assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn import_errors_keep_their_source() {
        let error = AppError::from(EtlError::InvalidDate {
            file: "PERSON.csv",
            value: "31.02.2019".to_string(),
        });

        assert!(error.to_string().contains("31.02.2019"));
        assert!(std::error::Error::source(&error).is_some());
        assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
