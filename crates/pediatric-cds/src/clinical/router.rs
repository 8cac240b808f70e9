use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use super::intake::PatientForm;
use super::patient::PersonId;
use super::scoring::Disease;
use super::service::{AnalysisEntry, DecisionReasons, PatientService, PatientView, UpdateOutcome};
use super::store::ConceptStore;
use crate::error::AppError;

/// Router builder exposing patient registration, editing and score endpoints.
pub fn patient_router<S>(service: Arc<PatientService<S>>) -> Router
where
    S: ConceptStore + 'static,
{
    Router::new()
        .route("/api/v1/patients", axum::routing::post(create_handler::<S>))
        .route(
            "/api/v1/patients/:person_id",
            get(view_handler::<S>).put(update_handler::<S>),
        )
        .route(
            "/api/v1/patients/:person_id/reasons/:disease",
            get(reasons_handler::<S>),
        )
        .route("/api/v1/analysis", get(analysis_handler::<S>))
        .with_state(service)
}

pub(crate) async fn create_handler<S>(
    State(service): State<Arc<PatientService<S>>>,
    Json(form): Json<PatientForm>,
) -> Result<(StatusCode, Json<UpdateOutcome>), AppError>
where
    S: ConceptStore + 'static,
{
    let outcome = service.add_patient(&form)?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Partially applied edits answer 207 with the per-operation report.
pub(crate) async fn update_handler<S>(
    State(service): State<Arc<PatientService<S>>>,
    Path(person_id): Path<i64>,
    Json(form): Json<PatientForm>,
) -> Result<(StatusCode, Json<UpdateOutcome>), AppError>
where
    S: ConceptStore + 'static,
{
    let outcome = service.apply_update(PersonId(person_id), &form)?;
    let status = if outcome.succeeded() {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };
    Ok((status, Json(outcome)))
}

pub(crate) async fn view_handler<S>(
    State(service): State<Arc<PatientService<S>>>,
    Path(person_id): Path<i64>,
) -> Result<Json<PatientView>, AppError>
where
    S: ConceptStore + 'static,
{
    Ok(Json(service.patient_view(PersonId(person_id))?))
}

pub(crate) async fn reasons_handler<S>(
    State(service): State<Arc<PatientService<S>>>,
    Path((person_id, disease)): Path<(i64, String)>,
) -> Result<Json<DecisionReasons>, AppError>
where
    S: ConceptStore + 'static,
{
    let disease = disease
        .parse::<Disease>()
        .map_err(AppError::InvalidRequest)?;
    Ok(Json(service.decision_reasons(PersonId(person_id), disease)?))
}

pub(crate) async fn analysis_handler<S>(
    State(service): State<Arc<PatientService<S>>>,
) -> Result<Json<Vec<AnalysisEntry>>, AppError>
where
    S: ConceptStore + 'static,
{
    Ok(Json(service.analysis()?))
}
