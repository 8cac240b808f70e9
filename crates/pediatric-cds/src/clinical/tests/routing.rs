use super::common::*;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use std::sync::Arc;
use tower::ServiceExt;

use crate::clinical::concepts::{snomed, Symptom};
use crate::clinical::router::{
    analysis_handler, create_handler, reasons_handler, update_handler, view_handler,
};
use crate::clinical::service::PatientService;

#[tokio::test]
async fn create_handler_returns_created_with_scores() {
    let (service, _) = build_service();

    let response = create_handler::<MemoryStore>(
        State(Arc::new(service)),
        axum::Json(form(&[Symptom::Fever, Symptom::Exanthem])),
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert!(payload.get("person_id").is_some());
    assert_eq!(payload["scores"]["kawasaki_score"], serde_json::json!(0.75));
}

#[tokio::test]
async fn create_handler_returns_unprocessable_for_invalid_forms() {
    let (service, _) = build_service();
    let mut invalid = form(&[]);
    invalid.birthdate = date(2030, 1, 1);

    let response = create_handler::<MemoryStore>(State(Arc::new(service)), axum::Json(invalid))
        .await
        .into_response();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .expect("error message")
        .contains("lies after the case date"));
}

#[tokio::test]
async fn create_handler_returns_service_unavailable_on_store_outage() {
    let service = Arc::new(PatientService::new(Arc::new(UnavailableStore), 4));

    let response = create_handler::<UnavailableStore>(State(service), axum::Json(form(&[])))
        .await
        .into_response();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn update_handler_returns_multi_status_on_partial_failure() {
    let memory = MemoryStore::default();
    let patient = fever_patient();
    memory.seed_patient(&patient);
    let store = Arc::new(RejectingStore::rejecting(memory, &[snomed::FEVER]));
    let service = Arc::new(PatientService::new(store, 8));

    let response = update_handler::<RejectingStore>(
        State(service),
        Path(patient.id.0),
        axum::Json(
            crate::clinical::PatientForm::new(patient.name.clone(), patient.birthdate)
                .with_symptoms([Symptom::Covid]),
        ),
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::MULTI_STATUS);
    let payload = read_json_body(response).await;
    assert_eq!(payload["report"]["failures"][0]["operation"]["kind"], "delete");
    assert_eq!(payload["report"]["applied"][0]["symptom"], "covid");
}

#[tokio::test]
async fn view_handler_returns_not_found_for_unknown_patients() {
    let (service, _) = build_service();

    let response = view_handler::<MemoryStore>(State(Arc::new(service)), Path(404))
        .await
        .into_response();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "patient error: patient 404 not found");
}

#[tokio::test]
async fn reasons_handler_rejects_unknown_diseases() {
    let (service, store) = build_service();
    let patient = fever_patient();
    store.seed_patient(&patient);

    let response = reasons_handler::<MemoryStore>(
        State(Arc::new(service)),
        Path((patient.id.0, "measles".to_string())),
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "invalid request: unknown disease 'measles'");
}

#[tokio::test]
async fn reasons_handler_returns_german_labels() {
    let (service, store) = build_service();
    let patient = fever_patient();
    store.seed_patient(&patient);

    let response = reasons_handler::<MemoryStore>(
        State(Arc::new(service)),
        Path((patient.id.0, "kawasaki".to_string())),
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["score"], serde_json::json!(0.5));
    assert_eq!(payload["reasons"], serde_json::json!(["0-7 Jahre alt", "Fieber"]));
}

#[tokio::test]
async fn analysis_handler_lists_stored_patients() {
    let (service, store) = build_service();
    store.seed_patient(&fever_patient());

    let response = analysis_handler::<MemoryStore>(State(Arc::new(service)))
        .await
        .into_response();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(1));
    assert_eq!(payload[0]["name"], "Jonas Weber");
}

#[tokio::test]
async fn patient_routes_round_trip_through_the_router() {
    let (service, _) = build_service();
    let service = Arc::new(service);
    let router = crate::clinical::patient_router(service.clone());

    let response = router
        .clone()
        .oneshot(
            axum::http::Request::post("/api/v1/patients")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    serde_json::to_vec(&form(&[Symptom::Fever])).unwrap(),
                ))
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = read_json_body(response).await;
    let person_id = created["person_id"].as_i64().expect("numeric id");

    let response = router
        .oneshot(
            axum::http::Request::get(format!("/api/v1/patients/{person_id}"))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let view = read_json_body(response).await;
    assert_eq!(view["form"]["symptoms"], serde_json::json!(["fever"]));
    assert_eq!(view["age"], 5);
}

#[tokio::test]
async fn malformed_person_ids_are_rejected_by_the_router() {
    let router = router_with_service(build_service().0);

    let response = router
        .oneshot(
            axum::http::Request::get("/api/v1/patients/not-a-number")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
