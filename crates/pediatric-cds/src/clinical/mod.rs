//! Kawasaki and PIMS scoring, patient intake and reconciliation of edited records.
//!
//! Scores are a pure function of a patient's stored codes and age. Edits made through the
//! patient form are diffed against the stored record and written back to the concept store
//! one code at a time.

pub mod concepts;
pub mod intake;
pub mod patient;
pub mod reconcile;
pub mod router;
pub mod scoring;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use concepts::{ConceptId, Symptom};
pub use intake::{IntakeError, IntakeGuard, PatientForm};
pub use patient::{PatientRecord, PersonId};
pub use reconcile::{OperationFailure, ReconcileReport, ReconciliationEngine, StoreOperation};
pub use router::patient_router;
pub use scoring::{Disease, Reason, ScoreBand, ScoreEngine, ScoreSummary};
pub use service::{
    AnalysisEntry, DecisionReasons, PatientService, PatientServiceError, PatientView,
    UpdateOutcome,
};
pub use store::{
    generate_unique_id, ConceptStore, ConditionRow, IdField, MeasurementRow, OmopTable,
    PersonRow, ProcedureRow, StoreError, Vocabulary,
};
