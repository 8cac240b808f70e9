use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::{info, warn};

use super::concepts::ConceptId;
use super::intake::{IntakeError, IntakeGuard, PatientForm};
use super::patient::{PatientRecord, PersonId};
use super::reconcile::{ReconcileReport, ReconciliationEngine};
use super::scoring::{Disease, Reason, ScoreBand, ScoreEngine, ScoreSummary};
use super::store::{generate_unique_id, ConceptStore, OmopTable, StoreError};

/// Service composing the intake guard, concept store, score engine and reconciliation.
pub struct PatientService<S> {
    guard: IntakeGuard,
    store: Arc<S>,
    scores: ScoreEngine,
    reconciler: ReconciliationEngine,
    max_id_attempts: u32,
}

impl<S> PatientService<S>
where
    S: ConceptStore + 'static,
{
    pub fn new(store: Arc<S>, max_id_attempts: u32) -> Self {
        Self {
            guard: IntakeGuard::default(),
            store,
            scores: ScoreEngine::new(),
            reconciler: ReconciliationEngine::new(max_id_attempts),
            max_id_attempts,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Compute both scores on a record, refreshing its reason lists.
    pub fn score(&self, record: &mut PatientRecord) -> ScoreSummary {
        self.scores.score(record)
    }

    /// Register a new patient from a form and persist the checked symptoms.
    pub fn add_patient(&self, form: &PatientForm) -> Result<UpdateOutcome, PatientServiceError> {
        let today = today();
        let mut rng = rand::thread_rng();

        let person_id = PersonId(generate_unique_id(
            self.store.as_ref(),
            OmopTable::Person,
            &mut rng,
            self.max_id_attempts,
        )?);
        let record = self.guard.record_from_form(person_id, form, today)?;
        self.store.add_person(self.guard.person_row(&record, form))?;

        let blank = PatientRecord::new(
            person_id,
            record.name.clone(),
            record.birthdate,
            record.case_date,
        );
        let operations = self.reconciler.reconcile(&blank, &record);
        let report = self
            .reconciler
            .apply(operations, self.store.as_ref(), &mut rng, today);

        info!(%person_id, operations = report.applied.len(), "patient registered");
        self.outcome(person_id, report)
    }

    /// Bring stored codes in line with an edited form, then re-score the reloaded patient.
    ///
    /// Individual code changes are best effort; the outcome reports which ones failed.
    pub fn apply_update(
        &self,
        person_id: PersonId,
        form: &PatientForm,
    ) -> Result<UpdateOutcome, PatientServiceError> {
        let old = self.load_patient(person_id)?;
        let updated = self.guard.apply_form(&old, form)?;

        let mut person = self.guard.person_row(&updated, form);
        if let Some(stored) = self.store.fetch_person(person_id)? {
            if form.gender.is_none() {
                person.gender_concept_id = stored.gender_concept_id;
            }
            if form.case_date.is_none() {
                person.case_date = stored.case_date;
            }
        }
        self.store.update_person(person)?;

        let operations = self.reconciler.reconcile(&old, &updated);
        let mut rng = rand::thread_rng();
        let report = self
            .reconciler
            .apply(operations, self.store.as_ref(), &mut rng, today());

        if !report.succeeded() {
            warn!(%person_id, failed = report.failures.len(), "patient update partially applied");
        }
        self.outcome(person_id, report)
    }

    /// Reassemble a patient from the person row and its stored codes.
    pub fn load_patient(&self, person_id: PersonId) -> Result<PatientRecord, PatientServiceError> {
        let person = self
            .store
            .fetch_person(person_id)?
            .ok_or(PatientServiceError::NotFound(person_id))?;
        let birthdate = person
            .birthdate()
            .ok_or(PatientServiceError::InvalidBirthdate(person_id))?;
        let case_date = person.case_date.unwrap_or_else(today);

        let conditions = self
            .store
            .conditions_for(person_id)?
            .into_iter()
            .map(|row| row.condition_concept_id);
        let high_measurements = self
            .store
            .measurements_for(person_id)?
            .into_iter()
            .filter(|row| row.is_high())
            .map(|row| row.measurement_concept_id);
        let procedures = self
            .store
            .procedures_for(person_id)?
            .into_iter()
            .map(|row| row.procedure_concept_id);

        Ok(PatientRecord::new(person_id, person.name, birthdate, case_date)
            .with_conditions(conditions)
            .with_high_measurements(high_measurements)
            .with_procedures(procedures))
    }

    pub fn evaluate_patient(
        &self,
        person_id: PersonId,
    ) -> Result<PatientRecord, PatientServiceError> {
        let mut record = self.load_patient(person_id)?;
        self.scores.score(&mut record);
        Ok(record)
    }

    /// Scores of every stored patient, ordered by person id.
    pub fn analysis(&self) -> Result<Vec<AnalysisEntry>, PatientServiceError> {
        let mut ids = self.store.person_ids()?;
        ids.sort();

        let mut entries = Vec::with_capacity(ids.len());
        for person_id in ids {
            match self.evaluate_patient(person_id) {
                Ok(record) => entries.push(AnalysisEntry::from(&record)),
                Err(PatientServiceError::InvalidBirthdate(id)) => {
                    warn!(person_id = %id, "skipping patient with invalid birthdate");
                }
                Err(other) => return Err(other),
            }
        }
        Ok(entries)
    }

    pub fn decision_reasons(
        &self,
        person_id: PersonId,
        disease: Disease,
    ) -> Result<DecisionReasons, PatientServiceError> {
        let record = self.evaluate_patient(person_id)?;
        Ok(DecisionReasons::for_disease(&record, disease))
    }

    pub fn patient_view(&self, person_id: PersonId) -> Result<PatientView, PatientServiceError> {
        let record = self.evaluate_patient(person_id)?;
        Ok(PatientView {
            person_id,
            age: record.calculate_age(),
            form: PatientForm::from_record(&record),
            procedures: record.procedures.clone(),
            scores: ScoreSummary::from(&record),
        })
    }

    fn outcome(
        &self,
        person_id: PersonId,
        report: ReconcileReport,
    ) -> Result<UpdateOutcome, PatientServiceError> {
        let record = self.evaluate_patient(person_id)?;
        Ok(UpdateOutcome {
            person_id,
            scores: ScoreSummary::from(&record),
            report,
        })
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Result of registering or editing a patient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateOutcome {
    pub person_id: PersonId,
    pub scores: ScoreSummary,
    pub report: ReconcileReport,
}

impl UpdateOutcome {
    /// True when every code change reached the store.
    pub fn succeeded(&self) -> bool {
        self.report.succeeded()
    }
}

/// Row of the ward overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisEntry {
    pub person_id: PersonId,
    pub name: String,
    pub age: i32,
    pub kawasaki_score: ScoreBand,
    pub pims_score: ScoreBand,
}

impl From<&PatientRecord> for AnalysisEntry {
    fn from(record: &PatientRecord) -> Self {
        Self {
            person_id: record.id,
            name: record.name.clone(),
            age: record.calculate_age(),
            kawasaki_score: record.kawasaki_score,
            pims_score: record.pims_score,
        }
    }
}

/// Justification of one disease score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionReasons {
    pub person_id: PersonId,
    pub disease: Disease,
    pub score: ScoreBand,
    pub reasons: Vec<Reason>,
    pub missing: Vec<Reason>,
}

impl DecisionReasons {
    pub fn for_disease(record: &PatientRecord, disease: Disease) -> Self {
        let (score, reasons, missing) = match disease {
            Disease::Kawasaki => (
                record.kawasaki_score,
                &record.reasons_for_kawasaki,
                &record.missing_for_kawasaki,
            ),
            Disease::Pims => (
                record.pims_score,
                &record.reasons_for_pims,
                &record.missing_for_pims,
            ),
        };

        Self {
            person_id: record.id,
            disease,
            score,
            reasons: reasons.clone(),
            missing: missing.clone(),
        }
    }
}

/// Patient as presented for editing: the form read-back plus current scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientView {
    pub person_id: PersonId,
    pub age: i32,
    pub form: PatientForm,
    /// Imported procedure concepts; read-only on the form.
    pub procedures: Vec<ConceptId>,
    pub scores: ScoreSummary,
}

/// Error raised by the patient service.
#[derive(Debug, thiserror::Error)]
pub enum PatientServiceError {
    #[error(transparent)]
    Intake(#[from] IntakeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("patient {0} not found")]
    NotFound(PersonId),
    #[error("patient {0} has no valid birthdate")]
    InvalidBirthdate(PersonId),
}
