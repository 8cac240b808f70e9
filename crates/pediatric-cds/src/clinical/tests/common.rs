use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;

use crate::clinical::concepts::{snomed, ConceptId, Symptom};
use crate::clinical::patient::{PatientRecord, PersonId};
use crate::clinical::service::PatientService;
use crate::clinical::store::{
    normalize_source_code, ConceptStore, ConditionRow, IdField, MeasurementRow, OmopTable,
    PersonRow, ProcedureRow, StoreError, Vocabulary,
};
use crate::clinical::{patient_router, PatientForm};

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

/// Toddler from the reference Kawasaki case: born 2019-01-03, seen 2020-02-02.
pub(super) fn toddler() -> PatientRecord {
    PatientRecord::new(PersonId(1), "Mia Keller", date(2019, 1, 3), date(2020, 2, 2))
}

pub(super) fn patient_aged(years: i32) -> PatientRecord {
    let case_date = date(2021, 6, 15);
    PatientRecord::new(PersonId(7), "Jonas Weber", date(2021 - years, 3, 1), case_date)
}

pub(super) fn with_symptoms(mut record: PatientRecord, symptoms: &[Symptom]) -> PatientRecord {
    for symptom in symptoms {
        match symptom {
            Symptom::InflammationLab | Symptom::Coagulopathy => {
                record.add_high_measurement(symptom.representative_code())
            }
            other => record.add_condition(other.representative_code()),
        }
    }
    record
}

pub(super) const ALL_KAWASAKI_SYMPTOMS: [Symptom; 6] = [
    Symptom::Fever,
    Symptom::SwollenExtremities,
    Symptom::Exanthem,
    Symptom::Enanthem,
    Symptom::Conjunctivitis,
    Symptom::Lymphadenopathy,
];

pub(super) fn rng() -> StdRng {
    StdRng::seed_from_u64(7)
}

pub(super) fn form(symptoms: &[Symptom]) -> PatientForm {
    PatientForm::new("Lena Fischer", date(2016, 4, 12))
        .with_case_date(date(2021, 11, 3))
        .with_symptoms(symptoms.iter().copied())
}

pub(super) fn build_service() -> (PatientService<MemoryStore>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::default());
    let service = PatientService::new(store.clone(), 16);
    (service, store)
}

pub(super) fn router_with_service(service: PatientService<MemoryStore>) -> axum::Router {
    patient_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

#[derive(Default)]
pub(super) struct MemoryState {
    pub(super) persons: HashMap<PersonId, PersonRow>,
    pub(super) conditions: Vec<ConditionRow>,
    pub(super) procedures: Vec<ProcedureRow>,
    pub(super) measurements: Vec<MeasurementRow>,
    pub(super) vocabulary: HashMap<(String, &'static str), ConceptId>,
}

#[derive(Default, Clone)]
pub(super) struct MemoryStore {
    pub(super) state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub(super) fn with_vocabulary(entries: &[(&str, Vocabulary, ConceptId)]) -> Self {
        let store = Self::default();
        {
            let mut state = store.state.lock().expect("store mutex poisoned");
            for (code, vocabulary, concept) in entries {
                state
                    .vocabulary
                    .insert((code.to_string(), vocabulary.id()), *concept);
            }
        }
        store
    }

    pub(super) fn condition_count(&self) -> usize {
        self.state.lock().expect("store mutex poisoned").conditions.len()
    }

    pub(super) fn seed_patient(&self, record: &PatientRecord) {
        let mut state = self.state.lock().expect("store mutex poisoned");
        state.persons.insert(
            record.id,
            PersonRow {
                person_id: record.id,
                name: record.name.clone(),
                gender_concept_id: ConceptId::UNMAPPED,
                year_of_birth: chrono::Datelike::year(&record.birthdate),
                month_of_birth: chrono::Datelike::month(&record.birthdate),
                day_of_birth: chrono::Datelike::day(&record.birthdate),
                case_date: Some(record.case_date),
            },
        );
        for (offset, code) in record.conditions.iter().enumerate() {
            state.conditions.push(ConditionRow {
                condition_occurrence_id: 500_000 + offset as i64,
                person_id: record.id,
                condition_concept_id: *code,
                condition_start_date: record.case_date,
                condition_type_concept_id: crate::clinical::concepts::markers::TYPE_EHR,
            });
        }
        for (offset, code) in record.procedures.iter().enumerate() {
            state.procedures.push(ProcedureRow {
                procedure_occurrence_id: 700_000 + offset as i64,
                person_id: record.id,
                procedure_concept_id: *code,
                procedure_date: record.case_date,
                procedure_type_concept_id: crate::clinical::concepts::markers::TYPE_EHR,
            });
        }
        for (offset, code) in record.high_measurements.iter().enumerate() {
            state.measurements.push(MeasurementRow {
                measurement_id: 600_000 + offset as i64,
                person_id: record.id,
                measurement_concept_id: *code,
                measurement_date: record.case_date,
                measurement_type_concept_id: crate::clinical::concepts::markers::TYPE_EHR,
                value_as_concept_id: crate::clinical::concepts::markers::VALUE_HIGH,
            });
        }
    }
}

impl ConceptStore for MemoryStore {
    fn id_exists(&self, table: OmopTable, _field: IdField, id: i64) -> Result<bool, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(match table {
            OmopTable::Person => state.persons.contains_key(&PersonId(id)),
            OmopTable::ConditionOccurrence => state
                .conditions
                .iter()
                .any(|row| row.condition_occurrence_id == id),
            OmopTable::ProcedureOccurrence => state
                .procedures
                .iter()
                .any(|row| row.procedure_occurrence_id == id),
            OmopTable::Measurement => state.measurements.iter().any(|row| row.measurement_id == id),
        })
    }

    fn lookup_concept_id(
        &self,
        code: &str,
        vocabulary: Vocabulary,
    ) -> Result<Option<ConceptId>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        let key = (normalize_source_code(code).to_string(), vocabulary.id());
        Ok(state.vocabulary.get(&key).copied())
    }

    fn add_person(&self, person: PersonRow) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        if state.persons.contains_key(&person.person_id) {
            return Err(StoreError::Conflict);
        }
        state.persons.insert(person.person_id, person);
        Ok(())
    }

    fn update_person(&self, person: PersonRow) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        match state.persons.get_mut(&person.person_id) {
            Some(existing) => {
                *existing = person;
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    fn fetch_person(&self, id: PersonId) -> Result<Option<PersonRow>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state.persons.get(&id).cloned())
    }

    fn person_ids(&self) -> Result<Vec<PersonId>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state.persons.keys().copied().collect())
    }

    fn add_condition(&self, row: ConditionRow) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        if state
            .conditions
            .iter()
            .any(|existing| existing.condition_occurrence_id == row.condition_occurrence_id)
        {
            return Err(StoreError::Conflict);
        }
        state.conditions.push(row);
        Ok(())
    }

    fn delete_condition(&self, person: PersonId, concept: ConceptId) -> Result<usize, StoreError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        let before = state.conditions.len();
        state
            .conditions
            .retain(|row| !(row.person_id == person && row.condition_concept_id == concept));
        Ok(before - state.conditions.len())
    }

    fn conditions_for(&self, person: PersonId) -> Result<Vec<ConditionRow>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
            .conditions
            .iter()
            .filter(|row| row.person_id == person)
            .cloned()
            .collect())
    }

    fn add_procedure(&self, row: ProcedureRow) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        if state
            .procedures
            .iter()
            .any(|existing| existing.procedure_occurrence_id == row.procedure_occurrence_id)
        {
            return Err(StoreError::Conflict);
        }
        state.procedures.push(row);
        Ok(())
    }

    fn procedures_for(&self, person: PersonId) -> Result<Vec<ProcedureRow>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
            .procedures
            .iter()
            .filter(|row| row.person_id == person)
            .cloned()
            .collect())
    }

    fn add_measurement(&self, row: MeasurementRow) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        if state
            .measurements
            .iter()
            .any(|existing| existing.measurement_id == row.measurement_id)
        {
            return Err(StoreError::Conflict);
        }
        state.measurements.push(row);
        Ok(())
    }

    fn delete_measurement(
        &self,
        person: PersonId,
        concept: ConceptId,
    ) -> Result<usize, StoreError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        let before = state.measurements.len();
        state
            .measurements
            .retain(|row| !(row.person_id == person && row.measurement_concept_id == concept));
        Ok(before - state.measurements.len())
    }

    fn measurements_for(&self, person: PersonId) -> Result<Vec<MeasurementRow>, StoreError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
            .measurements
            .iter()
            .filter(|row| row.person_id == person)
            .cloned()
            .collect())
    }
}

/// Memory store whose writes fail for selected concepts.
pub(super) struct RejectingStore {
    pub(super) inner: MemoryStore,
    pub(super) rejected: HashSet<ConceptId>,
}

impl RejectingStore {
    pub(super) fn rejecting(inner: MemoryStore, concepts: &[ConceptId]) -> Self {
        Self {
            inner,
            rejected: concepts.iter().copied().collect(),
        }
    }

    fn check(&self, concept: ConceptId) -> Result<(), StoreError> {
        if self.rejected.contains(&concept) {
            Err(StoreError::Unavailable(format!("write of {concept} refused")))
        } else {
            Ok(())
        }
    }
}

impl ConceptStore for RejectingStore {
    fn id_exists(&self, table: OmopTable, field: IdField, id: i64) -> Result<bool, StoreError> {
        self.inner.id_exists(table, field, id)
    }

    fn lookup_concept_id(
        &self,
        code: &str,
        vocabulary: Vocabulary,
    ) -> Result<Option<ConceptId>, StoreError> {
        self.inner.lookup_concept_id(code, vocabulary)
    }

    fn add_person(&self, person: PersonRow) -> Result<(), StoreError> {
        self.inner.add_person(person)
    }

    fn update_person(&self, person: PersonRow) -> Result<(), StoreError> {
        self.inner.update_person(person)
    }

    fn fetch_person(&self, id: PersonId) -> Result<Option<PersonRow>, StoreError> {
        self.inner.fetch_person(id)
    }

    fn person_ids(&self) -> Result<Vec<PersonId>, StoreError> {
        self.inner.person_ids()
    }

    fn add_condition(&self, row: ConditionRow) -> Result<(), StoreError> {
        self.check(row.condition_concept_id)?;
        self.inner.add_condition(row)
    }

    fn delete_condition(&self, person: PersonId, concept: ConceptId) -> Result<usize, StoreError> {
        self.check(concept)?;
        self.inner.delete_condition(person, concept)
    }

    fn conditions_for(&self, person: PersonId) -> Result<Vec<ConditionRow>, StoreError> {
        self.inner.conditions_for(person)
    }

    fn add_procedure(&self, row: ProcedureRow) -> Result<(), StoreError> {
        self.check(row.procedure_concept_id)?;
        self.inner.add_procedure(row)
    }

    fn procedures_for(&self, person: PersonId) -> Result<Vec<ProcedureRow>, StoreError> {
        self.inner.procedures_for(person)
    }

    fn add_measurement(&self, row: MeasurementRow) -> Result<(), StoreError> {
        self.check(row.measurement_concept_id)?;
        self.inner.add_measurement(row)
    }

    fn delete_measurement(
        &self,
        person: PersonId,
        concept: ConceptId,
    ) -> Result<usize, StoreError> {
        self.check(concept)?;
        self.inner.delete_measurement(person, concept)
    }

    fn measurements_for(&self, person: PersonId) -> Result<Vec<MeasurementRow>, StoreError> {
        self.inner.measurements_for(person)
    }
}

/// Store whose id checks report collisions for the first `collisions` draws.
pub(super) struct CollidingStore {
    pub(super) remaining: Mutex<u32>,
    pub(super) checks: Mutex<Vec<i64>>,
}

impl CollidingStore {
    pub(super) fn new(collisions: u32) -> Self {
        Self {
            remaining: Mutex::new(collisions),
            checks: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn checked_ids(&self) -> Vec<i64> {
        self.checks.lock().expect("checks mutex poisoned").clone()
    }
}

impl ConceptStore for CollidingStore {
    fn id_exists(&self, _table: OmopTable, _field: IdField, id: i64) -> Result<bool, StoreError> {
        self.checks.lock().expect("checks mutex poisoned").push(id);
        let mut remaining = self.remaining.lock().expect("collision mutex poisoned");
        if *remaining > 0 {
            *remaining -= 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn lookup_concept_id(
        &self,
        _code: &str,
        _vocabulary: Vocabulary,
    ) -> Result<Option<ConceptId>, StoreError> {
        Ok(None)
    }

    fn add_person(&self, _person: PersonRow) -> Result<(), StoreError> {
        Ok(())
    }

    fn update_person(&self, _person: PersonRow) -> Result<(), StoreError> {
        Ok(())
    }

    fn fetch_person(&self, _id: PersonId) -> Result<Option<PersonRow>, StoreError> {
        Ok(None)
    }

    fn person_ids(&self) -> Result<Vec<PersonId>, StoreError> {
        Ok(Vec::new())
    }

    fn add_condition(&self, _row: ConditionRow) -> Result<(), StoreError> {
        Ok(())
    }

    fn delete_condition(
        &self,
        _person: PersonId,
        _concept: ConceptId,
    ) -> Result<usize, StoreError> {
        Ok(0)
    }

    fn conditions_for(&self, _person: PersonId) -> Result<Vec<ConditionRow>, StoreError> {
        Ok(Vec::new())
    }

    fn add_procedure(&self, _row: ProcedureRow) -> Result<(), StoreError> {
        Ok(())
    }

    fn procedures_for(&self, _person: PersonId) -> Result<Vec<ProcedureRow>, StoreError> {
        Ok(Vec::new())
    }

    fn add_measurement(&self, _row: MeasurementRow) -> Result<(), StoreError> {
        Ok(())
    }

    fn delete_measurement(
        &self,
        _person: PersonId,
        _concept: ConceptId,
    ) -> Result<usize, StoreError> {
        Ok(0)
    }

    fn measurements_for(&self, _person: PersonId) -> Result<Vec<MeasurementRow>, StoreError> {
        Ok(Vec::new())
    }
}

pub(super) struct UnavailableStore;

impl ConceptStore for UnavailableStore {
    fn id_exists(&self, _table: OmopTable, _field: IdField, _id: i64) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn lookup_concept_id(
        &self,
        _code: &str,
        _vocabulary: Vocabulary,
    ) -> Result<Option<ConceptId>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn add_person(&self, _person: PersonRow) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn update_person(&self, _person: PersonRow) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn fetch_person(&self, _id: PersonId) -> Result<Option<PersonRow>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn person_ids(&self) -> Result<Vec<PersonId>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn add_condition(&self, _row: ConditionRow) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn delete_condition(
        &self,
        _person: PersonId,
        _concept: ConceptId,
    ) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn conditions_for(&self, _person: PersonId) -> Result<Vec<ConditionRow>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn add_procedure(&self, _row: ProcedureRow) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn procedures_for(&self, _person: PersonId) -> Result<Vec<ProcedureRow>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn add_measurement(&self, _row: MeasurementRow) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn delete_measurement(
        &self,
        _person: PersonId,
        _concept: ConceptId,
    ) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn measurements_for(&self, _person: PersonId) -> Result<Vec<MeasurementRow>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn fever_patient() -> PatientRecord {
    let mut record = patient_aged(4);
    record.add_condition(snomed::FEVER);
    record
}
