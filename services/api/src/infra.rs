use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use pediatric_cds::clinical::concepts::{loinc, snomed};
use pediatric_cds::clinical::store::normalize_source_code;
use pediatric_cds::clinical::{
    ConceptId, ConceptStore, ConditionRow, IdField, MeasurementRow, OmopTable, PersonId,
    PersonRow, ProcedureRow, StoreError, Symptom, Vocabulary,
};
use serde::de::IntoDeserializer;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Source codes of the ward export mapped onto the standard concepts the scores read.
const STANDARD_MAPPINGS: &[(&str, Vocabulary, ConceptId)] = &[
    ("R50.9", Vocabulary::Icd10Gm, snomed::FEVER),
    ("R50.80", Vocabulary::Icd10Gm, snomed::CONTINUOUS_FEVER),
    ("R56.0", Vocabulary::Icd10Gm, snomed::FEBRILE_CONVULSIONS),
    ("R21", Vocabulary::Icd10Gm, snomed::ERUPTION),
    ("B09", Vocabulary::Icd10Gm, snomed::SKIN_OR_MUCOSA_FINDING_DUE_TO_VIRUS),
    ("K13.0", Vocabulary::Icd10Gm, snomed::DISORDER_OF_LIP),
    ("K13.7", Vocabulary::Icd10Gm, snomed::LESION_OF_ORAL_MUCOSA),
    ("R22.3", Vocabulary::Icd10Gm, snomed::SWELLING_OF_UPPER_LIMB),
    ("R22.4", Vocabulary::Icd10Gm, snomed::SWELLING_OF_LOWER_LIMB),
    ("H10.9", Vocabulary::Icd10Gm, snomed::CONJUNCTIVITIS),
    ("H10.3", Vocabulary::Icd10Gm, snomed::ACUTE_CONJUNCTIVITIS),
    ("R59.0", Vocabulary::Icd10Gm, snomed::LOCALIZED_LYMPHADENOPATHY),
    ("R59.1", Vocabulary::Icd10Gm, snomed::GENERALIZED_LYMPHADENOPATHY),
    ("R59.9", Vocabulary::Icd10Gm, snomed::LYMPHADENOPATHY),
    ("I30.9", Vocabulary::Icd10Gm, snomed::ACUTE_PERICARDITIS),
    ("I31.9", Vocabulary::Icd10Gm, snomed::PERICARDITIS),
    ("I31.3", Vocabulary::Icd10Gm, snomed::PERICARDIAL_EFFUSION),
    ("I40.9", Vocabulary::Icd10Gm, snomed::ACUTE_MYOCARDITIS),
    ("I51.4", Vocabulary::Icd10Gm, snomed::MYOCARDITIS),
    ("R11", Vocabulary::Icd10Gm, snomed::NAUSEA_AND_VOMITING),
    ("R10.4", Vocabulary::Icd10Gm, snomed::ABDOMINAL_PAIN),
    ("A09.9", Vocabulary::Icd10Gm, snomed::INFECTIOUS_DIARRHEA),
    ("K52.9", Vocabulary::Icd10Gm, snomed::GASTROENTERITIS),
    ("R18", Vocabulary::Icd10Gm, snomed::ASCITES),
    ("J90", Vocabulary::Icd10Gm, snomed::PLEURAL_EFFUSION),
    ("U07.1", Vocabulary::Icd10Gm, snomed::COVID_19),
    ("U07.2", Vocabulary::Icd10Gm, snomed::COVID_19_VIRUS_NOT_IDENTIFIED),
    ("U09.9", Vocabulary::Icd10Gm, snomed::POST_COVID_19),
    ("M30.3", Vocabulary::Icd10Gm, snomed::KAWASAKI),
    ("U10.9", Vocabulary::Icd10Gm, snomed::PIMS),
    ("1988-5", Vocabulary::Loinc, loinc::C_REACTIVE_PROTEIN),
    ("30522-7", Vocabulary::Loinc, loinc::C_REACTIVE_PROTEIN_HIGH_SENSITIVITY),
    ("4537-7", Vocabulary::Loinc, loinc::ERYTHROCYTE_SEDIMENTATION_RATE),
    ("6690-2", Vocabulary::Loinc, loinc::LEUKOCYTES),
    ("33959-8", Vocabulary::Loinc, loinc::PROCALCITONIN),
    ("14979-9", Vocabulary::Loinc, loinc::PTT_PLASMA),
    ("48065-7", Vocabulary::Loinc, loinc::D_DIMER),
    ("5902-2", Vocabulary::Loinc, loinc::PROTHROMBIN_TIME),
];

/// OPS codes of the procedure export. Procedures are shown, never scored.
const PROCEDURE_MAPPINGS: &[(&str, Vocabulary, ConceptId)] = &[
    ("3-052", Vocabulary::Ops, ConceptId(4230911)),
    ("8-810.w", Vocabulary::Ops, ConceptId(4167093)),
];

#[derive(Default)]
struct Tables {
    persons: HashMap<PersonId, PersonRow>,
    conditions: Vec<ConditionRow>,
    procedures: Vec<ProcedureRow>,
    measurements: Vec<MeasurementRow>,
}

/// Process-local concept store backing the service until a CDM database is attached.
#[derive(Default, Clone)]
pub(crate) struct InMemoryConceptStore {
    tables: Arc<Mutex<Tables>>,
    vocabulary: Arc<HashMap<(String, Vocabulary), ConceptId>>,
}

impl InMemoryConceptStore {
    /// Store preloaded with the ICD-10-GM, LOINC and OPS mappings used by the ward export.
    pub(crate) fn with_standard_vocabulary() -> Self {
        let vocabulary = STANDARD_MAPPINGS
            .iter()
            .chain(PROCEDURE_MAPPINGS)
            .map(|(code, vocabulary, concept)| (((*code).to_string(), *vocabulary), *concept))
            .collect();

        Self {
            tables: Arc::default(),
            vocabulary: Arc::new(vocabulary),
        }
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("concept store mutex poisoned".to_string()))
    }
}

impl ConceptStore for InMemoryConceptStore {
    fn id_exists(&self, table: OmopTable, field: IdField, id: i64) -> Result<bool, StoreError> {
        let tables = self.tables()?;
        Ok(match (table, field) {
            (OmopTable::Person, IdField::PersonId) => tables.persons.contains_key(&PersonId(id)),
            (OmopTable::ConditionOccurrence, IdField::ConditionOccurrenceId) => tables
                .conditions
                .iter()
                .any(|row| row.condition_occurrence_id == id),
            (OmopTable::ProcedureOccurrence, IdField::ProcedureOccurrenceId) => tables
                .procedures
                .iter()
                .any(|row| row.procedure_occurrence_id == id),
            (OmopTable::Measurement, IdField::MeasurementId) => tables
                .measurements
                .iter()
                .any(|row| row.measurement_id == id),
            _ => false,
        })
    }

    fn lookup_concept_id(
        &self,
        code: &str,
        vocabulary: Vocabulary,
    ) -> Result<Option<ConceptId>, StoreError> {
        let key = (normalize_source_code(code).to_string(), vocabulary);
        Ok(self.vocabulary.get(&key).copied())
    }

    fn add_person(&self, person: PersonRow) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        if tables.persons.contains_key(&person.person_id) {
            return Err(StoreError::Conflict);
        }
        tables.persons.insert(person.person_id, person);
        Ok(())
    }

    fn update_person(&self, person: PersonRow) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        let slot = tables
            .persons
            .get_mut(&person.person_id)
            .ok_or(StoreError::NotFound)?;
        *slot = person;
        Ok(())
    }

    fn fetch_person(&self, id: PersonId) -> Result<Option<PersonRow>, StoreError> {
        Ok(self.tables()?.persons.get(&id).cloned())
    }

    fn person_ids(&self) -> Result<Vec<PersonId>, StoreError> {
        Ok(self.tables()?.persons.keys().copied().collect())
    }

    fn add_condition(&self, row: ConditionRow) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        if tables
            .conditions
            .iter()
            .any(|existing| existing.condition_occurrence_id == row.condition_occurrence_id)
        {
            return Err(StoreError::Conflict);
        }
        tables.conditions.push(row);
        Ok(())
    }

    fn delete_condition(&self, person: PersonId, concept: ConceptId) -> Result<usize, StoreError> {
        let mut tables = self.tables()?;
        let before = tables.conditions.len();
        tables
            .conditions
            .retain(|row| !(row.person_id == person && row.condition_concept_id == concept));
        Ok(before - tables.conditions.len())
    }

    fn conditions_for(&self, person: PersonId) -> Result<Vec<ConditionRow>, StoreError> {
        Ok(self
            .tables()?
            .conditions
            .iter()
            .filter(|row| row.person_id == person)
            .cloned()
            .collect())
    }

    fn add_procedure(&self, row: ProcedureRow) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        if tables
            .procedures
            .iter()
            .any(|existing| existing.procedure_occurrence_id == row.procedure_occurrence_id)
        {
            return Err(StoreError::Conflict);
        }
        tables.procedures.push(row);
        Ok(())
    }

    fn procedures_for(&self, person: PersonId) -> Result<Vec<ProcedureRow>, StoreError> {
        Ok(self
            .tables()?
            .procedures
            .iter()
            .filter(|row| row.person_id == person)
            .cloned()
            .collect())
    }

    fn add_measurement(&self, row: MeasurementRow) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        if tables
            .measurements
            .iter()
            .any(|existing| existing.measurement_id == row.measurement_id)
        {
            return Err(StoreError::Conflict);
        }
        tables.measurements.push(row);
        Ok(())
    }

    fn delete_measurement(
        &self,
        person: PersonId,
        concept: ConceptId,
    ) -> Result<usize, StoreError> {
        let mut tables = self.tables()?;
        let before = tables.measurements.len();
        tables
            .measurements
            .retain(|row| !(row.person_id == person && row.measurement_concept_id == concept));
        Ok(before - tables.measurements.len())
    }

    fn measurements_for(&self, person: PersonId) -> Result<Vec<MeasurementRow>, StoreError> {
        Ok(self
            .tables()?
            .measurements
            .iter()
            .filter(|row| row.person_id == person)
            .cloned()
            .collect())
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// Accepts the snake_case symptom names used in JSON payloads, e.g. `swollen_extremities`.
pub(crate) fn parse_symptom(raw: &str) -> Result<Symptom, String> {
    let value = raw.trim().to_ascii_lowercase().replace('-', "_");
    Symptom::deserialize(value.as_str().into_deserializer())
        .map_err(|err: serde::de::value::Error| format!("unknown symptom '{raw}' ({err})"))
}
