use std::fmt;

use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::concepts::{markers, ConceptId};
use super::patient::PersonId;

/// Lower bound (inclusive) for generated identifiers.
pub const ID_RANGE_START: i64 = 10_000;
/// Upper bound (exclusive) for generated identifiers.
pub const ID_RANGE_END: i64 = 9_999_999;
pub const DEFAULT_ID_ATTEMPTS: u32 = 64;

/// OMOP CDM tables the engine writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OmopTable {
    Person,
    ConditionOccurrence,
    ProcedureOccurrence,
    Measurement,
}

impl OmopTable {
    pub fn name(self) -> &'static str {
        match self {
            OmopTable::Person => "person",
            OmopTable::ConditionOccurrence => "condition_occurrence",
            OmopTable::ProcedureOccurrence => "procedure_occurrence",
            OmopTable::Measurement => "measurement",
        }
    }
}

impl fmt::Display for OmopTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Primary key column checked when allocating identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdField {
    PersonId,
    ConditionOccurrenceId,
    ProcedureOccurrenceId,
    MeasurementId,
}

impl IdField {
    pub fn primary_key_of(table: OmopTable) -> Self {
        match table {
            OmopTable::Person => IdField::PersonId,
            OmopTable::ConditionOccurrence => IdField::ConditionOccurrenceId,
            OmopTable::ProcedureOccurrence => IdField::ProcedureOccurrenceId,
            OmopTable::Measurement => IdField::MeasurementId,
        }
    }
}

/// Source vocabularies accepted by concept lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vocabulary {
    Icd10Gm,
    Loinc,
    Ops,
}

impl Vocabulary {
    pub fn id(self) -> &'static str {
        match self {
            Vocabulary::Icd10Gm => "ICD10GM",
            Vocabulary::Loinc => "LOINC",
            Vocabulary::Ops => "OPS",
        }
    }
}

/// Row of the OMOP `person` table, reduced to what the engine reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRow {
    pub person_id: PersonId,
    pub name: String,
    pub gender_concept_id: ConceptId,
    pub year_of_birth: i32,
    pub month_of_birth: u32,
    pub day_of_birth: u32,
    pub case_date: Option<NaiveDate>,
}

impl PersonRow {
    pub fn birthdate(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year_of_birth, self.month_of_birth, self.day_of_birth)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionRow {
    pub condition_occurrence_id: i64,
    pub person_id: PersonId,
    pub condition_concept_id: ConceptId,
    pub condition_start_date: NaiveDate,
    pub condition_type_concept_id: ConceptId,
}

/// Procedure performed on a person, imported from the hospital's OPS coded export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureRow {
    pub procedure_occurrence_id: i64,
    pub person_id: PersonId,
    pub procedure_concept_id: ConceptId,
    pub procedure_date: NaiveDate,
    pub procedure_type_concept_id: ConceptId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementRow {
    pub measurement_id: i64,
    pub person_id: PersonId,
    pub measurement_concept_id: ConceptId,
    pub measurement_date: NaiveDate,
    pub measurement_type_concept_id: ConceptId,
    pub value_as_concept_id: ConceptId,
}

impl MeasurementRow {
    pub fn is_high(&self) -> bool {
        self.value_as_concept_id == markers::VALUE_HIGH
    }
}

/// Persistence boundary for OMOP rows and vocabulary lookups.
///
/// Implementations are synchronous and must be shareable across request handlers.
pub trait ConceptStore: Send + Sync {
    fn id_exists(&self, table: OmopTable, field: IdField, id: i64) -> Result<bool, StoreError>;

    /// Standard concept mapped from a source code, `None` when the vocabulary has no mapping.
    fn lookup_concept_id(
        &self,
        code: &str,
        vocabulary: Vocabulary,
    ) -> Result<Option<ConceptId>, StoreError>;

    fn add_person(&self, person: PersonRow) -> Result<(), StoreError>;
    fn update_person(&self, person: PersonRow) -> Result<(), StoreError>;
    fn fetch_person(&self, id: PersonId) -> Result<Option<PersonRow>, StoreError>;
    fn person_ids(&self) -> Result<Vec<PersonId>, StoreError>;

    fn add_condition(&self, row: ConditionRow) -> Result<(), StoreError>;
    /// Removes every occurrence of `concept` for the person, returning the number of rows removed.
    fn delete_condition(&self, person: PersonId, concept: ConceptId) -> Result<usize, StoreError>;
    fn conditions_for(&self, person: PersonId) -> Result<Vec<ConditionRow>, StoreError>;

    fn add_procedure(&self, row: ProcedureRow) -> Result<(), StoreError>;
    fn procedures_for(&self, person: PersonId) -> Result<Vec<ProcedureRow>, StoreError>;

    fn add_measurement(&self, row: MeasurementRow) -> Result<(), StoreError>;
    fn delete_measurement(&self, person: PersonId, concept: ConceptId)
        -> Result<usize, StoreError>;
    fn measurements_for(&self, person: PersonId) -> Result<Vec<MeasurementRow>, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("row already exists")]
    Conflict,
    #[error("row not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("no free identifier in {table} after {attempts} attempts")]
    IdSpaceExhausted { table: OmopTable, attempts: u32 },
}

/// ICD-10-GM codes carry trailing `!`/`+` markers that the vocabulary does not store.
pub fn normalize_source_code(code: &str) -> &str {
    code.trim().trim_end_matches(['!', '+'])
}

/// Pick a random identifier in `[ID_RANGE_START, ID_RANGE_END)` not yet used in `table`.
///
/// Retries on collision and gives up after `max_attempts` draws.
pub fn generate_unique_id<S, R>(
    store: &S,
    table: OmopTable,
    rng: &mut R,
    max_attempts: u32,
) -> Result<i64, StoreError>
where
    S: ConceptStore + ?Sized,
    R: Rng + ?Sized,
{
    let field = IdField::primary_key_of(table);
    for attempt in 1..=max_attempts {
        let candidate = rng.gen_range(ID_RANGE_START..ID_RANGE_END);
        if !store.id_exists(table, field, candidate)? {
            return Ok(candidate);
        }
        warn!(%table, candidate, attempt, "generated id already taken");
    }

    Err(StoreError::IdSpaceExhausted {
        table,
        attempts: max_attempts,
    })
}
