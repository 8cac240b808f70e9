//! Diffing of edited patient records into OMOP row changes.
//!
//! Only code presence is reconciled here. Demographic fields are plain overwrites and are
//! handled by the patient service, so reconciling a record with itself yields no operations.

use chrono::NaiveDate;
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use super::concepts::{markers, ConceptId, Symptom};
use super::patient::{PatientRecord, PersonId};
use super::store::{
    generate_unique_id, ConceptStore, ConditionRow, MeasurementRow, OmopTable, StoreError,
    DEFAULT_ID_ATTEMPTS,
};

/// Single change needed to align persisted codes with an edited record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreOperation {
    Add {
        person_id: PersonId,
        symptom: Symptom,
        table: OmopTable,
        concept_id: ConceptId,
    },
    Delete {
        person_id: PersonId,
        symptom: Symptom,
        table: OmopTable,
        concept_ids: Vec<ConceptId>,
    },
}

impl StoreOperation {
    pub fn symptom(&self) -> Symptom {
        match self {
            StoreOperation::Add { symptom, .. } | StoreOperation::Delete { symptom, .. } => {
                *symptom
            }
        }
    }

    pub fn is_add(&self) -> bool {
        matches!(self, StoreOperation::Add { .. })
    }
}

/// Operation that could not be applied, kept for the caller's report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationFailure {
    pub operation: StoreOperation,
    pub error: String,
}

/// Result of a best-effort apply run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub applied: Vec<StoreOperation>,
    pub failures: Vec<OperationFailure>,
}

impl ReconcileReport {
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    max_id_attempts: u32,
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new(DEFAULT_ID_ATTEMPTS)
    }
}

impl ReconciliationEngine {
    pub fn new(max_id_attempts: u32) -> Self {
        Self {
            max_id_attempts: max_id_attempts.max(1),
        }
    }

    /// Operations turning the persisted codes of `old` into those of `updated`.
    ///
    /// Editable symptoms are visited in their fixed order and each flip yields exactly one
    /// operation. A delete lists every code of the symptom's set found on `old`. Some codes
    /// belong to two sets (viral skin/mucosa findings count as exanthem and enanthem), so a
    /// symptom that stays present is re-added when all of its old codes are being deleted.
    ///
    /// Swapping `old` and `updated` inverts the operations only for symptoms whose code sets
    /// are disjoint. Exanthem and enanthem share codes and may produce a different number of
    /// operations in each direction.
    pub fn reconcile(&self, old: &PatientRecord, updated: &PatientRecord) -> Vec<StoreOperation> {
        let person_id = updated.id;
        let removed: Vec<ConceptId> = Symptom::EDITABLE
            .into_iter()
            .filter(|symptom| old.has(*symptom) && !updated.has(*symptom))
            .flat_map(|symptom| old.matching_codes(symptom))
            .collect();

        let mut operations = Vec::new();
        for symptom in Symptom::EDITABLE {
            let kept = old
                .matching_codes(symptom)
                .iter()
                .any(|code| !removed.contains(code));

            if !updated.has(symptom) {
                if old.has(symptom) {
                    operations.push(StoreOperation::Delete {
                        person_id,
                        symptom,
                        table: symptom.table(),
                        concept_ids: old.matching_codes(symptom),
                    });
                }
            } else if !kept {
                operations.push(StoreOperation::Add {
                    person_id,
                    symptom,
                    table: symptom.table(),
                    concept_id: symptom.representative_code(),
                });
            }
        }

        operations
    }

    /// Apply every operation, continuing past failures.
    pub fn apply<S, R>(
        &self,
        operations: Vec<StoreOperation>,
        store: &S,
        rng: &mut R,
        today: NaiveDate,
    ) -> ReconcileReport
    where
        S: ConceptStore + ?Sized,
        R: Rng + ?Sized,
    {
        let mut report = ReconcileReport::default();

        for operation in operations {
            match self.apply_one(&operation, store, rng, today) {
                Ok(()) => {
                    info!(
                        symptom = ?operation.symptom(),
                        add = operation.is_add(),
                        "store operation applied"
                    );
                    report.applied.push(operation);
                }
                Err(error) => {
                    warn!(symptom = ?operation.symptom(), %error, "store operation failed");
                    report.failures.push(OperationFailure {
                        operation,
                        error: error.to_string(),
                    });
                }
            }
        }

        report
    }

    fn apply_one<S, R>(
        &self,
        operation: &StoreOperation,
        store: &S,
        rng: &mut R,
        today: NaiveDate,
    ) -> Result<(), StoreError>
    where
        S: ConceptStore + ?Sized,
        R: Rng + ?Sized,
    {
        match operation {
            StoreOperation::Add {
                person_id,
                table,
                concept_id,
                ..
            } => {
                let id = generate_unique_id(store, *table, rng, self.max_id_attempts)?;
                match table {
                    OmopTable::Measurement => store.add_measurement(MeasurementRow {
                        measurement_id: id,
                        person_id: *person_id,
                        measurement_concept_id: *concept_id,
                        measurement_date: today,
                        measurement_type_concept_id: markers::TYPE_MANUAL_ENTRY,
                        value_as_concept_id: markers::VALUE_HIGH,
                    }),
                    _ => store.add_condition(ConditionRow {
                        condition_occurrence_id: id,
                        person_id: *person_id,
                        condition_concept_id: *concept_id,
                        condition_start_date: today,
                        condition_type_concept_id: markers::TYPE_MANUAL_ENTRY,
                    }),
                }
            }
            StoreOperation::Delete {
                person_id,
                table,
                concept_ids,
                ..
            } => {
                for concept in concept_ids {
                    match table {
                        OmopTable::Measurement => store.delete_measurement(*person_id, *concept)?,
                        _ => store.delete_condition(*person_id, *concept)?,
                    };
                }
                Ok(())
            }
        }
    }
}
