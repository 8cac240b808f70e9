use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::concepts::{gender_concept, CodeSource, ConceptId, Symptom};
use super::patient::{PatientRecord, PersonId};
use super::store::PersonRow;

/// Validation errors raised before a form is turned into a patient record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntakeError {
    #[error("patient name must not be empty")]
    MissingName,
    #[error("birth year {0} is outside the accepted range")]
    BirthYearOutOfRange(i32),
    #[error("birthdate {birthdate} lies after the case date {case_date}")]
    BirthdateAfterCaseDate {
        birthdate: NaiveDate,
        case_date: NaiveDate,
    },
    #[error("{0:?} cannot be edited through the patient form")]
    NotEditable(Symptom),
}

/// Patient form as submitted by clinicians: demographics plus the checked symptoms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientForm {
    pub name: String,
    pub birthdate: NaiveDate,
    #[serde(default)]
    pub case_date: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub symptoms: BTreeSet<Symptom>,
}

impl PatientForm {
    pub fn new(name: impl Into<String>, birthdate: NaiveDate) -> Self {
        Self {
            name: name.into(),
            birthdate,
            case_date: None,
            gender: None,
            symptoms: BTreeSet::new(),
        }
    }

    pub fn with_case_date(mut self, case_date: NaiveDate) -> Self {
        self.case_date = Some(case_date);
        self
    }

    pub fn with_symptoms(mut self, symptoms: impl IntoIterator<Item = Symptom>) -> Self {
        self.symptoms.extend(symptoms);
        self
    }

    pub fn gender_concept_id(&self) -> ConceptId {
        self.gender
            .as_deref()
            .map(gender_concept)
            .unwrap_or(ConceptId::UNMAPPED)
    }

    /// Read-back of a stored record into the shape of the form.
    pub fn from_record(record: &PatientRecord) -> Self {
        Self {
            name: record.name.clone(),
            birthdate: record.birthdate,
            case_date: Some(record.case_date),
            gender: None,
            symptoms: Symptom::EDITABLE
                .into_iter()
                .filter(|symptom| record.has(*symptom))
                .collect(),
        }
    }
}

const EARLIEST_BIRTH_YEAR: i32 = 1900;

/// Guard responsible for producing `PatientRecord` instances from submitted forms.
#[derive(Debug, Clone)]
pub struct IntakeGuard {
    earliest_birth_year: i32,
}

impl Default for IntakeGuard {
    fn default() -> Self {
        Self {
            earliest_birth_year: EARLIEST_BIRTH_YEAR,
        }
    }
}

impl IntakeGuard {
    /// Checks the form and returns the effective case date.
    fn validate(
        &self,
        form: &PatientForm,
        default_case_date: NaiveDate,
    ) -> Result<NaiveDate, IntakeError> {
        if form.name.trim().is_empty() {
            return Err(IntakeError::MissingName);
        }

        if form.birthdate.year() < self.earliest_birth_year {
            return Err(IntakeError::BirthYearOutOfRange(form.birthdate.year()));
        }

        let case_date = form.case_date.unwrap_or(default_case_date);
        if form.birthdate > case_date {
            return Err(IntakeError::BirthdateAfterCaseDate {
                birthdate: form.birthdate,
                case_date,
            });
        }

        if let Some(symptom) = form
            .symptoms
            .iter()
            .find(|symptom| !Symptom::EDITABLE.contains(symptom))
        {
            return Err(IntakeError::NotEditable(*symptom));
        }

        Ok(case_date)
    }

    /// Build the record for a newly registered patient.
    pub fn record_from_form(
        &self,
        id: PersonId,
        form: &PatientForm,
        today: NaiveDate,
    ) -> Result<PatientRecord, IntakeError> {
        let case_date = self.validate(form, today)?;
        let mut record = PatientRecord::new(id, form.name.trim(), form.birthdate, case_date);
        toggle_symptoms(&mut record, &form.symptoms);
        Ok(record)
    }

    /// Record reflecting `form` on top of an existing patient.
    ///
    /// Codes of unchecked symptoms are removed, checked symptoms without any code get their
    /// representative code. Codes outside the editable symptoms are left untouched.
    pub fn apply_form(
        &self,
        existing: &PatientRecord,
        form: &PatientForm,
    ) -> Result<PatientRecord, IntakeError> {
        let case_date = self.validate(form, existing.case_date)?;

        let mut record = existing.clone();
        record.name = form.name.trim().to_string();
        record.birthdate = form.birthdate;
        record.case_date = case_date;
        toggle_symptoms(&mut record, &form.symptoms);
        Ok(record)
    }

    pub fn person_row(&self, record: &PatientRecord, form: &PatientForm) -> PersonRow {
        PersonRow {
            person_id: record.id,
            name: record.name.clone(),
            gender_concept_id: form.gender_concept_id(),
            year_of_birth: record.birthdate.year(),
            month_of_birth: record.birthdate.month(),
            day_of_birth: record.birthdate.day(),
            case_date: Some(record.case_date),
        }
    }
}

fn toggle_symptoms(record: &mut PatientRecord, checked: &BTreeSet<Symptom>) {
    for symptom in Symptom::EDITABLE {
        if !checked.contains(&symptom) {
            codes_mut(record, symptom.source()).retain(|code| !symptom.matches(*code));
        }
    }

    for symptom in Symptom::EDITABLE {
        if checked.contains(&symptom) && !record.has(symptom) {
            codes_mut(record, symptom.source()).push(symptom.representative_code());
        }
    }
}

fn codes_mut(record: &mut PatientRecord, source: CodeSource) -> &mut Vec<ConceptId> {
    match source {
        CodeSource::Conditions => &mut record.conditions,
        CodeSource::HighMeasurements => &mut record.high_measurements,
    }
}
