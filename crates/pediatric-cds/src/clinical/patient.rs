use std::fmt;

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use super::concepts::{CodeSource, ConceptId, Symptom};
use super::scoring::{Reason, ScoreBand};

/// Unique identifier of a person in the OMOP `person` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(pub i64);

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Patient with the clinical codes relevant for scoring and the last computed scores.
///
/// Codes are the durable state. Scores and reason lists are a derived view that the
/// score engine rebuilds on every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: PersonId,
    pub name: String,
    pub birthdate: NaiveDate,
    pub case_date: NaiveDate,
    pub conditions: Vec<ConceptId>,
    pub high_measurements: Vec<ConceptId>,
    pub procedures: Vec<ConceptId>,
    pub kawasaki_score: ScoreBand,
    pub pims_score: ScoreBand,
    pub reasons_for_kawasaki: Vec<Reason>,
    pub missing_for_kawasaki: Vec<Reason>,
    pub reasons_for_pims: Vec<Reason>,
    pub missing_for_pims: Vec<Reason>,
}

impl PatientRecord {
    pub fn new(
        id: PersonId,
        name: impl Into<String>,
        birthdate: NaiveDate,
        case_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            birthdate,
            case_date,
            conditions: Vec::new(),
            high_measurements: Vec::new(),
            procedures: Vec::new(),
            kawasaki_score: ScoreBand::None,
            pims_score: ScoreBand::None,
            reasons_for_kawasaki: Vec::new(),
            missing_for_kawasaki: Vec::new(),
            reasons_for_pims: Vec::new(),
            missing_for_pims: Vec::new(),
        }
    }

    /// Record without a known case date; ages are computed against today.
    pub fn without_case_date(id: PersonId, name: impl Into<String>, birthdate: NaiveDate) -> Self {
        Self::new(id, name, birthdate, Local::now().date_naive())
    }

    pub fn with_conditions(mut self, codes: impl IntoIterator<Item = ConceptId>) -> Self {
        self.conditions.extend(codes);
        self
    }

    pub fn with_high_measurements(mut self, codes: impl IntoIterator<Item = ConceptId>) -> Self {
        self.high_measurements.extend(codes);
        self
    }

    pub fn with_procedures(mut self, codes: impl IntoIterator<Item = ConceptId>) -> Self {
        self.procedures.extend(codes);
        self
    }

    pub fn add_condition(&mut self, code: ConceptId) {
        self.conditions.push(code);
    }

    pub fn add_high_measurement(&mut self, code: ConceptId) {
        self.high_measurements.push(code);
    }

    /// Procedures are kept for display; no score reads them.
    pub fn add_procedure(&mut self, code: ConceptId) {
        self.procedures.push(code);
    }

    /// Age in whole years at the case date.
    pub fn calculate_age(&self) -> i32 {
        self.calculate_age_at(self.case_date)
    }

    /// Age in whole years at `reference`. Dates before the birthdate yield negative ages.
    pub fn calculate_age_at(&self, reference: NaiveDate) -> i32 {
        let years = reference.year() - self.birthdate.year();
        let before_birthday =
            (reference.month(), reference.day()) < (self.birthdate.month(), self.birthdate.day());
        if before_birthday {
            years - 1
        } else {
            years
        }
    }

    pub fn has(&self, symptom: Symptom) -> bool {
        self.codes_from(symptom.source())
            .iter()
            .any(|code| symptom.matches(*code))
    }

    /// Codes of the symptom's set present on the record, first-seen order, without duplicates.
    pub fn matching_codes(&self, symptom: Symptom) -> Vec<ConceptId> {
        let mut matched = Vec::new();
        for code in self.codes_from(symptom.source()) {
            if symptom.matches(*code) && !matched.contains(code) {
                matched.push(*code);
            }
        }
        matched
    }

    fn codes_from(&self, source: CodeSource) -> &[ConceptId] {
        match source {
            CodeSource::Conditions => &self.conditions,
            CodeSource::HighMeasurements => &self.high_measurements,
        }
    }

    pub fn has_fever(&self) -> bool {
        self.has(Symptom::Fever)
    }

    pub fn has_exanthem(&self) -> bool {
        self.has(Symptom::Exanthem)
    }

    /// Inflammation of mouth, lips, tongue or mucosa.
    pub fn has_enanthem(&self) -> bool {
        self.has(Symptom::Enanthem)
    }

    pub fn has_swollen_extremities(&self) -> bool {
        self.has(Symptom::SwollenExtremities)
    }

    pub fn has_conjunctivitis(&self) -> bool {
        self.has(Symptom::Conjunctivitis)
    }

    pub fn has_lymphadenopathy(&self) -> bool {
        self.has(Symptom::Lymphadenopathy)
    }

    pub fn has_cardiac_condition(&self) -> bool {
        self.has(Symptom::CardiacCondition)
    }

    pub fn has_gastro_intestinal_condition(&self) -> bool {
        self.has(Symptom::GastroIntestinal)
    }

    pub fn has_inflammation_lab(&self) -> bool {
        self.has(Symptom::InflammationLab)
    }

    pub fn has_coagulopathy(&self) -> bool {
        self.has(Symptom::Coagulopathy)
    }

    pub fn has_effusion(&self) -> bool {
        self.has(Symptom::Effusion)
    }

    pub fn has_covid(&self) -> bool {
        self.has(Symptom::Covid)
    }

    pub fn has_ascites(&self) -> bool {
        self.has(Symptom::Ascites)
    }

    pub fn has_pleural_effusion(&self) -> bool {
        self.has(Symptom::PleuralEffusion)
    }

    pub fn has_pericardial_effusion(&self) -> bool {
        self.has(Symptom::PericardialEffusion)
    }

    pub fn has_pericarditis(&self) -> bool {
        self.has(Symptom::Pericarditis)
    }

    pub fn has_myocarditis(&self) -> bool {
        self.has(Symptom::Myocarditis)
    }

    pub fn has_kawasaki(&self) -> bool {
        self.has(Symptom::KawasakiDiagnosis)
    }

    pub fn has_pims(&self) -> bool {
        self.has(Symptom::PimsDiagnosis)
    }

    /// Any of the mucocutaneous findings PIMS shares with Kawasaki disease.
    pub fn has_kawasaki_symptom(&self) -> bool {
        self.has_exanthem()
            || self.has_enanthem()
            || self.has_conjunctivitis()
            || self.has_swollen_extremities()
    }
}
