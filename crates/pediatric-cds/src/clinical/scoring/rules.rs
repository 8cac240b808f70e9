use super::policy::{Reason, KAWASAKI_AGE_LIMIT, PIMS_AGE_LIMIT};
use crate::clinical::patient::PatientRecord;

/// Running reason/missing lists and the number of findings counted toward a score.
#[derive(Debug, Default)]
pub(crate) struct Tally {
    pub reasons: Vec<Reason>,
    pub missing: Vec<Reason>,
    pub count: u8,
}

impl Tally {
    /// Record a finding and count it when present.
    fn finding(&mut self, present: bool, reason: Reason) {
        self.note(present, reason);
        if present {
            self.count += 1;
        }
    }

    /// Record a finding without counting it.
    fn note(&mut self, present: bool, reason: Reason) {
        if present {
            self.reasons.push(reason);
        } else {
            self.missing.push(reason);
        }
    }
}

pub(crate) fn tally_kawasaki(patient: &PatientRecord, age: i32) -> Tally {
    let mut tally = Tally::default();

    tally.note(age < KAWASAKI_AGE_LIMIT, Reason::YoungerThanEight);
    tally.finding(patient.has_fever(), Reason::Fever);
    tally.finding(patient.has_exanthem(), Reason::Exanthem);
    tally.finding(patient.has_swollen_extremities(), Reason::SwollenExtremities);
    tally.finding(patient.has_conjunctivitis(), Reason::Conjunctivitis);
    tally.finding(patient.has_lymphadenopathy(), Reason::Lymphadenopathy);
    tally.finding(patient.has_enanthem(), Reason::Enanthem);

    tally
}

pub(crate) fn tally_pims(patient: &PatientRecord, age: i32) -> Tally {
    let mut tally = Tally::default();

    tally.note(age < PIMS_AGE_LIMIT, Reason::YoungerThanTwenty);
    tally.finding(patient.has_fever(), Reason::Fever);

    if patient.has_kawasaki() {
        tally.finding(true, Reason::KawasakiDiagnosis);
        if !patient.has_fever() {
            tally.count += 1;
        }
    } else {
        tally.finding(patient.has_kawasaki_symptom(), Reason::KawasakiSymptoms);
    }

    tally.finding(patient.has_cardiac_condition(), Reason::CardiacCondition);
    tally.finding(patient.has_coagulopathy(), Reason::Coagulopathy);
    tally.finding(
        patient.has_gastro_intestinal_condition(),
        Reason::GastroIntestinal,
    );
    tally.finding(patient.has_covid(), Reason::Covid);
    tally.finding(patient.has_inflammation_lab(), Reason::InflammationLab);

    tally
}
