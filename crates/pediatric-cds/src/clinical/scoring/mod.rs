mod policy;
mod rules;

pub use policy::{Disease, Reason, ScoreBand};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::patient::PatientRecord;
use policy::{decide_kawasaki, decide_pims};

/// Stateless rule engine turning a patient's codes and age into quantized scores.
///
/// Each entry point clears and rebuilds exactly one reason/missing pair on the record,
/// so repeated calls never accumulate entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreEngine;

impl ScoreEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn score_kawasaki(&self, patient: &mut PatientRecord) -> ScoreBand {
        let age = patient.calculate_age();
        let mut tally = rules::tally_kawasaki(patient, age);
        let band = decide_kawasaki(patient, age, &mut tally);

        patient.kawasaki_score = band;
        patient.reasons_for_kawasaki = tally.reasons;
        patient.missing_for_kawasaki = tally.missing;

        debug!(
            person_id = %patient.id,
            age,
            symptoms = tally.count,
            score = %band,
            "kawasaki scored"
        );
        band
    }

    pub fn score_pims(&self, patient: &mut PatientRecord) -> ScoreBand {
        let age = patient.calculate_age();
        let mut tally = rules::tally_pims(patient, age);
        let band = decide_pims(patient, age, &mut tally);

        patient.pims_score = band;
        patient.reasons_for_pims = tally.reasons;
        patient.missing_for_pims = tally.missing;

        debug!(
            person_id = %patient.id,
            age,
            symptoms = tally.count,
            score = %band,
            "pims scored"
        );
        band
    }

    pub fn score(&self, patient: &mut PatientRecord) -> ScoreSummary {
        self.score_kawasaki(patient);
        self.score_pims(patient);
        ScoreSummary::from(&*patient)
    }
}

/// Both scores with their explanation lists, as shown next to a patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub kawasaki_score: ScoreBand,
    pub kawasaki_reasons: Vec<Reason>,
    pub kawasaki_missing: Vec<Reason>,
    pub pims_score: ScoreBand,
    pub pims_reasons: Vec<Reason>,
    pub pims_missing: Vec<Reason>,
}

impl ScoreSummary {
    pub fn band(&self, disease: Disease) -> ScoreBand {
        match disease {
            Disease::Kawasaki => self.kawasaki_score,
            Disease::Pims => self.pims_score,
        }
    }
}

impl From<&PatientRecord> for ScoreSummary {
    fn from(patient: &PatientRecord) -> Self {
        Self {
            kawasaki_score: patient.kawasaki_score,
            kawasaki_reasons: patient.reasons_for_kawasaki.clone(),
            kawasaki_missing: patient.missing_for_kawasaki.clone(),
            pims_score: patient.pims_score,
            pims_reasons: patient.reasons_for_pims.clone(),
            pims_missing: patient.missing_for_pims.clone(),
        }
    }
}
