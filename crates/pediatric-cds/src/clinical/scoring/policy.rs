use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::rules::Tally;
use crate::clinical::patient::PatientRecord;

/// Upper age bound (exclusive) for a Kawasaki assessment.
pub(crate) const KAWASAKI_AGE_LIMIT: i32 = 8;
/// Upper age bound (exclusive) for a PIMS assessment.
pub(crate) const PIMS_AGE_LIMIT: i32 = 20;

/// Quantized likelihood reported for a disease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "f32", try_from = "f32")]
pub enum ScoreBand {
    None,
    Possible,
    Likely,
    Certain,
}

impl ScoreBand {
    pub fn value(self) -> f32 {
        match self {
            ScoreBand::None => 0.0,
            ScoreBand::Possible => 0.5,
            ScoreBand::Likely => 0.75,
            ScoreBand::Certain => 1.0,
        }
    }
}

impl From<ScoreBand> for f32 {
    fn from(band: ScoreBand) -> Self {
        band.value()
    }
}

impl TryFrom<f32> for ScoreBand {
    type Error = String;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        [
            ScoreBand::None,
            ScoreBand::Possible,
            ScoreBand::Likely,
            ScoreBand::Certain,
        ]
        .into_iter()
        .find(|band| (band.value() - value).abs() < f32::EPSILON)
        .ok_or_else(|| format!("{value} is not a score band (0.0, 0.5, 0.75 or 1.0)"))
    }
}

impl fmt::Display for ScoreBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.value())
    }
}

/// Diseases the engine scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disease {
    Kawasaki,
    Pims,
}

impl FromStr for Disease {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "kawasaki" => Ok(Disease::Kawasaki),
            "pims" => Ok(Disease::Pims),
            other => Err(format!("unknown disease '{other}'")),
        }
    }
}

/// Justification entry shown to clinicians next to a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    YoungerThanEight,
    YoungerThanTwenty,
    Fever,
    Exanthem,
    Enanthem,
    SwollenExtremities,
    Conjunctivitis,
    Lymphadenopathy,
    CardiacCondition,
    GastroIntestinal,
    InflammationLab,
    Covid,
    Coagulopathy,
    KawasakiSymptoms,
    KawasakiDiagnosis,
    PimsDiagnosis,
}

impl Reason {
    const ALL: [Reason; 16] = [
        Reason::YoungerThanEight,
        Reason::YoungerThanTwenty,
        Reason::Fever,
        Reason::Exanthem,
        Reason::Enanthem,
        Reason::SwollenExtremities,
        Reason::Conjunctivitis,
        Reason::Lymphadenopathy,
        Reason::CardiacCondition,
        Reason::GastroIntestinal,
        Reason::InflammationLab,
        Reason::Covid,
        Reason::Coagulopathy,
        Reason::KawasakiSymptoms,
        Reason::KawasakiDiagnosis,
        Reason::PimsDiagnosis,
    ];

    /// Label in the language of the ward staff.
    pub fn label(self) -> &'static str {
        match self {
            Reason::YoungerThanEight => "0-7 Jahre alt",
            Reason::YoungerThanTwenty => "0-19 Jahre alt",
            Reason::Fever => "Fieber",
            Reason::Exanthem => "Exanthem",
            Reason::Enanthem => "Enanthem",
            Reason::SwollenExtremities => "Geschwollene Extremitäten",
            Reason::Conjunctivitis => "Konjunktivitis",
            Reason::Lymphadenopathy => "Lymphadenopathie",
            Reason::CardiacCondition => "Kardiale Erkrankung",
            Reason::GastroIntestinal => "Übelkeit, Erbrechen, Bauchschmerzen und/oder Durchfall",
            Reason::InflammationLab => "Entzündungsparameter im Blut",
            Reason::Covid => "Covid-19 Erkrankung",
            Reason::Coagulopathy => "Gerinnungsstörung",
            Reason::KawasakiSymptoms => {
                "Exanthem, Enanthem, Konjunktivitis oder geschwollene, gerötete Extremitäten"
            }
            Reason::KawasakiDiagnosis => "Kawasaki-Syndrom",
            Reason::PimsDiagnosis => "Pediatric Inflammatory Multisystem Syndrome (PIMS)",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|reason| reason.label() == label)
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Reason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Reason {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Reason::from_label(&label)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown reason '{label}'")))
    }
}

pub(crate) fn decide_kawasaki(patient: &PatientRecord, age: i32, tally: &mut Tally) -> ScoreBand {
    if patient.has_kawasaki() {
        tally.reasons.push(Reason::KawasakiDiagnosis);
        return ScoreBand::Certain;
    }

    if age >= KAWASAKI_AGE_LIMIT {
        return ScoreBand::None;
    }

    let symptoms = tally.count;
    if patient.has_fever() {
        // Fever plus four more findings is the complete presentation.
        if symptoms >= 5 {
            ScoreBand::Certain
        } else if symptoms >= 2 {
            ScoreBand::Likely
        } else {
            ScoreBand::Possible
        }
    } else if symptoms > 0 {
        ScoreBand::Possible
    } else {
        ScoreBand::None
    }
}

pub(crate) fn decide_pims(patient: &PatientRecord, age: i32, tally: &mut Tally) -> ScoreBand {
    if patient.has_pims() {
        tally.reasons.push(Reason::PimsDiagnosis);
        return ScoreBand::Certain;
    }

    if age >= PIMS_AGE_LIMIT {
        return ScoreBand::None;
    }

    // A Kawasaki diagnosis implies fever.
    let meets_core_criteria = (patient.has_fever() || patient.has_kawasaki())
        && patient.has_covid()
        && patient.has_inflammation_lab();

    if meets_core_criteria {
        let mucocutaneous = patient.has_kawasaki() || patient.has_kawasaki_symptom();
        let side_symptoms = [
            mucocutaneous,
            patient.has_cardiac_condition(),
            patient.has_gastro_intestinal_condition(),
            patient.has_coagulopathy(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count();

        return if side_symptoms >= 2 {
            ScoreBand::Certain
        } else {
            ScoreBand::Likely
        };
    }

    match tally.count {
        count if count >= 3 => ScoreBand::Likely,
        count if count >= 1 => ScoreBand::Possible,
        _ => ScoreBand::None,
    }
}
