use std::fmt;

use serde::{Deserialize, Serialize};

use super::store::OmopTable;

/// OMOP concept identifier (SNOMED for conditions, LOINC for measurements).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConceptId(pub i64);

impl ConceptId {
    /// Concept id 0 is "No matching concept" in the OMOP vocabulary.
    pub const UNMAPPED: ConceptId = ConceptId(0);

    pub fn is_mapped(self) -> bool {
        self != Self::UNMAPPED
    }
}

impl fmt::Display for ConceptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod snomed {
    use super::ConceptId;

    pub const FEVER: ConceptId = ConceptId(437663);
    pub const FEVER_WITH_CHILLS: ConceptId = ConceptId(4164645);
    pub const FEBRILE_CONVULSIONS: ConceptId = ConceptId(444413);
    pub const CONTINUOUS_FEVER: ConceptId = ConceptId(4158330);

    pub const ERUPTION: ConceptId = ConceptId(140214);
    pub const SKIN_OR_MUCOSA_FINDING_DUE_TO_VIRUS: ConceptId = ConceptId(4212577);
    pub const SKIN_OR_MUCOSA_FINDING_DUE_TO_OTHER_VIRUSES: ConceptId = ConceptId(443724);

    pub const DISORDER_OF_ORAL_SOFT_TISSUE: ConceptId = ConceptId(139057);
    pub const DISORDER_OF_LIP: ConceptId = ConceptId(135858);
    pub const LESION_OF_ORAL_MUCOSA: ConceptId = ConceptId(37016130);

    pub const SWELLING: ConceptId = ConceptId(443257);
    pub const SWELLING_OF_UPPER_LIMB: ConceptId = ConceptId(4168701);
    pub const SWELLING_OF_LOWER_LIMB: ConceptId = ConceptId(4171919);

    pub const CONJUNCTIVITIS: ConceptId = ConceptId(379019);
    pub const MUCOPURULENT_CONJUNCTIVITIS: ConceptId = ConceptId(376422);
    pub const ACUTE_CONJUNCTIVITIS: ConceptId = ConceptId(376707);

    pub const LYMPHADENOPATHY: ConceptId = ConceptId(315085);
    pub const LOCALIZED_LYMPHADENOPATHY: ConceptId = ConceptId(4168700);
    pub const GENERALIZED_LYMPHADENOPATHY: ConceptId = ConceptId(4165998);

    pub const PERICARDITIS: ConceptId = ConceptId(315293);
    pub const ACUTE_PERICARDITIS: ConceptId = ConceptId(4217075);
    pub const CHRONIC_PERICARDITIS: ConceptId = ConceptId(320116);
    pub const MYOCARDIAL_INFARCTION: ConceptId = ConceptId(434376);
    pub const OLD_MYOCARDIAL_INFARCTION: ConceptId = ConceptId(438170);
    pub const SUBSEQUENT_MYOCARDIAL_INFARCTION: ConceptId = ConceptId(312327);
    pub const ACUTE_MYOCARDIAL_INFARCTION: ConceptId = ConceptId(4270024);
    pub const MYOCARDITIS: ConceptId = ConceptId(4331309);
    pub const ACUTE_MYOCARDITIS: ConceptId = ConceptId(4143969);
    pub const CHRONIC_MYOCARDITIS: ConceptId = ConceptId(312653);
    pub const PERICARDIAL_EFFUSION: ConceptId = ConceptId(4108814);

    pub const NAUSEA_AND_VOMITING: ConceptId = ConceptId(27674);
    pub const NAUSEA: ConceptId = ConceptId(4182562);
    pub const ABDOMINAL_PAIN: ConceptId = ConceptId(200219);
    pub const VOMITING: ConceptId = ConceptId(4116811);
    pub const DIARRHEA: ConceptId = ConceptId(196523);
    pub const GASTROENTERITIS: ConceptId = ConceptId(4091519);
    pub const ACUTE_ABDOMINAL_PAIN: ConceptId = ConceptId(4249551);
    pub const INFECTIOUS_DIARRHEA: ConceptId = ConceptId(196151);

    pub const ASCITES: ConceptId = ConceptId(200528);
    pub const PLEURAL_EFFUSION: ConceptId = ConceptId(254061);

    pub const COVID_19: ConceptId = ConceptId(37311061);
    pub const COVID_19_VIRUS_NOT_IDENTIFIED: ConceptId = ConceptId(37311060);
    pub const POST_COVID_19: ConceptId = ConceptId(705076);

    pub const KAWASAKI: ConceptId = ConceptId(314381);
    /// Stand-in for the PIMS concept (703578), which is missing from the deployed vocabulary.
    pub const PIMS: ConceptId = ConceptId(434821);
}

pub mod loinc {
    use super::ConceptId;

    pub const C_REACTIVE_PROTEIN: ConceptId = ConceptId(3020460);
    pub const C_REACTIVE_PROTEIN_HIGH_SENSITIVITY: ConceptId = ConceptId(42870365);
    pub const ERYTHROCYTE_SEDIMENTATION_RATE: ConceptId = ConceptId(3013707);
    pub const LEUKOCYTES: ConceptId = ConceptId(3000905);
    pub const PROCALCITONIN: ConceptId = ConceptId(3046279);

    pub const PTT_BLOOD: ConceptId = ConceptId(3013466);
    pub const PTT_PLASMA: ConceptId = ConceptId(3018677);
    pub const D_DIMER: ConceptId = ConceptId(3052648);
    pub const PROTHROMBIN_TIME: ConceptId = ConceptId(3033658);
}

/// Value and provenance concepts used on persisted rows.
pub mod markers {
    use super::ConceptId;

    pub const VALUE_HIGH: ConceptId = ConceptId(4328749);
    pub const VALUE_LOW: ConceptId = ConceptId(4267416);
    pub const VALUE_NORMAL: ConceptId = ConceptId(4124457);

    /// Row imported from the hospital EHR export.
    pub const TYPE_EHR: ConceptId = ConceptId(32817);
    /// Row entered by a clinician through the patient form.
    pub const TYPE_MANUAL_ENTRY: ConceptId = ConceptId(32865);

    pub const GENDER_FEMALE: ConceptId = ConceptId(8532);
    pub const GENDER_MALE: ConceptId = ConceptId(8507);
}

use loinc::*;
use snomed::*;

const FEVER_CODES: &[ConceptId] = &[
    FEVER,
    FEVER_WITH_CHILLS,
    FEBRILE_CONVULSIONS,
    CONTINUOUS_FEVER,
];
const EXANTHEM_CODES: &[ConceptId] = &[
    ERUPTION,
    SKIN_OR_MUCOSA_FINDING_DUE_TO_VIRUS,
    SKIN_OR_MUCOSA_FINDING_DUE_TO_OTHER_VIRUSES,
];
const ENANTHEM_CODES: &[ConceptId] = &[
    DISORDER_OF_ORAL_SOFT_TISSUE,
    DISORDER_OF_LIP,
    LESION_OF_ORAL_MUCOSA,
    SKIN_OR_MUCOSA_FINDING_DUE_TO_VIRUS,
    SKIN_OR_MUCOSA_FINDING_DUE_TO_OTHER_VIRUSES,
];
const SWOLLEN_EXTREMITY_CODES: &[ConceptId] =
    &[SWELLING, SWELLING_OF_UPPER_LIMB, SWELLING_OF_LOWER_LIMB];
const CONJUNCTIVITIS_CODES: &[ConceptId] = &[
    CONJUNCTIVITIS,
    MUCOPURULENT_CONJUNCTIVITIS,
    ACUTE_CONJUNCTIVITIS,
];
const LYMPHADENOPATHY_CODES: &[ConceptId] = &[
    LYMPHADENOPATHY,
    LOCALIZED_LYMPHADENOPATHY,
    GENERALIZED_LYMPHADENOPATHY,
];
const CARDIAC_CODES: &[ConceptId] = &[
    PERICARDITIS,
    ACUTE_PERICARDITIS,
    CHRONIC_PERICARDITIS,
    MYOCARDIAL_INFARCTION,
    OLD_MYOCARDIAL_INFARCTION,
    SUBSEQUENT_MYOCARDIAL_INFARCTION,
    ACUTE_MYOCARDIAL_INFARCTION,
    MYOCARDITIS,
    ACUTE_MYOCARDITIS,
    CHRONIC_MYOCARDITIS,
    PERICARDIAL_EFFUSION,
];
const GASTRO_INTESTINAL_CODES: &[ConceptId] = &[
    NAUSEA_AND_VOMITING,
    NAUSEA,
    ABDOMINAL_PAIN,
    VOMITING,
    DIARRHEA,
    GASTROENTERITIS,
    ACUTE_ABDOMINAL_PAIN,
    INFECTIOUS_DIARRHEA,
];
const INFLAMMATION_LAB_CODES: &[ConceptId] = &[
    C_REACTIVE_PROTEIN,
    C_REACTIVE_PROTEIN_HIGH_SENSITIVITY,
    ERYTHROCYTE_SEDIMENTATION_RATE,
    LEUKOCYTES,
    PROCALCITONIN,
];
const COAGULOPATHY_CODES: &[ConceptId] = &[PTT_BLOOD, PTT_PLASMA, D_DIMER, PROTHROMBIN_TIME];
const EFFUSION_CODES: &[ConceptId] = &[ASCITES, PLEURAL_EFFUSION, PERICARDIAL_EFFUSION];
const COVID_CODES: &[ConceptId] = &[COVID_19, COVID_19_VIRUS_NOT_IDENTIFIED, POST_COVID_19];

/// Which code list of a patient a predicate inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeSource {
    Conditions,
    HighMeasurements,
}

/// Named clinical predicate: true when any code of its set is present on the patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symptom {
    Fever,
    Exanthem,
    Enanthem,
    SwollenExtremities,
    Conjunctivitis,
    Lymphadenopathy,
    CardiacCondition,
    GastroIntestinal,
    InflammationLab,
    Coagulopathy,
    Effusion,
    Covid,
    Ascites,
    PleuralEffusion,
    PericardialEffusion,
    Pericarditis,
    Myocarditis,
    KawasakiDiagnosis,
    PimsDiagnosis,
}

impl Symptom {
    /// Symptoms a clinician can toggle on the patient form, in reconciliation order.
    pub const EDITABLE: [Symptom; 16] = [
        Symptom::Covid,
        Symptom::Fever,
        Symptom::Exanthem,
        Symptom::Enanthem,
        Symptom::SwollenExtremities,
        Symptom::Conjunctivitis,
        Symptom::Lymphadenopathy,
        Symptom::GastroIntestinal,
        Symptom::Ascites,
        Symptom::PericardialEffusion,
        Symptom::PleuralEffusion,
        Symptom::Pericarditis,
        Symptom::Myocarditis,
        Symptom::InflammationLab,
        Symptom::KawasakiDiagnosis,
        Symptom::Coagulopathy,
    ];

    pub fn codes(self) -> &'static [ConceptId] {
        match self {
            Symptom::Fever => FEVER_CODES,
            Symptom::Exanthem => EXANTHEM_CODES,
            Symptom::Enanthem => ENANTHEM_CODES,
            Symptom::SwollenExtremities => SWOLLEN_EXTREMITY_CODES,
            Symptom::Conjunctivitis => CONJUNCTIVITIS_CODES,
            Symptom::Lymphadenopathy => LYMPHADENOPATHY_CODES,
            Symptom::CardiacCondition => CARDIAC_CODES,
            Symptom::GastroIntestinal => GASTRO_INTESTINAL_CODES,
            Symptom::InflammationLab => INFLAMMATION_LAB_CODES,
            Symptom::Coagulopathy => COAGULOPATHY_CODES,
            Symptom::Effusion => EFFUSION_CODES,
            Symptom::Covid => COVID_CODES,
            Symptom::Ascites => &[ASCITES],
            Symptom::PleuralEffusion => &[PLEURAL_EFFUSION],
            Symptom::PericardialEffusion => &[PERICARDIAL_EFFUSION],
            Symptom::Pericarditis => &[PERICARDITIS],
            Symptom::Myocarditis => &[MYOCARDITIS],
            Symptom::KawasakiDiagnosis => &[KAWASAKI],
            Symptom::PimsDiagnosis => &[PIMS],
        }
    }

    pub fn source(self) -> CodeSource {
        match self {
            Symptom::InflammationLab | Symptom::Coagulopathy => CodeSource::HighMeasurements,
            _ => CodeSource::Conditions,
        }
    }

    /// Code written when a clinician marks the symptom as present.
    pub fn representative_code(self) -> ConceptId {
        match self {
            Symptom::InflammationLab => C_REACTIVE_PROTEIN,
            Symptom::Coagulopathy => D_DIMER,
            other => other.codes()[0],
        }
    }

    pub fn table(self) -> OmopTable {
        match self.source() {
            CodeSource::Conditions => OmopTable::ConditionOccurrence,
            CodeSource::HighMeasurements => OmopTable::Measurement,
        }
    }

    pub fn matches(self, code: ConceptId) -> bool {
        self.codes().contains(&code)
    }
}

/// Maps the gender column of the hospital export onto OMOP gender concepts.
pub fn gender_concept(source_value: &str) -> ConceptId {
    match source_value.trim() {
        "w" => markers::GENDER_FEMALE,
        "m" => markers::GENDER_MALE,
        _ => ConceptId::UNMAPPED,
    }
}
