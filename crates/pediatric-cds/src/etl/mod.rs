//! Import of the hospital's PERSON, CASE, DIAGNOSIS, PROCEDURE and LAB exports into the
//! concept store.

mod mapping;
mod parser;

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::clinical::concepts::{gender_concept, markers, ConceptId};
use crate::clinical::patient::PersonId;
use crate::clinical::store::{
    generate_unique_id, ConceptStore, ConditionRow, MeasurementRow, OmopTable, PersonRow,
    ProcedureRow, StoreError, Vocabulary, DEFAULT_ID_ATTEMPTS,
};
use parser::{CaseExport, DiagnosisExport, LabExport, PersonExport, ProcedureExport};

pub const PERSON_FILE: &str = "PERSON.csv";
pub const CASE_FILE: &str = "CASE.csv";
pub const DIAGNOSIS_FILE: &str = "DIAGNOSIS.csv";
pub const PROCEDURE_FILE: &str = "PROCEDURE.csv";
pub const LAB_FILE: &str = "LAB.csv";

#[derive(Debug)]
pub enum EtlError {
    Io(std::io::Error),
    Csv(csv::Error),
    Store(StoreError),
    InvalidDate { file: &'static str, value: String },
}

impl std::fmt::Display for EtlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EtlError::Io(err) => write!(f, "failed to read hospital export: {}", err),
            EtlError::Csv(err) => write!(f, "invalid export CSV data: {}", err),
            EtlError::Store(err) => write!(f, "could not write imported rows: {}", err),
            EtlError::InvalidDate { file, value } => {
                write!(f, "{} contains an unreadable date '{}'", file, value)
            }
        }
    }
}

impl std::error::Error for EtlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EtlError::Io(err) => Some(err),
            EtlError::Csv(err) => Some(err),
            EtlError::Store(err) => Some(err),
            EtlError::InvalidDate { .. } => None,
        }
    }
}

impl From<std::io::Error> for EtlError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for EtlError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<StoreError> for EtlError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

/// Counts of rows written by one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub persons: usize,
    pub conditions: usize,
    pub procedures: usize,
    pub measurements: usize,
    pub skipped: usize,
}

/// The five files of one hospital export.
#[derive(Debug)]
pub struct HospitalExport<R> {
    pub person: R,
    pub case: R,
    pub diagnosis: R,
    pub procedure: R,
    pub lab: R,
}

impl HospitalExport<File> {
    pub fn open(dir: &Path) -> Result<Self, EtlError> {
        Ok(Self {
            person: File::open(dir.join(PERSON_FILE))?,
            case: File::open(dir.join(CASE_FILE))?,
            diagnosis: File::open(dir.join(DIAGNOSIS_FILE))?,
            procedure: File::open(dir.join(PROCEDURE_FILE))?,
            lab: File::open(dir.join(LAB_FILE))?,
        })
    }
}

/// Loads hospital exports into a [`ConceptStore`].
///
/// Persons keep their export id. Diagnosis, procedure and lab rows get freshly allocated ids
/// and the EHR type concept. A person's case date is the start of their latest case, or the
/// latest diagnosis admission when the export lists no case for them.
///
/// Persons already in the store are skipped together with all of their rows, so importing
/// the same export twice writes nothing the second time.
#[derive(Debug, Clone)]
pub struct OmopCsvImporter {
    max_id_attempts: u32,
}

impl Default for OmopCsvImporter {
    fn default() -> Self {
        Self::new(DEFAULT_ID_ATTEMPTS)
    }
}

impl OmopCsvImporter {
    pub fn new(max_id_attempts: u32) -> Self {
        Self {
            max_id_attempts: max_id_attempts.max(1),
        }
    }

    pub fn from_dir<P, S>(&self, dir: P, store: &S) -> Result<ImportSummary, EtlError>
    where
        P: AsRef<Path>,
        S: ConceptStore + ?Sized,
    {
        let dir = dir.as_ref();
        let export = HospitalExport::open(dir)?;
        info!(dir = %dir.display(), "importing hospital export");
        self.from_readers(export, store)
    }

    pub fn from_readers<R, S>(
        &self,
        export: HospitalExport<R>,
        store: &S,
    ) -> Result<ImportSummary, EtlError>
    where
        R: Read,
        S: ConceptStore + ?Sized,
    {
        let mut rng = rand::thread_rng();
        self.import(export, store, &mut rng)
    }

    /// Same as [`from_readers`](Self::from_readers) with a caller supplied id generator.
    pub fn import<R, S, G>(
        &self,
        export: HospitalExport<R>,
        store: &S,
        rng: &mut G,
    ) -> Result<ImportSummary, EtlError>
    where
        R: Read,
        S: ConceptStore + ?Sized,
        G: Rng + ?Sized,
    {
        let persons = parser::parse_persons(export.person)?;
        let cases = parser::parse_cases(export.case)?;
        let diagnoses = parser::parse_diagnoses(export.diagnosis)?;
        let procedures = parser::parse_procedures(export.procedure)?;
        let labs = parser::parse_labs(export.lab)?;

        let mut run = ImportRun {
            store,
            max_id_attempts: self.max_id_attempts,
            known: HashSet::new(),
            already_stored: HashSet::new(),
            case_starts: BTreeMap::new(),
            admissions: BTreeMap::new(),
            summary: ImportSummary::default(),
        };
        run.persons(persons)?;
        run.cases(cases)?;
        run.diagnoses(diagnoses, rng)?;
        run.procedures(procedures, rng)?;
        run.labs(labs, rng)?;
        run.case_dates()?;

        info!(
            persons = run.summary.persons,
            conditions = run.summary.conditions,
            procedures = run.summary.procedures,
            measurements = run.summary.measurements,
            skipped = run.summary.skipped,
            "hospital export imported"
        );
        Ok(run.summary)
    }
}

struct ImportRun<'a, S: ?Sized> {
    store: &'a S,
    max_id_attempts: u32,
    known: HashSet<PersonId>,
    already_stored: HashSet<PersonId>,
    case_starts: BTreeMap<PersonId, NaiveDate>,
    admissions: BTreeMap<PersonId, NaiveDate>,
    summary: ImportSummary,
}

impl<S> ImportRun<'_, S>
where
    S: ConceptStore + ?Sized,
{
    fn persons(&mut self, rows: Vec<PersonExport>) -> Result<(), EtlError> {
        for row in rows {
            let birthdate = mapping::parse_export_date(&row.birthdate).ok_or_else(|| {
                EtlError::InvalidDate {
                    file: PERSON_FILE,
                    value: row.birthdate.clone(),
                }
            })?;
            let person_id = PersonId(row.patient_id);
            let person = PersonRow {
                person_id,
                name: mapping::display_name(row.forename.as_deref(), row.name.as_deref()),
                gender_concept_id: row
                    .gender
                    .as_deref()
                    .map(gender_concept)
                    .unwrap_or(ConceptId::UNMAPPED),
                year_of_birth: birthdate.year(),
                month_of_birth: birthdate.month(),
                day_of_birth: birthdate.day(),
                case_date: None,
            };

            match self.store.add_person(person) {
                Ok(()) => {
                    self.summary.persons += 1;
                    self.known.insert(person_id);
                }
                Err(StoreError::Conflict) => {
                    debug!(%person_id, "person already stored, skipping their rows");
                    self.summary.skipped += 1;
                    self.already_stored.insert(person_id);
                }
                Err(other) => return Err(other.into()),
            }
        }
        Ok(())
    }

    fn cases(&mut self, rows: Vec<CaseExport>) -> Result<(), EtlError> {
        for row in rows {
            let person_id = PersonId(row.patient_id);
            let Some(start) = self.row_date(person_id, row.start_date.as_deref(), CASE_FILE)?
            else {
                self.summary.skipped += 1;
                continue;
            };
            let latest = self.case_starts.entry(person_id).or_insert(start);
            *latest = (*latest).max(start);
        }
        Ok(())
    }

    fn diagnoses<R>(&mut self, rows: Vec<DiagnosisExport>, rng: &mut R) -> Result<(), EtlError>
    where
        R: Rng + ?Sized,
    {
        for row in rows {
            let person_id = PersonId(row.patient_id);
            let admission = row.admission_date.as_deref();
            let Some(date) = self.row_date(person_id, admission, DIAGNOSIS_FILE)? else {
                self.summary.skipped += 1;
                continue;
            };

            let latest = self.admissions.entry(person_id).or_insert(date);
            *latest = (*latest).max(date);

            for code in row.codes() {
                let concept = self.store.lookup_concept_id(code, Vocabulary::Icd10Gm)?;
                let Some(concept) = concept else {
                    debug!(code, "unmapped diagnosis code");
                    self.summary.skipped += 1;
                    continue;
                };
                let id = generate_unique_id(
                    self.store,
                    OmopTable::ConditionOccurrence,
                    rng,
                    self.max_id_attempts,
                )?;
                self.store.add_condition(ConditionRow {
                    condition_occurrence_id: id,
                    person_id,
                    condition_concept_id: concept,
                    condition_start_date: date,
                    condition_type_concept_id: markers::TYPE_EHR,
                })?;
                self.summary.conditions += 1;
            }
        }
        Ok(())
    }

    fn procedures<R>(&mut self, rows: Vec<ProcedureExport>, rng: &mut R) -> Result<(), EtlError>
    where
        R: Rng + ?Sized,
    {
        for row in rows {
            let person_id = PersonId(row.patient_id);
            let executed = row.execution_date.as_deref();
            let Some(date) = self.row_date(person_id, executed, PROCEDURE_FILE)? else {
                self.summary.skipped += 1;
                continue;
            };

            let concept = match row.ops_code.as_deref() {
                Some(code) => self.store.lookup_concept_id(code, Vocabulary::Ops)?,
                None => None,
            };
            let Some(concept) = concept else {
                debug!(code = ?row.ops_code, "unmapped procedure code");
                self.summary.skipped += 1;
                continue;
            };

            let id = generate_unique_id(
                self.store,
                OmopTable::ProcedureOccurrence,
                rng,
                self.max_id_attempts,
            )?;
            self.store.add_procedure(ProcedureRow {
                procedure_occurrence_id: id,
                person_id,
                procedure_concept_id: concept,
                procedure_date: date,
                procedure_type_concept_id: markers::TYPE_EHR,
            })?;
            self.summary.procedures += 1;
        }
        Ok(())
    }

    fn labs<R>(&mut self, rows: Vec<LabExport>, rng: &mut R) -> Result<(), EtlError>
    where
        R: Rng + ?Sized,
    {
        for row in rows {
            let person_id = PersonId(row.patient_id);
            let Some(date) = self.row_date(person_id, row.test_date.as_deref(), LAB_FILE)? else {
                self.summary.skipped += 1;
                continue;
            };

            if !mapping::is_abnormal_high(row.is_normal.as_deref(), row.deviation.as_deref()) {
                self.summary.skipped += 1;
                continue;
            }

            let concept = match row.loinc.as_deref() {
                Some(code) => self.store.lookup_concept_id(code, Vocabulary::Loinc)?,
                None => None,
            };
            let Some(concept) = concept else {
                debug!(code = ?row.loinc, "unmapped lab parameter");
                self.summary.skipped += 1;
                continue;
            };

            let id =
                generate_unique_id(self.store, OmopTable::Measurement, rng, self.max_id_attempts)?;
            self.store.add_measurement(MeasurementRow {
                measurement_id: id,
                person_id,
                measurement_concept_id: concept,
                measurement_date: date,
                measurement_type_concept_id: markers::TYPE_EHR,
                value_as_concept_id: markers::VALUE_HIGH,
            })?;
            self.summary.measurements += 1;
        }
        Ok(())
    }

    /// Case start wins over diagnosis admissions.
    fn case_dates(&mut self) -> Result<(), EtlError> {
        let mut case_dates = std::mem::take(&mut self.admissions);
        case_dates.append(&mut self.case_starts);

        for (person_id, case_date) in case_dates {
            if let Some(mut person) = self.store.fetch_person(person_id)? {
                person.case_date = Some(case_date);
                self.store.update_person(person)?;
            }
        }
        Ok(())
    }

    /// Date of a row belonging to a person imported by this run or stored before it;
    /// `None` when the row has to be skipped.
    fn row_date(
        &mut self,
        person_id: PersonId,
        raw_date: Option<&str>,
        file: &'static str,
    ) -> Result<Option<NaiveDate>, EtlError> {
        if self.already_stored.contains(&person_id) {
            debug!(%person_id, file, "row for previously imported person");
            return Ok(None);
        }
        if !self.is_known(person_id)? {
            debug!(%person_id, file, "row for unknown person");
            return Ok(None);
        }

        match raw_date {
            None => Ok(None),
            Some(value) => mapping::parse_export_date(value)
                .map(Some)
                .ok_or_else(|| EtlError::InvalidDate {
                    file,
                    value: value.to_string(),
                }),
        }
    }

    fn is_known(&mut self, person_id: PersonId) -> Result<bool, EtlError> {
        if self.known.contains(&person_id) {
            return Ok(true);
        }
        let stored = self.store.fetch_person(person_id)?.is_some();
        if stored {
            self.known.insert(person_id);
        }
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn export_dates_accept_iso_timestamp_and_german_notation() {
        assert_eq!(mapping::parse_export_date("2020-02-02"), Some(date(2020, 2, 2)));
        assert_eq!(
            mapping::parse_export_date("2020-02-02 13:45:00"),
            Some(date(2020, 2, 2))
        );
        assert_eq!(mapping::parse_export_date("02.02.2020"), Some(date(2020, 2, 2)));
        assert_eq!(mapping::parse_export_date(" "), None);
        assert_eq!(mapping::parse_export_date("2020-02-30"), None);
    }

    #[test]
    fn only_abnormal_upward_deviations_are_high() {
        assert!(mapping::is_abnormal_high(Some("0"), Some("+")));
        assert!(mapping::is_abnormal_high(Some("Nein"), Some("high")));
        assert!(!mapping::is_abnormal_high(Some("1"), Some("+")));
        assert!(!mapping::is_abnormal_high(Some("false"), Some("-")));
        assert!(!mapping::is_abnormal_high(None, Some("H")));
    }

    #[test]
    fn names_join_forename_and_surname() {
        assert_eq!(
            mapping::display_name(Some("Mia"), Some("Keller")),
            "Mia Keller"
        );
        assert_eq!(mapping::display_name(None, Some("Keller")), "Keller");
    }

    #[test]
    fn person_rows_ignore_extra_columns() {
        let csv = "PROVIDER_ID;PATIENT_ID;NAME;FORNAME;GENDER;BIRTHDATE;CITY;ZIP\n\
                   9; 1001 ;Keller;Mia;w;2019-01-03;Jena;07743\n";

        let rows = parser::parse_persons(csv.as_bytes()).expect("parse");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].patient_id, 1001);
        assert_eq!(rows[0].gender.as_deref(), Some("w"));
        assert_eq!(rows[0].birthdate, "2019-01-03");
    }

    #[test]
    fn diagnosis_rows_yield_primary_and_secondary_codes() {
        let csv = "PATIENT_ID;ADMISSION_DATE;ICD_PRIMARY_CODE;ICD_SECONDARY_CODE;DIAGNOSIS_TYPE\n\
                   1001;2020-02-02;M30.3;U07.1!;HD\n\
                   1001;2020-02-02;R50.9;;ND\n";

        let rows = parser::parse_diagnoses(csv.as_bytes()).expect("parse");

        assert_eq!(rows[0].codes().collect::<Vec<_>>(), vec!["M30.3", "U07.1!"]);
        assert_eq!(rows[1].codes().collect::<Vec<_>>(), vec!["R50.9"]);
    }

    #[test]
    fn case_rows_keep_patient_and_start_date() {
        let csv = "CASE_ID;PROVIDER_ID;PATIENT_ID;START_DATE;END_DATE\n\
                   77;9;1001;2020-01-30;2020-02-10\n\
                   78;9;1002;;\n";

        let rows = parser::parse_cases(csv.as_bytes()).expect("parse");

        assert_eq!(rows[0].patient_id, 1001);
        assert_eq!(rows[0].start_date.as_deref(), Some("2020-01-30"));
        assert_eq!(rows[1].start_date, None);
    }

    #[test]
    fn procedure_rows_treat_blank_codes_as_missing() {
        let csv = "ID;OPS_VERSION;OPS_CODE;PATIENT_ID;EXECUTION_DATE\n\
                   1;2020;3-052;1001;2020-02-03\n\
                   2;2020; ;1001;2020-02-04\n";

        let rows = parser::parse_procedures(csv.as_bytes()).expect("parse");

        assert_eq!(rows[0].ops_code.as_deref(), Some("3-052"));
        assert_eq!(rows[0].execution_date.as_deref(), Some("2020-02-03"));
        assert_eq!(rows[1].ops_code, None);
    }
}
