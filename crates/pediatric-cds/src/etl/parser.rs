use serde::{Deserialize, Deserializer};
use std::io::Read;

#[derive(Debug, Deserialize)]
pub(crate) struct PersonExport {
    #[serde(rename = "PATIENT_ID")]
    pub(crate) patient_id: i64,
    #[serde(rename = "NAME", default, deserialize_with = "empty_string_as_none")]
    pub(crate) name: Option<String>,
    #[serde(rename = "FORNAME", default, deserialize_with = "empty_string_as_none")]
    pub(crate) forename: Option<String>,
    #[serde(rename = "GENDER", default, deserialize_with = "empty_string_as_none")]
    pub(crate) gender: Option<String>,
    #[serde(rename = "BIRTHDATE")]
    pub(crate) birthdate: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CaseExport {
    #[serde(rename = "PATIENT_ID")]
    pub(crate) patient_id: i64,
    #[serde(rename = "START_DATE", default, deserialize_with = "empty_string_as_none")]
    pub(crate) start_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DiagnosisExport {
    #[serde(rename = "PATIENT_ID")]
    pub(crate) patient_id: i64,
    #[serde(
        rename = "ADMISSION_DATE",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub(crate) admission_date: Option<String>,
    #[serde(
        rename = "ICD_PRIMARY_CODE",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub(crate) primary_code: Option<String>,
    #[serde(
        rename = "ICD_SECONDARY_CODE",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub(crate) secondary_code: Option<String>,
}

impl DiagnosisExport {
    pub(crate) fn codes(&self) -> impl Iterator<Item = &str> {
        self.primary_code
            .as_deref()
            .into_iter()
            .chain(self.secondary_code.as_deref())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProcedureExport {
    #[serde(rename = "PATIENT_ID")]
    pub(crate) patient_id: i64,
    #[serde(rename = "OPS_CODE", default, deserialize_with = "empty_string_as_none")]
    pub(crate) ops_code: Option<String>,
    #[serde(
        rename = "EXECUTION_DATE",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub(crate) execution_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LabExport {
    #[serde(rename = "PATIENT_ID")]
    pub(crate) patient_id: i64,
    #[serde(rename = "TEST_DATE", default, deserialize_with = "empty_string_as_none")]
    pub(crate) test_date: Option<String>,
    #[serde(
        rename = "PARAMETER_LOINC",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub(crate) loinc: Option<String>,
    #[serde(rename = "IS_NORMAL", default, deserialize_with = "empty_string_as_none")]
    pub(crate) is_normal: Option<String>,
    #[serde(rename = "DEVIATION", default, deserialize_with = "empty_string_as_none")]
    pub(crate) deviation: Option<String>,
}

/// Hospital exports are semicolon separated with a header row.
fn export_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(b';')
        .trim(csv::Trim::All)
        .from_reader(reader)
}

pub(crate) fn parse_persons<R: Read>(reader: R) -> Result<Vec<PersonExport>, csv::Error> {
    export_reader(reader).deserialize().collect()
}

pub(crate) fn parse_cases<R: Read>(reader: R) -> Result<Vec<CaseExport>, csv::Error> {
    export_reader(reader).deserialize().collect()
}

pub(crate) fn parse_diagnoses<R: Read>(reader: R) -> Result<Vec<DiagnosisExport>, csv::Error> {
    export_reader(reader).deserialize().collect()
}

pub(crate) fn parse_procedures<R: Read>(reader: R) -> Result<Vec<ProcedureExport>, csv::Error> {
    export_reader(reader).deserialize().collect()
}

pub(crate) fn parse_labs<R: Read>(reader: R) -> Result<Vec<LabExport>, csv::Error> {
    export_reader(reader).deserialize().collect()
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
