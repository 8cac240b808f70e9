use crate::infra::{parse_date, parse_symptom, InMemoryConceptStore};
use chrono::{Local, NaiveDate};
use clap::Args;
use pediatric_cds::clinical::{
    AnalysisEntry, IntakeGuard, PatientForm, PatientService, PatientServiceError, PersonId,
    ScoreEngine, ScoreSummary, Symptom,
};
use pediatric_cds::config::{AppConfig, ConfigError};
use pediatric_cds::error::AppError;
use pediatric_cds::etl::OmopCsvImporter;
use pediatric_cds::telemetry;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Birthdate of the patient (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) birthdate: NaiveDate,
    /// Date of the presentation (defaults to today)
    #[arg(long, value_parser = parse_date)]
    pub(crate) case_date: Option<NaiveDate>,
    /// Symptom present on the patient, e.g. `fever` or `swollen_extremities`. Repeatable.
    #[arg(long = "symptom", value_parser = parse_symptom)]
    pub(crate) symptoms: Vec<Symptom>,
    /// Print the score summary as JSON instead of text
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// Directory holding the PERSON, CASE, DIAGNOSIS, PROCEDURE and LAB CSV files (defaults to
    /// CDS_CSV_DIR)
    #[arg(long)]
    pub(crate) csv_dir: Option<PathBuf>,
    /// Print the ward overview as JSON instead of text
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let ScoreArgs {
        birthdate,
        case_date,
        symptoms,
        json,
    } = args;

    let today = Local::now().date_naive();
    let mut form = PatientForm::new("Command line patient", birthdate).with_symptoms(symptoms);
    form.case_date = case_date;

    let mut record = IntakeGuard::default()
        .record_from_form(PersonId(0), &form, today)
        .map_err(PatientServiceError::from)?;
    let summary = ScoreEngine::new().score(&mut record);

    if json {
        print_json(&summary);
    } else {
        render_summary(record.calculate_age(), &summary);
    }
    Ok(())
}

pub(crate) fn run_import(args: ImportArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let csv_dir = args
        .csv_dir
        .or(config.store.csv_dir)
        .ok_or(ConfigError::MissingCsvDir)?;

    let store = Arc::new(InMemoryConceptStore::with_standard_vocabulary());
    let summary = OmopCsvImporter::new(config.store.id_max_attempts)
        .from_dir(&csv_dir, store.as_ref())?;
    let service = PatientService::new(store, config.store.id_max_attempts);
    let entries = service.analysis()?;

    if args.json {
        print_json(&entries);
        return Ok(());
    }

    println!("Import from {}", csv_dir.display());
    println!(
        "  Persons: {} | Conditions: {} | Procedures: {} | Lab findings: {} | Skipped rows: {}",
        summary.persons,
        summary.conditions,
        summary.procedures,
        summary.measurements,
        summary.skipped
    );
    render_analysis(&entries);
    Ok(())
}

pub(crate) fn render_summary(age: i32, summary: &ScoreSummary) {
    println!("Age at presentation: {age}");
    println!("\nKawasaki score: {}", summary.kawasaki_score);
    render_reasons("Present", &summary.kawasaki_reasons);
    render_reasons("Missing", &summary.kawasaki_missing);
    println!("\nPIMS score: {}", summary.pims_score);
    render_reasons("Present", &summary.pims_reasons);
    render_reasons("Missing", &summary.pims_missing);
}

pub(crate) fn render_analysis(entries: &[AnalysisEntry]) {
    if entries.is_empty() {
        println!("\nNo patients on record");
        return;
    }

    println!("\n{:>10}  {:<28} {:>4} {:>9} {:>6}", "ID", "Name", "Age", "Kawasaki", "PIMS");
    for entry in entries {
        println!(
            "{:>10}  {:<28} {:>4} {:>9} {:>6}",
            entry.person_id.to_string(),
            entry.name,
            entry.age,
            entry.kawasaki_score.to_string(),
            entry.pims_score.to_string()
        );
    }
}

fn render_reasons(heading: &str, reasons: &[impl std::fmt::Display]) {
    if reasons.is_empty() {
        println!("  {heading}: none");
        return;
    }
    let labels: Vec<String> = reasons.iter().map(ToString::to_string).collect();
    println!("  {heading}: {}", labels.join(", "));
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(err) => println!("JSON output unavailable: {err}"),
    }
}
