use crate::infra::{parse_date, InMemoryConceptStore};
use crate::report::{render_analysis, render_summary};
use chrono::{Datelike, Local, NaiveDate};
use clap::Args;
use pediatric_cds::clinical::store::DEFAULT_ID_ATTEMPTS;
use pediatric_cds::clinical::{Disease, PatientForm, PatientService, Symptom};
use pediatric_cds::error::AppError;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Case date used for every sample patient (defaults to today)
    #[arg(long, value_parser = parse_date)]
    pub(crate) case_date: Option<NaiveDate>,
    /// Skip the edit step that adds a cardiac finding to the PIMS patient
    #[arg(long)]
    pub(crate) skip_update: bool,
}

struct SamplePatient {
    name: &'static str,
    age_years: i32,
    gender: &'static str,
    symptoms: &'static [Symptom],
}

const SAMPLE_PATIENTS: &[SamplePatient] = &[
    SamplePatient {
        name: "Mia Keller",
        age_years: 2,
        gender: "w",
        symptoms: &[
            Symptom::Fever,
            Symptom::Exanthem,
            Symptom::Conjunctivitis,
            Symptom::Lymphadenopathy,
        ],
    },
    SamplePatient {
        name: "Ben Richter",
        age_years: 9,
        gender: "m",
        symptoms: &[
            Symptom::Covid,
            Symptom::Fever,
            Symptom::Enanthem,
            Symptom::InflammationLab,
        ],
    },
    SamplePatient {
        name: "Ida Schmidt",
        age_years: 14,
        gender: "w",
        symptoms: &[Symptom::GastroIntestinal],
    },
];

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let case_date = args.case_date.unwrap_or_else(|| Local::now().date_naive());
    let store = Arc::new(InMemoryConceptStore::with_standard_vocabulary());
    let service = PatientService::new(store, DEFAULT_ID_ATTEMPTS);

    println!("Pediatric decision support demo");
    println!("Case date: {case_date}");

    let mut registered = Vec::with_capacity(SAMPLE_PATIENTS.len());
    for sample in SAMPLE_PATIENTS {
        let form = sample_form(sample, case_date);
        let outcome = service.add_patient(&form)?;
        println!("\nRegistered {} as patient {}", sample.name, outcome.person_id);
        render_summary(sample.age_years, &outcome.scores);
        registered.push((form, outcome.person_id));
    }

    if !args.skip_update {
        if let Some((form, person_id)) = registered.get(1) {
            let edited = form.clone().with_symptoms([Symptom::Myocarditis]);
            let outcome = service.apply_update(*person_id, &edited)?;
            println!(
                "\nAdded myocarditis for patient {person_id}: {} change(s), {} failure(s)",
                outcome.report.applied.len(),
                outcome.report.failures.len()
            );
            let reasons = service.decision_reasons(*person_id, Disease::Pims)?;
            println!("  PIMS score now: {}", reasons.score);
            let labels: Vec<String> = reasons.reasons.iter().map(ToString::to_string).collect();
            println!("  Reasons: {}", labels.join(", "));
        }
    }

    render_analysis(&service.analysis()?);
    Ok(())
}

fn sample_form(sample: &SamplePatient, case_date: NaiveDate) -> PatientForm {
    let birth_year = case_date.year() - sample.age_years;
    let birthdate = NaiveDate::from_ymd_opt(birth_year, 1, 1).unwrap_or(case_date);
    let mut form = PatientForm::new(sample.name, birthdate)
        .with_case_date(case_date)
        .with_symptoms(sample.symptoms.iter().copied());
    form.gender = Some(sample.gender.to_string());
    form
}
