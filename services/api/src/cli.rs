use crate::demo::{run_demo, DemoArgs};
use crate::report::{run_import, run_score, ImportArgs, ScoreArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use pediatric_cds::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Pediatric CDS",
    about = "Score Kawasaki disease and PIMS likelihood for pediatric patients",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Score a single patient from symptoms given on the command line
    Score(ScoreArgs),
    /// Import a hospital CSV export and print the ward overview
    Import(ImportArgs),
    /// Register sample patients, edit one and print the resulting scores
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Score(args) => run_score(args),
        Command::Import(args) => run_import(args),
        Command::Demo(args) => run_demo(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pediatric_cds::clinical::Symptom;

    #[test]
    fn command_definitions_are_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn score_accepts_repeated_symptoms() {
        let cli = Cli::try_parse_from([
            "pediatric-cds",
            "score",
            "--birthdate",
            "2019-01-03",
            "--case-date",
            "2020-02-02",
            "--symptom",
            "fever",
            "--symptom",
            "conjunctivitis",
        ])
        .expect("arguments parse");

        match cli.command {
            Some(Command::Score(args)) => {
                assert_eq!(args.symptoms, vec![Symptom::Fever, Symptom::Conjunctivitis]);
                assert!(args.case_date.is_some());
            }
            other => panic!("expected score command, got {other:?}"),
        }
    }

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["pediatric-cds"]).expect("arguments parse");
        assert!(cli.command.is_none());
    }
}
