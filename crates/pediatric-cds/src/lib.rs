//! Decision support for Kawasaki disease and PIMS over OMOP CDM patient records.

pub mod clinical;
pub mod config;
pub mod error;
pub mod etl;
pub mod telemetry;
