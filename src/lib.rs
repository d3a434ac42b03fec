//! parcelqc - quality checks for cadastral parcel databases
//!
//! Scans a folder tree for parcel databases, runs a suite of validators
//! over them through a [`engine::GeoEngine`] and writes one CSV report per
//! validator into the scanned folder.

pub mod cli;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod errors;
pub mod observability;
pub mod report;
pub mod suite;
pub mod validators;
pub mod ward;
