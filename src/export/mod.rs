//! Report export

pub mod json;

pub use json::{read_report, write_report, PairReport, REPORT_FILE_NAME};
