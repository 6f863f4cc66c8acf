pub mod config;
pub mod convert;
pub mod dataset;
pub mod manifest;
pub mod processor;
pub mod utils;

pub use config::{ConvertConfig, Opts, OutputType};
pub use convert::{Outcome, convert_json_to_dataset, run};
pub use dataset::{Summary, Table};
