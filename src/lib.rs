pub mod arrival;
pub mod config;
pub mod data;
pub mod due;
pub mod envelope;
pub mod error;
pub mod fetch;
pub mod output;
pub mod parser;

pub use arrival::{ArrivalRecord, ResultSet, StopRoute};
pub use config::Settings;
pub use data::{BizkaibusData, Outcome, State};
pub use due::{Clock, TimeMode};
pub use error::Failure;
