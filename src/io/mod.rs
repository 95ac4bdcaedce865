mod export;
mod historical;

use thiserror::Error;

pub use export::{export_reports, write_statement_csv};
pub use historical::{HistoricalTable, read_historical_csv};

#[derive(Debug, Error)]
pub enum CsvIoError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("historical table has no period columns")]
    NoPeriods,

    #[error("row '{label}' has invalid value '{value}' for period '{period}'")]
    InvalidValue {
        label: String,
        period: String,
        value: String,
    },

    #[error("scenarios '{first}' and '{second}' both export as '{stem}_*.csv'")]
    FileStemCollision {
        first: String,
        second: String,
        stem: String,
    },
}

pub type CsvIoResult<T> = Result<T, CsvIoError>;
