use thiserror::Error;

#[derive(Debug, Error)]
pub enum PairsError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Singular design matrix in {context}")]
    SingularMatrix { context: String },

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Cointegration test failed for {first}/{second}: {source}")]
    PairTestFailed {
        first: String,
        second: String,
        #[source]
        source: Box<PairsError>,
    },

    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for PairsError {
    fn from(e: serde_json::Error) -> Self {
        PairsError::SerializationError(e.to_string())
    }
}

impl From<csv::Error> for PairsError {
    fn from(e: csv::Error) -> Self {
        PairsError::DataSource(e.to_string())
    }
}
