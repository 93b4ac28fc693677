use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Configuration error in '{descriptor}': {message}")]
    Config { descriptor: String, message: String },

    #[error("Failed to parse descriptor file '{path}': {source}")]
    DescriptorParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("Reader error: {0}")]
    Reader(#[from] meteoflow_parser::ReadError),

    #[error("Unknown derived function '{0}'")]
    UnknownDerivedFunction(String),
}

impl PipelineError {
    pub fn config(descriptor: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::Config {
            descriptor: descriptor.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
