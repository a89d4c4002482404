pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Error reading or writing file \"{file}\": {source}")]
    FileIo {
        file: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Error reading or writing bytes: {0}")]
    BytesIo(Box<dyn std::error::Error + Send + Sync>),
    #[error("Error parsing record {idx} from {origin}: {source}")]
    ParseRecord {
        origin: String,
        idx: usize,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Error writing table: {0}")]
    Csv(#[from] csv::Error),
    #[error("Invalid filter rules: {source}")]
    InvalidRules { source: serde_yaml::Error },
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },
    #[error("A worker thread panicked while sorting")]
    Worker,
}

impl Error {
    pub fn config(reason: impl Into<String>) -> Self {
        Error::Config {
            reason: reason.into(),
        }
    }
}

pub fn utf8(b: &[u8]) -> String {
    std::str::from_utf8(b).unwrap_or("<non-utf8>").to_owned()
}
