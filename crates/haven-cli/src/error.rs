use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] haven_core::ValidationError),

    #[error("configuration error: {0}")]
    Config(#[from] haven_core::CoreError),

    #[error("command error: {0}")]
    Command(String),

    #[error(transparent)]
    Cache(#[from] haven_core::CacheError),

    #[error(transparent)]
    Journal(#[from] haven_core::JournalError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Config(_) => 2,
            Self::Command(_) => 2,
            Self::Serialization(_) => 4,
            Self::Cache(_) => 10,
            Self::Journal(_) => 10,
            Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_exit_with_usage_code() {
        let error = CliError::from(haven_core::ValidationError::EmptyAssetList);
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn cache_errors_exit_with_io_code() {
        let error = CliError::from(haven_core::CacheError::Io(String::from("denied")));
        assert_eq!(error.exit_code(), 10);
    }

    #[test]
    fn unreadable_journal_exits_with_io_code() {
        let error = CliError::from(haven_core::JournalError::Corrupt {
            key: String::from("haven_invest_records"),
            reason: String::from("expected value"),
        });
        assert_eq!(error.exit_code(), 10);
    }
}
