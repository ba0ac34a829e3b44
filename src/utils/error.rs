use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Spreadsheet error: {0}")]
    SpreadsheetError(#[from] calamine::XlsxError),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Login failed with status {status}")]
    LoginFailed { status: u16 },

    #[error("Session cookie '{cookie}' was not issued for {host}")]
    SessionCookieMissing { cookie: String, host: String },

    #[error("Download failed with status {status}")]
    DownloadFailed { status: u16 },

    #[error("Invalid snapshot: {message}")]
    InvalidSnapshot { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Authentication,
    Storage,
    Data,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl TrackerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TrackerError::HttpError(_) | TrackerError::DownloadFailed { .. } => {
                ErrorCategory::Network
            }
            TrackerError::LoginFailed { .. } | TrackerError::SessionCookieMissing { .. } => {
                ErrorCategory::Authentication
            }
            TrackerError::DatabaseError(_) | TrackerError::IoError(_) => ErrorCategory::Storage,
            TrackerError::SpreadsheetError(_)
            | TrackerError::ZipError(_)
            | TrackerError::CsvError(_)
            | TrackerError::InvalidSnapshot { .. } => ErrorCategory::Data,
            TrackerError::ConfigError { .. }
            | TrackerError::ConfigValidationError { .. }
            | TrackerError::MissingConfigError { .. }
            | TrackerError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 下次排程執行通常就會恢復
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Authentication | ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            TrackerError::HttpError(_) => "Check network connectivity to the marketplace and retry",
            TrackerError::DownloadFailed { .. } => {
                "The marketplace rejected the download; retry on the next scheduled run"
            }
            TrackerError::LoginFailed { .. } => {
                "Verify KASPI_USERNAME / KASPI_PASSWORD and that the account is not locked"
            }
            TrackerError::SessionCookieMissing { .. } => {
                "The OAuth hand-off did not complete; check the continue and oauth URLs"
            }
            TrackerError::DatabaseError(_) => "Check database_url and that the file is writable",
            TrackerError::IoError(_) => "Check file paths and permissions",
            TrackerError::SpreadsheetError(_) | TrackerError::InvalidSnapshot { .. } => {
                "Make sure the file is an .xlsx export with code and name columns"
            }
            TrackerError::ZipError(_) | TrackerError::CsvError(_) => {
                "Check that the report output directory is writable"
            }
            TrackerError::ConfigError { .. }
            | TrackerError::ConfigValidationError { .. }
            | TrackerError::MissingConfigError { .. }
            | TrackerError::InvalidConfigValueError { .. } => {
                "Fix the configuration file or the corresponding environment variable"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Could not reach the marketplace: {}", self),
            ErrorCategory::Authentication => format!("Marketplace login failed: {}", self),
            ErrorCategory::Storage => format!("Storage failure: {}", self),
            ErrorCategory::Data => format!("Could not read the product list: {}", self),
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
        }
    }

    /// 結束碼：High → 1, Medium → 2, Critical → 3
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
