//! Error types for RENTA
//!
//! Centralized error handling with stable error codes. Codes are grouped
//! into classes matching how the pricing engine reacts to a failure:
//! configuration errors surface to the caller, data errors fail training
//! loudly, store errors are swallowed only on append paths, and model
//! lifecycle errors drive the artifact fallback logic.

use std::fmt;

/// Result type alias using RentaError
pub type Result<T> = std::result::Result<T, RentaError>;

/// Main error type for RENTA
#[derive(Debug)]
pub struct RentaError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Additional context
    pub context: Option<String>,
    /// Source error (if wrapping another error)
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl RentaError {
    /// Create a new error
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
            source: None,
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add a source error
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// The failure class this error belongs to
    pub fn class(&self) -> ErrorClass {
        self.code.class()
    }

    // Convenience constructors

    /// Property is missing from the state store.
    pub fn property_not_found(id: impl fmt::Display) -> Self {
        Self::new(ErrorCode::PropertyNotFound, format!("property {} not found", id))
    }

    /// Model artifact or sidecar is missing for the given key.
    pub fn model_not_found(key: impl fmt::Display) -> Self {
        Self::new(ErrorCode::ModelNotFound, format!("no trained model for {}", key))
    }

    /// Floor/ceiling configuration cannot produce a valid grid.
    pub fn invalid_price_config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidPriceConfig, message)
    }

    /// Training dataset is empty after cleaning.
    pub fn empty_dataset(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::EmptyDataset, message)
    }

    /// A state-store read failed.
    pub fn store_read(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StoreRead, message)
    }

    /// A state-store append failed.
    pub fn store_write(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StoreWrite, message)
    }

    /// Creates an internal error with the given message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }
}

impl fmt::Display for RentaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if let Some(ctx) = &self.context {
            write!(f, " ({})", ctx)?;
        }
        Ok(())
    }
}

impl std::error::Error for RentaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// How the pricing engine reacts to an error of a given code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Invalid constraints or missing entities; surfaced to the caller,
    /// converted to a tagged fallback decision on the recommendation path
    Config,
    /// Malformed or insufficient data; fails training loudly
    Data,
    /// State-store transport failure
    Store,
    /// Artifact serialization/publication failure
    ModelLifecycle,
    /// Everything else
    Internal,
}

/// Stable error codes for the pricing core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Configuration
    /// Input value is invalid
    InvalidInput,
    /// Date range is invalid (end before start)
    InvalidDateRange,
    /// Floor/ceiling/base configuration is unusable
    InvalidPriceConfig,
    /// Property not found in the state store
    PropertyNotFound,
    /// No trained model artifact for the requested key
    ModelNotFound,

    // Data
    /// Date string failed to parse at the boundary
    InvalidDate,
    /// Training frame is empty after dropping null targets
    EmptyDataset,
    /// Target column is missing from the training frame
    MissingTarget,
    /// No market-feature row for the requested key and date
    FeatureRowNotFound,

    // Store
    /// State-store read failed
    StoreRead,
    /// State-store append failed
    StoreWrite,

    // Model lifecycle
    /// Artifact bytes do not match the sidecar-declared format
    ArtifactCorrupt,
    /// Sidecar declares a format this build does not understand
    UnknownArtifactFormat,
    /// Serialization/deserialization failed
    SerializationFailed,

    // Internal
    /// I/O operation failed
    IoFailed,
    /// Generic internal error
    Internal,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::InvalidDateRange => "INVALID_DATE_RANGE",
            Self::InvalidPriceConfig => "INVALID_PRICE_CONFIG",
            Self::PropertyNotFound => "PROPERTY_NOT_FOUND",
            Self::ModelNotFound => "MODEL_NOT_FOUND",
            Self::InvalidDate => "INVALID_DATE",
            Self::EmptyDataset => "EMPTY_DATASET",
            Self::MissingTarget => "MISSING_TARGET",
            Self::FeatureRowNotFound => "FEATURE_ROW_NOT_FOUND",
            Self::StoreRead => "STORE_READ",
            Self::StoreWrite => "STORE_WRITE",
            Self::ArtifactCorrupt => "ARTIFACT_CORRUPT",
            Self::UnknownArtifactFormat => "UNKNOWN_ARTIFACT_FORMAT",
            Self::SerializationFailed => "SERIALIZATION_FAILED",
            Self::IoFailed => "IO_FAILED",
            Self::Internal => "INTERNAL",
        }
    }

    /// Returns the failure class for this code.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidInput
            | Self::InvalidDateRange
            | Self::InvalidPriceConfig
            | Self::PropertyNotFound
            | Self::ModelNotFound => ErrorClass::Config,

            Self::InvalidDate
            | Self::EmptyDataset
            | Self::MissingTarget
            | Self::FeatureRowNotFound => ErrorClass::Data,

            Self::StoreRead | Self::StoreWrite => ErrorClass::Store,

            Self::ArtifactCorrupt | Self::UnknownArtifactFormat | Self::SerializationFailed => {
                ErrorClass::ModelLifecycle
            }

            Self::IoFailed | Self::Internal => ErrorClass::Internal,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<std::io::Error> for RentaError {
    fn from(err: std::io::Error) -> Self {
        RentaError::new(ErrorCode::IoFailed, err.to_string()).with_source(err)
    }
}
