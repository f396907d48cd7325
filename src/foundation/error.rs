/// Convenience result type used across passline.
pub type PasslineResult<T> = Result<T, PasslineError>;

/// Top-level error taxonomy used by pipeline APIs.
#[derive(thiserror::Error, Debug)]
pub enum PasslineError {
    /// Invalid user-provided scene or configuration data.
    #[error("validation error: {0}")]
    Validation(String),

    /// A node, attribute, or render layer named by a query does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A value type a query cannot classify or compare.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// A scene state the collection pass cannot proceed from.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PasslineError {
    /// Build a [`PasslineError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`PasslineError::NotFound`] value.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Build a [`PasslineError::UnsupportedType`] value.
    pub fn unsupported_type(msg: impl Into<String>) -> Self {
        Self::UnsupportedType(msg.into())
    }

    /// Build a [`PasslineError::Configuration`] value.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Build a [`PasslineError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}
