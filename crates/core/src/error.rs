use thiserror::Error;

/// Result alias for catalog, index and search operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Static endpoint data is malformed. Fatal at startup.
    #[error("catalog load error: {0}")]
    CatalogLoad(String),

    #[error("endpoint not found: {0}")]
    EndpointNotFound(String),

    #[error("category not found: {0}")]
    CategoryNotFound(String),

    #[error("missing path parameter(s) for {endpoint}: {}", missing.join(", "))]
    MissingPathParams {
        endpoint: String,
        missing: Vec<String>,
    },
}

impl CoreError {
    pub fn catalog_load(msg: impl Into<String>) -> Self {
        Self::CatalogLoad(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::EndpointNotFound(_) | Self::CategoryNotFound(_))
    }
}
