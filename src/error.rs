#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The upstream body could not be read while buffering a JSON response.
    /// Parse failures are not errors at this layer: an unparseable body is
    /// forwarded unchanged so a rewrite problem never blocks the response.
    #[error("Failed to read upstream body: {0}")]
    BodyRead(#[from] axum::Error),
}
