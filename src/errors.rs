// ============================================================================
// Startup Errors
// ============================================================================
//
// Per-message failures never leave the ingestor (see pipeline::IngestError).
// The errors here abort process initialization.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("{dependency} unavailable after {attempts} attempts: {reason}")]
    DependencyUnavailable {
        dependency: &'static str,
        attempts: u32,
        reason: String,
    },
}
