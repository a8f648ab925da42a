// ============================================================================
// Order Domain
// ============================================================================
//
// - validation/ - structural rules a decoded order must satisfy before it
//                 is persisted
//
// ============================================================================

pub mod validation;

pub use validation::{OrderValidator, ValidationError};
