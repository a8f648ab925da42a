// ============================================================================
// Domain Layer - Business Rules
// ============================================================================
//
// Pure rules over the order model, no I/O. Each aggregate has its own
// subdirectory.
//
// ============================================================================

pub mod order;
