//! Tracing setup shared by the stockbook binaries.

pub mod tracing;

/// Initialize process-wide tracing.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}
