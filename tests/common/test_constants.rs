//! Shared constants for integration tests.
//!
//! Integration tests are compiled as separate crates (one per top-level file in
//! `tests/`). Placing shared constants under `tests/common/` avoids creating an
//! additional integration test binary while still allowing reuse via:
//!
//! ```rust
//! #[path = "common/test_constants.rs"]
//! mod test_constants;
//! ```

/// Keystone endpoint used by configuration fixtures.
pub const AUTH_URL: &str = "https://keystone.example:5000/v3";

/// Volume reconciled by behavioural scenarios.
pub const VOLUME_ID: &str = "vol-1";

/// Server the scenarios attach to and detach from.
pub const INSTANCE_ID: &str = "srv-1";
