// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn backend_error_display() {
    let err = BackendError::new(
        "claude",
        ErrorKind::RateLimit,
        "429 from api",
        Duration::from_millis(10),
    );
    assert_eq!(err.to_string(), "claude: rate_limit: 429 from api");
}

#[tokio::test]
async fn default_is_available_wraps_availability() {
    let backend = fake::FakeBackend::new("x");
    assert!(backend.is_available().await);
    backend.set_unavailable("gone");
    assert!(!backend.is_available().await);
}
