//! Shared HTTP plumbing for the model and search service clients.

use std::time::Duration;

use reqwest::Client;

/// Maximum length for error bodies kept in errors and logs.
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Default connect timeout for HTTP requests (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the HTTP client shared by every service handle.
///
/// `reqwest::Client` is internally reference counted, so one instance is
/// cloned into each client and reused by all concurrent workers.
pub fn build_client(request_timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .timeout(request_timeout)
        .build()
}

/// Truncates a service error body so large or sensitive payloads do not
/// flood the logs.
pub fn truncate_body(body: &str) -> String {
    if body.chars().count() > MAX_ERROR_BODY_LENGTH {
        let head: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
        format!("{}... (truncated)", head)
    } else {
        body.to_string()
    }
}
