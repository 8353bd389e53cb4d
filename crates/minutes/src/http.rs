use crate::prelude::*;

/// Check that an HTTP response was successful, returning a descriptive error otherwise.
pub async fn check_response(response: reqwest::Response, context: &str) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(Error::Http {
        context: context.to_string(),
        status,
        body,
    }
    .into())
}

/// Shorten a response body for terminal output.
pub fn truncate_body(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        body.to_string()
    } else {
        format!("{}...", body.chars().take(max_chars).collect::<String>())
    }
}
