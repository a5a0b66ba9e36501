//! Small helpers shared by the HTTP-based providers.

use crate::traits::NotifyError;

/// Send a prepared request, turning non-2xx responses into
/// [`NotifyError::Rejected`].
pub(crate) async fn send_checked(
    provider: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<reqwest::Response, NotifyError> {
    let response = request.send().await?;
    let status = response.status();

    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        tracing::warn!(provider, %status, body = %body, "provider returned non-2xx status");
        return Err(NotifyError::Rejected {
            provider,
            status: status.as_u16(),
            body,
        });
    }

    Ok(response)
}

/// Borrow a field that was left unset in the environment, naming the variable
/// in the error.
pub(crate) fn require<'a>(value: &'a Option<String>, var: &str) -> Result<&'a str, NotifyError> {
    value
        .as_deref()
        .ok_or_else(|| NotifyError::Config(format!("{var} is not set")))
}
