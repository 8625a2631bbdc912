use std::time::Duration;

use reqwest::Client;
use secrecy::ExposeSecret;
use secrecy::Secret;
use serde::Deserialize;
use serde::Serialize;

use crate::domain::RecipientEmail;

/// Client for a Resend-compatible delivery API (`POST {base_url}/emails`).
pub struct EmailClient {
    http_client: Client,
    base_url: String,
    sender: RecipientEmail,
    authorization_token: Secret<String>,
}

// establishing a HTTP connection is expensive, so the `Client` is built once
// and shared by all handlers via `web::Data`; `Client` is an `Arc` internally

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: String,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
}

/// Shape of the provider's error responses; only `message` is used
#[derive(Deserialize)]
struct ProviderError {
    message: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum DeliveryError {
    /// The provider answered, but refused the email
    #[error("{0}")]
    Rejected(String),
    /// No answer at all (connection refused, timeout, ...)
    #[error("Failed to reach email provider")]
    Transport(#[from] reqwest::Error),
}

impl EmailClient {
    pub fn new(
        base_url: String,
        sender: RecipientEmail,
        authorization_token: Secret<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        // a timed out request surfaces as `DeliveryError::Transport`, never as
        // a rate limit
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url,
            sender,
            authorization_token,
        })
    }

    /// Returns the provider's (JSON) response body on success. No retries are
    /// made; that is left to the caller.
    pub async fn send_email(
        &self,
        recipient: &RecipientEmail,
        subject: &str,
        html_content: &str,
        reply_to: Option<&str>,
    ) -> Result<serde_json::Value, DeliveryError> {
        let url = format!("{}/emails", self.base_url);
        let body = SendEmailRequest {
            from: format!("NateCon <{}>", self.sender),
            to: vec![recipient.as_ref()],
            subject,
            html: html_content,
            reply_to,
        };

        let resp = self
            .http_client
            .post(&url)
            .bearer_auth(self.authorization_token.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .json::<ProviderError>()
                .await
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("Email provider responded with {status}"));
            return Err(DeliveryError::Rejected(message));
        }

        // the email was accepted, an unexpected body should not turn that into
        // a failure
        Ok(resp.json().await.unwrap_or(serde_json::Value::Null))
    }
}
