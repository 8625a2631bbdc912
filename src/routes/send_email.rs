use std::fmt::Debug;

use actix_web::http::StatusCode;
use actix_web::web;
use actix_web::HttpResponse;
use actix_web::ResponseError;
use anyhow::Context;
use chrono::Utc;
use serde::Deserialize;

use crate::authentication::UserId;
use crate::domain::EmailType;
use crate::domain::RecipientEmail;
use crate::domain::TemplateData;
use crate::domain::UnknownEmailType;
use crate::email_client::DeliveryError;
use crate::email_client::EmailClient;
use crate::rate_limit::RateLimitDecision;
use crate::rate_limit::RateLimitExceeded;
use crate::rate_limit::RateLimiter;
use crate::templates;
use crate::utils::error_chain_fmt;
use crate::utils::ApiResponse;

/// Raw request body. `type` and `to` are optional here so that their absence
/// can be reported with our own message instead of serde's.
#[derive(Deserialize)]
pub struct SendEmailBody {
    #[serde(rename = "type")]
    email_type: Option<String>,
    to: Option<String>,
    #[serde(default)]
    data: Option<TemplateData>,
}

#[derive(thiserror::Error)]
pub enum SendEmailError {
    #[error("{0}")]
    ValidationError(String),
    #[error(transparent)]
    UnknownType(#[from] UnknownEmailType),
    #[error(transparent)]
    RateLimited(#[from] RateLimitExceeded),
    #[error(transparent)]
    DeliveryError(#[from] DeliveryError),
    #[error("Something went wrong")]
    UnexpectedError(#[from] anyhow::Error),
}

impl Debug for SendEmailError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for SendEmailError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError(_) | Self::UnknownType(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::DeliveryError(_) | Self::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiResponse::failure(self.to_string()))
    }
}

fn non_blank(s: Option<String>) -> Option<String> { s.filter(|s| !s.trim().is_empty()) }

/// `POST /send-email`
///
/// Render one of the fixed transactional templates and hand it to the email
/// provider, unless the caller has exceeded the hourly/daily ceiling for that
/// email type.
///
/// Requires `reject_unauthenticated` to have run first (for `UserId`).
///
/// # Request example
///
/// ```sh
///     curl -X POST http://127.0.0.1:8000/send-email \
///         -H "Authorization: Bearer $TOKEN" \
///         -H 'Content-Type: application/json' \
///         -d '{"type": "welcome", "to": "jo@foo.com", "data": {"name": "Jo"}}'
/// ```
///
/// The email is recorded only after the provider accepted it; a failed
/// delivery does not count towards the limit.
#[tracing::instrument(
    name = "Sending transactional email",
    skip_all,
    fields(
        user_id=tracing::field::Empty,
        email_type=tracing::field::Empty,
        recipient=tracing::field::Empty,
    )
)]
pub async fn send_email(
    body: web::Json<SendEmailBody>,
    user_id: web::ReqData<UserId>,
    limiter: web::Data<RateLimiter>,
    email_client: web::Data<EmailClient>,
) -> Result<HttpResponse, SendEmailError> {
    let user_id = *user_id.into_inner();
    tracing::Span::current().record("user_id", tracing::field::display(user_id));

    let SendEmailBody {
        email_type,
        to,
        data,
    } = body.into_inner();

    let (Some(tag), Some(to)) = (non_blank(email_type), non_blank(to)) else {
        return Err(SendEmailError::ValidationError(
            "Missing required fields: type and to".to_string(),
        ));
    };
    tracing::Span::current()
        .record("email_type", tracing::field::display(&tag))
        .record("recipient", tracing::field::display(&to));

    let recipient = RecipientEmail::parse(to).map_err(SendEmailError::ValidationError)?;
    let email_type = EmailType::parse(&tag)?;

    if let RateLimitDecision::Denied(e) = limiter.check(user_id, email_type, Utc::now()).await {
        return Err(e.into());
    }

    let email = templates::render(email_type, &data.unwrap_or_default())
        .context("Failed to render email template")?;

    let provider_resp = email_client
        .send_email(&recipient, &email.subject, &email.html, None)
        .await
        .map_err(|e| {
            tracing::error!(error.cause_chain=?e, error.message=%e, "delivery failed");
            e
        })?;

    tracing::info!("email accepted by provider");
    limiter
        .record(user_id, email_type, recipient.as_ref(), Utc::now())
        .await;

    Ok(HttpResponse::Ok().json(ApiResponse::success(provider_resp)))
}
