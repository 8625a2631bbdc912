use std::fmt::Debug;

use actix_web::http::StatusCode;
use actix_web::web;
use actix_web::HttpResponse;
use actix_web::ResponseError;
use anyhow::Context;
use serde::Deserialize;

use crate::domain::ContactMessage;
use crate::email_client::DeliveryError;
use crate::email_client::EmailClient;
use crate::startup::ContactAddress;
use crate::templates;
use crate::utils::error_chain_fmt;
use crate::utils::ApiResponse;

#[derive(Deserialize)]
pub struct ContactBody {
    name: Option<String>,
    email: Option<String>,
    message: Option<String>,
}

impl TryFrom<ContactBody> for ContactMessage {
    type Error = String;
    fn try_from(value: ContactBody) -> Result<Self, Self::Error> {
        ContactMessage::parse(value.name, value.email, value.message)
    }
}

#[derive(thiserror::Error)]
pub enum ContactError {
    #[error("{0}")]
    ValidationError(String),
    #[error(transparent)]
    DeliveryError(#[from] DeliveryError),
    #[error("Something went wrong")]
    UnexpectedError(#[from] anyhow::Error),
}

impl Debug for ContactError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for ContactError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiResponse::failure(self.to_string()))
    }
}

/// `POST /send-contact-email`
///
/// Relay a contact form submission to the organisers' inbox, with `reply_to`
/// set to the submitter. No authentication, and no rate limiting: visitors are
/// not required to have an account.
#[tracing::instrument(
    name = "Relaying contact form submission",
    skip_all,
    fields(contact_email=tracing::field::Empty)
)]
pub async fn send_contact_email(
    body: web::Json<ContactBody>,
    email_client: web::Data<EmailClient>,
    contact_address: web::Data<ContactAddress>,
) -> Result<HttpResponse, ContactError> {
    let contact: ContactMessage = body
        .into_inner()
        .try_into()
        .map_err(ContactError::ValidationError)?;
    tracing::Span::current().record("contact_email", tracing::field::display(&contact.email));

    let email = templates::render_contact(&contact).context("Failed to render contact email")?;

    let provider_resp = email_client
        .send_email(
            &contact_address.0,
            &email.subject,
            &email.html,
            Some(contact.email.as_ref()),
        )
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(provider_resp)))
}
