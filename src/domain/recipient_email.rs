use std::fmt::Display;

use serde::Deserialize;
use validator::ValidateEmail;

/// This struct exists only for email parsing and is used for the sender, the
/// contact address, and every recipient.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "String")]
pub struct RecipientEmail(String);

impl RecipientEmail {
    pub fn parse(email: String) -> Result<Self, String> {
        ValidateEmail::validate_email(&email)
            .then_some(Self(email.clone()))
            .ok_or(format!("Invalid email: {email:?}"))
    }
}

impl TryFrom<String> for RecipientEmail {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::parse(value) }
}

impl AsRef<str> for RecipientEmail {
    fn as_ref(&self) -> &str { &self.0 }
}

impl Display for RecipientEmail {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
