use super::RecipientEmail;

/// A contact form submission. All fields are required; the raw strings are
/// kept as-is and only escaped when rendered.
///
/// Must be instantiated with `ContactMessage::parse`.
#[derive(Debug)]
pub struct ContactMessage {
    pub name: String,
    pub email: RecipientEmail,
    pub message: String,
}

impl ContactMessage {
    pub fn parse(
        name: Option<String>,
        email: Option<String>,
        message: Option<String>,
    ) -> Result<Self, String> {
        let present = |s: Option<String>| s.filter(|s| !s.trim().is_empty());
        match (present(name), present(email), present(message)) {
            (Some(name), Some(email), Some(message)) => Ok(Self {
                name,
                email: RecipientEmail::parse(email)?,
                message,
            }),
            _ => Err("Missing required fields: name, email, and message".to_string()),
        }
    }
}
