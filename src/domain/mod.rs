mod contact_message;
mod email_type;
mod recipient_email;
mod template_data;
// allow external `use` statements to skip `email_type` etc
pub use contact_message::ContactMessage;
pub use email_type::EmailType;
pub use email_type::RateLimitPolicy;
pub use email_type::UnknownEmailType;
pub use recipient_email::RecipientEmail;
pub use template_data::TemplateData;
