use once_cell::sync::Lazy;
use tera::Context;
use tera::Tera;

use crate::domain::ContactMessage;
use crate::domain::EmailType;
use crate::domain::TemplateData;
use crate::domain::UnknownEmailType;

#[derive(Debug)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

#[derive(thiserror::Error, Debug)]
pub enum TemplateError {
    #[error(transparent)]
    UnknownType(#[from] UnknownEmailType),
    #[error("Failed to render email template")]
    Render(#[source] tera::Error),
}

/// Replaces the five characters that matter inside HTML text and (quoted)
/// attribute values. `&` must go first, otherwise the entities produced by the
/// other replacements would be escaped a second time.
///
/// Tera's builtin escaper also rewrites `/` and uses `&#x27;` for `'`, which
/// is not what the web client expects.
pub fn escape_html(unsafe_text: &str) -> String {
    unsafe_text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#039;")
}

// templates are compiled into the binary, so a parse failure can only be a
// programmer error (and is caught by the tests below)
static TEMPLATES: Lazy<Tera> = Lazy::new(|| {
    let mut tera = Tera::default();
    tera.add_raw_templates(vec![
        ("base.html", include_str!("../templates/base.html")),
        ("welcome.html", include_str!("../templates/welcome.html")),
        (
            "talk_accepted.html",
            include_str!("../templates/talk_accepted.html"),
        ),
        (
            "talk_rejected.html",
            include_str!("../templates/talk_rejected.html"),
        ),
        (
            "team_joined.html",
            include_str!("../templates/team_joined.html"),
        ),
        (
            "team_member_left.html",
            include_str!("../templates/team_member_left.html"),
        ),
        (
            "registration_open.html",
            include_str!("../templates/registration_open.html"),
        ),
        ("contact.html", include_str!("../templates/contact.html")),
    ])
    .expect("email templates must be valid tera");
    tera.autoescape_on(vec![".html"]);
    tera.set_escape_fn(escape_html);
    tera
});

fn subject(email_type: EmailType) -> &'static str {
    match email_type {
        EmailType::Welcome => "Welcome to NateCon 2026! 🎉",
        EmailType::TalkAccepted => "🎉 Your NateCon 2026 Talk Proposal Was Accepted!",
        EmailType::TalkRejected => "Update on Your NateCon 2026 Talk Proposal",
        EmailType::TeamJoined => "Welcome to the Team! 👋",
        EmailType::TeamMemberLeft => "Team Update",
        EmailType::RegistrationOpen => "🎟️ NateCon 2026 Registration is Now Open!",
    }
}

/// Fill in the template for `email_type`. Only the fields the template
/// actually uses are inserted into the context, so e.g. a `talkTitle` sent
/// along with a `welcome` email is ignored.
///
/// Pure: no I/O, and the same inputs always give byte-identical output.
pub fn render(
    email_type: EmailType,
    data: &TemplateData,
) -> Result<RenderedEmail, TemplateError> {
    let mut ctx = Context::new();
    ctx.insert("name", data.name_or_default());
    match email_type {
        EmailType::Welcome | EmailType::RegistrationOpen => {}
        EmailType::TalkAccepted | EmailType::TalkRejected => {
            ctx.insert("talk_title", data.talk_title_or_default());
        }
        EmailType::TeamJoined | EmailType::TeamMemberLeft => {
            ctx.insert("team_name", data.team_name_or_default());
            ctx.insert("member_name", data.member_name_or_default());
        }
    }

    let html = TEMPLATES
        .render(&format!("{email_type}.html"), &ctx)
        .map_err(TemplateError::Render)?;

    Ok(RenderedEmail {
        subject: subject(email_type).to_string(),
        html,
    })
}

/// Like `render`, but starting from the raw tag in the request body
pub fn render_tag(
    tag: &str,
    data: &TemplateData,
) -> Result<RenderedEmail, TemplateError> {
    render(EmailType::parse(tag)?, data)
}

pub fn render_contact(contact: &ContactMessage) -> Result<RenderedEmail, TemplateError> {
    let mut ctx = Context::new();
    ctx.insert("name", &contact.name);
    ctx.insert("email", contact.email.as_ref());
    ctx.insert("message", &contact.message);

    let html = TEMPLATES
        .render("contact.html", &ctx)
        .map_err(TemplateError::Render)?;

    Ok(RenderedEmail {
        subject: format!(
            "NateCon Contact Form: Message from {}",
            escape_html(&contact.name)
        ),
        html,
    })
}
