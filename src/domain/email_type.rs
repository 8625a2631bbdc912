use std::fmt::Display;

use serde::Serialize;

/// Closed set of transactional emails the site can send. The snake_case tag is
/// both the wire format (`type` in the request body) and the value persisted
/// in `email_send_log.email_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailType {
    Welcome,
    TalkAccepted,
    TalkRejected,
    TeamJoined,
    TeamMemberLeft,
    RegistrationOpen,
}

/// Ceilings applied per `(user, email type)` pair over a trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_per_hour: i64,
    pub max_per_day: i64,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("Unknown email type: {0}")]
pub struct UnknownEmailType(pub String);

impl EmailType {
    pub const ALL: [EmailType; 6] = [
        EmailType::Welcome,
        EmailType::TalkAccepted,
        EmailType::TalkRejected,
        EmailType::TeamJoined,
        EmailType::TeamMemberLeft,
        EmailType::RegistrationOpen,
    ];

    pub fn parse(tag: &str) -> Result<Self, UnknownEmailType> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == tag)
            .ok_or_else(|| UnknownEmailType(tag.to_string()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmailType::Welcome => "welcome",
            EmailType::TalkAccepted => "talk_accepted",
            EmailType::TalkRejected => "talk_rejected",
            EmailType::TeamJoined => "team_joined",
            EmailType::TeamMemberLeft => "team_member_left",
            EmailType::RegistrationOpen => "registration_open",
        }
    }

    /// Fixed ceilings; there is no way to configure these at runtime.
    pub fn policy(&self) -> RateLimitPolicy {
        let (max_per_hour, max_per_day) = match self {
            EmailType::Welcome => (2, 5),
            EmailType::TeamJoined | EmailType::TeamMemberLeft => (10, 50),
            EmailType::TalkAccepted | EmailType::TalkRejected => (100, 500),
            EmailType::RegistrationOpen => (5, 10),
        };
        RateLimitPolicy {
            max_per_hour,
            max_per_day,
        }
    }
}

impl Display for EmailType {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
