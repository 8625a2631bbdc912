use serde::Deserialize;

/// Optional fields interpolated into a template. Keys arrive camelCased from
/// the web client (`talkTitle`, ...). Unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateData {
    pub name: Option<String>,
    pub talk_title: Option<String>,
    pub team_name: Option<String>,
    pub member_name: Option<String>,
}

impl TemplateData {
    /// A missing or empty `name` falls back to a generic greeting ("Hi there")
    pub fn name_or_default(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or("there")
    }

    pub fn talk_title_or_default(&self) -> &str { self.talk_title.as_deref().unwrap_or_default() }

    pub fn team_name_or_default(&self) -> &str { self.team_name.as_deref().unwrap_or_default() }

    pub fn member_name_or_default(&self) -> &str {
        self.member_name.as_deref().unwrap_or_default()
    }
}
