use crate::config::Config;

/// Who is signed in and the credentials sent with each request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user_id: Option<String>,
    pub cookie: Option<String>,
}

impl Session {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            user_id: non_empty(cfg.session.user_id.as_deref()),
            cookie: non_empty(cfg.session.cookie.as_deref()),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
