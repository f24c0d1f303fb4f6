use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Token,
    Login,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::Login => "login",
        }
    }
}

/// Connection and auth settings for one Vikunja server.
///
/// The token is only ever held in memory; the profile store writes it to
/// the secret store and leaves it out of the profile document.
#[derive(Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub base_url: String,
    pub auth_method: AuthMethod,
    pub verify_tls: bool,
    pub default_list_id: Option<i64>,
    pub token: Option<String>,
}

impl Profile {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            auth_method: AuthMethod::Token,
            verify_tls: true,
            default_list_id: None,
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn requires_login(&self) -> bool {
        self.auth_method == AuthMethod::Login
    }

    /// Base URL without a trailing slash.
    pub fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

// Hand-written so the token never lands in logs.
impl std::fmt::Debug for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profile")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("auth_method", &self.auth_method)
            .field("verify_tls", &self.verify_tls)
            .field("default_list_id", &self.default_list_id)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
