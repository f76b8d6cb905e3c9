//! Credential form validation for `/login` and `/register`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::errors::AppError;

/// E-mail address, or a plain `[A-Za-z0-9_]+` handle.
static USERNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\w.-]+@[\w.-]+\.\w+$|^[A-Za-z0-9_]+$").expect("valid username regex")
});

const PASSWORD_MIN: usize = 6;
const PASSWORD_MAX: usize = 22;

/// Raw JSON body. Both fields optional so a missing one is reported as a
/// validation error rather than a deserialization failure.
#[derive(Debug, Default, Deserialize)]
pub struct CredentialsForm {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl CredentialsForm {
    /// Trim both fields, strip non-printable characters from the username,
    /// then check the rules. Reports the first failure only.
    pub fn validate(self) -> Result<Credentials, AppError> {
        let username: String = self
            .username
            .unwrap_or_default()
            .trim()
            .chars()
            .filter(|c| !c.is_control())
            .collect();
        let password = self.password.unwrap_or_default().trim().to_string();

        if username.is_empty() {
            return Err(AppError::Validation("username is required".into()));
        }
        if !USERNAME_RE.is_match(&username) {
            return Err(AppError::Validation(
                "username must be a valid handle or e-mail address".into(),
            ));
        }
        if password.is_empty() {
            return Err(AppError::Validation("password is required".into()));
        }
        let len = password.chars().count();
        if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&len) {
            return Err(AppError::Validation(format!(
                "password must be between {} and {} characters",
                PASSWORD_MIN, PASSWORD_MAX
            )));
        }

        Ok(Credentials { username, password })
    }
}
