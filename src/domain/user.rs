use serde::{Deserialize, Serialize};

pub type UserId = i64;

/// A registered user. The password is only ever held as an argon2 PHC string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
}

/// Accounts created by the bootstrap routine when missing.
pub const DEFAULT_USERS: &[(&str, &str)] = &[("ophelos", "passw0rd"), ("guest", "password1")];
