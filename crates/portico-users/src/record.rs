//! Stored form of an account.

use portico_core::Role;
use portico_store::Record;
use serde::{Deserialize, Serialize};

use crate::password::PasswordHash;
use crate::proto::User;

/// An account row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub(crate) id: u64,
    pub(crate) email: String,
    pub(crate) display_name: String,
    pub(crate) role: Role,
    pub(crate) password_salt: String,
    pub(crate) password_digest: String,
    pub(crate) created_at: i64,
}

impl UserRecord {
    pub(crate) fn new(
        email: String,
        display_name: String,
        role: Role,
        password: &PasswordHash,
        created_at: i64,
    ) -> Self {
        Self {
            id: 0,
            email,
            display_name,
            role,
            password_salt: password.salt.clone(),
            password_digest: password.digest.clone(),
            created_at,
        }
    }

    pub(crate) fn password(&self) -> PasswordHash {
        PasswordHash {
            salt: self.password_salt.clone(),
            digest: self.password_digest.clone(),
        }
    }

    pub(crate) fn to_proto(&self) -> User {
        User {
            id: self.id,
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            role: self.role.as_str().to_string(),
            created_at: self.created_at,
        }
    }
}

impl Record for UserRecord {
    const COLLECTION: &'static str = "users";
    const UNIQUE: &'static [&'static str] = &["email"];

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}
