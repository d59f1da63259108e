//! The storefront account model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::email::Email;
use crate::types::id::UserId;
use crate::types::role::UserRole;

/// An authenticated storefront account as the identity endpoint returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: Email,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// Shallow-merge the provided fields into this account.
    ///
    /// Fields the update leaves as `None` keep their current value.
    pub fn merge(&mut self, update: UserUpdate) {
        if let Some(name) = update.name {
            self.name = Some(name);
        }
        if let Some(email) = update.email {
            self.email = email;
        }
        if let Some(avatar_url) = update.avatar_url {
            self.avatar_url = Some(avatar_url);
        }
    }
}

/// A partial account update. `None` fields are left untouched on merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<Email>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl UserUpdate {
    /// True when the update carries no fields at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.avatar_url.is_none()
    }
}
