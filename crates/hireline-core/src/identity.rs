//! The signed-in account's identity.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::UserId;
use crate::roles::RoleSet;

/// Identity of the signed-in account.
///
/// This is the half of the credential that survives a restart. It carries no
/// secret; the bearer token lives in memory only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Account id.
    pub id: UserId,
    /// Login email.
    pub email: String,
    /// Contact phone number, if one was registered.
    #[serde(default)]
    pub phone: Option<String>,
    /// Whether the phone number has been verified.
    #[serde(default)]
    pub phone_verified: bool,
    /// Coarse permission classes granted to the account.
    #[serde(default)]
    pub roles: RoleSet,
}

impl Identity {
    /// Create an identity with no phone number.
    #[must_use]
    pub fn new(id: UserId, email: impl Into<String>, roles: RoleSet) -> Self {
        Self {
            id,
            email: email.into(),
            phone: None,
            phone_verified: false,
            roles,
        }
    }

    /// Decode an identity from a JSON value returned by the API.
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not describe an identity.
    pub fn from_json(value: serde_json::Value) -> Result<Self, CoreError> {
        Ok(serde_json::from_value(value)?)
    }
}
