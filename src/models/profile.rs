use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::FromRow;

const DOB_SALT: &str = "GOLF_BUDDY_SALT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub dob_hash: String,
    pub created_at: String,
    pub last_active_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(skip)]
    pub sync_state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProfileRequest {
    pub username: String,
    /// Date of birth as `YYYY-MM-DD`. Only its salted hash is stored.
    pub dob: String,
}

/// Salted SHA-256 of a date of birth, hex encoded.
pub fn hash_dob(dob: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(dob.trim().as_bytes());
    hasher.update(DOB_SALT.as_bytes());
    hex::encode(hasher.finalize())
}

impl Profile {
    pub fn verify_dob(&self, dob: &str) -> bool {
        hash_dob(dob) == self.dob_hash
    }
}
