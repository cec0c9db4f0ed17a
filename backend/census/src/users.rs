use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::utils::sanitize_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "pharmacist")]
    Pharmacist,
    #[serde(rename = "etu_head")]
    EtuHead,
    #[serde(rename = "store_manager")]
    StoreManager,
    #[serde(rename = "ward_nurse")]
    WardNurse,
    #[serde(rename = "etu_nurse")]
    EtuNurse,
    #[serde(rename = "etu_doc")]
    EtuDoc,
    #[serde(rename = "opd_doc")]
    OpdDoc,
    #[serde(rename = "patient")]
    Patient,
    #[serde(rename = "methaRole")]
    MethaRole,
    #[serde(rename = "admin")]
    Admin,
}

#[derive(Error, Debug, PartialEq)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl Role {
    pub const ALL: [Role; 10] = [
        Role::Pharmacist,
        Role::EtuHead,
        Role::StoreManager,
        Role::WardNurse,
        Role::EtuNurse,
        Role::EtuDoc,
        Role::OpdDoc,
        Role::Patient,
        Role::MethaRole,
        Role::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Pharmacist => "pharmacist",
            Role::EtuHead => "etu_head",
            Role::StoreManager => "store_manager",
            Role::WardNurse => "ward_nurse",
            Role::EtuNurse => "etu_nurse",
            Role::EtuDoc => "etu_doc",
            Role::OpdDoc => "opd_doc",
            Role::Patient => "patient",
            Role::MethaRole => "methaRole",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    // exact match, role names are case sensitive ("methaRole")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional contact details, editable by the account owner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Profile {
    /// Overwrites only the fields present in `other`.
    pub fn merge(&mut self, other: Profile) {
        if other.first_name.is_some() {
            self.first_name = other.first_name;
        }
        if other.last_name.is_some() {
            self.last_name = other.last_name;
        }
        if other.mobile.is_some() {
            self.mobile = other.mobile;
        }
        if other.address.is_some() {
            self.address = other.address;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    /// bcrypt hash, never the plain password.
    pub password: String,
    pub role: Role,
    #[serde(flatten)]
    pub profile: Profile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        username: &str,
        email: &str,
        password_hash: String,
        role: Role,
        profile: Profile,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            username: sanitize_key(username),
            email: sanitize_key(email),
            password: password_hash,
            role,
            profile,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
            profile: self.profile.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// What the API hands out: a [`User`] minus the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    #[serde(flatten)]
    pub profile: Profile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        user.public()
    }
}

/// Pending password recovery code for one username.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtpEntry {
    pub code: String,
    pub attempts: u32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl OtpEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip_names() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert_eq!("methaRole".parse::<Role>(), Ok(Role::MethaRole));
    }

    #[test]
    fn test_role_rejects_unknown() {
        assert!("surgeon".parse::<Role>().is_err());
        assert!("Admin".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde_matches_wire_names() {
        let json = serde_json::to_string(&Role::StoreManager).unwrap();
        assert_eq!(json, "\"store_manager\"");

        let role: Role = serde_json::from_str("\"methaRole\"").unwrap();
        assert_eq!(role, Role::MethaRole);
    }

    #[test]
    fn test_new_user_lowercases_keys() {
        let user = User::new(
            "  Admin01 ",
            "Admin01@Test.com",
            "hash".to_string(),
            Role::Admin,
            Profile::default(),
        );

        assert_eq!(user.username, "admin01");
        assert_eq!(user.email, "admin01@test.com");
        assert_eq!(user.created_at, user.updated_at);
    }

    #[test]
    fn test_public_user_hides_password() {
        let user = User::new(
            "nurse",
            "nurse@test.com",
            "secret-hash".to_string(),
            Role::WardNurse,
            Profile {
                first_name: Some("Ann".to_string()),
                ..Profile::default()
            },
        );

        let json = serde_json::to_value(user.public()).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["_id"], user.id.as_str());
        assert_eq!(json["firstName"], "Ann");
        assert_eq!(json["role"], "ward_nurse");
    }

    #[test]
    fn test_profile_merge_keeps_missing_fields() {
        let mut profile = Profile {
            first_name: Some("Ann".to_string()),
            mobile: Some(771234567),
            ..Profile::default()
        };

        profile.merge(Profile {
            last_name: Some("Perera".to_string()),
            mobile: Some(719999999),
            ..Profile::default()
        });

        assert_eq!(profile.first_name.as_deref(), Some("Ann"));
        assert_eq!(profile.last_name.as_deref(), Some("Perera"));
        assert_eq!(profile.mobile, Some(719999999));
        assert_eq!(profile.address, None);
    }
}
