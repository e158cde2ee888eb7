use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{generate_id, now, Id};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    DataScientist,
    BusinessUser,
    Viewer,
}

/// Full user record as persisted, credential hash included.
/// Never serialize this to a caller; use [`UserResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub department: Option<String>,
    pub region: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub hashed_password: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sanitized user response that excludes the credential hash
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Id,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub department: Option<String>,
    pub region: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            department: user.department,
            region: user.region,
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub department: Option<String>,
    pub region: Option<String>,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: UserRole,
}

fn default_role() -> UserRole {
    UserRole::Viewer
}

impl NewUser {
    /// Convert to a full User with the credential already hashed.
    pub fn into_user(self, hashed_password: String) -> User {
        let ts = now();
        User {
            id: generate_id(),
            username: self.username,
            email: self.email,
            full_name: self.full_name,
            department: self.department,
            region: self.region,
            role: self.role,
            is_active: true,
            hashed_password,
            created_at: ts,
            updated_at: ts,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub department: Option<String>,
    pub region: Option<String>,
    pub role: Option<UserRole>,
}

impl User {
    /// Apply a partial update and stamp updated_at. Role gating happens in
    /// the handler; this applies whatever it is given.
    pub fn apply_update(&mut self, update: UserUpdate) {
        if let Some(email) = update.email {
            self.email = email;
        }
        if let Some(full_name) = update.full_name {
            self.full_name = Some(full_name);
        }
        if let Some(department) = update.department {
            self.department = Some(department);
        }
        if let Some(region) = update.region {
            self.region = Some(region);
        }
        if let Some(role) = update.role {
            self.role = role;
        }
        self.updated_at = now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> User {
        NewUser {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            full_name: None,
            department: None,
            region: None,
            password: "unused-here".to_string(),
            role: UserRole::Admin,
        }
        .into_user("$2b$12$fakehash".to_string())
    }

    #[test]
    fn test_user_response_excludes_credential_hash() {
        let json = serde_json::to_string(&UserResponse::from(sample())).unwrap();
        assert!(!json.contains("hashed_password"));
        assert!(!json.contains("fakehash"));
        assert!(json.contains("\"role\":\"admin\""));
    }

    #[test]
    fn test_user_storage_round_trip_keeps_hash() {
        let user = sample();
        let doc = serde_json::to_value(&user).unwrap();
        let restored: User = serde_json::from_value(doc).unwrap();
        assert_eq!(restored, user);
    }

    #[test]
    fn test_default_role_is_viewer() {
        let new_user: NewUser = serde_json::from_str(
            r#"{"username":"bob","email":"bob@example.com","password":"pw"}"#,
        )
        .unwrap();
        assert_eq!(new_user.role, UserRole::Viewer);
    }

    #[test]
    fn test_role_wire_format() {
        assert_eq!(
            serde_json::to_string(&UserRole::DataScientist).unwrap(),
            "\"data_scientist\""
        );
        assert_eq!(
            serde_json::to_string(&UserRole::BusinessUser).unwrap(),
            "\"business_user\""
        );
    }
}
