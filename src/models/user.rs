//! Authenticated user identity
//!
//! Accounts, rosters and token issuance live outside this server; it only
//! verifies bearer tokens and reads the caller's identity and role from them.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

/// School role carried in the token, ordered by privilege
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Registered user without a school role
    Registered,
    Teacher,
    /// Workshop manager or owner, may manage devices and override loans
    Manager,
    Admin,
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i32,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn is_manager(&self) -> bool {
        self.role >= Role::Manager
    }

    /// Require device and loan management rights
    pub fn require_manager(&self) -> Result<(), AppError> {
        if self.is_manager() {
            Ok(())
        } else {
            Err(AppError::Authorization("Workshop manager rights required".to_string()))
        }
    }

    /// Require the caller to be `owner_id` or a manager
    pub fn require_owner_or_manager(&self, owner_id: i32) -> Result<(), AppError> {
        if self.user_id == owner_id || self.is_manager() {
            Ok(())
        } else {
            Err(AppError::Authorization("Loan belongs to another user".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn claims(role: Role) -> UserClaims {
        let now = Utc::now().timestamp();
        UserClaims {
            sub: "student@school.test".to_string(),
            user_id: 7,
            role,
            exp: now + 3600,
            iat: now,
        }
    }

    #[test]
    fn token_round_trips_with_same_secret() {
        let token = claims(Role::Teacher).create_token("secret").unwrap();
        let parsed = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(parsed.user_id, 7);
        assert_eq!(parsed.role, Role::Teacher);
        assert!(UserClaims::from_token(&token, "other").is_err());
    }

    #[test]
    fn managers_and_admins_pass_manager_check() {
        assert!(claims(Role::Teacher).require_manager().is_err());
        assert!(claims(Role::Manager).require_manager().is_ok());
        assert!(claims(Role::Admin).require_manager().is_ok());
    }

    #[test]
    fn owner_may_act_on_own_loan() {
        let student = claims(Role::Registered);
        assert!(student.require_owner_or_manager(7).is_ok());
        assert!(student.require_owner_or_manager(8).is_err());
    }
}
