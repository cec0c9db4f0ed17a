use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use census::{Role, User};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: String,
    pub username: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Deserialize)]
struct Header {
    alg: String,
}

/// Issues and checks HS256 session tokens.
pub struct TokenSigner {
    key: Vec<u8>,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            key: secret.as_bytes().to_vec(),
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn issue(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now().timestamp();

        self.sign(&Claims {
            user_id: user.id.clone(),
            username: user.username.clone(),
            role: user.role,
            iat: now,
            exp: now + self.ttl.num_seconds(),
        })
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        let claims_json = serde_json::to_string(claims).map_err(AppError::internal)?;

        let message = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(HEADER),
            URL_SAFE_NO_PAD.encode(claims_json)
        );
        let signature = URL_SAFE_NO_PAD.encode(self.mac(&message)?.finalize().into_bytes());

        Ok(format!("{message}.{signature}"))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        let header: Header = decode_json(header_b64)?;
        if header.alg != "HS256" {
            return Err(invalid());
        }

        let signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|_| invalid())?;
        self.mac(&format!("{header_b64}.{payload_b64}"))?
            .verify_slice(&signature)
            .map_err(|_| invalid())?;

        let claims: Claims = decode_json(payload_b64)?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(AppError::Unauthorized("Token expired!".to_string()));
        }

        Ok(claims)
    }

    fn mac(&self, message: &str) -> Result<HmacSha256, AppError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| AppError::internal(e.to_string()))?;
        mac.update(message.as_bytes());

        Ok(mac)
    }
}

fn decode_json<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, AppError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|_| invalid())?;

    serde_json::from_slice(&bytes).map_err(|_| invalid())
}

fn invalid() -> AppError {
    AppError::Unauthorized("Authentication Failed!".to_string())
}

#[cfg(test)]
mod tests {
    use census::Profile;

    use super::*;

    fn user() -> User {
        User::new(
            "etu.head",
            "head@test.com",
            "hash".to_string(),
            Role::EtuHead,
            Profile::default(),
        )
    }

    #[test]
    fn test_issue_then_verify() {
        let signer = TokenSigner::new("secret", 24);
        let user = user();

        let token = signer.issue(&user).unwrap();
        let claims = signer.verify(&token).unwrap();

        assert_eq!(token.matches('.').count(), 2);
        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.username, "etu.head");
        assert_eq!(claims.role, Role::EtuHead);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn test_claims_wire_names() {
        let claims = Claims {
            user_id: "id".to_string(),
            username: "u".to_string(),
            role: Role::Admin,
            iat: 1,
            exp: 2,
        };
        let json = serde_json::to_value(&claims).unwrap();

        assert_eq!(json["userId"], "id");
        assert_eq!(json["role"], "admin");
    }

    #[test]
    fn test_wrong_key_rejected() {
        let token = TokenSigner::new("secret", 24).issue(&user()).unwrap();

        assert!(matches!(
            TokenSigner::new("other", 24).verify(&token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let signer = TokenSigner::new("secret", 24);
        let token = signer.issue(&user()).unwrap();

        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let forged = serde_json::json!({
            "userId": "x", "username": "x", "role": "admin", "iat": 0, "exp": i64::MAX
        });
        parts[1] = URL_SAFE_NO_PAD.encode(forged.to_string());

        assert!(signer.verify(&parts.join(".")).is_err());
    }

    #[test]
    fn test_expired_rejected() {
        let signer = TokenSigner::new("secret", 24);
        let now = Utc::now().timestamp();
        let token = signer
            .sign(&Claims {
                user_id: "id".to_string(),
                username: "u".to_string(),
                role: Role::Patient,
                iat: now - 100,
                exp: now - 10,
            })
            .unwrap();

        match signer.verify(&token) {
            Err(AppError::Unauthorized(message)) => assert_eq!(message, "Token expired!"),
            other => panic!("expected expiry, got {other:?}"),
        }
    }

    #[test]
    fn test_garbage_rejected() {
        let signer = TokenSigner::new("secret", 24);

        assert!(signer.verify("").is_err());
        assert!(signer.verify("a.b").is_err());
        assert!(signer.verify("a.b.c.d").is_err());
    }
}
