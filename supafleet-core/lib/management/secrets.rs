//! Secret generation for Supabase instances.
//!
//! Every instance gets its own JWT signing secret, two long-lived HS256 tokens carrying the
//! `anon` and `service_role` roles, and a set of random passwords and keys. Randomness comes from
//! the thread-local CSPRNG. The generated tokens are decoded again with the bundle's own secret
//! before the bundle is handed out.

use base64::{
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
    Engine,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::{models::SecretBundle, SupafleetError, SupafleetResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Issuer claim of every generated token.
pub const JWT_ISSUER: &str = "supabase";

/// Token lifetime. Tokens are effectively permanent; rotate them with `update-env`.
pub const TOKEN_LIFETIME_DAYS: i64 = 365 * 100;

/// Random bytes behind the JWT secret (86 base64url characters).
const JWT_SECRET_BYTES: usize = 64;

/// Random bytes behind the dashboard password (32 characters).
const DASHBOARD_PASSWORD_BYTES: usize = 24;

/// Random bytes behind the secret key base (86 characters).
const SECRET_KEY_BASE_BYTES: usize = 64;

/// Random bytes behind the vault key (44 characters, padded).
const VAULT_ENC_KEY_BYTES: usize = 32;

/// Random bytes behind the database password (43 characters).
const POSTGRES_PASSWORD_BYTES: usize = 32;

/// Random bytes behind each logflare token (43 characters).
const LOGFLARE_TOKEN_BYTES: usize = 32;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The role a token grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRole {
    /// Anonymous, row level security restricted access.
    Anon,

    /// Privileged service access.
    ServiceRole,
}

/// Claims carried by the generated tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Granted role.
    pub role: String,

    /// Issuer.
    pub iss: String,

    /// Issued at, in seconds since the epoch.
    pub iat: u64,

    /// Expiry, in seconds since the epoch.
    pub exp: u64,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl TokenRole {
    /// The value of the `role` claim.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenRole::Anon => "anon",
            TokenRole::ServiceRole => "service_role",
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Generates a fresh, self-verified secret bundle.
pub fn generate() -> SupafleetResult<SecretBundle> {
    tracing::debug!("generating instance secrets");

    let jwt_secret = random_token(JWT_SECRET_BYTES);

    let now = Utc::now();
    let iat = now.timestamp() as u64;
    let exp = (now + Duration::days(TOKEN_LIFETIME_DAYS)).timestamp() as u64;

    let anon_key = sign_token(&jwt_secret, TokenRole::Anon, iat, exp)?;
    let service_role_key = sign_token(&jwt_secret, TokenRole::ServiceRole, iat, exp)?;

    let bundle = SecretBundle {
        jwt_secret,
        anon_key,
        service_role_key,
        dashboard_password: random_token(DASHBOARD_PASSWORD_BYTES),
        secret_key_base: random_token(SECRET_KEY_BASE_BYTES),
        vault_enc_key: URL_SAFE.encode(random_bytes(VAULT_ENC_KEY_BYTES)),
        postgres_password: random_token(POSTGRES_PASSWORD_BYTES),
        logflare_public_token: random_token(LOGFLARE_TOKEN_BYTES),
        logflare_private_token: random_token(LOGFLARE_TOKEN_BYTES),
    };

    verify(&bundle)?;

    tracing::debug!("generated and verified instance secrets");
    Ok(bundle)
}

/// Checks that both tokens of a bundle verify against its secret and carry the right role.
pub fn verify(bundle: &SecretBundle) -> SupafleetResult<()> {
    verify_role(&bundle.anon_key, &bundle.jwt_secret, TokenRole::Anon)?;
    verify_role(
        &bundle.service_role_key,
        &bundle.jwt_secret,
        TokenRole::ServiceRole,
    )?;

    Ok(())
}

/// Decodes and validates a token signed with `secret`.
pub fn decode_token(token: &str, secret: &str) -> SupafleetResult<TokenClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[JWT_ISSUER]);

    let data = decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;

    Ok(data.claims)
}

fn sign_token(secret: &str, role: TokenRole, iat: u64, exp: u64) -> SupafleetResult<String> {
    let claims = TokenClaims {
        role: role.as_str().to_string(),
        iss: JWT_ISSUER.to_string(),
        iat,
        exp,
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

fn verify_role(token: &str, secret: &str, expected: TokenRole) -> SupafleetResult<()> {
    let claims = decode_token(token, secret).map_err(|e| {
        SupafleetError::SecretValidation(format!(
            "{} token does not verify: {}",
            expected.as_str(),
            e
        ))
    })?;

    if claims.role != expected.as_str() {
        return Err(SupafleetError::SecretValidation(format!(
            "expected role {} but token carries {}",
            expected.as_str(),
            claims.role
        )));
    }

    Ok(())
}

/// Random bytes encoded as unpadded base64url, like Python's `secrets.token_urlsafe`.
fn random_token(bytes: usize) -> String {
    URL_SAFE_NO_PAD.encode(random_bytes(bytes))
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_generated_bundles_always_verify() {
        for _ in 0..64 {
            let bundle = generate().unwrap();
            verify(&bundle).unwrap();

            let anon = decode_token(&bundle.anon_key, &bundle.jwt_secret).unwrap();
            let service = decode_token(&bundle.service_role_key, &bundle.jwt_secret).unwrap();
            assert_eq!(anon.role, "anon");
            assert_eq!(service.role, "service_role");
            assert_eq!(anon.iss, JWT_ISSUER);
            assert_eq!(anon.exp, service.exp);
            assert!(anon.exp > anon.iat + 99 * 365 * 24 * 3600);
        }
    }

    #[test]
    fn test_secret_lengths() {
        let bundle = generate().unwrap();
        assert!(bundle.jwt_secret.len() >= 86);
        assert!(bundle.dashboard_password.len() >= 32);
        assert!(bundle.secret_key_base.len() >= 86);
        assert_eq!(bundle.vault_enc_key.len(), 44);
        assert!(bundle.postgres_password.len() >= 43);
        assert!(bundle.logflare_public_token.len() >= 43);
        assert!(bundle.logflare_private_token.len() >= 43);
    }

    #[test]
    fn test_secrets_are_unique() {
        let mut seen = HashSet::new();
        for _ in 0..16 {
            let bundle = generate().unwrap();
            assert!(seen.insert(bundle.jwt_secret.clone()));
            assert!(seen.insert(bundle.postgres_password.clone()));
            assert_ne!(bundle.logflare_public_token, bundle.logflare_private_token);
        }
    }

    #[test]
    fn test_verify_rejects_swapped_roles() {
        let mut bundle = generate().unwrap();
        std::mem::swap(&mut bundle.anon_key, &mut bundle.service_role_key);
        assert!(matches!(
            verify(&bundle),
            Err(SupafleetError::SecretValidation(_))
        ));
    }

    #[test]
    fn test_verify_rejects_foreign_signature() {
        let mut bundle = generate().unwrap();
        let other = generate().unwrap();
        bundle.service_role_key = other.service_role_key;
        assert!(matches!(
            verify(&bundle),
            Err(SupafleetError::SecretValidation(_))
        ));
    }
}
