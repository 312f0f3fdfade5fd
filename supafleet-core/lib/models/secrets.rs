use std::fmt;

use serde::{Deserialize, Serialize};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The credentials of one instance.
///
/// Missing keys deserialize as empty strings, so records written before secrets were generated
/// still load.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretBundle {
    /// HS256 signing key of both tokens.
    pub jwt_secret: String,

    /// Token carrying the `anon` role.
    pub anon_key: String,

    /// Token carrying the `service_role` role.
    pub service_role_key: String,

    /// Studio dashboard password.
    pub dashboard_password: String,

    /// Base secret for realtime and the pooler.
    pub secret_key_base: String,

    /// Vault encryption key.
    pub vault_enc_key: String,

    /// Database password.
    pub postgres_password: String,

    /// Logflare public access token.
    pub logflare_public_token: String,

    /// Logflare private access token.
    pub logflare_private_token: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SecretBundle {
    /// Whether the bundle holds no credentials at all.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Debug for SecretBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &str| if value.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("SecretBundle")
            .field("jwt_secret", &redact(&self.jwt_secret))
            .field("anon_key", &redact(&self.anon_key))
            .field("service_role_key", &redact(&self.service_role_key))
            .field("dashboard_password", &redact(&self.dashboard_password))
            .field("secret_key_base", &redact(&self.secret_key_base))
            .field("vault_enc_key", &redact(&self.vault_enc_key))
            .field("postgres_password", &redact(&self.postgres_password))
            .field("logflare_public_token", &redact(&self.logflare_public_token))
            .field("logflare_private_token", &redact(&self.logflare_private_token))
            .finish()
    }
}
