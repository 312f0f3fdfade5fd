//! The placeholder table of the deployment's `.env.example`.
//!
//! Each entry names a full `KEY=value` line shipped by the upstream template and the value that
//! replaces it. When upstream changes a default, only this table needs to follow.

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The instance value an env placeholder is replaced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvValue {
    /// Database password.
    PostgresPassword,

    /// JWT signing secret.
    JwtSecret,

    /// Studio dashboard password.
    DashboardPassword,

    /// Realtime/Supavisor base secret.
    SecretKeyBase,

    /// Vault encryption key.
    VaultEncKey,

    /// Signed `anon` token.
    AnonKey,

    /// Signed `service_role` token.
    ServiceRoleKey,

    /// Database name.
    DatabaseName,

    /// Database port.
    PostgresPort,

    /// Gateway HTTP port.
    KongHttpPort,

    /// Gateway HTTPS port.
    KongHttpsPort,

    /// Studio port.
    StudioPort,

    /// Pooler transaction port.
    PoolerPort,

    /// Public API URL.
    SupabaseUrl,

    /// Logflare public access token.
    LogflarePublicToken,

    /// Logflare private access token.
    LogflarePrivateToken,
}

/// One `KEY=default` line of the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvPlaceholder {
    /// The variable name.
    pub key: &'static str,

    /// The default value shipped upstream.
    pub template_value: &'static str,

    /// What replaces the default.
    pub value: EnvValue,
}

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Every line of `.env.example` that must be rewritten for an instance.
pub const ENV_PLACEHOLDERS: &[EnvPlaceholder] = &[
    EnvPlaceholder {
        key: "POSTGRES_PASSWORD",
        template_value: "your-super-secret-and-long-postgres-password",
        value: EnvValue::PostgresPassword,
    },
    EnvPlaceholder {
        key: "JWT_SECRET",
        template_value: "your-super-secret-jwt-token-with-at-least-32-characters-long",
        value: EnvValue::JwtSecret,
    },
    EnvPlaceholder {
        key: "DASHBOARD_PASSWORD",
        template_value: "this_password_is_insecure_and_should_be_updated",
        value: EnvValue::DashboardPassword,
    },
    EnvPlaceholder {
        key: "SECRET_KEY_BASE",
        template_value: "UpNVntn3cDxHJpq99YMc1T1AQgQpc8kfYTuRgBiYa15BLrx8etQoXz3gZv1/u2oq",
        value: EnvValue::SecretKeyBase,
    },
    EnvPlaceholder {
        key: "VAULT_ENC_KEY",
        template_value: "your-encryption-key-32-chars-min",
        value: EnvValue::VaultEncKey,
    },
    EnvPlaceholder {
        key: "ANON_KEY",
        template_value: "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.eyAgCiAgICAicm9sZSI6ICJhbm9uIiwKICAgICJpc3MiOiAic3VwYWJhc2UtZGVtbyIsCiAgICAiaWF0IjogMTY0MTc2OTIwMCwKICAgICJleHAiOiAxNzk5NTM1NjAwCn0.dc_X5iR_VP_qT0zsiyj_I_OZ2T9FtRU2BBNWN8Bu4GE",
        value: EnvValue::AnonKey,
    },
    EnvPlaceholder {
        key: "SERVICE_ROLE_KEY",
        template_value: "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.eyAgCiAgICAicm9sZSI6ICJzZXJ2aWNlX3JvbGUiLAogICAgImlzcyI6ICJzdXBhYmFzZS1kZW1vIiwKICAgICJpYXQiOiAxNjQxNzY5MjAwLAogICAgImV4cCI6IDE3OTk1MzU2MDAKfQ.DaYlNEoUrrEn2Ig7tqibS-PHK5vgusbcbo7X36XVt4Q",
        value: EnvValue::ServiceRoleKey,
    },
    EnvPlaceholder {
        key: "POSTGRES_DB",
        template_value: "postgres",
        value: EnvValue::DatabaseName,
    },
    EnvPlaceholder {
        key: "POSTGRES_PORT",
        template_value: "5432",
        value: EnvValue::PostgresPort,
    },
    EnvPlaceholder {
        key: "KONG_HTTP_PORT",
        template_value: "8000",
        value: EnvValue::KongHttpPort,
    },
    EnvPlaceholder {
        key: "KONG_HTTPS_PORT",
        template_value: "8443",
        value: EnvValue::KongHttpsPort,
    },
    EnvPlaceholder {
        key: "STUDIO_PORT",
        template_value: "3000",
        value: EnvValue::StudioPort,
    },
    EnvPlaceholder {
        key: "POOLER_PROXY_PORT_TRANSACTION",
        template_value: "6543",
        value: EnvValue::PoolerPort,
    },
    EnvPlaceholder {
        key: "API_EXTERNAL_URL",
        template_value: "http://localhost:8000",
        value: EnvValue::SupabaseUrl,
    },
    EnvPlaceholder {
        key: "SITE_URL",
        template_value: "http://localhost:3000",
        value: EnvValue::SupabaseUrl,
    },
    EnvPlaceholder {
        key: "LOGFLARE_PUBLIC_ACCESS_TOKEN",
        template_value: "your-super-secret-and-long-logflare-key-public",
        value: EnvValue::LogflarePublicToken,
    },
    EnvPlaceholder {
        key: "LOGFLARE_PRIVATE_ACCESS_TOKEN",
        template_value: "your-super-secret-and-long-logflare-key-private",
        value: EnvValue::LogflarePrivateToken,
    },
];

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl EnvPlaceholder {
    /// The full template line, `KEY=default`.
    pub fn placeholder(&self) -> String {
        format!("{}={}", self.key, self.template_value)
    }

    /// The line that replaces the placeholder.
    pub fn replacement(&self, value: &str) -> String {
        format!("{}={}", self.key, value)
    }
}
