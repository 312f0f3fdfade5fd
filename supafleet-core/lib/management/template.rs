//! Rendering of the instance `.env` file from the upstream `.env.example`.

use crate::{
    config::{EnvValue, ResourceSet, ENV_PLACEHOLDERS},
    models::SecretBundle,
    SupafleetError, SupafleetResult,
};

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Renders a text template against a set of substitutions.
pub trait TemplateEngine: Send + Sync {
    /// Replaces every placeholder of `substitutions` found in `template`.
    fn render(&self, template: &str, substitutions: &SubstitutionMap) -> Rendered;
}

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Placeholder to replacement pairs. No placeholder may contain another one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionMap {
    entries: Vec<(String, String)>,
}

/// The output of a render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// The rendered text.
    pub text: String,

    /// Placeholders that did not occur in the template.
    pub missing: Vec<String>,
}

/// Literal text replacement.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainSubstitution;

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SubstitutionMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a substitution, rejecting placeholders that overlap an existing one.
    pub fn insert(
        &mut self,
        placeholder: impl Into<String>,
        replacement: impl Into<String>,
    ) -> SupafleetResult<()> {
        let placeholder = placeholder.into();
        if placeholder.is_empty() {
            return Err(SupafleetError::InvalidArgument(
                "placeholder must not be empty".to_string(),
            ));
        }

        if let Some((existing, _)) = self
            .entries
            .iter()
            .find(|(existing, _)| existing.contains(&placeholder) || placeholder.contains(existing))
        {
            return Err(SupafleetError::InvalidArgument(format!(
                "placeholder {:?} overlaps {:?}",
                placeholder, existing
            )));
        }

        self.entries.push((placeholder, replacement.into()));
        Ok(())
    }

    /// Iterates over the substitutions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(placeholder, replacement)| (placeholder.as_str(), replacement.as_str()))
    }

    /// Number of substitutions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no substitution.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl TemplateEngine for PlainSubstitution {
    fn render(&self, template: &str, substitutions: &SubstitutionMap) -> Rendered {
        let mut text = template.to_string();
        let mut missing = Vec::new();

        for (placeholder, replacement) in substitutions.iter() {
            if text.contains(placeholder) {
                text = text.replace(placeholder, replacement);
            } else {
                missing.push(placeholder.to_string());
            }
        }

        Rendered { text, missing }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Builds the `.env` substitutions of an instance from the placeholder table.
pub fn build_env_substitutions(
    resources: &ResourceSet,
    secrets: &SecretBundle,
) -> SupafleetResult<SubstitutionMap> {
    let mut map = SubstitutionMap::new();

    for entry in ENV_PLACEHOLDERS {
        let value = resolve(entry.value, resources, secrets);
        map.insert(entry.placeholder(), entry.replacement(&value))?;
    }

    Ok(map)
}

/// The block appended to a rendered `.env`, identifying the instance and listing how external
/// services reach it.
pub fn env_trailer(resources: &ResourceSet, secrets: &SecretBundle) -> String {
    let id = resources.instance_id;
    let rule = "####################";

    [
        String::new(),
        String::new(),
        rule.to_string(),
        format!("# Instance {} Configuration", id),
        rule.to_string(),
        format!("INSTANCE_ID={}", id),
        format!("DOCKER_NETWORK={}", resources.docker_network),
        format!("INSTANCE_NAME={}", id.registry_key()),
        String::new(),
        "# External connection information".to_string(),
        "# Use these values to connect from external services:".to_string(),
        format!(
            "# DATABASE_URL={}",
            resources.postgres_url(&secrets.postgres_password)
        ),
        format!("# SUPABASE_URL={}", resources.supabase_url()),
        format!("# SUPABASE_ANON_KEY={}", secrets.anon_key),
        format!("# SUPABASE_SERVICE_KEY={}", secrets.service_role_key),
        String::new(),
    ]
    .join("\n")
}

fn resolve(value: EnvValue, resources: &ResourceSet, secrets: &SecretBundle) -> String {
    match value {
        EnvValue::PostgresPassword => secrets.postgres_password.clone(),
        EnvValue::JwtSecret => secrets.jwt_secret.clone(),
        EnvValue::DashboardPassword => secrets.dashboard_password.clone(),
        EnvValue::SecretKeyBase => secrets.secret_key_base.clone(),
        EnvValue::VaultEncKey => secrets.vault_enc_key.clone(),
        EnvValue::AnonKey => secrets.anon_key.clone(),
        EnvValue::ServiceRoleKey => secrets.service_role_key.clone(),
        EnvValue::DatabaseName => resources.database_name.clone(),
        EnvValue::PostgresPort => resources.ports.postgres.to_string(),
        EnvValue::KongHttpPort => resources.ports.kong_http.to_string(),
        EnvValue::KongHttpsPort => resources.ports.kong_https.to_string(),
        EnvValue::StudioPort => resources.ports.studio.to_string(),
        EnvValue::PoolerPort => resources.ports.pooler.to_string(),
        EnvValue::SupabaseUrl => resources.supabase_url(),
        EnvValue::LogflarePublicToken => secrets.logflare_public_token.clone(),
        EnvValue::LogflarePrivateToken => secrets.logflare_private_token.clone(),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
