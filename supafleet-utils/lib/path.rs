//! File and directory names used inside the base folder and each instance directory.

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Registry file stored directly in the base folder.
pub const REGISTRY_FILENAME: &str = "instance_registry.json";

/// Suffix of the copy kept from the previous registry on every save.
pub const REGISTRY_BACKUP_SUFFIX: &str = "backup";

/// Suffix of the scratch file written before it is renamed over the registry.
pub const REGISTRY_TMP_SUFFIX: &str = "tmp";

/// Prefix of the suffix given to an unparsable registry set aside on load.
pub const REGISTRY_CORRUPT_SUFFIX: &str = "corrupt";

/// Directory, inside an instance directory, holding the checked out template repository.
pub const TEMPLATE_CHECKOUT_SUBDIR: &str = "supabase";

/// Directory, inside the template checkout, holding the compose deployment.
pub const COMPOSE_SUBDIR: &str = "docker";

/// Environment template shipped with the deployment.
pub const ENV_TEMPLATE_FILENAME: &str = ".env.example";

/// Materialized environment file.
pub const ENV_FILENAME: &str = ".env";

/// Compose definition of the deployment.
pub const COMPOSE_FILENAME: &str = "docker-compose.yml";

/// Registry key and folder prefix for instances.
pub const INSTANCE_PREFIX: &str = "instance";
