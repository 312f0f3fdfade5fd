//! Per-instance customization of the upstream `docker-compose.yml`, and compose files for
//! services that join an instance from outside.
//!
//! The upstream file hard-codes its project name and container names, so two instances started
//! from unmodified copies would fight over the same containers. Customization gives every
//! instance its own project name, its own container names and an external default network.

use std::collections::BTreeMap;

use regex::{Captures, Regex};
use serde::Serialize;

use crate::{
    config::ResourceSet,
    models::{ConnectionInfo, InstanceRecord},
    SupafleetError, SupafleetResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ComposeFile {
    services: BTreeMap<String, ComposeService>,
    networks: BTreeMap<String, ExternalNetwork>,
}

#[derive(Debug, Serialize)]
struct ComposeService {
    image: String,
    environment: Vec<String>,
    networks: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ExternalNetwork {
    external: bool,
    name: String,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Rewrites an upstream compose file for one instance. Applying it twice yields the same text.
pub fn customize_compose(compose: &str, resources: &ResourceSet) -> SupafleetResult<String> {
    let id = resources.instance_id;
    let project = format!("supabase-instance{}", id);

    let name_re = Regex::new(r"(?m)^name:[ \t]*supabase.*$")?;
    let text = name_re.replace_all(compose, format!("name: {}", project).as_str());

    let container_re =
        Regex::new(r"(?m)^([ \t]*container_name:[ \t]*)(?:realtime-dev\.)?supabase-([\w.-]+)[ \t]*$")?;
    let own_prefix = format!("instance{}-", id);
    let text = container_re.replace_all(&text, |caps: &Captures| {
        let service = &caps[2];
        if service.starts_with(&own_prefix) {
            caps[0].to_string()
        } else {
            format!("{}{}-{}", &caps[1], project, service)
        }
    });

    Ok(replace_networks_section(&text, &resources.docker_network))
}

/// A compose file for an external service attached to an instance's network, with the
/// instance's connection values in its environment.
pub fn external_service_template(record: &InstanceRecord, service: &str) -> SupafleetResult<String> {
    let service_re = Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]*$")?;
    if !service_re.is_match(service) {
        return Err(SupafleetError::InvalidArgument(format!(
            "invalid service name: {:?}",
            service
        )));
    }

    let info = ConnectionInfo::from_record(record);
    let network = record.docker_network.clone();

    let mut services = BTreeMap::new();
    services.insert(
        service.to_string(),
        ComposeService {
            image: "your-service-image:latest".to_string(),
            environment: vec![
                format!("DATABASE_URL={}", info.database_url),
                format!("SUPABASE_URL={}", info.supabase_url),
                format!("SUPABASE_ANON_KEY={}", info.supabase_anon_key),
                format!("SUPABASE_SERVICE_KEY={}", info.supabase_service_key),
            ],
            networks: vec![network.clone()],
        },
    );

    let mut networks = BTreeMap::new();
    networks.insert(
        network.clone(),
        ExternalNetwork {
            external: true,
            name: network,
        },
    );

    Ok(serde_yaml::to_string(&ComposeFile { services, networks })?)
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

/// Replaces the top-level `networks:` block, or appends one when there is none.
fn replace_networks_section(text: &str, network: &str) -> String {
    let section = [
        "networks:".to_string(),
        "  default:".to_string(),
        format!("    name: {}", network),
        "    external: true".to_string(),
    ];

    let mut out: Vec<String> = Vec::new();
    let mut pending_blank: Vec<String> = Vec::new();
    let mut in_section = false;
    let mut replaced = false;

    for line in text.lines() {
        if in_section {
            if line.trim().is_empty() {
                pending_blank.push(line.to_string());
                continue;
            }
            if line.starts_with(char::is_whitespace) {
                pending_blank.clear();
                continue;
            }
            in_section = false;
            out.append(&mut pending_blank);
        }

        if !replaced && line.starts_with("networks:") {
            out.extend(section.iter().cloned());
            in_section = true;
            replaced = true;
            continue;
        }

        out.push(line.to_string());
    }
    out.append(&mut pending_blank);

    if !replaced {
        if out.last().is_some_and(|line| !line.trim().is_empty()) {
            out.push(String::new());
        }
        out.extend(section.iter().cloned());
    }

    let mut result = out.join("\n");
    result.push('\n');
    result
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::{
        config,
        models::{InstanceMetadata, SecretBundle},
    };

    const UPSTREAM: &str = "\
# Usage
name: supabase

services:

  studio:
    container_name: supabase-studio
    image: supabase/studio:latest

  realtime:
    container_name: realtime-dev.supabase-realtime
    image: supabase/realtime:latest

  edge:
    container_name: supabase-edge-functions

networks:
  supabase_network:
    driver: bridge

volumes:
  db-config:
";

    #[test]
    fn test_customize_compose() {
        let resources = config::try_allocate(5).unwrap();
        let text = customize_compose(UPSTREAM, &resources).unwrap();

        assert!(text.contains("\nname: supabase-instance5\n"));
        assert!(text.contains("container_name: supabase-instance5-studio\n"));
        assert!(text.contains("container_name: supabase-instance5-realtime\n"));
        assert!(text.contains("container_name: supabase-instance5-edge-functions\n"));
        assert!(text.contains(
            "networks:\n  default:\n    name: supabase-instance5-network\n    external: true\n\nvolumes:\n  db-config:\n"
        ));
        assert!(!text.contains("supabase_network"));
        assert!(text.starts_with("# Usage\n"));
    }

    #[test]
    fn test_customize_compose_is_idempotent() {
        let resources = config::try_allocate(12).unwrap();
        let once = customize_compose(UPSTREAM, &resources).unwrap();
        let twice = customize_compose(&once, &resources).unwrap();

        assert_eq!(once, twice);
        assert!(!twice.contains("instance12-instance12"));
    }

    #[test]
    fn test_customize_compose_appends_missing_networks() {
        let resources = config::try_allocate(1).unwrap();
        let text = customize_compose("services:\n  db:\n    image: postgres\n", &resources).unwrap();

        assert!(text.ends_with(
            "image: postgres\n\nnetworks:\n  default:\n    name: supabase-instance1-network\n    external: true\n"
        ));
    }

    #[test]
    fn test_external_service_template() {
        let resources = config::try_allocate(2).unwrap();
        let record = InstanceRecord::new(
            &resources,
            &InstanceMetadata::default(),
            "instance2".to_string(),
            PathBuf::from("/srv/instance2"),
            SecretBundle {
                postgres_password: "pw".to_string(),
                anon_key: "anon".to_string(),
                ..Default::default()
            },
        );

        let yaml = external_service_template(&record, "worker").unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();

        let env = &parsed["services"]["worker"]["environment"];
        assert_eq!(
            env[0].as_str().unwrap(),
            "DATABASE_URL=postgresql://postgres:pw@localhost:20022/postgres"
        );
        assert_eq!(env[2].as_str().unwrap(), "SUPABASE_ANON_KEY=anon");
        assert_eq!(
            parsed["networks"]["supabase-instance2-network"]["external"].as_bool(),
            Some(true)
        );

        assert!(external_service_template(&record, "bad name").is_err());
        assert!(external_service_template(&record, "").is_err());
    }
}
