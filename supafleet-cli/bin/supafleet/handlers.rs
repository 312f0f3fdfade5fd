use std::path::{Path, PathBuf};

use anyhow::Context;
use supafleet_cli::{AnsiStyles, ListFormat, SupafleetArgs, SupafleetCliError, SupafleetCliResult};
use supafleet_core::{
    config::InstanceId,
    management::{DecommissionReport, InstanceManager, InstanceSummary},
    models::{ConnectionExport, ExportFormat, InstanceMetadata, InstanceStatus},
    SupafleetError,
};
use supafleet_utils::{CHECKMARK, CROSSMARK, WARNMARK};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const DEFAULT_LOG_LEVEL: &str = "warn";

const DELETE_CONFIRMATION: &str = "DELETE";

const TABLE_HEADERS: [&str; 6] = ["ID", "NAME", "STATUS", "URL", "POSTGRES", "FOLDER"];

/// Appended to the status of instances whose configuration files are stale.
const STALE_MARKER: &str = "*";

//--------------------------------------------------------------------------------------------------
// Functions: Handlers
//--------------------------------------------------------------------------------------------------

/// Installs the tracing subscriber. `RUST_LOG` wins over the level flags.
pub fn init_tracing(args: &SupafleetArgs) {
    let level = args.log_level().unwrap_or(DEFAULT_LOG_LEVEL);
    let filter = match (args.log_level(), EnvFilter::try_from_default_env()) {
        (None, Ok(filter)) => filter,
        _ => EnvFilter::new(format!("supafleet_core={},supafleet={}", level, level)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub async fn setup_subcommand(
    manager: &InstanceManager,
    instances: Vec<i64>,
    name: Option<String>,
    description: Option<String>,
    tags: Vec<String>,
) -> SupafleetCliResult<()> {
    let ids = parse_ids(&instances)?;
    let metadata = InstanceMetadata {
        name,
        description,
        tags,
    };

    let outcomes = manager.provision_many(&ids, &metadata).await;

    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(record) => println!(
                "{} Instance {} ready: {} (postgres on port {}) in {}",
                &*CHECKMARK,
                record.instance_id,
                record.supabase_url.literal(),
                record.postgres_port,
                record.path.display()
            ),
            Err(e) => {
                failed += 1;
                println!(
                    "{} Instance {}: {}",
                    &*CROSSMARK,
                    outcome.instance_id,
                    e.to_string().error()
                );
            }
        }
    }

    if failed > 0 {
        return Err(SupafleetCliError::Failed(format!(
            "{} of {} instance(s) could not be provisioned",
            failed,
            outcomes.len()
        )));
    }

    println!(
        "Start an instance with {}",
        "docker compose up -d".literal()
    );
    Ok(())
}

pub async fn list_subcommand(
    manager: &InstanceManager,
    format: ListFormat,
) -> SupafleetCliResult<()> {
    let summaries = manager.list().await?;

    match format {
        ListFormat::Json => println!("{}", serde_json::to_string_pretty(&summaries)?),
        ListFormat::Yaml => print!("{}", serde_yaml::to_string(&summaries)?),
        ListFormat::Table if summaries.is_empty() => {
            println!(
                "{} No instances registered in {}",
                &*WARNMARK,
                manager.get_config().get_base_dir().display()
            );
        }
        ListFormat::Table => {
            print!("{}", render_table(&summaries));
            println!("{} {} instance(s)", &*CHECKMARK, summaries.len());

            let stale: Vec<InstanceId> = summaries
                .iter()
                .filter(|summary| summary.config_stale)
                .map(|summary| summary.instance_id)
                .collect();
            if !stale.is_empty() {
                println!(
                    "{} {} marks repaired ports that the instance files do not bind yet; run:",
                    &*WARNMARK, STALE_MARKER
                );
                for id in stale {
                    println!("  {}", update_env_hint(id).literal());
                }
            }
        }
    }

    Ok(())
}

pub async fn info_subcommand(
    manager: &InstanceManager,
    instance: Option<i64>,
    format: ExportFormat,
    output: Option<PathBuf>,
) -> SupafleetCliResult<()> {
    let id = instance.map(InstanceId::new).transpose()?;

    let Some(export) = manager.export_connection_info(id).await? else {
        return Err(not_found(id));
    };

    let stale: Vec<InstanceId> = match &export {
        ConnectionExport::Single(info) if info.config_stale => vec![info.instance_id],
        ConnectionExport::Single(_) => Vec::new(),
        ConnectionExport::All(infos) => infos
            .values()
            .filter(|info| info.config_stale)
            .map(|info| info.instance_id)
            .collect(),
    };
    for id in stale {
        eprintln!(
            "{} Instance {} has stale configuration files; run {}",
            &*WARNMARK,
            id,
            update_env_hint(id).literal()
        );
    }

    let rendered = export.render(format)?;
    emit(&rendered, output.as_deref(), "Connection info").await
}

pub async fn update_subcommand(
    manager: &InstanceManager,
    id: i64,
    name: String,
    description: Option<String>,
) -> SupafleetCliResult<()> {
    let id = InstanceId::new(id)?;

    if !manager
        .update_metadata(id, &name, description.as_deref())
        .await?
    {
        return Err(SupafleetError::NotFound(id).into());
    }

    println!("{} Instance {} renamed to {}", &*CHECKMARK, id, name.literal());
    Ok(())
}

pub async fn template_subcommand(
    manager: &InstanceManager,
    id: i64,
    service: String,
    output: Option<PathBuf>,
) -> SupafleetCliResult<()> {
    let id = InstanceId::new(id)?;
    let template = manager.external_service_template(id, &service).await?;
    emit(&template, output.as_deref(), "Compose template").await
}

pub async fn status_subcommand(
    manager: &InstanceManager,
    instance: Option<i64>,
) -> SupafleetCliResult<()> {
    if let Some(raw) = instance {
        let id = InstanceId::new(raw)?;
        let status = manager.query_status(id).await?;
        println!("{} Instance {}: {}", &*CHECKMARK, id, paint_status(status));
        return Ok(());
    }

    let summaries = manager.list().await?;
    if summaries.is_empty() {
        println!("{} No instances registered", &*WARNMARK);
        return Ok(());
    }

    for summary in &summaries {
        println!(
            "{} Instance {} ({}): {}",
            &*CHECKMARK,
            summary.instance_id,
            summary.name,
            paint_status(summary.status)
        );
    }

    Ok(())
}

pub async fn delete_subcommand(
    manager: &InstanceManager,
    id: i64,
    remove_files: bool,
    yes: bool,
) -> SupafleetCliResult<()> {
    let id = InstanceId::new(id)?;

    if !yes && !confirm_delete(id, remove_files).await? {
        println!("{} Deletion of instance {} cancelled", &*WARNMARK, id);
        return Ok(());
    }

    let report = manager.decommission(id, remove_files).await?;
    print_report(id, &report);

    if !report.is_clean() {
        return Err(SupafleetCliError::Failed(format!(
            "instance {} was decommissioned with {} failed step(s)",
            id,
            report.failures.len()
        )));
    }

    println!("{} Instance {} deleted", &*CHECKMARK, id);
    Ok(())
}

pub async fn update_env_subcommand(
    manager: &InstanceManager,
    instance: i64,
) -> SupafleetCliResult<()> {
    let id = InstanceId::new(instance)?;
    let record = manager.regenerate_config(id).await?;

    println!(
        "{} Regenerated secrets of instance {} in {}",
        &*CHECKMARK,
        id,
        record.path.display()
    );
    println!(
        "{} Restart the instance with {} to apply them",
        &*WARNMARK,
        "docker compose down && docker compose up -d".literal()
    );
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn update_env_hint(id: InstanceId) -> String {
    format!("supafleet update-env --instance {}", id)
}

fn parse_ids(raw: &[i64]) -> SupafleetCliResult<Vec<InstanceId>> {
    let mut ids = Vec::with_capacity(raw.len());
    for value in raw {
        let id = InstanceId::new(*value)?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    Ok(ids)
}

fn not_found(id: Option<InstanceId>) -> SupafleetCliError {
    match id {
        Some(id) => SupafleetError::NotFound(id).into(),
        None => SupafleetCliError::Failed("no instances registered".to_string()),
    }
}

/// Prints `text`, or writes it to `output`.
async fn emit(text: &str, output: Option<&Path>, what: &str) -> SupafleetCliResult<()> {
    match output {
        Some(path) => {
            tokio::fs::write(path, text)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("{} {} written to {}", &*CHECKMARK, what, path.display());
        }
        None => {
            print!("{}", text);
            if !text.ends_with('\n') {
                println!();
            }
        }
    }

    Ok(())
}

async fn confirm_delete(id: InstanceId, remove_files: bool) -> SupafleetCliResult<bool> {
    let warning = if remove_files {
        format!(
            "This stops instance {}, removes its containers, volumes and network, and deletes its files.",
            id
        )
    } else {
        format!(
            "This stops instance {}, removes its containers, volumes and network.",
            id
        )
    };

    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(
            format!(
                "{} {}\nType {} to confirm: ",
                &*WARNMARK,
                warning,
                DELETE_CONFIRMATION.literal()
            )
            .as_bytes(),
        )
        .await?;
    stdout.flush().await?;

    let mut answer = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut answer)
        .await?;

    Ok(answer.trim() == DELETE_CONFIRMATION)
}

fn print_report(id: InstanceId, report: &DecommissionReport) {
    for container in &report.removed_containers {
        println!("{} Removed container {}", &*CHECKMARK, container);
    }

    for network in &report.removed_networks {
        println!("{} Removed network {}", &*CHECKMARK, network);
    }

    if report.unregistered {
        println!("{} Instance {} unregistered", &*CHECKMARK, id);
    }

    if let Some(path) = &report.removed_path {
        println!("{} Removed {}", &*CHECKMARK, path.display());
    }

    for failure in &report.failures {
        println!(
            "{} {}: {}",
            &*CROSSMARK,
            failure.step,
            failure.message.error()
        );
    }
}

fn paint_status(status: InstanceStatus) -> String {
    let style = match status {
        InstanceStatus::Running => console::style(status.as_str()).green(),
        InstanceStatus::Stopped => console::style(status.as_str()).yellow(),
        InstanceStatus::Configured => console::style(status.as_str()).cyan(),
        InstanceStatus::Unknown => console::style(status.as_str()).red(),
    };
    style.to_string()
}

/// Renders summaries as left aligned columns.
fn render_table(summaries: &[InstanceSummary]) -> String {
    let rows: Vec<[String; 6]> = summaries
        .iter()
        .map(|summary| {
            [
                summary.instance_id.to_string(),
                summary.name.clone(),
                if summary.config_stale {
                    format!("{}{}", summary.status.as_str(), STALE_MARKER)
                } else {
                    summary.status.as_str().to_string()
                },
                summary.supabase_url.clone(),
                summary.postgres_port.to_string(),
                summary.folder_name.clone(),
            ]
        })
        .collect();

    let mut widths = TABLE_HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_row = |cells: &[String]| {
        let line = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect::<Vec<_>>()
            .join("  ");
        format!("{}\n", line.trim_end())
    };

    let headers = TABLE_HEADERS.map(String::from);
    let mut table = format_row(&headers);
    for row in &rows {
        table.push_str(&format_row(row));
    }

    table
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(raw: i64, name: &str, status: InstanceStatus) -> InstanceSummary {
        let id = InstanceId::new(raw).unwrap();
        InstanceSummary {
            instance_id: id,
            name: name.to_string(),
            description: String::new(),
            tags: vec![],
            status,
            folder_name: id.registry_key(),
            docker_network: format!("supabase-instance{}-network", id),
            supabase_url: format!("http://localhost:{}", 20000 + raw * 10),
            postgres_port: (20000 + raw * 10 + 2) as u16,
            created_at: None,
            config_stale: false,
        }
    }

    #[test]
    fn test_render_table() {
        let table = render_table(&[
            summary(1, "Shop", InstanceStatus::Running),
            summary(12, "Analytics warehouse", InstanceStatus::Configured),
        ]);

        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ID  NAME                 STATUS"));
        assert!(lines[1].starts_with("1   Shop                 running"));
        assert!(lines[2].contains("http://localhost:20120"));
        assert!(lines[2].ends_with("instance12"));
    }

    #[test]
    fn test_render_table_marks_stale_config() {
        let mut stale = summary(3, "Legacy", InstanceStatus::Stopped);
        stale.config_stale = true;
        let table = render_table(&[stale, summary(4, "Fresh", InstanceStatus::Stopped)]);

        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[1].contains("stopped*"));
        assert!(!lines[2].contains("stopped*"));
        assert_eq!(
            update_env_hint(InstanceId::new(3).unwrap()),
            "supafleet update-env --instance 3"
        );
    }

    #[test]
    fn test_parse_ids_deduplicates_and_validates() {
        let ids = parse_ids(&[2, 1, 2]).unwrap();
        assert_eq!(
            ids,
            vec![InstanceId::new(2).unwrap(), InstanceId::new(1).unwrap()]
        );

        assert!(matches!(
            parse_ids(&[1, 0]),
            Err(SupafleetCliError::Supafleet(SupafleetError::InvalidArgument(_)))
        ));
    }

    #[tokio::test]
    async fn test_emit_writes_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("info.json");

        emit("{}", Some(&path), "Connection info").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");

        let missing = dir.path().join("missing/info.json");
        assert!(matches!(
            emit("{}", Some(&missing), "Connection info").await,
            Err(SupafleetCliError::Custom(_))
        ));
    }
}
