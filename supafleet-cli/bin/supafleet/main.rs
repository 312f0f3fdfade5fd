#[path = "mod.rs"]
mod supafleet;

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use supafleet::handlers;
use supafleet_cli::{AnsiStyles, SupafleetArgs, SupafleetCliResult, SupafleetSubcommand};
use supafleet_core::{config::ManagerConfig, management::InstanceManager};
use supafleet_utils::CROSSMARK;

//--------------------------------------------------------------------------------------------------
// Functions: main
//--------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args = SupafleetArgs::parse();

    handlers::init_tracing(&args);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!("command failed: {:?}", e);
            eprintln!("{} {}", &*CROSSMARK, e.to_string().error());
            e.exit_code()
        }
    }
}

async fn run(args: SupafleetArgs) -> SupafleetCliResult<()> {
    // Print version if requested
    if args.version {
        println!("{}", format!("v{}", env!("CARGO_PKG_VERSION")).literal());
        return Ok(());
    }

    let Some(subcommand) = args.subcommand else {
        SupafleetArgs::command().print_help()?;
        return Ok(());
    };

    let manager = InstanceManager::with_defaults(ManagerConfig::new(args.base_folder));

    match subcommand {
        SupafleetSubcommand::Setup {
            instances,
            name,
            description,
            tags,
        } => {
            handlers::setup_subcommand(&manager, instances, name, description, tags).await?;
        }
        SupafleetSubcommand::List { format } => {
            handlers::list_subcommand(&manager, format).await?;
        }
        SupafleetSubcommand::Info {
            instance,
            format,
            output,
        } => {
            handlers::info_subcommand(&manager, instance, format, output).await?;
        }
        SupafleetSubcommand::Update {
            id,
            name,
            description,
        } => {
            handlers::update_subcommand(&manager, id, name, description).await?;
        }
        SupafleetSubcommand::Template {
            id,
            service,
            output,
        } => {
            handlers::template_subcommand(&manager, id, service, output).await?;
        }
        SupafleetSubcommand::Status { instance } => {
            handlers::status_subcommand(&manager, instance).await?;
        }
        SupafleetSubcommand::Delete {
            id,
            remove_files,
            yes,
        } => {
            handlers::delete_subcommand(&manager, id, remove_files, yes).await?;
        }
        SupafleetSubcommand::UpdateEnv { instance } => {
            handlers::update_env_subcommand(&manager, instance).await?;
        }
    }

    Ok(())
}
