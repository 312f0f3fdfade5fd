use std::{fmt, path::PathBuf, str::FromStr};

use clap::{Parser, Subcommand};
use supafleet_core::models::ExportFormat;

use crate::styles;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Provision and manage isolated Supabase instances on one host
#[derive(Debug, Parser)]
#[command(name = "supafleet", author, styles=styles::styles())]
pub struct SupafleetArgs {
    /// The subcommand to run
    #[command(subcommand)]
    pub subcommand: Option<SupafleetSubcommand>,

    /// Folder holding the registry and every instance directory [default: $SUPAFLEET_HOME or
    /// ~/projects/database]
    #[arg(long, global = true)]
    pub base_folder: Option<PathBuf>,

    /// Show version
    #[arg(short = 'V', long, global = true)]
    pub version: bool,

    /// Show verbose output, same as `--info`
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Show logs with error level
    #[arg(long, global = true)]
    pub error: bool,

    /// Show logs with warn level
    #[arg(long, global = true)]
    pub warn: bool,

    /// Show logs with info level
    #[arg(long, global = true)]
    pub info: bool,

    /// Show logs with debug level
    #[arg(long, global = true)]
    pub debug: bool,

    /// Show logs with trace level
    #[arg(long, global = true)]
    pub trace: bool,
}

/// Available subcommands for managing instances
#[derive(Debug, Subcommand)]
pub enum SupafleetSubcommand {
    /// Provision one or more instances
    #[command(name = "setup")]
    Setup {
        /// Instance ids to provision
        #[arg(short, long = "instances", required = true, num_args = 1..)]
        instances: Vec<i64>,

        /// Name of the instance. Ignored when several ids are given
        #[arg(short, long)]
        name: Option<String>,

        /// Description of the instances
        #[arg(short, long)]
        description: Option<String>,

        /// Tags of the instances
        #[arg(short, long, num_args = 1..)]
        tags: Vec<String>,
    },

    /// List registered instances with their live status
    #[command(name = "list")]
    List {
        /// Output format
        #[arg(short, long, default_value_t = ListFormat::Table)]
        format: ListFormat,
    },

    /// Export connection details
    #[command(name = "info")]
    Info {
        /// Instance id. Every instance when omitted
        #[arg(short, long)]
        instance: Option<i64>,

        /// Output format
        #[arg(short, long, default_value_t = ExportFormat::Json)]
        format: ExportFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Change the name or description of an instance
    #[command(name = "update")]
    Update {
        /// Instance id
        id: i64,

        /// New name
        #[arg(short, long, required = true)]
        name: String,

        /// New description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Print a compose file for a service that joins an instance's network
    #[command(name = "template")]
    Template {
        /// Instance id
        id: i64,

        /// Name of the external service
        service: String,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the live status of instances
    #[command(name = "status")]
    Status {
        /// Instance id. Every instance when omitted
        #[arg(short, long)]
        instance: Option<i64>,
    },

    /// Tear down an instance and unregister it
    #[command(name = "delete")]
    Delete {
        /// Instance id
        id: i64,

        /// Also delete the instance directory
        #[arg(long)]
        remove_files: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Generate new secrets and rewrite an instance's configuration
    #[command(name = "update-env")]
    UpdateEnv {
        /// Instance id
        #[arg(short, long, required = true)]
        instance: i64,
    },
}

/// Output format of `list`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListFormat {
    /// Aligned columns.
    #[default]
    Table,

    /// Pretty printed JSON.
    Json,

    /// YAML.
    Yaml,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SupafleetArgs {
    /// The log level selected by the flags, if any. The most verbose flag wins.
    pub fn log_level(&self) -> Option<&'static str> {
        if self.trace {
            Some("trace")
        } else if self.debug {
            Some("debug")
        } else if self.info || self.verbose {
            Some("info")
        } else if self.warn {
            Some("warn")
        } else if self.error {
            Some("error")
        } else {
            None
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl FromStr for ListFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(format!(
                "invalid list format: {}. Valid formats: table, json, yaml",
                s
            )),
        }
    }
}

impl fmt::Display for ListFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
            Self::Yaml => write!(f, "yaml"),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
