use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use cli::commands::{self, Target};
use router_core::config;
use router_core::pipeline;
use router_core::templates::TemplateResolver;
use router_core::Router;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let out = match cli.command {
        Commands::Templates { id } => {
            commands::templates(&TemplateResolver::builtin(), id.as_deref())?
        }
        Commands::Normalize { name } => commands::normalize(&name),
        Commands::Route { file, target, json } => {
            let router = open(config).await?;
            let descriptor = commands::load_file(&file).await?;
            commands::route(&router, &descriptor, &Target::try_from(target)?, json).await?
        }
        Commands::Report { record_id, path } => {
            commands::report(&open(config).await?, &record_id, &path).await?
        }
        Commands::Records { project, json } => {
            commands::records(&open(config).await?, &project, json).await?
        }
        Commands::Patterns { json } => commands::patterns(&open(config).await?, json).await?,
        Commands::Forget { signature } => {
            commands::forget(&open(config).await?, &signature).await?
        }
    };
    println!("{}", out.trim_end());
    Ok(())
}

async fn open(config_path: Option<&str>) -> Result<Router> {
    let cfg = config::load(config_path)?;
    pipeline::build_router(&cfg).await
}

#[derive(Parser)]
#[command(name = "docrouter")]
#[command(about = "Suggests where a document belongs in a project folder tree", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the built-in folder templates
    Templates {
        /// Only this template
        #[arg(long)]
        id: Option<String>,
    },
    /// Print the signature a file name normalizes to
    Normalize { name: String },
    /// Suggest a folder for a file and record the decision
    Route {
        file: PathBuf,
        #[command(flatten)]
        target: RouteTarget,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Report where a routed file was actually placed (e.g. "Amministrativo/Fatture")
    Report { record_id: String, path: String },
    /// List routing records of a project
    Records {
        #[arg(long)]
        project: String,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// List learned patterns
    Patterns {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a learned pattern
    Forget { signature: String },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct RouteTarget {
    /// Template id (BREVE, COMPLETO)
    #[arg(long)]
    template: Option<String>,
    /// Project id; the template comes from the [projects] config table
    #[arg(long)]
    project: Option<String>,
}

impl TryFrom<RouteTarget> for Target {
    type Error = anyhow::Error;

    fn try_from(t: RouteTarget) -> Result<Self> {
        match (t.template, t.project) {
            (Some(template), None) => Ok(Target::Template(template)),
            (None, Some(project)) => Ok(Target::Project(project)),
            _ => anyhow::bail!("pass exactly one of --template or --project"),
        }
    }
}
