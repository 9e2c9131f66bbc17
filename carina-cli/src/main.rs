use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use carina_core::provider::Provider;
use carina_core::resource::ResourceId;
use carina_provider_msgraph::MsGraphConfig;
use carina_provider_msgraph::MsGraphProvider;
use carina_provider_msgraph::resources::authentication_strength_policy::RESOURCE_TYPE;

mod commands;
mod state;

use state::StateFile;

#[derive(Parser)]
#[command(name = "carina-msgraph")]
#[command(about = "Manage Microsoft Graph authentication strength policies", long_about = None)]
struct Cli {
    #[command(flatten)]
    graph: GraphArgs,

    /// Path to the state file
    #[arg(long, global = true, env = "CARINA_STATE", default_value = StateFile::DEFAULT_PATH)]
    state: PathBuf,

    /// Resource type to operate on
    #[arg(long = "type", global = true, default_value = RESOURCE_TYPE)]
    resource_type: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GraphArgs {
    /// Microsoft Graph endpoint
    #[arg(long, global = true, env = "MSGRAPH_ENDPOINT")]
    endpoint: Option<String>,

    /// Graph API version segment
    #[arg(long, global = true, env = "MSGRAPH_API_VERSION")]
    api_version: Option<String>,

    /// Tenant to scope tenant-bound requests to
    #[arg(long, global = true, env = "MSGRAPH_TENANT_ID")]
    tenant_id: Option<String>,

    /// Bearer token for Graph requests
    #[arg(long, global = true, env = "MSGRAPH_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a resource from a JSON file of desired attributes
    Create {
        /// Local resource name
        name: String,

        /// JSON object with the desired attributes
        #[arg(long, short)]
        file: PathBuf,
    },
    /// Refresh a resource from the remote system
    Refresh {
        /// Local resource name
        name: String,
    },
    /// Apply changed attributes, replacing the resource if required
    Update {
        /// Local resource name
        name: String,

        /// JSON object with the desired attributes
        #[arg(long, short)]
        file: PathBuf,
    },
    /// Delete a resource and wait until it is gone
    Delete {
        /// Local resource name
        name: String,
    },
    /// Bring an existing remote object under management
    Import {
        /// Local resource name
        name: String,

        /// Remote object ID
        identifier: String,
    },
    /// Show resources recorded in the state file
    Show,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = run(cli).await;

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let id = |name: &str| ResourceId::new(cli.resource_type.clone(), name);

    if let Commands::Show = cli.command {
        return commands::run_show(&cli.state);
    }

    let provider = get_provider(&cli.graph)?;
    let provider: &dyn Provider = &provider;

    match &cli.command {
        Commands::Create { name, file } => {
            commands::run_create(provider, &cli.state, &id(name), file).await
        }
        Commands::Refresh { name } => commands::run_refresh(provider, &cli.state, &id(name)).await,
        Commands::Update { name, file } => {
            commands::run_update(provider, &cli.state, &id(name), file).await
        }
        Commands::Delete { name } => commands::run_delete(provider, &cli.state, &id(name)).await,
        Commands::Import { name, identifier } => {
            commands::run_import(provider, &cli.state, &id(name), identifier).await
        }
        Commands::Show => commands::run_show(&cli.state),
    }
}

/// Build the provider from environment defaults overlaid with flags
fn get_provider(args: &GraphArgs) -> Result<MsGraphProvider, String> {
    let mut config = MsGraphConfig::from_env().map_err(|e| e.to_string())?;
    if let Some(endpoint) = &args.endpoint {
        config = config.with_endpoint(endpoint);
    }
    if let Some(version) = &args.api_version {
        config = config.with_api_version(version);
    }
    if let Some(tenant) = &args.tenant_id {
        config = config.with_tenant_id(tenant);
    }
    if let Some(token) = &args.access_token {
        config = config.with_access_token(token);
    }
    log::debug!("Using Microsoft Graph configuration {:?}", config);

    MsGraphProvider::new(&config).map_err(|e| e.to_string())
}
