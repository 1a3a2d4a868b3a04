//! TSW CLI - manage bare metal services from the command line.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tsw::{
    CancellationToken, Client, CreateMetalRequest, CreateSshKeyRequest, ListMetalOptions,
    MetalTierType, PowerCommand, ReinstallMetalRequest, Status,
};

/// TSW CLI - bare metal provisioning.
#[derive(Parser)]
#[command(name = "tsw")]
#[command(about = "Provision and manage TSW bare metal services")]
struct Cli {
    /// API key (or set `TSW_API_KEY` env var).
    #[arg(long, env = "TSW_API_KEY", hide_env_values = true)]
    api_key: String,

    /// API base URL (or set `TSW_BASE_URL` env var).
    #[arg(long, env = "TSW_BASE_URL")]
    base_url: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Capture JSON and text bodies in request logs.
    #[arg(long, default_value = "false")]
    log_bodies: bool,

    /// Dump raw HTTP traffic to stderr.
    #[arg(long, default_value = "false")]
    trace_http: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all regions.
    Regions,

    /// List all installable images.
    Images,

    /// Manage SSH keys.
    #[command(subcommand)]
    SshKey(SshKeyCommands),

    /// Manage metal services.
    #[command(subcommand)]
    Metal(MetalCommands),
}

#[derive(Subcommand)]
enum SshKeyCommands {
    /// List SSH keys.
    List,

    /// Get details of an SSH key.
    Get {
        /// Key ID.
        #[arg(long)]
        id: i64,
    },

    /// Register a new SSH key.
    Create {
        /// Project ID (or set `TSW_PROJECT_ID` env var).
        #[arg(long, env = "TSW_PROJECT_ID")]
        project_id: i64,

        /// Display name.
        #[arg(long)]
        name: String,

        /// Path to the public key file.
        #[arg(long)]
        key_file: PathBuf,
    },
}

#[derive(Subcommand)]
enum MetalCommands {
    /// List metal services.
    List {
        #[arg(long, default_value = "0")]
        skip: u32,

        #[arg(long, default_value = "0")]
        limit: u32,

        #[arg(long, value_enum)]
        status: Option<StatusArg>,

        /// Region (e.g., LAX1).
        #[arg(long)]
        region: Option<String>,

        #[arg(long)]
        tier: Option<String>,

        #[arg(long)]
        tag: Option<String>,

        #[arg(long, env = "TSW_PROJECT_ID")]
        project_id: Option<i64>,

        #[arg(long, value_enum)]
        tier_type: Option<TierTypeArg>,
    },

    /// Get details of a metal service.
    Get {
        /// Service ID.
        #[arg(long)]
        id: i64,
    },

    /// Order a new metal service.
    Create {
        /// Project ID (or set `TSW_PROJECT_ID` env var).
        #[arg(long, env = "TSW_PROJECT_ID")]
        project_id: i64,

        /// JSON file with the order.
        #[arg(long)]
        file: PathBuf,
    },

    /// Reinstall a metal service.
    Reinstall {
        /// Service ID.
        #[arg(long)]
        id: i64,

        /// JSON file with the reinstall request.
        #[arg(long)]
        file: PathBuf,
    },

    /// Power a metal service on or off.
    Power {
        /// Service ID.
        #[arg(long)]
        id: i64,

        #[arg(value_enum)]
        state: PowerArg,
    },

    /// Show the log of a metal service.
    Logs {
        /// Service ID.
        #[arg(long)]
        id: i64,

        /// Write the raw response body to stdout.
        #[arg(long, default_value = "false")]
        raw: bool,
    },

    /// List hardware tiers.
    Tiers {
        #[arg(long, value_enum)]
        tier_type: Option<TierTypeArg>,
    },

    /// Show configurations available in a region.
    Availability {
        /// Project ID (or set `TSW_PROJECT_ID` env var).
        #[arg(long, env = "TSW_PROJECT_ID")]
        project_id: i64,

        /// Region (e.g., LAX1).
        #[arg(long)]
        region: String,
    },

    /// Rename a metal service.
    Rename {
        /// Service ID.
        #[arg(long)]
        id: i64,

        /// New display name.
        #[arg(long)]
        name: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Pending,
    Active,
    Suspended,
    Terminated,
    Error,
}

impl From<StatusArg> for Status {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pending => Self::Pending,
            StatusArg::Active => Self::Active,
            StatusArg::Suspended => Self::Suspended,
            StatusArg::Terminated => Self::Terminated,
            StatusArg::Error => Self::Error,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum TierTypeArg {
    Compute,
    Gpu,
}

impl From<TierTypeArg> for MetalTierType {
    fn from(arg: TierTypeArg) -> Self {
        match arg {
            TierTypeArg::Compute => Self::Compute,
            TierTypeArg::Gpu => Self::Gpu,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PowerArg {
    On,
    Off,
}

impl From<PowerArg> for PowerCommand {
    fn from(arg: PowerArg) -> Self {
        match arg {
            PowerArg::On => Self::PowerOn,
            PowerArg::Off => Self::PowerOff,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let client = build_client(&cli)?;

    // Ctrl-C aborts the in-flight request
    let ctx = CancellationToken::new();
    let token = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling request");
            token.cancel();
        }
    });

    match cli.command {
        Commands::Regions => {
            let regions = client.list_regions(&ctx).await?;
            println!("\n{:<10} {:<30} {:<20}", "ID", "NAME", "LOCATION");
            println!("{}", "-".repeat(62));
            for region in regions {
                println!(
                    "{:<10} {:<30} {:<20}",
                    region.id,
                    region.display_name,
                    region.location.unwrap_or_default()
                );
            }
        }

        Commands::Images => {
            let images = client.list_images(&ctx).await?;
            println!("\n{:<30} {:<30} {:<10}", "ID", "OS", "VERSION");
            println!("{}", "-".repeat(72));
            for image in images {
                println!(
                    "{:<30} {:<30} {:<10}",
                    image.id, image.operating_system_name, image.operating_system_version
                );
            }
        }

        Commands::SshKey(command) => run_ssh_key(&client, &ctx, command).await?,
        Commands::Metal(command) => run_metal(&client, &ctx, command).await?,
    }

    Ok(())
}

fn build_client(cli: &Cli) -> Result<Client> {
    let mut builder = Client::builder()
        .authorization(cli.api_key.trim().trim_matches('\''))
        .log_bodies(cli.log_bodies);
    if let Some(base_url) = &cli.base_url {
        builder = builder.base_url(base_url);
    }
    if cli.trace_http {
        builder = builder.plain_logger(std::io::stderr());
    }
    builder.build().context("Failed to create TSW client")
}

async fn run_ssh_key(client: &Client, ctx: &CancellationToken, command: SshKeyCommands) -> Result<()> {
    match command {
        SshKeyCommands::List => {
            let keys = client.list_ssh_keys(ctx).await?;
            println!("\n{:<10} {:<10} {:<30}", "ID", "PROJECT", "NAME");
            println!("{}", "-".repeat(52));
            for key in keys {
                println!("{:<10} {:<10} {:<30}", key.id, key.project_id, key.display_name);
            }
        }

        SshKeyCommands::Get { id } => {
            let key = client.get_ssh_key(ctx, id).await?;
            print_json(&key)?;
        }

        SshKeyCommands::Create {
            project_id,
            name,
            key_file,
        } => {
            let key = std::fs::read_to_string(&key_file)
                .with_context(|| format!("Failed to read {}", key_file.display()))?;
            let created = client
                .create_ssh_key(
                    ctx,
                    project_id,
                    CreateSshKeyRequest {
                        display_name: name,
                        project_id,
                        key: key.trim().to_string(),
                    },
                )
                .await?;
            println!("\n✅ SSH key created: {}", created.id);
        }
    }
    Ok(())
}

async fn run_metal(client: &Client, ctx: &CancellationToken, command: MetalCommands) -> Result<()> {
    match command {
        MetalCommands::List {
            skip,
            limit,
            status,
            region,
            tier,
            tag,
            project_id,
            tier_type,
        } => {
            let opts = ListMetalOptions {
                skip,
                limit,
                status: status.map(Into::into),
                region,
                tier,
                tag,
                project_id,
                tier_type: tier_type.map(Into::into),
            };
            let response = client.list_metal(ctx, &opts).await?;
            println!(
                "\n{:<10} {:<24} {:<8} {:<12} {:<10} {:<16}",
                "ID", "NAME", "REGION", "STATUS", "POWER", "IP"
            );
            println!("{}", "-".repeat(84));
            for metal in response.result.unwrap_or_default() {
                let ip = metal
                    .ip_addresses
                    .first()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                println!(
                    "{:<10} {:<24} {:<8} {:<12} {:<10} {:<16}",
                    metal.id,
                    metal.display_name,
                    metal.region_id,
                    metal.status,
                    metal.power_state.to_string(),
                    ip
                );
            }
            println!("\nTotal: {}", response.metadata.total_count);
        }

        MetalCommands::Get { id } => {
            let metal = client.get_metal(ctx, id).await?.into_result()?;
            print_json(&metal)?;
        }

        MetalCommands::Create { project_id, file } => {
            let req: CreateMetalRequest = read_json(&file)?;
            let metal = client.create_metal(ctx, project_id, &req).await?.into_result()?;
            println!("\n✅ Metal service created!");
            println!("  ID:     {}", metal.id);
            println!("  Name:   {}", metal.display_name);
            println!("  Status: {}", metal.status);
        }

        MetalCommands::Reinstall { id, file } => {
            let req: ReinstallMetalRequest = read_json(&file)?;
            let metal = client.reinstall_metal(ctx, id, &req).await?.into_result()?;
            println!("\n✅ Reinstall started: {} ({})", metal.id, metal.status);
        }

        MetalCommands::Power { id, state } => {
            let command = PowerCommand::from(state);
            client.send_power_command(ctx, id, command).await?;
            println!("\n✅ {command} sent to {id}");
        }

        MetalCommands::Logs { id, raw } => {
            if raw {
                let mut stdout = tokio::io::stdout();
                client.copy_metal_logs(ctx, id, &mut stdout).await?;
                stdout.flush().await?;
            } else {
                let logs = client.get_metal_logs(ctx, id).await?;
                for line in logs.result.unwrap_or_default() {
                    println!("{} {}", line.timestamp, line.message);
                }
            }
        }

        MetalCommands::Tiers { tier_type } => {
            let tiers = client.list_metal_tiers(ctx, tier_type.map(Into::into)).await?;
            println!(
                "\n{:<16} {:<8} {:<32} {:>10}",
                "ID", "TYPE", "CPU", "MONTHLY"
            );
            println!("{}", "-".repeat(70));
            for tier in tiers.result.unwrap_or_default() {
                println!(
                    "{:<16} {:<8} {:<32} {:>10.2}",
                    tier.id,
                    tier.tier_type.as_str(),
                    tier.cpu,
                    tier.monthly_price
                );
            }
        }

        MetalCommands::Availability { project_id, region } => {
            info!("Checking availability in {region}");
            let configs = client.get_metal_availability(ctx, project_id, &region).await?;
            println!("\n{:<16} {:<10} {:<8}", "TIER", "MEMORY", "QTY");
            println!("{}", "-".repeat(36));
            for config in configs.result.unwrap_or_default() {
                println!(
                    "{:<16} {:<10} {:<8}",
                    config.tier.id,
                    format!("{}G", config.memory_gb),
                    config.quantity
                );
            }
        }

        MetalCommands::Rename { id, name } => {
            client.rename_metal(ctx, id, &name).await?;
            println!("\n✅ Renamed {id} to {name}");
        }
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
