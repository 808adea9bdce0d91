use std::path::{Path, PathBuf};
use std::sync::Arc;

use alloy_json_abi::JsonAbi;
use alloy_primitives::Address;
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use timelock_inspector::config::{self, Config};
use timelock_inspector::domain::classifier::{classify, scan_tree};
use timelock_inspector::domain::status::{
    derive_status, seconds_until_ready, Countdown, OperationStatus, OperationTimes,
};
use timelock_inspector::domain::{Clock, Network, SystemClock};
use timelock_inspector::infrastructure::abi::{
    AbiResolver, CalldataDecoder, DecodeRequest, FourByteDirectory, SignatureDirectory,
};
use timelock_inspector::infrastructure::ethereum::{AlloyRpcClient, RpcClient};
use timelock_inspector::infrastructure::explorer::BlockscoutExplorer;
use timelock_inspector::store::{InMemoryAbiStore, ManualAbiStore, SqliteAbiStore};

#[derive(Debug, Parser)]
#[command(
    name = "timelock-inspector",
    version,
    about = "Decode and classify TimelockController operations on Rootstock"
)]
struct Cli {
    /// Network to query (mainnet | testnet); defaults to the config value
    #[arg(long, global = true)]
    network: Option<Network>,

    /// Override the JSON-RPC endpoint
    #[arg(long, global = true)]
    rpc: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Decode calldata into a call tree
    Decode(DecodeArgs),
    /// Show which ABI source wins for an address
    Resolve {
        address: Address,
    },
    /// Flag a dangerous selector in calldata
    Classify {
        calldata: String,
    },
    /// Derive an operation's status from its timestamps
    Status(StatusArgs),
    /// Manage manual ABI overrides
    #[command(subcommand)]
    Abi(AbiCommand),
}

#[derive(Debug, Args)]
struct DecodeArgs {
    /// 0x-prefixed calldata
    calldata: String,

    /// Contract the calldata is sent to
    #[arg(long)]
    target: Option<Address>,

    /// JSON ABI file used instead of any lookup
    #[arg(long)]
    abi: Option<PathBuf>,

    #[arg(long)]
    max_depth: Option<usize>,

    #[arg(long)]
    max_nodes: Option<usize>,

    /// Skip proxy detection (no RPC calls)
    #[arg(long)]
    offline: bool,
}

#[derive(Debug, Args)]
struct StatusArgs {
    /// Unix time at which the operation becomes executable
    #[arg(long)]
    timestamp: u64,

    #[arg(long)]
    executed_at: Option<u64>,

    #[arg(long)]
    cancelled_at: Option<u64>,

    /// Keep printing the countdown until the operation is ready
    #[arg(long)]
    watch: bool,
}

#[derive(Debug, Subcommand)]
enum AbiCommand {
    /// Store a JSON ABI for an address
    Set {
        address: Address,
        file: PathBuf,
        #[arg(long)]
        label: Option<String>,
    },
    /// Remove the stored ABI for an address
    Remove { address: Address },
    /// List stored ABIs
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::load();
    let network = cli.network.unwrap_or(config.network);

    match cli.command {
        Command::Decode(args) => run_decode(&config, network, cli.rpc, args).await,
        Command::Resolve { address } => run_resolve(&config, network, cli.rpc, address).await,
        Command::Classify { calldata } => {
            match classify(Some(&calldata)) {
                Some(call) => println!("DANGEROUS {} ({})", call.function_name, call.selector),
                None => println!("no dangerous selector"),
            }
            Ok(())
        }
        Command::Status(args) => run_status(args).await,
        Command::Abi(command) => run_abi(&config, command),
    }
}

/// Collaborators shared by the decode and resolve commands
struct Services {
    decoder: CalldataDecoder,
    rpc: Option<Arc<dyn RpcClient>>,
}

fn build_services(
    config: &Config,
    network: Network,
    rpc_override: Option<String>,
    offline: bool,
) -> Result<Services> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let manual: Arc<dyn ManualAbiStore> = match config.manual_abi_db_path() {
        Some(path) => match SqliteAbiStore::open(&path) {
            Ok(store) => Arc::new(store),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "manual ABI store unavailable");
                Arc::new(InMemoryAbiStore::new())
            }
        },
        None => Arc::new(InMemoryAbiStore::new()),
    };

    let explorer = BlockscoutExplorer::new(clock.clone())?
        .with_base_url(Network::Mainnet, config.explorer_url(Network::Mainnet))
        .with_base_url(Network::Testnet, config.explorer_url(Network::Testnet));
    let resolver = AbiResolver::new(
        manual,
        Arc::new(explorer),
        config.known_registry(),
        clock.clone(),
    );

    let fetcher = FourByteDirectory::new(config.directory_url())?;
    let directory = SignatureDirectory::new(Arc::new(fetcher), clock);

    let rpc: Option<Arc<dyn RpcClient>> = if offline {
        None
    } else {
        let url = rpc_override.unwrap_or_else(|| config.rpc_url(network));
        Some(Arc::new(AlloyRpcClient::http(&url)?))
    };

    Ok(Services {
        decoder: CalldataDecoder::new(Arc::new(resolver), Arc::new(directory)),
        rpc,
    })
}

async fn run_decode(
    config: &Config,
    network: Network,
    rpc_override: Option<String>,
    args: DecodeArgs,
) -> Result<()> {
    let services = build_services(config, network, rpc_override, args.offline)?;

    let mut request = DecodeRequest::new(args.calldata)
        .network(network)
        .max_depth(args.max_depth.unwrap_or(config.max_depth))
        .max_nodes(args.max_nodes.unwrap_or(config.max_nodes));
    if let Some(target) = args.target {
        request = request.target(target);
    }
    if let Some(path) = &args.abi {
        request = request.abi(read_abi_file(path)?);
    }
    if let Some(rpc) = services.rpc.clone() {
        request = request.rpc(rpc);
    }

    let tree = services.decoder.decode(request).await?;
    println!("{}", serde_json::to_string_pretty(&tree)?);

    for call in scan_tree(&tree) {
        eprintln!("DANGEROUS {} ({})", call.function_name, call.selector);
    }
    Ok(())
}

async fn run_resolve(
    config: &Config,
    network: Network,
    rpc_override: Option<String>,
    address: Address,
) -> Result<()> {
    let services = build_services(config, network, rpc_override, false)?;
    let resolution = services
        .decoder
        .resolver()
        .resolve(address, network, services.rpc.as_deref())
        .await;

    println!("address:    {}", address);
    println!("network:    {}", network);
    println!("source:     {}", resolution.source.label());
    println!("confidence: {:?}", resolution.confidence);
    println!("proxy:      {}", resolution.is_proxy);
    if let Some(implementation) = resolution.implementation_address {
        println!("impl:       {}", implementation);
    }
    println!("functions:  {}", resolution.abi.functions().count());
    if let Some(error) = &resolution.error {
        println!("error:      {}", error);
    }
    Ok(())
}

async fn run_status(args: StatusArgs) -> Result<()> {
    let times = OperationTimes {
        executed_at: args.executed_at,
        cancelled_at: args.cancelled_at,
        timestamp: args.timestamp,
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let now = clock.now_secs();
    let status = derive_status(&times, now);

    let ready_at = chrono::DateTime::from_timestamp(args.timestamp as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| args.timestamp.to_string());
    println!("status:   {:?}", status);
    println!("ready at: {}", ready_at);
    if let Some(left) = seconds_until_ready(&times, now) {
        println!("ready in: {}", format_duration(left));
    }

    if args.watch && status == OperationStatus::Pending {
        let mut rx = Countdown::from_times(times, now).watch(clock);
        while rx.changed().await.is_ok() {
            let state = *rx.borrow();
            match state.seconds_until_ready {
                Some(left) => eprint!("\rready in: {}   ", format_duration(left)),
                None => {
                    eprintln!();
                    println!("status:   {:?}", state.status);
                    break;
                }
            }
        }
    }
    Ok(())
}

fn run_abi(config: &Config, command: AbiCommand) -> Result<()> {
    let Some(path) = config.manual_abi_db_path() else {
        bail!("no data directory for the manual ABI store; set manual_abi_db in the config");
    };
    let store = SqliteAbiStore::open(&path)?;

    match command {
        AbiCommand::Set {
            address,
            file,
            label,
        } => {
            let abi = read_abi_file(&file)?;
            store.set(&address, &abi, label.as_deref())?;
            println!(
                "stored {} functions for {}",
                abi.functions().count(),
                address
            );
        }
        AbiCommand::Remove { address } => {
            if store.remove(&address)? {
                println!("removed ABI for {}", address);
            } else {
                println!("no ABI stored for {}", address);
            }
        }
        AbiCommand::List => {
            for entry in store.list()? {
                println!(
                    "{}  {}",
                    entry.address,
                    entry.label.as_deref().unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}

fn read_abi_file(path: &Path) -> Result<JsonAbi> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read ABI file {}", path.display()))?;
    serde_json::from_str::<JsonAbi>(&content)
        .with_context(|| format!("parse ABI file {}", path.display()))
}

fn format_duration(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h {:02}m {:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m {:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}
