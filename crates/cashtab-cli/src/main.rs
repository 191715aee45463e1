use clap::{Parser, Subcommand};
use cashtab_types::constants::Network;
use std::path::PathBuf;

mod commands;

/// Cashtab command-line interface.
#[derive(Parser)]
#[command(name = "cashtab-cli")]
#[command(about = "Amount conversion, fee estimation and sending for the Cashtab eCash wallet")]
#[command(version)]
struct Cli {
    /// Network to use.
    #[arg(long, default_value = "mainnet")]
    network: NetworkArg,

    /// Node RPC URL (overrides the config file and the network default).
    #[arg(long)]
    node: Option<String>,

    /// Node RPC username.
    #[arg(long)]
    rpc_user: Option<String>,

    /// Node RPC password.
    #[arg(long)]
    rpc_password: Option<String>,

    /// JSON config file with `wallet` and `rpc` sections.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Wallet file path.
    #[arg(long)]
    wallet_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug)]
enum NetworkArg {
    Mainnet,
    Testnet,
    Regtest,
}

impl std::fmt::Display for NetworkArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Testnet => write!(f, "testnet"),
            Self::Regtest => write!(f, "regtest"),
        }
    }
}

impl std::str::FromStr for NetworkArg {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" => Ok(Self::Mainnet),
            "testnet" | "test" => Ok(Self::Testnet),
            "regtest" | "reg" => Ok(Self::Regtest),
            _ => Err(format!("unknown network: {} (use mainnet, testnet, or regtest)", s)),
        }
    }
}

impl NetworkArg {
    fn to_network(&self) -> Network {
        match self {
            Self::Mainnet => Network::Mainnet,
            Self::Testnet => Network::Testnet,
            Self::Regtest => Network::Regtest,
        }
    }

    fn default_node_url(&self) -> String {
        let port = match self {
            Self::Mainnet => cashtab_rpc::ports::MAINNET,
            Self::Testnet => cashtab_rpc::ports::TESTNET,
            Self::Regtest => cashtab_rpc::ports::REGTEST,
        };
        format!("http://127.0.0.1:{}", port)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an XEC amount to satoshis.
    ToSats {
        /// Amount in XEC (e.g. "123.45").
        xec: String,
    },

    /// Convert satoshis to XEC.
    ToXec { sats: u64 },

    /// Render a raw token amount with its decimals.
    Decimalize { amount: String, decimals: u32 },

    /// Convert a decimal token amount to raw atoms.
    Undecimalize { amount: String, decimals: u32 },

    /// Estimate the fee of an all-P2PKH transaction.
    EstimateFee {
        #[arg(long, default_value = "1")]
        inputs: usize,

        #[arg(long, default_value = "2")]
        outputs: usize,

        /// Fee rate in sats per kB.
        #[arg(long, default_value = "2010")]
        fee_rate: u64,
    },

    /// Build and sign an XEC payment from the wallet file.
    Send {
        /// Destination address.
        #[arg(long)]
        address: String,

        /// Amount in XEC.
        #[arg(long)]
        amount: String,

        /// Cashtab message to attach.
        #[arg(long)]
        message: Option<String>,

        /// Broadcast through the node and update the wallet file.
        #[arg(long)]
        broadcast: bool,
    },

    /// Broadcast a signed raw transaction.
    Broadcast {
        /// Raw transaction hex.
        hex: String,
    },
}

/// Application context shared across commands.
pub struct AppContext {
    network: Network,
    wallet_path: PathBuf,
    wallet_config: cashtab_wallet::WalletConfig,
    rpc_config: cashtab_rpc::RpcConfig,
}

impl AppContext {
    fn from_cli(cli: &Cli) -> Result<Self, Box<dyn std::error::Error>> {
        let file = match &cli.config {
            Some(path) => commands::load_config(path)?,
            None => commands::CliConfig::default(),
        };

        let network = cli.network.to_network();
        let mut wallet_config = file.wallet;
        wallet_config.network = network;

        let mut rpc_config = file.rpc.unwrap_or_else(|| cashtab_rpc::RpcConfig {
            url: cli.network.default_node_url(),
            ..Default::default()
        });
        if let Some(url) = &cli.node {
            rpc_config.url = url.clone();
        }
        if cli.rpc_user.is_some() {
            rpc_config.username = cli.rpc_user.clone();
        }
        if cli.rpc_password.is_some() {
            rpc_config.password = cli.rpc_password.clone();
        }

        let wallet_path = cli
            .wallet_file
            .clone()
            .unwrap_or_else(|| default_wallet_dir(&cli.network).join("wallet.json"));

        Ok(Self { network, wallet_path, wallet_config, rpc_config })
    }
}

fn default_wallet_dir(network: &NetworkArg) -> PathBuf {
    let base = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cashtab");
    match network {
        NetworkArg::Mainnet => base,
        NetworkArg::Testnet => base.join("testnet"),
        NetworkArg::Regtest => base.join("regtest"),
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let ctx = match AppContext::from_cli(&cli) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::ToSats { xec } => commands::to_sats(&xec),
        Commands::ToXec { sats } => commands::to_xec(sats),
        Commands::Decimalize { amount, decimals } => commands::decimalize(&amount, decimals),
        Commands::Undecimalize { amount, decimals } => commands::undecimalize(&amount, decimals),
        Commands::EstimateFee { inputs, outputs, fee_rate } => {
            commands::estimate_fee(inputs, outputs, fee_rate)
        }
        Commands::Send { address, amount, message, broadcast } => {
            commands::send(&ctx, &address, &amount, message, broadcast).await
        }
        Commands::Broadcast { hex } => commands::broadcast(&ctx, &hex).await,
    };

    match result {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
