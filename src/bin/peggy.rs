#![forbid(unsafe_code)]
use clap::{Parser, Subcommand};
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Color as TableColor;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use peggy::account::{Account, AccountDeriver};
use peggy::address::Address;
use peggy::bignum;
use peggy::config::{default_config_path, load_config, Config};
use peggy::crypto::KeyType;
use peggy::error::PeggyError;
use peggy::gateway::RpcGateway;
use peggy::message::MessageBuilder;
use peggy::rpc::HttpTransport;
use std::path::PathBuf;

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config.toml (defaults to ~/.peggy/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Creates or imports accounts
    #[command(subcommand)]
    Account(AccountCommand),
    /// Decodes and validates addresses
    #[command(subcommand)]
    Address(AddressCommand),
    /// Converts token amounts to and from their byte form
    #[command(subcommand)]
    Bignum(BignumCommand),
    /// Shows the next message nonce for an address
    Nonce { address: String },
    /// Shows on-chain actor state
    Actor { address: String },
    /// Storage miner queries and owner change
    #[command(subcommand)]
    Miner(MinerCommand),
}

#[derive(Subcommand)]
enum AccountCommand {
    /// Generates a fresh account
    New {
        #[arg(long, default_value = "secp256k1")]
        key_type: String,
    },
    /// Imports an account from a keystore blob (prompted when omitted)
    Import {
        #[arg(long)]
        blob: Option<String>,
    },
}

#[derive(Subcommand)]
enum AddressCommand {
    Inspect { address: String },
}

#[derive(Subcommand)]
enum BignumCommand {
    /// Decimal string to hex bytes
    Encode { value: String },
    /// Hex bytes to decimal string
    Decode { hex: String },
}

#[derive(Subcommand)]
enum MinerCommand {
    Info {
        miner: String,
    },
    /// Prints the unsigned owner change message for the current nonce
    OwnerChange {
        miner: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        new_owner: String,
    },
}

#[tokio::main]
async fn main() -> CliResult {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = load_config(&config_path)?;

    match cli.command {
        Commands::Account(AccountCommand::New { key_type }) => new_account(&config, &key_type)?,
        Commands::Account(AccountCommand::Import { blob }) => import_account(&config, blob)?,
        Commands::Address(AddressCommand::Inspect { address }) => inspect_address(&address)?,
        Commands::Bignum(BignumCommand::Encode { value }) => {
            println!("{}", hex::encode(bignum::encode(&value)?));
        }
        Commands::Bignum(BignumCommand::Decode { hex }) => {
            let bytes = hex::decode(hex.trim())
                .map_err(|e| PeggyError::InvalidNumber(format!("bad hex: {}", e)))?;
            println!("{}", bignum::decode(&bytes)?);
        }
        Commands::Nonce { address } => {
            let gateway = connect(&config)?;
            let nonce = gateway.mpool_get_nonce(&address.parse()?).await?;
            println!("{} {}", "Nonce:".bright_cyan(), nonce);
        }
        Commands::Actor { address } => show_actor(&config, &address).await?,
        Commands::Miner(MinerCommand::Info { miner }) => show_miner(&config, &miner).await?,
        Commands::Miner(MinerCommand::OwnerChange {
            miner,
            from,
            new_owner,
        }) => owner_change(&config, &miner, &from, &new_owner).await?,
    }

    Ok(())
}

fn connect(config: &Config) -> Result<RpcGateway<HttpTransport>, PeggyError> {
    let transport = HttpTransport::new(
        &config.rpc.endpoint,
        config.rpc.bearer_token.clone(),
        config.rpc.timeout(),
    )?;
    Ok(RpcGateway::with_namespace(transport, &config.rpc.namespace))
}

fn deriver(config: &Config) -> AccountDeriver {
    AccountDeriver::new(config.network.kind, config.keygen.generator())
}

fn new_account(config: &Config, key_type: &str) -> CliResult {
    let key_type: KeyType = key_type.parse()?;
    let account = deriver(config).new_account(key_type)?;
    println!("{}", "🔑 New account created".bright_green());
    print_account(&account);
    println!(
        "{}",
        "Store the private key blob somewhere safe; it cannot be recovered.".yellow()
    );
    Ok(())
}

fn import_account(config: &Config, blob: Option<String>) -> CliResult {
    let blob = match blob {
        Some(blob) => blob,
        None => rpassword::prompt_password("Private key blob: ")?,
    };
    let account = deriver(config).import_account(blob.trim())?;
    println!("{}", "📥 Account imported".bright_green());
    print_account(&account);
    Ok(())
}

fn print_account(account: &Account) {
    println!("  Address:     {}", account.address.to_string().bright_yellow());
    println!("  Public key:  {}", hex::encode(&account.public_key));
    println!("  Private key: {}", account.private_key_blob);
}

fn header(titles: &[&str]) -> Vec<Cell> {
    titles
        .iter()
        .map(|title| {
            Cell::new(title)
                .fg(TableColor::Cyan)
                .add_attribute(Attribute::Bold)
        })
        .collect()
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header(&["Field", "Value"]));
    table
}

fn inspect_address(text: &str) -> CliResult {
    let address: Address = text.parse()?;
    let mut table = new_table();
    table.add_row(vec![Cell::new("Network"), Cell::new(address.network())]);
    table.add_row(vec![
        Cell::new("Protocol"),
        Cell::new(format!(
            "{} ({:?})",
            address.protocol().as_u8(),
            address.protocol()
        )),
    ]);
    table.add_row(vec![
        Cell::new("Payload"),
        Cell::new(hex::encode(address.payload())),
    ]);
    if let Some(id) = address.id() {
        table.add_row(vec![Cell::new("Actor ID"), Cell::new(id)]);
    }
    if let Some(checksum) = address.checksum() {
        table.add_row(vec![Cell::new("Checksum"), Cell::new(hex::encode(checksum))]);
    }
    table.add_row(vec![
        Cell::new("Bytes"),
        Cell::new(hex::encode(address.to_bytes())),
    ]);
    println!("{}", table);
    Ok(())
}

async fn show_actor(config: &Config, text: &str) -> CliResult {
    let gateway = connect(config)?;
    let address: Address = text.parse()?;
    let actor = gateway.state_get_actor(&address).await?;

    let mut table = new_table();
    table.add_row(vec![Cell::new("Code"), Cell::new(&actor.code)]);
    table.add_row(vec![Cell::new("Head"), Cell::new(&actor.head)]);
    table.add_row(vec![Cell::new("Nonce"), Cell::new(actor.nonce)]);
    table.add_row(vec![
        Cell::new("Balance"),
        Cell::new(&actor.balance).fg(TableColor::Green),
    ]);
    println!("{}", table);
    Ok(())
}

async fn show_miner(config: &Config, text: &str) -> CliResult {
    let gateway = connect(config)?;
    let miner: Address = text.parse()?;
    let info = gateway.state_miner_info(&miner).await?;

    let mut table = new_table();
    table.add_row(vec![
        Cell::new("Owner"),
        Cell::new(&info.owner).fg(TableColor::Yellow),
    ]);
    table.add_row(vec![Cell::new("Worker"), Cell::new(&info.worker)]);
    if let Some(new_worker) = &info.new_worker {
        table.add_row(vec![Cell::new("New worker"), Cell::new(new_worker)]);
    }
    if let Some(controls) = &info.control_addresses {
        let joined = controls
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![Cell::new("Control"), Cell::new(joined)]);
    }
    if let Some(peer_id) = &info.peer_id {
        table.add_row(vec![Cell::new("Peer ID"), Cell::new(peer_id)]);
    }
    if let Some(size) = info.sector_size {
        table.add_row(vec![Cell::new("Sector size"), Cell::new(size)]);
    }
    println!("{}", table);
    Ok(())
}

async fn owner_change(config: &Config, miner: &str, from: &str, new_owner: &str) -> CliResult {
    let gateway = connect(config)?;
    let miner: Address = miner.parse()?;
    let from: Address = from.parse()?;
    let new_owner: Address = new_owner.parse()?;

    gateway.ensure_owner(&miner, &from).await?;

    let nonce = gateway.mpool_get_nonce(&from).await?;
    let builder = MessageBuilder::new(config.gas.policy());
    let message = builder.build_owner_change_message(&miner, &from, nonce, &new_owner);

    println!(
        "{}",
        "📝 Unsigned owner change message (sign externally, then push)".bright_cyan()
    );
    println!("{}", serde_json::to_string_pretty(&message)?);
    Ok(())
}
