//! klay-cli — command-line front end for Klaytn keystores and transactions.
//!
//! Creates and opens keystore files, decodes raw transactions, signs as
//! sender or fee payer and combines independently signed copies. Nothing is
//! ever broadcast; signed transactions are printed as raw hex.

mod chain;
mod config;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use klay_core::types::to_hex;
use klay_core::{Transaction, TransactionRequest};
use klay_wallet::{
    combine_raw_transactions, ChainData, Kdf, Keyring, Keystore, KeystoreOptions, PrivateKey, Role,
    TransactionSigner,
};

use crate::chain::{OfflineChainData, RpcChainData};
use crate::config::CliConfig;

/// Klaytn keystore and transaction tool.
#[derive(Parser)]
#[command(name = "klay-cli", version, about = "Offline-first Klaytn signing tool")]
struct Cli {
    /// JSON-RPC endpoint for nonce, gas price and chain id lookups.
    #[arg(long, global = true, env = "KLAY_RPC_ENDPOINT")]
    rpc_endpoint: Option<String>,

    /// Directory for new keystore files.
    #[arg(long, global = true, env = "KLAY_KEYSTORE_DIR")]
    keystore_dir: Option<PathBuf>,

    /// Never contact a node.
    #[arg(long, global = true)]
    offline: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Keystore management subcommands.
    Keystore {
        #[command(subcommand)]
        action: KeystoreAction,
    },
    /// Decode a raw transaction and show its fields and hashes.
    Decode(DecodeArgs),
    /// Sign a transaction as its sender.
    Sign(SignArgs),
    /// Sign a fee-delegated transaction as its fee payer.
    SignFeePayer(SignArgs),
    /// Merge independently signed copies of one transaction.
    Combine(CombineArgs),
}

#[derive(Subcommand)]
enum KeystoreAction {
    /// Create a keystore for a fresh random key.
    New(NewArgs),
    /// Encrypt an existing private key or wallet key.
    Import(ImportArgs),
    /// Open a keystore and show its address, roles and account key.
    Inspect(InspectArgs),
}

#[derive(Args)]
struct EncryptArgs {
    /// Write a version 3 record instead of version 4.
    #[arg(long)]
    v3: bool,

    /// Derive the key with pbkdf2 instead of scrypt.
    #[arg(long)]
    pbkdf2: bool,

    /// Output file (default: <keystore-dir>/<address>.json).
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Read the password from a file instead of prompting.
    #[arg(long)]
    password_file: Option<PathBuf>,
}

#[derive(Args)]
struct NewArgs {
    #[command(flatten)]
    encrypt: EncryptArgs,
}

#[derive(Args)]
struct ImportArgs {
    /// Hex private key or `key 0x00 address` wallet key. Prompted when absent.
    #[arg(long)]
    key: Option<String>,

    #[command(flatten)]
    encrypt: EncryptArgs,
}

#[derive(Args)]
struct InspectArgs {
    /// Keystore file.
    keystore: PathBuf,

    /// Read the password from a file instead of prompting.
    #[arg(long)]
    password_file: Option<PathBuf>,

    /// Also print the wallet key (single-key keystores only).
    #[arg(long)]
    show_wallet_key: bool,
}

#[derive(Args)]
struct DecodeArgs {
    /// Raw transaction hex, or a file containing it.
    raw: String,
}

#[derive(Args)]
struct SignArgs {
    /// Keystore file of the signer.
    #[arg(short, long)]
    keystore: PathBuf,

    /// Transaction: JSON request, raw hex, or a file containing either.
    #[arg(short, long)]
    tx: String,

    /// Sign with only the key at this index of the role.
    #[arg(long)]
    index: Option<usize>,

    /// Read the password from a file instead of prompting.
    #[arg(long)]
    password_file: Option<PathBuf>,
}

#[derive(Args)]
struct CombineArgs {
    /// Raw transactions (hex, or files containing hex).
    #[arg(required = true, num_args = 1..)]
    raws: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format);
    let config = CliConfig::resolve(cli.rpc_endpoint, cli.keystore_dir, cli.offline);

    match cli.command {
        Commands::Keystore { action } => match action {
            KeystoreAction::New(args) => keystore_new(&config, args),
            KeystoreAction::Import(args) => keystore_import(&config, args),
            KeystoreAction::Inspect(args) => keystore_inspect(args),
        },
        Commands::Decode(args) => decode(args),
        Commands::Sign(args) => sign(&config, args, Role::Transaction).await,
        Commands::SignFeePayer(args) => sign(&config, args, Role::FeePayer).await,
        Commands::Combine(args) => combine(args),
    }
}

/// Initialise the tracing subscriber. `RUST_LOG` overrides `level`.
fn init_logging(level: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init();
    }
}

/// Create a keystore for a new random key.
fn keystore_new(config: &CliConfig, args: NewArgs) -> Result<()> {
    let keyring = Keyring::generate();
    write_keystore(config, &keyring, &args.encrypt)
}

/// Encrypt an existing key.
fn keystore_import(config: &CliConfig, args: ImportArgs) -> Result<()> {
    let input = match args.key {
        Some(key) => key,
        None => prompt_password("Private key or wallet key")?,
    };
    let key = PrivateKey::from_hex(&input).context("Invalid private key")?;
    let keyring = Keyring::single(key.address(), key);
    write_keystore(config, &keyring, &args.encrypt)
}

fn write_keystore(config: &CliConfig, keyring: &Keyring, args: &EncryptArgs) -> Result<()> {
    let path = args
        .out
        .clone()
        .unwrap_or_else(|| config.keystore_path(&keyring.address()));
    if path.exists() {
        bail!("Keystore file already exists: {}", path.display());
    }

    let password = new_password(args.password_file.as_deref())?;
    let kdf = if args.pbkdf2 { Kdf::pbkdf2() } else { Kdf::scrypt() };
    let options = KeystoreOptions::with_kdf(kdf);
    let record = if args.v3 {
        keyring.encrypt_v3(password.as_bytes(), &options)
    } else {
        keyring.encrypt(password.as_bytes(), &options)
    }
    .context("Failed to encrypt keystore")?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(&path, record.to_json()?)
        .with_context(|| format!("Failed to write keystore: {}", path.display()))?;
    info!(path = %path.display(), version = record.version, "keystore written");

    println!("Address:  {}", keyring.address().to_checksum());
    println!("Keystore: {}", path.display());
    Ok(())
}

/// Decrypt a keystore and describe it.
fn keystore_inspect(args: InspectArgs) -> Result<()> {
    let keyring = open_keystore(&args.keystore, args.password_file.as_deref())?;

    println!("Address:   {}", keyring.address().to_checksum());
    println!("Decoupled: {}", keyring.is_decoupled());
    for role in Role::ALL {
        println!("{:<14} {} key(s)", format!("{role}:"), keyring.keys(role).len());
    }
    let account = keyring.to_account().context("Failed to derive account key")?;
    println!(
        "Account key: {} {}",
        account.account_key.type_name(),
        to_hex(&account.account_key.encode())
    );
    if args.show_wallet_key {
        println!("Wallet key: {}", keyring.to_wallet_key()?);
    }
    Ok(())
}

/// Print a decoded transaction as JSON plus its hashes.
fn decode(args: DecodeArgs) -> Result<()> {
    let raw = read_input(&args.raw)?;
    let tx = Transaction::decode_hex(raw.trim()).context("Failed to decode transaction")?;

    println!("{}", serde_json::to_string_pretty(&tx.to_request())?);
    println!("State:          {:?}", tx.signing_state());
    println!("Tx hash:        {}", to_hex(&tx.transaction_hash()?));
    println!("Sender tx hash: {}", to_hex(&tx.sender_tx_hash()?));
    for sender in tx.recover_senders()? {
        println!("Signed by:      {}", sender.to_checksum());
    }
    for payer in tx.recover_fee_payers()? {
        println!("Fee paid by:    {}", payer.to_checksum());
    }
    Ok(())
}

/// Sign as sender or fee payer and print the raw transaction.
async fn sign(config: &CliConfig, args: SignArgs, role: Role) -> Result<()> {
    let mut tx = load_transaction(&args.tx)?;
    let keyring = open_keystore(&args.keystore, args.password_file.as_deref())?;

    let raw = if config.offline {
        sign_with(TransactionSigner::new(OfflineChainData), &keyring, &mut tx, role, args.index).await?
    } else {
        let chain = RpcChainData::connect(&config.rpc_endpoint)?;
        sign_with(TransactionSigner::new(chain), &keyring, &mut tx, role, args.index).await?
    };

    info!(tx_type = %tx.tx_type(), state = ?tx.signing_state(), "signed");
    println!("{raw}");
    Ok(())
}

async fn sign_with<C: ChainData>(
    signer: TransactionSigner<C>,
    keyring: &Keyring,
    tx: &mut Transaction,
    role: Role,
    index: Option<usize>,
) -> Result<String> {
    let raw = match (role, index) {
        (Role::FeePayer, Some(i)) => signer.sign_as_fee_payer_with_index(keyring, tx, i).await,
        (Role::FeePayer, None) => signer.sign_as_fee_payer(keyring, tx).await,
        (_, Some(i)) => signer.sign_with_index(keyring, tx, i).await,
        (_, None) => signer.sign(keyring, tx).await,
    };
    raw.with_context(|| format!("Failed to sign as {role}"))
}

/// Merge raw transactions and print the result.
fn combine(args: CombineArgs) -> Result<()> {
    let raws = args
        .raws
        .iter()
        .map(|r| read_input(r).map(|s| s.trim().to_string()))
        .collect::<Result<Vec<_>>>()?;
    let tx = combine_raw_transactions(&raws).context("Failed to combine transactions")?;
    println!("{}", tx.raw_transaction()?);
    Ok(())
}

/// Parse a transaction given as JSON request or raw hex, inline or in a file.
fn load_transaction(input: &str) -> Result<Transaction> {
    let text = read_input(input)?;
    let text = text.trim();
    if text.starts_with('{') {
        let request: TransactionRequest =
            serde_json::from_str(text).context("Invalid transaction JSON")?;
        Ok(Transaction::from_request(&request).context("Invalid transaction")?)
    } else {
        Ok(Transaction::decode_hex(text).context("Invalid raw transaction")?)
    }
}

/// Contents of `input` if it names an existing file, otherwise `input` itself.
fn read_input(input: &str) -> Result<String> {
    let path = Path::new(input);
    if path.is_file() {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
    } else {
        Ok(input.to_string())
    }
}

fn open_keystore(path: &Path, password_file: Option<&Path>) -> Result<Keyring> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read keystore: {}", path.display()))?;
    let record = Keystore::from_json(&json)?;
    let password = match password_file {
        Some(file) => read_password_file(file)?,
        None => prompt_password("Keystore password")?,
    };
    Ok(record
        .decrypt(password.as_bytes())
        .context("Failed to decrypt keystore (check password)")?)
}

fn new_password(password_file: Option<&Path>) -> Result<String> {
    if let Some(file) = password_file {
        return read_password_file(file);
    }
    let password = prompt_password("New keystore password")?;
    let confirm = prompt_password("Confirm password")?;
    if password != confirm {
        bail!("Passwords do not match");
    }
    Ok(password)
}

fn read_password_file(path: &Path) -> Result<String> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read password file: {}", path.display()))?;
    Ok(contents.trim_end_matches(['\r', '\n']).to_string())
}

/// Prompt for a secret securely (no echo).
fn prompt_password(prompt: &str) -> Result<String> {
    rpassword::prompt_password(format!("{prompt}: ")).context("Failed to read password")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_input_prefers_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.txt");
        std::fs::write(&path, "0x08f8").unwrap();
        assert_eq!(read_input(path.to_str().unwrap()).unwrap(), "0x08f8");
        assert_eq!(read_input("0x08f8").unwrap(), "0x08f8");
    }

    #[test]
    fn password_file_strips_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pw");
        std::fs::write(&path, "secret\n").unwrap();
        assert_eq!(read_password_file(&path).unwrap(), "secret");
    }

    #[test]
    fn load_transaction_from_json() {
        let json = r#"{
            "type": "TxTypeValueTransfer",
            "from": "0x90b3e9a3770481345a7f17f22f16d020bccfd33e",
            "to": "0x7b65b75d204abed71587c9e519a89277766ee1d0",
            "value": "0xa",
            "gas": "0xf4240",
            "nonce": "0x4d2",
            "gasPrice": "0x19",
            "chainId": "0x1"
        }"#;
        let tx = load_transaction(json).unwrap();
        assert!(tx.is_filled());
        assert_eq!(tx.tx_type().name(), "TxTypeValueTransfer");
    }

    #[test]
    fn keystore_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::resolve(None, Some(dir.path().to_path_buf()), true);
        let pw = dir.path().join("pw");
        std::fs::write(&pw, "pw\n").unwrap();

        let key = PrivateKey::from_bytes(&[7; 32]).unwrap();
        let keyring = Keyring::from_key(key);
        let record = keyring
            .encrypt(
                b"pw",
                &KeystoreOptions::with_kdf(Kdf::Pbkdf2 { c: 16, dklen: 32 }),
            )
            .unwrap();
        let path = config.keystore_path(&keyring.address());
        std::fs::write(&path, record.to_json().unwrap()).unwrap();

        let opened = open_keystore(&path, Some(&pw)).unwrap();
        assert_eq!(opened, keyring);
    }
}
