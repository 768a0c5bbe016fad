// src/main.rs
use std::sync::Arc;

use account_builder::{
    AccountBuilder, BuilderOptions, Client, HttpBundler, HttpPaymaster, PaymasterContext,
    VerifyingPaymaster,
};
use clap::Parser;
use dotenv::dotenv;
use ethers::core::rand::thread_rng;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, U256};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Deploys a smart account (if needed) and has it approve a token spender, through an
/// ERC-4337 bundler.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(long, env = "RPC_URL")]
    rpc_url: String,

    /// Defaults to the node RPC url
    #[clap(long, env = "BUNDLER_RPC_URL")]
    bundler_rpc_url: Option<String>,

    /// Sponsor gas through this verifying paymaster instead of paying from the account
    #[clap(long, env = "PAYMASTER_URL")]
    paymaster_url: Option<String>,

    #[clap(long, default_value = "payg")]
    paymaster_type: String,

    /// A random owner is generated when omitted
    #[clap(long, env = "PRIVATE_KEY")]
    private_key: Option<String>,

    /// Queried from the node when omitted
    #[clap(long, env = "CHAIN_ID")]
    chain_id: Option<u64>,

    #[clap(long, default_value = "0x48B65829444A3bF831eeea5861e3BF7303685ebe")]
    factory: String,

    #[clap(long, default_value = "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789")]
    entry_point: String,

    #[clap(long, default_value_t = 0)]
    nonce_key: u64,

    #[clap(long, default_value = "0x3870419Ba2BBf0127060bCB37f69A1b1C090992B")]
    token: String,

    #[clap(long, default_value = "0xE93ECa6595fe94091DC1af46aaC2A8b5D7990770")]
    spender: String,

    #[clap(long, default_value_t = 100_000)]
    amount: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let factory = args.factory.parse::<Address>()?;
    let entry_point = args.entry_point.parse::<Address>()?;
    let token = args.token.parse::<Address>()?;
    let spender = args.spender.parse::<Address>()?;

    let provider = Arc::new(Provider::<Http>::try_from(args.rpc_url.as_str())?);
    let bundler_url = args.bundler_rpc_url.as_deref().unwrap_or(&args.rpc_url);
    let bundler = Arc::new(HttpBundler::new(bundler_url)?);

    let chain_id = match args.chain_id {
        Some(chain_id) => chain_id,
        None => provider.get_chainid().await?.as_u64(),
    };

    let wallet = match &args.private_key {
        Some(key) => key.parse::<LocalWallet>()?,
        None => LocalWallet::new(&mut thread_rng()),
    }
    .with_chain_id(chain_id);
    info!("Account owner address: {:?}", wallet.address());

    let mut opts = BuilderOptions::new(entry_point, factory, chain_id)
        .with_nonce_key(U256::from(args.nonce_key));
    if let Some(url) = args.paymaster_url.as_deref().filter(|url| !url.is_empty()) {
        let paymaster = Arc::new(HttpPaymaster::new(url)?);
        opts = opts.with_paymaster(VerifyingPaymaster::new(
            paymaster,
            PaymasterContext::new(args.paymaster_type.clone()),
        ));
    }

    let mut builder = AccountBuilder::init(wallet, provider, bundler.clone(), opts).await?;
    info!("Account address: {:?}", builder.sender());

    builder.approve(token, spender, U256::from(args.amount));

    // Send the User Operation to the ERC-4337 mempool
    let client = Client::new(bundler, entry_point);
    let pending = client.send_user_operation(&builder).await?;

    info!("UserOpHash: {:?}", pending.user_op_hash());
    info!("Waiting for transaction...");
    let receipt = pending.wait().await?;
    info!("Transaction hash: {:?}", receipt.transaction_hash());
    info!(
        "View here: https://jiffyscan.xyz/userOpHash/{:?}",
        pending.user_op_hash()
    );

    Ok(())
}
