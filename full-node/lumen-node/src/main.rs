//! This binary runs the Lumen rollup node.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use lumen_celestia_adapter::CelestiaService;
use lumen_db::NodeDB;
use lumen_ethereum_adapter::{EthL2Client, EthereumClient};
use lumen_mock_da::MockDaService;
use lumen_node::{from_toml_path, Challenger, Defender, NodeConfig, RollupProducer};
use lumen_rollup_interface::services::da::DaService;
use lumen_rollup_interface::services::l1::{L1Client, SubmittedTx};
use lumen_rollup_interface::H256;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// The path to the node config.
    #[arg(long, default_value = "node_config.toml")]
    config: PathBuf,

    /// Publish bundles to an in-memory DA layer and sign L1 transactions without sending them.
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Produce rollup blocks.
    #[command(subcommand)]
    Rollup(RollupCommand),
    /// Challenge rollup blocks.
    #[command(subcommand)]
    Challenger(ChallengerCommand),
    /// Defend rollup blocks and feed the chain oracle.
    #[command(subcommand)]
    Defender(DefenderCommand),
}

#[derive(Subcommand, Debug)]
enum RollupCommand {
    /// Print the head of the canonical state chain.
    Info,
    /// Build and publish the next rollup block without submitting it.
    Next,
    /// Produce rollup blocks until interrupted.
    Start,
}

#[derive(Subcommand, Debug)]
enum ChallengerCommand {
    /// Challenge the availability of a share of a rollup block.
    ChallengeDa {
        /// Index of the rollup block in the canonical state chain.
        #[arg(long)]
        block_index: u64,
        #[arg(long, default_value_t = 0)]
        pointer_index: u8,
        #[arg(long)]
        share_index: u32,
    },
    /// Print the state of a challenge.
    Status(ChallengeArgs),
}

#[derive(Subcommand, Debug)]
enum DefenderCommand {
    /// Answer a challenge with a proof of the share.
    DefendDa(ChallengeArgs),
    /// Settle an expired challenge.
    SettleDa(ChallengeArgs),
    /// Watch for challenges and defend them until interrupted.
    Start,
    /// Prove an L2 header to the chain oracle.
    ProvideHeader {
        /// Hash of the rollup block whose bundle holds the header.
        #[arg(long, value_parser = parse_hash)]
        rblock: H256,
        /// Hash of the L2 header with its extra data cleared.
        #[arg(long, value_parser = parse_hash)]
        header_hash: H256,
    },
    /// Prove a legacy L2 transaction to the chain oracle.
    ProvideTx {
        /// Hash of the rollup block whose bundle holds the transaction.
        #[arg(long, value_parser = parse_hash)]
        rblock: H256,
        #[arg(long, value_parser = parse_hash)]
        tx_hash: H256,
    },
    /// List the challenges recorded by the watcher that await a defense.
    Active,
}

#[derive(Args, Debug)]
struct ChallengeArgs {
    /// Hash of the challenged rollup block.
    #[arg(long, value_parser = parse_hash)]
    block_hash: H256,
    #[arg(long, default_value_t = 0)]
    pointer_index: u8,
    #[arg(long)]
    share_index: u32,
}

fn parse_hash(s: &str) -> Result<H256, String> {
    H256::from_str(s.strip_prefix("0x").unwrap_or(s)).map_err(|e| format!("invalid hash: {e}"))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_tx(tx: &SubmittedTx) {
    if tx.sent {
        println!("transaction sent: {:?}", tx.hash);
    } else {
        println!("transaction signed, not sent: {:?}", tx.hash);
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Received interrupt, shutting down");
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Initializing logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    info!("Reading node config from {:?}", cli.config);
    let config: NodeConfig =
        from_toml_path(&cli.config).context("Failed to read node configuration")?;

    if cli.dry_run {
        info!("Dry run: bundles stay in memory and L1 transactions are not sent");
        let da = MockDaService::new(config.da.namespace);
        execute(cli.command, &config, da, true).await
    } else {
        let da = CelestiaService::new(config.da.clone())?;
        execute(cli.command, &config, da, false).await
    }
}

async fn execute<Da: DaService + Clone>(
    command: Command,
    config: &NodeConfig,
    da: Da,
    dry_run: bool,
) -> anyhow::Result<()> {
    let l1 = EthereumClient::new(&config.ethereum, dry_run).await?;
    let db = || NodeDB::with_path(&config.storage.path);

    match command {
        Command::Rollup(command) => {
            let l2 = EthL2Client::new(&config.ethereum.l2_rpc_url)?;
            let mut producer = RollupProducer::new(da, l1.clone(), l2, &config.rollup);
            if config.rollup.store_headers || config.rollup.store_pointers {
                producer = producer.with_db(db()?);
            }
            match command {
                RollupCommand::Info => {
                    let index = l1.get_rollup_head_index().await?;
                    let head = l1.get_header_by_index(index).await?;
                    println!("head index: {index}");
                    println!("head hash: {:?}", l1.hash_header(&head).await?);
                    print_json(&head)?;
                }
                RollupCommand::Next => {
                    let state = producer.load_state().await?;
                    let block = producer.create_next_block(&state).await?;
                    println!("bundle of {} L2 blocks published at {}", block.bundle_len, block.pointer);
                    print_json(&block.header)?;
                }
                RollupCommand::Start => {
                    let state = producer.load_state().await?;
                    producer.run(state, shutdown_signal()).await?;
                }
            }
        }
        Command::Challenger(command) => {
            let challenger = Challenger::new(l1);
            match command {
                ChallengerCommand::ChallengeDa {
                    block_index,
                    pointer_index,
                    share_index,
                } => {
                    let (tx, block_hash) = challenger
                        .challenge_data_root_inclusion(block_index, pointer_index, share_index)
                        .await?;
                    println!("challenged rollup block {block_hash:?}");
                    print_tx(&tx);
                }
                ChallengerCommand::Status(args) => {
                    let (key, challenge) = challenger
                        .get_data_root_inclusion_challenge(
                            args.block_hash,
                            args.pointer_index,
                            args.share_index,
                        )
                        .await?;
                    println!("challenge key: {key:?}");
                    print_json(&challenge)?;
                }
            }
        }
        Command::Defender(command) => {
            let defender = Defender::new(da, l1, &config.defender).with_db(db()?);
            match command {
                DefenderCommand::DefendDa(args) => {
                    let tx = defender
                        .defend_data_root_inclusion(
                            args.block_hash,
                            args.pointer_index,
                            args.share_index,
                        )
                        .await?;
                    print_tx(&tx);
                }
                DefenderCommand::SettleDa(args) => {
                    let tx = defender
                        .settle_data_root_inclusion(
                            args.block_hash,
                            args.pointer_index,
                            args.share_index,
                        )
                        .await?;
                    print_tx(&tx);
                }
                DefenderCommand::Start => {
                    defender.run(shutdown_signal()).await?;
                }
                DefenderCommand::ProvideHeader {
                    rblock,
                    header_hash,
                } => {
                    let (shares_key, tx) = defender.provide_header(rblock, header_hash).await?;
                    println!("shares key: {shares_key:?}");
                    print_tx(&tx);
                }
                DefenderCommand::ProvideTx { rblock, tx_hash } => {
                    let (shares_key, tx) = defender.provide_transaction(rblock, tx_hash).await?;
                    println!("shares key: {shares_key:?}");
                    print_tx(&tx);
                }
                DefenderCommand::Active => {
                    print_json(&defender.active_challenges()?)?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_defender_commands() {
        let hash = format!("0x{}", "ab".repeat(32));
        let cli = Cli::try_parse_from([
            "lumen-node",
            "--dry-run",
            "defender",
            "defend-da",
            "--block-hash",
            &hash,
            "--share-index",
            "7",
        ])
        .unwrap();
        assert!(cli.dry_run);
        assert_eq!(cli.config, PathBuf::from("node_config.toml"));
        match cli.command {
            Command::Defender(DefenderCommand::DefendDa(args)) => {
                assert_eq!(args.block_hash, H256::repeat_byte(0xab));
                assert_eq!(args.pointer_index, 0);
                assert_eq!(args.share_index, 7);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_hashes() {
        assert!(Cli::try_parse_from([
            "lumen-node",
            "defender",
            "provide-tx",
            "--rblock",
            "0x1234",
            "--tx-hash",
            "0x1234",
        ])
        .is_err());
    }
}
