// Copyright 2019-2021 Parity Technologies (UK) Ltd.
// This file is part of Parity Bridges Common.

// Parity Bridges Common is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Parity Bridges Common is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Parity Bridges Common.  If not, see <http://www.gnu.org/licenses/>.

//! `substrate-relay`: runs one Listener/Writer pair per configured substrate chain, and the
//! `accounts generate|import|list` keystore subcommands. One process may run the federation
//! member's full set of chains; each chain gets its own Connection, MultiSig Ledger, and
//! Listener/Writer task pair, all wired through a shared, in-process [`LocalRouter`].

use substrate_relay::block_store::{resolve_start_height, BlockStore};
use substrate_relay::config::{ChainConfig, ChainType, RelayConfig, SubstrateOpts};
use substrate_relay::connection::Connection;
use substrate_relay::error::Error;
use substrate_relay::keystore::Keystore;
use substrate_relay::ledger::MultiSigLedger;
use substrate_relay::listener::{self, ListenerConfig};
use substrate_relay::metrics::{health_server, BridgeMetrics, HealthState};
use substrate_relay::relayer::Relayer;
use substrate_relay::writer::{self, InFlightGuard};

use bridge_primitives::{ChainId, LocalRouter, ResourceId, Router};
use relay_utils::metrics::{metrics_address, metrics_server, spawn_standalone_metrics, GlobalMetrics, Metric, Registry};

use futures::FutureExt;
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook_async_std::Signals;
use sp_core::crypto::Pair as _;
use sp_core::sr25519;
use std::path::PathBuf;
use std::sync::Arc;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "substrate-relay", about = "Multi-sig bridge relayer for a federation of substrate signatories.")]
enum Command {
	/// Runs the Listener/Writer core for every substrate chain named in the configuration file.
	Relay(RelayOpts),
	/// Manages this relayer's on-disk sr25519 keystore.
	Accounts(AccountsCommand),
}

#[derive(StructOpt)]
struct RelayOpts {
	/// Path to the TOML configuration file describing the federation's chains.
	#[structopt(long, parse(from_os_str))]
	config: PathBuf,
	/// Increases log verbosity; may be repeated (-v, -vv, -vvv).
	#[structopt(short, long, parse(from_occurrences))]
	verbosity: u8,
	/// Overrides every configured chain's keystore directory.
	#[structopt(long, parse(from_os_str))]
	keystore: Option<PathBuf>,
	/// Overrides every configured chain's block-store directory.
	#[structopt(long, parse(from_os_str))]
	blockstore: Option<PathBuf>,
	/// Forces every chain to start from its configured `startBlock`, ignoring any persisted cursor.
	#[structopt(long)]
	fresh: bool,
	/// Forces every chain to start from its current finalized head.
	#[structopt(long)]
	latest: bool,
	/// Exposes a Prometheus `/metrics` endpoint and a `/health` liveness endpoint.
	#[structopt(long)]
	metrics: bool,
	/// Port the `/metrics` endpoint binds to; `/health` binds to the next port up.
	#[structopt(long, default_value = "9616")]
	metrics_port: u16,
	/// Bypasses the keystore, signing with this mnemonic (and optional `//derivation/path`)
	/// instead. Test/insecure deployments only.
	#[structopt(long)]
	testkey: Option<String>,
}

#[derive(StructOpt)]
enum AccountsCommand {
	/// Generates a fresh sr25519 key and stores it.
	Generate {
		#[structopt(long, parse(from_os_str))]
		keystore: PathBuf,
	},
	/// Imports a key from a BIP-39 mnemonic phrase (optionally with a derivation path).
	Import {
		#[structopt(long, parse(from_os_str))]
		keystore: PathBuf,
		/// The mnemonic phrase (and optional `//derivation/path`), as one argument.
		mnemonic: String,
	},
	/// Lists every address currently stored in a keystore directory.
	List {
		#[structopt(long, parse(from_os_str))]
		keystore: PathBuf,
	},
}

fn main() {
	match Command::from_args() {
		Command::Relay(opts) => {
			init_logger(opts.verbosity);
			if let Err(error) = async_std::task::block_on(run(opts)) {
				log::error!(target: "bridge", "fatal: {error}");
				std::process::exit(1);
			}
		},
		Command::Accounts(command) => {
			init_logger(0);
			if let Err(error) = run_accounts(command) {
				log::error!(target: "bridge", "fatal: {error}");
				std::process::exit(1);
			}
		},
	}
}

fn init_logger(verbosity: u8) {
	let level = match verbosity {
		0 => log::LevelFilter::Info,
		1 => log::LevelFilter::Debug,
		_ => log::LevelFilter::Trace,
	};
	env_logger::Builder::new().filter_level(level).format_timestamp_millis().init();
}

fn run_accounts(command: AccountsCommand) -> anyhow::Result<()> {
	match command {
		AccountsCommand::Generate { keystore } => {
			let address = Keystore::open(&keystore)?.generate()?;
			println!("{address}");
		},
		AccountsCommand::Import { keystore, mnemonic } => {
			let address = Keystore::open(&keystore)?.import(&mnemonic)?;
			println!("{address}");
		},
		AccountsCommand::List { keystore } => {
			for address in Keystore::open(&keystore)?.list()? {
				println!("{address}");
			}
		},
	}
	Ok(())
}

/// Runs every configured substrate chain to completion: forever, until a shutdown signal
/// arrives or one chain's Listener reports a fatal error.
async fn run(relay_opts: RelayOpts) -> anyhow::Result<()> {
	let config = RelayConfig::from_file(&relay_opts.config)?;
	let router = Arc::new(LocalRouter::new());
	let metrics = BridgeMetrics::new()?;
	let health = HealthState::new();

	let (stop_tx, stop_rx) = async_std::channel::unbounded::<()>();
	let (fatal_tx, fatal_rx) = async_std::channel::unbounded::<String>();

	let mut handles = Vec::new();
	for chain in &config.chains {
		if chain.chain_type != ChainType::Substrate {
			log::warn!(
				target: "bridge",
				"chain {:?} has type {:?}; its listener/writer pair is an external collaborator, skipping",
				chain.name,
				chain.chain_type,
			);
			continue;
		}
		let chain_handles = spawn_chain(
			chain.clone(),
			&relay_opts,
			Arc::clone(&router),
			metrics.clone(),
			health.clone(),
			stop_rx.clone(),
			fatal_tx.clone(),
		)
		.await?;
		handles.extend(chain_handles);
	}
	drop(fatal_tx);

	if handles.is_empty() {
		anyhow::bail!("no substrate chains configured in {:?}", relay_opts.config);
	}

	if relay_opts.metrics {
		let registry = Registry::new();
		metrics.register(&registry)?;
		let global_metrics = GlobalMetrics::new()?;
		global_metrics.register(&registry)?;
		spawn_standalone_metrics(global_metrics);
		let metrics_addr = metrics_address("127.0.0.1", relay_opts.metrics_port)?;
		async_std::task::spawn(metrics_server(metrics_addr, registry));
		let health_addr = metrics_address("127.0.0.1", relay_opts.metrics_port + 1)?;
		async_std::task::spawn(health_server(health_addr, health.clone()));
	}

	let mut signals = Signals::new([SIGINT, SIGTERM])?;
	let shutdown_reason = {
		use futures::stream::StreamExt;
		futures::select! {
			signal = signals.next().fuse() => format!("signal {:?}", signal),
			fatal = fatal_rx.recv().fuse() => fatal.unwrap_or_else(|_| "every chain exited".to_string()),
		}
	};
	log::info!(target: "bridge", "shutting down: {shutdown_reason}");
	drop(stop_tx);

	for handle in handles {
		handle.await;
	}
	Ok(())
}

/// Builds one chain's Connection, keyring, ledger and block store, then spawns its Listener
/// and its inbound-message Writer intake as independent tasks.
async fn spawn_chain(
	chain: ChainConfig,
	relay_opts: &RelayOpts,
	router: Arc<LocalRouter>,
	metrics: BridgeMetrics,
	health: HealthState,
	stop_rx: async_std::channel::Receiver<()>,
	fatal_tx: async_std::channel::Sender<String>,
) -> anyhow::Result<Vec<async_std::task::JoinHandle<()>>> {
	let opts = SubstrateOpts::from_map(&chain.opts)?;

	let keypair = match &relay_opts.testkey {
		Some(testkey) => {
			sr25519::Pair::from_phrase(testkey, None)
				.map_err(|_| Error::Keystore(format!("invalid --testkey phrase for chain {:?}", chain.name)))?
				.0
		},
		None => {
			let keystore_dir = relay_opts.keystore.clone().unwrap_or_else(|| PathBuf::from(&chain.keystore_path));
			Keystore::open(&keystore_dir)?.load(&chain.from)?
		},
	};
	let relayer = Arc::new(Relayer::new(keypair, &opts)?);

	let connection = Arc::new(Connection::connect(&chain.name, &chain.endpoint).await);

	let blockstore_dir = relay_opts.blockstore.clone().unwrap_or_else(|| PathBuf::from(&chain.blockstore_path));
	let block_store = BlockStore::open(&blockstore_dir, chain.id, &relayer.address_hex)?;

	let fresh = chain.fresh_start || relay_opts.fresh;
	let latest = chain.latest_block || relay_opts.latest;
	let finalized_for_start = if latest { connection.latest_finalized_header().await?.number } else { 0 };
	let start_height = resolve_start_height(&block_store, opts.start_block, fresh, latest, || finalized_for_start);

	let ledger = Arc::new(MultiSigLedger::new());
	let in_flight = InFlightGuard::new();
	let inbound = router.register(ChainId(chain.id)).await;

	let listener_config = ListenerConfig {
		chain_id: ChainId(chain.id),
		destination_chain_id: ChainId(opts.dest_id),
		resource_id: ResourceId::from_hex(&opts.resource_id)
			.map_err(|e| Error::Config(format!("opt \"resourceId\" is not valid hex: {e}")))?,
		vault_address: opts.multi_sign_address.clone(),
		fee: opts.fee,
	};

	let chain_name = chain.name.clone();
	let listener_router: Arc<dyn Router> = router.clone();
	let listener_stop = stop_rx.clone();
	let listener_fatal_tx = fatal_tx.clone();
	let listener_connection = Arc::clone(&connection);
	let listener_ledger = Arc::clone(&ledger);
	let listener_metrics = metrics.clone();
	let listener_handle = async_std::task::spawn(async move {
		let result = listener::run(
			listener_connection,
			listener_ledger,
			block_store,
			listener_router,
			listener_metrics,
			health,
			Arc::new(listener::Cursor::default()),
			listener_config,
			start_height,
			listener_stop,
		)
		.await;
		if let Err(error) = result {
			let _ = listener_fatal_tx.send(format!("[{chain_name}] listener: {error}")).await;
		}
	});

	let mut writer_stop = stop_rx;
	let mut inbound = inbound;
	let writer_connection = Arc::clone(&connection);
	let writer_ledger = Arc::clone(&ledger);
	let writer_relayer = Arc::clone(&relayer);
	let writer_metrics = metrics;
	let writer_handle = async_std::task::spawn(async move {
		loop {
			futures::select! {
				incoming = inbound.recv().fuse() => {
					match incoming {
						Ok(message) => {
							async_std::task::spawn(writer::resolve_message(
								Arc::clone(&writer_connection),
								Arc::clone(&writer_ledger),
								Arc::clone(&writer_relayer),
								in_flight.clone(),
								writer_metrics.clone(),
								message,
								writer_stop.clone(),
							));
						},
						Err(_) => break,
					}
				},
				_ = writer_stop.recv().fuse() => break,
			}
		}
	});

	Ok(vec![listener_handle, writer_handle])
}
