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

//! The Listener: `Init -> Polling -> Stopped`. Polls finalized blocks forward from its cursor,
//! feeds every extrinsic through the [`crate::decoder`], mutates the [`crate::ledger`] it
//! exclusively owns, and hands every decoded deposit intent to the [`Router`] exactly once.
//!
//! Cursor advancement is the one thing this module must get right above all else: it only ever
//! happens after a block's extrinsics have all been folded into the ledger or turned into a
//! routed message, so a restart resumes from a block boundary, never mid-block.

use crate::block_store::BlockStore;
use crate::connection::{Connection, BLOCK_RETRY_INTERVAL};
use crate::decoder::{decode_block, ExtrinsicKind};
use crate::error::{Error, Result};
use crate::ledger::{MultiSigLedger, MultiSigRecord, RecordKey};
use crate::metrics::{BridgeMetrics, HealthState};

use bridge_primitives::{ChainId, DepositNonce, Message, ResourceId, Router};

use futures::FutureExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// How many consecutive non-`BlockNotReady` failures the Listener tolerates before treating a
/// block as poisoned and reporting fatal, per the error handling design.
const BLOCK_DECODE_RETRY_BUDGET: u32 = 10;

/// Everything the Listener needs to know about the chain it's watching that isn't carried by
/// the `Connection` itself.
pub struct ListenerConfig {
	/// This chain's id, stamped onto every emitted [`Message::source`].
	pub chain_id: ChainId,
	/// The chain deposit intents settle on.
	pub destination_chain_id: ChainId,
	/// Resource id of the bridged asset class.
	pub resource_id: ResourceId,
	/// Federation vault address, lowercase hex without `0x`, matched against decoded
	/// `UtilityBatch` destinations to recognize deposit intents.
	pub vault_address: String,
	/// Fee parameters used to compute the settled (post-fee) amount carried in the emitted
	/// message.
	pub fee: bridge_primitives::FeeParams,
}

/// Shared, externally-observable cursor the Writer's in-flight concurrency guard and any
/// external telemetry can read without taking the block store's file lock.
#[derive(Default)]
pub struct Cursor(AtomicU64);

impl Cursor {
	/// Current value.
	pub fn get(&self) -> u64 {
		self.0.load(Ordering::SeqCst)
	}

	fn set(&self, height: u64) {
		self.0.store(height, Ordering::SeqCst);
	}
}

/// Runs the Listener to completion: forever, until `stop` fires or a fatal error occurs.
///
/// `start_height` must already reflect the block-store/config-precedence resolution in
/// [`crate::block_store::resolve_start_height`]; this function only ever moves forward from it.
#[allow(clippy::too_many_arguments)]
pub async fn run(
	connection: Arc<Connection>,
	ledger: Arc<MultiSigLedger>,
	block_store: BlockStore,
	router: Arc<dyn Router>,
	metrics: BridgeMetrics,
	health: HealthState,
	cursor: Arc<Cursor>,
	config: ListenerConfig,
	start_height: u64,
	mut stop: async_std::channel::Receiver<()>,
) -> Result<()> {
	let chain_name = connection.chain_name().to_string();

	// Init: the chain's latest header must already be at or beyond our configured start.
	let finalized = connection.latest_finalized_header().await?;
	if finalized.number < start_height {
		return Err(Error::Config(format!(
			"{chain_name}: configured start block {start_height} is beyond the chain's current finalized head {}",
			finalized.number
		)));
	}

	let mut height = start_height;
	cursor.set(height);
	let mut retry_budget = BLOCK_DECODE_RETRY_BUDGET;

	loop {
		if stop.try_recv().is_ok() {
			return Ok(());
		}

		let finalized = connection.latest_finalized_header().await?;
		metrics.set_latest_known_block(&chain_name, finalized.number);

		if height > finalized.number {
			sleep_or_stop(BLOCK_RETRY_INTERVAL, &mut stop).await;
			continue;
		}

		let hash = match connection.block_hash(height).await {
			Ok(hash) => hash,
			Err(error) if error.is_block_not_ready() => {
				sleep_or_stop(BLOCK_RETRY_INTERVAL, &mut stop).await;
				continue;
			},
			Err(error) => {
				retry_budget = retry_budget.saturating_sub(1);
				if retry_budget == 0 {
					return Err(Error::RetriesExhausted(format!(
						"{chain_name}: giving up on block {height} after repeated errors: {error}"
					)));
				}
				log::warn!(target: "bridge", "[{chain_name}] error fetching hash for block {height}: {error}, retrying");
				sleep_or_stop(BLOCK_RETRY_INTERVAL, &mut stop).await;
				continue;
			},
		};

		match process_block(&connection, &ledger, &router, &metrics, &config, height, hash).await {
			Ok(()) => {
				block_store.store(height)?;
				health.touch(&chain_name).await;
				metrics.set_best_processed_block(&chain_name, height);
				height += 1;
				cursor.set(height);
				retry_budget = BLOCK_DECODE_RETRY_BUDGET;
			},
			Err(error) => {
				retry_budget = retry_budget.saturating_sub(1);
				if retry_budget == 0 {
					return Err(Error::RetriesExhausted(format!(
						"{chain_name}: giving up on block {height} after repeated errors: {error}"
					)));
				}
				log::warn!(target: "bridge", "[{chain_name}] error processing block {height}: {error}, retrying");
				sleep_or_stop(BLOCK_RETRY_INTERVAL, &mut stop).await;
			},
		}
	}
}

async fn sleep_or_stop(duration: std::time::Duration, stop: &mut async_std::channel::Receiver<()>) {
	futures::select! {
		_ = async_std::task::sleep(duration).fuse() => {},
		_ = stop.recv().fuse() => {},
	}
}

async fn process_block(
	connection: &Connection,
	ledger: &MultiSigLedger,
	router: &Arc<dyn Router>,
	metrics: &BridgeMetrics,
	config: &ListenerConfig,
	height: u64,
	hash: sp_core::H256,
) -> Result<()> {
	connection.update_metadata().await?;
	let block = connection.block(hash).await?;
	let metadata_snapshot = connection.metadata_snapshot().await?;
	let records = decode_block(&metadata_snapshot, &block.extrinsics);

	for record in records {
		match record.kind {
			ExtrinsicKind::AsMultiNew => {
				let Some(as_multi) = record.as_multi else { continue };
				let Some(destination) = as_multi.destination.clone() else { continue };
				let Some(destination_amount) = as_multi.destination_amount.clone() else { continue };
				ledger
					.mark_new(MultiSigRecord {
						origin: RecordKey { block: height, index: record.index },
						threshold: as_multi.threshold,
						other_signatories: as_multi.other_signatories.iter().map(|id| hex::encode(id.as_ref() as &[u8])).collect(),
						destination,
						destination_amount,
						voted_groups: Default::default(),
						executed: false,
						max_weight_ref_time: as_multi.max_weight_ref_time,
						store_call: as_multi.store_call,
						maybe_timepoint: as_multi.maybe_timepoint,
					})
					.await;
			},
			ExtrinsicKind::AsMultiApprove => {
				let Some(as_multi) = record.as_multi else { continue };
				let (Some(destination), Some(amount)) = (as_multi.destination, as_multi.destination_amount) else { continue };
				ledger.mark_vote(&destination, &amount, &as_multi.sender).await;
			},
			ExtrinsicKind::AsMultiExecuted => {
				let Some(as_multi) = record.as_multi else { continue };
				let (Some(destination), Some(amount)) = (as_multi.destination, as_multi.destination_amount) else { continue };
				ledger.mark_vote(&destination, &amount, &as_multi.sender).await;
				ledger.mark_executed(&destination, &amount).await;
			},
			ExtrinsicKind::UtilityBatch => {
				let Some(batch) = record.utility_batch else { continue };
				if !batch.vault_destination.eq_ignore_ascii_case(&config.vault_address) {
					continue;
				}
				let Ok(deposit_amount) = batch.amount.parse::<u128>() else { continue };
				// Settling here only validates the deposit clears the fixed fee (see P7); the
				// message itself still carries the pre-fee amount, which the Writer settles
				// again immediately before building the transfer.
				if let Err(error) = config.fee.settle(deposit_amount) {
					log::warn!(
						target: "bridge",
						"rejecting deposit intent at block {height} extrinsic {}: {error}",
						record.index,
					);
					continue;
				}
				let nonce = DepositNonce::derive(height, record.index);
				let message = Message::fungible(
					config.chain_id,
					config.destination_chain_id,
					nonce,
					config.resource_id,
					deposit_amount,
					batch.recipient,
				);
				if let Err(error) = router.send(message).await {
					log::error!(target: "bridge", "router failed to accept message with nonce {nonce}: {error}");
				} else {
					metrics.inc_messages_resolved(connection.chain_name());
				}
			},
			ExtrinsicKind::Other => {},
		}
	}

	Ok(())
}
