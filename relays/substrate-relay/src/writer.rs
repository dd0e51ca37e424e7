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

//! The Writer: one long-lived cooperative task per [`Message`], round-gated by
//! [`crate::round`], that either opens a new `multisig.as_multi` proposal or approves an
//! existing one, then exits the tick without waiting for inclusion — the Listener's decode of
//! the next block is the authoritative signal for what actually happened on-chain.
//!
//! The in-flight guard keyed on `(destination, amount)` is what keeps two deposits to the same
//! recipient for the same amount from racing to propose against the same call-hash; see the
//! concurrency scenario in the testable properties section.

use crate::calls::{CallBuilder, MaxWeight, TimePoint};
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::ledger::MultiSigLedger;
use crate::metrics::BridgeMetrics;
use crate::relayer::{parse_account_id, Relayer};
use crate::round;

use bridge_primitives::Message;

use async_std::sync::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Maximum number of round re-entries a message gets before it is abandoned, per the writer's
/// per-message retry budget.
pub const WRITER_RETRY_BUDGET: u32 = 5;

/// Final outcome of resolving one message, reported to the caller purely for logging/metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
	/// The matching multi-sig record was already `executed = true`.
	Finished,
	/// This relayer had already voted on the matching multi-sig record.
	AlreadyVoted,
	/// The writer's retry budget was exhausted without observing execution.
	RetriesExhausted,
}

/// Tracks `(destination, amount)` pairs currently being resolved by some Writer task, so a
/// second message to the same pair waits rather than racing to propose against the same
/// call-hash.
#[derive(Default, Clone)]
pub struct InFlightGuard {
	keys: Arc<Mutex<HashSet<(String, String)>>>,
}

impl InFlightGuard {
	/// Creates an empty guard.
	pub fn new() -> Self {
		InFlightGuard::default()
	}

	/// Attempts to claim `(destination, amount)`; `true` if this caller now owns the slot.
	async fn try_claim(&self, destination: &str, amount: &str) -> bool {
		self.keys.lock().await.insert((destination.to_string(), amount.to_string()))
	}

	/// Releases a previously claimed `(destination, amount)` pair.
	async fn release(&self, destination: &str, amount: &str) {
		self.keys.lock().await.remove(&(destination.to_string(), amount.to_string()));
	}
}

/// Resolves `message` against the multi-sig ledger, one round at a time, until it finishes,
/// its retry budget is exhausted, or `stop` fires.
pub async fn resolve_message(
	connection: Arc<Connection>,
	ledger: Arc<MultiSigLedger>,
	relayer: Arc<Relayer>,
	in_flight: InFlightGuard,
	metrics: BridgeMetrics,
	message: Message,
	mut stop: async_std::channel::Receiver<()>,
) -> Result<Outcome> {
	let chain_name = connection.chain_name().to_string();
	let builder = CallBuilder::new(&connection);

	// `message.amount` is the pre-fee, source-chain-denominated deposit; every comparison and
	// on-chain transfer from here on uses the settled, post-fee amount instead.
	let settlement = relayer.fee.settle(message.amount)?;
	let amount_string = settlement.settled_amount.to_string();
	let mut retries = WRITER_RETRY_BUDGET;

	loop {
		if stop.try_recv().is_ok() {
			return Err(Error::RetriesExhausted(format!("writer stopped before message {} finished", message.nonce)));
		}

		let finalized = connection.latest_finalized_header().await?;
		let current_round = finalized.number % relayer.total_relayers as u64;
		if !round::my_turn(relayer.total_relayers, relayer.my_index, message.nonce.0, current_round) {
			sleep_or_stop(round::ROUND_INTERVAL, &mut stop).await;
			continue;
		}

		if !in_flight.try_claim(&destination_hex(&message), &amount_string).await {
			sleep_or_stop(round::ROUND_INTERVAL * relayer.total_relayers as u32, &mut stop).await;
			continue;
		}
		let claim_guard = ClaimGuard { in_flight: &in_flight, destination: destination_hex(&message), amount: amount_string.clone() };

		let outcome =
			tick(&connection, &ledger, &relayer, &builder, &message, settlement.settled_amount, &amount_string).await;
		drop(claim_guard);

		match outcome {
			Ok(Some(result)) => return Ok(result),
			Ok(None) => {
				retries -= 1;
				if retries == 0 {
					metrics.inc_writer_retries_exhausted(&chain_name);
					log::error!(target: "bridge", "[{chain_name}] writer retry budget exhausted for message {}", message.nonce);
					return Ok(Outcome::RetriesExhausted);
				}
				sleep_or_stop(round::ROUND_INTERVAL, &mut stop).await;
			},
			Err(error) => {
				log::warn!(target: "bridge", "[{chain_name}] writer error on message {}: {error}", message.nonce);
				retries -= 1;
				if retries == 0 {
					metrics.inc_writer_retries_exhausted(&chain_name);
					return Ok(Outcome::RetriesExhausted);
				}
				sleep_or_stop(round::ROUND_INTERVAL, &mut stop).await;
			},
		}
	}
}

/// One round's decision, per the writer's per-tick decision in the component design. Returns
/// `Some(outcome)` once the message is settled (either way), `None` to re-enter next round.
async fn tick(
	connection: &Connection,
	ledger: &MultiSigLedger,
	relayer: &Relayer,
	builder: &CallBuilder<'_>,
	message: &Message,
	settled_amount: u128,
	amount_string: &str,
) -> Result<Option<Outcome>> {
	let destination_hex_str = destination_hex(message);
	let destination_account = parse_account_id(&destination_hex_str)?;

	let inner_call = builder.transfer_keep_alive(destination_account, settled_amount).await?;

	let existing = ledger.find_live(&destination_hex_str, amount_string).await;
	let (maybe_timepoint, max_weight, threshold, other_signatories) = match &existing {
		Some(record) => {
			if record.executed {
				return Ok(Some(Outcome::Finished));
			}
			if record.voted_groups.contains(&relayer.address_hex) {
				return Ok(Some(Outcome::AlreadyVoted));
			}
			let timepoint = TimePoint { height: record.origin.block as u32, index: record.origin.index };
			let other_signatories =
				record.other_signatories.iter().map(|hex| parse_account_id(hex)).collect::<Result<Vec<_>>>()?;
			(Some(timepoint), MaxWeight { ref_time: record.max_weight_ref_time }, record.threshold, other_signatories)
		},
		None => {
			(None, MaxWeight { ref_time: relayer.max_weight_ref_time }, relayer.threshold, relayer.other_signatories.clone())
		},
	};

	let call = builder
		.as_multi(threshold, other_signatories, maybe_timepoint, inner_call, false, max_weight)
		.await?;
	let extrinsic = crate::calls::sign_and_encode(connection, &relayer.keypair, call).await?;
	match connection.submit_and_watch(extrinsic).await {
		Ok(_tx_hash) => {},
		Err(error) => log::warn!(target: "bridge", "submit_and_watch failed: {error}, will retry next round"),
	}

	Ok(None)
}

fn destination_hex(message: &Message) -> String {
	hex::encode(message.recipient.as_bytes())
}

struct ClaimGuard<'a> {
	in_flight: &'a InFlightGuard,
	destination: String,
	amount: String,
}

impl Drop for ClaimGuard<'_> {
	fn drop(&mut self) {
		let in_flight = self.in_flight.clone();
		let destination = std::mem::take(&mut self.destination);
		let amount = std::mem::take(&mut self.amount);
		async_std::task::spawn(async move {
			in_flight.release(&destination, &amount).await;
		});
	}
}

async fn sleep_or_stop(duration: Duration, stop: &mut async_std::channel::Receiver<()>) {
	use futures::FutureExt;
	futures::select! {
		_ = async_std::task::sleep(duration).fuse() => {},
		_ = stop.recv().fuse() => {},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[async_std::test]
	async fn in_flight_guard_serializes_identical_keys() {
		let guard = InFlightGuard::new();
		assert!(guard.try_claim("dest", "100").await);
		assert!(!guard.try_claim("dest", "100").await);
		guard.release("dest", "100").await;
		assert!(guard.try_claim("dest", "100").await);
	}

	#[async_std::test]
	async fn in_flight_guard_allows_distinct_keys_concurrently() {
		let guard = InFlightGuard::new();
		assert!(guard.try_claim("dest-a", "100").await);
		assert!(guard.try_claim("dest-b", "100").await);
	}
}
