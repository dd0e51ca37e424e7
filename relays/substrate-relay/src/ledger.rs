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

//! The MultiSig Ledger: the Listener's view of every open `as_multi` proposal.
//!
//! One writer (the Listener, via `mark_*`), many readers (one Writer task per in-flight
//! message, via `find_live`). Guarded by a single mutex; critical sections are an insert or a
//! short iterate-and-update over a small map, so lock contention is not expected to matter.
//!
//! `mark_vote` is also where a record's `executed` flag gets set: the multi-sig pallet dispatches
//! the inner call inline, within whichever approval crosses the threshold, with no distinct
//! on-chain shape to tell that approval apart from an earlier one (see the decoder's module
//! documentation). Counting votes against the record's own threshold here is equivalent and
//! avoids a second, event-driven decode path.

use async_std::sync::Mutex;
use std::collections::{HashMap, HashSet};

use crate::calls::TimePoint;

/// `(block_height, extrinsic_index)` of the `as_multi` extrinsic that opened a proposal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RecordKey {
	/// Height of the block the proposal was opened in.
	pub block: u64,
	/// Index of the opening extrinsic within that block.
	pub index: u32,
}

/// One open (or just-closed) multi-sig proposal.
#[derive(Clone, Debug)]
pub struct MultiSigRecord {
	/// Where the proposal was opened.
	pub origin: RecordKey,
	/// Approval threshold.
	pub threshold: u16,
	/// The other signatories, excluding the proposer, as lowercase hex without `0x`.
	pub other_signatories: Vec<String>,
	/// Destination account, lowercase hex without `0x`.
	pub destination: String,
	/// Destination amount, decimal string, matching the Writer's post-fee computation.
	pub destination_amount: String,
	/// Identifiers (hex account ids) of relayers who have voted so far, not counting the
	/// proposer's implicit first vote.
	pub voted_groups: HashSet<String>,
	/// Set once voted_groups has grown enough to cross `threshold`.
	pub executed: bool,
	/// Max weight budget the proposal was opened with.
	pub max_weight_ref_time: u64,
	/// Whether the proposal requested the inner call be stored on-chain.
	pub store_call: bool,
	/// `None` if this record was created by an `AsMultiNew` observation and has not yet been
	/// explicitly re-timepointed; present once an approval has been seen.
	pub maybe_timepoint: Option<TimePoint>,
}

impl MultiSigRecord {
	fn matches(&self, destination: &str, amount: &str) -> bool {
		self.destination.eq_ignore_ascii_case(destination) && self.destination_amount == amount
	}

	fn vote_count(&self) -> usize {
		// The proposer's opening `as_multi` counts as the first approval.
		self.voted_groups.len() + 1
	}
}

/// In-memory `(block, index) -> MultiSigRecord` map with `(destination, amount)` lookups.
#[derive(Default)]
pub struct MultiSigLedger {
	records: Mutex<HashMap<RecordKey, MultiSigRecord>>,
}

impl MultiSigLedger {
	/// Creates an empty ledger.
	pub fn new() -> Self {
		MultiSigLedger { records: Mutex::new(HashMap::new()) }
	}

	/// Inserts `record` keyed by its origin. Idempotent: an existing record at the same key is
	/// left untouched, since re-observing the same `AsMultiNew` (e.g. after a listener restart)
	/// must not reset its vote history.
	pub async fn mark_new(&self, record: MultiSigRecord) {
		let mut guard = self.records.lock().await;
		guard.entry(record.origin).or_insert(record);
	}

	/// Records `voter` as having approved every live record matching `(destination, amount)`,
	/// and marks any of them executed once their vote count reaches threshold.
	pub async fn mark_vote(&self, destination: &str, amount: &str, voter: &str) {
		let mut guard = self.records.lock().await;
		for record in guard.values_mut() {
			if record.executed || !record.matches(destination, amount) {
				continue;
			}
			record.voted_groups.insert(voter.to_string());
			if record.vote_count() >= record.threshold as usize {
				record.executed = true;
			}
		}
	}

	/// Forces every live record matching `(destination, amount)` to `executed = true`,
	/// regardless of vote count. Exposed for callers with an authoritative external signal
	/// (e.g. a manual reconciliation); the steady-state path is threshold-crossing in
	/// [`Self::mark_vote`].
	pub async fn mark_executed(&self, destination: &str, amount: &str) {
		let mut guard = self.records.lock().await;
		for record in guard.values_mut() {
			if record.matches(destination, amount) {
				record.executed = true;
			}
		}
	}

	/// The first live (not executed) record matching `(destination, amount)`, if any.
	pub async fn find_live(&self, destination: &str, amount: &str) -> Option<MultiSigRecord> {
		let guard = self.records.lock().await;
		guard.values().find(|record| !record.executed && record.matches(destination, amount)).cloned()
	}

	/// Removes the record at `key`, once the Writer has confirmed execution of its own message.
	pub async fn remove(&self, key: RecordKey) {
		self.records.lock().await.remove(&key);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample(origin_index: u32, threshold: u16) -> MultiSigRecord {
		MultiSigRecord {
			origin: RecordKey { block: 100, index: origin_index },
			threshold,
			other_signatories: vec!["bb".repeat(32), "cc".repeat(32)],
			destination: "11".repeat(20),
			destination_amount: "9960000000000".to_string(),
			voted_groups: HashSet::new(),
			executed: false,
			max_weight_ref_time: 1_000_000_000,
			store_call: false,
			maybe_timepoint: None,
		}
	}

	#[async_std::test]
	async fn mark_new_is_idempotent() {
		let ledger = MultiSigLedger::new();
		ledger.mark_new(sample(0, 2)).await;
		ledger.mark_new(sample(0, 2)).await;
		assert!(ledger.find_live(&"11".repeat(20), "9960000000000").await.is_some());
	}

	#[async_std::test]
	async fn mark_vote_executes_at_threshold() {
		let ledger = MultiSigLedger::new();
		ledger.mark_new(sample(0, 2)).await;
		let dest = "11".repeat(20);
		assert!(ledger.find_live(&dest, "9960000000000").await.is_some());

		ledger.mark_vote(&dest, "9960000000000", &"bb".repeat(32)).await;
		assert!(ledger.find_live(&dest, "9960000000000").await.is_none());
	}

	#[async_std::test]
	async fn mark_vote_affects_overlapping_records_with_same_dest_and_amount() {
		let ledger = MultiSigLedger::new();
		ledger.mark_new(sample(0, 3)).await;
		ledger.mark_new(sample(1, 3)).await;
		let dest = "11".repeat(20);

		ledger.mark_vote(&dest, "9960000000000", &"bb".repeat(32)).await;
		ledger.mark_vote(&dest, "9960000000000", &"cc".repeat(32)).await;

		assert!(ledger.find_live(&dest, "9960000000000").await.is_none());
	}

	#[async_std::test]
	async fn remove_drops_record() {
		let ledger = MultiSigLedger::new();
		ledger.mark_new(sample(0, 2)).await;
		ledger.remove(RecordKey { block: 100, index: 0 }).await;
		assert!(ledger.find_live(&"11".repeat(20), "9960000000000").await.is_none());
	}
}
