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

//! Persists the Listener's block cursor: a single small file per `(chain-id, relayer-address)`,
//! holding the decimal height of the last successfully processed block. No migration header;
//! overwrite semantics — the file is meaningless outside this process's own bookkeeping.

use crate::error::Result;
use std::path::{Path, PathBuf};

/// A single-file, single-writer persisted block cursor.
pub struct BlockStore {
	path: PathBuf,
}

impl BlockStore {
	/// Opens the cursor file for `chain_id`/`address` under `directory`, creating the directory
	/// if necessary. Does not read or create the file itself until [`Self::store`] is called.
	pub fn open(directory: &Path, chain_id: u8, address: &str) -> Result<Self> {
		std::fs::create_dir_all(directory)?;
		let path = directory.join(format!("{chain_id}-{address}"));
		Ok(BlockStore { path })
	}

	/// Overwrites the persisted cursor with `height`.
	pub fn store(&self, height: u64) -> Result<()> {
		std::fs::write(&self.path, height.to_string())?;
		Ok(())
	}

	/// Returns the persisted height, or `0` if the file is absent, empty, or unparseable — the
	/// caller treats `0` identically to "no cursor yet".
	pub fn try_load_latest(&self) -> u64 {
		std::fs::read_to_string(&self.path).ok().and_then(|s| s.trim().parse().ok()).unwrap_or(0)
	}
}

/// Resolves the height the Listener should actually start from, applying the precedence the
/// external interfaces section fixes: a fresh start always wins; `latest_block` defers to the
/// chain's current finalized height (the caller supplies it, since only the Connection knows
/// it); otherwise the larger of the persisted cursor and the configured `startBlock` wins, so a
/// lowered `startBlock` in configuration never rewinds past what's already been processed.
pub fn resolve_start_height(
	store: &BlockStore,
	configured_start_block: u64,
	fresh_start: bool,
	latest_block: bool,
	current_finalized_height: impl FnOnce() -> u64,
) -> u64 {
	if fresh_start {
		return configured_start_block;
	}
	if latest_block {
		return current_finalized_height();
	}
	store.try_load_latest().max(configured_start_block)
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;

	#[test]
	fn try_load_latest_defaults_to_zero_when_absent() {
		let dir = tempdir().unwrap();
		let store = BlockStore::open(dir.path(), 1, "5Grw").unwrap();
		assert_eq!(store.try_load_latest(), 0);
	}

	#[test]
	fn store_then_load_round_trips() {
		let dir = tempdir().unwrap();
		let store = BlockStore::open(dir.path(), 1, "5Grw").unwrap();
		store.store(12345).unwrap();
		assert_eq!(store.try_load_latest(), 12345);
	}

	#[test]
	fn fresh_start_overrides_persisted_cursor() {
		let dir = tempdir().unwrap();
		let store = BlockStore::open(dir.path(), 1, "5Grw").unwrap();
		store.store(500).unwrap();
		let height = resolve_start_height(&store, 100, true, false, || 9999);
		assert_eq!(height, 100);
	}

	#[test]
	fn latest_block_defers_to_finalized_height() {
		let dir = tempdir().unwrap();
		let store = BlockStore::open(dir.path(), 1, "5Grw").unwrap();
		store.store(500).unwrap();
		let height = resolve_start_height(&store, 100, false, true, || 9999);
		assert_eq!(height, 9999);
	}

	#[test]
	fn persisted_cursor_wins_over_lowered_start_block() {
		let dir = tempdir().unwrap();
		let store = BlockStore::open(dir.path(), 1, "5Grw").unwrap();
		store.store(500).unwrap();
		let height = resolve_start_height(&store, 100, false, false, || 9999);
		assert_eq!(height, 500);
	}
}
