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

//! A small, file-backed SR25519 keystore: one JSON file per account under a configured
//! directory, holding its SS58 address and BIP-39 mnemonic. Key management proper (HSMs,
//! encrypted-at-rest secrets, rotation) is an external collaborator's concern; this crate only
//! needs enough of it to let an operator generate or import the handful of relayer keys a
//! federation member runs, per the `accounts generate|import|list` surface the original
//! command-line tool exposed.

use crate::error::{Error, Result};

use serde::{Deserialize, Serialize};
use sp_core::crypto::{Pair as _, Ss58Codec};
use sp_core::sr25519;
use std::path::{Path, PathBuf};

/// One stored account: its public address and the secret material to reconstruct its keypair.
#[derive(Clone, Serialize, Deserialize)]
struct StoredAccount {
	address: String,
	mnemonic: String,
}

/// An on-disk directory of SR25519 accounts, one JSON file per address.
pub struct Keystore {
	directory: PathBuf,
}

impl Keystore {
	/// Opens (and creates, if absent) the keystore directory.
	pub fn open(directory: &Path) -> Result<Self> {
		std::fs::create_dir_all(directory)?;
		Ok(Keystore { directory: directory.to_path_buf() })
	}

	/// Generates a fresh keypair, persists it, and returns its SS58 address.
	pub fn generate(&self) -> Result<String> {
		let (pair, mnemonic, _) = sr25519::Pair::generate_with_phrase(None);
		self.persist(&pair, &mnemonic)
	}

	/// Imports a keypair from an existing BIP-39 mnemonic (optionally followed by a derivation
	/// path, e.g. `"<phrase>//hard/soft"`), and returns its SS58 address.
	pub fn import(&self, mnemonic_or_uri: &str) -> Result<String> {
		let (pair, _) = sr25519::Pair::from_phrase(mnemonic_or_uri, None)
			.map_err(|_| Error::Keystore(format!("{mnemonic_or_uri:?} is not a valid mnemonic phrase")))?;
		self.persist(&pair, mnemonic_or_uri)
	}

	fn persist(&self, pair: &sr25519::Pair, mnemonic: &str) -> Result<String> {
		let address = pair.public().to_ss58check();
		let stored = StoredAccount { address: address.clone(), mnemonic: mnemonic.to_string() };
		let path = self.directory.join(format!("{address}.json"));
		std::fs::write(&path, serde_json::to_vec_pretty(&stored).expect("StoredAccount always serializes; qed"))?;
		Ok(address)
	}

	/// Every address this keystore currently holds.
	pub fn list(&self) -> Result<Vec<String>> {
		let mut addresses = Vec::new();
		for entry in std::fs::read_dir(&self.directory)? {
			let entry = entry?;
			if entry.path().extension().and_then(|ext| ext.to_str()) != Some("json") {
				continue;
			}
			let contents = std::fs::read_to_string(entry.path())?;
			let stored: StoredAccount = serde_json::from_str(&contents)
				.map_err(|e| Error::Keystore(format!("{}: {e}", entry.path().display())))?;
			addresses.push(stored.address);
		}
		addresses.sort();
		Ok(addresses)
	}

	/// Loads the keypair for `address`, for signing.
	pub fn load(&self, address: &str) -> Result<sr25519::Pair> {
		let path = self.directory.join(format!("{address}.json"));
		let contents = std::fs::read_to_string(&path)
			.map_err(|_| Error::Keystore(format!("no stored key for address {address:?}")))?;
		let stored: StoredAccount =
			serde_json::from_str(&contents).map_err(|e| Error::Keystore(format!("{}: {e}", path.display())))?;
		let (pair, _) = sr25519::Pair::from_phrase(&stored.mnemonic, None)
			.map_err(|_| Error::Keystore(format!("corrupt mnemonic for address {address:?}")))?;
		Ok(pair)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;

	#[test]
	fn generate_then_list_round_trips() {
		let dir = tempdir().unwrap();
		let keystore = Keystore::open(dir.path()).unwrap();
		let address = keystore.generate().unwrap();
		assert_eq!(keystore.list().unwrap(), vec![address]);
	}

	#[test]
	fn generate_then_load_recovers_same_public_key() {
		let dir = tempdir().unwrap();
		let keystore = Keystore::open(dir.path()).unwrap();
		let address = keystore.generate().unwrap();
		let pair = keystore.load(&address).unwrap();
		assert_eq!(pair.public().to_ss58check(), address);
	}

	#[test]
	fn import_rejects_garbage_phrase() {
		let dir = tempdir().unwrap();
		let keystore = Keystore::open(dir.path()).unwrap();
		assert!(keystore.import("not a mnemonic").is_err());
	}
}
