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

use codec::{Decode, Encode};
use scale_info::TypeInfo;
use std::fmt;

/// Identifies one chain within the federation. Stable for the lifetime of a deployment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode, TypeInfo)]
pub struct ChainId(pub u8);

impl fmt::Display for ChainId {
	fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
		write!(fmt, "{}", self.0)
	}
}

impl From<u8> for ChainId {
	fn from(id: u8) -> Self {
		ChainId(id)
	}
}

/// Identifies an asset class. Maps, on-chain, to a handler method name.
#[derive(Clone, Copy, Encode, Decode, TypeInfo)]
pub struct ResourceId(pub [u8; 32]);

impl ResourceId {
	/// Builds a resource id from a hex string, with or without the `0x` prefix.
	pub fn from_hex(hex_str: &str) -> Result<Self, hex::FromHexError> {
		let trimmed = hex_str.strip_prefix("0x").unwrap_or(hex_str);
		let mut bytes = [0u8; 32];
		hex::decode_to_slice(trimmed, &mut bytes)?;
		Ok(ResourceId(bytes))
	}
}

impl fmt::Debug for ResourceId {
	fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
		write!(fmt, "0x{}", hex::encode(self.0))
	}
}

impl fmt::Display for ResourceId {
	fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
		fmt::Debug::fmt(self, fmt)
	}
}

impl PartialEq for ResourceId {
	fn eq(&self, other: &Self) -> bool {
		self.0 == other.0
	}
}
impl Eq for ResourceId {}

/// Bridge-wide unique identifier of one deposit, derived as
/// `block_height * 10^k + extrinsic_index`. Used by the destination chain to
/// de-duplicate settlement of the same deposit across retries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode, TypeInfo)]
pub struct DepositNonce(pub u64);

impl DepositNonce {
	/// The multiplier `k` applied to the block height before the extrinsic index is added.
	///
	/// `k = 1` tolerates up to 10 extrinsics per block before two deposits in the same block
	/// could in principle collide; a substrate block with heavier extrinsic counts should use
	/// a larger `k`. Kept as an associated constant rather than a magic number scattered through
	/// the decoder and the listener.
	pub const NONCE_MULTIPLIER: u64 = 10;

	/// Derives a deposit nonce from a block height and the index of the triggering extrinsic
	/// within that block.
	pub fn derive(block_height: u64, extrinsic_index: u32) -> Self {
		DepositNonce(block_height * Self::NONCE_MULTIPLIER + u64::from(extrinsic_index))
	}
}

impl From<u64> for DepositNonce {
	fn from(nonce: u64) -> Self {
		DepositNonce(nonce)
	}
}

impl fmt::Display for DepositNonce {
	fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
		write!(fmt, "{}", self.0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn derive_is_unique_for_up_to_ten_extrinsics_per_block() {
		let block = 1_000_000u64;
		let nonces: Vec<_> = (0..10).map(|i| DepositNonce::derive(block, i)).collect();
		let mut sorted = nonces.clone();
		sorted.sort();
		sorted.dedup();
		assert_eq!(nonces.len(), sorted.len());
	}

	#[test]
	fn derive_matches_off_by_one_guard_scenario() {
		// h=1_000_000, extrinsic_index=0, k=1 => nonce = 10_000_000
		assert_eq!(DepositNonce::derive(1_000_000, 0), DepositNonce(10_000_000));
	}

	#[test]
	fn resource_id_from_hex_accepts_both_prefixed_and_bare() {
		let hex_str = "11".repeat(32);
		let with_prefix = ResourceId::from_hex(&format!("0x{hex_str}")).unwrap();
		let without_prefix = ResourceId::from_hex(&hex_str).unwrap();
		assert_eq!(with_prefix, without_prefix);
		assert_eq!(with_prefix.0[0], 0x11);
	}
}
