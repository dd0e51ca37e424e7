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

//! One federation member's view of itself: its keyring, its position `my_index` in `[1, N]`,
//! and the other signatories it must list (sorted, excluding itself) on every `as_multi` call,
//! per the data model's [`crate::ledger::MultiSigRecord`] and the pallet's own ordering
//! requirement.

use crate::config::SubstrateOpts;
use crate::error::{Error, Result};

use sp_core::crypto::{AccountId32, Ss58Codec};
use sp_core::sr25519;

/// This relayer's identity within the federation, derived once at startup and held for the
/// life of the process (the data model's `Relayer` entity).
pub struct Relayer {
	/// Signing keypair loaded from the keystore.
	pub keypair: sr25519::Pair,
	/// This relayer's own account id.
	pub address: AccountId32,
	/// Lowercase hex (no `0x`) form of `address`, the comparison form used throughout the core.
	pub address_hex: String,
	/// The other `N-1` signatories, sorted ascending as the multi-sig pallet requires them
	/// passed, excluding this relayer's own address.
	pub other_signatories: Vec<AccountId32>,
	/// Total federation size `N`.
	pub total_relayers: u16,
	/// Approval threshold `T`.
	pub threshold: u16,
	/// This relayer's 1-indexed position in `[1, N]`.
	pub my_index: u16,
	/// Max weight budget to open a new `as_multi` proposal with, from configuration.
	pub max_weight_ref_time: u64,
	/// Fee parameters the Writer settles every message's amount against before building the
	/// inner `transfer_keep_alive` call.
	pub fee: bridge_primitives::FeeParams,
}

impl Relayer {
	/// Builds a `Relayer` from a loaded keypair and the chain's parsed substrate options.
	pub fn new(keypair: sr25519::Pair, opts: &SubstrateOpts) -> Result<Self> {
		if opts.current_relayer_number == 0 || opts.current_relayer_number > opts.total_relayer {
			return Err(Error::Config(format!(
				"CurrentRelayerNumber {} is out of range [1, {}]",
				opts.current_relayer_number, opts.total_relayer
			)));
		}
		let mut other_signatories = Vec::with_capacity(opts.other_relayers.len());
		for hex_address in &opts.other_relayers {
			other_signatories.push(parse_account_id(hex_address)?);
		}
		other_signatories.sort();

		let address = AccountId32::from(keypair.public());
		Ok(Relayer {
			address_hex: hex::encode(address.as_ref() as &[u8]),
			address,
			keypair,
			other_signatories,
			total_relayers: opts.total_relayer,
			threshold: opts.multi_sign_threshold,
			my_index: opts.current_relayer_number,
			max_weight_ref_time: opts.max_weight_ref_time,
			fee: opts.fee,
		})
	}
}

/// Parses a hex (with or without `0x`) or SS58 account identifier.
pub fn parse_account_id(address: &str) -> Result<AccountId32> {
	let trimmed = address.strip_prefix("0x").unwrap_or(address);
	if trimmed.len() == 64 && trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
		let mut bytes = [0u8; 32];
		hex::decode_to_slice(trimmed, &mut bytes)
			.map_err(|e| Error::Config(format!("{address:?} is not valid hex: {e}")))?;
		return Ok(AccountId32::from(bytes));
	}
	AccountId32::from_ss58check(address).map_err(|e| Error::Config(format!("{address:?} is not a valid account id: {e:?}")))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn opts(current: u16, total: u16, others: Vec<&str>) -> SubstrateOpts {
		SubstrateOpts {
			start_block: 0,
			use_extended_call: false,
			multi_sign_address: "aa".repeat(32),
			multi_sign_threshold: 2,
			total_relayer: total,
			current_relayer_number: current,
			other_relayers: others.into_iter().map(String::from).collect(),
			max_weight_ref_time: 1_000_000_000,
			secondary_url: None,
			dest_id: 1,
			resource_id: "00".repeat(32),
			fee: bridge_primitives::FeeParams::default(),
		}
	}

	#[test]
	fn other_signatories_are_sorted() {
		let low = "11".repeat(32);
		let high = "ff".repeat(32);
		let opts = opts(1, 3, vec![&high, &low]);
		let keypair = sr25519::Pair::from_seed(&[7u8; 32]);
		let relayer = Relayer::new(keypair, &opts).unwrap();
		assert_eq!(relayer.other_signatories, {
			let mut expected = vec![parse_account_id(&low).unwrap(), parse_account_id(&high).unwrap()];
			expected.sort();
			expected
		});
	}

	#[test]
	fn rejects_my_index_out_of_range() {
		let opts = opts(0, 3, vec!["11".repeat(32).as_str(), "22".repeat(32).as_str()]);
		let keypair = sr25519::Pair::from_seed(&[7u8; 32]);
		assert!(Relayer::new(keypair, &opts).is_err());
	}

	#[test]
	fn parse_account_id_accepts_hex_with_and_without_prefix() {
		let hex_str = "11".repeat(32);
		assert_eq!(parse_account_id(&hex_str).unwrap(), parse_account_id(&format!("0x{hex_str}")).unwrap());
	}
}
