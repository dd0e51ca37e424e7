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

//! Composes the three extrinsic shapes the external interfaces section names
//! (`balances.transfer_keep_alive`, `multisig.as_multi`, `utility.batch`/`system.remark`) and
//! signs them for submission.
//!
//! Call bytes are built as `[pallet_index, call_index, ..SCALE-encoded args]`, with the index
//! pair resolved fresh from the [`Connection`]'s metadata cache per call (see the design notes
//! on avoiding stringly-typed method names except at that one boundary).

use crate::connection::Connection;
use crate::error::Result;

use codec::{Compact, Encode};
use frame_support::weights::Weight;
use sp_core::crypto::AccountId32;
use sp_core::{blake2_256, sr25519, Pair, H256};
use sp_runtime::generic::{Era, UncheckedExtrinsic};
use sp_runtime::{MultiAddress, MultiSignature};

const PALLET_BALANCES: &str = "Balances";
const CALL_TRANSFER_KEEP_ALIVE: &str = "transfer_keep_alive";
const PALLET_MULTISIG: &str = "Multisig";
const CALL_AS_MULTI: &str = "as_multi";
const PALLET_UTILITY: &str = "Utility";
const CALL_BATCH: &str = "batch";
const CALL_BATCH_ALL: &str = "batch_all";
const PALLET_SYSTEM: &str = "System";
const CALL_REMARK: &str = "remark";

/// `(block_height, extrinsic_index)` uniquely identifying an open multi-sig proposal, per the
/// glossary. Represented as a tagged variant internally (see the design notes), serialized to
/// the pallet's `Option<TimePoint>` wire shape only at the submission boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, codec::Decode)]
pub struct TimePoint {
	/// Height of the block the proposal was opened in.
	pub height: u32,
	/// Index of the `as_multi` extrinsic that opened it within that block.
	pub index: u32,
}

/// Extra, chain-facing weight budget named `MaxWeight` in configuration.
#[derive(Clone, Copy, Debug)]
pub struct MaxWeight {
	/// Reference time component.
	pub ref_time: u64,
}

impl MaxWeight {
	fn as_weight(self) -> Weight {
		Weight::from_parts(self.ref_time, 0)
	}
}

/// Encodes `[pallet_index, call_index]` followed by already-SCALE-encoded `args`.
fn encoded_call(pallet: u8, call: u8, args: impl Encode) -> Vec<u8> {
	let mut out = Vec::with_capacity(2 + 64);
	out.push(pallet);
	out.push(call);
	args.encode_to(&mut out);
	out
}

/// Builds the three extrinsic shapes this relayer submits, resolving pallet/call indices from
/// the connection's metadata on every call.
pub struct CallBuilder<'a> {
	connection: &'a Connection,
}

impl<'a> CallBuilder<'a> {
	/// Creates a builder over `connection`.
	pub fn new(connection: &'a Connection) -> Self {
		CallBuilder { connection }
	}

	/// `balances.transfer_keep_alive(dest, amount)`.
	pub async fn transfer_keep_alive(&self, dest: AccountId32, amount: u128) -> Result<Vec<u8>> {
		let index = self.connection.call_index(PALLET_BALANCES, CALL_TRANSFER_KEEP_ALIVE).await?;
		let dest: MultiAddress<AccountId32, ()> = MultiAddress::Id(dest);
		Ok(encoded_call(index.pallet, index.call, (dest, Compact(amount))))
	}

	/// `multisig.as_multi(threshold, other_signatories, maybe_timepoint, call_or_hash, store_call, max_weight)`.
	pub async fn as_multi(
		&self,
		threshold: u16,
		other_signatories: Vec<AccountId32>,
		maybe_timepoint: Option<TimePoint>,
		call_or_hash: Vec<u8>,
		store_call: bool,
		max_weight: MaxWeight,
	) -> Result<Vec<u8>> {
		let index = self.connection.call_index(PALLET_MULTISIG, CALL_AS_MULTI).await?;
		Ok(encoded_call(
			index.pallet,
			index.call,
			(threshold, other_signatories, maybe_timepoint, call_or_hash, store_call, max_weight.as_weight()),
		))
	}

	/// `utility.batch(calls)`, used only to recognize deposit intents; this relayer never
	/// constructs one itself.
	pub async fn batch_call_index(&self) -> Result<crate::metadata::CallIndex> {
		self.connection.call_index(PALLET_UTILITY, CALL_BATCH).await
	}

	/// `utility.batch_all(calls)`, the atomic sibling of `batch`.
	pub async fn batch_all_call_index(&self) -> Result<crate::metadata::CallIndex> {
		self.connection.call_index(PALLET_UTILITY, CALL_BATCH_ALL).await
	}

	/// `system.remark(bytes)`, used only to recognize the destination-address leg of a deposit
	/// intent batch.
	pub async fn remark_call_index(&self) -> Result<crate::metadata::CallIndex> {
		self.connection.call_index(PALLET_SYSTEM, CALL_REMARK).await
	}
}

/// Signs `call` (already SCALE-encoded, pallet/call-index-prefixed) as an immortal, zero-tip
/// extrinsic from `signer`, using a freshly-read account nonce and the chain's current runtime
/// version. Mirrors the signing payload construction historically used by this bridge's
/// substrate client, generalized away from a compiled runtime's generated `Call`/`Runtime`
/// types (which this crate, built against an arbitrary Chain-S, does not have) to operate on
/// pre-encoded call bytes directly.
pub async fn sign_and_encode(connection: &Connection, signer: &sr25519::Pair, call: Vec<u8>) -> Result<Vec<u8>> {
	let genesis_hash = connection.block_hash(0).await?;
	let runtime_version = connection.runtime_version().await?;
	let account = AccountId32::from(signer.public());
	let nonce = connection.account_next_index(&account.to_string()).await?;

	let era = Era::immortal();
	let extra: SignedExtra = (era, Compact(nonce), Compact(0u128));
	let additional: AdditionalSigned = (
		runtime_version.spec_version,
		runtime_version.transaction_version,
		genesis_hash,
		genesis_hash,
		(),
		(),
		(),
	);

	let raw_payload = (RawCall(call.clone()), extra, additional).encode();
	let signature = if raw_payload.len() > 256 {
		signer.sign(&blake2_256(&raw_payload))
	} else {
		signer.sign(&raw_payload)
	};

	let extrinsic: UncheckedExtrinsic<MultiAddress<AccountId32, ()>, RawCall, MultiSignature, SignedExtra> =
		UncheckedExtrinsic::new_signed(
			RawCall(call),
			MultiAddress::Id(account),
			MultiSignature::Sr25519(signature),
			extra,
		);
	Ok(extrinsic.encode())
}

/// Pre-encoded call bytes, wrapped so they can sit in the `Call` type parameter of
/// [`sp_runtime::generic::UncheckedExtrinsic`] without this crate needing a concrete,
/// compiled-runtime `Call` enum. `Encode` just emits the bytes verbatim (they already carry
/// their own pallet/call-index prefix); `Decode` is never used, since this relayer never
/// executes a call it built itself, only submits it.
#[derive(Clone, Debug, PartialEq, Eq)]
struct RawCall(Vec<u8>);

impl Encode for RawCall {
	fn encode_to<T: codec::Output + ?Sized>(&self, dest: &mut T) {
		dest.write(&self.0);
	}
}

/// `(Era, Compact<Nonce>, Compact<Balance>)`: the signed extensions whose *values* are carried
/// in the extrinsic itself. `CheckSpecVersion`/`CheckTxVersion`/`CheckGenesis`/`CheckWeight`
/// contribute nothing to the wire encoding (their data lives only in `AdditionalSigned`), so
/// they are omitted here rather than encoded as zero-sized placeholders.
type SignedExtra = (Era, Compact<u32>, Compact<u128>);

/// `(spec_version, transaction_version, genesis_hash, mortality_checkpoint_hash, (), (), ())`:
/// signed but not included in the extrinsic; folded into the signature only.
type AdditionalSigned = (u32, u32, H256, H256, (), (), ());

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn encoded_call_writes_pallet_and_call_prefix() {
		let bytes = encoded_call(5, 9, Compact(42u128));
		assert_eq!(bytes[0], 5);
		assert_eq!(bytes[1], 9);
		assert_eq!(&bytes[2..], &Compact(42u128).encode()[..]);
	}

	#[test]
	fn raw_call_encode_emits_bytes_verbatim() {
		let raw = RawCall(vec![1, 2, 3]);
		assert_eq!(raw.encode(), vec![1, 2, 3]);
	}

	#[test]
	fn timepoint_round_trips() {
		let tp = TimePoint { height: 10, index: 2 };
		let encoded = tp.encode();
		let decoded = TimePoint::decode(&mut &encoded[..]).unwrap();
		assert_eq!(tp, decoded);
	}
}
