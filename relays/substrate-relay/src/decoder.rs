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

//! Classifies and decodes a block's raw extrinsics.
//!
//! Every extrinsic `chain_getBlock` returns is the full SCALE encoding of an
//! [`sp_runtime::generic::UncheckedExtrinsic`], compact-length-prefixed. Decoding walks it
//! forward field by field (length prefix, version byte, signer, signature, signed extensions,
//! call) rather than deserializing the whole thing at once, because this crate has no
//! compiled-runtime `Call`/`Extra` type to hand `codec::Decode` — only the two-byte
//! pallet/call-index prefix the [`crate::metadata::MetadataCache`] resolves names against.
//!
//! The signed extensions are assumed to be `(Era, Compact<Nonce>, Compact<Tip>)`, the same
//! shape [`crate::calls::sign_and_encode`] signs with — this crate targets one configured
//! chain whose extension set is fixed at deployment, not an arbitrary unknown runtime.
//!
//! `AsMultiExecuted` is deliberately not produced here. Distinguishing "this approval was the
//! one that crossed the threshold and executed inline" from an ordinary approval requires
//! reading the block's emitted events, which would need a second, fully generic metadata-driven
//! decoder just for this one signal. Counting votes against the known threshold in
//! [`crate::ledger::MultiSigLedger`] is an equivalent, pure, and far simpler source of truth —
//! see DESIGN.md.

use crate::calls::TimePoint;
use crate::metadata::MetadataCache;

use bridge_primitives::Recipient;
use codec::{Compact, Decode, Encode, Input};
use sp_core::crypto::AccountId32;
use sp_runtime::generic::Era;
use sp_runtime::MultiAddress;

const PALLET_MULTISIG: &str = "Multisig";
const CALL_AS_MULTI: &str = "as_multi";
const PALLET_UTILITY: &str = "Utility";
const CALL_BATCH: &str = "batch";
const CALL_BATCH_ALL: &str = "batch_all";
const PALLET_BALANCES: &str = "Balances";
const CALL_TRANSFER_KEEP_ALIVE: &str = "transfer_keep_alive";
const PALLET_SYSTEM: &str = "System";
const CALL_REMARK: &str = "remark";

/// What one decoded extrinsic turned out to be.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtrinsicKind {
	/// `multisig.as_multi` with an empty `maybe_timepoint`: opens a new proposal.
	AsMultiNew,
	/// `multisig.as_multi` with a populated `maybe_timepoint`: approves an open proposal.
	AsMultiApprove,
	/// Not produced by this decoder; see the module documentation.
	AsMultiExecuted,
	/// `utility.batch`/`batch_all` shaped as a deposit intent (transfer to the vault, then a
	/// `system.remark` carrying the Chain-E recipient).
	UtilityBatch,
	/// Anything else: inherents, unrelated pallet calls, or a shape this decoder doesn't
	/// recognize.
	Other,
}

/// Decoded arguments of an `AsMultiNew`/`AsMultiApprove` extrinsic.
#[derive(Clone, Debug)]
pub struct AsMultiRecord {
	/// Approval threshold carried in the call itself (should match configuration; the decoder
	/// does not enforce that, the caller may).
	pub threshold: u16,
	/// The *other* signatories, in the order the extrinsic declared them.
	pub other_signatories: Vec<AccountId32>,
	/// `None` for a new proposal, `Some(origin)` for an approval.
	pub maybe_timepoint: Option<TimePoint>,
	/// The inner call's raw SCALE-encoded bytes (the multi-sig pallet's `OpaqueCall`).
	pub inner_call: Vec<u8>,
	/// Whether the proposal requested the inner call be stored on-chain.
	pub store_call: bool,
	/// Max weight budget passed to the call.
	pub max_weight_ref_time: u64,
	/// The inner call's destination account, lowercase hex without `0x`, if it decodes as a
	/// recognized `balances.transfer_keep_alive`.
	pub destination: Option<String>,
	/// The inner call's amount as a decimal string, if it decodes as a recognized
	/// `balances.transfer_keep_alive`.
	pub destination_amount: Option<String>,
	/// The extrinsic's signer: whichever relayer proposed or approved.
	pub sender: String,
}

/// Decoded arguments of a `UtilityBatch` deposit intent.
#[derive(Clone, Debug)]
pub struct UtilityBatchRecord {
	/// The extrinsic's signer: the depositing user.
	pub sender: String,
	/// The transferred amount, pre-fee, as a decimal string.
	pub amount: String,
	/// Destination account that received the transfer (expected to be the federation vault;
	/// the caller compares this against configuration).
	pub vault_destination: String,
	/// Recipient decoded from the batch's `system.remark` leg.
	pub recipient: Recipient,
}

/// One decoded extrinsic, in its on-chain position.
#[derive(Clone, Debug)]
pub struct ExtrinsicRecord {
	/// Index within the block.
	pub index: u32,
	/// What kind of extrinsic this was.
	pub kind: ExtrinsicKind,
	/// Present for `AsMultiNew`/`AsMultiApprove`.
	pub as_multi: Option<AsMultiRecord>,
	/// Present for `UtilityBatch`.
	pub utility_batch: Option<UtilityBatchRecord>,
}

impl ExtrinsicRecord {
	fn other(index: u32) -> Self {
		ExtrinsicRecord { index, kind: ExtrinsicKind::Other, as_multi: None, utility_batch: None }
	}
}

/// Decodes every extrinsic in `raw_extrinsics`, in order. A shape this decoder doesn't
/// recognize — or fails to decode — becomes `ExtrinsicKind::Other` rather than aborting the
/// whole block: per the error handling design, out-of-band shapes cannot alter bridge state, so
/// they're logged at `trace` and skipped.
pub fn decode_block(metadata: &MetadataCache, raw_extrinsics: &[Vec<u8>]) -> Vec<ExtrinsicRecord> {
	raw_extrinsics
		.iter()
		.enumerate()
		.map(|(index, raw)| {
			let index = index as u32;
			match decode_one(metadata, raw) {
				Ok(record) => ExtrinsicRecord { index, ..record },
				Err(error) => {
					log::trace!(target: "bridge", "extrinsic {index} did not decode as a recognized shape: {error}");
					ExtrinsicRecord::other(index)
				},
			}
		})
		.collect()
}

fn decode_one(metadata: &MetadataCache, raw: &[u8]) -> crate::error::Result<ExtrinsicRecord> {
	let mut input = raw;

	// Length prefix from `UncheckedExtrinsic`'s `encode_with_vec_prefix`; we don't need the
	// value, only to consume the bytes it occupies.
	let _length = Compact::<u32>::decode(&mut input)?;

	let version = input.read_byte()?;
	const SIGNED_BIT: u8 = 0b1000_0000;
	if version & SIGNED_BIT == 0 {
		// Unsigned (an inherent, e.g. `timestamp.set`): never a shape this core cares about.
		return Ok(ExtrinsicRecord::other(0));
	}

	let signer = decode_signer(&mut input)?;
	skip_signature(&mut input)?;
	let _era = Era::decode(&mut input)?;
	let _nonce = Compact::<u32>::decode(&mut input)?;
	let _tip = Compact::<u128>::decode(&mut input)?;

	let pallet = input.read_byte()?;
	let call = input.read_byte()?;

	if let Ok(index) = metadata.call_index(PALLET_MULTISIG, CALL_AS_MULTI) {
		if index.pallet == pallet && index.call == call {
			return decode_as_multi(metadata, &mut input, signer);
		}
	}
	for call_name in [CALL_BATCH, CALL_BATCH_ALL] {
		if let Ok(index) = metadata.call_index(PALLET_UTILITY, call_name) {
			if index.pallet == pallet && index.call == call {
				return decode_utility_batch(metadata, &mut input, signer);
			}
		}
	}

	Ok(ExtrinsicRecord::other(0))
}

fn decode_signer(input: &mut &[u8]) -> crate::error::Result<AccountId32> {
	match MultiAddress::<AccountId32, ()>::decode(input)? {
		MultiAddress::Id(account) => Ok(account),
		_ => Err(codec::Error::from("unsupported signer address variant").into()),
	}
}

/// Consumes a `MultiSignature`'s tag byte and fixed-length payload without interpreting it; the
/// decoder never needs to verify signatures, only to skip past them to reach the call.
fn skip_signature(input: &mut &[u8]) -> crate::error::Result<()> {
	let tag = input.read_byte()?;
	let len = match tag {
		0 => 64, // Ed25519
		1 => 64, // Sr25519
		2 => 65, // Ecdsa
		_ => return Err(codec::Error::from("unknown signature type").into()),
	};
	let mut discard = vec![0u8; len];
	input.read(&mut discard)?;
	Ok(())
}

fn decode_as_multi(
	metadata: &MetadataCache,
	input: &mut &[u8],
	signer: AccountId32,
) -> crate::error::Result<ExtrinsicRecord> {
	let threshold = u16::decode(input)?;
	let other_signatories = Vec::<AccountId32>::decode(input)?;
	let maybe_timepoint = Option::<TimePoint>::decode(input)?;
	let inner_call = Vec::<u8>::decode(input)?;
	let store_call = bool::decode(input)?;
	let max_weight_ref_time = decode_weight_ref_time(input)?;

	let (destination, destination_amount) = decode_transfer_keep_alive(metadata, &inner_call)
		.map(|(dest, amount)| (Some(dest), Some(amount)))
		.unwrap_or((None, None));

	let kind = if maybe_timepoint.is_none() { ExtrinsicKind::AsMultiNew } else { ExtrinsicKind::AsMultiApprove };
	Ok(ExtrinsicRecord {
		index: 0,
		kind,
		as_multi: Some(AsMultiRecord {
			threshold,
			other_signatories,
			maybe_timepoint,
			inner_call,
			store_call,
			max_weight_ref_time,
			destination,
			destination_amount,
			sender: hex::encode(signer.as_ref() as &[u8]),
		}),
		utility_batch: None,
	})
}

/// `frame_support::weights::Weight` encodes as `(Compact<u64>, Compact<u64>)` (ref_time,
/// proof_size) on the metadata versions this crate targets.
fn decode_weight_ref_time(input: &mut &[u8]) -> crate::error::Result<u64> {
	let ref_time = Compact::<u64>::decode(input)?;
	let _proof_size = Compact::<u64>::decode(input)?;
	Ok(ref_time.0)
}

fn decode_transfer_keep_alive(metadata: &MetadataCache, call: &[u8]) -> Option<(String, String)> {
	let mut input = call;
	let pallet = input.read_byte().ok()?;
	let call_index = input.read_byte().ok()?;
	let index = metadata.call_index(PALLET_BALANCES, CALL_TRANSFER_KEEP_ALIVE).ok()?;
	if index.pallet != pallet || index.call != call_index {
		return None;
	}
	let dest = MultiAddress::<AccountId32, ()>::decode(&mut input).ok()?;
	let amount = Compact::<u128>::decode(&mut input).ok()?;
	let MultiAddress::Id(account) = dest else { return None };
	Some((hex::encode(account.as_ref() as &[u8]), amount.0.to_string()))
}

fn decode_utility_batch(
	metadata: &MetadataCache,
	input: &mut &[u8],
	signer: AccountId32,
) -> crate::error::Result<ExtrinsicRecord> {
	let call_count = Compact::<u32>::decode(input)?;
	if call_count.0 != 2 {
		return Ok(ExtrinsicRecord::other(0));
	}

	let transfer_pallet = input.read_byte()?;
	let transfer_call = input.read_byte()?;
	let transfer_index = metadata.call_index(PALLET_BALANCES, CALL_TRANSFER_KEEP_ALIVE)?;
	if transfer_index.pallet != transfer_pallet || transfer_index.call != transfer_call {
		return Ok(ExtrinsicRecord::other(0));
	}
	let dest = MultiAddress::<AccountId32, ()>::decode(input)?;
	let amount = Compact::<u128>::decode(input)?;
	let MultiAddress::Id(vault_destination) = dest else { return Ok(ExtrinsicRecord::other(0)) };

	let remark_pallet = input.read_byte()?;
	let remark_call = input.read_byte()?;
	let remark_index = metadata.call_index(PALLET_SYSTEM, CALL_REMARK)?;
	if remark_index.pallet != remark_pallet || remark_index.call != remark_call {
		return Ok(ExtrinsicRecord::other(0));
	}
	let remark = Vec::<u8>::decode(input)?;
	let Some(recipient) = Recipient::from_tagged_remark(&remark) else {
		// Malformed remark (too short or an unknown tag): no message, but not an error either —
		// the listener simply advances past it.
		return Ok(ExtrinsicRecord::other(0));
	};

	Ok(ExtrinsicRecord {
		index: 0,
		kind: ExtrinsicKind::UtilityBatch,
		as_multi: None,
		utility_batch: Some(UtilityBatchRecord {
			sender: hex::encode(signer.as_ref() as &[u8]),
			amount: amount.0.to_string(),
			vault_destination: hex::encode(vault_destination.as_ref() as &[u8]),
			recipient,
		}),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn as_multi_record_reports_new_when_timepoint_absent() {
		let record = AsMultiRecord {
			threshold: 2,
			other_signatories: vec![],
			maybe_timepoint: None,
			inner_call: vec![],
			store_call: false,
			max_weight_ref_time: 0,
			destination: None,
			destination_amount: None,
			sender: "aa".repeat(32),
		};
		assert!(record.maybe_timepoint.is_none());
	}

	#[test]
	fn weight_ref_time_decodes_compact_pair() {
		let mut bytes = Vec::new();
		Compact::<u64>(1_000_000_000).encode_to(&mut bytes);
		Compact::<u64>(0).encode_to(&mut bytes);
		let mut input = bytes.as_slice();
		let ref_time = decode_weight_ref_time(&mut input).unwrap();
		assert_eq!(ref_time, 1_000_000_000);
	}
}
