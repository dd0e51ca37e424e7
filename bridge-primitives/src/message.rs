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

use crate::{ChainId, DepositNonce, ResourceId};
use codec::{Decode, Encode};
use std::fmt;

/// The destination-chain account a `Message` settles to. Stored as raw bytes rather than a
/// fixed-width array because the two chains this bridge moves value between use different
/// address widths: a 20-byte EVM address on Chain-E, a 32-byte `AccountId32` on Chain-S. The
/// width in force for a given `Message` follows from its `destination` chain id; nothing in
/// this type enforces that by itself.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Recipient {
	bytes: Vec<u8>,
}

impl Recipient {
	/// Type tag for a raw 20-byte EVM address, per the `system.remark` encoding this bridge
	/// prescribes for Chain-S-sourced deposit intents (see [`Self::from_tagged_remark`]).
	pub const EVM_TAG: u8 = 0x00;

	/// Builds a recipient from its raw address bytes, whatever width the destination chain uses.
	pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
		Recipient { bytes: bytes.into() }
	}

	/// Parses a tagged remark payload: one type-tag byte followed by a 20-byte EVM address.
	/// Returns `None` if the payload is shorter than the 21 bytes this tag requires, or if the
	/// tag is not recognized — this is the "malformed remark" case from the end-to-end scenarios.
	pub fn from_tagged_remark(remark: &[u8]) -> Option<Self> {
		if remark.len() < 21 || remark[0] != Self::EVM_TAG {
			return None;
		}
		Some(Recipient { bytes: remark[1..21].to_vec() })
	}

	/// Encodes back into the tagged remark wire form used for Chain-S-sourced deposit intents.
	pub fn to_tagged_remark(&self) -> Vec<u8> {
		let mut out = Vec::with_capacity(1 + self.bytes.len());
		out.push(Self::EVM_TAG);
		out.extend_from_slice(&self.bytes);
		out
	}

	/// Lowercase hex, no `0x` prefix — the canonical comparison form used by the MultiSig
	/// Ledger's `(dest, amount)` matching key.
	pub fn to_lowercase_hex(&self) -> String {
		hex::encode(&self.bytes)
	}

	/// Raw address bytes: 20 for a Chain-E recipient, 32 for a Chain-S recipient.
	pub fn as_bytes(&self) -> &[u8] {
		&self.bytes
	}
}

impl fmt::Debug for Recipient {
	fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
		write!(fmt, "0x{}", self.to_lowercase_hex())
	}
}

/// The kind of transfer a `Message` describes. Only `Fungible` is implemented by the writer;
/// the other variants round out the wire format so a future handler can be slotted in without
/// changing the envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
#[repr(u8)]
pub enum MessageKind {
	/// A fungible token transfer: `payload` is `[amount_be_bytes, recipient_bytes]`.
	Fungible = 0,
	/// A non-fungible token transfer. Not handled by this relayer; present for wire compatibility.
	NonFungible = 1,
	/// An opaque, generic cross-chain call. Not handled by this relayer.
	Generic = 2,
}

/// Cross-chain message produced by a Listener and consumed by a Writer on the destination
/// chain, by way of the Router. Immutable once emitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
	/// Chain the deposit intent was observed on.
	pub source: ChainId,
	/// Chain the settlement must be driven on.
	pub destination: ChainId,
	/// Bridge-wide unique identifier of the deposit that produced this message.
	pub nonce: DepositNonce,
	/// Discriminates the payload shape.
	pub kind: MessageKind,
	/// Identifies the asset class being moved.
	pub resource: ResourceId,
	/// Amount, in the *source* chain's base unit, before any destination-side fee deduction.
	pub amount: u128,
	/// Recipient on the destination chain.
	pub recipient: Recipient,
}

impl Message {
	/// Builds a fungible transfer message.
	pub fn fungible(
		source: ChainId,
		destination: ChainId,
		nonce: DepositNonce,
		resource: ResourceId,
		amount: u128,
		recipient: Recipient,
	) -> Self {
		Message { source, destination, nonce, kind: MessageKind::Fungible, resource, amount, recipient }
	}

	/// Serializes into the language-neutral wire envelope described in the external interfaces:
	/// `{type, source, destination, deposit_nonce, resource_id, payload}` with
	/// `payload = [amount_be_bytes, recipient_bytes]` for fungible transfers.
	pub fn to_wire(&self) -> WireMessage {
		let mut payload = self.amount.to_be_bytes().to_vec();
		payload.extend_from_slice(self.recipient.as_bytes());
		WireMessage {
			kind: self.kind,
			source: self.source,
			destination: self.destination,
			deposit_nonce: self.nonce,
			resource_id: self.resource,
			payload,
		}
	}
}

/// SCALE-encodable wire form of [`Message`], matching the struct named in the external
/// interfaces section byte for byte.
#[derive(Clone, Debug, Encode, Decode)]
pub struct WireMessage {
	/// `type` in the spec; renamed because `type` is a keyword.
	pub kind: MessageKind,
	/// Source chain id.
	pub source: ChainId,
	/// Destination chain id.
	pub destination: ChainId,
	/// Deposit nonce.
	pub deposit_nonce: DepositNonce,
	/// Resource id.
	pub resource_id: ResourceId,
	/// Variable-length payload, shape depending on `kind`.
	pub payload: Vec<u8>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn recipient_round_trips_through_tagged_remark() {
		let recipient = Recipient::from_bytes([0x42u8; 20].to_vec());
		let remark = recipient.to_tagged_remark();
		assert_eq!(remark.len(), 21);
		assert_eq!(Recipient::from_tagged_remark(&remark), Some(recipient));
	}

	#[test]
	fn recipient_rejects_short_remark() {
		let short = vec![Recipient::EVM_TAG; 10];
		assert_eq!(Recipient::from_tagged_remark(&short), None);
	}

	#[test]
	fn recipient_rejects_unknown_tag() {
		let mut remark = vec![0xffu8];
		remark.extend_from_slice(&[0u8; 20]);
		assert_eq!(Recipient::from_tagged_remark(&remark), None);
	}

	#[test]
	fn message_to_wire_matches_fungible_payload_shape() {
		let message = Message::fungible(
			ChainId(1),
			ChainId(2),
			DepositNonce(10_000_000),
			ResourceId([0u8; 32]),
			9_960_000_000_000,
			Recipient::from_bytes([0x11u8; 20].to_vec()),
		);
		let wire = message.to_wire();
		assert_eq!(wire.payload.len(), 16 + 20);
		assert_eq!(&wire.payload[0..16], &9_960_000_000_000u128.to_be_bytes());
		assert_eq!(&wire.payload[16..], &[0x11; 20]);
	}
}
