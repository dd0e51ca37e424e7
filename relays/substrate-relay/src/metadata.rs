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

//! Typed call-index resolution over the chain's runtime metadata.
//!
//! Per the design notes, method/pallet names are stringly typed only at this one boundary:
//! everywhere else the core works with the [`CallIndex`] pair the metadata resolves them to.
//! Resolution happens fresh before every extrinsic construction because the chain may
//! runtime-upgrade mid-session; stale indices silently produce a different call and a
//! call-hash mismatch downstream.

use crate::connection::{Error, Result};
use codec::Decode;
use frame_metadata::{RuntimeMetadata, RuntimeMetadataPrefixed};
use scale_info::form::PortableForm;
use scale_info::{TypeDef, Variant};
use std::collections::HashMap;

/// A resolved `(pallet_index, call_index)` pair, ready to be written as the two-byte prefix of
/// a SCALE-encoded runtime call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallIndex {
	/// Index of the pallet within the runtime's `Call` enum.
	pub pallet: u8,
	/// Index of the call within the pallet's own call enum.
	pub call: u8,
}

#[derive(Clone)]
struct Pallet {
	index: u8,
	calls: HashMap<String, u8>,
}

/// Decoded view of one metadata snapshot: just enough to resolve `(pallet, call)` names to
/// indices. Everything else in the metadata (storage layout, constants, docs) is irrelevant to
/// this crate and dropped immediately after decoding.
///
/// Cheaply [`Clone`]: cloning hands a caller (the decoder) its own snapshot to work against
/// without holding the connection's metadata lock for the duration of a whole block's decode.
#[derive(Clone)]
pub struct MetadataCache {
	pallets: HashMap<String, Pallet>,
}

impl MetadataCache {
	/// Decodes a `state_getMetadata` response (`0x6d6574...`-prefixed opaque metadata blob)
	/// into a fresh cache.
	pub fn decode(raw: &[u8]) -> Result<Self> {
		let prefixed = RuntimeMetadataPrefixed::decode(&mut &raw[..])
			.map_err(|e| Error::MetadataDecode(e.to_string()))?;
		let (types, pallets) = match prefixed.1 {
			RuntimeMetadata::V14(metadata) => (metadata.types, metadata.pallets),
			RuntimeMetadata::V15(metadata) => (metadata.types, metadata.pallets),
			other => {
				return Err(Error::MetadataDecode(format!(
					"unsupported metadata version {}",
					runtime_metadata_version(&other)
				)))
			},
		};

		let mut resolved = HashMap::with_capacity(pallets.len());
		for pallet in pallets {
			let Some(calls) = pallet.calls else { continue };
			let ty = types
				.resolve(calls.ty.id)
				.ok_or_else(|| Error::MetadataDecode(format!("dangling call type for pallet {}", pallet.name)))?;
			let TypeDef::Variant(variant) = &ty.type_def else {
				return Err(Error::MetadataDecode(format!("call type for pallet {} is not a variant", pallet.name)));
			};
			let mut call_indices = HashMap::with_capacity(variant.variants.len());
			for call in &variant.variants {
				call_indices.insert(call.name.clone(), call.index);
			}
			resolved.insert(pallet.name.clone(), Pallet { index: pallet.index, calls: call_indices });
		}

		Ok(MetadataCache { pallets: resolved })
	}

	/// Resolves `pallet_name::call_name` to its current `(pallet, call)` index pair.
	pub fn call_index(&self, pallet_name: &str, call_name: &str) -> Result<CallIndex> {
		let pallet = self
			.pallets
			.get(pallet_name)
			.ok_or_else(|| Error::UnknownCall(pallet_name.to_string(), call_name.to_string()))?;
		let call = pallet
			.calls
			.get(call_name)
			.copied()
			.ok_or_else(|| Error::UnknownCall(pallet_name.to_string(), call_name.to_string()))?;
		Ok(CallIndex { pallet: pallet.index, call })
	}
}

fn runtime_metadata_version(metadata: &RuntimeMetadata) -> &'static str {
	match metadata {
		RuntimeMetadata::V0(_) => "V0",
		RuntimeMetadata::V1(_) => "V1",
		RuntimeMetadata::V2(_) => "V2",
		RuntimeMetadata::V3(_) => "V3",
		RuntimeMetadata::V4(_) => "V4",
		RuntimeMetadata::V5(_) => "V5",
		RuntimeMetadata::V6(_) => "V6",
		RuntimeMetadata::V7(_) => "V7",
		RuntimeMetadata::V8(_) => "V8",
		RuntimeMetadata::V9(_) => "V9",
		RuntimeMetadata::V10(_) => "V10",
		RuntimeMetadata::V11(_) => "V11",
		RuntimeMetadata::V12(_) => "V12",
		RuntimeMetadata::V13(_) => "V13",
		RuntimeMetadata::V14(_) => "V14",
		RuntimeMetadata::V15(_) => "V15",
		_ => "unknown",
	}
}

// Only used to name the variant lookup type explicitly above; kept for readability.
#[allow(dead_code)]
type PortableVariant = Variant<PortableForm>;
