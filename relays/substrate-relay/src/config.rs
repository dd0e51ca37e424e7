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

//! On-disk relay configuration: one TOML file listing `[[chains]]` tables, matching the
//! external interfaces section of the specification. The substrate-specific keys live in a
//! free-form `opts` string map so the file format doesn't need to change whenever a new option
//! is added.

use crate::error::{Error, Result};
use bridge_primitives::FeeParams;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// A chain's declared type. Only `substrate` is implemented by this crate; `ethereum` chains
/// are configured the same way so a single file can describe the whole federation, but their
/// listener/writer pair is an external collaborator.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChainType {
	/// Chain-E: EVM-compatible, secp256k1 accounts.
	Ethereum,
	/// Chain-S: SR25519 accounts, native multi-signature pallet.
	Substrate,
}

/// One `[[chains]]` table.
#[derive(Clone, Debug, Deserialize)]
pub struct ChainConfig {
	/// Numeric chain id, unique within the federation.
	pub id: u8,
	/// Human-readable name, used only in logs and metric labels.
	pub name: String,
	/// Chain kind.
	#[serde(rename = "type")]
	pub chain_type: ChainType,
	/// RPC endpoint (ws URL for substrate chains).
	pub endpoint: String,
	/// This relayer's address on this chain (hex or SS58).
	pub from: String,
	/// Directory holding this relayer's keystore files for this chain.
	pub keystore_path: String,
	/// Test mode: relax keystore encryption requirements.
	#[serde(default)]
	pub insecure: bool,
	/// Directory holding the persisted block cursor file.
	pub blockstore_path: String,
	/// If `true`, ignore any persisted cursor and start from `opts.startBlock`.
	#[serde(default)]
	pub fresh_start: bool,
	/// If `true`, start from the chain's current finalized head instead of `opts.startBlock`.
	#[serde(default)]
	pub latest_block: bool,
	/// Free-form substrate-specific options (see [`SubstrateOpts::from_map`]).
	#[serde(default)]
	pub opts: HashMap<String, String>,
}

/// The whole configuration file: one table per chain in the federation.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct RelayConfig {
	/// Every chain this relayer participates in.
	#[serde(rename = "chains", default)]
	pub chains: Vec<ChainConfig>,
}

impl RelayConfig {
	/// Parses a [`RelayConfig`] from a TOML file at `path`.
	pub fn from_file(path: &Path) -> Result<Self> {
		let contents = std::fs::read_to_string(path)?;
		toml::from_str(&contents).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
	}
}

/// Parsed form of the `opts` map for a `substrate`-typed [`ChainConfig`], per the external
/// interfaces section of the specification.
#[derive(Clone, Debug)]
pub struct SubstrateOpts {
	/// First block height to process, absent a persisted cursor.
	pub start_block: u64,
	/// Whether the extended (newer) `as_multi` call shape should be used. Carried through from
	/// configuration but unused by this crate's decoder/writer, which always target the call
	/// shape fixed in the external interfaces section.
	pub use_extended_call: bool,
	/// Hex account id of the federation's multi-signature vault.
	pub multi_sign_address: String,
	/// Multi-signature approval threshold `T`.
	pub multi_sign_threshold: u16,
	/// Total number of relayers `N`.
	pub total_relayer: u16,
	/// This relayer's 1-indexed position within `[1, N]`.
	pub current_relayer_number: u16,
	/// The other `N-1` relayers' hex account ids, in configured order. The decoder/writer sort
	/// this list (excluding the local relayer) as the multi-sig pallet requires.
	pub other_relayers: Vec<String>,
	/// Max weight budget passed to `as_multi`.
	pub max_weight_ref_time: u64,
	/// Secondary polkadot RPC endpoint used for rich block decoding, if different from
	/// `endpoint`.
	pub secondary_url: Option<String>,
	/// Numeric id of the Chain-E destination.
	pub dest_id: u8,
	/// 32-byte hex resource id of the bridged asset class.
	pub resource_id: String,
	/// Fee parameters, overridable per chain; defaults match [`FeeParams::default`].
	pub fee: FeeParams,
}

impl SubstrateOpts {
	/// Parses the free-form `opts` map into its typed form.
	pub fn from_map(opts: &HashMap<String, String>) -> Result<Self> {
		let get = |key: &str| -> Result<&str> {
			opts.get(key)
				.map(String::as_str)
				.ok_or_else(|| Error::Config(format!("missing required opt {key:?}")))
		};
		let parse_uint = |key: &str| -> Result<u64> {
			get(key)?
				.parse()
				.map_err(|e| Error::Config(format!("opt {key:?} is not a valid integer: {e}")))
		};

		let total_relayer = parse_uint("TotalRelayer")? as u16;
		let mut other_relayers = Vec::with_capacity(total_relayer.saturating_sub(1) as usize);
		for i in 1..total_relayer {
			other_relayers.push(get(&format!("OtherRelayer{i}"))?.to_string());
		}

		let fee = FeeParams {
			fixed_fee: opts
				.get("fixedFee")
				.map(|v| v.parse())
				.transpose()
				.map_err(|e| Error::Config(format!("opt \"fixedFee\" is not a valid integer: {e}")))?
				.unwrap_or_else(|| FeeParams::default().fixed_fee),
			fee_rate: opts
				.get("feeRate")
				.map(|v| v.parse())
				.transpose()
				.map_err(|e| Error::Config(format!("opt \"feeRate\" is not a valid integer: {e}")))?
				.unwrap_or_else(|| FeeParams::default().fee_rate),
			token_scale: opts
				.get("tokenScale")
				.map(|v| v.parse())
				.transpose()
				.map_err(|e| Error::Config(format!("opt \"tokenScale\" is not a valid integer: {e}")))?
				.unwrap_or_else(|| FeeParams::default().token_scale),
		};
		fee.validate()?;

		Ok(SubstrateOpts {
			start_block: parse_uint("startBlock")?,
			use_extended_call: opts.get("useExtendedCall").map(|v| v == "true").unwrap_or(false),
			multi_sign_address: get("MultiSignAddress")?.to_string(),
			multi_sign_threshold: parse_uint("MultiSignThreshold")? as u16,
			total_relayer,
			current_relayer_number: parse_uint("CurrentRelayerNumber")? as u16,
			other_relayers,
			max_weight_ref_time: parse_uint("MaxWeight")?,
			secondary_url: opts.get("url").cloned(),
			dest_id: parse_uint("destId")? as u8,
			resource_id: get("resourceId")?.to_string(),
			fee,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_map() -> HashMap<String, String> {
		let mut map = HashMap::new();
		map.insert("startBlock".into(), "100".into());
		map.insert("MultiSignAddress".into(), "aa".repeat(32));
		map.insert("MultiSignThreshold".into(), "2".into());
		map.insert("TotalRelayer".into(), "3".into());
		map.insert("CurrentRelayerNumber".into(), "1".into());
		map.insert("OtherRelayer1".into(), "bb".repeat(32));
		map.insert("OtherRelayer2".into(), "cc".repeat(32));
		map.insert("MaxWeight".into(), "1000000000".into());
		map.insert("destId".into(), "1".into());
		map.insert("resourceId".into(), "00".repeat(32));
		map
	}

	#[test]
	fn parses_well_formed_opts() {
		let opts = SubstrateOpts::from_map(&sample_map()).unwrap();
		assert_eq!(opts.start_block, 100);
		assert_eq!(opts.other_relayers.len(), 2);
		assert_eq!(opts.fee, FeeParams::default());
	}

	#[test]
	fn rejects_missing_required_opt() {
		let mut map = sample_map();
		map.remove("MultiSignThreshold");
		assert!(SubstrateOpts::from_map(&map).is_err());
	}

	#[test]
	fn honors_fee_overrides() {
		let mut map = sample_map();
		map.insert("fixedFee".into(), "5".into());
		map.insert("feeRate".into(), "10".into());
		map.insert("tokenScale".into(), "0".into());
		let opts = SubstrateOpts::from_map(&map).unwrap();
		assert_eq!(opts.fee.fixed_fee, 5);
		assert_eq!(opts.fee.fee_rate, 10);
		assert_eq!(opts.fee.token_scale, 0);
	}

	#[test]
	fn parses_relay_config_toml() {
		let toml_str = r#"
			[[chains]]
			id = 1
			name = "chain-s"
			type = "substrate"
			endpoint = "ws://127.0.0.1:9944"
			from = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY"
			keystore_path = "./keystore"
			blockstore_path = "./blockstore"

			[chains.opts]
			startBlock = "100"
		"#;
		let config: RelayConfig = toml::from_str(toml_str).unwrap();
		assert_eq!(config.chains.len(), 1);
		assert_eq!(config.chains[0].chain_type, ChainType::Substrate);
	}
}
