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

use bridge_primitives::{FeeError, RouterError};
use thiserror::Error;

/// Result type used throughout the relay-level crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Relay-level failures: ledger/round/fee/config errors, plus whatever the layers underneath —
/// the node connection and the generic relay-utils helpers — surface, wrapped rather than
/// flattened so each layer's error surface stays that layer's own source of truth.
#[derive(Error, Debug)]
pub enum Error {
	/// The chain connection failed: RPC transport, metadata decode, or an unresolvable call.
	#[error(transparent)]
	Connection(#[from] crate::connection::Error),
	/// SCALE-decoding an extrinsic or event failed.
	#[error("SCALE decode error: {0}")]
	Codec(#[from] codec::Error),
	/// The relayer's own signing key could not be loaded from the keystore.
	#[error("keystore error: {0}")]
	Keystore(String),
	/// The relay configuration file failed to parse.
	#[error("configuration error: {0}")]
	Config(String),
	/// The block store's persisted cursor file could not be read or written.
	#[error("block store I/O error: {0}")]
	Io(#[from] std::io::Error),
	/// Computing the settled amount for a deposit failed.
	#[error(transparent)]
	Fee(#[from] FeeError),
	/// The Router could not accept a decoded message.
	#[error(transparent)]
	Router(#[from] RouterError),
	/// A retry budget (block decode, writer round) was exhausted.
	#[error("retry budget exhausted: {0}")]
	RetriesExhausted(String),
	/// relay-utils level failure (metrics, generic I/O already wrapped there).
	#[error(transparent)]
	Utils(#[from] relay_utils::Error),
}

impl Error {
	/// `true` if this error should reset a retry budget's counter rather than consume it, per
	/// the error handling design's treatment of [`connection::Error::BlockNotReady`].
	pub fn is_block_not_ready(&self) -> bool {
		matches!(self, Error::Connection(inner) if inner.is_block_not_ready())
	}
}
