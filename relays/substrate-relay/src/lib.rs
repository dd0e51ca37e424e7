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

//! Chain-S multi-signature listener/writer core: watches a substrate chain's finalized blocks
//! for deposit intents addressed to a multi-signature vault, and, in round-robin turn, submits
//! the matching `multisig.as_multi` approval on the bridged side.

pub mod block_store;
pub mod calls;
pub mod config;
pub mod connection;
pub mod decoder;
pub mod error;
pub mod keystore;
pub mod ledger;
pub mod listener;
pub mod metadata;
pub mod metrics;
pub mod relayer;
pub mod round;
pub mod writer;
