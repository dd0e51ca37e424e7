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

//! Chain-agnostic types shared between every relay crate: chain and resource
//! identifiers, the cross-chain message envelope, the fee formula and the
//! router seam between a source chain's listener and a destination chain's
//! writer.

#![warn(missing_docs)]

mod fee;
mod ids;
mod message;
mod router;

pub use fee::{FeeError, FeeParams};
pub use ids::{ChainId, DepositNonce, ResourceId};
pub use message::{Message, MessageKind, Recipient};
pub use router::{LocalRouter, Router};
