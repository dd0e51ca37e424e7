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

use crate::{ChainId, Message};
use async_std::channel::{self, Receiver, Sender};
use async_std::sync::RwLock;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Collaborator the Listener hands every decoded deposit intent to, exactly once. The Router
/// is responsible for delivering the message to the destination chain's writer; per the
/// component design, delivery failure is logged but never blocks cursor advancement — the
/// destination chain's idempotency on `nonce` is the real safety net.
#[async_trait]
pub trait Router: Send + Sync {
	/// Routes `message` towards its destination. Implementations should treat this as
	/// fire-and-forget: a `Result` is returned purely for logging, not for retry control.
	async fn send(&self, message: Message) -> Result<(), RouterError>;
}

/// Router delivery failure. Never fatal to the caller.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
	/// No handler is registered for the message's destination chain.
	#[error("no route registered for destination chain {0}")]
	NoRoute(ChainId),
	/// The destination handler's channel is gone (it has been dropped or has disconnected).
	#[error("route to destination chain {0} is closed")]
	RouteClosed(ChainId),
}

/// An in-process [`Router`] that fans messages to per-[`ChainId`] async channels. Registering
/// a destination hands back the [`Receiver`] side, meant to be read by that destination
/// chain's writer loop.
///
/// This is the minimal concrete implementation the core needs to link and run standalone. A
/// production deployment fronting a real Chain-E listener/writer would swap this for a
/// network-facing router; the `Router` trait is the seam left open for that.
#[derive(Clone, Default)]
pub struct LocalRouter {
	routes: Arc<RwLock<HashMap<ChainId, Sender<Message>>>>,
}

impl LocalRouter {
	/// Creates an empty router.
	pub fn new() -> Self {
		LocalRouter { routes: Arc::new(RwLock::new(HashMap::new())) }
	}

	/// Registers `destination` as routable, returning the receiving end of its message queue.
	/// Registering the same destination twice replaces the previous route (and drops its
	/// receiver, which will observe channel closure).
	pub async fn register(&self, destination: ChainId) -> Receiver<Message> {
		let (sender, receiver) = channel::unbounded();
		self.routes.write().await.insert(destination, sender);
		receiver
	}
}

#[async_trait]
impl Router for LocalRouter {
	async fn send(&self, message: Message) -> Result<(), RouterError> {
		let routes = self.routes.read().await;
		let sender = routes.get(&message.destination).ok_or(RouterError::NoRoute(message.destination))?;
		sender.send(message).await.map_err(|_| RouterError::RouteClosed(message.destination))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{DepositNonce, Recipient, ResourceId};

	fn sample_message(destination: ChainId) -> Message {
		Message::fungible(ChainId(1), destination, DepositNonce(1), ResourceId([0u8; 32]), 1, Recipient::from_bytes([0u8; 20].to_vec()))
	}

	#[async_std::test]
	async fn send_without_registration_is_reported_as_no_route() {
		let router = LocalRouter::new();
		let result = router.send(sample_message(ChainId(9))).await;
		assert!(matches!(result, Err(RouterError::NoRoute(ChainId(9)))));
	}

	#[async_std::test]
	async fn registered_destination_receives_the_message() {
		let router = LocalRouter::new();
		let receiver = router.register(ChainId(2)).await;
		router.send(sample_message(ChainId(2))).await.unwrap();
		let received = receiver.recv().await.unwrap();
		assert_eq!(received.destination, ChainId(2));
	}

	#[async_std::test]
	async fn dropping_the_receiver_surfaces_as_route_closed() {
		let router = LocalRouter::new();
		let receiver = router.register(ChainId(3)).await;
		drop(receiver);
		let result = router.send(sample_message(ChainId(3))).await;
		assert!(matches!(result, Err(RouterError::RouteClosed(ChainId(3)))));
	}
}
