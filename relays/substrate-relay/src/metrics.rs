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

//! Per-chain Prometheus metrics, plus a separate `/health` endpoint honoring
//! `HEALTH_BLOCK_TIMEOUT` (seconds; default 180) — a liveness signal distinct from `/metrics`,
//! since an operator's readiness probe cares about "is this chain still moving" rather than the
//! full counter set.

use relay_utils::metrics::{register, GaugeVec, Metric, Opts, PrometheusError, Registry, U64};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_std::sync::RwLock;

const DEFAULT_HEALTH_BLOCK_TIMEOUT: Duration = Duration::from_secs(180);

/// The bridge's own metrics, one labeled series per chain name.
#[derive(Clone)]
pub struct BridgeMetrics {
	latest_known_block: GaugeVec<U64>,
	best_processed_block: GaugeVec<U64>,
	messages_resolved_total: GaugeVec<U64>,
	writer_retries_exhausted_total: GaugeVec<U64>,
}

impl BridgeMetrics {
	/// Builds the metric family. Call [`Metric::register`] before use.
	pub fn new() -> Result<Self, PrometheusError> {
		Ok(BridgeMetrics {
			latest_known_block: GaugeVec::new(
				Opts::new("bridge_latest_known_block", "Highest finalized block height observed"),
				&["chain"],
			)?,
			best_processed_block: GaugeVec::new(
				Opts::new("bridge_best_processed_block", "Highest block height fully processed"),
				&["chain"],
			)?,
			messages_resolved_total: GaugeVec::new(
				Opts::new("bridge_messages_resolved_total", "Deposit intents handed to the router"),
				&["chain"],
			)?,
			writer_retries_exhausted_total: GaugeVec::new(
				Opts::new(
					"bridge_writer_retries_exhausted_total",
					"Messages abandoned after exhausting the writer retry budget",
				),
				&["chain"],
			)?,
		})
	}

	/// Records the chain's current finalized height.
	pub fn set_latest_known_block(&self, chain: &str, height: u64) {
		self.latest_known_block.with_label_values(&[chain]).set(height);
	}

	/// Records the chain's cursor after a successful block process.
	pub fn set_best_processed_block(&self, chain: &str, height: u64) {
		self.best_processed_block.with_label_values(&[chain]).set(height);
	}

	/// Increments the count of deposit intents handed to the router.
	pub fn inc_messages_resolved(&self, chain: &str) {
		self.messages_resolved_total.with_label_values(&[chain]).inc();
	}

	/// Increments the count of messages abandoned after exhausting their writer retry budget.
	pub fn inc_writer_retries_exhausted(&self, chain: &str) {
		self.writer_retries_exhausted_total.with_label_values(&[chain]).inc();
	}
}

impl Metric for BridgeMetrics {
	fn register(&self, registry: &Registry) -> Result<(), PrometheusError> {
		register(self.latest_known_block.clone(), registry)?;
		register(self.best_processed_block.clone(), registry)?;
		register(self.messages_resolved_total.clone(), registry)?;
		register(self.writer_retries_exhausted_total.clone(), registry)?;
		Ok(())
	}
}

/// Shared "last time each chain's listener made progress" table, backing `/health`.
#[derive(Clone, Default)]
pub struct HealthState {
	last_progress: Arc<RwLock<HashMap<String, Instant>>>,
}

impl HealthState {
	/// Creates an empty health state; every chain is considered unhealthy until its first tick.
	pub fn new() -> Self {
		HealthState::default()
	}

	/// Records that `chain`'s listener just made progress.
	pub async fn touch(&self, chain: &str) {
		self.last_progress.write().await.insert(chain.to_string(), Instant::now());
	}

	/// `true` if every chain that has ever reported in is still within the health timeout, and
	/// at least one chain has reported in at all.
	async fn is_healthy(&self, timeout: Duration) -> bool {
		let guard = self.last_progress.read().await;
		!guard.is_empty() && guard.values().all(|last| last.elapsed() < timeout)
	}
}

/// Reads `HEALTH_BLOCK_TIMEOUT` from the environment, falling back to 180s if absent or
/// unparseable.
fn health_block_timeout() -> Duration {
	std::env::var("HEALTH_BLOCK_TIMEOUT")
		.ok()
		.and_then(|value| value.parse().ok())
		.map(Duration::from_secs)
		.unwrap_or(DEFAULT_HEALTH_BLOCK_TIMEOUT)
}

/// Serves a minimal `GET /health` endpoint on `address`: `200 OK` while every chain has reported
/// progress within `HEALTH_BLOCK_TIMEOUT`, `503 Service Unavailable` otherwise. Hand-rolled
/// rather than pulled in from an HTTP framework: the entire surface is one fixed-shape response,
/// so a full request parser would be pure overhead.
pub async fn health_server(address: SocketAddr, state: HealthState) {
	use async_std::io::WriteExt;
	use async_std::net::TcpListener;

	let listener = match TcpListener::bind(address).await {
		Ok(listener) => listener,
		Err(error) => {
			log::warn!(target: "bridge-metrics", "health endpoint failed to bind {address}: {error}");
			return;
		},
	};
	let timeout = health_block_timeout();

	loop {
		let (mut stream, _) = match listener.accept().await {
			Ok(accepted) => accepted,
			Err(error) => {
				log::warn!(target: "bridge-metrics", "health endpoint accept error: {error}");
				continue;
			},
		};
		let healthy = state.is_healthy(timeout).await;
		let body = if healthy { "ok" } else { "unhealthy" };
		let status_line = if healthy { "200 OK" } else { "503 Service Unavailable" };
		let response =
			format!("HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}", body.len());
		let _ = stream.write_all(response.as_bytes()).await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[async_std::test]
	async fn empty_health_state_is_unhealthy() {
		let state = HealthState::new();
		assert!(!state.is_healthy(Duration::from_secs(180)).await);
	}

	#[async_std::test]
	async fn touched_chain_is_healthy_within_timeout() {
		let state = HealthState::new();
		state.touch("chain-s").await;
		assert!(state.is_healthy(Duration::from_secs(180)).await);
	}

	#[async_std::test]
	async fn stale_chain_is_unhealthy_past_timeout() {
		let state = HealthState::new();
		state.touch("chain-s").await;
		assert!(!state.is_healthy(Duration::from_millis(0)).await);
	}

	#[test]
	fn bridge_metrics_registers_without_error() {
		let metrics = BridgeMetrics::new().unwrap();
		let registry = Registry::new();
		metrics.register(&registry).unwrap();
		metrics.set_latest_known_block("chain-s", 100);
		metrics.inc_messages_resolved("chain-s");
	}
}
