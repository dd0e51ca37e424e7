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

//! Minimal Prometheus metrics plumbing shared by every relay binary: a couple of thin wrapper
//! types, a registration helper, and the two traits every concrete metric implements.

mod global;

pub use global::GlobalMetrics;
pub use substrate_prometheus_endpoint::{
	prometheus::core::{AtomicF64 as F64, AtomicU64 as U64},
	Gauge, GaugeVec, Opts, PrometheusError, Registry,
};

use async_std::task::spawn;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;

/// Something that can register itself (and only itself) with a Prometheus [`Registry`].
pub trait Metric: Clone {
	/// Registers this metric's collectors with `registry`.
	fn register(&self, registry: &Registry) -> Result<(), PrometheusError>;
}

/// A metric that refreshes its own value on a timer, independent of the hot path it describes
/// (process CPU/memory, externally-fetched values, etc). Call [`spawn_standalone_metrics`] once
/// per instance after registration.
#[async_trait]
pub trait StandaloneMetric: Metric + Send + Sync + 'static {
	/// Refreshes the metric's value.
	async fn update(&self);

	/// How often [`StandaloneMetric::update`] should be called.
	fn update_interval(&self) -> Duration;
}

/// Registers `metric` with `registry`, returning it back for convenient chaining.
pub fn register<T: substrate_prometheus_endpoint::prometheus::core::Collector + Clone + 'static>(
	metric: T,
	registry: &Registry,
) -> Result<T, PrometheusError> {
	registry.register(Box::new(metric.clone()))?;
	Ok(metric)
}

/// Builds a metric name, optionally namespaced by `prefix` (e.g. the chain name).
pub fn metric_name(prefix: Option<&str>, name: &str) -> String {
	match prefix {
		Some(prefix) => format!("{prefix}_{name}"),
		None => name.to_string(),
	}
}

/// Spawns the background refresh task for a [`StandaloneMetric`]. The task runs until the
/// process exits; there is no explicit shutdown hook because metrics collection is expected to
/// run for the process lifetime (unlike the Listener/Writer, it has no substrate state to lose
/// by being killed mid-update).
pub fn spawn_standalone_metrics<T: StandaloneMetric>(metric: T) {
	spawn(async move {
		loop {
			metric.update().await;
			async_std::task::sleep(metric.update_interval()).await;
		}
	});
}

/// Parses `host:port` into the [`SocketAddr`] the Prometheus endpoint binds to, translating
/// a malformed host into the dedicated [`crate::Error::ExposingMetricsInvalidHost`] variant
/// rather than a bare parse error.
pub fn metrics_address(host: &str, port: u16) -> crate::Result<SocketAddr> {
	format!("{host}:{port}")
		.parse()
		.map_err(|parse_error| crate::Error::ExposingMetricsInvalidHost(host.to_string(), parse_error))
}

/// Starts the Prometheus `/metrics` HTTP endpoint on `address`, serving `registry`. Await the
/// returned future to run the server to completion (it only returns on fatal server error);
/// the caller spawns it alongside the core tasks.
pub async fn metrics_server(address: SocketAddr, registry: Registry) {
	if let Err(error) = substrate_prometheus_endpoint::init_prometheus(address, registry).await {
		log::warn!(target: "bridge-metrics", "Prometheus endpoint exited with error: {error}");
	}
}
