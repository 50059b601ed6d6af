// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for acquisition attempts and how they ended.
#[derive(Debug, Default)]
pub struct AcquisitionMetrics {
	attempts: AtomicU64,
	cache_hits: AtomicU64,
	exchanges: AtomicU64,
	success: AtomicU64,
	interaction_required: AtomicU64,
	failure: AtomicU64,
}
impl AcquisitionMetrics {
	/// Total number of silent and interactive acquisitions started.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Silent acquisitions answered from the token cache.
	pub fn cache_hits(&self) -> u64 {
		self.cache_hits.load(Ordering::Relaxed)
	}

	/// Token endpoint exchanges performed.
	pub fn exchanges(&self) -> u64 {
		self.exchanges.load(Ordering::Relaxed)
	}

	/// Acquisitions that returned a token (including cache hits).
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Silent acquisitions that ended with an interaction-required signal.
	pub fn interaction_required(&self) -> u64 {
		self.interaction_required.load(Ordering::Relaxed)
	}

	/// Acquisitions that failed for any other reason, cancellations included.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_exchange(&self) {
		self.exchanges.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_result<T>(&self, result: &crate::error::Result<T>) {
		let counter = match result {
			Ok(_) => &self.success,
			Err(e) if e.is_interaction_required() => &self.interaction_required,
			Err(_) => &self.failure,
		};

		counter.fetch_add(1, Ordering::Relaxed);
	}
}
