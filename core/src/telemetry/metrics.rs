use std::sync::Mutex;

/// Point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_processed: usize,
    pub empty_pies: usize,
    pub samples_discarded: usize,
    pub raw_evictions: usize,
    pub windows_reduced: usize,
}

pub struct PipelineMetrics {
    inner: Mutex<MetricsSnapshot>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    pub fn record_pie(&self, empty: bool, discarded: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.records_processed += 1;
            metrics.samples_discarded += discarded;
            if empty {
                metrics.empty_pies += 1;
            }
        }
    }

    pub fn record_eviction(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.raw_evictions += 1;
        }
    }

    pub fn record_window(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.windows_reduced += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner
            .lock()
            .map(|metrics| *metrics)
            .unwrap_or_default()
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
