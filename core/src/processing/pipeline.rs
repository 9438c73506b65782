//! Producer and reducer loops wiring the pie builder, the slice reducer and
//! the two rings together.
//!
//! The producer waits on the inbound record queue with a bounded timeout,
//! projects each record, pushes the pie into the raw ring and, inside the same
//! critical section, captures the trailing along-track window whenever one is
//! complete. Captured windows go to the reducer over a bounded channel; if the
//! reducer falls behind, the newest window is dropped rather than stalling the
//! producer. Each loop refreshes its private settings copy once per iteration,
//! between receiving an input and processing it, and stops on cancellation, a
//! closed input, or the receive timeout.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::prelude::{CoreError, CoreResult, ProcessingStage};
use crate::processing::pie_builder::PieBuilder;
use crate::processing::ring_buffer::SharedRing;
use crate::processing::slice_reducer::{SliceReducer, WindowTrigger};
use crate::processing::view::RingView;
use crate::settings::{BufferSettings, GeometrySettings, SettingsCache, SettingsHandle};
use crate::sonar_interface::{DecodedRecord, Pie, SliceWindow};
use crate::telemetry::metrics::{MetricsSnapshot, PipelineMetrics};

type PieWindow = Vec<Arc<Pie>>;

/// Owns the shared rings and settings for one sonar stream.
pub struct Pipeline {
    raw: SharedRing<Arc<Pie>>,
    averaged: SharedRing<Arc<SliceWindow>>,
    settings: SettingsHandle,
    buffers: BufferSettings,
    metrics: Arc<PipelineMetrics>,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Validates the configuration and allocates both rings. Allocation
    /// failure is the only fatal error and surfaces here, before any record
    /// is processed.
    pub fn new(geometry: GeometrySettings, buffers: BufferSettings) -> CoreResult<Self> {
        geometry.validate()?;
        buffers.validate(&geometry)?;

        let averaged_capacity = buffers.averaged_ring_capacity(&geometry);
        let raw = SharedRing::new(buffers.raw_ring_capacity)?;
        let averaged = SharedRing::new(averaged_capacity)?;
        info!(
            "allocated raw ring ({} pies of {}x{}) and averaged ring ({} windows)",
            buffers.raw_ring_capacity, geometry.grid_size, geometry.grid_size, averaged_capacity
        );

        Ok(Self {
            raw,
            averaged,
            settings: SettingsHandle::new(geometry, buffers.raw_ring_capacity)?,
            buffers,
            metrics: Arc::new(PipelineMetrics::new()),
            cancel: CancellationToken::new(),
        })
    }

    pub fn settings(&self) -> SettingsHandle {
        self.settings.clone()
    }

    pub fn view(&self) -> RingView {
        RingView::new(self.raw.clone(), self.averaged.clone())
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Starts the producer and reducer tasks on the current Tokio runtime.
    pub fn spawn(&self, records: mpsc::Receiver<DecodedRecord>) -> PipelineTasks {
        let (window_tx, window_rx) = mpsc::channel(self.buffers.window_queue_depth);

        let producer_cache = self.settings.cache();
        let producer = Producer {
            builder: PieBuilder::new(producer_cache.get().clone(), self.buffers.grid_pool_size),
            cache: producer_cache,
            raw: self.raw.clone(),
            trigger: WindowTrigger::default(),
            windows: window_tx,
            metrics: Arc::clone(&self.metrics),
            cancel: self.cancel.clone(),
            timeout: Duration::from_secs(self.buffers.queue_timeout_secs),
        };

        let reducer_cache = self.settings.cache();
        let reducer = Reducer {
            reducer: SliceReducer::new(reducer_cache.get().clone()),
            cache: reducer_cache,
            averaged: self.averaged.clone(),
            metrics: Arc::clone(&self.metrics),
            cancel: self.cancel.clone(),
        };

        PipelineTasks {
            producer: tokio::spawn(producer.run(records)),
            reducer: tokio::spawn(reducer.run(window_rx)),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Handles to the running loops.
pub struct PipelineTasks {
    producer: JoinHandle<()>,
    reducer: JoinHandle<()>,
    metrics: Arc<PipelineMetrics>,
}

impl PipelineTasks {
    /// Waits for both loops to finish and returns the final counters.
    pub async fn join(self) -> CoreResult<MetricsSnapshot> {
        self.producer
            .await
            .map_err(|err| CoreError::Internal(format!("producer task: {}", err)))?;
        self.reducer
            .await
            .map_err(|err| CoreError::Internal(format!("reducer task: {}", err)))?;
        Ok(self.metrics.snapshot())
    }
}

struct Producer {
    builder: PieBuilder,
    cache: SettingsCache,
    raw: SharedRing<Arc<Pie>>,
    trigger: WindowTrigger,
    windows: mpsc::Sender<PieWindow>,
    metrics: Arc<PipelineMetrics>,
    cancel: CancellationToken,
    timeout: Duration,
}

impl Producer {
    async fn run(mut self, mut records: mpsc::Receiver<DecodedRecord>) {
        loop {
            let record = tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("producer cancelled");
                    break;
                }
                received = tokio::time::timeout(self.timeout, records.recv()) => match received {
                    Ok(Some(record)) => record,
                    Ok(None) => {
                        info!("record queue closed, producer stopping");
                        break;
                    }
                    Err(_) => {
                        warn!("no record within {:?}, producer stopping", self.timeout);
                        break;
                    }
                },
            };

            if self.cache.refresh() {
                match self.builder.configure(self.cache.get()) {
                    Ok(()) => info!("pie builder applied new geometry settings"),
                    Err(err) => warn!("pie builder kept previous settings: {}", err),
                }
            }
            self.ingest(record);
        }
        self.builder.cleanup();
    }

    fn ingest(&mut self, record: DecodedRecord) {
        let projection = match self.builder.execute(record) {
            Ok(projection) => projection,
            Err(err) => {
                warn!("skipping record: {}", err);
                return;
            }
        };
        self.metrics
            .record_pie(projection.pie.is_empty(), projection.discarded.total);

        let window = self.cache.get().along_track_avg_ping;
        let trigger = &mut self.trigger;
        let (evicted, ready) = self.raw.push_then(Arc::new(projection.pie), |ring| {
            if trigger.observe(ring.occupancy(), window) {
                ring.peek_window(window).ok()
            } else {
                None
            }
        });

        if let Some(evicted) = evicted {
            self.metrics.record_eviction();
            if let Ok(pie) = Arc::try_unwrap(evicted) {
                self.builder.recycle(pie);
            }
        }

        if let Some(pies) = ready {
            match self.windows.try_send(pies) {
                Ok(()) => debug!("queued window of {} pies", window),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("reducer is behind, dropping along-track window")
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!("reducer has stopped, dropping along-track window")
                }
            }
        }
    }
}

struct Reducer {
    reducer: SliceReducer,
    cache: SettingsCache,
    averaged: SharedRing<Arc<SliceWindow>>,
    metrics: Arc<PipelineMetrics>,
    cancel: CancellationToken,
}

impl Reducer {
    async fn run(mut self, mut windows: mpsc::Receiver<PieWindow>) {
        loop {
            let pies = tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("reducer cancelled");
                    break;
                }
                window = windows.recv() => match window {
                    Some(pies) => pies,
                    None => {
                        info!("window queue closed, reducer stopping");
                        break;
                    }
                },
            };

            if self.cache.refresh() {
                match self.reducer.configure(self.cache.get()) {
                    Ok(()) => info!("slice reducer applied new geometry settings"),
                    Err(err) => warn!("slice reducer kept previous settings: {}", err),
                }
            }
            match self.reducer.execute(pies) {
                Ok(slice) => {
                    self.averaged.push(Arc::new(slice));
                    self.metrics.record_window();
                }
                Err(err) => warn!("skipping along-track window: {}", err),
            }
        }
    }
}
