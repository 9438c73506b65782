use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use log::info;
use tokio::sync::mpsc;
use wccore::telemetry::MetricsSnapshot;
use wccore::{DecodedRecord, Pipeline, SliceWindow};

/// Channel depth between the feed and the producer loop.
pub const RECORD_QUEUE_DEPTH: usize = 64;

pub struct WorkflowResult {
    pub metrics: MetricsSnapshot,
    pub raw_occupancy: usize,
    pub averaged_occupancy: usize,
    pub latest_slice: Option<SliceWindow>,
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn build_pipeline(&self) -> anyhow::Result<Pipeline> {
        Pipeline::new(self.config.geometry.clone(), self.config.buffers.clone())
            .context("allocating water-column pipeline")
    }

    /// Feeds a finite batch of records through `pipeline` and waits for both
    /// loops to drain.
    pub async fn execute(
        &self,
        pipeline: &Pipeline,
        records: Vec<DecodedRecord>,
    ) -> anyhow::Result<WorkflowResult> {
        let (tx, rx) = mpsc::channel(RECORD_QUEUE_DEPTH);
        let tasks = pipeline.spawn(rx);

        let count = records.len();
        for record in records {
            tx.send(record)
                .await
                .context("sending record to producer loop")?;
        }
        drop(tx);

        let metrics = tasks.join().await.context("joining pipeline tasks")?;
        info!("processed {} records", count);

        let view = pipeline.view();
        Ok(WorkflowResult {
            metrics,
            raw_occupancy: view.raw_occupancy(),
            averaged_occupancy: view.averaged_occupancy(),
            latest_slice: view.latest_slice().map(|slice| (*slice).clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::{build_records, GeneratorConfig};

    #[tokio::test]
    async fn runner_executes_workflow() {
        let mut cfg = WorkflowConfig::from_args(0.5, 120, 5, 50);
        cfg.generator = GeneratorConfig {
            beam_count: 32,
            seafloor_depth_m: 15.0,
            dropout_probability: 0.0,
            ..Default::default()
        };
        cfg.geometry.depth_m = 8.0;
        cfg.geometry.depth_avg_m = 2.0;

        let runner = Runner::new(cfg.clone());
        let pipeline = runner.build_pipeline().unwrap();
        let records = build_records(&cfg.generator, 12).unwrap();
        let result = runner.execute(&pipeline, records).await.unwrap();

        assert_eq!(result.metrics.records_processed, 12);
        assert_eq!(result.metrics.windows_reduced, 2);
        assert_eq!(result.raw_occupancy, 12);
        assert_eq!(result.averaged_occupancy, 2);
        let slice = result.latest_slice.unwrap();
        assert_eq!(slice.vertical_profile.len(), 120);
        assert!(slice.has_data());
    }
}
