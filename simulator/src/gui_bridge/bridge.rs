use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use log::{info, warn};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use warp::{http::StatusCode, Filter};
use wccore::{DecodedRecord, GeometrySettings, Pipeline, SliceWindow};

use crate::gui_bridge::model::{PieDisplay, VisualizationModel};

/// Largest accepted JSON body; one decoded record with a few hundred beams
/// of a few thousand samples fits comfortably.
const MAX_BODY_BYTES: u64 = 16 * 1024 * 1024;

pub fn gui_bind_address(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

#[derive(Debug, Deserialize)]
struct SliceQuery {
    limit: Option<usize>,
}

/// HTTP bridge a renderer polls for ring contents. It also accepts decoded
/// records and geometry edits from an external acquisition process.
pub struct GuiBridge {
    pipeline: Arc<Pipeline>,
    records: mpsc::Sender<DecodedRecord>,
}

impl GuiBridge {
    pub fn new(pipeline: Arc<Pipeline>, records: mpsc::Sender<DecodedRecord>) -> Self {
        Self { pipeline, records }
    }

    pub fn routes(
        &self,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
        let pipeline = with_pipeline(Arc::clone(&self.pipeline));
        let sender = self.records.clone();
        let records = warp::any().map(move || sender.clone());

        let status = warp::path("status")
            .and(warp::path::end())
            .and(warp::get())
            .and(pipeline.clone())
            .map(|pipeline: Arc<Pipeline>| {
                warp::reply::json(&VisualizationModel::capture(
                    &pipeline.view(),
                    pipeline.metrics(),
                ))
            });

        let slices = warp::path("slices")
            .and(warp::path::end())
            .and(warp::get())
            .and(warp::query::<SliceQuery>())
            .and(pipeline.clone())
            .map(|query: SliceQuery, pipeline: Arc<Pipeline>| {
                let history = pipeline.view().slice_history();
                let skip = query
                    .limit
                    .map_or(0, |limit| history.len().saturating_sub(limit));
                let slices: Vec<SliceWindow> = history
                    .iter()
                    .skip(skip)
                    .map(|slice| (**slice).clone())
                    .collect();
                warp::reply::json(&slices)
            });

        let pie = warp::path("pie")
            .and(warp::path::end())
            .and(warp::get())
            .and(pipeline.clone())
            .map(|pipeline: Arc<Pipeline>| {
                match PieDisplay::capture(&pipeline.view()) {
                    Some(display) => {
                        warp::reply::with_status(warp::reply::json(&display), StatusCode::OK)
                    }
                    None => warp::reply::with_status(
                        warp::reply::json(&json!({"error": "no pie buffered yet"})),
                        StatusCode::NOT_FOUND,
                    ),
                }
            });

        let ingest = warp::path("ingest")
            .and(warp::path::end())
            .and(warp::post())
            .and(warp::body::content_length_limit(MAX_BODY_BYTES))
            .and(warp::body::json())
            .and(records)
            .map(|record: DecodedRecord, records: mpsc::Sender<DecodedRecord>| {
                match records.try_send(record) {
                    Ok(()) => warp::reply::with_status(
                        warp::reply::json(&json!({"status": "queued"})),
                        StatusCode::ACCEPTED,
                    ),
                    Err(err) => {
                        warn!("ingest rejected: {}", err);
                        warp::reply::with_status(
                            warp::reply::json(&json!({"error": err.to_string()})),
                            StatusCode::SERVICE_UNAVAILABLE,
                        )
                    }
                }
            });

        let get_settings = warp::path("settings")
            .and(warp::path::end())
            .and(warp::get())
            .and(pipeline.clone())
            .map(|pipeline: Arc<Pipeline>| {
                warp::reply::json(&*pipeline.settings().current())
            });

        let post_settings = warp::path("settings")
            .and(warp::path::end())
            .and(warp::post())
            .and(warp::body::content_length_limit(MAX_BODY_BYTES))
            .and(warp::body::json())
            .and(pipeline)
            .map(|next: GeometrySettings, pipeline: Arc<Pipeline>| {
                match pipeline.settings().update(next) {
                    Ok(()) => {
                        info!("geometry settings updated over HTTP");
                        warp::reply::with_status(
                            warp::reply::json(&*pipeline.settings().current()),
                            StatusCode::OK,
                        )
                    }
                    Err(err) => {
                        warn!("settings update rejected: {}", err);
                        warp::reply::with_status(
                            warp::reply::json(&json!({"error": err.to_string()})),
                            StatusCode::BAD_REQUEST,
                        )
                    }
                }
            });

        status
            .or(slices)
            .or(pie)
            .or(ingest)
            .or(get_settings)
            .or(post_settings)
    }

    /// Serves until `shutdown` resolves.
    pub async fn serve(
        self,
        addr: SocketAddr,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let (bound, server) = warp::serve(self.routes())
            .try_bind_with_graceful_shutdown(addr, shutdown)
            .with_context(|| format!("binding HTTP bridge to {}", addr))?;
        info!("HTTP bridge listening on {}", bound);
        server.await;
        info!("HTTP bridge stopped");
        Ok(())
    }
}

fn with_pipeline(
    pipeline: Arc<Pipeline>,
) -> impl Filter<Extract = (Arc<Pipeline>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&pipeline))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::{build_records, GeneratorConfig};
    use wccore::BufferSettings;

    fn bridge() -> (GuiBridge, mpsc::Receiver<DecodedRecord>) {
        let geometry = GeometrySettings {
            grid_size: 60,
            bin_size_m: 0.5,
            along_track_avg_ping: 2,
            ..Default::default()
        };
        let buffers = BufferSettings {
            raw_ring_capacity: 8,
            ..Default::default()
        };
        let pipeline = Arc::new(Pipeline::new(geometry, buffers).unwrap());
        let (tx, rx) = mpsc::channel(1);
        (GuiBridge::new(pipeline, tx), rx)
    }

    #[tokio::test]
    async fn status_reports_empty_rings() {
        let (bridge, _rx) = bridge();
        let response = warp::test::request()
            .method("GET")
            .path("/status")
            .reply(&bridge.routes())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let model: VisualizationModel = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(model.raw_capacity, 8);
        assert_eq!(model.averaged_capacity, 4);
        assert_eq!(model.raw_occupancy, 0);
        assert!(model.latest_slice.is_none());
    }

    #[tokio::test]
    async fn pie_is_missing_until_one_is_buffered() {
        let (bridge, _rx) = bridge();
        let response = warp::test::request()
            .method("GET")
            .path("/pie")
            .reply(&bridge.routes())
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn slices_start_empty() {
        let (bridge, _rx) = bridge();
        let response = warp::test::request()
            .method("GET")
            .path("/slices?limit=3")
            .reply(&bridge.routes())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let slices: Vec<SliceWindow> = serde_json::from_slice(response.body()).unwrap();
        assert!(slices.is_empty());
    }

    #[tokio::test]
    async fn ingest_queues_records_until_the_channel_is_full() {
        let (bridge, mut rx) = bridge();
        let routes = bridge.routes();
        let config = GeneratorConfig {
            beam_count: 4,
            ..Default::default()
        };
        let records = build_records(&config, 2).unwrap();

        let first = warp::test::request()
            .method("POST")
            .path("/ingest")
            .json(&records[0])
            .reply(&routes)
            .await;
        assert_eq!(first.status(), StatusCode::ACCEPTED);

        let second = warp::test::request()
            .method("POST")
            .path("/ingest")
            .json(&records[1])
            .reply(&routes)
            .await;
        assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);

        let queued = rx.recv().await.unwrap();
        assert_eq!(queued.header.timestamp, records[0].header.timestamp);
    }

    #[tokio::test]
    async fn settings_edits_are_validated() {
        let (bridge, _rx) = bridge();
        let routes = bridge.routes();
        let current: GeometrySettings = serde_json::from_slice(
            warp::test::request()
                .method("GET")
                .path("/settings")
                .reply(&routes)
                .await
                .body(),
        )
        .unwrap();

        let accepted = warp::test::request()
            .method("POST")
            .path("/settings")
            .json(&GeometrySettings {
                depth_m: 4.0,
                ..current.clone()
            })
            .reply(&routes)
            .await;
        assert_eq!(accepted.status(), StatusCode::OK);

        let resized = warp::test::request()
            .method("POST")
            .path("/settings")
            .json(&GeometrySettings {
                grid_size: 80,
                ..current.clone()
            })
            .reply(&routes)
            .await;
        assert_eq!(resized.status(), StatusCode::BAD_REQUEST);

        let oversized_window = warp::test::request()
            .method("POST")
            .path("/settings")
            .json(&GeometrySettings {
                along_track_avg_ping: 10,
                ..current
            })
            .reply(&routes)
            .await;
        assert_eq!(oversized_window.status(), StatusCode::BAD_REQUEST);

        let after: GeometrySettings = serde_json::from_slice(
            warp::test::request()
                .method("GET")
                .path("/settings")
                .reply(&routes)
                .await
                .body(),
        )
        .unwrap();
        assert_eq!(after.depth_m, 4.0);
        assert_eq!(after.grid_size, 60);
        assert_eq!(after.along_track_avg_ping, 2);
    }
}
