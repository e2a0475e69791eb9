//! HTTP handler functions for the trip demand API.

use std::num::NonZeroUsize;

use actix_web::{HttpResponse, web};
use trip_demand_pipeline::PipelineError;
use trip_demand_pipeline::aggregate::to_row;
use trip_demand_pipeline::boundary::feature_collection;
use trip_demand_pipeline::segments::DEFAULT_MAP_CENTER;
use trip_demand_server_models::{
    ApiDemand, ApiError, ApiHealth, ApiSegments, RoleQueryParams, SegmentQueryParams,
    TopQueryParams,
};
use trip_demand_trace_models::{DemandRow, EndpointRole};

use crate::AppState;

const DEFAULT_TOP_N: usize = 20;

/// `GET /api/health`
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        index_revision: format!("{:?}", state.pipeline.grid().revision()).to_lowercase(),
    })
}

/// `GET /api/demand`
///
/// Returns per-cell counts for the requested role.
pub async fn demand(
    state: web::Data<AppState>,
    params: web::Query<RoleQueryParams>,
) -> HttpResponse {
    let role = match parse_role(params.role.as_deref()) {
        Ok(role) => role,
        Err(response) => return response,
    };
    let resolution = state.config.resolution;

    let result = compute(&state, move |s| {
        s.pipeline
            .demand_surface(&s.config.dataset_path, resolution)
    })
    .await;

    match result {
        Ok(surface) => {
            let aggregate = surface.for_role(role);
            let range = aggregate.count_range();
            HttpResponse::Ok().json(ApiDemand {
                role,
                resolution: resolution.value(),
                total: aggregate.total(),
                cell_mapping_failures: surface.report.cell_mapping_failures(),
                count_min: range.map(|(min, _)| min),
                count_max: range.map(|(_, max)| max),
                cells: aggregate.to_rows(),
            })
        }
        Err(e) if e.is_recoverable() => {
            log::warn!("Serving empty demand: {e}");
            HttpResponse::Ok().json(ApiDemand::empty(role, resolution.value()))
        }
        Err(e) => error_response("Failed to compute demand", &e),
    }
}

/// `GET /api/demand/top`
///
/// Returns the busiest cells for the requested role, highest count first.
pub async fn top_cells(
    state: web::Data<AppState>,
    params: web::Query<TopQueryParams>,
) -> HttpResponse {
    let role = match parse_role(params.role.as_deref()) {
        Ok(role) => role,
        Err(response) => return response,
    };
    let n = params.n.unwrap_or(DEFAULT_TOP_N);
    let resolution = state.config.resolution;

    let result = compute(&state, move |s| {
        s.pipeline
            .demand_surface(&s.config.dataset_path, resolution)
    })
    .await;

    match result {
        Ok(surface) => {
            let rows: Vec<DemandRow> = surface.for_role(role).top(n).iter().map(to_row).collect();
            HttpResponse::Ok().json(rows)
        }
        Err(e) if e.is_recoverable() => HttpResponse::Ok().json(Vec::<DemandRow>::new()),
        Err(e) => error_response("Failed to compute top cells", &e),
    }
}

/// `GET /api/heatmap`
///
/// Returns the cell polygons for the requested role as a `GeoJSON`
/// `FeatureCollection`. An empty dataset yields an empty collection.
pub async fn heatmap(
    state: web::Data<AppState>,
    params: web::Query<RoleQueryParams>,
) -> HttpResponse {
    let role = match parse_role(params.role.as_deref()) {
        Ok(role) => role,
        Err(response) => return response,
    };
    let resolution = state.config.resolution;

    let result = compute(&state, move |s| {
        s.pipeline
            .heatmap(&s.config.dataset_path, resolution, role)
    })
    .await;

    match result {
        Ok(layer) => HttpResponse::Ok().json(layer.to_feature_collection()),
        Err(e) if e.is_recoverable() => {
            log::warn!("Serving empty heatmap: {e}");
            HttpResponse::Ok().json(feature_collection(&[]))
        }
        Err(e) => error_response("Failed to compute heatmap", &e),
    }
}

/// `GET /api/segments`
///
/// Returns start→finish segments. `limit=0` disables the cap; no `limit`
/// uses the configured default.
pub async fn segments(
    state: web::Data<AppState>,
    params: web::Query<SegmentQueryParams>,
) -> HttpResponse {
    let limit = params
        .limit
        .map_or(state.config.segment_limit, NonZeroUsize::new);

    let result = compute(&state, move |s| {
        s.pipeline.segments(&s.config.dataset_path, limit)
    })
    .await;

    match result {
        Ok(table) => HttpResponse::Ok().json(ApiSegments {
            map_center: table.map_center(),
            trip_ids: table.trip_ids().into_iter().map(str::to_string).collect(),
            segments: table.to_rows(),
        }),
        Err(e) if e.is_recoverable() => {
            log::warn!("Serving empty segments: {e}");
            HttpResponse::Ok().json(ApiSegments {
                map_center: DEFAULT_MAP_CENTER,
                trip_ids: Vec::new(),
                segments: Vec::new(),
            })
        }
        Err(e) => error_response("Failed to build segments", &e),
    }
}

/// `POST /api/cache/flush`
pub async fn flush_cache(state: web::Data<AppState>) -> HttpResponse {
    state.pipeline.flush_cache();
    HttpResponse::NoContent().finish()
}

/// Runs a pipeline call on the blocking thread pool.
async fn compute<T, F>(state: &web::Data<AppState>, f: F) -> Result<T, PipelineError>
where
    T: Send + 'static,
    F: FnOnce(&AppState) -> Result<T, PipelineError> + Send + 'static,
{
    let state = state.clone();
    match web::block(move || f(state.get_ref())).await {
        Ok(result) => result,
        Err(e) => Err(PipelineError::Io(std::io::Error::other(e.to_string()))),
    }
}

fn parse_role(raw: Option<&str>) -> Result<EndpointRole, HttpResponse> {
    let Some(raw) = raw else {
        return Ok(EndpointRole::Pickup);
    };
    raw.trim().parse().map_err(|_| {
        HttpResponse::BadRequest().json(ApiError {
            error: format!("Unknown role '{raw}', expected 'pickup' or 'dropoff'"),
        })
    })
}

fn error_response(context: &str, e: &PipelineError) -> HttpResponse {
    log::error!("{context}: {e}");
    HttpResponse::InternalServerError().json(ApiError {
        error: format!("{context}: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use actix_web::{App, test};
    use trip_demand_grid::{GridIndex, H3oBackend};
    use trip_demand_pipeline::Pipeline;
    use trip_demand_pipeline::config::PipelineConfig;

    use super::*;
    use crate::configure;

    fn state(name: &str, csv: Option<&str>) -> (PathBuf, web::Data<AppState>) {
        let dir = std::env::temp_dir().join(format!("trip_demand_server_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("traces.csv");
        if let Some(csv) = csv {
            std::fs::write(&path, csv).unwrap();
        }

        let grid = GridIndex::bind(Arc::new(H3oBackend::current())).unwrap();
        let state = AppState {
            pipeline: Arc::new(Pipeline::new(grid, Duration::from_secs(60))),
            config: PipelineConfig {
                dataset_path: path,
                ..PipelineConfig::default()
            },
        };
        (dir, web::Data::new(state))
    }

    const TRACES: &str =
        "randomized_id,lat,lng\nA,51.128,71.43\nA,51.09,71.41\nB,51.128,71.43\nC,51.2,71.5\n";

    #[actix_web::test]
    async fn demand_defaults_to_pickups() {
        let (dir, state) = state("demand", Some(TRACES));
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = test::TestRequest::get().uri("/api/demand").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["role"], "pickup");
        assert_eq!(body["total"], 3);
        assert_eq!(body["resolution"], 9);
        assert_eq!(body["countMin"], 1);
        assert_eq!(body["countMax"], 2);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[actix_web::test]
    async fn top_accepts_role_alias() {
        let (dir, state) = state("top", Some(TRACES));
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = test::TestRequest::get()
            .uri("/api/demand/top?role=demand&n=1")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.as_array().map(Vec::len), Some(1));
        assert_eq!(body[0]["count"], 2);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[actix_web::test]
    async fn unknown_role_is_bad_request() {
        let (dir, state) = state("bad_role", Some(TRACES));
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = test::TestRequest::get()
            .uri("/api/heatmap?role=sideways")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[actix_web::test]
    async fn empty_dataset_serves_empty_collection() {
        let (dir, state) = state("empty_heatmap", Some("randomized_id,lat,lng\n"));
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = test::TestRequest::get()
            .uri("/api/heatmap?role=dropoff")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(
            body,
            serde_json::json!({"type": "FeatureCollection", "features": []})
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[actix_web::test]
    async fn missing_dataset_is_server_error() {
        let (dir, state) = state("missing", None);
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = test::TestRequest::get().uri("/api/segments").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(
            resp.status(),
            actix_web::http::StatusCode::INTERNAL_SERVER_ERROR
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[actix_web::test]
    async fn segments_respect_limit() {
        let (dir, state) = state("segments", Some(TRACES));
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = test::TestRequest::get()
            .uri("/api/segments?limit=2")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["tripIds"], serde_json::json!(["A", "B"]));
        assert_eq!(body["segments"].as_array().map(Vec::len), Some(2));

        let req = test::TestRequest::get()
            .uri("/api/segments?limit=0")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["segments"].as_array().map(Vec::len), Some(3));

        std::fs::remove_dir_all(&dir).ok();
    }
}
