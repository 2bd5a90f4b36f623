// Dashboard API - JSON metrics query interface over axum
//
// The dataset is loaded once at startup and shared read-only; each request
// runs its own metrics computation.

use crate::catalog::Category;
use crate::dataset::Dataset;
use crate::error::DashboardError;
use crate::metrics::{MetricsEngine, MetricsQuery, MetricsReport};
use crate::period::Granularity;
use crate::source::Provenance;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    dataset: Arc<Dataset>,
    provenance: Provenance,
}

impl AppState {
    pub fn new(dataset: Dataset, provenance: Provenance) -> Self {
        AppState {
            dataset: Arc::new(dataset),
            provenance,
        }
    }
}

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Available filter values for building query forms
#[derive(Serialize)]
struct FiltersResponse {
    provenance: Provenance,
    records: usize,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    granularities: Vec<Granularity>,
    categories: Vec<CategoryFilter>,
}

#[derive(Serialize)]
struct CategoryFilter {
    category: Category,
    label: &'static str,
    manufacturers: Vec<String>,
}

/// Query string of GET /api/metrics. List filters are comma separated.
#[derive(Debug, Default, Deserialize)]
pub struct MetricsParams {
    pub granularity: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub categories: Option<String>,
    pub manufacturers: Option<String>,
}

impl MetricsParams {
    /// Build a query; a one-sided range is closed with the dataset's bounds.
    pub fn to_query(&self, dataset: &Dataset) -> Result<MetricsQuery, DashboardError> {
        let granularity = match &self.granularity {
            Some(g) => g.parse()?,
            None => Granularity::Quarter,
        };
        let mut query = MetricsQuery::new(granularity);

        if self.start.is_some() || self.end.is_some() {
            if let Some((first, last)) = dataset.date_range() {
                query = query.with_date_range(self.start.unwrap_or(first), self.end.unwrap_or(last));
            }
        }

        if let Some(raw) = &self.categories {
            let categories = split_list(raw)
                .map(|c| c.parse::<Category>())
                .collect::<Result<Vec<_>, _>>()?;
            query = query.with_categories(categories);
        }

        if let Some(raw) = &self.manufacturers {
            query = query.with_manufacturers(split_list(raw).map(String::from).collect());
        }

        Ok(query)
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn error_response(err: DashboardError) -> Response {
    let status = match err {
        DashboardError::EmptyResult => StatusCode::NOT_FOUND,
        ref e if e.is_user_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "metrics request failed");
    }
    (status, Json(ApiResponse::<()>::err(err.to_string()))).into_response()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/filters - Categories, manufacturers and date bounds
async fn get_filters(State(state): State<AppState>) -> impl IntoResponse {
    let dataset = &state.dataset;
    let (start_date, end_date) = match dataset.date_range() {
        Some((start, end)) => (Some(start), Some(end)),
        None => (None, None),
    };

    let categories = dataset
        .categories()
        .into_iter()
        .map(|category| CategoryFilter {
            category,
            label: category.label(),
            manufacturers: dataset.manufacturers(Some(category)),
        })
        .collect();

    Json(ApiResponse::ok(FiltersResponse {
        provenance: state.provenance.clone(),
        records: dataset.len(),
        start_date,
        end_date,
        granularities: Granularity::ALL.to_vec(),
        categories,
    }))
}

/// GET /api/metrics - Aggregates, growth and market share for a query
async fn get_metrics(
    State(state): State<AppState>,
    Query(params): Query<MetricsParams>,
) -> Response {
    let report: Result<MetricsReport, DashboardError> = params
        .to_query(&state.dataset)
        .and_then(|query| MetricsEngine::new(&state.dataset).run(&query));

    match report {
        Ok(report) => (StatusCode::OK, Json(ApiResponse::ok(report))).into_response(),
        Err(e) => error_response(e),
    }
}

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/filters", get(get_filters))
        .route("/metrics", get(get_metrics))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}
