//! Dashboard HTTP server: descriptive metrics, training, recommendations and
//! prescribed strategies over one long-lived [`Recommender`].

use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};

use axum::{
    extract::{Query, State},
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method, StatusCode,
    },
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{net::TcpListener, task};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::engine::{Recommender, TrainingReport};
use crate::error::AffinityError;
use crate::model::{ItemId, ItemPerformance, Recommendation};
use crate::store::SqliteRatingsStore;
use crate::strategy::{BusinessAction, StrategyEngine};
use crate::telemetry::install_tracing_subscriber;

/// Largest `top_n` a single request may ask for.
pub const MAX_TOP_N: usize = 100;

/// Runtime options used to boot the dashboard HTTP server.
#[derive(Clone, Debug)]
pub struct DashboardOptions {
    /// SQLite ratings database.
    pub db_path: PathBuf,
    /// Page title.
    pub title: String,
    /// Network interface to bind to.
    pub host: IpAddr,
    /// Listening port.
    pub port: u16,
    /// Recommendations per query when the request does not say.
    pub default_top_n: usize,
    /// Middle-tier threshold of the strategy table.
    pub strategy_threshold: f64,
    /// Allowed CORS origins for remote front-ends.
    pub allow_origins: Vec<String>,
    /// Train once before accepting requests.
    pub train_on_start: bool,
}

impl DashboardOptions {
    /// Convenience accessor for `(host, port)` tuples.
    pub fn socket_parts(&self) -> (IpAddr, u16) {
        (self.host, self.port)
    }
}

/// Errors that can occur while running the dashboard server.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// Invalid options or a store failure during start-up.
    #[error("failed to initialize dashboard: {0}")]
    Core(#[from] AffinityError),
    /// Binding or serving failed.
    #[error("dashboard server error: {0}")]
    Io(#[from] std::io::Error),
    /// The start-up training task panicked or was cancelled.
    #[error("internal task failure: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Per-process context handed to every request handler.
pub struct DashboardState {
    recommender: Recommender<SqliteRatingsStore>,
    strategy: StrategyEngine,
    default_top_n: usize,
    title: String,
}

impl DashboardState {
    /// Wires an untrained recommender over `store`.
    pub fn new(
        store: SqliteRatingsStore,
        strategy: StrategyEngine,
        default_top_n: usize,
        title: impl Into<String>,
    ) -> Self {
        Self {
            recommender: Recommender::new(store),
            strategy,
            default_top_n,
            title: title.into(),
        }
    }

    /// The shared recommender.
    pub fn recommender(&self) -> &Recommender<SqliteRatingsStore> {
        &self.recommender
    }

    fn top_n(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_top_n).min(MAX_TOP_N)
    }
}

type AppState = Arc<DashboardState>;

/// Starts the dashboard server and runs until Ctrl-C.
pub async fn serve(options: DashboardOptions) -> Result<(), DashboardError> {
    install_tracing_subscriber("info");

    let strategy = StrategyEngine::new(options.strategy_threshold)?;
    let store = SqliteRatingsStore::new(options.db_path.clone());
    let state = Arc::new(DashboardState::new(
        store,
        strategy,
        options.default_top_n,
        options.title.clone(),
    ));

    if options.train_on_start {
        let trainer = state.clone();
        let trained = task::spawn_blocking(move || trainer.recommender.train()).await?;
        tracing::info!(trained, "dashboard.train_on_start");
    }

    let (host, port) = options.socket_parts();
    let app = build_router(state, &options.allow_origins);
    let addr = SocketAddr::from((host, port));
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(
        %addr,
        db_path = %options.db_path.display(),
        allow_origins = ?options.allow_origins,
        "dashboard listening"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Builds the router; exposed so tests can drive it without a socket.
pub fn build_router(state: AppState, allow_origins: &[String]) -> Router {
    let mut router = Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/api/metrics", get(metrics_handler))
        .route("/api/train", post(train_handler))
        .route("/api/items", get(items_handler))
        .route("/api/recommendations", get(recommendations_handler))
        .route("/api/strategy", get(strategy_handler));

    if let Some(layer) = build_cors_layer(allow_origins) {
        router = router.layer(layer);
    }

    router.with_state(state).layer(TraceLayer::new_for_http())
}

fn build_cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            let normalized = normalize_origin(origin);
            let value = normalized
                .as_deref()
                .and_then(|value| HeaderValue::from_str(value).ok());
            if value.is_none() {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
            }
            value
        })
        .collect();

    if allowed.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([ACCEPT, CONTENT_TYPE]),
    )
}

fn normalize_origin(origin: &str) -> Option<String> {
    let trimmed = origin.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        trained: state.recommender.is_trained(),
    })
}

async fn metrics_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<ItemPerformance>>, AppError> {
    let metrics =
        task::spawn_blocking(move || state.recommender.source().performance_metrics()).await??;
    Ok(Json(metrics))
}

async fn train_handler(State(state): State<AppState>) -> Result<Json<TrainResponse>, AppError> {
    let outcome = task::spawn_blocking(move || state.recommender.try_train()).await?;
    let response = match outcome {
        Ok(report) => TrainResponse {
            success: true,
            report: Some(report),
            message: None,
        },
        Err(err) => {
            tracing::warn!(%err, "dashboard.train.failed");
            TrainResponse {
                success: false,
                report: None,
                message: Some(err.to_string()),
            }
        }
    };
    Ok(Json(response))
}

async fn items_handler(State(state): State<AppState>) -> Json<ItemsResponse> {
    Json(ItemsResponse {
        trained: state.recommender.is_trained(),
        items: state.recommender.item_ids(),
    })
}

async fn recommendations_handler(
    State(state): State<AppState>,
    Query(params): Query<RecommendParams>,
) -> Json<RecommendationsResponse> {
    let top_n = state.top_n(params.top_n);
    Json(RecommendationsResponse {
        item_id: params.item_id,
        trained: state.recommender.is_trained(),
        recommendations: state.recommender.recommend(params.item_id, top_n),
    })
}

async fn strategy_handler(
    State(state): State<AppState>,
    Query(params): Query<RecommendParams>,
) -> Json<StrategyResponse> {
    let top_n = state.top_n(params.top_n);
    let actions = state
        .recommender
        .recommend(params.item_id, top_n)
        .into_iter()
        .map(|recommendation| StrategyEntry {
            action: state
                .strategy
                .prescribe(recommendation.item_id, recommendation.score),
            recommendation,
        })
        .collect();
    Json(StrategyResponse {
        item_id: params.item_id,
        threshold: state.strategy.threshold(),
        actions,
    })
}

async fn index_handler(State(state): State<AppState>) -> Html<String> {
    Html(INDEX_HTML.replace("{{title}}", &escape_html(&state.title)))
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    trained: bool,
}

#[derive(Debug, Serialize)]
struct TrainResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<TrainingReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct ItemsResponse {
    trained: bool,
    items: Vec<ItemId>,
}

#[derive(Debug, Deserialize)]
struct RecommendParams {
    item_id: ItemId,
    #[serde(default)]
    top_n: Option<usize>,
}

#[derive(Debug, Serialize)]
struct RecommendationsResponse {
    item_id: ItemId,
    trained: bool,
    recommendations: Vec<Recommendation>,
}

#[derive(Debug, Serialize)]
struct StrategyEntry {
    recommendation: Recommendation,
    action: BusinessAction,
}

#[derive(Debug, Serialize)]
struct StrategyResponse {
    item_id: ItemId,
    threshold: f64,
    actions: Vec<StrategyEntry>,
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Core(#[from] AffinityError),
    #[error("internal task failure: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(err = %self, "dashboard.request.failed");
        let body = Json(ErrorPayload {
            message: self.to_string(),
        });
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorPayload {
    message: String,
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(err) => tracing::error!(?err, "failed to listen for shutdown signal"),
    }
}

const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <title>{{title}}</title>
    <style>
      body { font-family: system-ui, sans-serif; margin: 2rem 3rem; line-height: 1.5; }
      section { margin-bottom: 2rem; }
      table { border-collapse: collapse; }
      td, th { border: 1px solid #ddd; padding: 0.25rem 0.75rem; text-align: left; }
      .card { border: 1px solid #ddd; border-radius: 6px; padding: 0.5rem 1rem; margin: 0.5rem 0; }
      #status { color: #555; }
    </style>
  </head>
  <body>
    <h1>{{title}}</h1>
    <section>
      <h2>Business Performance Metrics</h2>
      <table id="metrics"><thead><tr><th>Item</th><th>Interactions</th><th>Avg score</th></tr></thead><tbody></tbody></table>
    </section>
    <section>
      <h2>Predictive Phase: Collaborative Filtering</h2>
      <button id="train">Train model</button> <span id="status"></span>
      <div id="query" hidden>
        <select id="item"></select>
        <button id="recommend">Get recommendations</button>
        <button id="strategy">Generate action plan</button>
      </div>
      <div id="results"></div>
    </section>
    <script>
      const $ = (id) => document.getElementById(id);
      const json = (url, opts) => fetch(url, opts).then((r) => r.json());
      function text(value) { const span = document.createElement("span"); span.textContent = value; return span.innerHTML; }
      async function loadMetrics() {
        const rows = await json("/api/metrics");
        if (!Array.isArray(rows)) { $("status").textContent = rows.message || "no data"; return; }
        $("metrics").tBodies[0].innerHTML = rows.map((r) =>
          `<tr><td>${r.item_id}</td><td>${r.total_interactions}</td><td>${r.avg_score.toFixed(2)}</td></tr>`).join("");
      }
      async function loadItems() {
        const body = await json("/api/items");
        $("query").hidden = !body.trained;
        $("item").innerHTML = body.items.map((id) => `<option>${id}</option>`).join("");
      }
      $("train").onclick = async () => {
        $("status").textContent = "Training...";
        const body = await json("/api/train", { method: "POST" });
        $("status").textContent = body.success
          ? `Trained on ${body.report.ratings} ratings (${body.report.items} items).`
          : `Training failed: ${text(body.message)}`;
        await loadItems();
      };
      $("recommend").onclick = async () => {
        const body = await json(`/api/recommendations?item_id=${$("item").value}`);
        $("results").innerHTML = body.recommendations.length
          ? "<table><tr><th>Item</th><th>Confidence</th></tr>" + body.recommendations.map((r) =>
              `<tr><td>${r.item_id}</td><td>${(r.score * 100).toFixed(2)}%</td></tr>`).join("") + "</table>"
          : "<p>No similar items found for the selected item.</p>";
      };
      $("strategy").onclick = async () => {
        const body = await json(`/api/strategy?item_id=${$("item").value}`);
        $("results").innerHTML = body.actions.length
          ? body.actions.map((a) => `<div class="card"><h3>Strategy for Item ${a.action.item_id}</h3>
              <p><b>Match confidence:</b> ${(a.recommendation.score * 100).toFixed(2)}%</p>
              <p><b>${text(a.action.category)}:</b> ${text(a.action.action_plan)}</p>
              <p><b>Priority:</b> ${a.action.priority}</p></div>`).join("")
          : "<p>Could not generate strategy: no similar items found.</p>";
      };
      loadMetrics();
      loadItems();
    </script>
  </body>
</html>"#;
