use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use dedup_core::{
    config::Config,
    schema::{BinObservation, PrecomputedWoes, Scored},
    ScoreError, Scorer,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(author, version, about = "Deduplication risk scoring service")]
struct Args {
    /// JSON config file; flags below override it
    #[arg(long, env = "DEDUP_CONFIG")]
    config: Option<PathBuf>,

    /// Directory with woe_table.json[.gz] and model.json[.gz]
    #[arg(long, env = "DEDUP_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    #[arg(long, env = "DEDUP_LISTEN", default_value = "127.0.0.1:8080")]
    listen: SocketAddr,
}

impl Args {
    fn load_config(&self) -> anyhow::Result<Config> {
        let mut cfg = match &self.config {
            Some(p) => Config::from_file(p)?,
            None => Config::default(),
        };
        if let Some(dir) = &self.model_dir {
            cfg.model_dir = dir.clone();
        }
        Ok(cfg)
    }
}

#[derive(Clone)]
struct AppState {
    scorer: Arc<Scorer>,
    prom: PrometheusHandle,
}

#[derive(Debug, Deserialize)]
struct BinsRequest {
    bins: Vec<(String, String)>,
}

#[derive(Debug, Serialize)]
struct ScoreResponse {
    trace_id: Uuid,
    #[serde(flatten)]
    scored: Scored,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    trace_id: Uuid,
    status: &'static str,
    kind: &'static str,
    message: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let prom = PrometheusBuilder::new().install_recorder()?;

    let args = Args::parse();
    let cfg = args.load_config()?;
    let scorer = Arc::new(Scorer::load(cfg)?);

    let state = AppState { scorer, prom };

    let app = Router::new()
        .route("/score/bins", post(score_bins))
        .route("/score/fields", post(score_fields))
        .route("/score/woes", post(score_woes))
        .route("/reload", post(reload))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("dedup-server listening on http://{}", args.listen);
    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn respond(res: Result<Scored, ScoreError>) -> ApiResult<ScoreResponse> {
    let trace_id = Uuid::new_v4();
    match res {
        Ok(scored) => Ok(Json(ScoreResponse { trace_id, scored })),
        Err(e) => {
            let code = if e.is_input_error() {
                StatusCode::UNPROCESSABLE_ENTITY
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            tracing::warn!(%trace_id, kind = e.kind(), "score failed: {}", e);
            Err((
                code,
                Json(ErrorResponse {
                    trace_id,
                    status: "error",
                    kind: e.kind(),
                    message: e.to_string(),
                }),
            ))
        }
    }
}

async fn score_bins(State(st): State<AppState>, Json(req): Json<BinsRequest>) -> ApiResult<ScoreResponse> {
    respond(st.scorer.score_bins(&req.bins))
}

async fn score_fields(State(st): State<AppState>, Json(obs): Json<BinObservation>) -> ApiResult<ScoreResponse> {
    respond(st.scorer.score_fields(&obs))
}

async fn score_woes(State(st): State<AppState>, Json(woes): Json<PrecomputedWoes>) -> ApiResult<ScoreResponse> {
    respond(st.scorer.score_woes(&woes))
}

#[derive(Debug, Serialize)]
struct ReloadResponse {
    status: &'static str,
    generation: u64,
}

async fn reload(State(st): State<AppState>) -> ApiResult<ReloadResponse> {
    // parsing artefacts is blocking file IO
    let scorer = st.scorer.clone();
    let res = tokio::task::spawn_blocking(move || scorer.reload())
        .await
        .unwrap_or_else(|e| Err(anyhow::anyhow!("reload task panicked: {e}")));

    match res {
        Ok(generation) => Ok(Json(ReloadResponse {
            status: "ok",
            generation,
        })),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                trace_id: Uuid::new_v4(),
                status: "error",
                kind: "reload_failed",
                message: format!("{e:#}"),
            }),
        )),
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    layout: String,
    n_features: usize,
    generation: u64,
}

async fn health(State(st): State<AppState>) -> impl IntoResponse {
    match st.scorer.snapshot() {
        Ok(s) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                layout: s.layout.to_string(),
                n_features: s.classifier.n_features(),
                generation: s.generation,
            }),
        )
            .into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

async fn metrics(State(st): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, st.prom.render())
}
