//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::Config;
use crate::engine::types::{AgentRun, Provider};
use crate::engine::{EngineError, ExecuteOptions, ForkSpec, LlmTitleGenerator, RunEngine};
use crate::engine::CreateRunRequest;
use crate::llm::{CallerSet, HttpModelCaller};
use crate::store::{RunStore, create_run_store};

use super::types::*;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub engine: Arc<RunEngine>,
    /// Providers with a configured API key, for the health endpoint.
    pub providers: Vec<Provider>,
    pub store_persistent: bool,
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let store = create_run_store(config.store_type, config.data_dir.clone())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize run store: {}", e))?;
    let store_persistent = store.is_persistent();
    let store: Arc<dyn RunStore> = Arc::from(store);

    let mut callers = CallerSet::new();
    for provider in [Provider::OpenAi, Provider::Anthropic, Provider::Google] {
        if let Some(key) = config.api_key_for(provider) {
            callers = callers.register(
                provider,
                Arc::new(HttpModelCaller::for_provider(provider, key.to_string())),
            );
        }
    }
    let providers = callers.providers();

    let mut engine = RunEngine::new(
        store,
        callers.clone(),
        config.default_provider,
        config.default_model.clone(),
    );
    if let Some(caller) = callers.caller_for(config.default_provider) {
        engine = engine.with_title_generator(Arc::new(LlmTitleGenerator::new(
            caller,
            config.title_model.clone(),
        )));
    }

    let state = Arc::new(AppState {
        config: config.clone(),
        engine: Arc::new(engine),
        providers,
        store_persistent,
    });

    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/runs", post(create_run).get(list_runs))
        .route("/api/runs/:id", get(get_run).delete(delete_run))
        .route("/api/runs/:id/design", post(design_run))
        .route("/api/runs/:id/execute", post(execute_run))
        .route("/api/runs/:id/resume", post(resume_run))
        .route("/api/runs/:id/fork", post(fork_run))
        .route("/api/runs/:id/ghost", post(ghost_run))
        .route("/api/runs/:id/promote", post(promote_ghost))
        .route("/api/runs/:id/critic", post(critic_run))
        .route("/api/runs/:id/agents", put(update_agents))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

fn engine_error(e: EngineError) -> (StatusCode, String) {
    let status = match &e {
        EngineError::RunNotFound(_) | EngineError::AgentNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::InvalidState { .. } => StatusCode::CONFLICT,
        EngineError::InvalidRequest(_) | EngineError::NoCaller(_) => StatusCode::BAD_REQUEST,
        EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        providers: state.providers.iter().map(|p| p.to_string()).collect(),
        store_persistent: state.store_persistent,
    })
}

async fn create_run(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateRunBody>,
) -> Result<Json<AgentRun>, (StatusCode, String)> {
    let run = state
        .engine
        .create_run(CreateRunRequest {
            user_goal: body.user_goal,
            project_name: body.project_name,
            provider: body.provider,
            model: body.model,
        })
        .await
        .map_err(engine_error)?;
    Ok(Json(run))
}

async fn list_runs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<RunSummary>>, (StatusCode, String)> {
    let runs = state
        .engine
        .list_runs(params.limit, params.offset)
        .await
        .map_err(engine_error)?;
    Ok(Json(runs.iter().map(RunSummary::from).collect()))
}

async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<AgentRun>, (StatusCode, String)> {
    let run = state.engine.get_run(id).await.map_err(engine_error)?;
    Ok(Json(run))
}

async fn delete_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let deleted = state.engine.delete_run(id).await.map_err(engine_error)?;
    if !deleted {
        return Err((StatusCode::NOT_FOUND, format!("Run {} not found", id)));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}

async fn design_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<AgentRun>, (StatusCode, String)> {
    let run = state.engine.design_run(id).await.map_err(engine_error)?;
    Ok(Json(run))
}

/// Validate synchronously, then run the step loop in the background. The
/// acknowledgement carries the status the run transitioned to.
async fn execute_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    body: Option<Json<ExecuteBody>>,
) -> Result<Json<RunAck>, (StatusCode, String)> {
    let Json(body) = body.unwrap_or_default();
    let opts = ExecuteOptions {
        design_only: body.design_only,
        breakpoints: body.breakpoints,
        edited_agent_id: body.edited_agent_id,
        edited_prompt: body.edited_prompt,
    };
    let run = state
        .engine
        .begin_execute(id, &opts)
        .await
        .map_err(engine_error)?;

    let engine = Arc::clone(&state.engine);
    let design_only = opts.design_only;
    tokio::spawn(async move {
        if let Err(e) = engine.drive_execute(id, design_only).await {
            tracing::error!(run_id = %id, "Background execution error: {}", e);
        }
    });
    Ok(Json(RunAck::from(&run)))
}

async fn resume_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    body: Option<Json<ResumeBody>>,
) -> Result<Json<RunAck>, (StatusCode, String)> {
    let Json(body) = body.unwrap_or_default();
    let run = state
        .engine
        .begin_resume(id, body.user_hint)
        .await
        .map_err(engine_error)?;

    let engine = Arc::clone(&state.engine);
    tokio::spawn(async move {
        if let Err(e) = engine.drive_resume(id).await {
            tracing::error!(run_id = %id, "Background resume error: {}", e);
        }
    });
    Ok(Json(RunAck::from(&run)))
}

async fn fork_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<ForkBody>,
) -> Result<Json<AgentRun>, (StatusCode, String)> {
    let spec = ForkSpec {
        step_index: body.step_index,
        edited_agent_id: body.edited_agent_id,
        edited_prompt: body.edited_prompt,
    };
    let forked = state.engine.fork(id, &spec).await.map_err(engine_error)?;
    Ok(Json(forked))
}

async fn ghost_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<GhostBody>,
) -> Result<Json<AgentRun>, (StatusCode, String)> {
    let ghost = state
        .engine
        .ghost(id, &body.agent_id, &body.prompt)
        .await
        .map_err(engine_error)?;
    Ok(Json(ghost))
}

async fn promote_ghost(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<PromoteBody>,
) -> Result<Json<AgentRun>, (StatusCode, String)> {
    let live = state
        .engine
        .promote(id, body.ghost_run_id)
        .await
        .map_err(engine_error)?;
    Ok(Json(live))
}

async fn critic_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<AgentRun>, (StatusCode, String)> {
    let run = state.engine.critic_pass(id).await.map_err(engine_error)?;
    Ok(Json(run))
}

async fn update_agents(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateAgentsBody>,
) -> Result<Json<AgentRun>, (StatusCode, String)> {
    let run = state
        .engine
        .update_agent_definitions(id, body.agents)
        .await
        .map_err(engine_error)?;
    Ok(Json(run))
}
