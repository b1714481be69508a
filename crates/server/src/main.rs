//! astar-rank — founder leaderboard and validation community server
//!
//! Usage:
//!   astar-rank serve --port 3001    — Launch the API server
//!   astar-rank seed                 — Seed demo data and print API tokens

mod auth;

use auth::{AuthContext, OptionalAuth, Role};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::{Datelike, Utc};
use clap::{Parser, Subcommand};
use persistence::repository::{
    GoalRepository, InteractionRepository, MetricsRepository, ProductListFilter, ProductRecord,
    ProductRepository, UserRecord, UserRepository, WeeklyTractionRecord,
};
use persistence::{Database, DbError};
use scoring::{
    LeaderboardFilter, LeaderboardService, MokaCache, ScoringError, Timeframe, VoteService,
    DEFAULT_LIMIT,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info};

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "astar-rank")]
#[command(about = "Founder leaderboard and validation community server", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 3001)]
        port: u16,
    },
    /// Seed demo founders, products, votes, and traction history
    Seed,
}

#[derive(Clone)]
struct AppState {
    db: Arc<Database>,
    leaderboard: Arc<LeaderboardService>,
    votes: Arc<VoteService>,
    auth_secret: Arc<str>,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,scoring=debug,astar_rank=debug")
    } else {
        EnvFilter::new("info,scoring=info,astar_rank=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

fn auth_secret_from_env() -> Arc<str> {
    match std::env::var("ASTAR_AUTH_SECRET") {
        Ok(secret) if !secret.is_empty() => Arc::from(secret),
        _ => {
            tracing::warn!("ASTAR_AUTH_SECRET not set, using development secret");
            Arc::from("astar-dev-secret")
        }
    }
}

fn db_path_from_env() -> String {
    std::env::var("ASTAR_DB_PATH").unwrap_or_else(|_| "data/astar.db".to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Serve { host, port } => cmd_serve(&host, port).await?,
        Commands::Seed => cmd_seed().await?,
    }

    Ok(())
}

// ============================================================================
// Serve command — Axum web server
// ============================================================================

async fn cmd_serve(host: &str, port: u16) -> anyhow::Result<()> {
    info!("astar-rank v{} starting...", APP_VERSION);

    let db_path = db_path_from_env();
    let db = Database::new(&db_path).await.map_err(|e| {
        error!("Failed to initialize database: {}", e);
        anyhow::anyhow!("Database initialization failed: {}", e)
    })?;
    info!("Database initialized: {}", db_path);

    // One cache shared by the read path and the vote invalidation path
    let cache = Arc::new(MokaCache::default());
    let state = AppState {
        leaderboard: Arc::new(LeaderboardService::new(db.pool_clone(), cache.clone())),
        votes: Arc::new(VoteService::new(db.pool_clone(), cache)),
        db: Arc::new(db),
        auth_secret: auth_secret_from_env(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Determine static files directory
    let exe_path = std::env::current_exe().unwrap_or_default();
    let exe_dir = exe_path.parent().unwrap_or(std::path::Path::new("."));
    let dist_dir = exe_dir.join("dist");
    let static_dir = if dist_dir.exists() {
        dist_dir
    } else {
        std::path::PathBuf::from("dist")
    };

    let api_routes = Router::new()
        .route("/health", get(api_health))
        .route("/leaderboard/top", get(api_leaderboard_top))
        .route("/leaderboard/stats", get(api_leaderboard_stats))
        .route("/products", get(api_list_products).post(api_create_product))
        .route("/products/:id", get(api_get_product))
        .route("/products/:id/vote", post(api_record_vote).get(api_get_vote))
        .route("/traction/report", post(api_report_traction))
        .route("/traction/summary/:user_id", get(api_traction_summary))
        .route("/traction/metrics/:user_id", get(api_traction_metrics))
        .route("/metrics/snapshot", post(api_insert_snapshot))
        .route("/goals", get(api_list_goals).post(api_create_goal))
        .route("/goals/:id/complete", post(api_complete_goal))
        .route("/agents/interaction", post(api_record_interaction))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .fallback_service(ServeDir::new(&static_dir))
        .layer(cors);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== astar-rank v{} ===", APP_VERSION);
    println!("Founder Leaderboard Server");
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET  /api/health                    - Health check");
    println!("  GET  /api/leaderboard/top           - Ranked leaderboard (cached)");
    println!("  GET  /api/leaderboard/stats         - Cache hit/miss counters");
    println!("  GET  /api/products                  - Browse product listings");
    println!("  POST /api/products                  - Create a listing (auth)");
    println!("  POST /api/products/:id/vote         - Vote 1-5 stars (auth)");
    println!("  GET  /api/products/:id/vote         - Your current vote (auth)");
    println!("  POST /api/traction/report           - Report weekly traction (auth)");
    println!("  GET  /api/traction/summary/:id      - Traction summary with WoW growth");
    println!("  GET  /api/traction/metrics/:id      - Recent weekly traction rows");
    println!("  POST /api/metrics/snapshot          - Append a metric snapshot (auth)");
    println!("  GET  /api/goals                     - Your goals (auth)");
    println!("  POST /api/goals                     - Create a goal (auth)");
    println!("  POST /api/goals/:id/complete        - Complete a goal (auth)");
    println!("  POST /api/agents/interaction        - Record an agent chat (auth)");
    println!("\n  Database: {}", db_path);
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error mapping
// ============================================================================

/// Maps the domain taxonomy onto HTTP statuses
enum ApiError {
    BadRequest(String),
    NotFound(String),
    RateLimited(u64),
    Internal(String),
}

impl From<ScoringError> for ApiError {
    fn from(err: ScoringError) -> Self {
        match err {
            ScoringError::InvalidRating(r) => {
                Self::BadRequest(format!("rating must be an integer between 1 and 5, got {r}"))
            }
            ScoringError::RateLimited { retry_after_secs } => Self::RateLimited(retry_after_secs),
            ScoringError::ProductNotFound(_) => Self::NotFound("Product not found".into()),
            ScoringError::Db(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            Self::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            Self::RateLimited(retry_after) => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": "Too many votes, please slow down",
                    "retryAfter": retry_after,
                })),
            )
                .into_response(),
            Self::Internal(detail) => {
                // Detail stays in the logs; clients get a generic message
                error!("internal error: {detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

fn parse_limit(params: &HashMap<String, String>, default: i64) -> Result<i64, ApiError> {
    match params.get("limit") {
        Some(raw) => raw
            .parse::<i64>()
            .ok()
            .filter(|l| *l > 0)
            .ok_or_else(|| ApiError::BadRequest("limit must be a positive integer".into())),
        None => Ok(default),
    }
}

// ============================================================================
// API Handlers — Health & Leaderboard
// ============================================================================

/// GET /api/health
async fn api_health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "astar-rank",
        "version": APP_VERSION,
    }))
}

/// GET /api/leaderboard/top — ranked leaderboard, cached for public callers
async fn api_leaderboard_top(
    State(state): State<AppState>,
    OptionalAuth(identity): OptionalAuth,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let is_admin = identity.map(|a| a.is_admin()).unwrap_or(false);
    let category = params
        .get("category")
        .filter(|c| !c.is_empty() && c.as_str() != "all")
        .cloned();
    let timeframe = params
        .get("timeframe")
        .and_then(|s| Timeframe::parse(s))
        .unwrap_or(Timeframe::All);
    let limit = parse_limit(&params, DEFAULT_LIMIT)?;

    let filter = LeaderboardFilter {
        category,
        timeframe,
        limit,
        is_admin,
    };
    let leaderboard = state.leaderboard.get(&filter).await?;

    Ok(Json(json!({
        "leaderboard": leaderboard,
        "isAdmin": is_admin,
    })))
}

/// GET /api/leaderboard/stats — cache counters
async fn api_leaderboard_stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "stats": state.leaderboard.stats() }))
}

// ============================================================================
// API Handlers — Products & Votes
// ============================================================================

/// GET /api/products — public listing with filters
async fn api_list_products(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let filter = ProductListFilter {
        category: params.get("category").filter(|c| !c.is_empty()).cloned(),
        status: params.get("status").filter(|s| !s.is_empty()).cloned(),
        featured_only: params.get("featured").map(|f| f == "true").unwrap_or(false),
        limit: parse_limit(&params, 20)?,
        offset: params
            .get("offset")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0),
    };

    let products = ProductRepository::new(state.db.pool()).list(&filter).await?;
    Ok(Json(json!({ "products": products })))
}

#[derive(Deserialize)]
struct CreateProductBody {
    title: String,
    description: Option<String>,
    category: String,
    url: Option<String>,
}

/// POST /api/products — create a listing
async fn api_create_product(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<CreateProductBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.title.trim().is_empty() || body.category.trim().is_empty() {
        return Err(ApiError::BadRequest("title and category are required".into()));
    }

    let id = ProductRepository::new(state.db.pool())
        .create(&ProductRecord {
            id: None,
            user_id: auth.user_id,
            title: body.title.trim().to_string(),
            description: body.description,
            category: body.category.trim().to_string(),
            status: "active".into(),
            featured: 0,
            rating_average: 0.0,
            votes_count: 0,
            url: body.url,
            created_at: None,
            updated_at: None,
        })
        .await?;
    info!(product_id = id, user_id = auth.user_id, "product created");

    Ok(Json(json!({
        "id": id,
        "message": "Product created successfully",
    })))
}

/// GET /api/products/:id
async fn api_get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let product = ProductRepository::new(state.db.pool())
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found".into()))?;

    Ok(Json(json!({ "product": product })))
}

#[derive(Deserialize)]
struct VoteBody {
    rating: i64,
}

/// POST /api/products/:id/vote
async fn api_record_vote(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(body): Json<VoteBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.votes.record_vote(id, auth.user_id, body.rating).await?;

    Ok(Json(json!({
        "message": "Vote recorded",
        "success": true,
        "rating": body.rating,
    })))
}

/// GET /api/products/:id/vote — the caller's current vote
async fn api_get_vote(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let vote = state.votes.get_vote(id, auth.user_id).await?;

    Ok(Json(json!({
        "vote": vote.map(|rating| json!({ "rating": rating })),
    })))
}

// ============================================================================
// API Handlers — Traction & Metrics
// ============================================================================

#[derive(Deserialize)]
struct TractionReportBody {
    revenue_amount: f64,
    new_users: i64,
    active_users: i64,
    #[serde(default)]
    churned_users: i64,
    strongest_signal: Option<String>,
    /// Defaults to the current ISO week
    year: Option<i64>,
    week_number: Option<i64>,
}

/// POST /api/traction/report — upsert the caller's weekly traction row
async fn api_report_traction(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<TractionReportBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.revenue_amount < 0.0
        || body.new_users < 0
        || body.active_users < 0
        || body.churned_users < 0
    {
        return Err(ApiError::BadRequest("traction values must be non-negative".into()));
    }

    let iso = Utc::now().iso_week();
    let year = body.year.unwrap_or(iso.year() as i64);
    let week_number = body.week_number.unwrap_or(iso.week() as i64);
    if !(1..=53).contains(&week_number) {
        return Err(ApiError::BadRequest("week_number must be between 1 and 53".into()));
    }

    MetricsRepository::new(state.db.pool())
        .upsert_week(&WeeklyTractionRecord {
            id: None,
            user_id: auth.user_id,
            year,
            week_number,
            revenue_amount: format!("{}", body.revenue_amount),
            new_users: body.new_users,
            active_users: body.active_users,
            churned_users: body.churned_users,
            strongest_signal: body.strongest_signal,
            created_at: None,
        })
        .await?;
    info!(user_id = auth.user_id, year, week_number, "traction reported");

    Ok(Json(json!({
        "message": "Traction recorded",
        "year": year,
        "week_number": week_number,
    })))
}

/// GET /api/traction/summary/:user_id — latest vs previous week plus totals
async fn api_traction_summary(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let summary = MetricsRepository::new(state.db.pool()).summary(user_id).await?;
    Ok(Json(json!({ "summary": summary })))
}

/// GET /api/traction/metrics/:user_id — recent weekly rows
async fn api_traction_metrics(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let limit = parse_limit(&params, 12)?;
    let metrics = MetricsRepository::new(state.db.pool())
        .latest_weeks(user_id, limit)
        .await?;

    Ok(Json(json!({ "metrics": metrics, "user_id": user_id })))
}

#[derive(Deserialize)]
struct SnapshotBody {
    metric_name: String,
    value: f64,
    /// ISO date, defaults to today
    recorded_date: Option<String>,
}

/// POST /api/metrics/snapshot — append one metric snapshot
async fn api_insert_snapshot(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<SnapshotBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.metric_name != "users" && body.metric_name != "revenue" {
        return Err(ApiError::BadRequest(
            "metric_name must be 'users' or 'revenue'".into(),
        ));
    }
    if body.value < 0.0 {
        return Err(ApiError::BadRequest("value must be non-negative".into()));
    }

    let date = body
        .recorded_date
        .unwrap_or_else(|| Utc::now().date_naive().format("%Y-%m-%d").to_string());

    let id = MetricsRepository::new(state.db.pool())
        .insert_snapshot(auth.user_id, &body.metric_name, body.value, &date)
        .await?;

    Ok(Json(json!({ "id": id, "message": "Snapshot recorded" })))
}

// ============================================================================
// API Handlers — Goals & Engagement
// ============================================================================

/// GET /api/goals — the caller's goals with aggregate counts
async fn api_list_goals(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<serde_json::Value>, ApiError> {
    let repo = GoalRepository::new(state.db.pool());
    let goals = repo.list(auth.user_id).await?;
    let stats = repo.stats(auth.user_id).await?;

    Ok(Json(json!({ "goals": goals, "stats": stats })))
}

#[derive(Deserialize)]
struct CreateGoalBody {
    description: String,
}

/// POST /api/goals
async fn api_create_goal(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<CreateGoalBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.description.trim().is_empty() {
        return Err(ApiError::BadRequest("description is required".into()));
    }

    let id = GoalRepository::new(state.db.pool())
        .create(auth.user_id, body.description.trim())
        .await?;

    Ok(Json(json!({ "id": id, "message": "Goal created" })))
}

/// POST /api/goals/:id/complete
async fn api_complete_goal(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let updated = GoalRepository::new(state.db.pool())
        .complete(id, auth.user_id)
        .await?;
    if !updated {
        return Err(ApiError::NotFound("Goal not found".into()));
    }

    Ok(Json(json!({ "message": "Goal completed" })))
}

#[derive(Deserialize)]
struct InteractionBody {
    agent: String,
}

/// POST /api/agents/interaction — one engagement event
async fn api_record_interaction(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<InteractionBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.agent.trim().is_empty() {
        return Err(ApiError::BadRequest("agent is required".into()));
    }

    InteractionRepository::new(state.db.pool())
        .record(auth.user_id, body.agent.trim())
        .await?;

    Ok(Json(json!({ "message": "Interaction recorded" })))
}

// ============================================================================
// Seed command — demo data for local development
// ============================================================================

async fn cmd_seed() -> anyhow::Result<()> {
    let db_path = db_path_from_env();
    let db = Database::new(&db_path)
        .await
        .map_err(|e| anyhow::anyhow!("Database initialization failed: {}", e))?;
    let secret = auth_secret_from_env();

    println!("\n=== astar-rank v{} — seeding {} ===\n", APP_VERSION, db_path);

    let users = UserRepository::new(db.pool());
    let products = ProductRepository::new(db.pool());
    let metrics = MetricsRepository::new(db.pool());
    let goals = GoalRepository::new(db.pool());
    let interactions = InteractionRepository::new(db.pool());

    let founders: &[(&str, &str, Role)] = &[
        ("Ada", "ada@example.com", Role::Founder),
        ("Bao", "bao@example.com", Role::Founder),
        ("Carla", "carla@example.com", Role::Founder),
        ("Grace", "grace@example.com", Role::Admin),
    ];

    let mut user_ids = Vec::new();
    for (name, email, role) in founders {
        let id = users
            .create(&UserRecord {
                id: None,
                name: name.to_string(),
                email: email.to_string(),
                role: role.as_str().to_string(),
                avatar_url: None,
                created_at: None,
            })
            .await?;
        user_ids.push(id);
        println!(
            "  {} ({}) token: {}",
            name,
            role.as_str(),
            auth::issue_token(&secret, id, *role)
        );
    }

    let listings: &[(usize, &str, &str)] = &[
        (0, "Invoicer", "saas"),
        (1, "Dogwalker Connect", "marketplace"),
        (2, "LedgerLite", "fintech"),
    ];
    let mut product_ids = Vec::new();
    for (owner, title, category) in listings {
        let id = products
            .create(&ProductRecord {
                id: None,
                user_id: user_ids[*owner],
                title: title.to_string(),
                description: Some(format!("{title} — early access")),
                category: category.to_string(),
                status: "active".into(),
                featured: 0,
                rating_average: 0.0,
                votes_count: 0,
                url: None,
                created_at: None,
                updated_at: None,
            })
            .await?;
        product_ids.push(id);
    }

    // Five consecutive traction weeks for Ada (qualifies for the consistency bonus)
    let iso = Utc::now().iso_week();
    for weeks_ago in (0..5i64).rev() {
        let week = iso.week() as i64 - weeks_ago;
        let (year, week) = if week >= 1 {
            (iso.year() as i64, week)
        } else {
            (iso.year() as i64 - 1, week + 52)
        };
        let factor = 5 - weeks_ago;
        metrics
            .upsert_week(&WeeklyTractionRecord {
                id: None,
                user_id: user_ids[0],
                year,
                week_number: week,
                revenue_amount: format!("{}", 800 * factor),
                new_users: 12 + 3 * factor,
                active_users: 80 + 25 * factor,
                churned_users: 2,
                strongest_signal: Some("organic signups".into()),
                created_at: None,
            })
            .await?;
    }

    // Snapshot history for Bao (no weekly reports — exercises the fallback path)
    let today = Utc::now().date_naive();
    for (days_ago, users_value, revenue_value) in
        [(35, 40.0, 150.0), (10, 60.0, 240.0), (0, 75.0, 300.0)]
    {
        let date = (today - chrono::Duration::days(days_ago))
            .format("%Y-%m-%d")
            .to_string();
        metrics.insert_snapshot(user_ids[1], "users", users_value, &date).await?;
        metrics.insert_snapshot(user_ids[1], "revenue", revenue_value, &date).await?;
    }

    let g = goals.create(user_ids[0], "Reach $5k MRR").await?;
    goals.complete(g, user_ids[0]).await?;
    goals.create(user_ids[0], "Launch referral program").await?;
    goals.create(user_ids[1], "Interview 20 dog owners").await?;

    for _ in 0..4 {
        interactions.record(user_ids[0], "marketing").await?;
    }
    interactions.record(user_ids[1], "metrics").await?;

    // Cross-votes between founders (the vote path also maintains the aggregates)
    let cache = Arc::new(MokaCache::default());
    let votes = VoteService::new(db.pool_clone(), cache);
    votes.record_vote(product_ids[0], user_ids[1], 5).await?;
    votes.record_vote(product_ids[0], user_ids[2], 4).await?;
    votes.record_vote(product_ids[1], user_ids[0], 4).await?;

    println!("\nSeeded {} users, {} products.", user_ids.len(), product_ids.len());
    println!("Try: curl http://localhost:3001/api/leaderboard/top?category=saas\n");

    Ok(())
}
