use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::EngineConfig;
use crate::db::{create_pool, init_database_with_pool};
use crate::models::{ApiResponse, CustomerTicket, TicketLeg};
use crate::orchestrator::{build_provider, Orchestrator};
use crate::services::NameNormalizer;

pub async fn serve(port: u16) -> anyhow::Result<()> {
    let pool = create_pool().await?;
    init_database_with_pool(&pool).await?;

    let config = EngineConfig::from_env();
    let mapper = Arc::new(NameNormalizer::load(
        &config.team_mapping_path,
        config.fuzzy_match_threshold,
    ));
    let provider = build_provider(&config, mapper);
    let orchestrator = Arc::new(Orchestrator::new(pool, provider, config).await?);

    let app = create_router().with_state(orchestrator);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("riskrouter API listening on port {}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

fn create_router() -> Router<Arc<Orchestrator>> {
    Router::new()
        .route("/health", get(health_check))
        .route("/tickets/evaluate", post(evaluate_ticket_handler))
        .route("/tickets/commit", post(commit_ticket_handler))
        .route("/ledger/exposures", get(get_exposures_handler))
        .route("/ledger/order-book", get(get_order_book_handler))
        .route("/ledger/order-book/export", post(export_order_book_handler))
        .route("/ledger/wipe", delete(wipe_handler))
        .route("/arbitrage/scan", get(scan_arbitrage_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

async fn health_check() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("riskrouter is running"))
}

#[derive(Deserialize)]
struct TicketLegRequest {
    match_id: String,
    selection: String,
    customer_odds: f64,
}

#[derive(Deserialize)]
struct TicketRequest {
    #[serde(default)]
    ticket_id: String,
    stake: f64,
    legs: Vec<TicketLegRequest>,
}

fn build_ticket(request: TicketRequest) -> Result<CustomerTicket, StatusCode> {
    let legs = request
        .legs
        .into_iter()
        .map(|leg| {
            let selection = leg.selection.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
            Ok(TicketLeg {
                match_id: leg.match_id,
                selection,
                customer_odds: leg.customer_odds,
            })
        })
        .collect::<Result<Vec<_>, StatusCode>>()?;

    // A caller that doesn't supply its own ticket_id gets a fresh one, same
    // as every server-generated id elsewhere in the teacher lineage.
    let ticket_id = if request.ticket_id.trim().is_empty() {
        uuid::Uuid::new_v4().to_string()
    } else {
        request.ticket_id
    };

    CustomerTicket::new(ticket_id, request.stake, legs).map_err(|_| StatusCode::BAD_REQUEST)
}

// POST /tickets/evaluate — runs the ticket through the risk engine without committing it.
async fn evaluate_ticket_handler(
    State(orchestrator): State<Arc<Orchestrator>>,
    Json(request): Json<TicketRequest>,
) -> Result<Json<ApiResponse<crate::models::RiskDecision>>, StatusCode> {
    let ticket = build_ticket(request)?;
    let decision = orchestrator.evaluate_one(&ticket).await;
    Ok(Json(ApiResponse::success(decision)))
}

#[derive(Deserialize)]
struct CommitRequest {
    ticket: TicketRequest,
}

// POST /tickets/commit — re-evaluates and, unless the decision is a REJECT,
// applies it to the ledger. Evaluation and commit stay two separate engine
// calls internally; this endpoint is a convenience wrapper over both.
async fn commit_ticket_handler(
    State(orchestrator): State<Arc<Orchestrator>>,
    Json(request): Json<CommitRequest>,
) -> Result<Json<ApiResponse<crate::models::RiskDecision>>, StatusCode> {
    let ticket = build_ticket(request.ticket)?;
    let decision = orchestrator.evaluate_one(&ticket).await;

    if let Err(e) = orchestrator.commit_decision(&decision, &ticket).await {
        tracing::error!("commit failed for ticket {}: {}", ticket.ticket_id, e);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    Ok(Json(ApiResponse::success(decision)))
}

async fn get_exposures_handler(
    State(orchestrator): State<Arc<Orchestrator>>,
) -> Json<ApiResponse<std::collections::HashMap<String, crate::models::PnLVector>>> {
    let exposures = orchestrator.get_all_exposures().await;
    Json(ApiResponse::success(exposures))
}

#[derive(Deserialize)]
struct OrderBookQuery {
    limit: Option<i64>,
}

async fn get_order_book_handler(
    State(orchestrator): State<Arc<Orchestrator>>,
    Query(params): Query<OrderBookQuery>,
) -> Result<Json<ApiResponse<Vec<crate::models::OrderBookEntry>>>, StatusCode> {
    match orchestrator.get_order_book(params.limit.unwrap_or(100)).await {
        Ok(entries) => Ok(Json(ApiResponse::success(entries))),
        Err(e) => {
            tracing::error!("failed to read order book: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn wipe_handler(
    State(orchestrator): State<Arc<Orchestrator>>,
) -> Result<Json<ApiResponse<&'static str>>, StatusCode> {
    match orchestrator.wipe().await {
        Ok(()) => Ok(Json(ApiResponse::success("wiped"))),
        Err(e) => {
            tracing::error!("wipe failed: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[derive(Deserialize)]
struct ExportOrderBookRequest {
    path: String,
    limit: Option<i64>,
}

async fn export_order_book_handler(
    State(orchestrator): State<Arc<Orchestrator>>,
    Json(request): Json<ExportOrderBookRequest>,
) -> Result<Json<ApiResponse<&'static str>>, StatusCode> {
    match orchestrator
        .export_order_book_csv(&request.path, request.limit.unwrap_or(100))
        .await
    {
        Ok(()) => Ok(Json(ApiResponse::success("exported"))),
        Err(e) => {
            tracing::error!("order book export failed: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[derive(Deserialize)]
struct ArbitrageQuery {
    capital: Option<f64>,
}

async fn scan_arbitrage_handler(
    State(orchestrator): State<Arc<Orchestrator>>,
    Query(params): Query<ArbitrageQuery>,
) -> Json<ApiResponse<Vec<crate::models::ArbitrageOpportunity>>> {
    let opportunities = orchestrator.scan_arbitrage(params.capital.unwrap_or(10_000.0)).await;
    Json(ApiResponse::success(opportunities))
}
