use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::ledger::GlobalLedger;
use crate::models::{ArbitrageOpportunity, CustomerTicket, PnLVector, RiskDecision};
use crate::services::{ArbitrageScanner, MarketCache, OddsProvider, RiskEngine};

use std::collections::HashMap;

/// Owns one ledger, one cache, one feed provider, one risk engine (§4.8,
/// §9 "singleton-by-construction"). There is no module-level global state
/// anywhere in this crate — every operator surface (API, CLI) is handed an
/// `Arc<Orchestrator>` built once at startup.
pub struct Orchestrator {
    ledger: GlobalLedger,
    cache: MarketCache,
    risk_engine: RiskEngine,
    arbitrage: ArbitrageScanner,
}

impl Orchestrator {
    pub async fn new(
        pool: SqlitePool,
        provider: Arc<dyn OddsProvider>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let ledger = GlobalLedger::load(pool).await?;
        let cache = MarketCache::new(provider.clone(), config.cache_ttl);
        let risk_engine = RiskEngine::new(config.risk);
        let arbitrage = ArbitrageScanner::new(vec![provider]);

        Ok(Self {
            ledger,
            cache,
            risk_engine,
            arbitrage,
        })
    }

    /// Evaluates each ticket against the current market snapshot (a cache
    /// hit unless stale), returning one decision per ticket in input order.
    /// Evaluation never mutates the ledger; see `commit_decision`.
    pub async fn evaluate(&self, tickets: &[CustomerTicket]) -> Vec<RiskDecision> {
        let market = self.cache.get_live_market(false).await;
        let mut decisions = Vec::with_capacity(tickets.len());
        for ticket in tickets {
            decisions.push(self.risk_engine.evaluate(ticket, &market, &self.ledger).await);
        }
        decisions
    }

    /// Evaluates a single ticket. Convenience wrapper over `evaluate` for
    /// the common one-ticket-at-a-time API path.
    pub async fn evaluate_one(&self, ticket: &CustomerTicket) -> RiskDecision {
        let market = self.cache.get_live_market(false).await;
        self.risk_engine.evaluate(ticket, &market, &self.ledger).await
    }

    /// No-op for `REJECT`; for all accept actions, applies the danger leg's
    /// stake/liability to the ledger and appends an order-book row (§4.8).
    /// Evaluation and commit are deliberately separate steps — a caller may
    /// evaluate many tickets before committing a subset.
    pub async fn commit_decision(
        &self,
        decision: &RiskDecision,
        ticket: &CustomerTicket,
    ) -> Result<(), EngineError> {
        self.ledger.commit_bet(ticket, decision).await
    }

    pub async fn get_all_exposures(&self) -> HashMap<String, PnLVector> {
        self.ledger.get_all_exposures().await
    }

    pub async fn get_order_book(&self, limit: i64) -> Result<Vec<crate::models::OrderBookEntry>, EngineError> {
        self.ledger.get_order_book(limit).await
    }

    pub async fn export_order_book_csv(&self, path: &str, limit: i64) -> Result<(), EngineError> {
        self.ledger.export_order_book_csv(path, limit).await
    }

    pub async fn scan_arbitrage(&self, capital: f64) -> Vec<ArbitrageOpportunity> {
        self.arbitrage.scan(capital).await
    }

    /// Wipes the ledger and order book. Forces the next `evaluate` to
    /// refresh the market snapshot too, since a wipe usually means a demo
    /// reset and stale odds would be confusing.
    pub async fn wipe(&self) -> Result<(), EngineError> {
        self.ledger.wipe().await?;
        self.cache.get_live_market(true).await;
        Ok(())
    }
}

/// Helper re-exported for `main.rs`/`api` wiring: builds the feed provider
/// the config calls for (HTTP if an API key is configured, stub otherwise).
pub fn build_provider(config: &EngineConfig, mapper: Arc<crate::services::NameNormalizer>) -> Arc<dyn OddsProvider> {
    match &config.odds_api_key {
        Some(key) => Arc::new(crate::services::HttpOddsProvider::new(
            key.clone(),
            mapper,
            config.request_timeout,
        )),
        None => Arc::new(crate::services::StubOddsProvider::new(mapper)),
    }
}
