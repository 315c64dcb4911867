use thiserror::Error;

/// Domain error taxonomy (spec.md §7).
///
/// `DataMissing` and `MarketClosed` are constructed only at the
/// validation/devig boundary and are always converted into a `REJECT`
/// `RiskDecision` there — they never propagate out of `RiskEngine::evaluate`.
/// `Durable` is the one variant that is genuinely fatal to a caller: a
/// commit that fails to reach disk must not touch the in-memory ledger.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid ticket: {0}")]
    InvalidTicket(String),

    #[error("missing external benchmark: {0}")]
    DataMissing(String),

    #[error("market closed: {0}")]
    MarketClosed(String),

    #[error("durable store failure: {0}")]
    Durable(#[from] sqlx::Error),

    #[error("odds feed failure: {0}")]
    Feed(String),

    #[error("order book export failed: {0}")]
    Export(String),
}
