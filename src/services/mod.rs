pub mod arbitrage;
pub mod devig;
pub mod market_cache;
pub mod name_normalizer;
pub mod odds_feed;
pub mod risk_engine;

pub use arbitrage::ArbitrageScanner;
pub use market_cache::MarketCache;
pub use name_normalizer::NameNormalizer;
pub use odds_feed::{HttpOddsProvider, OddsProvider, StubOddsProvider};
pub use risk_engine::RiskEngine;
