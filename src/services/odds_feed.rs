use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::models::MarketQuote;
use crate::services::name_normalizer::NameNormalizer;

/// Uniform odds-feed capability (§4.2). The risk engine and market cache
/// depend only on this trait, never on a concrete provider.
#[async_trait::async_trait]
pub trait OddsProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch_odds(&self) -> Vec<MarketQuote>;
}

/// Deterministic fixture quotes for development / no-API-key environments.
/// Deliberately feeds a dirty raw name ("Man Utd") through the normalizer,
/// matching the original mock bookmaker's fixture intent.
pub struct StubOddsProvider {
    mapper: Arc<NameNormalizer>,
}

impl StubOddsProvider {
    pub fn new(mapper: Arc<NameNormalizer>) -> Self {
        Self { mapper }
    }
}

#[async_trait::async_trait]
impl OddsProvider for StubOddsProvider {
    fn name(&self) -> &str {
        "Pinnacle"
    }

    async fn fetch_odds(&self) -> Vec<MarketQuote> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        vec![MarketQuote::new(
            self.name(),
            self.mapper.standardize("Man Utd"),
            self.mapper.standardize("Spurs"),
            2.10,
            3.20,
            Some(3.50),
        )]
    }
}

// ── HTTP provider wire format (spec.md §6) ───────────────────────────────

#[derive(Debug, Deserialize)]
struct OddsEvent {
    home_team: String,
    away_team: String,
    bookmakers: Vec<Bookmaker>,
}

#[derive(Debug, Deserialize)]
struct Bookmaker {
    key: String,
    markets: Vec<Market>,
}

#[derive(Debug, Deserialize)]
struct Market {
    key: String,
    outcomes: Vec<Outcome>,
}

#[derive(Debug, Deserialize)]
struct Outcome {
    name: String,
    price: f64,
}

/// Calls The Odds API for the sharp (pinnacle) h2h market on upcoming
/// soccer fixtures and maps it onto `MarketQuote` via the normalizer.
pub struct HttpOddsProvider {
    client: reqwest::Client,
    api_key: String,
    mapper: Arc<NameNormalizer>,
    request_timeout: Duration,
}

impl HttpOddsProvider {
    pub fn new(api_key: String, mapper: Arc<NameNormalizer>, request_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            mapper,
            request_timeout,
        }
    }

    async fn fetch_once(&self) -> Result<Vec<MarketQuote>, reqwest::Error> {
        let url = "https://api.the-odds-api.com/v4/sports/soccer_upcoming/odds";
        let resp = self
            .client
            .get(url)
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("regions", "eu"),
                ("markets", "h2h"),
                ("bookmakers", "pinnacle"),
            ])
            .timeout(self.request_timeout)
            .send()
            .await?
            .error_for_status()?;

        let events: Vec<OddsEvent> = resp.json().await?;
        Ok(events.iter().filter_map(|e| self.map_event(e)).collect())
    }

    fn map_event(&self, event: &OddsEvent) -> Option<MarketQuote> {
        let bookie = event.bookmakers.iter().find(|b| b.key == "pinnacle")?;
        let market = bookie.markets.iter().find(|m| m.key == "h2h")?;

        let mut home_odds = 0.0;
        let mut away_odds = 0.0;
        let mut draw_odds = 0.0;
        for outcome in &market.outcomes {
            if outcome.name == event.home_team {
                home_odds = outcome.price;
            } else if outcome.name == event.away_team {
                away_odds = outcome.price;
            } else if outcome.name.eq_ignore_ascii_case("draw") {
                draw_odds = outcome.price;
            }
        }

        if home_odds <= 1.0 || away_odds <= 1.0 {
            return None;
        }

        let home_team = self.mapper.standardize(&event.home_team);
        let away_team = self.mapper.standardize(&event.away_team);
        Some(MarketQuote::new(
            self.name(),
            home_team,
            away_team,
            home_odds,
            away_odds,
            if draw_odds > 1.0 { Some(draw_odds) } else { None },
        ))
    }
}

#[async_trait::async_trait]
impl OddsProvider for HttpOddsProvider {
    fn name(&self) -> &str {
        "Pinnacle"
    }

    /// Retries on failure with exponential backoff (base 2s, cap 10s, at
    /// most 3 attempts). Terminal failure yields an empty sequence and is
    /// logged, never raised (§4.2, §7).
    async fn fetch_odds(&self) -> Vec<MarketQuote> {
        let mut delay = Duration::from_secs(2);
        for attempt in 1..=3 {
            match self.fetch_once().await {
                Ok(quotes) => return quotes,
                Err(e) if attempt < 3 => {
                    tracing::warn!(
                        "odds feed attempt {}/3 failed: {}. retrying in {:?}",
                        attempt,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(Duration::from_secs(10));
                }
                Err(e) => {
                    tracing::error!("odds feed exhausted retries: {}", e);
                }
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn stub_provider_runs_raw_name_through_normalizer() {
        let mapper = Arc::new(NameNormalizer::new(
            HashMap::from([("Man Utd".to_string(), "Manchester United".to_string())]),
            85.0,
        ));
        let provider = StubOddsProvider::new(mapper);
        let quotes = provider.fetch_odds().await;
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].home_team, "Manchester United");
    }
}
