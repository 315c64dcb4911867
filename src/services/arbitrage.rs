use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{arb_match_id, ArbitrageOpportunity, MarketQuote};
use crate::services::odds_feed::OddsProvider;

/// Fetches quotes from every configured provider in parallel and scans for
/// 2-way arbitrage across bookmakers (§4.6). Shares the odds-provider
/// capability with the broker core but never touches the ledger or risk
/// engine — a separate, smaller surface by design.
pub struct ArbitrageScanner {
    providers: Vec<Arc<dyn OddsProvider>>,
}

impl ArbitrageScanner {
    pub fn new(providers: Vec<Arc<dyn OddsProvider>>) -> Self {
        Self { providers }
    }

    /// Scans for opportunities, allocating `capital` across each leg in
    /// proportion to its implied probability. Results are sorted by margin
    /// descending.
    pub async fn scan(&self, capital: f64) -> Vec<ArbitrageOpportunity> {
        let fetches = self.providers.iter().map(|p| p.fetch_odds());
        let results = futures_util::future::join_all(fetches).await;

        let mut by_match: HashMap<String, Vec<MarketQuote>> = HashMap::new();
        for quotes in results {
            for quote in quotes {
                let key = arb_match_id(&quote.home_team, &quote.away_team);
                by_match.entry(key).or_default().push(quote);
            }
        }

        let mut opportunities: Vec<ArbitrageOpportunity> = by_match
            .into_iter()
            .filter_map(|(match_id, quotes)| best_two_way(&match_id, &quotes, capital))
            .collect();

        opportunities.sort_by(|a, b| b.margin.total_cmp(&a.margin));
        opportunities
    }
}

/// Picks the best home price and best away price for a fixture across
/// bookmakers. Discards the fixture if the same bookmaker holds both best
/// prices (no genuine arbitrage against a single counterparty), and records
/// an opportunity only if the combined implied probability is under 1.0.
fn best_two_way(match_id: &str, quotes: &[MarketQuote], capital: f64) -> Option<ArbitrageOpportunity> {
    let best_home = quotes.iter().max_by(|a, b| a.home_odds.total_cmp(&b.home_odds))?;
    let best_away = quotes.iter().max_by(|a, b| a.away_odds.total_cmp(&b.away_odds))?;

    if best_home.bookmaker == best_away.bookmaker {
        return None;
    }

    let p_home = 1.0 / best_home.home_odds;
    let p_away = 1.0 / best_away.away_odds;
    let sum = p_home + p_away;
    if sum >= 1.0 {
        return None;
    }

    let margin = 1.0 - sum;
    // Capital-proportional stakes: `(C/sum)/odds_i`. This yields total
    // investment `C/sum`, not `C` — see DESIGN.md for why that discrepancy
    // is surfaced rather than silently corrected.
    let stake_home = (capital / sum) / best_home.home_odds;
    let stake_away = (capital / sum) / best_away.away_odds;

    Some(ArbitrageOpportunity {
        match_id: match_id.to_string(),
        margin,
        best_home_odds: best_home.home_odds,
        best_home_bookmaker: best_home.bookmaker.clone(),
        best_away_odds: best_away.away_odds,
        best_away_bookmaker: best_away.bookmaker.clone(),
        stake_home,
        stake_away,
        total_investment: stake_home * best_home.home_odds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedProvider {
        label: &'static str,
        quote: MarketQuote,
    }

    #[async_trait]
    impl OddsProvider for FixedProvider {
        fn name(&self) -> &str {
            self.label
        }

        async fn fetch_odds(&self) -> Vec<MarketQuote> {
            vec![self.quote.clone()]
        }
    }

    #[tokio::test]
    async fn finds_two_way_arbitrage_across_distinct_bookmakers() {
        let a = Arc::new(FixedProvider {
            label: "BookA",
            quote: MarketQuote::new("BookA", "Home", "Away", 2.10, 1.70, None),
        });
        let b = Arc::new(FixedProvider {
            label: "BookB",
            quote: MarketQuote::new("BookB", "Home", "Away", 1.70, 2.30, None),
        });

        let scanner = ArbitrageScanner::new(vec![a, b]);
        let found = scanner.scan(10_000.0).await;

        assert_eq!(found.len(), 1);
        let opp = &found[0];
        assert_eq!(opp.best_home_bookmaker, "BookA");
        assert_eq!(opp.best_away_bookmaker, "BookB");
        assert!(opp.margin > 0.0);
    }

    #[tokio::test]
    async fn same_bookmaker_best_on_both_sides_is_discarded() {
        let only = Arc::new(FixedProvider {
            label: "Solo",
            quote: MarketQuote::new("Solo", "Home", "Away", 2.50, 2.50, None),
        });

        let scanner = ArbitrageScanner::new(vec![only]);
        let found = scanner.scan(10_000.0).await;
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn no_margin_when_implied_probabilities_exceed_one() {
        let a = Arc::new(FixedProvider {
            label: "BookA",
            quote: MarketQuote::new("BookA", "Home", "Away", 1.50, 1.50, None),
        });
        let b = Arc::new(FixedProvider {
            label: "BookB",
            quote: MarketQuote::new("BookB", "Home", "Away", 1.40, 1.40, None),
        });

        let scanner = ArbitrageScanner::new(vec![a, b]);
        let found = scanner.scan(10_000.0).await;
        assert!(found.is_empty());
    }
}
