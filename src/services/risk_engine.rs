use std::collections::HashMap;

use crate::config::RiskConfig;
use crate::ledger::{self, GlobalLedger};
use crate::models::{CustomerTicket, MarketQuote, RiskAction, RiskDecision, Selection};
use crate::services::devig;

struct LegView {
    match_id: String,
    selection: Selection,
    sharp_odds: f64,
    true_prob: f64,
}

/// The S0-S5 decision tree (§4.5). Stateless over its config; all state it
/// needs (current exposure) comes from the ledger it's handed.
pub struct RiskEngine {
    config: RiskConfig,
}

impl RiskEngine {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Evaluates one ticket against a market snapshot and the ledger's
    /// current exposure. Never mutates the ledger — callers decide whether
    /// to commit the returned decision via `GlobalLedger::commit_bet`.
    pub async fn evaluate(
        &self,
        ticket: &CustomerTicket,
        market: &HashMap<String, MarketQuote>,
        ledger: &GlobalLedger,
    ) -> RiskDecision {
        let mut legs = Vec::with_capacity(ticket.legs.len());
        let mut combined_true_prob = 1.0;

        for leg in &ticket.legs {
            let quote = match market.get(&leg.match_id) {
                Some(q) => q,
                None => {
                    return RiskDecision::reject(
                        &ticket.ticket_id,
                        format!("missing sharp market data for {}", leg.match_id),
                    )
                }
            };

            let sharp_odds = match quote.odds_for(leg.selection) {
                Some(odds) if odds > 1.0 => odds,
                _ => {
                    return RiskDecision::reject(
                        &ticket.ticket_id,
                        format!("market closed for {} {:?}", leg.match_id, leg.selection),
                    )
                }
            };

            let true_prob = devig::true_probability(quote, leg.selection);
            combined_true_prob *= true_prob;
            legs.push(LegView {
                match_id: leg.match_id.clone(),
                selection: leg.selection,
                sharp_odds,
                true_prob,
            });
        }

        let house_ev = 1.0 - combined_true_prob * ticket.total_odds();

        // S0: poison rejection.
        if house_ev < self.config.min_house_edge {
            return RiskDecision {
                house_ev,
                true_probability: combined_true_prob,
                ..RiskDecision::reject(
                    &ticket.ticket_id,
                    format!(
                        "poison ticket: house edge {:.2}% below floor {:.2}%",
                        house_ev * 100.0,
                        self.config.min_house_edge * 100.0
                    ),
                )
            };
        }

        // S1: the danger leg is whichever leg is most likely to land.
        let danger = legs
            .iter()
            .max_by(|a, b| a.true_prob.total_cmp(&b.true_prob))
            .expect("ticket always has at least one leg");

        // S2: global worst-case projection against the danger leg's match.
        let current = ledger.get_exposure(&danger.match_id).await;
        let sim = ledger::simulate_bet(
            &current,
            danger.selection,
            ticket.stake,
            ticket.liability(),
        );
        let worst_case = sim.worst_case();

        // S3: safe absorb.
        if worst_case >= -self.config.max_global_liability {
            return RiskDecision {
                ticket_id: ticket.ticket_id.clone(),
                action: RiskAction::AcceptBBook,
                reason: format!(
                    "house edge {:.2}%, worst-case exposure ¥{:.0} within the liability line",
                    house_ev * 100.0,
                    worst_case.abs()
                ),
                house_ev,
                true_probability: combined_true_prob,
                hedge_stake: 0.0,
                hedge_odds: 0.0,
                b_book_stake: ticket.stake,
                retained_stake: ticket.stake,
                retained_liability: ticket.liability(),
                danger_match_id: danger.match_id.clone(),
                danger_selection: Some(danger.selection),
            };
        }

        // S4: hedge sizing.
        let excess = worst_case.abs() - self.config.max_global_liability;
        let raw_hedge = excess / (danger.sharp_odds - 1.0);
        let hedge_stake = (raw_hedge / self.config.hedge_rounding).ceil() * self.config.hedge_rounding;
        let retained_stake = ticket.stake - hedge_stake;
        let retained_liability = ticket.liability() - hedge_stake * (danger.sharp_odds - 1.0);

        // S5: route by residual.
        let (action, b_book_stake, reason) = if retained_stake > 0.0 {
            (
                RiskAction::AcceptPartialHedge,
                retained_stake,
                format!(
                    "exposure breach (excess ¥{:.0}); laying off ¥{:.0} on {} {:?}, retaining ¥{:.0}",
                    excess, hedge_stake, danger.match_id, danger.selection, retained_stake
                ),
            )
        } else {
            (
                RiskAction::AcceptABookHedge,
                0.0,
                format!(
                    "exposure breach (excess ¥{:.0}) exceeds the ticket itself; fully laying off on {} {:?}",
                    excess, danger.match_id, danger.selection
                ),
            )
        };

        RiskDecision {
            ticket_id: ticket.ticket_id.clone(),
            action,
            reason,
            house_ev,
            true_probability: combined_true_prob,
            hedge_stake,
            hedge_odds: danger.sharp_odds,
            b_book_stake,
            retained_stake: retained_stake.max(0.0),
            retained_liability,
            danger_match_id: danger.match_id.clone(),
            danger_selection: Some(danger.selection),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MarketQuote, TicketLeg};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn empty_ledger() -> GlobalLedger {
        let pool = SqlitePoolOptions::new()
            .connect(":memory:")
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE ledger_pnl (
                match_id TEXT PRIMARY KEY,
                home REAL NOT NULL DEFAULT 0,
                draw REAL NOT NULL DEFAULT 0,
                away REAL NOT NULL DEFAULT 0
            )",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "CREATE TABLE order_book (
                ticket_id TEXT PRIMARY KEY,
                ticket_type TEXT NOT NULL,
                stake REAL NOT NULL,
                action TEXT NOT NULL,
                retained_liability REAL NOT NULL,
                hedge_stake REAL NOT NULL,
                danger_match_id TEXT NOT NULL,
                danger_selection TEXT,
                timestamp DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&pool)
        .await
        .unwrap();
        GlobalLedger::load(pool).await.unwrap()
    }

    fn market() -> HashMap<String, MarketQuote> {
        let q = MarketQuote::new("Pinnacle", "Home", "Away", 2.10, 3.20, Some(3.50));
        HashMap::from([(q.match_id.clone(), q)])
    }

    #[tokio::test]
    async fn scenario_a_safe_absorb() {
        let ledger = empty_ledger().await;
        let engine = RiskEngine::new(RiskConfig::default());
        let ticket = CustomerTicket::new(
            "t-a",
            15_000.0,
            vec![TicketLeg {
                match_id: "Home vs Away".into(),
                selection: Selection::Home,
                customer_odds: 2.00,
            }],
        )
        .unwrap();

        let decision = engine.evaluate(&ticket, &market(), &ledger).await;
        assert_eq!(decision.action, RiskAction::AcceptBBook);
        assert!((decision.b_book_stake - 15_000.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn scenario_b_breach_triggers_partial_hedge() {
        let ledger = empty_ledger().await;
        let engine = RiskEngine::new(RiskConfig::default());
        let ticket = CustomerTicket::new(
            "t-b",
            50_000.0,
            vec![TicketLeg {
                match_id: "Home vs Away".into(),
                selection: Selection::Home,
                customer_odds: 2.00,
            }],
        )
        .unwrap();

        let decision = engine.evaluate(&ticket, &market(), &ledger).await;
        assert_eq!(decision.action, RiskAction::AcceptPartialHedge);
        assert!((decision.hedge_stake - 18_200.0).abs() < 1e-6);
        assert!((decision.retained_stake - 31_800.0).abs() < 1e-6);
        assert!((decision.retained_liability - 29_980.0).abs() < 1.0);
    }

    #[tokio::test]
    async fn scenario_c_poison_reject() {
        let ledger = empty_ledger().await;
        let engine = RiskEngine::new(RiskConfig::default());
        let ticket = CustomerTicket::new(
            "t-c",
            15_000.0,
            vec![TicketLeg {
                match_id: "Home vs Away".into(),
                selection: Selection::Home,
                customer_odds: 3.00,
            }],
        )
        .unwrap();

        let decision = engine.evaluate(&ticket, &market(), &ledger).await;
        assert_eq!(decision.action, RiskAction::Reject);
    }

    #[tokio::test]
    async fn scenario_e_parlay_picks_higher_true_prob_as_danger_leg() {
        let ledger = empty_ledger().await;
        let engine = RiskEngine::new(RiskConfig::default());
        let q1 = MarketQuote::new("Pinnacle", "H1", "A1", 2.10, 3.20, Some(3.50));
        let q2 = MarketQuote::new("Pinnacle", "H2", "A2", 1.80, 4.20, Some(3.80));
        let market = HashMap::from([
            (q1.match_id.clone(), q1.clone()),
            (q2.match_id.clone(), q2.clone()),
        ]);

        let ticket = CustomerTicket::new(
            "t-e",
            1_000.0,
            vec![
                TicketLeg {
                    match_id: q1.match_id.clone(),
                    selection: Selection::Home,
                    customer_odds: 2.05,
                },
                TicketLeg {
                    match_id: q2.match_id.clone(),
                    selection: Selection::Home,
                    customer_odds: 1.80,
                },
            ],
        )
        .unwrap();

        let decision = engine.evaluate(&ticket, &market, &ledger).await;
        assert_eq!(decision.danger_match_id, q2.match_id);
        assert_eq!(decision.danger_selection, Some(Selection::Home));
    }

    #[tokio::test]
    async fn missing_market_data_rejects_without_panic() {
        let ledger = empty_ledger().await;
        let engine = RiskEngine::new(RiskConfig::default());
        let ticket = CustomerTicket::new(
            "t-missing",
            5_000.0,
            vec![TicketLeg {
                match_id: "Nowhere vs Nobody".into(),
                selection: Selection::Home,
                customer_odds: 1.9,
            }],
        )
        .unwrap();

        let decision = engine.evaluate(&ticket, &HashMap::new(), &ledger).await;
        assert_eq!(decision.action, RiskAction::Reject);
    }
}
