use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::EngineError;

/// Three-way market selection. `Draw` is only meaningful for sports that
/// have one; `MarketQuote::draw_odds` is `None` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    Home,
    Away,
    Draw,
}

impl Selection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Selection::Home => "home",
            Selection::Away => "away",
            Selection::Draw => "draw",
        }
    }
}

impl std::str::FromStr for Selection {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "home" => Ok(Selection::Home),
            "away" => Ok(Selection::Away),
            "draw" => Ok(Selection::Draw),
            other => Err(EngineError::InvalidTicket(format!(
                "unknown selection '{}'",
                other
            ))),
        }
    }
}

/// A single bookmaker's three-way price for one fixture.
///
/// `match_id` is derived, not supplied by callers: see
/// [`MarketQuote::new`]. The broker core keys by source order
/// (`"{home} vs {away}"`); the arbitrage scanner keys by sorted pair — see
/// DESIGN.md for why both conventions coexist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketQuote {
    pub bookmaker: String,
    pub match_id: String,
    pub home_team: String,
    pub away_team: String,
    pub home_odds: f64,
    pub away_odds: f64,
    pub draw_odds: Option<f64>,
}

impl MarketQuote {
    /// Builds a quote and derives `match_id` using the broker (home-vs-away)
    /// fingerprint convention.
    pub fn new(
        bookmaker: impl Into<String>,
        home_team: impl Into<String>,
        away_team: impl Into<String>,
        home_odds: f64,
        away_odds: f64,
        draw_odds: Option<f64>,
    ) -> Self {
        let home_team = home_team.into();
        let away_team = away_team.into();
        let match_id = broker_match_id(&home_team, &away_team);
        Self {
            bookmaker: bookmaker.into(),
            match_id,
            home_team,
            away_team,
            home_odds,
            away_odds,
            draw_odds,
        }
    }

    pub fn odds_for(&self, selection: Selection) -> Option<f64> {
        match selection {
            Selection::Home => Some(self.home_odds),
            Selection::Away => Some(self.away_odds),
            Selection::Draw => self.draw_odds,
        }
    }
}

/// `"{home} vs {away}"` in source order — the broker core's identity key.
pub fn broker_match_id(home_team: &str, away_team: &str) -> String {
    format!("{} vs {}", home_team, away_team)
}

/// Sorted-pair fingerprint used only by the arbitrage scanner (§4.6), which
/// must aggregate the same fixture across bookmakers that may list either
/// team as home.
pub fn arb_match_id(team_a: &str, team_b: &str) -> String {
    if team_a <= team_b {
        format!("{} vs {}", team_a, team_b)
    } else {
        format!("{} vs {}", team_b, team_a)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketLeg {
    pub match_id: String,
    pub selection: Selection,
    pub customer_odds: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketType {
    Single,
    Parlay2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerTicket {
    pub ticket_id: String,
    pub ticket_type: TicketType,
    pub stake: f64,
    pub legs: Vec<TicketLeg>,
}

impl CustomerTicket {
    pub const MIN_STAKE: f64 = 1000.0;
    pub const MAX_STAKE: f64 = 50_000.0;

    /// Validates and constructs a ticket. This is the boundary spec.md §7
    /// assigns malformed-input rejection to; once constructed, the risk
    /// engine assumes a well-formed ticket.
    pub fn new(
        ticket_id: impl Into<String>,
        stake: f64,
        legs: Vec<TicketLeg>,
    ) -> Result<Self, EngineError> {
        if !(Self::MIN_STAKE..=Self::MAX_STAKE).contains(&stake) {
            return Err(EngineError::InvalidTicket(format!(
                "stake {} outside [{}, {}]",
                stake,
                Self::MIN_STAKE,
                Self::MAX_STAKE
            )));
        }
        let ticket_type = match legs.len() {
            1 => TicketType::Single,
            2 => TicketType::Parlay2,
            n => {
                return Err(EngineError::InvalidTicket(format!(
                    "ticket must have 1 or 2 legs, got {}",
                    n
                )))
            }
        };
        for leg in &legs {
            if leg.customer_odds <= 1.0 {
                return Err(EngineError::InvalidTicket(format!(
                    "customer_odds must be > 1.0, got {}",
                    leg.customer_odds
                )));
            }
        }
        Ok(Self {
            ticket_id: ticket_id.into(),
            ticket_type,
            stake,
            legs,
        })
    }

    pub fn total_odds(&self) -> f64 {
        self.legs.iter().map(|l| l.customer_odds).product()
    }

    pub fn potential_payout(&self) -> f64 {
        self.stake * self.total_odds()
    }

    pub fn liability(&self) -> f64 {
        self.potential_payout() - self.stake
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskAction {
    Reject,
    AcceptBBook,
    AcceptABookHedge,
    AcceptPartialHedge,
}

impl RiskAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskAction::Reject => "REJECT",
            RiskAction::AcceptBBook => "ACCEPT_B_BOOK",
            RiskAction::AcceptABookHedge => "ACCEPT_A_BOOK_HEDGE",
            RiskAction::AcceptPartialHedge => "ACCEPT_PARTIAL_HEDGE",
        }
    }

    pub fn is_accept(&self) -> bool {
        !matches!(self, RiskAction::Reject)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskDecision {
    pub ticket_id: String,
    pub action: RiskAction,
    pub reason: String,
    pub house_ev: f64,
    pub true_probability: f64,
    pub hedge_stake: f64,
    pub hedge_odds: f64,
    pub b_book_stake: f64,
    pub retained_stake: f64,
    pub retained_liability: f64,
    pub danger_match_id: String,
    pub danger_selection: Option<Selection>,
}

impl RiskDecision {
    pub fn reject(ticket_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            action: RiskAction::Reject,
            reason: reason.into(),
            house_ev: 0.0,
            true_probability: 0.0,
            hedge_stake: 0.0,
            hedge_odds: 0.0,
            b_book_stake: 0.0,
            retained_stake: 0.0,
            retained_liability: 0.0,
            danger_match_id: String::new(),
            danger_selection: None,
        }
    }
}

/// Per-match PnL snapshot: signed net position for each outcome. Negative
/// means the house pays out on that outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PnLVector {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl PnLVector {
    pub fn get(&self, selection: Selection) -> f64 {
        match selection {
            Selection::Home => self.home,
            Selection::Draw => self.draw,
            Selection::Away => self.away,
        }
    }

    pub fn set(&mut self, selection: Selection, value: f64) {
        match selection {
            Selection::Home => self.home = value,
            Selection::Draw => self.draw = value,
            Selection::Away => self.away = value,
        }
    }

    pub fn worst_case(&self) -> f64 {
        self.home.min(self.draw).min(self.away)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderBookEntry {
    pub ticket_id: String,
    pub ticket_type: String,
    pub stake: f64,
    pub action: String,
    pub retained_liability: f64,
    pub hedge_stake: f64,
    pub danger_match_id: String,
    pub danger_selection: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Uniform success/error envelope for the operator API, matching the
/// teacher's own `ApiResponse<T>` shape.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            timestamp: Utc::now(),
        }
    }
}

/// An arbitrage opportunity found across ≥2 bookmakers for the same fixture
/// (§4.6). Separate from `RiskDecision` — the scanner never touches the
/// ledger or risk engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    pub match_id: String,
    pub margin: f64,
    pub best_home_odds: f64,
    pub best_home_bookmaker: String,
    pub best_away_odds: f64,
    pub best_away_bookmaker: String,
    pub stake_home: f64,
    pub stake_away: f64,
    pub total_investment: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_derives_total_odds_and_liability() {
        let legs = vec![
            TicketLeg {
                match_id: "A vs B".into(),
                selection: Selection::Home,
                customer_odds: 2.0,
            },
            TicketLeg {
                match_id: "C vs D".into(),
                selection: Selection::Away,
                customer_odds: 1.5,
            },
        ];
        let ticket = CustomerTicket::new("t1", 10_000.0, legs).unwrap();
        assert_eq!(ticket.ticket_type, TicketType::Parlay2);
        assert!((ticket.total_odds() - 3.0).abs() < 1e-9);
        assert!((ticket.potential_payout() - 30_000.0).abs() < 1e-9);
        assert!((ticket.liability() - 20_000.0).abs() < 1e-9);
    }

    #[test]
    fn ticket_rejects_stake_out_of_range() {
        let legs = vec![TicketLeg {
            match_id: "A vs B".into(),
            selection: Selection::Home,
            customer_odds: 2.0,
        }];
        assert!(CustomerTicket::new("t1", 500.0, legs.clone()).is_err());
        assert!(CustomerTicket::new("t1", 60_000.0, legs).is_err());
    }

    #[test]
    fn ticket_rejects_wrong_leg_count() {
        assert!(CustomerTicket::new("t1", 5000.0, vec![]).is_err());
        let leg = TicketLeg {
            match_id: "A vs B".into(),
            selection: Selection::Home,
            customer_odds: 2.0,
        };
        let legs = vec![leg.clone(), leg.clone(), leg];
        assert!(CustomerTicket::new("t1", 5000.0, legs).is_err());
    }

    #[test]
    fn broker_and_arb_match_id_conventions_differ() {
        assert_eq!(broker_match_id("Spurs", "Arsenal"), "Spurs vs Arsenal");
        assert_eq!(arb_match_id("Spurs", "Arsenal"), "Arsenal vs Spurs");
        assert_eq!(arb_match_id("Arsenal", "Spurs"), "Arsenal vs Spurs");
    }

    #[test]
    fn pnl_vector_worst_case() {
        let v = PnLVector {
            home: -15000.0,
            draw: 15000.0,
            away: 15000.0,
        };
        assert_eq!(v.worst_case(), -15000.0);
    }
}
