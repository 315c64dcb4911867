use crate::models::{MarketQuote, Selection};

/// Raw implied probability at a selection, ignoring overround.
fn implied_prob(quote: &MarketQuote, selection: Selection) -> f64 {
    match quote.odds_for(selection) {
        Some(odds) if odds > 0.0 => 1.0 / odds,
        _ => 0.0,
    }
}

/// Overround `M`: sum of raw implied probabilities across all outcomes the
/// quote carries. Not enforced as a hard check (§4.4) — callers that divide
/// by it simply get nonsense back for a malformed market.
pub fn overround(quote: &MarketQuote) -> f64 {
    implied_prob(quote, Selection::Home)
        + implied_prob(quote, Selection::Away)
        + implied_prob(quote, Selection::Draw)
}

/// True outcome probability via proportional margin removal:
/// `true_p(s) = p_s / M`.
pub fn true_probability(quote: &MarketQuote, selection: Selection) -> f64 {
    let m = overround(quote);
    if m <= 0.0 {
        return 0.0;
    }
    implied_prob(quote, selection) / m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn devig_sums_to_one() {
        let q = MarketQuote::new("Pinnacle", "Home", "Away", 2.10, 3.20, Some(3.50));
        let sum = true_probability(&q, Selection::Home)
            + true_probability(&q, Selection::Away)
            + true_probability(&q, Selection::Draw);
        assert!((sum - 1.0).abs() < 1e-9, "sum was {}", sum);
    }

    #[test]
    fn devig_two_way_market_sums_to_one() {
        let q = MarketQuote::new("Pinnacle", "Home", "Away", 1.80, 2.10, None);
        let sum = true_probability(&q, Selection::Home) + true_probability(&q, Selection::Away);
        assert!((sum - 1.0).abs() < 1e-9, "sum was {}", sum);
    }

    #[test]
    fn scenario_a_home_true_prob() {
        let q = MarketQuote::new("Pinnacle", "Home", "Away", 2.10, 3.20, Some(3.50));
        let p = true_probability(&q, Selection::Home);
        assert!((p - 0.4432).abs() < 1e-3, "got {}", p);
    }
}
