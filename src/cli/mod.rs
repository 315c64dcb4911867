use std::sync::Arc;

use anyhow::Result;

use crate::config::EngineConfig;
use crate::db::{create_pool, init_database_with_pool};
use crate::models::{CustomerTicket, Selection, TicketLeg};
use crate::orchestrator::{build_provider, Orchestrator};
use crate::services::NameNormalizer;

async fn build_orchestrator() -> Result<Orchestrator> {
    let pool = create_pool().await?;
    init_database_with_pool(&pool).await?;

    let config = EngineConfig::from_env();
    let mapper = Arc::new(NameNormalizer::load(
        &config.team_mapping_path,
        config.fuzzy_match_threshold,
    ));
    let provider = build_provider(&config, mapper);
    Ok(Orchestrator::new(pool, provider, config).await?)
}

/// Evaluates a single ticket and prints the routing decision. Does not
/// commit — use `commit` to apply it to the ledger.
pub async fn evaluate_ticket(
    ticket_id: &str,
    stake: f64,
    match_id: &str,
    selection: &str,
    customer_odds: f64,
) -> Result<()> {
    let orchestrator = build_orchestrator().await?;
    let selection: Selection = selection.parse()?;
    let ticket = CustomerTicket::new(
        ticket_id,
        stake,
        vec![TicketLeg {
            match_id: match_id.to_string(),
            selection,
            customer_odds,
        }],
    )?;

    println!("🎲 Evaluating ticket {}...", ticket_id);
    let decision = orchestrator.evaluate_one(&ticket).await;
    print_decision(&decision);
    Ok(())
}

/// Evaluates and, unless rejected, commits the same single-leg ticket.
pub async fn commit_ticket(
    ticket_id: &str,
    stake: f64,
    match_id: &str,
    selection: &str,
    customer_odds: f64,
) -> Result<()> {
    let orchestrator = build_orchestrator().await?;
    let selection: Selection = selection.parse()?;
    let ticket = CustomerTicket::new(
        ticket_id,
        stake,
        vec![TicketLeg {
            match_id: match_id.to_string(),
            selection,
            customer_odds,
        }],
    )?;

    let decision = orchestrator.evaluate_one(&ticket).await;
    print_decision(&decision);

    if decision.action.is_accept() {
        orchestrator.commit_decision(&decision, &ticket).await?;
        println!("✅ Committed to the ledger.");
    } else {
        println!("📭 Nothing to commit — ticket was rejected.");
    }

    Ok(())
}

fn print_decision(decision: &crate::models::RiskDecision) {
    println!("   Action: {}", decision.action.as_str());
    println!("   Reason: {}", decision.reason);
    println!(
        "   House EV: {:.2}% | True probability: {:.2}%",
        decision.house_ev * 100.0,
        decision.true_probability * 100.0
    );
    if decision.action.is_accept() {
        println!(
            "   B-book stake: ¥{:.0} | Hedge stake: ¥{:.0} @ {:.2}",
            decision.b_book_stake, decision.hedge_stake, decision.hedge_odds
        );
        println!(
            "   Retained liability: ¥{:.0} on {} {:?}",
            decision.retained_liability, decision.danger_match_id, decision.danger_selection
        );
    }
}

pub async fn show_ledger() -> Result<()> {
    let orchestrator = build_orchestrator().await?;
    let exposures = orchestrator.get_all_exposures().await;

    if exposures.is_empty() {
        println!("📭 Ledger is empty.");
        return Ok(());
    }

    println!("📊 Current exposures:\n");
    for (match_id, pnl) in exposures {
        println!(
            "   • {} — home {:.0} | draw {:.0} | away {:.0} (worst case {:.0})",
            match_id,
            pnl.home,
            pnl.draw,
            pnl.away,
            pnl.worst_case()
        );
    }
    Ok(())
}

pub async fn show_order_book(limit: i64) -> Result<()> {
    let orchestrator = build_orchestrator().await?;
    let entries = orchestrator.get_order_book(limit).await?;

    if entries.is_empty() {
        println!("📭 No order book entries yet.");
        return Ok(());
    }

    println!("📒 Order book (most recent {}):\n", entries.len());
    for entry in entries {
        println!(
            "   {} {} | stake ¥{:.0} | {} | retained liability ¥{:.0} | hedge ¥{:.0}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.ticket_id,
            entry.stake,
            entry.action,
            entry.retained_liability,
            entry.hedge_stake
        );
    }
    Ok(())
}

pub async fn scan_arbitrage(capital: f64) -> Result<()> {
    let orchestrator = build_orchestrator().await?;
    let opportunities = orchestrator.scan_arbitrage(capital).await;

    if opportunities.is_empty() {
        println!("📭 No arbitrage opportunities found.");
        return Ok(());
    }

    println!("💰 Arbitrage opportunities (by margin):\n");
    for opp in opportunities {
        println!(
            "   {} — margin {:.2}% | {} @ {:.2} (¥{:.0}) vs {} @ {:.2} (¥{:.0})",
            opp.match_id,
            opp.margin * 100.0,
            opp.best_home_bookmaker,
            opp.best_home_odds,
            opp.stake_home,
            opp.best_away_bookmaker,
            opp.best_away_odds,
            opp.stake_away
        );
    }
    Ok(())
}

/// Writes the order book audit trail to a CSV file for operators — the
/// same export shape the teacher's own dataset-export endpoint uses.
pub async fn export_order_book(path: &str, limit: i64) -> Result<()> {
    let orchestrator = build_orchestrator().await?;
    orchestrator.export_order_book_csv(path, limit).await?;
    println!("📦 Exported order book to {}", path);
    Ok(())
}

pub async fn wipe() -> Result<()> {
    let orchestrator = build_orchestrator().await?;
    orchestrator.wipe().await?;
    println!("🧹 Ledger and order book wiped.");
    Ok(())
}
