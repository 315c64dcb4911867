use std::collections::HashMap;

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::error::EngineError;
use crate::models::{CustomerTicket, OrderBookEntry, PnLVector, RiskDecision, Selection};

/// Per-match net house position, held in memory and write-through durable
/// (§4.7). The invariant the rest of the engine leans on: memory always
/// equals the last row successfully persisted to `ledger_pnl`.
pub struct GlobalLedger {
    pool: SqlitePool,
    exposures: tokio::sync::Mutex<HashMap<String, PnLVector>>,
}

/// Pure projection: "if we accepted this ticket at this stake/liability on
/// `selection`, what would the resulting per-outcome PnL look like?" Never
/// touches the ledger — the risk engine calls this repeatedly while
/// exploring S2/S4 before anything is committed (§4.5, §4.7). For each
/// outcome `o`, `sim[o] -= liability` if `o == selection`, else
/// `sim[o] += stake`.
pub fn simulate_bet(
    current: &PnLVector,
    selection: Selection,
    stake: f64,
    liability: f64,
) -> PnLVector {
    let mut projected = *current;
    for s in [Selection::Home, Selection::Draw, Selection::Away] {
        let delta = if s == selection { -liability } else { stake };
        projected.set(s, projected.get(s) + delta);
    }
    projected
}

impl GlobalLedger {
    /// Loads the durable snapshot into memory. Call once at startup.
    pub async fn load(pool: SqlitePool) -> Result<Self, EngineError> {
        let rows = sqlx::query("SELECT match_id, home, draw, away FROM ledger_pnl")
            .fetch_all(&pool)
            .await?;

        let mut exposures = HashMap::new();
        for row in rows {
            let match_id: String = row.get("match_id");
            let vector = PnLVector {
                home: row.get("home"),
                draw: row.get("draw"),
                away: row.get("away"),
            };
            exposures.insert(match_id, vector);
        }

        Ok(Self {
            pool,
            exposures: tokio::sync::Mutex::new(exposures),
        })
    }

    pub async fn get_exposure(&self, match_id: &str) -> PnLVector {
        self.exposures
            .lock()
            .await
            .get(match_id)
            .copied()
            .unwrap_or_default()
    }

    pub async fn get_all_exposures(&self) -> HashMap<String, PnLVector> {
        self.exposures.lock().await.clone()
    }

    /// Commits a decision: applies its retained (B-book) stake to the
    /// in-memory ledger and persists both the updated `ledger_pnl` row and an
    /// `order_book` audit row in a single transaction. The whole operation
    /// holds the exposures mutex, so concurrent commits against the same or
    /// different matches serialize rather than race on a read-modify-write.
    pub async fn commit_bet(
        &self,
        ticket: &CustomerTicket,
        decision: &RiskDecision,
    ) -> Result<(), EngineError> {
        // §3 invariant 3: order-book rows exist only for non-REJECT
        // decisions. A REJECT never reaches the ledger at all — the
        // orchestrator shouldn't call this for one, but make it a true
        // no-op here too rather than relying solely on the caller.
        if !decision.action.is_accept() {
            return Ok(());
        }

        let danger_selection = decision
            .danger_selection
            .ok_or_else(|| EngineError::InvalidTicket("accept decision missing danger leg".into()))?;

        let mut exposures = self.exposures.lock().await;
        let current = exposures
            .get(&decision.danger_match_id)
            .copied()
            .unwrap_or_default();
        let projected = simulate_bet(
            &current,
            danger_selection,
            decision.retained_stake,
            decision.retained_liability,
        );

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO ledger_pnl (match_id, home, draw, away)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(match_id) DO UPDATE SET
                home = excluded.home,
                draw = excluded.draw,
                away = excluded.away",
        )
        .bind(&decision.danger_match_id)
        .bind(projected.home)
        .bind(projected.draw)
        .bind(projected.away)
        .execute(&mut *tx)
        .await?;

        insert_order_book_row(&mut tx, ticket, decision).await?;
        tx.commit().await?;

        exposures.insert(decision.danger_match_id.clone(), projected);
        Ok(())
    }

    pub async fn get_order_book(&self, limit: i64) -> Result<Vec<OrderBookEntry>, EngineError> {
        let rows = sqlx::query_as::<_, OrderBookEntry>(
            "SELECT ticket_id, ticket_type, stake, action, retained_liability, hedge_stake,
                    danger_match_id, danger_selection, timestamp
             FROM order_book ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Writes the most recent `limit` order-book rows to a CSV file at
    /// `path`, for operators pulling an audit trail out of the shadow book.
    /// Mirrors the teacher's own `csv::Writer::from_path` export path rather
    /// than a streaming/async writer — this is an occasional operator
    /// action, not a hot path.
    pub async fn export_order_book_csv(&self, path: &str, limit: i64) -> Result<(), EngineError> {
        let entries = self.get_order_book(limit).await?;

        let mut writer = csv::Writer::from_path(path)
            .map_err(|e| EngineError::Export(e.to_string()))?;
        writer
            .write_record([
                "ticket_id",
                "ticket_type",
                "stake",
                "action",
                "retained_liability",
                "hedge_stake",
                "danger_match_id",
                "danger_selection",
                "timestamp",
            ])
            .map_err(|e| EngineError::Export(e.to_string()))?;

        for entry in &entries {
            writer
                .write_record([
                    entry.ticket_id.as_str(),
                    entry.ticket_type.as_str(),
                    &entry.stake.to_string(),
                    entry.action.as_str(),
                    &entry.retained_liability.to_string(),
                    &entry.hedge_stake.to_string(),
                    entry.danger_match_id.as_str(),
                    entry.danger_selection.as_deref().unwrap_or(""),
                    &entry.timestamp.to_rfc3339(),
                ])
                .map_err(|e| EngineError::Export(e.to_string()))?;
        }
        writer.flush().map_err(|e| EngineError::Export(e.to_string()))?;
        Ok(())
    }

    /// Wipes both the in-memory ledger and the durable tables (§6 operator
    /// surface). Intended for demo/reset use, never called from the risk
    /// path.
    pub async fn wipe(&self) -> Result<(), EngineError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM ledger_pnl").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM order_book").execute(&mut *tx).await?;
        tx.commit().await?;

        self.exposures.lock().await.clear();
        Ok(())
    }
}

async fn insert_order_book_row(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    ticket: &CustomerTicket,
    decision: &RiskDecision,
) -> Result<(), sqlx::Error> {
    let ticket_type = match ticket.ticket_type {
        crate::models::TicketType::Single => "single",
        crate::models::TicketType::Parlay2 => "parlay2",
    };
    let danger_selection = decision.danger_selection.map(|s| s.as_str().to_string());

    sqlx::query(
        "INSERT INTO order_book
            (ticket_id, ticket_type, stake, action, retained_liability, hedge_stake,
             danger_match_id, danger_selection, timestamp)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&ticket.ticket_id)
    .bind(ticket_type)
    .bind(ticket.stake)
    .bind(decision.action.as_str())
    .bind(decision.retained_liability)
    .bind(decision.hedge_stake)
    .bind(&decision.danger_match_id)
    .bind(danger_selection)
    .bind(Utc::now())
    .execute(tx)
    .await?;
    Ok(())
}
