use serde::Serialize;
use sqlx::SqlitePool;

use crate::id::new_uuid_v7;
use crate::model::{ConsumptionEntry, ITEMS_NOT_FOUND, VALIDATION_QUANTITY_NEGATIVE};
use crate::time::{now_ms, MS_PER_DAY};
use crate::{AppError, AppResult};

/// Days of supply a reorder point should cover.
const REORDER_WINDOW_DAYS: f64 = 7.0;

#[derive(Debug, Clone, Serialize)]
pub struct ConsumptionForecast {
    pub history: Vec<ConsumptionEntry>,
    /// Current quantity plus everything ever consumed.
    pub initial_quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reorder_point: Option<i64>,
}

/// Apply one consumption event: clamp the quantity at zero, then append the
/// audit entry. The two writes are deliberately separate statements; if the
/// history insert fails after the quantity update, the quantity is still
/// correct and the gap is recoverable, so the error carries what was applied.
pub async fn record_consumption(
    pool: &SqlitePool,
    household_id: &str,
    item_id: &str,
    consumed: i64,
) -> AppResult<i64> {
    if consumed < 0 {
        return Err(AppError::new(
            VALIDATION_QUANTITY_NEGATIVE,
            "Consumed quantity cannot be negative.",
        )
        .with_context("consumed", consumed.to_string()));
    }

    let current: Option<i64> =
        sqlx::query_scalar("SELECT quantity FROM items WHERE id = ? AND household_id = ?")
            .bind(item_id)
            .bind(household_id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::from)?;
    let current = current.ok_or_else(|| {
        AppError::new(ITEMS_NOT_FOUND, "Item not found.")
            .with_context("item_id", item_id.to_string())
    })?;

    let new_quantity = (current - consumed).max(0);
    let now = now_ms();

    sqlx::query("UPDATE items SET quantity = ?, updated_at = ? WHERE id = ? AND household_id = ?")
        .bind(new_quantity)
        .bind(now)
        .bind(item_id)
        .bind(household_id)
        .execute(pool)
        .await
        .map_err(AppError::from)?;

    let history = sqlx::query(
        "INSERT INTO consumption_entries (id, item_id, quantity_remaining, consumed, recorded_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(new_uuid_v7())
    .bind(item_id)
    .bind(new_quantity)
    .bind(consumed)
    .bind(now)
    .execute(pool)
    .await;

    if let Err(err) = history {
        return Err(AppError::from(err)
            .with_context("operation", "consumption_history_append")
            .with_context("item_id", item_id.to_string())
            .with_context("applied_quantity", new_quantity.to_string()));
    }

    Ok(new_quantity)
}

/// Derive rate and reorder point from an ordered event history. Fewer than
/// two entries, or a zero-length span, yields no rate; the division is
/// guarded so a same-millisecond history can never produce infinity.
pub fn forecast_from(history: Vec<ConsumptionEntry>, current_quantity: i64) -> ConsumptionForecast {
    let total_consumed: i64 = history.iter().map(|e| e.consumed).sum();
    let initial_quantity = current_quantity + total_consumed;

    let (daily_rate, reorder_point) = match (history.first(), history.last()) {
        (Some(first), Some(last)) if history.len() >= 2 => {
            let days_elapsed = (last.recorded_at - first.recorded_at) as f64 / MS_PER_DAY as f64;
            if days_elapsed > 0.0 {
                let rate = total_consumed as f64 / days_elapsed;
                (Some(rate), Some((rate * REORDER_WINDOW_DAYS).ceil() as i64))
            } else {
                (None, None)
            }
        }
        _ => (None, None),
    };

    ConsumptionForecast {
        history,
        initial_quantity,
        daily_rate,
        reorder_point,
    }
}

/// Load an item's full history and forecast its stock-out.
pub async fn forecast(
    pool: &SqlitePool,
    household_id: &str,
    item_id: &str,
) -> AppResult<ConsumptionForecast> {
    let current: Option<i64> =
        sqlx::query_scalar("SELECT quantity FROM items WHERE id = ? AND household_id = ?")
            .bind(item_id)
            .bind(household_id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::from)?;
    let current = current.ok_or_else(|| {
        AppError::new(ITEMS_NOT_FOUND, "Item not found.")
            .with_context("item_id", item_id.to_string())
    })?;

    let history = sqlx::query_as::<_, ConsumptionEntry>(
        "SELECT id, item_id, quantity_remaining, consumed, recorded_at \
         FROM consumption_entries WHERE item_id = ? ORDER BY recorded_at, id",
    )
    .bind(item_id)
    .fetch_all(pool)
    .await
    .map_err(AppError::from)?;

    Ok(forecast_from(history, current))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(remaining: i64, consumed: i64, recorded_at: i64) -> ConsumptionEntry {
        ConsumptionEntry {
            id: new_uuid_v7(),
            item_id: "item".into(),
            quantity_remaining: remaining,
            consumed,
            recorded_at,
        }
    }

    #[test]
    fn weekly_reorder_point_from_five_day_history() {
        // 15 on hand initially; 2 consumed at day 0, 3 at day 5.
        let history = vec![entry(13, 2, 0), entry(10, 3, 5 * MS_PER_DAY)];
        let fc = forecast_from(history, 10);

        assert_eq!(fc.initial_quantity, 15);
        assert_eq!(fc.daily_rate, Some(1.0));
        assert_eq!(fc.reorder_point, Some(7));
    }

    #[test]
    fn fewer_than_two_entries_gives_no_rate() {
        let fc = forecast_from(vec![entry(9, 1, 0)], 9);
        assert_eq!(fc.initial_quantity, 10);
        assert_eq!(fc.daily_rate, None);
        assert_eq!(fc.reorder_point, None);
    }

    #[test]
    fn same_timestamp_history_gives_no_rate() {
        let fc = forecast_from(vec![entry(8, 2, 1_000), entry(5, 3, 1_000)], 5);
        assert_eq!(fc.initial_quantity, 10);
        assert_eq!(fc.daily_rate, None);
        assert_eq!(fc.reorder_point, None);
    }

    #[test]
    fn fractional_rates_round_the_reorder_point_up() {
        // 3 consumed over 2 days: 1.5/day, a week is 10.5, reorder at 11.
        let fc = forecast_from(vec![entry(7, 1, 0), entry(5, 2, 2 * MS_PER_DAY)], 5);
        assert_eq!(fc.daily_rate, Some(1.5));
        assert_eq!(fc.reorder_point, Some(11));
    }
}
