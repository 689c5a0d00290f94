//! Sales leaderboard aggregation.

use chrono::{Datelike, Months, NaiveDate};
use std::collections::HashMap;

use crate::api::models::sales::LeaderboardEntry;
use crate::db::models::sales_metrics::LeaderboardRow;

/// Number of entries shown on the leaderboard.
pub const LEADERBOARD_SIZE: usize = 10;

/// Months of history the leaderboard covers.
pub const WINDOW_MONTHS: u32 = 3;

/// Earliest `metric_month` included in the leaderboard for a given day.
pub fn window_start(today: NaiveDate) -> NaiveDate {
    today.checked_sub_months(Months::new(WINDOW_MONTHS)).unwrap_or(NaiveDate::MIN)
}

/// First day of the month containing `day`, the key metrics are stored under.
pub fn month_start(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}

/// Sum every counter per user, rank by total sales and keep the top entries.
///
/// Ties on total sales are broken by name so the ordering is deterministic.
pub fn aggregate(rows: Vec<LeaderboardRow>) -> Vec<LeaderboardEntry> {
    let mut by_user: HashMap<_, LeaderboardEntry> = HashMap::new();

    for row in rows {
        let entry = by_user.entry(row.user_id).or_insert_with(|| LeaderboardEntry {
            user_id: row.user_id,
            name: format!(
                "{} {}",
                row.first_name.as_deref().unwrap_or(""),
                row.last_name.as_deref().unwrap_or("")
            ),
            total_sales: 0,
            rn_auto: 0,
            fire: 0,
            life: 0,
            health: 0,
            life_premium: 0,
            health_premium: 0,
        });

        entry.total_sales = entry.total_sales.saturating_add(row.total_sales);
        entry.rn_auto = entry.rn_auto.saturating_add(row.rn_auto);
        entry.fire = entry.fire.saturating_add(row.fire);
        entry.life = entry.life.saturating_add(row.life);
        entry.health = entry.health.saturating_add(row.health);
        entry.life_premium = entry.life_premium.saturating_add(row.life_premium);
        entry.health_premium = entry.health_premium.saturating_add(row.health_premium);
    }

    let mut entries: Vec<LeaderboardEntry> = by_user.into_values().collect();
    entries.sort_by(|a, b| b.total_sales.cmp(&a.total_sales).then_with(|| a.name.cmp(&b.name)));
    entries.truncate(LEADERBOARD_SIZE);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_month_start() {
        let day = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(month_start(day), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }

    fn row(user_id: Uuid, first: &str, rn_auto: i64, life: i64) -> LeaderboardRow {
        LeaderboardRow {
            user_id,
            first_name: Some(first.to_string()),
            last_name: None,
            rn_auto,
            fire: 0,
            life,
            health: 0,
            life_premium: 100,
            health_premium: 0,
            total_sales: rn_auto + life,
        }
    }

    #[test]
    fn test_aggregates_per_user() {
        let ada = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let entries = aggregate(vec![row(ada, "Ada", 2, 1), row(bob, "Bob", 5, 0), row(ada, "Ada", 3, 3)]);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].user_id, ada);
        assert_eq!(entries[0].total_sales, 9);
        assert_eq!(entries[0].rn_auto, 5);
        assert_eq!(entries[0].life_premium, 200);
        assert_eq!(entries[0].name, "Ada ");
        assert_eq!(entries[1].total_sales, 5);
    }

    #[test]
    fn test_keeps_top_ten_with_name_tiebreak() {
        let rows: Vec<_> = (0..15).map(|i| row(Uuid::new_v4(), &format!("User{i:02}"), i, 0)).collect();
        let mut tied = rows.clone();
        tied.push(row(Uuid::new_v4(), "Aaron", 14, 0));

        let entries = aggregate(tied);
        assert_eq!(entries.len(), LEADERBOARD_SIZE);
        assert_eq!(entries[0].name, "Aaron ");
        assert_eq!(entries[1].name, "User14 ");
        assert_eq!(entries.last().unwrap().total_sales, 6);
    }

    #[test]
    fn test_sums_saturate_instead_of_overflowing() {
        let ada = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let big = 3 * (i64::MAX / 4);
        let entries = aggregate(vec![row(ada, "Ada", big, 0), row(ada, "Ada", big, 0), row(bob, "Bob", 7, 0)]);

        assert_eq!(entries[0].user_id, ada);
        assert_eq!(entries[0].total_sales, i64::MAX);
        assert_eq!(entries[0].rn_auto, i64::MAX);
        assert_eq!(entries[1].total_sales, 7);
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate(Vec::new()).is_empty());
    }

    #[test]
    fn test_window_start() {
        let today = NaiveDate::from_ymd_opt(2025, 5, 31).unwrap();
        assert_eq!(window_start(today), NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
    }
}
