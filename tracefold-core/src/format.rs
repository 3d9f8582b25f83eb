//! Formatting helpers for terminal output.

use crate::types::{Aggregate, HOURS_PER_DAY};
use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Heat levels from empty to busiest
const HEAT_GLYPHS: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Format a timestamp relative to `now` (e.g., "2m ago").
pub fn format_relative_time(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(ts);

    if duration.num_seconds() < 0 {
        "just now".to_string()
    } else if duration.num_seconds() < 60 {
        format!("{}s ago", duration.num_seconds())
    } else if duration.num_minutes() < 60 {
        format!("{}m ago", duration.num_minutes())
    } else if duration.num_hours() < 24 {
        format!("{}h ago", duration.num_hours())
    } else if duration.num_days() < 7 {
        format!("{}d ago", duration.num_days())
    } else {
        ts.format("%b %d").to_string()
    }
}

/// Glyph for a cell holding `count` events when the busiest cell holds `max`.
pub fn heat_glyph(count: u32, max: u32) -> char {
    if count == 0 || max == 0 {
        return HEAT_GLYPHS[0];
    }
    let levels = HEAT_GLYPHS.len() - 1;
    // 1..=levels, so a single event is never drawn as empty
    let level = ((count as u64 * levels as u64).div_ceil(max as u64)) as usize;
    HEAT_GLYPHS[level.clamp(1, levels)]
}

/// Render the matrix as text, oldest day first, one row per day.
pub fn render_heatmap(aggregate: &Aggregate, today: NaiveDate) -> String {
    let max = aggregate
        .matrix
        .iter()
        .flat_map(|row| row.iter().copied())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    out.push_str("           ");
    for hour in (0..HOURS_PER_DAY).step_by(6) {
        out.push_str(&format!("{:<6}", hour));
    }
    out.push('\n');

    for (delta, row) in aggregate.matrix.iter().enumerate().rev() {
        let date = today - Duration::days(delta as i64);
        let cells: String = row.iter().map(|&c| heat_glyph(c, max)).collect();
        let total: u32 = row.iter().sum();
        out.push_str(&format!("{} |{}| {}\n", date.format("%Y-%m-%d"), cells, total));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_relative_time() {
        let now = Utc.with_ymd_and_hms(2023, 10, 10, 12, 0, 0).unwrap();
        assert_eq!(format_relative_time(now + Duration::seconds(5), now), "just now");
        assert_eq!(format_relative_time(now - Duration::seconds(30), now), "30s ago");
        assert_eq!(format_relative_time(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(format_relative_time(now - Duration::hours(3), now), "3h ago");
        assert_eq!(format_relative_time(now - Duration::days(2), now), "2d ago");
        assert_eq!(format_relative_time(now - Duration::days(30), now), "Sep 10");
    }

    #[test]
    fn test_heat_glyph_scale() {
        assert_eq!(heat_glyph(0, 10), ' ');
        assert_eq!(heat_glyph(1, 1000), '.');
        assert_eq!(heat_glyph(10, 10), '@');
        assert_eq!(heat_glyph(3, 0), ' ');
    }

    #[test]
    fn test_render_heatmap_rows() {
        let mut matrix = vec![[0u32; HOURS_PER_DAY]; 3];
        matrix[0][9] = 4;
        matrix[2][23] = 1;
        let aggregate = Aggregate {
            matrix,
            events: Vec::new(),
            actors: Vec::new(),
        };
        let today = NaiveDate::from_ymd_opt(2023, 10, 10).unwrap();

        let text = render_heatmap(&aggregate, today);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("2023-10-08 |"));
        assert!(lines[1].ends_with("| 1"));
        assert!(lines[3].starts_with("2023-10-10 |"));
        assert_eq!(lines[3].chars().nth(12 + 9), Some('@'));
    }
}
