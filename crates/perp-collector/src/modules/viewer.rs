//! 최근 행 터미널 표 출력.

use std::fmt::Write;

use perp_core::MetricRow;

const HEADERS: [&str; 6] = ["Timestamp", "Exchange", "Symbol", "Price", "FR", "OI"];
const WIDTHS: [usize; 6] = [24, 12, 10, 14, 12, 16];

/// 최근 행을 고정폭 표로 렌더링. 값이 없으면 `N/A`.
pub fn render_table(rows: &[MetricRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "--- Last {} DB Rows ---", rows.len());
    push_line(&mut out, HEADERS.map(str::to_string));
    let rule = WIDTHS.map(|w| "-".repeat(w));
    push_line(&mut out, rule);

    for row in rows {
        let ts = row
            .datetime()
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
            .unwrap_or_else(|| "N/A".to_string());
        push_line(
            &mut out,
            [
                ts,
                row.exchange.clone(),
                row.symbol.clone(),
                fmt_opt(row.close, |v| format!("{:.6}", v)),
                fmt_opt(row.funding_rate, |v| format!("{:.6e}", v)),
                fmt_opt(row.open_interest, |v| format!("{:.2}", v)),
            ],
        );
    }
    out
}

fn fmt_opt(value: Option<f64>, f: impl Fn(f64) -> String) -> String {
    value.map(f).unwrap_or_else(|| "N/A".to_string())
}

fn push_line(out: &mut String, cells: [String; 6]) {
    let line: Vec<String> = cells
        .iter()
        .zip(WIDTHS)
        .map(|(cell, width)| format!("{:<width$}", cell, width = width))
        .collect();
    let _ = writeln!(out, "{}", line.join(" ").trim_end());
}

#[cfg(test)]
mod tests {
    use super::*;
    use perp_core::Candle;

    #[test]
    fn test_render_table() {
        let rows = vec![
            MetricRow::from_candle("binance", "BTC", &Candle::new(1_700_000_040_000, 1.0, 2.0, 0.5, 37005.25, 3.0))
                .with_derivatives(Some(0.0001), Some(12345.0)),
            MetricRow::snapshot("okx", "BTC", 1_700_000_040_000, None, None),
        ];

        let table = render_table(&rows);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines[0], "--- Last 2 DB Rows ---");
        assert!(lines[1].starts_with("Timestamp"));
        assert!(lines[3].starts_with("2023-11-14T22:14:00.000Z"));
        assert!(lines[3].contains("37005.250000"));
        assert!(lines[3].contains("12345.00"));
        assert!(lines[4].contains("N/A"));
    }
}
