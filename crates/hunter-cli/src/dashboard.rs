//! Terminal rendering of snapshots, verdicts and the market banner

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use hunter_analyst::{Analysis, Verdict};
use hunter_market::{Facet, MarketOverview, StockSnapshot};
use std::fmt::Write as _;

const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const SPARK_WIDTH: usize = 60;
const SCORE_BAR_WIDTH: usize = 20;
const CARD_TABLE_WIDTH: u16 = 120;

fn table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Green, yellow or red by score band
fn band_color(score: u8) -> Color {
    match Verdict::for_score(score) {
        Verdict::Buy => Color::Green,
        Verdict::Hold => Color::Yellow,
        Verdict::Sell | Verdict::Error => Color::Red,
    }
}

fn billions_or_na(value: f64) -> String {
    if value == 0.0 {
        "N/A".to_string()
    } else {
        format!("${:.1}B", value / 1e9)
    }
}

/// Closes as a unicode sparkline, downsampled to at most `width` cells
pub fn sparkline(closes: &[f64], width: usize) -> String {
    if closes.is_empty() || width == 0 {
        return String::new();
    }

    let sampled: Vec<f64> = if closes.len() <= width {
        closes.to_vec()
    } else if width == 1 {
        vec![closes[closes.len() - 1]]
    } else {
        (0..width)
            .map(|i| closes[i * (closes.len() - 1) / (width - 1)])
            .collect()
    };

    let min = sampled.iter().copied().fold(f64::INFINITY, f64::min);
    let max = sampled.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    let top = (SPARK_LEVELS.len() - 1) as f64;

    sampled
        .iter()
        .map(|close| {
            if span <= f64::EPSILON {
                SPARK_LEVELS[SPARK_LEVELS.len() / 2 - 1]
            } else {
                SPARK_LEVELS[(((close - min) / span) * top).round() as usize]
            }
        })
        .collect()
}

/// Filled/empty bar proportional to a 0-100 score
pub fn score_bar(score: u8) -> String {
    let filled = (usize::from(score.min(100)) * SCORE_BAR_WIDTH + 50) / 100;
    format!("{}{}", "█".repeat(filled), "░".repeat(SCORE_BAR_WIDTH - filled))
}

/// Header, warnings, metric table, price chart and data sources
pub fn render_snapshot(snapshot: &StockSnapshot) -> String {
    let mut out = String::new();
    let change = snapshot
        .quote
        .change_pct()
        .map(|pct| format!("  ({pct:+.2}% today)"))
        .unwrap_or_default();
    let _ = writeln!(out, "📈 {} - ${:.2}{change}", snapshot.ticker, snapshot.price());

    if snapshot.is_mock() {
        let _ = writeln!(
            out,
            "⚠️  SYNTHETIC DATA: every live source failed, figures below are placeholders."
        );
    }
    if !snapshot.has_history {
        let _ = writeln!(
            out,
            "⚠️  Price history blocked: analysis based on the current price only."
        );
    }

    let mut metrics = table();
    metrics.set_header(vec![
        "Trend 6M",
        "Market Cap",
        "P/E Ratio",
        "Debt",
        "Free Cash Flow",
    ]);
    let trend_color = if snapshot.trend_6m >= 0.0 {
        Color::Green
    } else {
        Color::Red
    };
    let pe = snapshot.trailing_pe();
    metrics.add_row(vec![
        Cell::new(format!("{:.1}%", snapshot.trend_6m)).fg(trend_color),
        Cell::new(format!("${:.1}B", snapshot.market_cap() / 1e9)),
        Cell::new(if pe == 0.0 {
            "N/A".to_string()
        } else {
            format!("{pe:.1}")
        }),
        Cell::new(billions_or_na(snapshot.total_debt())),
        Cell::new(billions_or_na(snapshot.free_cashflow())),
    ]);
    let _ = writeln!(out, "{metrics}");

    if snapshot.has_history {
        let history = &snapshot.history;
        let _ = writeln!(out, "{}", sparkline(&history.closes(), SPARK_WIDTH));
        if let (Some(low), Some(high)) = (history.min_close(), history.max_close()) {
            let _ = writeln!(
                out,
                "low ${low:.2}  high ${high:.2}  ({} sessions)",
                history.len()
            );
        }
    }

    let _ = writeln!(out, "{}", render_provenance(snapshot));
    out
}

/// Which source produced each facet, and how many attempts failed
pub fn render_provenance(snapshot: &StockSnapshot) -> String {
    let provenance = &snapshot.provenance;
    let name = |kind: Option<hunter_market::SourceKind>| {
        kind.map_or_else(|| "none".to_string(), |k| k.to_string())
    };
    let fundamentals = if provenance.fundamentals.is_empty() {
        "none".to_string()
    } else {
        provenance
            .fundamentals
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" + ")
    };

    let mut line = format!(
        "Sources: quote {} | history {} | fundamentals {}",
        name(provenance.quote),
        name(provenance.history),
        fundamentals
    );

    let failed: usize = [Facet::Quote, Facet::History, Facet::Fundamentals]
        .into_iter()
        .map(|facet| provenance.failures(facet).count())
        .sum();
    if failed > 0 {
        let _ = write!(line, " ({failed} failed attempts)");
    }
    line
}

/// One card per persona: verdict, score bar, thesis and risk
pub fn render_analyses(analyses: &[Analysis]) -> String {
    if analyses.is_empty() {
        return String::new();
    }

    let mut cards = table();
    cards.set_width(CARD_TABLE_WIDTH);
    cards.set_header(
        analyses
            .iter()
            .map(|a| Cell::new(format!("💼 {}", a.persona)).add_attribute(Attribute::Bold)),
    );

    cards.add_row(analyses.iter().map(|a| {
        Cell::new(format!("{} {} ({}/100)", a.verdict.icon(), a.verdict, a.score))
            .fg(band_color(a.score))
            .add_attribute(Attribute::Bold)
    }));
    cards.add_row(
        analyses
            .iter()
            .map(|a| Cell::new(score_bar(a.score)).fg(band_color(a.score))),
    );
    cards.add_row(analyses.iter().map(|a| Cell::new(&a.thesis)));
    cards.add_row(analyses.iter().map(|a| {
        let note = if a.corrected { " (verdict aligned to score)" } else { "" };
        Cell::new(format!("Risk: {}{note}", a.risk)).set_alignment(CellAlignment::Left)
    }));

    format!("🤖 AI ANALYSIS\n{cards}")
}

/// Index, crypto and rates banner
pub fn render_overview(overview: &MarketOverview) -> String {
    let mut banner = table();
    banner.set_header(overview.items.iter().map(|item| item.label.clone()));
    banner.add_row(overview.items.iter().map(|item| match item.price() {
        Some(price) => {
            let change = item.change_pct();
            let text = match change {
                Some(pct) => format!("{price:.2} ({pct:+.2}%)"),
                None => format!("{price:.2}"),
            };
            let color = match change {
                Some(pct) if pct < 0.0 => Color::Red,
                Some(_) => Color::Green,
                None => Color::Reset,
            };
            Cell::new(text).fg(color)
        }
        None => Cell::new("n/a").fg(Color::DarkGrey),
    }));
    banner.to_string()
}

/// Error box for a symbol no source could price
pub fn render_not_found(ticker: &str, reason: &str) -> String {
    let mut error = table();
    error.add_row(vec![
        Cell::new(format!("❌ Ticker {ticker} not found (or blocked)"))
            .fg(Color::Red)
            .add_attribute(Attribute::Bold),
    ]);
    error.add_row(vec![Cell::new(reason)]);
    error.to_string()
}
