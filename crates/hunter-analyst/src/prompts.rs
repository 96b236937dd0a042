//! Prompt templates, rendered with MiniJinja

use crate::error::Result;
use crate::persona::Persona;
use crate::verdict::Verdict;
use hunter_market::StockSnapshot;
use minijinja::{Environment, context};
use serde::Serialize;

const ANALYSIS_SYSTEM: &str = "\
You are {{ name }}, {{ style }}.
Judge the stock strictly through your own investing lens.

MANDATORY COHERENCE RULE:
- Score 0 to {{ sell_max }} -> verdict MUST be \"SELL\".
- Score {{ sell_max + 1 }} to {{ hold_max }} -> verdict MUST be \"HOLD\".
- Score {{ hold_max + 1 }} to 100 -> verdict MUST be \"BUY\".
Never answer \"SELL\" with a score of 60. Be logical.

Answer in JSON only, as a single object:
{\"verdict\": \"BUY|HOLD|SELL\", \"score\": <integer 0-100>, \"thesis\": \"<one sentence>\", \"risk\": \"LOW|MEDIUM|HIGH\"}";

const ANALYSIS_USER: &str = "\
ANALYSIS: {{ ticker }}
{%- if partial %} (partial data: price history unavailable){% endif %}
{%- if synthetic %} (SYNTHETIC data: live sources unavailable, figures are placeholders){% endif %}
Price: ${{ price }}
Trend 6M: {{ trend_6m }}%
P/E: {{ pe }}
Debt: {{ debt }}
Free cash flow: {{ free_cashflow }}
Revenue growth: {{ revenue_growth }}
Beta: {{ beta }}";

const CHAT_SYSTEM: &str = "\
You are a financial analyst assistant answering follow-up questions about {{ ticker }}.
Base every answer on the context below and say so when it does not cover the question.
Keep answers short and concrete.

{{ context }}";

/// Snapshot figures formatted for the prompt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptFacts {
    pub ticker: String,
    pub partial: bool,
    pub synthetic: bool,
    pub price: String,
    pub trend_6m: String,
    pub pe: String,
    pub debt: String,
    pub free_cashflow: String,
    pub revenue_growth: String,
    pub beta: String,
}

/// Dollar amount in billions
fn billions(value: f64) -> String {
    format!("${:.2}B", value / 1e9)
}

impl PromptFacts {
    pub fn from_snapshot(snapshot: &StockSnapshot) -> Self {
        let pe = snapshot.trailing_pe();
        let growth = snapshot.revenue_growth();

        Self {
            ticker: snapshot.ticker.to_string(),
            partial: !snapshot.has_history,
            synthetic: snapshot.is_mock(),
            price: format!("{:.2}", snapshot.price()),
            trend_6m: format!("{:.2}", snapshot.trend_6m),
            pe: if pe == 0.0 { "N/A".to_string() } else { format!("{pe:.2}") },
            debt: billions(snapshot.total_debt()),
            free_cashflow: billions(snapshot.free_cashflow()),
            // Zero growth means "not reported" for every source we read
            revenue_growth: if growth == 0.0 {
                "N/A".to_string()
            } else {
                format!("{:.1}%", growth * 100.0)
            },
            beta: format!("{:.2}", snapshot.beta()),
        }
    }
}

/// Compiled prompt templates
#[derive(Debug)]
pub struct Prompts {
    env: Environment<'static>,
}

impl Prompts {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("analysis_system", ANALYSIS_SYSTEM)?;
        env.add_template("analysis_user", ANALYSIS_USER)?;
        env.add_template("chat_system", CHAT_SYSTEM)?;
        Ok(Self { env })
    }

    /// Persona identity, coherence matrix and JSON contract
    pub fn system(&self, persona: Persona) -> Result<String> {
        let rendered = self.env.get_template("analysis_system")?.render(context! {
            name => persona.full_name(),
            style => persona.style(),
            sell_max => Verdict::SELL_MAX,
            hold_max => Verdict::HOLD_MAX,
        })?;
        Ok(rendered)
    }

    pub fn user(&self, snapshot: &StockSnapshot) -> Result<String> {
        let facts = PromptFacts::from_snapshot(snapshot);
        let rendered = self.env.get_template("analysis_user")?.render(&facts)?;
        Ok(rendered)
    }

    pub fn chat_system(&self, ticker: &str, context: &str) -> Result<String> {
        let rendered = self.env.get_template("chat_system")?.render(context! {
            ticker => ticker,
            context => context,
        })?;
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hunter_market::{Fundamentals, PriceHistory, PricePoint, Provenance, Quote, SourceKind, Ticker};

    fn snapshot(with_history: bool, source: SourceKind) -> StockSnapshot {
        let history = with_history.then(|| {
            let now = chrono::Utc::now();
            PriceHistory::new(vec![
                PricePoint {
                    timestamp: now - chrono::Duration::days(180),
                    close: 100.0,
                },
                PricePoint {
                    timestamp: now,
                    close: 150.0,
                },
            ])
        });
        let fundamentals = Fundamentals {
            trailing_pe: Some(31.456),
            total_debt: Some(12.5e9),
            free_cashflow: Some(3.25e9),
            revenue_growth: Some(0.123),
            ..Default::default()
        };
        let provenance = Provenance {
            quote: Some(source),
            ..Default::default()
        };
        StockSnapshot::assemble(
            Ticker::parse("NVDA").unwrap(),
            Quote::new(181.5),
            history,
            fundamentals,
            provenance,
        )
    }

    #[test]
    fn test_facts_formatting() {
        let facts = PromptFacts::from_snapshot(&snapshot(true, SourceKind::YahooApi));
        assert_eq!(facts.price, "181.50");
        assert_eq!(facts.trend_6m, "50.00");
        assert_eq!(facts.pe, "31.46");
        assert_eq!(facts.debt, "$12.50B");
        assert_eq!(facts.free_cashflow, "$3.25B");
        assert_eq!(facts.revenue_growth, "12.3%");
        assert_eq!(facts.beta, "1.00");
        assert!(!facts.partial);
        assert!(!facts.synthetic);
    }

    #[test]
    fn test_user_prompt() {
        let prompts = Prompts::new().unwrap();
        let text = prompts.user(&snapshot(true, SourceKind::YahooApi)).unwrap();

        assert!(text.starts_with("ANALYSIS: NVDA\nPrice: $181.50"));
        assert!(text.contains("Trend 6M: 50.00%"));
        assert!(text.contains("Revenue growth: 12.3%"));
        assert!(!text.contains("partial"));
    }

    #[test]
    fn test_user_prompt_warnings() {
        let prompts = Prompts::new().unwrap();
        let text = prompts.user(&snapshot(false, SourceKind::Mock)).unwrap();

        assert!(text.contains("partial data"));
        assert!(text.contains("SYNTHETIC data"));
        assert!(text.contains("Trend 6M: 0.00%"));
    }

    #[test]
    fn test_missing_revenue_growth_is_na() {
        let prompts = Prompts::new().unwrap();
        for revenue_growth in [None, Some(0.0)] {
            let snapshot = StockSnapshot::assemble(
                Ticker::parse("TSLA").unwrap(),
                Quote::new(250.0),
                None,
                Fundamentals {
                    revenue_growth,
                    ..Default::default()
                },
                Provenance::default(),
            );

            let facts = PromptFacts::from_snapshot(&snapshot);
            assert_eq!(facts.revenue_growth, "N/A", "{revenue_growth:?}");
            assert_eq!(facts.pe, "N/A");

            let text = prompts.user(&snapshot).unwrap();
            assert!(text.contains("Revenue growth: N/A"));
        }
    }

    #[test]
    fn test_negative_revenue_growth() {
        let mut snapshot = snapshot(true, SourceKind::YahooApi);
        snapshot.fundamentals.revenue_growth = Some(-0.042);
        assert_eq!(PromptFacts::from_snapshot(&snapshot).revenue_growth, "-4.2%");
    }

    #[test]
    fn test_system_prompt_matrix() {
        let prompts = Prompts::new().unwrap();
        let text = prompts.system(Persona::Warren).unwrap();

        assert!(text.starts_with("You are Warren Buffett"));
        assert!(text.contains("Score 0 to 45 -> verdict MUST be \"SELL\""));
        assert!(text.contains("Score 46 to 65"));
        assert!(text.contains("Score 66 to 100"));
        assert!(text.contains("\"score\""));
    }

    #[test]
    fn test_chat_system_embeds_context() {
        let prompts = Prompts::new().unwrap();
        let text = prompts.chat_system("NVDA", "Warren: BUY (80/100)").unwrap();
        assert!(text.contains("about NVDA"));
        assert!(text.ends_with("Warren: BUY (80/100)"));
    }
}
