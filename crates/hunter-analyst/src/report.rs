//! CSV export of a persona panel

use crate::error::Result;
use crate::verdict::Analysis;
use hunter_market::Ticker;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// One CSV line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    #[serde(rename = "Ticker")]
    pub ticker: String,
    #[serde(rename = "Persona")]
    pub persona: String,
    #[serde(rename = "Verdict")]
    pub verdict: String,
    #[serde(rename = "Score")]
    pub score: u8,
    #[serde(rename = "Thesis")]
    pub thesis: String,
    #[serde(rename = "Risk")]
    pub risk: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub ticker: String,
    pub rows: Vec<ReportRow>,
}

impl Report {
    pub fn from_analyses(ticker: &Ticker, analyses: &[Analysis]) -> Self {
        let rows = analyses
            .iter()
            .map(|analysis| ReportRow {
                ticker: ticker.to_string(),
                persona: analysis.persona.full_name().to_string(),
                verdict: analysis.verdict.to_string(),
                score: analysis.score,
                thesis: analysis.thesis.clone(),
                risk: analysis.risk.to_string(),
            })
            .collect();

        Self {
            ticker: ticker.to_string(),
            rows,
        }
    }

    /// Header line, then one record per analysis
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        if self.rows.is_empty() {
            csv.write_record(["Ticker", "Persona", "Verdict", "Score", "Thesis", "Risk"])?;
        }
        for row in &self.rows {
            csv.serialize(row)?;
        }
        csv.flush()?;
        Ok(())
    }

    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        Ok(buffer)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)?;
        self.write_csv(std::io::BufWriter::new(file))?;
        info!(symbol = %self.ticker, path = %path.display(), rows = self.rows.len(), "Report saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::Persona;
    use crate::verdict::{Risk, Verdict};

    fn analyses() -> Vec<Analysis> {
        vec![
            Analysis {
                persona: Persona::Cathie,
                verdict: Verdict::Buy,
                score: 88,
                thesis: "AI demand, \"exponential\" growth, long runway.".to_string(),
                risk: Risk::High,
                corrected: false,
            },
            Analysis::error(Persona::Warren, "Missing API key"),
        ]
    }

    #[test]
    fn test_csv_layout() {
        let ticker = Ticker::parse("nvda").unwrap();
        let report = Report::from_analyses(&ticker, &analyses());
        let text = String::from_utf8(report.to_csv_bytes().unwrap()).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0], "Ticker,Persona,Verdict,Score,Thesis,Risk");
        assert_eq!(
            lines[1],
            r#"NVDA,Cathie Wood,BUY,88,"AI demand, ""exponential"" growth, long runway.",HIGH"#
        );
        assert_eq!(lines[2], "NVDA,Warren Buffett,ERROR,0,Missing API key,HIGH");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_empty_report_has_header() {
        let report = Report::from_analyses(&Ticker::parse("AMD").unwrap(), &[]);
        let text = String::from_utf8(report.to_csv_bytes().unwrap()).unwrap();
        assert_eq!(text, "Ticker,Persona,Verdict,Score,Thesis,Risk\n");
    }

    #[test]
    fn test_save() {
        let path = std::env::temp_dir().join(format!("ai-hunter-report-{}.csv", uuid::Uuid::new_v4()));
        let report = Report::from_analyses(&Ticker::parse("MSFT").unwrap(), &analyses());

        report.save(&path).unwrap();
        let saved = std::fs::read(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(saved, report.to_csv_bytes().unwrap());
    }
}
