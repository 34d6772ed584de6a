//! Annual emission totals per source and pollutant.

use std::fmt;

/// Annual total of one pollutant from one source.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub source: String,
    pub pollutant: String,
    /// kTn (Gg) per year.
    pub total_ktn_year: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmissionReport {
    pub rows: Vec<ReportRow>,
}

impl EmissionReport {
    pub fn push(&mut self, source: &str, pollutant: &str, total_ktn_year: f64) {
        self.rows.push(ReportRow {
            source: source.to_string(),
            pollutant: pollutant.to_string(),
            total_ktn_year,
        });
    }

    pub fn extend(&mut self, other: EmissionReport) {
        self.rows.extend(other.rows);
    }

    /// Sum over every source reporting `pollutant`.
    pub fn total(&self, pollutant: &str) -> f64 {
        self.rows
            .iter()
            .filter(|r| r.pollutant == pollutant)
            .map(|r| r.total_ktn_year)
            .sum()
    }

    pub fn get(&self, source: &str, pollutant: &str) -> Option<f64> {
        self.rows
            .iter()
            .find(|r| r.source == source && r.pollutant == pollutant)
            .map(|r| r.total_ktn_year)
    }
}

impl fmt::Display for EmissionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .rows
            .iter()
            .map(|r| r.source.len())
            .max()
            .unwrap_or(0)
            .max("src".len());
        writeln!(f, "{:<width$}  {:<10}  {:>14}", "src", "pol", "total_emiss")?;
        for r in &self.rows {
            writeln!(
                f,
                "{:<width$}  {:<10}  {:>14.6}",
                r.source, r.pollutant, r.total_ktn_year
            )?;
        }
        Ok(())
    }
}
