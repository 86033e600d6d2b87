// =============================================================================
// Signal Journal — JSON snapshots of every cycle
// =============================================================================
//
// Each cycle is written twice into the journal directory:
//   latest.json                           — always the most recent cycle
//   signals_<YYYYmmdd_HHMMSS>_<cycle>.json — permanent, one per cycle
//
// Both writes go through a tmp file + rename so a reader never sees a
// half-written document.
// =============================================================================

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::cycle::CycleReport;

pub const LATEST_FILE: &str = "latest.json";

#[derive(Debug, Clone)]
pub struct Journal {
    dir: PathBuf,
}

impl Journal {
    /// Open (and create if needed) the journal directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create journal directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist `report`. Returns the path of the timestamped snapshot.
    pub fn record(&self, report: &CycleReport) -> Result<PathBuf> {
        let content = serde_json::to_string_pretty(report).context("failed to serialise cycle report")?;

        write_atomic(&self.dir.join(LATEST_FILE), &content)?;

        let name = format!(
            "signals_{}_{}.json",
            report.timestamp.format("%Y%m%d_%H%M%S"),
            report.cycle
        );
        let snapshot = self.dir.join(name);
        write_atomic(&snapshot, &content)?;

        debug!(path = %snapshot.display(), cycle = report.cycle, "cycle journaled");
        Ok(snapshot)
    }

    /// Read back the most recent cycle, if any was written.
    pub fn latest(&self) -> Result<Option<CycleReport>> {
        let path = self.dir.join(LATEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let report = serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(Some(report))
    }
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, content).with_context(|| format!("failed to write {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path).with_context(|| format!("failed to rename to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::{CycleStats, InstrumentOutcome, InstrumentReport};
    use crate::types::{AccountSnapshot, TradingMode};
    use chrono::Utc;

    fn report(cycle: u64) -> CycleReport {
        CycleReport {
            cycle,
            timestamp: Utc::now(),
            trading_mode: TradingMode::Live,
            account: Some(AccountSnapshot {
                balance: 10_000.0,
                equity: 10_050.0,
                margin: 100.0,
                free_margin: 9_950.0,
                profit: 50.0,
            }),
            positions: vec![],
            signals: vec![],
            outcomes: vec![InstrumentReport {
                instrument: "EURUSD".to_string(),
                outcome: InstrumentOutcome::Skipped("no market data".to_string()),
            }],
            stats: CycleStats {
                signals_generated: 3,
                trades_executed: 1,
            },
            trading_allowed: true,
            gate_reason: "OK".to_string(),
            closed_trades: vec![],
        }
    }

    fn temp_journal() -> Journal {
        let dir = std::env::temp_dir().join(format!("journal_{}", uuid::Uuid::new_v4()));
        Journal::open(dir).unwrap()
    }

    #[test]
    fn empty_journal_has_no_latest() {
        let journal = temp_journal();
        assert!(journal.latest().unwrap().is_none());
        let _ = std::fs::remove_dir_all(journal.dir());
    }

    #[test]
    fn writes_latest_and_snapshot() {
        let journal = temp_journal();
        let snapshot = journal.record(&report(1)).unwrap();
        journal.record(&report(2)).unwrap();

        assert!(snapshot.exists());
        assert!(snapshot.file_name().unwrap().to_string_lossy().starts_with("signals_"));

        let latest = journal.latest().unwrap().unwrap();
        assert_eq!(latest.cycle, 2);
        assert_eq!(latest.stats.trades_executed, 1);

        let files = std::fs::read_dir(journal.dir()).unwrap().count();
        assert_eq!(files, 3);
        let _ = std::fs::remove_dir_all(journal.dir());
    }

    #[test]
    fn outcome_serialises_with_status_tag() {
        let value = serde_json::to_value(&report(1).outcomes[0]).unwrap();
        assert_eq!(value["outcome"]["status"], "skipped");
        assert_eq!(value["outcome"]["detail"], "no market data");
    }
}
