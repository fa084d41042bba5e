//! Structured per-run report, appended to `daily-summary.log`.
//!
//! Sections are collected over the run and written as one block at the end,
//! so a glance at the file shows what each day's run did.

use std::io::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::warn;

use crate::errors::BotError;
use crate::parse::PointsSummary;

pub const SUMMARY_FILE: &str = "daily-summary.log";

const SEPARATOR_WIDTH: usize = 52;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckInStatus {
    Success,
    AlreadyCheckedIn,
    Failed,
    Error,
    Unknown,
}

impl CheckInStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::AlreadyCheckedIn => "Already checked in",
            Self::Failed => "Failed",
            Self::Error => "Error",
            Self::Unknown => "Unknown",
        }
    }

    fn icon(&self) -> &'static str {
        match self {
            Self::Success => "✅",
            Self::AlreadyCheckedIn => "📅",
            _ => "❌",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LotteryStatus {
    Success,
    Skipped,
    Failed,
}

impl LotteryStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Skipped => "Skipped",
            Self::Failed => "Failed",
        }
    }

    fn icon(&self) -> &'static str {
        match self {
            Self::Success => "🎁",
            Self::Skipped => "🎰",
            Self::Failed => "❌",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginType {
    Cookie,
    Password,
    Unknown,
}

impl LoginType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cookie => "Auto (Cookie)",
            Self::Password => "Manual (Password)",
            Self::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckInRecord {
    pub status: CheckInStatus,
    pub days_before: Option<u32>,
    pub days_after: Option<u32>,
    pub reward: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LotteryRecord {
    pub status: LotteryStatus,
    pub detail: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub login_type: LoginType,
    pub captcha_used: bool,
    pub duration: String,
}

/// Collects one run's results and appends them as a block.
#[derive(Debug)]
pub struct DailySummary {
    path: PathBuf,
    date: Option<NaiveDate>,
    check_in: Option<CheckInRecord>,
    points: Option<PointsSummary>,
    lottery: Option<LotteryRecord>,
    outcome: Option<RunOutcome>,
}

impl DailySummary {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            date: None,
            check_in: None,
            points: None,
            lottery: None,
            outcome: None,
        }
    }

    pub fn start_session(&mut self, date: NaiveDate) {
        self.date = Some(date);
    }

    pub fn record_check_in(&mut self, record: CheckInRecord) {
        self.check_in = Some(record);
    }

    pub fn record_points(&mut self, points: PointsSummary) {
        self.points = Some(points);
    }

    pub fn record_lottery(&mut self, status: LotteryStatus, detail: Option<String>) {
        self.lottery = Some(LotteryRecord { status, detail });
    }

    pub fn record_outcome(&mut self, outcome: RunOutcome) {
        self.outcome = Some(outcome);
    }

    /// Append the collected block. A run that never started a session writes
    /// nothing.
    pub fn finalize(&self) -> Result<(), BotError> {
        let Some(date) = self.date else {
            warn!("no summary session started, skipping the daily report");
            return Ok(());
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(self.format_entry(date).as_bytes())?;
        Ok(())
    }

    fn format_entry(&self, date: NaiveDate) -> String {
        let separator = "=".repeat(SEPARATOR_WIDTH);
        let mut entry = format!(
            "\n{separator}\n{:<width$}\n{separator}\n",
            date.format("%Y-%m-%d"),
            width = SEPARATOR_WIDTH
        );

        if let Some(check_in) = &self.check_in {
            entry.push_str(&format!(
                "{} Check-in: {}\n",
                check_in.status.icon(),
                check_in.status.label()
            ));
            match (check_in.days_before, check_in.days_after) {
                (Some(before), Some(after)) => {
                    entry.push_str(&format!("   - Days checked: {before} → {after}\n"));
                }
                (None, Some(after)) => {
                    entry.push_str(&format!("   - Total days: {after}\n"));
                }
                _ => {}
            }
            if let Some(reward) = &check_in.reward {
                entry.push_str(&format!("   - Reward: {reward}\n"));
            }
            entry.push('\n');
        }

        if let Some(points) = self.points {
            entry.push_str("💰 Points:\n");
            entry.push_str(&format!("   - Current year: {}\n", points.current_year));
            entry.push_str(&format!("   - Expiring: {}\n", points.expiring));
            entry.push_str(&format!("   - Total: {}\n", points.total));
            entry.push('\n');
        }

        if let Some(lottery) = &self.lottery {
            entry.push_str(&format!(
                "{} Lottery: {}\n",
                lottery.status.icon(),
                lottery.status.label()
            ));
            if let Some(detail) = &lottery.detail {
                entry.push_str(&format!("   - {detail}\n"));
            }
            entry.push('\n');
        }

        if let Some(outcome) = &self.outcome {
            entry.push_str("📊 Summary:\n");
            entry.push_str(&format!("   - Login: {}\n", outcome.login_type.label()));
            entry.push_str(&format!(
                "   - CAPTCHA: {}\n",
                if outcome.captcha_used { "Required" } else { "Not required" }
            ));
            entry.push_str(&format!("   - Duration: {}\n", outcome.duration));
        }

        entry.push_str(&format!("{separator}\n"));
        entry
    }
}

/// `1m 5s` past the minute mark, plain seconds below it.
pub fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64().round() as u64;
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 14).unwrap()
    }

    fn full_summary(path: PathBuf) -> DailySummary {
        let mut summary = DailySummary::new(path);
        summary.start_session(sample_date());
        summary.record_check_in(CheckInRecord {
            status: CheckInStatus::Success,
            days_before: Some(5),
            days_after: Some(6),
            reward: Some("Daily Bonus".to_string()),
        });
        summary.record_points(PointsSummary {
            current_year: 80,
            expiring: 40,
            total: 120,
        });
        summary.record_lottery(LotteryStatus::Success, Some("抽中了【友情點卡】".to_string()));
        summary.record_outcome(RunOutcome {
            login_type: LoginType::Cookie,
            captcha_used: true,
            duration: "1m 5s".to_string(),
        });
        summary
    }

    #[test]
    fn full_block_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily-summary.log");
        full_summary(path.clone()).finalize().unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let separator = "=".repeat(52);
        assert!(written.starts_with(&format!("\n{separator}\n")));
        assert!(written.contains(&format!("{:<52}", "2025-07-14")));
        assert!(written.contains("✅ Check-in: Success\n"));
        assert!(written.contains("   - Days checked: 5 → 6\n"));
        assert!(written.contains("   - Reward: Daily Bonus\n"));
        assert!(written.contains("💰 Points:\n"));
        assert!(written.contains("   - Current year: 80\n"));
        assert!(written.contains("   - Expiring: 40\n"));
        assert!(written.contains("   - Total: 120\n"));
        assert!(written.contains("🎁 Lottery: Success\n"));
        assert!(written.contains("   - 抽中了【友情點卡】\n"));
        assert!(written.contains("📊 Summary:\n"));
        assert!(written.contains("   - Login: Auto (Cookie)\n"));
        assert!(written.contains("   - CAPTCHA: Required\n"));
        assert!(written.contains("   - Duration: 1m 5s\n"));
        assert!(written.ends_with(&format!("{separator}\n")));
    }

    #[test]
    fn already_checked_in_shows_total_days_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily-summary.log");
        let mut summary = DailySummary::new(path.clone());
        summary.start_session(sample_date());
        summary.record_check_in(CheckInRecord {
            status: CheckInStatus::AlreadyCheckedIn,
            days_before: None,
            days_after: Some(6),
            reward: None,
        });
        summary.finalize().unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("📅 Check-in: Already checked in\n"));
        assert!(written.contains("   - Total days: 6\n"));
        assert!(!written.contains("Days checked"));
        assert!(!written.contains("Reward"));
    }

    #[test]
    fn skipped_lottery_uses_slot_icon() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily-summary.log");
        let mut summary = DailySummary::new(path.clone());
        summary.start_session(sample_date());
        summary.record_lottery(
            LotteryStatus::Skipped,
            Some("Points insufficient (80/100)".to_string()),
        );
        summary.record_outcome(RunOutcome {
            login_type: LoginType::Password,
            captcha_used: false,
            duration: "42s".to_string(),
        });
        summary.finalize().unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("🎰 Lottery: Skipped\n"));
        assert!(written.contains("   - Points insufficient (80/100)\n"));
        assert!(written.contains("   - Login: Manual (Password)\n"));
        assert!(written.contains("   - CAPTCHA: Not required\n"));
    }

    #[test]
    fn no_session_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily-summary.log");
        DailySummary::new(path.clone()).finalize().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn entries_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily-summary.log");
        full_summary(path.clone()).finalize().unwrap();
        full_summary(path.clone()).finalize().unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let separator = "=".repeat(52);
        assert_eq!(written.matches(&separator).count(), 6);
    }

    #[test]
    fn durations_format() {
        assert_eq!(format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(format_duration(Duration::from_secs(59)), "59s");
        assert_eq!(format_duration(Duration::from_secs(60)), "1m 0s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }
}
