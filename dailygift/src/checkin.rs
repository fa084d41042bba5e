//! Daily check-in: read the counter, judge the button styling, click once.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, instrument, warn};

use crate::errors::BotError;
use crate::page::{DisabledSignals, GiftPage};
use crate::parse;
use crate::summary::{CheckInRecord, CheckInStatus, DailySummary};

const POST_CLICK_WAIT: Duration = Duration::from_secs(3);
const DAILY_BONUS: &str = "Daily Bonus";

/// Perform today's check-in and record the result.
#[instrument(skip(page, summary))]
pub async fn run_check_in(
    page: &dyn GiftPage,
    summary: &mut DailySummary,
) -> Result<CheckInStatus, BotError> {
    info!("checking daily check-in status");
    let body = page.body_text().await?;
    let text_says_checked_in = parse::mentions_checked_in(&body);
    let days = parse::checkin_day_count(&body);
    let probe = page.checkin_button().await?;
    info!(
        text_says_checked_in,
        days = ?days,
        button_visible = probe.visible,
        "check-in state"
    );

    let record = if probe.visible {
        let signals = DisabledSignals::evaluate(&probe);
        info!(
            filter = %probe.filter,
            pointer_events = %probe.pointer_events,
            opacity = %probe.opacity,
            disabled = probe.disabled,
            classes = ?probe.classes,
            grayscale = signals.grayscale,
            low_opacity = signals.low_opacity,
            disabled_class = signals.disabled_class,
            "check-in button styling"
        );
        if signals.any() {
            // The styling is the deciding signal; the page text mentions
            // past check-ins even before today's.
            info!(days = ?days, "already checked in today");
            CheckInRecord {
                status: CheckInStatus::AlreadyCheckedIn,
                days_before: None,
                days_after: days,
                reward: None,
            }
        } else {
            match attempt_check_in(page, days).await {
                Ok(record) => record,
                Err(err) => {
                    warn!(%err, "check-in attempt failed");
                    CheckInRecord {
                        status: CheckInStatus::Error,
                        days_before: days,
                        days_after: None,
                        reward: Some(DAILY_BONUS.to_string()),
                    }
                }
            }
        }
    } else {
        warn!("check-in button not found, cannot determine status");
        CheckInRecord {
            status: CheckInStatus::Unknown,
            days_before: days,
            days_after: None,
            reward: None,
        }
    };

    let status = record.status;
    summary.record_check_in(record);
    Ok(status)
}

async fn attempt_check_in(
    page: &dyn GiftPage,
    days_before: Option<u32>,
) -> Result<CheckInRecord, BotError> {
    info!("check-in button enabled, clicking");
    if !page.click_checkin().await? {
        warn!("could not click the check-in button");
        return Ok(CheckInRecord {
            status: CheckInStatus::Failed,
            days_before,
            days_after: None,
            reward: Some(DAILY_BONUS.to_string()),
        });
    }
    sleep(POST_CLICK_WAIT).await;

    match parse::checkin_day_count(&page.body_text().await?) {
        Some(after) => {
            if days_before.is_none() || days_before.is_some_and(|before| after > before) {
                info!(before = ?days_before, after, "check-in successful");
            } else {
                info!(after, "check-in clicked, counter unchanged");
            }
            Ok(CheckInRecord {
                status: CheckInStatus::Success,
                days_before,
                days_after: Some(after),
                reward: Some(DAILY_BONUS.to_string()),
            })
        }
        None => {
            warn!("could not verify the new check-in counter");
            Ok(CheckInRecord {
                status: CheckInStatus::Failed,
                days_before,
                days_after: None,
                reward: Some(DAILY_BONUS.to_string()),
            })
        }
    }
}
