//! Points lottery: read balances, gate on the draw cost, check prize stock,
//! draw once and capture the result.

use std::path::Path;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, instrument, warn};

use crate::errors::BotError;
use crate::page::GiftPage;
use crate::parse;
use crate::summary::{DailySummary, LotteryStatus};

/// One draw costs 100 points.
pub const LOTTERY_COST: u32 = 100;
pub const LOTTERY_SCREENSHOT: &str = "lottery_result.png";

const DRAW_RESULT_WAIT: Duration = Duration::from_secs(3);
const HISTORY_MODAL_WAIT: Duration = Duration::from_secs(1);
const FALLBACK_RESULT: &str = "Lottery drawn - check manually for result";

/// Attempt one lottery draw and record the outcome.
#[instrument(skip(page, summary, log_dir))]
pub async fn run_lottery(
    page: &dyn GiftPage,
    summary: &mut DailySummary,
    log_dir: &Path,
) -> Result<(), BotError> {
    info!("checking lottery eligibility");

    let texts = page.visible_texts().await?;
    let body = page.body_text().await?;
    let points = parse::points_summary(texts.iter().map(String::as_str), &body);
    info!(
        current_year = points.current_year,
        expiring = points.expiring,
        total = points.total,
        "points balance"
    );
    summary.record_points(points);

    if points.total < LOTTERY_COST {
        info!(total = points.total, "points below the draw cost, skipping lottery");
        summary.record_lottery(
            LotteryStatus::Skipped,
            Some(format!(
                "Points insufficient ({}/{})",
                points.total, LOTTERY_COST
            )),
        );
        return Ok(());
    }

    let prize_texts = page.prize_texts().await?;
    let prizes = parse::prize_stocks(&prize_texts);
    if prizes.is_empty() {
        info!("no prize information found");
    }
    for prize in &prizes {
        info!(
            name = %prize.name,
            remaining = prize.remaining,
            in_stock = prize.has_stock,
            "prize stock"
        );
    }
    if !parse::has_any_stock(&prizes) {
        info!("no prizes with stock available, skipping lottery");
        summary.record_lottery(
            LotteryStatus::Skipped,
            Some("No prize stock available".to_string()),
        );
        return Ok(());
    }

    info!("prize stock available, drawing");
    if !page.click_draw().await? {
        // Without a click there is nothing to record for this run.
        warn!("could not find or click the draw button");
        return Ok(());
    }
    sleep(DRAW_RESULT_WAIT).await;

    let result = capture_result(page).await?;
    let detail = result.unwrap_or_else(|| FALLBACK_RESULT.to_string());
    info!(result = %detail, "lottery drawn");
    summary.record_lottery(LotteryStatus::Success, Some(detail));

    let screenshot = log_dir.join(LOTTERY_SCREENSHOT);
    match page.screenshot(&screenshot).await {
        Ok(()) => info!(path = %screenshot.display(), "lottery screenshot saved"),
        Err(err) => warn!(%err, "could not save the lottery screenshot"),
    }
    Ok(())
}

/// Result text from the page, then from the prize-history modal. The modal
/// lists our own draws, so marquee noise cannot reach it.
async fn capture_result(page: &dyn GiftPage) -> Result<Option<String>, BotError> {
    let text = page.result_text().await?;
    if let Some(result) = parse::lottery_result(&text) {
        return Ok(Some(result));
    }
    match page.open_reward_log().await {
        Ok(true) => {
            sleep(HISTORY_MODAL_WAIT).await;
            match page.body_text().await {
                Ok(body) => Ok(parse::history_result(&body)),
                Err(err) => {
                    warn!(%err, "could not read the prize history");
                    Ok(None)
                }
            }
        }
        Ok(false) => Ok(None),
        Err(err) => {
            warn!(%err, "could not open the prize history");
            Ok(None)
        }
    }
}
