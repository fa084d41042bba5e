//! Login flow: popup handling, agreement checkbox, credential fill and the
//! CAPTCHA solve/retry loop.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::captcha::{backoff_delay, CaptchaSolver, MAX_SOLVE_ATTEMPTS};
use crate::config::Config;
use crate::errors::BotError;
use crate::notify::{Notifier, NotifyKind, ASSIST_TITLE};
use crate::page::{AgreementState, GiftPage};

const COOKIE_RECHECK_WAIT: Duration = Duration::from_secs(2);
const POPUP_ANIMATION: Duration = Duration::from_secs(1);
const MODE_SWITCH: Duration = Duration::from_secs(1);
const AGREEMENT_SETTLE: Duration = Duration::from_millis(500);
const CAPTCHA_VALIDATE: Duration = Duration::from_secs(1);
const SUBMIT_ENABLE_TIMEOUT: Duration = Duration::from_secs(3);
const MANUAL_SOLVE_WAIT: Duration = Duration::from_secs(30);
const UNCLICKABLE_WAIT: Duration = Duration::from_secs(10);
const LOGIN_CONFIRM_TIMEOUT: Duration = Duration::from_secs(120);

const MANUAL_CAPTCHA_MESSAGE: &str = "CAPTCHA自動識別失敗，請手動輸入驗證碼後繼續";

/// How the login flow ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The header no longer offers 登入; nothing to do.
    AlreadyLoggedIn,
    /// Credentials were submitted and the session confirmed.
    LoggedIn { captcha_seen: bool },
    /// Automatic solving failed in a headless run; the caller should
    /// relaunch with a visible window and run the flow again.
    ManualSolveRequired,
}

/// Drive the page from a logged-out header to an active session.
#[instrument(skip(page, solver, notifier, config))]
pub async fn ensure_logged_in(
    page: &dyn GiftPage,
    solver: Option<&dyn CaptchaSolver>,
    notifier: &dyn Notifier,
    config: &Config,
    headless: bool,
    cookies_loaded: bool,
) -> Result<LoginOutcome, BotError> {
    if !page.is_logged_out().await? {
        info!("session is already active");
        return Ok(LoginOutcome::AlreadyLoggedIn);
    }
    if cookies_loaded {
        // The restored session can lag behind the first paint.
        warn!("stored cookies did not restore the session, re-checking");
        sleep(COOKIE_RECHECK_WAIT).await;
        if !page.is_logged_out().await? {
            info!("session became active after the grace period");
            return Ok(LoginOutcome::AlreadyLoggedIn);
        }
    }

    info!("logging in with account credentials");
    page.open_login_popup().await?;
    sleep(POPUP_ANIMATION).await;

    if page.switch_to_account_login().await? {
        debug!("switched the popup to account login");
        sleep(MODE_SWITCH).await;
    }

    match page.accept_agreement().await? {
        AgreementState::AlreadyChecked => debug!("agreement checkbox already ticked"),
        AgreementState::Clicked => {
            debug!("ticked the agreement checkbox");
            sleep(AGREEMENT_SETTLE).await;
        }
        AgreementState::ClickedFallback => {
            debug!("ticked the agreement checkbox via the tip line");
            sleep(AGREEMENT_SETTLE).await;
        }
        AgreementState::NotFound => warn!("agreement checkbox not found, continuing"),
    }

    page.fill_credentials(&config.username, &config.password)
        .await?;

    let mut captcha_seen = false;
    let mut solved = false;
    for attempt in 1..=MAX_SOLVE_ATTEMPTS {
        let Some(image) = page.captcha_image().await? else {
            if !captcha_seen {
                debug!("no CAPTCHA challenge on this login");
            }
            solved = true;
            break;
        };
        captcha_seen = true;

        let Some(solver) = solver else {
            warn!("CAPTCHA shown but no solver is configured");
            break;
        };

        if solve_one_captcha(page, solver, &image, attempt).await? {
            solved = true;
            break;
        }
        if attempt < MAX_SOLVE_ATTEMPTS {
            if page.refresh_captcha().await? {
                debug!("refreshed the CAPTCHA image");
            }
            let delay = backoff_delay(attempt);
            info!(attempt, delay_ms = delay.as_millis() as u64, "retrying CAPTCHA");
            sleep(delay).await;
        }
    }

    if !solved {
        warn!("CAPTCHA could not be solved automatically");
        notifier
            .notify(ASSIST_TITLE, MANUAL_CAPTCHA_MESSAGE, NotifyKind::Warning)
            .await;
        if headless {
            info!("switching to a visible window for manual CAPTCHA entry");
            return Ok(LoginOutcome::ManualSolveRequired);
        }
        info!(
            wait_secs = MANUAL_SOLVE_WAIT.as_secs(),
            "waiting for manual CAPTCHA entry"
        );
        sleep(MANUAL_SOLVE_WAIT).await;
    }

    let probe = page
        .submit_probe()
        .await?
        .ok_or_else(|| BotError::Login("submit button with 登入 label not found".to_string()))?;
    if !probe.clickable() {
        warn!(
            pointer_events = %probe.pointer_events,
            disabled = probe.disabled,
            "submit button is not clickable yet, waiting"
        );
        sleep(UNCLICKABLE_WAIT).await;
    }
    page.click_submit().await?;
    info!("submitted login, waiting for the session");

    if !page.wait_logged_in(LOGIN_CONFIRM_TIMEOUT).await? {
        return Err(BotError::Login(
            "login was not confirmed within 120s".to_string(),
        ));
    }
    info!("login completed");
    Ok(LoginOutcome::LoggedIn { captcha_seen })
}

/// One solve attempt against the current CAPTCHA image. `true` when the page
/// accepted the code (submit became clickable).
async fn solve_one_captcha(
    page: &dyn GiftPage,
    solver: &dyn CaptchaSolver,
    image: &[u8],
    attempt: u32,
) -> Result<bool, BotError> {
    info!(attempt, "CAPTCHA detected, solving");
    let code = match solver.solve(image).await {
        Ok(code) => code,
        Err(err) => {
            warn!(attempt, %err, "CAPTCHA solve failed");
            return Ok(false);
        }
    };
    if code.is_empty() {
        warn!(attempt, "CAPTCHA solver returned an empty code");
        return Ok(false);
    }
    info!(attempt, %code, "entering CAPTCHA code");
    page.enter_captcha(&code).await?;
    sleep(CAPTCHA_VALIDATE).await;
    if page.wait_submit_enabled(SUBMIT_ENABLE_TIMEOUT).await? {
        Ok(true)
    } else {
        warn!(attempt, "page did not accept the CAPTCHA code");
        Ok(false)
    }
}
