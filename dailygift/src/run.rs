//! One full daily run: session restore, login, check-in, lottery, report.

use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::browser::BrowserSession;
use crate::captcha::{CaptchaSolver, GeminiSolver};
use crate::checkin;
use crate::config::Config;
use crate::cookies::CookieStore;
use crate::errors::BotError;
use crate::login::{self, LoginOutcome};
use crate::lottery;
use crate::notify::{Notifier, NotifyKind, SystemNotifier, FAILURE_TITLE};
use crate::page::{GiftPage, LiveGiftPage};
use crate::summary::{self, DailySummary, LoginType, RunOutcome, SUMMARY_FILE};

const POST_LOGIN_SETTLE: Duration = Duration::from_secs(3);
const SESSION_SETTLE: Duration = Duration::from_secs(1);
const ERROR_SCREENSHOT: &str = "error.png";

/// Run the whole daily sequence with the system notifier and, when an API
/// key is configured, the Gemini CAPTCHA solver.
pub async fn run(config: Config) -> Result<(), BotError> {
    let solver = config
        .gemini_api_key
        .clone()
        .map(|key| GeminiSolver::new(key, config.gemini_model.clone()));
    let solver_ref = solver.as_ref().map(|s| s as &dyn CaptchaSolver);
    run_with(config, solver_ref, &SystemNotifier).await
}

/// Same sequence with caller-supplied solver and notifier seams.
pub async fn run_with(
    config: Config,
    solver: Option<&dyn CaptchaSolver>,
    notifier: &dyn Notifier,
) -> Result<(), BotError> {
    info!(url = %config.target_url, headless = config.headless, "starting daily gift run");
    let ctx = RunContext::start(config).await?;
    ctx.complete(solver, notifier).await
}

/// State threaded through one run. The session is a replaceable field so the
/// manual-CAPTCHA path can swap a headless browser for a visible one mid-run.
struct RunContext {
    config: Config,
    session: BrowserSession,
    cookie_store: CookieStore,
    summary: DailySummary,
    login_type: LoginType,
    captcha_used: bool,
    cookies_loaded: bool,
    started: Instant,
}

impl RunContext {
    async fn start(config: Config) -> Result<Self, BotError> {
        let started = Instant::now();
        let mut summary = DailySummary::new(config.log_dir.join(SUMMARY_FILE));
        summary.start_session(Utc::now().date_naive());
        let cookie_store = CookieStore::new(config.cookie_path.clone());
        let session = BrowserSession::launch(config.headless).await?;
        Ok(Self {
            config,
            session,
            cookie_store,
            summary,
            login_type: LoginType::Unknown,
            captcha_used: false,
            cookies_loaded: false,
            started,
        })
    }

    async fn complete(
        mut self,
        solver: Option<&dyn CaptchaSolver>,
        notifier: &dyn Notifier,
    ) -> Result<(), BotError> {
        let outcome = self.drive(solver, notifier).await;
        match &outcome {
            Ok(()) => {
                self.save_cookies().await;
                self.summary.record_outcome(RunOutcome {
                    login_type: self.login_type,
                    captcha_used: self.captcha_used,
                    duration: summary::format_duration(self.started.elapsed()),
                });
                match self.summary.finalize() {
                    Ok(()) => info!("daily summary logged"),
                    Err(err) => error!(%err, "could not write the daily summary"),
                }
            }
            Err(err) => {
                error!(%err, "run failed");
                notifier
                    .notify(FAILURE_TITLE, &format!("執行錯誤: {err}"), NotifyKind::Error)
                    .await;
                let shot = self.config.log_dir.join(ERROR_SCREENSHOT);
                match self.session.screenshot_to(&shot).await {
                    Ok(()) => info!(path = %shot.display(), "error screenshot saved"),
                    Err(shot_err) => error!(%shot_err, "could not save the error screenshot"),
                }
            }
        }
        match self.session.close().await {
            Ok(()) => info!("browser closed"),
            Err(err) => warn!(%err, "browser close failed"),
        }
        outcome
    }

    async fn drive(
        &mut self,
        solver: Option<&dyn CaptchaSolver>,
        notifier: &dyn Notifier,
    ) -> Result<(), BotError> {
        self.init_session().await?;

        loop {
            let page = self.page();
            let outcome = login::ensure_logged_in(
                &page,
                solver,
                notifier,
                &self.config,
                self.session.is_headless(),
                self.cookies_loaded,
            )
            .await?;
            match outcome {
                LoginOutcome::AlreadyLoggedIn => {
                    self.login_type = LoginType::Cookie;
                    break;
                }
                LoginOutcome::LoggedIn { captcha_seen } => {
                    self.login_type = LoginType::Password;
                    self.captcha_used |= captcha_seen;
                    self.save_cookies().await;
                    break;
                }
                LoginOutcome::ManualSolveRequired => {
                    self.captcha_used = true;
                    self.relaunch_headed().await?;
                }
            }
        }

        sleep(POST_LOGIN_SETTLE).await;

        let page = self.page();
        checkin::run_check_in(&page, &mut self.summary).await?;

        // A broken lottery never blocks cookie persistence or the report.
        if let Err(err) = lottery::run_lottery(&page, &mut self.summary, &self.config.log_dir).await
        {
            error!(%err, "lottery feature error");
            info!("continuing with cleanup");
        }
        Ok(())
    }

    /// Navigate to the event page, replaying any persisted session first.
    async fn init_session(&mut self) -> Result<(), BotError> {
        self.cookies_loaded = false;
        match self.cookie_store.load() {
            Ok(Some(cookies)) if !cookies.is_empty() => {
                self.session.set_cookies(&cookies).await?;
                info!(
                    count = cookies.len(),
                    path = %self.cookie_store.path().display(),
                    "cookie jar replayed"
                );
                self.cookies_loaded = true;
            }
            Ok(Some(_)) => info!("cookie jar is empty, starting fresh"),
            Ok(None) => info!("no cookie jar yet, starting fresh"),
            Err(err) => warn!(%err, "could not load the cookie jar, starting fresh"),
        }
        if !self.cookies_loaded {
            if let Some(header) = &self.config.cookie_header {
                match self
                    .session
                    .seed_from_header(header, &self.config.target_url)
                    .await
                {
                    Ok(0) => {}
                    Ok(count) => {
                        info!(count, "seeded session cookies from the environment");
                        self.cookies_loaded = true;
                    }
                    Err(err) => warn!(%err, "could not seed cookies from the environment"),
                }
            }
        }
        if self.cookies_loaded {
            // Provisional; a password login later in the run overrides it.
            self.login_type = LoginType::Cookie;
        }

        self.session.goto(&self.config.target_url).await?;
        let page = self.page();
        page.wait_ready().await?;
        if self.cookies_loaded {
            if !page.wait_session_applied().await? {
                warn!("session did not visibly apply before the deadline");
            }
            sleep(SESSION_SETTLE).await;
        }
        Ok(())
    }

    /// Swap the current browser for a visible one and navigate again.
    async fn relaunch_headed(&mut self) -> Result<(), BotError> {
        info!("relaunching the browser with a visible window");
        if let Err(err) = self.session.close().await {
            warn!(%err, "old browser did not close cleanly");
        }
        self.session = BrowserSession::launch(false).await?;
        self.init_session().await
    }

    async fn save_cookies(&self) {
        match self.session.cookies().await {
            Ok(cookies) => match self.cookie_store.save(&cookies) {
                Ok(()) => info!(count = cookies.len(), "session cookies saved"),
                Err(err) => warn!(%err, "could not write the cookie jar"),
            },
            Err(err) => warn!(%err, "could not read session cookies"),
        }
    }

    fn page(&self) -> LiveGiftPage {
        LiveGiftPage::new(self.session.page().clone())
    }
}
