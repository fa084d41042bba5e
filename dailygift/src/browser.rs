//! Chromium session management over CDP.

use std::path::Path;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::cookies::{parse_cookie_pairs, StoredCookie};
use crate::errors::BotError;

/// An owned browser plus the one page the bot drives.
///
/// The run context replaces the whole session when it has to switch from
/// headless to headed for manual CAPTCHA input, so everything needed to
/// shut a session down cleanly lives in here.
pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: Page,
    headless: bool,
    // Fresh profile per launch; cookies.json is the only state carried
    // between runs.
    _profile_dir: tempfile::TempDir,
}

impl BrowserSession {
    #[instrument]
    pub async fn launch(headless: bool) -> Result<Self, BotError> {
        let profile_dir = tempfile::tempdir()?;

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(1280, 800)
            .arg("--disable-dev-shm-usage")
            .user_data_dir(profile_dir.path());

        if headless {
            // New headless mode; .with_head() keeps chromiumoxide from
            // adding the legacy --headless flag on top of it.
            builder = builder.with_head().arg("--headless=new");
        } else {
            builder = builder.with_head();
        }

        let config = builder
            .build()
            .map_err(|e| BotError::Browser(format!("invalid browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BotError::Browser(format!("failed to launch Chromium: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await?;
        info!(headless, "browser launched");

        Ok(Self {
            browser,
            handler_task,
            page,
            headless,
            _profile_dir: profile_dir,
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn is_headless(&self) -> bool {
        self.headless
    }

    pub async fn goto(&self, url: &str) -> Result<(), BotError> {
        self.page.goto(url).await?;
        Ok(())
    }

    /// Current cookie jar, in the persistable form.
    pub async fn cookies(&self) -> Result<Vec<StoredCookie>, BotError> {
        let cookies = self.page.get_cookies().await?;
        Ok(cookies.iter().map(StoredCookie::from_cdp).collect())
    }

    /// Replay a persisted jar. Call before navigating to the target.
    pub async fn set_cookies(&self, cookies: &[StoredCookie]) -> Result<(), BotError> {
        if cookies.is_empty() {
            return Ok(());
        }
        let params: Vec<CookieParam> = cookies.iter().map(StoredCookie::to_param).collect();
        self.page.set_cookies(params).await?;
        debug!(count = cookies.len(), "cookies applied");
        Ok(())
    }

    /// Seed cookies from a raw `name=value; ...` header string, scoped to
    /// `url`. Returns how many were applied.
    pub async fn seed_from_header(&self, raw: &str, url: &str) -> Result<usize, BotError> {
        let pairs = parse_cookie_pairs(raw);
        if pairs.is_empty() {
            return Ok(0);
        }
        let params: Vec<CookieParam> = pairs
            .into_iter()
            .map(|(name, value)| {
                let mut param = CookieParam::new(name, value);
                param.url = Some(url.to_string());
                param
            })
            .collect();
        let count = params.len();
        self.page.set_cookies(params).await?;
        debug!(count, "cookies seeded from env header");
        Ok(count)
    }

    /// Full-page PNG screenshot written to `path`.
    pub async fn screenshot_to(&self, path: &Path) -> Result<(), BotError> {
        capture_full_page(&self.page, path).await
    }

    /// Close the browser and reap the process. Safe to drop the session
    /// afterwards; errors past the close command are only logged.
    pub async fn close(&mut self) -> Result<(), BotError> {
        self.browser.close().await?;
        if let Err(e) = self.browser.wait().await {
            warn!("browser did not exit cleanly: {e}");
        }
        let _ = (&mut self.handler_task).await;
        Ok(())
    }
}

pub(crate) async fn capture_full_page(page: &Page, path: &Path) -> Result<(), BotError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let bytes = page
        .screenshot(
            ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .full_page(true)
                .build(),
        )
        .await?;
    tokio::fs::write(path, bytes).await?;
    Ok(())
}
