//! Scripted doubles for the page, solver and notifier seams.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use dailygift::{
    AgreementState, BotError, CaptchaSolver, Config, ControlProbe, GiftPage, Notifier, NotifyKind,
    SubmitProbe,
};

/// Pop the next scripted answer, repeating the last one forever.
fn next<T: Clone>(seq: &Mutex<Vec<T>>) -> T {
    let mut items = seq.lock().unwrap();
    if items.len() > 1 {
        items.remove(0)
    } else {
        items[0].clone()
    }
}

/// Page double: each field scripts one trait method, interactions are
/// recorded for assertions.
pub struct FakePage {
    pub logged_out: Mutex<Vec<bool>>,
    pub body_texts: Mutex<Vec<String>>,
    pub captcha_images: Mutex<Vec<Option<Vec<u8>>>>,
    pub captcha_accepts: Mutex<Vec<bool>>,
    pub submit_probe: Mutex<Option<SubmitProbe>>,
    pub login_confirms: bool,
    pub agreement: AgreementState,
    pub switch_available: bool,
    pub checkin_probe: Mutex<ControlProbe>,
    pub checkin_click_ok: bool,
    pub visible_texts: Vec<String>,
    pub prize_texts: Vec<String>,
    pub draw_click_ok: bool,
    pub result_text: String,
    pub reward_log_opens: bool,

    pub popup_opens: Mutex<u32>,
    pub credential_fills: Mutex<Vec<(String, String)>>,
    pub entered_codes: Mutex<Vec<String>>,
    pub refreshes: Mutex<u32>,
    pub submit_clicks: Mutex<u32>,
    pub checkin_clicks: Mutex<u32>,
    pub draw_clicks: Mutex<u32>,
    pub screenshots: Mutex<Vec<PathBuf>>,
}

impl FakePage {
    /// A page with an active session and nothing interesting on it.
    pub fn new() -> Self {
        Self {
            logged_out: Mutex::new(vec![false]),
            body_texts: Mutex::new(vec![String::new()]),
            captcha_images: Mutex::new(vec![None]),
            captcha_accepts: Mutex::new(vec![true]),
            submit_probe: Mutex::new(Some(SubmitProbe {
                pointer_events: "auto".into(),
                disabled: false,
            })),
            login_confirms: true,
            agreement: AgreementState::Clicked,
            switch_available: true,
            checkin_probe: Mutex::new(ControlProbe::default()),
            checkin_click_ok: true,
            visible_texts: Vec::new(),
            prize_texts: Vec::new(),
            draw_click_ok: true,
            result_text: String::new(),
            reward_log_opens: false,
            popup_opens: Mutex::new(0),
            credential_fills: Mutex::new(Vec::new()),
            entered_codes: Mutex::new(Vec::new()),
            refreshes: Mutex::new(0),
            submit_clicks: Mutex::new(0),
            checkin_clicks: Mutex::new(0),
            draw_clicks: Mutex::new(0),
            screenshots: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl GiftPage for FakePage {
    async fn wait_ready(&self) -> Result<(), BotError> {
        Ok(())
    }

    async fn wait_session_applied(&self) -> Result<bool, BotError> {
        Ok(true)
    }

    async fn is_logged_out(&self) -> Result<bool, BotError> {
        Ok(next(&self.logged_out))
    }

    async fn body_text(&self) -> Result<String, BotError> {
        Ok(next(&self.body_texts))
    }

    async fn open_login_popup(&self) -> Result<(), BotError> {
        *self.popup_opens.lock().unwrap() += 1;
        Ok(())
    }

    async fn switch_to_account_login(&self) -> Result<bool, BotError> {
        Ok(self.switch_available)
    }

    async fn accept_agreement(&self) -> Result<AgreementState, BotError> {
        Ok(self.agreement)
    }

    async fn fill_credentials(&self, username: &str, password: &str) -> Result<(), BotError> {
        self.credential_fills
            .lock()
            .unwrap()
            .push((username.to_string(), password.to_string()));
        Ok(())
    }

    async fn captcha_image(&self) -> Result<Option<Vec<u8>>, BotError> {
        Ok(next(&self.captcha_images))
    }

    async fn enter_captcha(&self, code: &str) -> Result<(), BotError> {
        self.entered_codes.lock().unwrap().push(code.to_string());
        Ok(())
    }

    async fn refresh_captcha(&self) -> Result<bool, BotError> {
        *self.refreshes.lock().unwrap() += 1;
        Ok(true)
    }

    async fn wait_submit_enabled(&self, _timeout: Duration) -> Result<bool, BotError> {
        Ok(next(&self.captcha_accepts))
    }

    async fn submit_probe(&self) -> Result<Option<SubmitProbe>, BotError> {
        Ok(self.submit_probe.lock().unwrap().clone())
    }

    async fn click_submit(&self) -> Result<(), BotError> {
        *self.submit_clicks.lock().unwrap() += 1;
        Ok(())
    }

    async fn wait_logged_in(&self, _timeout: Duration) -> Result<bool, BotError> {
        Ok(self.login_confirms)
    }

    async fn checkin_button(&self) -> Result<ControlProbe, BotError> {
        Ok(self.checkin_probe.lock().unwrap().clone())
    }

    async fn click_checkin(&self) -> Result<bool, BotError> {
        *self.checkin_clicks.lock().unwrap() += 1;
        Ok(self.checkin_click_ok)
    }

    async fn visible_texts(&self) -> Result<Vec<String>, BotError> {
        Ok(self.visible_texts.clone())
    }

    async fn prize_texts(&self) -> Result<Vec<String>, BotError> {
        Ok(self.prize_texts.clone())
    }

    async fn click_draw(&self) -> Result<bool, BotError> {
        *self.draw_clicks.lock().unwrap() += 1;
        Ok(self.draw_click_ok)
    }

    async fn result_text(&self) -> Result<String, BotError> {
        Ok(self.result_text.clone())
    }

    async fn open_reward_log(&self) -> Result<bool, BotError> {
        Ok(self.reward_log_opens)
    }

    async fn screenshot(&self, path: &Path) -> Result<(), BotError> {
        self.screenshots.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    pub messages: Mutex<Vec<(String, String, NotifyKind)>>,
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn notify(&self, title: &str, message: &str, kind: NotifyKind) {
        self.messages
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string(), kind));
    }
}

/// Always answers with the same code.
pub struct FixedSolver(pub &'static str);

#[async_trait]
impl CaptchaSolver for FixedSolver {
    async fn solve(&self, _image_png: &[u8]) -> Result<String, BotError> {
        Ok(self.0.to_string())
    }
}

/// Always fails, like a solver with a bad key or model name.
pub struct ErrSolver;

#[async_trait]
impl CaptchaSolver for ErrSolver {
    async fn solve(&self, _image_png: &[u8]) -> Result<String, BotError> {
        Err(BotError::Captcha("service unavailable".to_string()))
    }
}

pub fn test_config() -> Config {
    Config {
        username: "user@example.com".into(),
        password: "hunter2".into(),
        cookie_header: None,
        gemini_api_key: None,
        gemini_model: "gemini-3-flash-preview".into(),
        target_url: dailygift::TARGET_URL.into(),
        cookie_path: "cookies.json".into(),
        log_dir: "logs".into(),
        headless: true,
    }
}

pub fn enabled_button() -> ControlProbe {
    ControlProbe {
        present: true,
        visible: true,
        filter: "none".into(),
        pointer_events: "auto".into(),
        opacity: "1".into(),
        disabled: false,
        classes: vec!["sign-btn".into()],
    }
}

pub fn claimed_button() -> ControlProbe {
    ControlProbe {
        filter: "grayscale(1)".into(),
        ..enabled_button()
    }
}
