//! The event-page adapter.
//!
//! Every selector and script that is specific to the daily-gift page lives
//! behind the [`GiftPage`] trait, so the login/check-in/lottery flows can
//! run against a fake page in tests and the real page in production.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::browser::capture_full_page;
use crate::errors::BotError;

const HEADER_LOGIN: &str = ".top-b1";
const LOGIN_BOX: &str = ".login-box";
const PASSWORD_INPUT: &str = "input[placeholder=\"請輸入密碼\"]";
const LOGIN_SUBMIT: &str = ".login-box .login-btn";
const CAPTCHA_IMAGE: &str = ".modal-code img";

const READY_TIMEOUT: Duration = Duration::from_secs(10);
const SESSION_APPLY_TIMEOUT: Duration = Duration::from_secs(8);
const POPUP_TIMEOUT: Duration = Duration::from_secs(10);
const PASSWORD_FIELD_TIMEOUT: Duration = Duration::from_secs(3);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Raw computed-style facts about a control, as reported by the page.
/// The disabled decision over them is [`DisabledSignals::evaluate`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControlProbe {
    pub present: bool,
    pub visible: bool,
    pub filter: String,
    pub pointer_events: String,
    pub opacity: String,
    pub disabled: bool,
    pub classes: Vec<String>,
}

/// The five styling signals the page uses to gray out a claimed control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisabledSignals {
    pub grayscale: bool,
    pub no_pointer_events: bool,
    pub low_opacity: bool,
    pub disabled_attr: bool,
    pub disabled_class: bool,
}

impl DisabledSignals {
    pub fn evaluate(probe: &ControlProbe) -> Self {
        Self {
            grayscale: probe.filter.contains("grayscale") && probe.filter.contains('1'),
            no_pointer_events: probe.pointer_events == "none",
            low_opacity: probe
                .opacity
                .parse::<f32>()
                .map(|o| o < 0.5)
                .unwrap_or(false),
            disabled_attr: probe.disabled,
            disabled_class: probe
                .classes
                .iter()
                .any(|c| c.contains("disabled") || c == "dis" || c.contains("inactive")),
        }
    }

    pub fn any(&self) -> bool {
        self.grayscale
            || self.no_pointer_events
            || self.low_opacity
            || self.disabled_attr
            || self.disabled_class
    }
}

/// State of the login submit button.
#[derive(Debug, Clone)]
pub struct SubmitProbe {
    pub pointer_events: String,
    pub disabled: bool,
}

impl SubmitProbe {
    pub fn clickable(&self) -> bool {
        self.pointer_events != "none" && !self.disabled
    }
}

// Wire shape of SUBMIT_PROBE_JS. The script reports a missing button as
// present=false rather than returning null; a null evaluation result carries
// no value to deserialize.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawSubmitProbe {
    present: bool,
    pointer_events: String,
    disabled: bool,
}

impl RawSubmitProbe {
    fn into_probe(self) -> Option<SubmitProbe> {
        if !self.present {
            return None;
        }
        Some(SubmitProbe {
            pointer_events: self.pointer_events,
            disabled: self.disabled,
        })
    }
}

/// What happened when the agreement checkbox was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgreementState {
    AlreadyChecked,
    Clicked,
    ClickedFallback,
    NotFound,
}

fn agreement_state_from(label: &str) -> AgreementState {
    match label {
        "already" => AgreementState::AlreadyChecked,
        "clicked" => AgreementState::Clicked,
        "fallback" => AgreementState::ClickedFallback,
        _ => AgreementState::NotFound,
    }
}

/// Everything the flows need from the daily-gift page.
#[async_trait]
pub trait GiftPage: Send + Sync {
    /// Wait for the page header to render after navigation.
    async fn wait_ready(&self) -> Result<(), BotError>;

    /// After replaying cookies: wait for the session to reflect in the UI
    /// (sign button present or header text non-empty). `false` on timeout;
    /// the flow continues with the header check either way.
    async fn wait_session_applied(&self) -> Result<bool, BotError>;

    /// Whether the header still offers 登入.
    async fn is_logged_out(&self) -> Result<bool, BotError>;

    async fn body_text(&self) -> Result<String, BotError>;

    /// Click the header login button and wait for the popup.
    async fn open_login_popup(&self) -> Result<(), BotError>;

    /// Switch the popup to account/password mode. `true` when the switch
    /// control was there and got clicked.
    async fn switch_to_account_login(&self) -> Result<bool, BotError>;

    async fn accept_agreement(&self) -> Result<AgreementState, BotError>;

    async fn fill_credentials(&self, username: &str, password: &str) -> Result<(), BotError>;

    /// PNG of the CAPTCHA image, or `None` when no CAPTCHA is shown.
    async fn captcha_image(&self) -> Result<Option<Vec<u8>>, BotError>;

    async fn enter_captcha(&self, code: &str) -> Result<(), BotError>;

    /// Best-effort refresh of the CAPTCHA image. `true` when clicked.
    async fn refresh_captcha(&self) -> Result<bool, BotError>;

    /// Poll until the submit button accepts pointer events.
    async fn wait_submit_enabled(&self, timeout: Duration) -> Result<bool, BotError>;

    /// `None` when no submit button with the exact 登入 label exists.
    async fn submit_probe(&self) -> Result<Option<SubmitProbe>, BotError>;

    async fn click_submit(&self) -> Result<(), BotError>;

    /// Poll until the header stops offering 登入.
    async fn wait_logged_in(&self, timeout: Duration) -> Result<bool, BotError>;

    /// Style probe of the first visible check-in button.
    async fn checkin_button(&self) -> Result<ControlProbe, BotError>;

    /// Click the visible check-in button. `false` when none was visible.
    async fn click_checkin(&self) -> Result<bool, BotError>;

    /// Visible own-text fragments (labels, values) in DOM order.
    async fn visible_texts(&self) -> Result<Vec<String>, BotError>;

    /// Texts of the prize rows.
    async fn prize_texts(&self) -> Result<Vec<String>, BotError>;

    /// Click the visible draw button. `false` when none was visible.
    async fn click_draw(&self) -> Result<bool, BotError>;

    /// Body text with the winners marquee hidden, so other players' prizes
    /// cannot be mistaken for ours.
    async fn result_text(&self) -> Result<String, BotError>;

    /// Open the prize history modal. `false` when the control is missing.
    async fn open_reward_log(&self) -> Result<bool, BotError>;

    async fn screenshot(&self, path: &Path) -> Result<(), BotError>;
}

/// CDP-backed implementation against the live page.
pub struct LiveGiftPage {
    page: chromiumoxide::Page,
}

impl LiveGiftPage {
    pub fn new(page: chromiumoxide::Page) -> Self {
        Self { page }
    }

    async fn eval<T>(&self, js: impl Into<String>) -> Result<T, BotError>
    where
        T: serde::de::DeserializeOwned,
    {
        let value = self.page.evaluate(js.into()).await?.into_value::<T>()?;
        Ok(value)
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), BotError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BotError::Timeout(format!("waiting for selector {selector}")));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Poll a boolean JS condition. `Ok(false)` on timeout.
    async fn wait_for_condition(&self, js: &str, timeout: Duration) -> Result<bool, BotError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.eval::<bool>(js).await? {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

const IS_LOGGED_OUT_JS: &str = r#"(function() {
    const el = document.querySelector('.top-b1');
    return !!el && el.innerText.includes('登入');
})()"#;

const SESSION_APPLIED_JS: &str = r#"(function() {
    const header = document.querySelector('.top-b1');
    const headerText = header ? header.innerText.trim() : '';
    return !!document.querySelector('.sign-btn') || headerText.length > 0;
})()"#;

const SWITCH_MODE_JS: &str = r#"(function() {
    const btns = Array.from(document.querySelectorAll('.login-box .other-login'));
    const target = btns.find(function(b) {
        return b.offsetWidth > 0 && b.offsetHeight > 0 && b.innerText.includes('帳號密碼');
    });
    if (target) { target.click(); return true; }
    return false;
})()"#;

// Two strategies: the radio box next to the agreement text inside the login
// box, then the one nested in a visible .tip-line.
const AGREEMENT_JS: &str = r#"(function() {
    const loginBox = document.querySelector('.login-box');
    if (loginBox) {
        const boxes = Array.from(loginBox.querySelectorAll('.radio-box'));
        for (const box of boxes) {
            if (box.offsetWidth === 0 || box.offsetHeight === 0) continue;
            const parent = box.parentElement;
            if (parent && parent.innerText &&
                (parent.innerText.includes('使用者協議') || parent.innerText.includes('隱私權政策'))) {
                if (box.classList.contains('active') || box.classList.contains('checked')) {
                    return 'already';
                }
                box.click();
                return 'clicked';
            }
        }
    }
    const lines = Array.from(document.querySelectorAll('.tip-line'));
    for (const line of lines) {
        if (line.offsetWidth > 0 && line.offsetHeight > 0 &&
            (line.innerText.includes('使用者協議') || line.innerText.includes('隱私權政策'))) {
            const box = line.querySelector('.radio-box');
            if (box) { box.click(); return 'fallback'; }
        }
    }
    return 'missing';
})()"#;

const CAPTCHA_VISIBLE_JS: &str = r#"(function() {
    const img = document.querySelector('.modal-code img');
    return !!img && img.offsetWidth > 0 && img.offsetHeight > 0;
})()"#;

const REFRESH_CAPTCHA_JS: &str = r#"(function() {
    const btns = Array.from(document.querySelectorAll('.modal-code .refresh, .modal-code .icon-refresh'));
    const target = btns.find(function(b) { return b.offsetWidth > 0 && b.offsetHeight > 0; });
    if (target) { target.click(); return true; }
    return false;
})()"#;

const SUBMIT_ENABLED_JS: &str = r#"(function() {
    const btn = Array.from(document.querySelectorAll('.login-box .login-btn'))
        .find(function(b) { return b.innerText.trim() === '登入'; });
    if (!btn) return false;
    return window.getComputedStyle(btn).pointerEvents !== 'none';
})()"#;

const SUBMIT_PROBE_JS: &str = r#"(function() {
    const btn = Array.from(document.querySelectorAll('.login-box .login-btn'))
        .find(function(b) { return b.innerText.trim() === '登入'; });
    if (!btn) return { present: false, pointerEvents: '', disabled: false };
    const pointerEvents = window.getComputedStyle(btn).pointerEvents;
    const disabled = !!btn.disabled || btn.classList.contains('disabled') || btn.classList.contains('dis');
    return { present: true, pointerEvents: pointerEvents, disabled: disabled };
})()"#;

const CLICK_SUBMIT_JS: &str = r#"(function() {
    const btns = Array.from(document.querySelectorAll('.login-box .login-btn'));
    const target = btns.find(function(b) { return b.innerText.trim() === '登入'; });
    if (target) { target.click(); return true; }
    return false;
})()"#;

const LOGGED_IN_JS: &str = r#"(function() {
    const el = document.querySelector('.top-b1');
    return !el || !el.innerText.includes('登入');
})()"#;

const CHECKIN_PROBE_JS: &str = r#"(function() {
    const btns = Array.from(document.querySelectorAll('.sign-btn'));
    for (const btn of btns) {
        if (btn.offsetWidth > 0 && btn.offsetHeight > 0) {
            const style = window.getComputedStyle(btn);
            return {
                present: true,
                visible: true,
                filter: style.filter || '',
                pointerEvents: style.pointerEvents || '',
                opacity: style.opacity || '1',
                disabled: !!(btn.disabled || btn.hasAttribute('disabled')),
                classes: Array.from(btn.classList)
            };
        }
    }
    return { present: false, visible: false, filter: '', pointerEvents: '',
             opacity: '1', disabled: false, classes: [] };
})()"#;

const CLICK_CHECKIN_JS: &str = r#"(function() {
    const btns = Array.from(document.querySelectorAll('.sign-btn'));
    for (const btn of btns) {
        if (btn.offsetWidth > 0 && btn.offsetHeight > 0) { btn.click(); return true; }
    }
    return false;
})()"#;

// Own text only: children are stripped from a clone so a container does not
// swallow its labels. Long fragments are layout, not values.
const VISIBLE_TEXTS_JS: &str = r#"(function() {
    const out = [];
    const els = document.querySelectorAll('div, span, p, label, li, b, strong');
    for (const el of els) {
        if (el.offsetWidth === 0 || el.offsetHeight === 0) continue;
        const clone = el.cloneNode(true);
        Array.from(clone.children).forEach(function(c) { c.remove(); });
        const text = clone.innerText ? clone.innerText.trim() : '';
        if (!text || text.length > 50) continue;
        out.push(text);
    }
    return out;
})()"#;

const PRIZE_TEXTS_JS: &str = r#"(function() {
    return Array.from(document.querySelectorAll('.points-show-box-name'))
        .map(function(el) { return el.innerText || el.textContent || ''; });
})()"#;

const CLICK_DRAW_JS: &str = r#"(function() {
    const btns = Array.from(document.querySelectorAll('.points-draw'));
    for (const btn of btns) {
        if (btn.offsetWidth > 0 && btn.offsetHeight > 0) { btn.click(); return true; }
    }
    return false;
})()"#;

const RESULT_TEXT_JS: &str = r#"(function() {
    const marquee = document.querySelector('.points-left-title');
    if (marquee) marquee.style.display = 'none';
    const text = document.body.innerText;
    if (marquee) marquee.style.display = '';
    return text;
})()"#;

const OPEN_REWARD_LOG_JS: &str = r#"(function() {
    const btns = Array.from(document.querySelectorAll('.points-reward-log'));
    const target = btns.find(function(b) { return b.offsetWidth > 0 && b.offsetHeight > 0; });
    if (target) { target.click(); return true; }
    return false;
})()"#;

#[async_trait]
impl GiftPage for LiveGiftPage {
    async fn wait_ready(&self) -> Result<(), BotError> {
        self.wait_for_selector(HEADER_LOGIN, READY_TIMEOUT).await
    }

    async fn wait_session_applied(&self) -> Result<bool, BotError> {
        self.wait_for_condition(SESSION_APPLIED_JS, SESSION_APPLY_TIMEOUT)
            .await
    }

    async fn is_logged_out(&self) -> Result<bool, BotError> {
        self.eval(IS_LOGGED_OUT_JS).await
    }

    async fn body_text(&self) -> Result<String, BotError> {
        self.eval("document.body.innerText").await
    }

    async fn open_login_popup(&self) -> Result<(), BotError> {
        self.page.find_element(HEADER_LOGIN).await?.click().await?;
        self.wait_for_selector(LOGIN_BOX, POPUP_TIMEOUT).await
    }

    async fn switch_to_account_login(&self) -> Result<bool, BotError> {
        self.eval(SWITCH_MODE_JS).await
    }

    async fn accept_agreement(&self) -> Result<AgreementState, BotError> {
        let label: String = self.eval(AGREEMENT_JS).await?;
        Ok(agreement_state_from(&label))
    }

    async fn fill_credentials(&self, username: &str, password: &str) -> Result<(), BotError> {
        // The password field confirms the popup is in account mode; its
        // absence is survivable because the fill itself reports failure.
        if self
            .wait_for_selector(PASSWORD_INPUT, PASSWORD_FIELD_TIMEOUT)
            .await
            .is_err()
        {
            warn!("password field not immediately found, filling anyway");
        }
        let js = format!(
            r#"(function() {{
    const user = document.querySelector('input[placeholder*="信箱"]');
    const pass = document.querySelector('input[placeholder="請輸入密碼"]');
    if (!user || !pass) return false;
    const pairs = [[user, {username}], [pass, {password}]];
    for (const pair of pairs) {{
        const el = pair[0];
        el.focus();
        el.value = pair[1];
        el.dispatchEvent(new Event('input', {{ bubbles: true }}));
        el.dispatchEvent(new Event('change', {{ bubbles: true }}));
    }}
    return true;
}})()"#,
            username = serde_json::to_string(username)?,
            password = serde_json::to_string(password)?,
        );
        let filled: bool = self.eval(js).await?;
        if !filled {
            return Err(BotError::ElementNotFound(
                "login credential inputs".to_string(),
            ));
        }
        Ok(())
    }

    async fn captcha_image(&self) -> Result<Option<Vec<u8>>, BotError> {
        if !self.eval::<bool>(CAPTCHA_VISIBLE_JS).await? {
            return Ok(None);
        }
        let element = self.page.find_element(CAPTCHA_IMAGE).await?;
        let bytes = element
            .screenshot(
                chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat::Png,
            )
            .await?;
        Ok(Some(bytes))
    }

    async fn enter_captcha(&self, code: &str) -> Result<(), BotError> {
        let js = format!(
            r#"(function() {{
    const input = document.querySelector('input[placeholder="請輸入驗證碼"]');
    if (!input) return false;
    input.focus();
    input.value = {code};
    input.dispatchEvent(new Event('input', {{ bubbles: true }}));
    input.dispatchEvent(new Event('change', {{ bubbles: true }}));
    return true;
}})()"#,
            code = serde_json::to_string(code)?,
        );
        let filled: bool = self.eval(js).await?;
        if !filled {
            return Err(BotError::ElementNotFound("CAPTCHA input".to_string()));
        }
        Ok(())
    }

    async fn refresh_captcha(&self) -> Result<bool, BotError> {
        self.eval(REFRESH_CAPTCHA_JS).await
    }

    async fn wait_submit_enabled(&self, timeout: Duration) -> Result<bool, BotError> {
        self.wait_for_condition(SUBMIT_ENABLED_JS, timeout).await
    }

    async fn submit_probe(&self) -> Result<Option<SubmitProbe>, BotError> {
        let probe: RawSubmitProbe = self.eval(SUBMIT_PROBE_JS).await?;
        Ok(probe.into_probe())
    }

    async fn click_submit(&self) -> Result<(), BotError> {
        if self.eval::<bool>(CLICK_SUBMIT_JS).await? {
            return Ok(());
        }
        // JS missed it; fall back to a real element click.
        debug!("JS click missed the submit button, trying element click");
        let elements = self.page.find_elements(LOGIN_SUBMIT).await?;
        for element in elements {
            if let Ok(Some(text)) = element.inner_text().await {
                if text.trim() == "登入" {
                    element.click().await?;
                    return Ok(());
                }
            }
        }
        Err(BotError::ElementNotFound(format!(
            "{LOGIN_SUBMIT} with 登入 label"
        )))
    }

    async fn wait_logged_in(&self, timeout: Duration) -> Result<bool, BotError> {
        self.wait_for_condition(LOGGED_IN_JS, timeout).await
    }

    async fn checkin_button(&self) -> Result<ControlProbe, BotError> {
        self.eval(CHECKIN_PROBE_JS).await
    }

    async fn click_checkin(&self) -> Result<bool, BotError> {
        self.eval(CLICK_CHECKIN_JS).await
    }

    async fn visible_texts(&self) -> Result<Vec<String>, BotError> {
        self.eval(VISIBLE_TEXTS_JS).await
    }

    async fn prize_texts(&self) -> Result<Vec<String>, BotError> {
        self.eval(PRIZE_TEXTS_JS).await
    }

    async fn click_draw(&self) -> Result<bool, BotError> {
        self.eval(CLICK_DRAW_JS).await
    }

    async fn result_text(&self) -> Result<String, BotError> {
        self.eval(RESULT_TEXT_JS).await
    }

    async fn open_reward_log(&self) -> Result<bool, BotError> {
        self.eval(OPEN_REWARD_LOG_JS).await
    }

    async fn screenshot(&self, path: &Path) -> Result<(), BotError> {
        capture_full_page(&self.page, path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_probe() -> ControlProbe {
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

    #[test]
    fn pristine_button_is_enabled() {
        let signals = DisabledSignals::evaluate(&enabled_probe());
        assert!(!signals.any());
    }

    #[test]
    fn low_opacity_disables() {
        let probe = ControlProbe {
            opacity: "0.3".into(),
            ..enabled_probe()
        };
        let signals = DisabledSignals::evaluate(&probe);
        assert!(signals.low_opacity);
        assert!(signals.any());
    }

    #[test]
    fn half_opacity_is_still_enabled() {
        let probe = ControlProbe {
            opacity: "0.5".into(),
            ..enabled_probe()
        };
        assert!(!DisabledSignals::evaluate(&probe).any());
    }

    #[test]
    fn grayscale_filter_disables() {
        let probe = ControlProbe {
            filter: "grayscale(1)".into(),
            ..enabled_probe()
        };
        let signals = DisabledSignals::evaluate(&probe);
        assert!(signals.grayscale);
        assert!(signals.any());
    }

    #[test]
    fn pointer_events_none_disables() {
        let probe = ControlProbe {
            pointer_events: "none".into(),
            ..enabled_probe()
        };
        assert!(DisabledSignals::evaluate(&probe).no_pointer_events);
    }

    #[test]
    fn disabled_attribute_disables() {
        let probe = ControlProbe {
            disabled: true,
            ..enabled_probe()
        };
        assert!(DisabledSignals::evaluate(&probe).disabled_attr);
    }

    #[test]
    fn class_tokens_disable() {
        for class in ["disabled", "dis", "btn-inactive"] {
            let probe = ControlProbe {
                classes: vec![class.to_string()],
                ..enabled_probe()
            };
            assert!(
                DisabledSignals::evaluate(&probe).disabled_class,
                "class {class} should disable"
            );
        }
        let probe = ControlProbe {
            classes: vec!["distinct".to_string()],
            ..enabled_probe()
        };
        assert!(!DisabledSignals::evaluate(&probe).disabled_class);
    }

    #[test]
    fn unparsable_opacity_does_not_disable() {
        let probe = ControlProbe {
            opacity: "".into(),
            ..enabled_probe()
        };
        assert!(!DisabledSignals::evaluate(&probe).low_opacity);
    }

    #[test]
    fn submit_probe_clickable() {
        let probe = SubmitProbe {
            pointer_events: "auto".into(),
            disabled: false,
        };
        assert!(probe.clickable());
        let probe = SubmitProbe {
            pointer_events: "none".into(),
            disabled: false,
        };
        assert!(!probe.clickable());
        let probe = SubmitProbe {
            pointer_events: "auto".into(),
            disabled: true,
        };
        assert!(!probe.clickable());
    }

    #[test]
    fn absent_submit_button_maps_to_none() {
        let absent: RawSubmitProbe = serde_json::from_value(serde_json::json!({
            "present": false, "pointerEvents": "", "disabled": false
        }))
        .unwrap();
        assert!(absent.into_probe().is_none());

        let present: RawSubmitProbe = serde_json::from_value(serde_json::json!({
            "present": true, "pointerEvents": "auto", "disabled": false
        }))
        .unwrap();
        let probe = present.into_probe().expect("present button yields a probe");
        assert!(probe.clickable());
    }

    #[test]
    fn agreement_labels_map() {
        assert_eq!(agreement_state_from("already"), AgreementState::AlreadyChecked);
        assert_eq!(agreement_state_from("clicked"), AgreementState::Clicked);
        assert_eq!(agreement_state_from("fallback"), AgreementState::ClickedFallback);
        assert_eq!(agreement_state_from("missing"), AgreementState::NotFound);
        assert_eq!(agreement_state_from("?"), AgreementState::NotFound);
    }
}
