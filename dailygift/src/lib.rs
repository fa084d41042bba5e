//! Browser automation for the UMA daily-gift event page.
//!
//! One [`run`] performs the whole daily routine: restore the saved session,
//! log in (solving the CAPTCHA with Gemini when a key is configured), claim
//! the daily check-in, spend points on a lottery draw when stock allows, and
//! append a structured report to the daily summary log.
//!
//! The page specifics live behind [`GiftPage`], the CAPTCHA service behind
//! [`CaptchaSolver`] and popups behind [`Notifier`], so each flow can be
//! driven against fakes in tests.

pub mod browser;
pub mod captcha;
pub mod checkin;
pub mod config;
pub mod cookies;
pub mod errors;
pub mod login;
pub mod lottery;
pub mod notify;
pub mod page;
pub mod parse;
pub mod run;
pub mod summary;

pub use browser::BrowserSession;
pub use captcha::{CaptchaSolver, GeminiSolver};
pub use config::{Config, TARGET_URL};
pub use cookies::{CookieStore, StoredCookie};
pub use errors::BotError;
pub use login::{ensure_logged_in, LoginOutcome};
pub use notify::{Notifier, NotifyKind, SystemNotifier};
pub use page::{AgreementState, ControlProbe, DisabledSignals, GiftPage, LiveGiftPage, SubmitProbe};
pub use parse::{PointsSummary, PrizeStock};
pub use run::{run, run_with};
pub use summary::{
    CheckInRecord, CheckInStatus, DailySummary, LoginType, LotteryStatus, RunOutcome,
};
