//! Pure text parsing for what the event page renders: check-in counters,
//! points balances, prize stock lines and lottery results.
//!
//! Everything here operates on plain strings handed over by the page
//! adapter, so the decision logic stays testable without a browser.

use once_cell::sync::Lazy;
use regex::Regex;

static DAY_COUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"本月已累計簽到\s*(\d+)\s*天").expect("valid day count regex"));

static FIRST_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)").expect("valid regex"));

static CURRENT_FALLBACK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"本年度積分[：:\s]*(\d+)").expect("valid regex"));

static EXPIRING_FALLBACK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"即將過期積分[：:\s]*(\d+)").expect("valid regex"));

static PRIZE_STOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"剩餘[：:]?\s*(\d+)").expect("valid stock regex"));

/// Lottery result patterns, most specific first. The whole match is what
/// gets logged, not just the prize name.
static RESULT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"恭喜.*?獲得.*?【(.+?)】",
        r"抽中了【(.+?)】",
        r"獲得.*?【(.+?)】",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid result regex"))
    .collect()
});

static HISTORY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"抽中了【(.+?)】").expect("valid regex"));

const CURRENT_KEYWORDS: [&str; 2] = ["本年度積分", "今年積分"];
const EXPIRING_KEYWORDS: [&str; 3] = ["即將過期積分", "即將到期", "過期積分"];
const TOTAL_KEYWORDS: [&str; 2] = ["總積分", "剩餘積分"];

/// Fragments longer than this are layout containers, not value labels.
const MAX_FRAGMENT_CHARS: usize = 50;

/// Points balances scraped from the lottery section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointsSummary {
    pub current_year: u32,
    pub expiring: u32,
    pub total: u32,
}

/// One prize row from the stock list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrizeStock {
    pub name: String,
    pub remaining: u32,
    pub has_stock: bool,
}

/// Monthly check-in counter (`本月已累計簽到 N 天`), if the page shows one.
pub fn checkin_day_count(text: &str) -> Option<u32> {
    let caps = DAY_COUNT_RE.captures(text)?;
    caps.get(1)?.as_str().parse().ok()
}

/// Whether the page text claims the day is already claimed. Diagnostic
/// only: the check-in decision itself reads the button state.
pub fn mentions_checked_in(text: &str) -> bool {
    text.contains("已簽到") || text.contains("已累計簽到")
}

/// First integer anywhere in `text`.
pub fn first_number(text: &str) -> Option<u32> {
    let caps = FIRST_NUMBER_RE.captures(text)?;
    caps.get(1)?.as_str().parse().ok()
}

/// Extract the points balances.
///
/// `fragments` are the visible own-text snippets collected from the page in
/// DOM order; a fragment that carries one of the keywords contributes its
/// first integer (later fragments override earlier ones). When the keyword
/// scan comes up short, whole-page regexes fill the gaps. A missing value
/// defaults to 0, and without an explicit total the total is
/// current + expiring.
pub fn points_summary<'a, I>(fragments: I, body_text: &str) -> PointsSummary
where
    I: IntoIterator<Item = &'a str>,
{
    let mut current: Option<u32> = None;
    let mut expiring: Option<u32> = None;
    let mut total: Option<u32> = None;

    for fragment in fragments {
        let fragment = fragment.trim();
        if fragment.is_empty() || fragment.chars().count() > MAX_FRAGMENT_CHARS {
            continue;
        }
        if CURRENT_KEYWORDS.iter().any(|k| fragment.contains(k)) {
            if let Some(n) = first_number(fragment) {
                current = Some(n);
            }
        }
        if EXPIRING_KEYWORDS.iter().any(|k| fragment.contains(k)) {
            if let Some(n) = first_number(fragment) {
                expiring = Some(n);
            }
        }
        if TOTAL_KEYWORDS.iter().any(|k| fragment.contains(k)) {
            if let Some(n) = first_number(fragment) {
                total = Some(n);
            }
        }
    }

    if current.is_none() {
        current = CURRENT_FALLBACK_RE
            .captures(body_text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok());
    }
    if expiring.is_none() {
        expiring = EXPIRING_FALLBACK_RE
            .captures(body_text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok());
    }

    let current_year = current.unwrap_or(0);
    let expiring = expiring.unwrap_or(0);
    let total = total.unwrap_or_else(|| current_year.saturating_add(expiring));

    PointsSummary {
        current_year,
        expiring,
        total,
    }
}

/// Parse the prize rows (`.points-show-box-name` texts). Rows that mention
/// neither a remaining count nor a sold-out marker are skipped.
pub fn prize_stocks(texts: &[String]) -> Vec<PrizeStock> {
    let mut prizes = Vec::new();
    for text in texts {
        if let Some(caps) = PRIZE_STOCK_RE.captures(text) {
            let remaining: u32 = match caps.get(1).and_then(|m| m.as_str().parse().ok()) {
                Some(n) => n,
                None => continue,
            };
            let name = text.split("剩餘").next().unwrap_or("").trim().to_string();
            prizes.push(PrizeStock {
                name,
                remaining,
                has_stock: remaining > 0,
            });
        } else if text.contains("已抽完") {
            let name = text.split("已抽完").next().unwrap_or("").trim().to_string();
            prizes.push(PrizeStock {
                name,
                remaining: 0,
                has_stock: false,
            });
        }
    }
    prizes
}

pub fn has_any_stock(prizes: &[PrizeStock]) -> bool {
    prizes.iter().any(|p| p.has_stock)
}

/// Match the draw result announcement in the page text, most specific
/// pattern first.
pub fn lottery_result(text: &str) -> Option<String> {
    for pattern in RESULT_PATTERNS.iter() {
        if let Some(m) = pattern.find(text) {
            return Some(m.as_str().to_string());
        }
    }
    None
}

/// Match the newest entry in the prize history modal.
pub fn history_result(text: &str) -> Option<String> {
    HISTORY_RE.find(text).map(|m| m.as_str().to_string())
}
