//! JSON-file persistence for browser cookies.
//!
//! The on-disk keys are camelCase, the same shape Playwright writes, so
//! jars saved by the previous deployment of this bot load unchanged.

use std::path::{Path, PathBuf};

use chromiumoxide::cdp::browser_protocol::network::{
    Cookie, CookieParam, CookieSameSite, TimeSinceEpoch,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::BotError;

/// One persisted cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    /// Seconds since the epoch; absent for session cookies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

impl StoredCookie {
    /// Capture a CDP cookie. CDP reports `-1` for session cookies.
    pub fn from_cdp(cookie: &Cookie) -> Self {
        Self {
            name: cookie.name.clone(),
            value: cookie.value.clone(),
            domain: cookie.domain.clone(),
            path: cookie.path.clone(),
            expires: (cookie.expires >= 0.0).then_some(cookie.expires),
            http_only: cookie.http_only,
            secure: cookie.secure,
            same_site: cookie.same_site.as_ref().map(same_site_label),
        }
    }

    /// Build the CDP param that replays this cookie into a fresh browser.
    pub fn to_param(&self) -> CookieParam {
        let mut param = CookieParam::new(self.name.clone(), self.value.clone());
        param.domain = Some(self.domain.clone());
        param.path = Some(self.path.clone());
        param.secure = Some(self.secure);
        param.http_only = Some(self.http_only);
        // Playwright jars mark session cookies with -1; CDP wants the field
        // absent instead.
        param.expires = self
            .expires
            .filter(|expires| *expires >= 0.0)
            .map(TimeSinceEpoch::new);
        param.same_site = self.same_site.as_deref().and_then(same_site_from_label);
        param
    }
}

fn same_site_label(same_site: &CookieSameSite) -> String {
    match same_site {
        CookieSameSite::Strict => "Strict",
        CookieSameSite::Lax => "Lax",
        CookieSameSite::None => "None",
    }
    .to_string()
}

fn same_site_from_label(label: &str) -> Option<CookieSameSite> {
    match label {
        "Strict" => Some(CookieSameSite::Strict),
        "Lax" => Some(CookieSameSite::Lax),
        "None" => Some(CookieSameSite::None),
        _ => None,
    }
}

/// Split a raw `name=value; name2=value2` header string into pairs.
/// Malformed fragments are dropped.
pub fn parse_cookie_pairs(raw: &str) -> Vec<(String, String)> {
    raw.split(';')
        .filter_map(|part| {
            let (name, value) = part.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Load/save a cookie jar at a fixed path.
pub struct CookieStore {
    path: PathBuf,
}

impl CookieStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when no jar has been written yet. A jar that exists but
    /// cannot be parsed is an error; the caller decides whether that is
    /// fatal (the run treats it as "no cookies" and logs it).
    pub fn load(&self) -> Result<Option<Vec<StoredCookie>>, BotError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)?;
        let cookies: Vec<StoredCookie> = serde_json::from_str(&raw)
            .map_err(|e| BotError::CookieJar(format!("{}: {e}", self.path.display())))?;
        debug!(count = cookies.len(), path = %self.path.display(), "cookie jar loaded");
        Ok(Some(cookies))
    }

    pub fn save(&self, cookies: &[StoredCookie]) -> Result<(), BotError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(cookies)?;
        std::fs::write(&self.path, json)?;
        debug!(count = cookies.len(), path = %self.path.display(), "cookie jar saved");
        Ok(())
    }
}
