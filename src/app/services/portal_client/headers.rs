//! Per-request header construction
//!
//! Every request gets a fresh header map built from the fixed browser-like
//! set plus the fields that vary between calls (Referer, Cookie). Nothing is
//! shared or mutated across requests.

use crate::constants::{BASE_HEADERS, CSRF_COOKIE_NAME};
use crate::{Error, Result};
use reqwest::header::{COOKIE, HeaderMap, HeaderName, HeaderValue, ORIGIN, REFERER};

/// The varying parts of one request's headers
#[derive(Debug, Clone, Default)]
pub struct RequestHeaders {
    pub referer: Option<String>,
    pub origin: Option<String>,
    pub cookie: Option<String>,
}

impl RequestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    /// Combine with the fixed header set into a header map
    pub fn build(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::with_capacity(BASE_HEADERS.len() + 3);

        for &(name, value) in BASE_HEADERS {
            headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }

        if let Some(referer) = &self.referer {
            headers.insert(REFERER, header_value("Referer", referer)?);
        }
        if let Some(origin) = &self.origin {
            headers.insert(ORIGIN, header_value("Origin", origin)?);
        }
        if let Some(cookie) = &self.cookie {
            headers.insert(COOKIE, header_value("Cookie", cookie)?);
        }

        Ok(headers)
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| {
        Error::configuration(format!("Invalid value for {} header: {:?}", name, value))
    })
}

/// Cookie header carrying the anti-forgery token alongside the session cookies
///
/// `session_cookies` is the jar's `name=value; ...` string for the target URL,
/// if any. The token is appended unless the jar already carries it.
pub fn cookie_header(session_cookies: Option<&str>, csrf_token: &str) -> String {
    let token_pair = format!("{}={}", CSRF_COOKIE_NAME, csrf_token);

    match session_cookies.map(str::trim).filter(|c| !c.is_empty()) {
        None => token_pair,
        Some(cookies) => {
            let has_token = cookies
                .split(';')
                .any(|pair| pair.trim().starts_with(&format!("{}=", CSRF_COOKIE_NAME)));
            if has_token {
                cookies.to_string()
            } else {
                format!("{}; {}", cookies, token_pair)
            }
        }
    }
}
