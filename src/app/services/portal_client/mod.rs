//! Salt Portal HTTP client
//!
//! Signs in, then fetches the station roster and the per-station exports the
//! backup needs. The pipeline talks to the portal only through the
//! [`PortalSource`] trait so it can be driven by any implementation.

use crate::app::models::{Project, Roster, Station};
use crate::app::services::roster::parse_roster;
use crate::config::PortalConfig;
use crate::constants::{
    ROSTER_PATH, group_csv_path, project_page_path, station_calibrations_path,
    station_measurements_path, station_page_path,
};
use crate::{Error, Result};
use reqwest::Url;
use reqwest::cookie::{CookieStore, Jar};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub mod auth;
pub mod headers;

use headers::{RequestHeaders, cookie_header};

/// Portal login credentials
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Result of a successful login
///
/// The anti-forgery token must accompany every later request in the Cookie
/// header, so it travels with the session rather than living in shared state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSession {
    pub username: String,
    pub csrf_token: String,
    /// Portal semantic version shown after sign-in
    pub portal_version: String,
}

/// The three per-station payloads fetched before correlation
#[derive(Debug, Clone, Default)]
pub struct StationExports {
    pub measurements_csv: Vec<u8>,
    pub calibrations_csv: Vec<u8>,
    pub station_html: String,
}

/// Source of portal data for a backup run
#[allow(async_fn_in_trait)]
pub trait PortalSource {
    /// Portal origin, used to absolutise links found in pages
    fn base_url(&self) -> &str;

    /// Sign in and obtain the anti-forgery token
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthenticatedSession>;

    /// Organisation-wide roster of projects and stations
    async fn fetch_roster(&self, session: &AuthenticatedSession) -> Result<Roster>;

    /// Measurements CSV, calibrations CSV and HTML page of one station
    async fn fetch_station_exports(
        &self,
        session: &AuthenticatedSession,
        project: &Project,
        station: &Station,
    ) -> Result<StationExports>;

    /// CSV of a single measurement, from a download link found on the station page
    async fn fetch_measurement_csv(
        &self,
        session: &AuthenticatedSession,
        station: &Station,
        download_url: &str,
    ) -> Result<Vec<u8>>;

    /// Summary CSV of a measurement group
    async fn fetch_group_csv(
        &self,
        session: &AuthenticatedSession,
        station: &Station,
        group_id: i64,
    ) -> Result<Vec<u8>>;
}

/// HTTP implementation of [`PortalSource`]
pub struct PortalClient {
    config: PortalConfig,
    http: reqwest::Client,
    jar: Arc<Jar>,
}

impl PortalClient {
    /// Create a client with an empty cookie jar
    pub fn new(config: PortalConfig) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .cookie_provider(Arc::clone(&jar))
            .build()
            .map_err(|e| Error::fetch(config.base_url.clone(), e))?;

        Ok(Self { config, http, jar })
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    /// Cookie header for a request to `url`: session cookies plus the token
    fn session_cookie(&self, url: &str, csrf_token: &str) -> String {
        let jar_cookies = Url::parse(url)
            .ok()
            .and_then(|parsed| self.jar.cookies(&parsed))
            .and_then(|value| value.to_str().map(str::to_string).ok());
        cookie_header(jar_cookies.as_deref(), csrf_token)
    }

    /// GET a portal URL and return the body bytes
    async fn get_bytes(&self, url: &str, referer: &str, session: &AuthenticatedSession) -> Result<Vec<u8>> {
        let headers = RequestHeaders::new()
            .with_referer(referer)
            .with_cookie(self.session_cookie(url, &session.csrf_token))
            .build()?;

        debug!(url = %url, referer = %referer, "GET");

        let response = self
            .http
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| Error::fetch(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch_status(url, status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| Error::fetch(url, e))?;
        debug!(url = %url, bytes = body.len(), "Received");
        Ok(body.to_vec())
    }

    async fn get_text(&self, url: &str, referer: &str, session: &AuthenticatedSession) -> Result<String> {
        let bytes = self.get_bytes(url, referer, session).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl PortalSource for PortalClient {
    fn base_url(&self) -> &str {
        &self.config.base_url
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthenticatedSession> {
        self.login(credentials).await
    }

    async fn fetch_roster(&self, session: &AuthenticatedSession) -> Result<Roster> {
        let url = self.config.url(ROSTER_PATH);
        let referer = self.config.url("/");
        let raw = self.get_bytes(&url, &referer, session).await?;
        parse_roster(raw)
    }

    async fn fetch_station_exports(
        &self,
        session: &AuthenticatedSession,
        project: &Project,
        station: &Station,
    ) -> Result<StationExports> {
        let station_page = self.config.url(&station_page_path(station.id));
        let project_page = self.config.url(&project_page_path(project.id));

        let measurements_csv = self
            .get_bytes(
                &self.config.url(&station_measurements_path(station.id)),
                &station_page,
                session,
            )
            .await?;
        let calibrations_csv = self
            .get_bytes(
                &self.config.url(&station_calibrations_path(station.id)),
                &station_page,
                session,
            )
            .await?;
        let station_html = self.get_text(&station_page, &project_page, session).await?;

        Ok(StationExports {
            measurements_csv,
            calibrations_csv,
            station_html,
        })
    }

    async fn fetch_measurement_csv(
        &self,
        session: &AuthenticatedSession,
        station: &Station,
        download_url: &str,
    ) -> Result<Vec<u8>> {
        let referer = self.config.url(&station_page_path(station.id));
        self.get_bytes(download_url, &referer, session).await
    }

    async fn fetch_group_csv(
        &self,
        session: &AuthenticatedSession,
        station: &Station,
        group_id: i64,
    ) -> Result<Vec<u8>> {
        let referer = self.config.url(&station_page_path(station.id));
        self.get_bytes(&self.config.url(&group_csv_path(group_id)), &referer, session)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_redacts_password() {
        let credentials = Credentials::new("tech", "hunter2");
        let printed = format!("{:?}", credentials);
        assert!(printed.contains("tech"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn test_session_cookie_without_jar_entries() {
        let client = PortalClient::new(PortalConfig::default()).unwrap();
        assert_eq!(
            client.session_cookie("https://wit.fathomscientific.com/station/1/", "tok"),
            "csrftoken=tok"
        );
    }

    #[test]
    fn test_session_cookie_merges_jar_entries() {
        let client = PortalClient::new(PortalConfig::default()).unwrap();
        let url = Url::parse("https://wit.fathomscientific.com/").unwrap();
        client.jar.add_cookie_str("sessionid=abc; Path=/", &url);

        assert_eq!(
            client.session_cookie("https://wit.fathomscientific.com/station/1/", "tok"),
            "sessionid=abc; csrftoken=tok"
        );
    }
}
