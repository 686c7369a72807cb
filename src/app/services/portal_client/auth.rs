//! Login handshake
//!
//! The login page carries the anti-forgery token in a hidden form field. The
//! token is posted back with the credentials and must then accompany every
//! later request in the Cookie header.

use super::headers::RequestHeaders;
use super::{AuthenticatedSession, Credentials, PortalClient};
use crate::app::services::station_page::{
    has_list_item_containing, input_value, paragraph_after_div,
};
use crate::constants::{
    CSRF_FORM_FIELD, LOGIN_PATH, LOGIN_REFERER_PATH, PORTAL_VERSION_PREFIX, SIDENAV_CLASS,
    SIGNED_IN_MARKER,
};
use crate::{Error, Result};
use tracing::{debug, info};

/// Anti-forgery token from the login page
pub fn extract_csrf_token(login_page: &str, url: &str) -> Result<String> {
    input_value(login_page, CSRF_FORM_FIELD)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            Error::protocol(
                url,
                format!("Login page has no '{}' field", CSRF_FORM_FIELD),
            )
        })
}

/// Check the page returned by the login post and read the portal version off it
pub fn verify_landing_page(landing_page: &str, url: &str) -> Result<String> {
    if !has_list_item_containing(landing_page, SIGNED_IN_MARKER) {
        return Err(Error::authentication(
            "portal did not confirm the sign-in; check username and password",
        ));
    }

    paragraph_after_div(landing_page, SIDENAV_CLASS, PORTAL_VERSION_PREFIX)
        .filter(|version| !version.is_empty())
        .ok_or_else(|| Error::protocol(url, "Portal version not found in side navigation"))
}

impl PortalClient {
    /// Sign in with the given credentials
    pub(super) async fn login(&self, credentials: &Credentials) -> Result<AuthenticatedSession> {
        let login_url = self.config.url(LOGIN_PATH);

        debug!("Fetching login page {}", login_url);
        let login_page = self
            .http
            .get(&login_url)
            .headers(RequestHeaders::new().build()?)
            .send()
            .await
            .map_err(|e| Error::fetch(&login_url, e))?;
        let status = login_page.status();
        if !status.is_success() {
            return Err(Error::fetch_status(&login_url, status.as_u16()));
        }
        let login_page = login_page
            .text()
            .await
            .map_err(|e| Error::fetch(&login_url, e))?;

        let csrf_token = extract_csrf_token(&login_page, &login_url)?;
        debug!("Obtained anti-forgery token");

        let form = [
            ("_method", "login"),
            (CSRF_FORM_FIELD, csrf_token.as_str()),
            ("login", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
            ("next", "/"),
        ];

        let headers = RequestHeaders::new()
            .with_referer(self.config.url(LOGIN_REFERER_PATH))
            .with_origin(self.config.base_url.clone())
            .with_cookie(self.session_cookie(&login_url, &csrf_token))
            .build()?;

        let response = self
            .http
            .post(&login_url)
            .headers(headers)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::fetch(&login_url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch_status(&login_url, status.as_u16()));
        }
        let landing_page = response
            .text()
            .await
            .map_err(|e| Error::fetch(&login_url, e))?;

        let portal_version = verify_landing_page(&landing_page, &login_url)?;
        info!(
            "Signed in to Salt Portal {} as {}",
            portal_version, credentials.username
        );

        Ok(AuthenticatedSession {
            username: credentials.username.clone(),
            csrf_token,
            portal_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_PAGE: &str = r#"<form method="post" action="/accounts/login/">
        <input type="hidden" name="csrfmiddlewaretoken" value="T0kEn">
        <input type="text" name="login"><input type="password" name="password">
        </form>"#;

    const LANDING_PAGE: &str = r#"<div class="wh-sidenav-content">
        <ul><li><a href="/">Home</a></li></ul>
        <p>Salt Portal 3.2.1</p></div>
        <ul class="messages"><li class="alert">Successfully signed in as tech.</li></ul>"#;

    #[test]
    fn test_extract_csrf_token() {
        assert_eq!(extract_csrf_token(LOGIN_PAGE, "login").unwrap(), "T0kEn");
    }

    #[test]
    fn test_missing_token_is_protocol_error() {
        let result = extract_csrf_token("<form><input name=\"login\"></form>", "login");
        assert!(matches!(result, Err(Error::Protocol { .. })));
    }

    #[test]
    fn test_landing_page_yields_version() {
        assert_eq!(verify_landing_page(LANDING_PAGE, "login").unwrap(), "3.2.1");
    }

    #[test]
    fn test_rejected_login_is_authentication_error() {
        let page = r#"<ul class="errorlist"><li>The username and/or password you specified are not correct.</li></ul>"#;
        assert!(matches!(
            verify_landing_page(page, "login"),
            Err(Error::Authentication { .. })
        ));
    }

    #[test]
    fn test_signed_in_without_version_is_protocol_error() {
        let page = "<ul><li>Successfully signed in as tech.</li></ul>";
        assert!(matches!(
            verify_landing_page(page, "login"),
            Err(Error::Protocol { .. })
        ));
    }
}
