use crate::adapters::spreadsheet::parse_snapshot;
use crate::core::{ConfigProvider, Snapshot, SnapshotSource};
use crate::utils::error::{Result, TrackerError};
use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, ORIGIN, REFERER, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";
const BROWSER_ACCEPT_LANGUAGE: &str = "ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7";

#[derive(Serialize)]
struct LoginPayload<'a> {
    #[serde(rename = "_u")]
    username: &'a str,
    #[serde(rename = "_p")]
    password: &'a str,
}

/// Logs into the merchant cabinet and downloads the unrecognized product export.
///
/// Both clients share one cookie jar: the login call must not follow
/// redirects, everything after it does.
pub struct MarketplaceClient<C: ConfigProvider> {
    config: C,
    jar: Arc<Jar>,
    client: Client,
    login_client: Client,
    save_to: Option<PathBuf>,
}

impl<C: ConfigProvider> MarketplaceClient<C> {
    pub fn new(config: C) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let headers = browser_headers(config.user_agent())?;
        let timeout = Duration::from_secs(config.request_timeout_seconds());

        let client = Client::builder()
            .cookie_provider(jar.clone())
            .default_headers(headers.clone())
            .timeout(timeout)
            .build()?;
        let login_client = Client::builder()
            .cookie_provider(jar.clone())
            .default_headers(headers)
            .redirect(Policy::none())
            .timeout(timeout)
            .build()?;

        Ok(Self {
            config,
            jar,
            client,
            login_client,
            save_to: None,
        })
    }

    /// Keep a copy of every downloaded export at `path`.
    pub fn with_save_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_to = Some(path.into());
        self
    }

    pub async fn download_export(&self) -> Result<Vec<u8>> {
        self.login().await?;
        self.follow_continue().await?;
        self.authorize_cabinet().await?;
        self.ensure_session_cookie()?;

        tracing::info!("Step 4: downloading export");
        let response = self
            .client
            .get(self.config.download_url())
            .header(REFERER, self.config.referer())
            .send()
            .await?;
        let status = response.status();
        tracing::info!("Download status: {}", status);
        if status != StatusCode::OK {
            return Err(TrackerError::DownloadFailed {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?.to_vec();
        tracing::debug!("Downloaded {} bytes", bytes.len());

        if let Some(path) = &self.save_to {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            tokio::fs::write(path, &bytes).await?;
            tracing::info!("Export saved to {}", path.display());
        }

        Ok(bytes)
    }

    async fn login(&self) -> Result<()> {
        tracing::info!("Step 1: login at {}", self.config.login_url());
        let identity = origin_of("login_url", self.config.login_url())?;

        let response = self
            .login_client
            .post(self.config.login_url())
            .header(REFERER, format!("{}/login", identity))
            .header(ORIGIN, identity.as_str())
            .json(&LoginPayload {
                username: self.config.username(),
                password: self.config.password(),
            })
            .send()
            .await?;

        let status = response.status();
        tracing::info!("Login status: {}", status);
        if status != StatusCode::OK {
            return Err(TrackerError::LoginFailed {
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    async fn follow_continue(&self) -> Result<()> {
        tracing::info!("Step 2: continue after login");
        let identity = origin_of("login_url", self.config.login_url())?;
        let response = self
            .client
            .get(self.config.continue_url())
            .header(REFERER, format!("{}/login", identity))
            .send()
            .await?;
        tracing::debug!("Continue: {} {}", response.status(), response.url());
        Ok(())
    }

    async fn authorize_cabinet(&self) -> Result<()> {
        tracing::info!("Step 3: OAuth hand-off to the merchant cabinet");
        let response = self
            .client
            .get(self.config.oauth_url())
            .header(REFERER, self.config.referer())
            .send()
            .await?;
        tracing::debug!("Authorization: {} {}", response.status(), response.url());
        Ok(())
    }

    fn ensure_session_cookie(&self) -> Result<()> {
        let cabinet = Url::parse(self.config.download_url()).map_err(|e| {
            TrackerError::InvalidConfigValueError {
                field: "download_url".to_string(),
                value: self.config.download_url().to_string(),
                reason: e.to_string(),
            }
        })?;
        let cookie = self.config.session_cookie();

        if has_cookie(&self.jar, &cabinet, cookie) {
            tracing::info!("Session cookie '{}' present, authorized", cookie);
            Ok(())
        } else {
            tracing::error!("Session cookie '{}' missing, OAuth hand-off did not complete", cookie);
            Err(TrackerError::SessionCookieMissing {
                cookie: cookie.to_string(),
                host: cabinet.host_str().unwrap_or_default().to_string(),
            })
        }
    }
}

#[async_trait]
impl<C: ConfigProvider> SnapshotSource for MarketplaceClient<C> {
    async fn fetch(&self) -> Result<Snapshot> {
        let bytes = self.download_export().await?;
        parse_snapshot(&bytes)
    }
}

fn browser_headers(user_agent: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let agent = HeaderValue::from_str(user_agent).map_err(|e| TrackerError::InvalidConfigValueError {
        field: "user_agent".to_string(),
        value: user_agent.to_string(),
        reason: e.to_string(),
    })?;
    headers.insert(USER_AGENT, agent);
    headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(BROWSER_ACCEPT_LANGUAGE));
    Ok(headers)
}

fn origin_of(field: &str, url: &str) -> Result<String> {
    Url::parse(url)
        .map(|u| u.origin().ascii_serialization())
        .map_err(|e| TrackerError::InvalidConfigValueError {
            field: field.to_string(),
            value: url.to_string(),
            reason: e.to_string(),
        })
}

fn has_cookie(jar: &Jar, url: &Url, name: &str) -> bool {
    jar.cookies(url)
        .and_then(|header| header.to_str().ok().map(str::to_owned))
        .map(|header| {
            header
                .split(';')
                .filter_map(|pair| pair.trim().split_once('='))
                .any(|(key, _)| key == name)
        })
        .unwrap_or(false)
}
