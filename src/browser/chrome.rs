//! Chrome DevTools driver.
//!
//! Uses chromiumoxide (CDP) with stealth evasion scripts. One page is opened
//! per session and reused for every navigation.

#[cfg(feature = "browser")]
use std::time::Duration;

#[cfg(feature = "browser")]
use anyhow::Context;
#[cfg(feature = "browser")]
use async_trait::async_trait;
#[cfg(feature = "browser")]
use tokio::task::JoinHandle;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;

use super::config::BrowserEngineConfig;
#[cfg(feature = "browser")]
use super::config::BrowserEngineType;
#[cfg(feature = "browser")]
use super::stealth::STEALTH_SCRIPTS;
#[cfg(feature = "browser")]
use super::PageDriver;
#[cfg(feature = "browser")]
use crate::error::DriverError;

/// Default user agent for browser requests.
#[cfg(feature = "browser")]
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Delay between selector probes while waiting for an element.
#[cfg(feature = "browser")]
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Chrome-backed [`PageDriver`].
#[cfg(feature = "browser")]
pub struct ChromeDriver {
    config: BrowserEngineConfig,
    browser: Option<Browser>,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
}

#[cfg(feature = "browser")]
impl ChromeDriver {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        // Common install locations
        "/opt/google/chrome/google-chrome",
    ];

    /// Create a new driver. The browser is launched on first use.
    pub fn new(config: BrowserEngineConfig) -> Self {
        Self {
            config,
            browser: None,
            page: None,
            handler: None,
        }
    }

    /// Find Chrome executable.
    fn find_chrome() -> anyhow::Result<std::path::PathBuf> {
        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        info!("Found Chrome in PATH: {}", path);
                        return Ok(std::path::PathBuf::from(path));
                    }
                }
            }
        }

        Err(anyhow::anyhow!(
            "Chrome/Chromium not found. Install it or set STARSCRAPE_REMOTE_BROWSER"
        ))
    }

    /// Launch or connect to the browser and open the working page.
    async fn ensure_page(&mut self) -> anyhow::Result<&Page> {
        if self.browser.is_none() {
            match self.config.remote_url.clone() {
                Some(remote_url) => self.connect_remote(&remote_url).await?,
                None => self.launch().await?,
            }
        }

        if self.page.is_none() {
            let browser = self
                .browser
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("browser not initialized"))?;
            let page = browser.new_page("about:blank").await?;
            page.execute(SetUserAgentOverrideParams::new(
                BROWSER_USER_AGENT.to_string(),
            ))
            .await?;
            self.page = Some(page);
        }

        self.page
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("page not initialized"))
    }

    async fn launch(&mut self) -> anyhow::Result<()> {
        info!("Launching browser (headless={})", self.config.headless);

        let chrome_path = Self::find_chrome()?;
        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);

        // with_head means NOT headless
        if !self.config.headless {
            builder = builder.with_head();
        }

        if let Some(ref proxy) = self.config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--no-sandbox")
            .arg("--disable-gpu");

        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;

        self.handler = Some(tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        }));
        self.browser = Some(browser);

        Ok(())
    }

    /// Connect to a remote Chrome instance.
    async fn connect_remote(&mut self, url: &str) -> anyhow::Result<()> {
        info!("Connecting to remote browser at {}", url);

        // Get WebSocket URL from the /json/version endpoint
        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .send()
            .await
            .context("Failed to connect to remote browser")?
            .json()
            .await
            .context("Failed to parse browser version info")?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("No webSocketDebuggerUrl in response"))?;

        info!("Connecting to WebSocket: {}", ws_url);

        let (browser, mut handler) = Browser::connect(ws_url)
            .await
            .context("Failed to connect to remote browser")?;

        self.handler = Some(tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        }));
        self.browser = Some(browser);

        Ok(())
    }

    /// Drop the page so the next call opens a fresh one.
    fn discard_page(&mut self) {
        self.page = None;
    }
}

/// Apply stealth evasion scripts to a page.
#[cfg(feature = "browser")]
async fn apply_stealth(page: &Page) {
    debug!("Applying stealth scripts");

    for script in STEALTH_SCRIPTS {
        if let Err(e) = page.evaluate(script.to_string()).await {
            debug!("Stealth script injection skipped: {}", e);
        }
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl PageDriver for ChromeDriver {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        let nav_timeout = Duration::from_secs(self.config.timeout);
        let stealth = self.config.engine == BrowserEngineType::Stealth;

        let page = self
            .ensure_page()
            .await
            .map_err(|e| DriverError::Session(e.to_string()))?;

        info!("Navigating to {}", url);
        let nav_params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| DriverError::Navigation(format!("Invalid URL: {}", e)))?;

        let outcome = tokio::time::timeout(nav_timeout, page.execute(nav_params)).await;
        let result = match outcome {
            Err(_) => Err(DriverError::Navigation(format!(
                "timed out after {}s",
                nav_timeout.as_secs()
            ))),
            Ok(Err(e)) => Err(DriverError::Session(e.to_string())),
            Ok(Ok(response)) => match response.result.error_text.as_ref() {
                Some(text) => Err(DriverError::Navigation(text.clone())),
                None => Ok(()),
            },
        };

        match result {
            Ok(()) => {
                if stealth {
                    apply_stealth(page).await;
                }
                Ok(())
            }
            Err(e) => {
                if matches!(e, DriverError::Session(_)) {
                    warn!("Browser page failed, reopening on next call: {}", e);
                    self.discard_page();
                }
                Err(e)
            }
        }
    }

    async fn wait_for_element(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<String, DriverError> {
        let page = self
            .page
            .as_ref()
            .ok_or_else(|| DriverError::Session("no page open".to_string()))?;

        let probe = async {
            loop {
                if let Ok(element) = page.find_element(selector).await {
                    match element.outer_html().await {
                        Ok(Some(markup)) => return markup,
                        Ok(None) => {}
                        Err(e) => debug!("outerHTML read failed for {}: {}", selector, e),
                    }
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };

        tokio::time::timeout(timeout, probe)
            .await
            .map_err(|_| DriverError::Timeout(timeout.as_secs()))
    }

    async fn close(&mut self) {
        if let Some(page) = self.page.take() {
            let _ = page.close().await;
        }
        if let Some(mut browser) = self.browser.take() {
            if self.config.remote_url.is_none() {
                let _ = browser.close().await;
            }
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct ChromeDriver {
    #[allow(dead_code)]
    config: BrowserEngineConfig,
}

#[cfg(not(feature = "browser"))]
impl ChromeDriver {
    pub fn new(config: BrowserEngineConfig) -> Self {
        Self { config }
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait::async_trait]
impl super::PageDriver for ChromeDriver {
    async fn navigate(&mut self, _url: &str) -> Result<(), crate::error::DriverError> {
        Err(crate::error::DriverError::Session(
            "Browser support not compiled. Rebuild with: cargo build --features browser"
                .to_string(),
        ))
    }

    async fn wait_for_element(
        &mut self,
        _selector: &str,
        _timeout: std::time::Duration,
    ) -> Result<String, crate::error::DriverError> {
        Err(crate::error::DriverError::Session(
            "Browser support not compiled. Rebuild with: cargo build --features browser"
                .to_string(),
        ))
    }
}
