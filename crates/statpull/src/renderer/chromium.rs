//! Chromium-based renderer using chromiumoxide.

use super::{RenderContext, Renderer};
use crate::types::{StatError, StatResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable pointing at a Chromium/Chrome binary.
pub const CHROMIUM_PATH_ENV: &str = "STATPULL_CHROMIUM_PATH";

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. STATPULL_CHROMIUM_PATH env
    if let Ok(p) = std::env::var(CHROMIUM_PATH_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.statpull/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidate = home.join(".statpull/chromium/chrome");
        if candidate.exists() {
            return Some(candidate);
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

fn browser_err(e: impl std::fmt::Display) -> StatError {
    StatError::Browser(e.to_string())
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Browser,
}

impl ChromiumRenderer {
    /// Launch Chromium. `explicit` overrides binary discovery.
    pub async fn launch(explicit: Option<&Path>, headless: bool) -> StatResult<Self> {
        let chrome_path = match explicit {
            Some(p) => p.to_path_buf(),
            None => find_chromium().ok_or_else(|| {
                StatError::Browser(format!(
                    "Chromium not found. Install Chrome or set {CHROMIUM_PATH_ENV}."
                ))
            })?,
        };
        tracing::debug!("launching Chromium from {}", chrome_path.display());

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        builder = if headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };
        let config = builder
            .build()
            .map_err(|e| StatError::Browser(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| StatError::Browser(format!("failed to launch Chromium: {e}")))?;

        // Drain CDP events for the lifetime of the browser
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self { browser })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> StatResult<Box<dyn RenderContext>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(browser_err)?;

        Ok(Box::new(ChromiumContext { page }))
    }

    async fn shutdown(&self) -> StatResult<()> {
        // Browser is dropped when ChromiumRenderer is dropped
        Ok(())
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
}

impl ChromiumContext {
    /// Every element matching `selector`. No match is an empty list; a
    /// CDP failure is a [`StatError::Browser`].
    async fn elements(&self, selector: &str) -> StatResult<Vec<Element>> {
        self.page
            .find_elements(selector)
            .await
            .map_err(|e| StatError::Browser(format!("querying {selector}: {e}")))
    }
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> StatResult<()> {
        let result =
            tokio::time::timeout(Duration::from_millis(timeout_ms), self.page.goto(url)).await;

        match result {
            Ok(Ok(_)) => {
                let _ = self.page.wait_for_navigation().await;
                Ok(())
            }
            Ok(Err(e)) => Err(StatError::Browser(format!("navigation failed: {e}"))),
            Err(_) => Err(StatError::Timeout {
                what: format!("navigation to {url}"),
                timeout_ms,
            }),
        }
    }

    async fn count(&self, selector: &str) -> StatResult<usize> {
        Ok(self.elements(selector).await?.len())
    }

    async fn click_nth(&mut self, selector: &str, index: usize) -> StatResult<()> {
        let elements = self.elements(selector).await?;
        let element = elements.get(index).ok_or_else(|| {
            StatError::Browser(format!("no element #{index} matching {selector}"))
        })?;
        element.click().await.map_err(browser_err)?;
        Ok(())
    }

    async fn type_into(&mut self, selector: &str, text: &str) -> StatResult<()> {
        let element = self.page.find_element(selector).await.map_err(browser_err)?;
        element
            .click()
            .await
            .map_err(browser_err)?
            .type_str(text)
            .await
            .map_err(browser_err)?;
        Ok(())
    }

    async fn texts(&self, selector: &str) -> StatResult<Vec<String>> {
        let mut out = Vec::new();
        for element in self.elements(selector).await? {
            let text = element.inner_text().await.map_err(browser_err)?;
            out.push(text.unwrap_or_default().trim().to_string());
        }
        Ok(out)
    }

    async fn outer_html(&self, selector: &str) -> StatResult<Option<String>> {
        match self.elements(selector).await?.first() {
            Some(element) => element.outer_html().await.map_err(browser_err),
            None => Ok(None),
        }
    }

    async fn close(self: Box<Self>) -> StatResult<()> {
        let _ = self.page.close().await;
        Ok(())
    }
}
