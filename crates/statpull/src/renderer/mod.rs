//! Renderer abstraction for browser-driven scraping.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide), plus the
//! polling waits built on top of them.

pub mod chromium;

use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::types::{StatError, StatResult};

/// How often a wait re-checks the page.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> StatResult<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> StatResult<()>;
}

/// A single browser context (tab).
///
/// Element lookups take CSS selectors and never wait; use [`wait_for`] and
/// [`click_text`] for anything that renders asynchronously.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> StatResult<()>;
    /// Number of elements currently matching `selector`.
    async fn count(&self, selector: &str) -> StatResult<usize>;
    /// Click the `index`-th element matching `selector`.
    async fn click_nth(&mut self, selector: &str, index: usize) -> StatResult<()>;
    /// Focus the first element matching `selector` and type `text` into it.
    async fn type_into(&mut self, selector: &str, text: &str) -> StatResult<()>;
    /// Trimmed inner text of every element matching `selector`.
    async fn texts(&self, selector: &str) -> StatResult<Vec<String>>;
    /// Outer HTML of the first element matching `selector`.
    async fn outer_html(&self, selector: &str) -> StatResult<Option<String>>;
    /// Close this context.
    async fn close(self: Box<Self>) -> StatResult<()>;
}

/// Wait until at least one element matches `selector`.
pub async fn wait_for(
    ctx: &dyn RenderContext,
    selector: &str,
    timeout: Duration,
) -> StatResult<()> {
    let deadline = Instant::now() + timeout;
    loop {
        if ctx.count(selector).await? > 0 {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(timed_out(selector, timeout));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Wait for `selector` to appear, then click its first match.
pub async fn wait_and_click(
    ctx: &mut dyn RenderContext,
    selector: &str,
    timeout: Duration,
) -> StatResult<()> {
    wait_for(&*ctx, selector, timeout).await?;
    ctx.click_nth(selector, 0).await
}

/// Wait for an element matching `selector` whose text is exactly `text`,
/// then click it.
pub async fn click_text(
    ctx: &mut dyn RenderContext,
    selector: &str,
    text: &str,
    timeout: Duration,
) -> StatResult<()> {
    let deadline = Instant::now() + timeout;
    loop {
        let texts = ctx.texts(selector).await?;
        if let Some(index) = texts.iter().position(|t| t == text) {
            return ctx.click_nth(selector, index).await;
        }
        if Instant::now() >= deadline {
            return Err(timed_out(&format!("{selector} with text {text:?}"), timeout));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Wait until the outer HTML of `selector` differs from `previous`.
///
/// Returns `false` if it is still the same when `timeout` runs out; two
/// selections may render identical content.
pub async fn wait_for_change(
    ctx: &dyn RenderContext,
    selector: &str,
    previous: Option<&str>,
    timeout: Duration,
) -> StatResult<bool> {
    let deadline = Instant::now() + timeout;
    loop {
        if ctx.outer_html(selector).await?.as_deref() != previous {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn timed_out(what: &str, timeout: Duration) -> StatError {
    StatError::Timeout {
        what: what.to_string(),
        timeout_ms: timeout.as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A page whose elements never change. `renders` are returned by
    /// successive `outer_html` reads, the last one repeating.
    #[derive(Default)]
    struct StaticPage {
        elements: HashMap<String, Vec<String>>,
        clicks: Vec<(String, usize)>,
        renders: Vec<String>,
        reads: AtomicUsize,
        disconnected: bool,
    }

    #[async_trait]
    impl RenderContext for StaticPage {
        async fn navigate(&mut self, _url: &str, _timeout_ms: u64) -> StatResult<()> {
            Ok(())
        }
        async fn count(&self, selector: &str) -> StatResult<usize> {
            if self.disconnected {
                return Err(StatError::Browser("connection closed".to_string()));
            }
            Ok(self.elements.get(selector).map_or(0, Vec::len))
        }
        async fn click_nth(&mut self, selector: &str, index: usize) -> StatResult<()> {
            self.clicks.push((selector.to_string(), index));
            Ok(())
        }
        async fn type_into(&mut self, _selector: &str, _text: &str) -> StatResult<()> {
            Ok(())
        }
        async fn texts(&self, selector: &str) -> StatResult<Vec<String>> {
            Ok(self.elements.get(selector).cloned().unwrap_or_default())
        }
        async fn outer_html(&self, _selector: &str) -> StatResult<Option<String>> {
            if self.renders.is_empty() {
                return Ok(None);
            }
            let read = self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.renders.get(read).or(self.renders.last()).cloned())
        }
        async fn close(self: Box<Self>) -> StatResult<()> {
            Ok(())
        }
    }

    fn page() -> StaticPage {
        let mut page = StaticPage::default();
        page.elements.insert(
            "button.year".to_string(),
            vec!["2019".to_string(), "2020".to_string(), "2021".to_string()],
        );
        page
    }

    #[tokio::test]
    async fn test_wait_for_present() {
        let page = page();
        wait_for(&page, "button.year", Duration::from_millis(50))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_times_out() {
        let page = page();
        let err = wait_for(&page, "table", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, StatError::Timeout { timeout_ms: 50, .. }));
    }

    #[tokio::test]
    async fn test_wait_for_surfaces_browser_errors() {
        let page = StaticPage {
            disconnected: true,
            ..page()
        };
        let err = wait_for(&page, "button.year", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, StatError::Browser(_)));
    }

    #[tokio::test]
    async fn test_wait_for_change_sees_rerender() {
        let page = StaticPage {
            renders: vec![
                "<table>old</table>".into(),
                "<table>old</table>".into(),
                "<table>new</table>".into(),
            ],
            ..page()
        };
        let previous = Some("<table>old</table>");
        let changed = wait_for_change(&page, "table", previous, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(changed);
        assert_eq!(page.reads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_wait_for_change_accepts_identical_content() {
        let page = StaticPage {
            renders: vec!["<table>same</table>".into()],
            ..page()
        };
        let previous = Some("<table>same</table>");
        let changed = wait_for_change(&page, "table", previous, Duration::from_millis(50))
            .await
            .unwrap();
        assert!(!changed);
    }

    #[tokio::test]
    async fn test_click_text_exact_match() {
        let mut page = page();
        click_text(&mut page, "button.year", "2020", Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(page.clicks, vec![("button.year".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_click_text_no_partial_match() {
        let mut page = page();
        let err = click_text(&mut page, "button.year", "202", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, StatError::Timeout { .. }));
        assert!(page.clicks.is_empty());
    }
}
