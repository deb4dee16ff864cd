//! Browser process launch and low-level page helpers
//!
//! Wraps chromiumoxide's launch sequence: anti-detection launch arguments,
//! the CDP handler task, a stealth init script applied to every new page,
//! and the bounded element/navigation waits every other module builds on.

use crate::config::{create_browser_config, BrowserSettings};
use crate::error::AutomationError;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::info;

/// Background task pumping Chrome DevTools Protocol events
pub type HandlerTask = JoinHandle<Result<(), chromiumoxide::error::CdpError>>;

const ELEMENT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Masks the properties headless Chromium leaks to fingerprinting scripts.
/// Runs before any target script on every new document.
const STEALTH_SCRIPT: &str = r#"
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
    window.chrome = window.chrome || { runtime: {} };
    Object.defineProperty(navigator, 'languages', { get: () => ['es-ES', 'es'] });
    Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3] });
"#;

/// Launch a Chromium process and start its CDP handler task
pub async fn launch_browser(
    settings: &BrowserSettings,
) -> Result<(Browser, HandlerTask), AutomationError> {
    let browser_config = create_browser_config(settings)?;

    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .map_err(|e| AutomationError::BrowserLaunch(e.to_string()))?;

    // The handler implements Stream and must be polled for the whole life of
    // the browser connection.
    let handler_task = tokio::spawn(async move {
        loop {
            match handler.next().await {
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::error!("CDP handler error: {}", e);
                    return Err(e);
                }
                None => {
                    info!("CDP handler stream ended");
                    break;
                }
            }
        }
        Ok(())
    });

    Ok((browser, handler_task))
}

/// Open a new page with the stealth init script installed
pub async fn new_stealth_page(browser: &Browser) -> Result<Page, AutomationError> {
    let page = browser.new_page("about:blank").await?;

    let params = AddScriptToEvaluateOnNewDocumentParams::builder()
        .source(STEALTH_SCRIPT)
        .build()
        .map_err(AutomationError::Page)?;
    page.execute(params).await?;

    Ok(page)
}

/// Navigate and wait for the load to settle, bounded by `timeout`
pub async fn navigate(page: &Page, url: &str, timeout: Duration) -> Result<(), AutomationError> {
    let nav = async {
        page.goto(url).await?;
        page.wait_for_navigation().await?;
        Ok::<_, chromiumoxide::error::CdpError>(())
    };

    tokio::time::timeout(timeout, nav)
        .await
        .map_err(|_| AutomationError::Navigation(format!("timed out loading {url}")))?
        .map_err(|e| AutomationError::Navigation(e.to_string()))?;

    Ok(())
}

/// Poll for a selector until it resolves or the timeout expires
pub async fn wait_for_element(
    page: &Page,
    selector: &str,
    timeout: Duration,
) -> Result<Element, AutomationError> {
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        if let Ok(element) = page.find_element(selector).await {
            return Ok(element);
        }

        if tokio::time::Instant::now() >= deadline {
            return Err(AutomationError::ElementNotFound {
                selector: selector.to_string(),
                timeout,
            });
        }

        sleep(ELEMENT_POLL_INTERVAL).await;
    }
}

/// Immediate, non-navigating presence check against the current DOM
pub async fn element_exists(page: &Page, selector: &str) -> bool {
    page.find_element(selector).await.is_ok()
}
