use std::process::Stdio;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use thirtyfour::error::WebDriverError;
use thirtyfour::{
    By, ChromiumLikeCapabilities, DesiredCapabilities, Key, WebDriver, WebElement, WindowHandle,
};
use tokio::process::{Child, Command};
use tracing::info;

use crate::browser::{DriverError, DriverResult, Locator, UiDriver};
use crate::config::Config;

const STARTUP_BUDGET: Duration = Duration::from_secs(10);
const STARTUP_POLL: Duration = Duration::from_millis(200);

/// WebDriver-backed browser session: a chromedriver child process plus one
/// Chrome window reusing the local, already-authenticated profile.
pub struct ChromeSession {
    driver: WebDriver,
    chromedriver: Mutex<Option<Child>>,
    // Window handles to return to after close_tab, innermost last.
    tab_stack: Mutex<Vec<WindowHandle>>,
}

impl ChromeSession {
    /// Spawn chromedriver, wait until its /status endpoint reports ready, and
    /// attach a session with the configured profile.
    pub async fn launch(cfg: &Config) -> Result<Self> {
        let child = Command::new(&cfg.chromedriver_path)
            .arg(format!("--port={}", cfg.driver_port))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| {
                format!("failed to spawn chromedriver at `{}`", cfg.chromedriver_path)
            })?;

        let server = format!("http://localhost:{}", cfg.driver_port);
        wait_until_ready(&server).await?;

        let mut caps = DesiredCapabilities::chrome();
        caps.add_arg("--start-maximized")?;
        caps.add_arg(&format!("--user-data-dir={}", cfg.user_data_dir))?;
        caps.add_arg(&format!("--profile-directory={}", cfg.profile_dir))?;
        if let Some(binary) = &cfg.chrome_binary {
            caps.set_binary(binary)?;
        }

        let driver = WebDriver::new(&server, caps)
            .await
            .context("failed to attach a WebDriver session")?;
        info!("chromedriver ready on {server}");

        Ok(Self {
            driver,
            chromedriver: Mutex::new(Some(child)),
            tab_stack: Mutex::new(Vec::new()),
        })
    }

    pub async fn quit(self) -> Result<()> {
        self.driver.quit().await?;
        let child = self.chromedriver.lock().unwrap().take();
        if let Some(mut child) = child {
            child.kill().await.ok();
        }
        Ok(())
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> DriverResult<Value> {
        let ret = self.driver.execute(script, args).await.map_err(wrap)?;
        Ok(ret.json().clone())
    }
}

async fn wait_until_ready(server: &str) -> Result<()> {
    let client = reqwest::Client::new();
    let url = format!("{server}/status");
    let deadline = Instant::now() + STARTUP_BUDGET;
    loop {
        if let Ok(resp) = client.get(&url).send().await {
            if let Ok(body) = resp.json::<Value>().await {
                if body["value"]["ready"].as_bool().unwrap_or(false) {
                    return Ok(());
                }
            }
        }
        if Instant::now() >= deadline {
            return Err(anyhow!(
                "chromedriver did not become ready within {STARTUP_BUDGET:?}"
            ));
        }
        tokio::time::sleep(STARTUP_POLL).await;
    }
}

fn by(locator: &Locator) -> By {
    match locator {
        Locator::Css(s) => By::Css(*s),
        Locator::XPath(s) => By::XPath(*s),
    }
}

fn wrap(err: WebDriverError) -> DriverError {
    DriverError::Other(anyhow::Error::new(err))
}

#[async_trait]
impl UiDriver for ChromeSession {
    type Element = WebElement;

    async fn navigate(&self, url: &str) -> DriverResult<()> {
        self.driver.goto(url).await.map_err(wrap)
    }

    async fn find(&self, locator: &Locator) -> DriverResult<Self::Element> {
        self.driver.find(by(locator)).await.map_err(|e| match e {
            WebDriverError::NoSuchElement(_) => DriverError::NotFound(locator.to_string()),
            other => wrap(other),
        })
    }

    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<Self::Element>> {
        self.driver.find_all(by(locator)).await.map_err(wrap)
    }

    async fn click(&self, el: &Self::Element) -> DriverResult<()> {
        // JS click; native clicks get intercepted by the drawer overlay.
        self.execute("arguments[0].click();", vec![el.to_json().map_err(wrap)?])
            .await?;
        Ok(())
    }

    async fn read_text(&self, el: &Self::Element) -> DriverResult<String> {
        el.text().await.map_err(wrap)
    }

    async fn attr(&self, el: &Self::Element, name: &str) -> DriverResult<Option<String>> {
        el.attr(name).await.map_err(wrap)
    }

    async fn scroll_by(&self, pixels: i64) -> DriverResult<()> {
        self.execute("window.scrollBy(0, arguments[0]);", vec![pixels.into()])
            .await?;
        Ok(())
    }

    async fn scroll_into_view(&self, el: &Self::Element) -> DriverResult<()> {
        self.execute(
            "arguments[0].scrollIntoView({block:'center'});",
            vec![el.to_json().map_err(wrap)?],
        )
        .await?;
        Ok(())
    }

    async fn page_height(&self) -> DriverResult<i64> {
        let value = self
            .execute("return document.body.scrollHeight;", vec![])
            .await?;
        Ok(value.as_i64().unwrap_or_default())
    }

    async fn open_tab(&self, url: &str) -> DriverResult<()> {
        let current = self.driver.window().await.map_err(wrap)?;
        self.execute(
            "window.open(arguments[0], '_blank');",
            vec![Value::String(url.to_string())],
        )
        .await?;
        let handles = self.driver.windows().await.map_err(wrap)?;
        let newest = handles
            .last()
            .cloned()
            .ok_or_else(|| DriverError::NotFound("newly opened tab".into()))?;
        self.driver.switch_to_window(newest).await.map_err(wrap)?;
        self.tab_stack.lock().unwrap().push(current);
        Ok(())
    }

    async fn close_tab(&self) -> DriverResult<()> {
        let previous = self.tab_stack.lock().unwrap().pop();
        if let Some(handle) = previous {
            self.driver.close_window().await.map_err(wrap)?;
            self.driver.switch_to_window(handle).await.map_err(wrap)?;
        }
        Ok(())
    }

    async fn send_escape(&self) -> DriverResult<()> {
        let active = self.driver.active_element().await.map_err(wrap)?;
        active.send_keys(Key::Escape + "").await.map_err(wrap)
    }
}
