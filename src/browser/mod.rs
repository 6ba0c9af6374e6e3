pub mod webdriver;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

/// Element locator, kept backend-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    Css(&'static str),
    XPath(&'static str),
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css `{s}`"),
            Locator::XPath(s) => write!(f, "xpath `{s}`"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("no element matching {0}")]
    NotFound(String),
    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type DriverResult<T> = Result<T, DriverError>;

/// The capability surface the scraper needs from a browser session:
/// navigate, find, click, read, scroll, and single-tab juggling.
///
/// The scraper's state machine is written entirely against this trait, so the
/// automation backend is swappable (production uses WebDriver, tests use an
/// in-memory fake).
#[async_trait]
pub trait UiDriver {
    type Element: Clone + Send + Sync;

    async fn navigate(&self, url: &str) -> DriverResult<()>;

    /// Find one element. Absence is the `NotFound` error kind so callers can
    /// treat it as an expected branch.
    async fn find(&self, locator: &Locator) -> DriverResult<Self::Element>;

    /// Find all matching elements; an empty match is `Ok(vec![])`.
    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<Self::Element>>;

    async fn click(&self, el: &Self::Element) -> DriverResult<()>;

    async fn read_text(&self, el: &Self::Element) -> DriverResult<String>;

    async fn attr(&self, el: &Self::Element, name: &str) -> DriverResult<Option<String>>;

    async fn scroll_by(&self, pixels: i64) -> DriverResult<()>;

    async fn scroll_into_view(&self, el: &Self::Element) -> DriverResult<()>;

    async fn page_height(&self) -> DriverResult<i64>;

    /// Open `url` in a new tab and switch focus to it.
    async fn open_tab(&self, url: &str) -> DriverResult<()>;

    /// Close the current tab and return focus to the previous one. No-op when
    /// no extra tab is open.
    async fn close_tab(&self) -> DriverResult<()>;

    /// Send Escape to the active element (drawer dismissal fallback).
    async fn send_escape(&self) -> DriverResult<()>;
}
