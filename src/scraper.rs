use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Local;
use tokio::time::sleep;
use tracing::warn;

use crate::browser::{DriverError, DriverResult, Locator, UiDriver};
use crate::dates;
use crate::db::{JobRecord, JobStore};

const APPLIED_URL: &str = "https://www.seek.co.nz/my-activity/applied-jobs";
const SEEK_ORIGIN: &str = "https://www.seek.co.nz";

const LIST_READY: Locator = Locator::Css("#tabs-saved-applied_2_panel > div:nth-child(2)");
const TITLE_BLOCKS: Locator =
    Locator::XPath("//span[@role='button' and .//span[text()='Job Title ']]");
const DRAWER_CLOSE: Locator =
    Locator::XPath("//button[@aria-label='Close' or @aria-label='Close dialog']");
const VIEW_JOB_LINK: Locator =
    Locator::XPath("//a[contains(@href, 'job/') and contains(text(),'View job')]");
const NEXT_BUTTON: Locator = Locator::XPath("//span[.='Next']/parent::span");

const JD_TITLE: Locator = Locator::Css("h1[data-automation='job-detail-title']");
const COMPANY: Locator = Locator::Css("span[data-automation='advertiser-name']");
const ADDRESS: Locator = Locator::Css("span[data-automation='job-detail-location']");
const CLASSIFICATION: Locator = Locator::Css("span[data-automation='job-detail-classifications']");
const WORK_TYPE: Locator = Locator::Css("span[data-automation='job-detail-work-type']");
const JD_BODY: Locator = Locator::Css("div[data-automation='jobAdDetails']");
const POSTED_SPAN: Locator = Locator::XPath("//span[starts-with(text(), 'Posted ')]");
const APPLIED_SPAN: Locator = Locator::XPath("//span[starts-with(text(), 'You applied on')]");

const MAX_SCROLL_ROUNDS: usize = 5;
const SCROLL_STEP: i64 = 1200;

/// Per-step wait budgets. Every wait is one fixed budget, no retries or
/// escalation; exhausting it degrades to the step's documented fallback.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub list_ready: Duration,
    pub overlay: Duration,
    pub detail: Duration,
    pub page_change: Duration,
    pub poll: Duration,
    pub scroll_pause: Duration,
    pub settle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            list_ready: Duration::from_secs(15),
            overlay: Duration::from_secs(15),
            detail: Duration::from_secs(15),
            page_change: Duration::from_secs(8),
            poll: Duration::from_millis(250),
            scroll_pause: Duration::from_millis(800),
            settle: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RunStats {
    pub pages: u32,
    pub saved: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Outcome of driving one list item through the drawer.
enum ItemOutcome {
    /// Detail page scraped; record ready to persist.
    Ready(JobRecord),
    /// No "View job" link in the drawer.
    Skipped,
    /// The drawer never opened.
    ClickFailed,
}

enum Paginate {
    Advanced,
    Done,
}

/// Walks the applied-jobs list: ListLoaded -> ItemsVisible -> per item
/// (OverlayOpening -> OverlayOpen -> DetailOpening -> RecordReady) ->
/// Paginate, until no further page exists.
///
/// Generic over the browser capability trait so the backend is swappable.
pub struct Scraper<'a, D: UiDriver> {
    driver: &'a D,
    timeouts: Timeouts,
}

impl<'a, D: UiDriver + Sync> Scraper<'a, D> {
    pub fn new(driver: &'a D) -> Self {
        Self::with_timeouts(driver, Timeouts::default())
    }

    pub fn with_timeouts(driver: &'a D, timeouts: Timeouts) -> Self {
        Self { driver, timeouts }
    }

    /// Scrape every list page, upserting each record as it is extracted.
    ///
    /// Fatal errors: the list page never becoming ready, and store write
    /// failures. Everything else degrades per item or per field.
    pub async fn run(&self, store: &JobStore, max_pages: Option<u32>) -> Result<RunStats> {
        // ListLoaded is the structural precondition for the whole run.
        self.driver.navigate(APPLIED_URL).await?;
        self.wait_present(&LIST_READY, self.timeouts.list_ready)
            .await
            .context("applied-jobs list never became ready")?;
        sleep(self.timeouts.settle).await;

        let mut stats = RunStats::default();
        let mut page = 1u32;

        loop {
            // ItemsVisible: trigger lazy loading, then enumerate.
            self.lazy_scroll().await;
            let count = self
                .driver
                .find_all(&TITLE_BLOCKS)
                .await
                .map(|blocks| blocks.len())
                .unwrap_or(0);
            println!("[Page {page}] Found {count} job entries.");

            let mut index = 0usize;
            loop {
                // Re-fetch handles every pass; drawer churn leaves old ones
                // stale. A shorter collection ends the loop early.
                let blocks = self.driver.find_all(&TITLE_BLOCKS).await.unwrap_or_default();
                if index >= blocks.len() {
                    break;
                }
                let item = blocks[index].clone();
                let title = self
                    .driver
                    .read_text(&item)
                    .await
                    .unwrap_or_default()
                    .replace("Job Title", "")
                    .trim()
                    .to_string();
                println!("[{}] {title}", index + 1);

                match self.process_item(&item).await {
                    Ok(ItemOutcome::Ready(rec)) => {
                        // RecordReady: persistence failures are fatal here.
                        store.upsert(&rec)?;
                        stats.saved += 1;
                        self.close_drawer().await;
                        sleep(self.timeouts.settle).await;
                    }
                    Ok(ItemOutcome::Skipped) => {
                        println!("[Skip] No 'View job' link for: {title}");
                        stats.skipped += 1;
                        self.close_drawer().await;
                    }
                    Ok(ItemOutcome::ClickFailed) => {
                        println!("[Click failed] {title}");
                        stats.failed += 1;
                    }
                    Err(e) => {
                        // One bad item never aborts the scrape.
                        println!("[Item failed] {title}: {e}");
                        warn!("item {index} on page {page} failed: {e}");
                        stats.failed += 1;
                        let _ = self.driver.close_tab().await;
                        self.close_drawer().await;
                    }
                }
                index += 1;
            }

            stats.pages = page;
            if let Some(limit) = max_pages {
                if page >= limit {
                    println!("[Done] Reached page limit ({limit}).");
                    break;
                }
            }

            match self.next_page().await {
                Paginate::Advanced => {
                    page += 1;
                    let _ = self
                        .wait_present(&LIST_READY, self.timeouts.list_ready)
                        .await;
                    sleep(self.timeouts.settle).await;
                }
                Paginate::Done => {
                    println!("[Done] No more pages.");
                    break;
                }
            }
        }

        Ok(stats)
    }

    /// OverlayOpening through RecordReady for a single list item.
    async fn process_item(&self, item: &D::Element) -> DriverResult<ItemOutcome> {
        // OverlayOpening: click the item, wait for the drawer chrome.
        if self.open_drawer(item).await.is_err() {
            return Ok(ItemOutcome::ClickFailed);
        }

        // OverlayOpen: not every drawer carries a full-posting link.
        let job_url = match self.view_job_url().await {
            Some(url) => url,
            None => return Ok(ItemOutcome::Skipped),
        };
        println!("[View job] {job_url}");

        // DetailOpening: scrape the full posting in its own tab.
        let rec = self.scrape_detail(&job_url).await?;
        Ok(ItemOutcome::Ready(rec))
    }

    async fn open_drawer(&self, item: &D::Element) -> DriverResult<()> {
        self.driver.scroll_into_view(item).await?;
        sleep(self.timeouts.settle).await;
        self.driver.click(item).await?;
        self.wait_present(&DRAWER_CLOSE, self.timeouts.overlay)
            .await?;
        Ok(())
    }

    /// Absolute URL of the "View job" link in the open drawer, if present.
    async fn view_job_url(&self) -> Option<String> {
        let link = self
            .wait_present(&VIEW_JOB_LINK, self.timeouts.overlay)
            .await
            .ok()?;
        let href = self.driver.attr(&link, "href").await.ok()??;
        if href.starts_with('/') {
            Some(format!("{SEEK_ORIGIN}{href}"))
        } else {
            Some(href)
        }
    }

    /// Open the detail page in a new tab, extract every field best-effort,
    /// close the tab, and return to the list.
    async fn scrape_detail(&self, job_url: &str) -> DriverResult<JobRecord> {
        self.driver.open_tab(job_url).await?;

        if let Err(e) = self.wait_present(&JD_TITLE, self.timeouts.detail).await {
            // Keep extracting; each field degrades independently.
            println!("[Warn] JD page didn't load properly: {job_url} ({e})");
        }

        let mut rec = JobRecord::new(job_url);
        rec.job_title = self.field(&JD_TITLE).await;
        rec.company = self.field(&COMPANY).await;
        rec.address = self.field(&ADDRESS).await;
        rec.field = self.field(&CLASSIFICATION).await;
        rec.job_type = self.field(&WORK_TYPE).await;
        rec.jd = self.field(&JD_BODY).await;

        let today = Local::now().date_naive();
        rec.posted_date = match dates::posted_date(&self.field(&POSTED_SPAN).await, today) {
            Some(d) => d.to_string(),
            None => String::new(),
        };
        rec.applied_date = match dates::applied_date(&self.field(&APPLIED_SPAN).await) {
            Some(d) => d.to_string(),
            None => String::new(),
        };

        self.driver.close_tab().await?;
        Ok(rec)
    }

    /// Read one element's text, empty string on any failure.
    async fn field(&self, locator: &Locator) -> String {
        match self.driver.find(locator).await {
            Ok(el) => self
                .driver
                .read_text(&el)
                .await
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
            Err(_) => String::new(),
        }
    }

    /// Best-effort drawer dismissal: explicit close control, else Escape.
    async fn close_drawer(&self) {
        if let Ok(btn) = self.driver.find(&DRAWER_CLOSE).await {
            if self.driver.click(&btn).await.is_ok() {
                sleep(self.timeouts.settle).await;
                return;
            }
        }
        let _ = self.driver.send_escape().await;
    }

    /// Scroll until the page height stabilizes, bounded.
    async fn lazy_scroll(&self) {
        let mut last_height = 0i64;
        for _ in 0..MAX_SCROLL_ROUNDS {
            if self.driver.scroll_by(SCROLL_STEP).await.is_err() {
                break;
            }
            sleep(self.timeouts.scroll_pause).await;
            let height = self.driver.page_height().await.unwrap_or(last_height);
            if height == last_height {
                break;
            }
            last_height = height;
        }
    }

    /// Paginate: click Next and confirm the list actually changed. Any miss
    /// (no control, failed click, unchanged list) means the last page.
    async fn next_page(&self) -> Paginate {
        let before = match self.driver.find_all(&TITLE_BLOCKS).await {
            Ok(blocks) => match blocks.first() {
                Some(first) => self.driver.read_text(first).await.unwrap_or_default(),
                None => String::new(),
            },
            Err(_) => String::new(),
        };

        let next = match self.driver.find(&NEXT_BUTTON).await {
            Ok(el) => el,
            Err(_) => return Paginate::Done,
        };
        let _ = self.driver.scroll_into_view(&next).await;
        if self.driver.click(&next).await.is_err() {
            return Paginate::Done;
        }

        let deadline = Instant::now() + self.timeouts.page_change;
        loop {
            if let Ok(blocks) = self.driver.find_all(&TITLE_BLOCKS).await {
                if let Some(first) = blocks.first() {
                    let text = self.driver.read_text(first).await.unwrap_or_default();
                    if text != before {
                        return Paginate::Advanced;
                    }
                }
            }
            if Instant::now() >= deadline {
                return Paginate::Done;
            }
            sleep(self.timeouts.poll).await;
        }
    }

    /// Poll until `locator` resolves or the budget runs out.
    async fn wait_present(&self, locator: &Locator, budget: Duration) -> DriverResult<D::Element> {
        let deadline = Instant::now() + budget;
        loop {
            match self.driver.find(locator).await {
                Ok(el) => return Ok(el),
                Err(DriverError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout {
                    what: locator.to_string(),
                    waited: budget,
                });
            }
            sleep(self.timeouts.poll).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    use super::*;

    #[derive(Debug, Clone, Default)]
    struct Detail {
        title: Option<String>,
        company: Option<String>,
        address: Option<String>,
        field: Option<String>,
        work_type: Option<String>,
        jd: Option<String>,
        posted: Option<String>,
        applied: Option<String>,
    }

    #[derive(Debug, Clone)]
    struct FakeItem {
        title: String,
        view_url: Option<String>,
        click_fails: bool,
        detail: Detail,
    }

    struct World {
        pages: Vec<Vec<FakeItem>>,
        page_idx: usize,
        drawer: Option<usize>,
        tab: Option<String>,
        visible: Option<usize>,
        fail_next_click: bool,
        next_click_noop: bool,
        shrink_on_close: Option<usize>,
    }

    impl World {
        fn items(&self) -> &[FakeItem] {
            &self.pages[self.page_idx]
        }

        fn visible_len(&self) -> usize {
            let len = self.items().len();
            self.visible.map_or(len, |v| v.min(len))
        }

        fn detail(&self, url: &str) -> Option<Detail> {
            self.pages
                .iter()
                .flatten()
                .find(|it| it.view_url.as_deref().map(resolve) == Some(url.to_string()))
                .map(|it| it.detail.clone())
        }
    }

    fn resolve(url: &str) -> String {
        if url.starts_with('/') {
            format!("{SEEK_ORIGIN}{url}")
        } else {
            url.to_string()
        }
    }

    #[derive(Debug, Clone)]
    enum FakeEl {
        Marker,
        Item(usize),
        CloseBtn,
        ViewLink(String),
        Next,
        Text(String),
    }

    struct FakeDriver {
        world: Mutex<World>,
    }

    impl FakeDriver {
        fn new(pages: Vec<Vec<FakeItem>>) -> Self {
            Self {
                world: Mutex::new(World {
                    pages,
                    page_idx: 0,
                    drawer: None,
                    tab: None,
                    visible: None,
                    fail_next_click: false,
                    next_click_noop: false,
                    shrink_on_close: None,
                }),
            }
        }
    }

    #[async_trait]
    impl UiDriver for FakeDriver {
        type Element = FakeEl;

        async fn navigate(&self, _url: &str) -> DriverResult<()> {
            Ok(())
        }

        async fn find(&self, locator: &Locator) -> DriverResult<Self::Element> {
            let w = self.world.lock().unwrap();
            if let Some(url) = &w.tab {
                let detail = w.detail(url).unwrap_or_default();
                let text = match *locator {
                    JD_TITLE => detail.title,
                    COMPANY => detail.company,
                    ADDRESS => detail.address,
                    CLASSIFICATION => detail.field,
                    WORK_TYPE => detail.work_type,
                    JD_BODY => detail.jd,
                    POSTED_SPAN => detail.posted,
                    APPLIED_SPAN => detail.applied,
                    _ => None,
                };
                return text
                    .map(FakeEl::Text)
                    .ok_or_else(|| DriverError::NotFound(locator.to_string()));
            }
            match *locator {
                LIST_READY => Ok(FakeEl::Marker),
                DRAWER_CLOSE => match w.drawer {
                    Some(_) => Ok(FakeEl::CloseBtn),
                    None => Err(DriverError::NotFound(locator.to_string())),
                },
                VIEW_JOB_LINK => w
                    .drawer
                    .and_then(|i| w.items().get(i))
                    .and_then(|it| it.view_url.clone())
                    .map(FakeEl::ViewLink)
                    .ok_or_else(|| DriverError::NotFound(locator.to_string())),
                NEXT_BUTTON => {
                    if w.page_idx + 1 < w.pages.len() {
                        Ok(FakeEl::Next)
                    } else {
                        Err(DriverError::NotFound(locator.to_string()))
                    }
                }
                TITLE_BLOCKS => {
                    if w.visible_len() > 0 {
                        Ok(FakeEl::Item(0))
                    } else {
                        Err(DriverError::NotFound(locator.to_string()))
                    }
                }
                _ => Err(DriverError::NotFound(locator.to_string())),
            }
        }

        async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<Self::Element>> {
            let w = self.world.lock().unwrap();
            if *locator == TITLE_BLOCKS && w.tab.is_none() {
                return Ok((0..w.visible_len()).map(FakeEl::Item).collect());
            }
            Ok(Vec::new())
        }

        async fn click(&self, el: &Self::Element) -> DriverResult<()> {
            let mut w = self.world.lock().unwrap();
            match el {
                FakeEl::Item(i) => {
                    let fails = w.items().get(*i).is_some_and(|it| it.click_fails);
                    if fails {
                        return Err(DriverError::Other(anyhow!("click intercepted")));
                    }
                    w.drawer = Some(*i);
                    Ok(())
                }
                FakeEl::Next => {
                    if w.fail_next_click {
                        return Err(DriverError::Other(anyhow!("next button detached")));
                    }
                    if !w.next_click_noop {
                        w.page_idx += 1;
                        w.drawer = None;
                        w.visible = None;
                    }
                    Ok(())
                }
                FakeEl::CloseBtn => {
                    w.drawer = None;
                    if let Some(n) = w.shrink_on_close.take() {
                        w.visible = Some(n);
                    }
                    Ok(())
                }
                _ => Ok(()),
            }
        }

        async fn read_text(&self, el: &Self::Element) -> DriverResult<String> {
            let w = self.world.lock().unwrap();
            match el {
                FakeEl::Item(i) => w
                    .items()
                    .get(*i)
                    .map(|it| format!("Job Title {}", it.title))
                    .ok_or_else(|| DriverError::NotFound("stale item".into())),
                FakeEl::Text(t) => Ok(t.clone()),
                FakeEl::ViewLink(_) => Ok("View job".into()),
                FakeEl::Next => Ok("Next".into()),
                _ => Ok(String::new()),
            }
        }

        async fn attr(&self, el: &Self::Element, name: &str) -> DriverResult<Option<String>> {
            match el {
                FakeEl::ViewLink(url) if name == "href" => Ok(Some(url.clone())),
                _ => Ok(None),
            }
        }

        async fn scroll_by(&self, _pixels: i64) -> DriverResult<()> {
            Ok(())
        }

        async fn scroll_into_view(&self, _el: &Self::Element) -> DriverResult<()> {
            Ok(())
        }

        async fn page_height(&self) -> DriverResult<i64> {
            Ok(1000)
        }

        async fn open_tab(&self, url: &str) -> DriverResult<()> {
            self.world.lock().unwrap().tab = Some(url.to_string());
            Ok(())
        }

        async fn close_tab(&self) -> DriverResult<()> {
            self.world.lock().unwrap().tab = None;
            Ok(())
        }

        async fn send_escape(&self) -> DriverResult<()> {
            self.world.lock().unwrap().drawer = None;
            Ok(())
        }
    }

    fn item(title: &str, url: &str) -> FakeItem {
        FakeItem {
            title: title.to_string(),
            view_url: Some(url.to_string()),
            click_fails: false,
            detail: Detail {
                title: Some(title.to_string()),
                company: Some(format!("{title} Co")),
                address: Some("Auckland".into()),
                field: Some("Information Technology".into()),
                work_type: Some("Full time".into()),
                jd: Some(format!("{title} description")),
                posted: Some("Posted 3d ago".into()),
                applied: Some("You applied on 12 Aug 2025".into()),
            },
        }
    }

    fn fast() -> Timeouts {
        Timeouts {
            list_ready: Duration::from_millis(50),
            overlay: Duration::from_millis(50),
            detail: Duration::from_millis(50),
            page_change: Duration::from_millis(50),
            poll: Duration::from_millis(5),
            scroll_pause: Duration::from_millis(1),
            settle: Duration::from_millis(1),
        }
    }

    fn mem_store() -> JobStore {
        JobStore::open(Path::new(":memory:")).unwrap()
    }

    #[tokio::test]
    async fn scrapes_every_page_once_and_stops() {
        let driver = FakeDriver::new(vec![
            vec![
                item("Data Engineer", "https://www.seek.co.nz/job/1"),
                item("Platform Engineer", "https://www.seek.co.nz/job/2"),
            ],
            vec![
                item("SRE", "https://www.seek.co.nz/job/3"),
                item("Backend Developer", "https://www.seek.co.nz/job/4"),
            ],
        ]);
        let store = mem_store();
        let stats = Scraper::with_timeouts(&driver, fast())
            .run(&store, None)
            .await
            .unwrap();

        assert_eq!(stats.pages, 2);
        assert_eq!(stats.saved, 4);
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.failed, 0);
        assert_eq!(store.count().unwrap(), 4);

        let rec = store
            .find_by_url("https://www.seek.co.nz/job/3")
            .unwrap()
            .unwrap();
        assert_eq!(rec.job_title, "SRE");
        assert_eq!(rec.company, "SRE Co");
        assert_eq!(rec.jd, "SRE description");
        assert_eq!(rec.applied_date, "2025-08-12");

        let expected_posted = (Local::now().date_naive() - ChronoDuration::days(3)).to_string();
        assert_eq!(rec.posted_date, expected_posted);
    }

    #[tokio::test]
    async fn item_without_view_link_is_skipped() {
        let mut no_link = item("Ghost Role", "https://www.seek.co.nz/job/9");
        no_link.view_url = None;

        let driver = FakeDriver::new(vec![vec![
            item("First", "https://www.seek.co.nz/job/10"),
            no_link,
            item("Third", "https://www.seek.co.nz/job/11"),
        ]]);
        let store = mem_store();
        let stats = Scraper::with_timeouts(&driver, fast())
            .run(&store, None)
            .await
            .unwrap();

        assert_eq!(stats.saved, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(store.count().unwrap(), 2);
        assert!(store
            .find_by_url("https://www.seek.co.nz/job/9")
            .unwrap()
            .is_none());
        assert!(store
            .find_by_url("https://www.seek.co.nz/job/11")
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn failed_item_click_continues_with_next_item() {
        let mut broken = item("Unclickable", "https://www.seek.co.nz/job/20");
        broken.click_fails = true;

        let driver = FakeDriver::new(vec![vec![
            broken,
            item("Fine", "https://www.seek.co.nz/job/21"),
        ]]);
        let store = mem_store();
        let stats = Scraper::with_timeouts(&driver, fast())
            .run(&store, None)
            .await
            .unwrap();

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.saved, 1);
        assert!(store
            .find_by_url("https://www.seek.co.nz/job/21")
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn next_click_failure_is_last_page() {
        let driver = FakeDriver::new(vec![
            vec![item("Only", "https://www.seek.co.nz/job/30")],
            vec![item("Never Reached", "https://www.seek.co.nz/job/31")],
        ]);
        driver.world.lock().unwrap().fail_next_click = true;

        let store = mem_store();
        let stats = Scraper::with_timeouts(&driver, fast())
            .run(&store, None)
            .await
            .unwrap();

        assert_eq!(stats.pages, 1);
        assert_eq!(stats.saved, 1);
        assert!(store
            .find_by_url("https://www.seek.co.nz/job/31")
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn unchanged_list_after_next_is_last_page() {
        let driver = FakeDriver::new(vec![
            vec![item("Stuck", "https://www.seek.co.nz/job/40")],
            vec![item("Unreachable", "https://www.seek.co.nz/job/41")],
        ]);
        driver.world.lock().unwrap().next_click_noop = true;

        let store = mem_store();
        let stats = Scraper::with_timeouts(&driver, fast())
            .run(&store, None)
            .await
            .unwrap();

        assert_eq!(stats.pages, 1);
        assert_eq!(stats.saved, 1);
    }

    #[tokio::test]
    async fn shrunken_refetch_ends_inner_loop() {
        let driver = FakeDriver::new(vec![vec![
            item("A", "https://www.seek.co.nz/job/50"),
            item("B", "https://www.seek.co.nz/job/51"),
            item("C", "https://www.seek.co.nz/job/52"),
        ]]);
        driver.world.lock().unwrap().shrink_on_close = Some(1);

        let store = mem_store();
        let stats = Scraper::with_timeouts(&driver, fast())
            .run(&store, None)
            .await
            .unwrap();

        // First drawer close shrinks the list to one entry; the loop ends
        // instead of indexing past it.
        assert_eq!(stats.saved, 1);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_detail_fields_degrade_to_empty() {
        let mut sparse = item("Sparse", "https://www.seek.co.nz/job/60");
        sparse.detail = Detail {
            title: Some("Sparse".into()),
            ..Detail::default()
        };

        let driver = FakeDriver::new(vec![vec![sparse]]);
        let store = mem_store();
        let stats = Scraper::with_timeouts(&driver, fast())
            .run(&store, None)
            .await
            .unwrap();

        assert_eq!(stats.saved, 1);
        let rec = store
            .find_by_url("https://www.seek.co.nz/job/60")
            .unwrap()
            .unwrap();
        assert_eq!(rec.job_title, "Sparse");
        assert_eq!(rec.company, "");
        assert_eq!(rec.jd, "");
        assert_eq!(rec.posted_date, "");
        assert_eq!(rec.applied_date, "");
    }

    #[tokio::test]
    async fn detail_page_never_loading_still_yields_record() {
        let mut blank = item("Blank", "https://www.seek.co.nz/job/61");
        blank.detail = Detail::default();

        let driver = FakeDriver::new(vec![vec![blank]]);
        let store = mem_store();
        let stats = Scraper::with_timeouts(&driver, fast())
            .run(&store, None)
            .await
            .unwrap();

        assert_eq!(stats.saved, 1);
        let rec = store
            .find_by_url("https://www.seek.co.nz/job/61")
            .unwrap()
            .unwrap();
        assert_eq!(rec.job_title, "");
        assert_eq!(rec.company, "");
    }

    #[tokio::test]
    async fn relative_href_resolves_against_origin() {
        let mut relative = item("Relative", "/job/77");
        relative.detail.title = Some("Relative".into());

        let driver = FakeDriver::new(vec![vec![relative]]);
        let store = mem_store();
        Scraper::with_timeouts(&driver, fast())
            .run(&store, None)
            .await
            .unwrap();

        assert!(store
            .find_by_url("https://www.seek.co.nz/job/77")
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn page_limit_stops_pagination() {
        let driver = FakeDriver::new(vec![
            vec![item("P1", "https://www.seek.co.nz/job/80")],
            vec![item("P2", "https://www.seek.co.nz/job/81")],
        ]);
        let store = mem_store();
        let stats = Scraper::with_timeouts(&driver, fast())
            .run(&store, Some(1))
            .await
            .unwrap();

        assert_eq!(stats.pages, 1);
        assert_eq!(stats.saved, 1);
    }

    #[tokio::test]
    async fn rescrape_updates_instead_of_duplicating() {
        let pages = vec![vec![item("Stable", "https://www.seek.co.nz/job/90")]];
        let store = mem_store();

        let driver = FakeDriver::new(pages.clone());
        Scraper::with_timeouts(&driver, fast())
            .run(&store, None)
            .await
            .unwrap();
        let first = store
            .find_by_url("https://www.seek.co.nz/job/90")
            .unwrap()
            .unwrap();

        let driver = FakeDriver::new(pages);
        Scraper::with_timeouts(&driver, fast())
            .run(&store, None)
            .await
            .unwrap();

        assert_eq!(store.count().unwrap(), 1);
        let second = store
            .find_by_url("https://www.seek.co.nz/job/90")
            .unwrap()
            .unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
    }
}
