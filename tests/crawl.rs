use casafinder::checkpoint::{Checkpoint, CheckpointStore};
use casafinder::crawler::{CrawlOptions, Crawler};
use casafinder::extractor::ExtractMode;
use casafinder::fetcher::PageSource;
use casafinder::registry::{Registry, UrlLayout, Zone};
use casafinder::report::{CrawlReporter, CrawlSummary};
use casafinder::snapshot;
use casafinder::storage::ListingStore;
use std::cell::RefCell;
use std::collections::HashSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Serves one listing card per page, keyed by the page URL, and records
/// every request along with the checkpoint on disk at that moment.
struct FakeSite {
    empty: HashSet<String>,
    unavailable: HashSet<String>,
    checkpoints: CheckpointStore,
    requests: RefCell<Vec<(String, Option<Checkpoint>)>>,
}

impl FakeSite {
    fn new(checkpoints: CheckpointStore) -> Self {
        Self {
            empty: HashSet::new(),
            unavailable: HashSet::new(),
            checkpoints,
            requests: RefCell::new(Vec::new()),
        }
    }

    fn urls(&self) -> Vec<String> {
        self.requests.borrow().iter().map(|(url, _)| url.clone()).collect()
    }
}

impl PageSource for FakeSite {
    fn fetch_page(&self, url: &str) -> Option<String> {
        let checkpoint = self.checkpoints.load().unwrap();
        self.requests.borrow_mut().push((url.to_string(), checkpoint));

        if self.unavailable.contains(url) {
            return None;
        }
        if self.empty.contains(url) {
            return Some("<html><body><p>No hay publicaciones</p></body></html>".to_string());
        }
        Some(format!(
            r#"<html><body><div class="poly-card__content">
                <a href="{url}#card">Casa</a>
                <div class="poly-price__current"><span class="andes-money-amount__fraction">120.000</span></div>
                <ul class="poly-attributes_list"><li>3 dormitorios</li><li>2 baños</li><li>150 m² cubiertos</li></ul>
            </div></body></html>"#,
            url = url
        ))
    }
}

struct Fixture {
    _dir: TempDir,
    db: PathBuf,
    csv: PathBuf,
    registry: Registry,
}

impl Fixture {
    fn new() -> Self {
        Self::with_registry(Registry::new(
            "http://test",
            vec![
                Zone::new("Z1", "z1", UrlLayout::Standard, &["c1", "c2"]),
                Zone::new("Z2", "z2", UrlLayout::Nested, &["c1", "c2"]),
            ],
        ))
    }

    fn with_registry(registry: Registry) -> Self {
        let dir = tempfile::tempdir().unwrap();
        Self {
            db: dir.path().join("listings.db"),
            csv: dir.path().join("backup").join("data.csv"),
            _dir: dir,
            registry,
        }
    }

    fn checkpoints(&self) -> CheckpointStore {
        CheckpointStore::for_database(&self.db)
    }

    fn url(&self, zone: &str, city: &str, page: u32) -> String {
        self.registry
            .page_url(self.registry.zone(zone).unwrap(), city, page)
    }

    fn urls(&self, zone: &str, city: &str, pages: std::ops::RangeInclusive<u32>) -> Vec<String> {
        pages.map(|page| self.url(zone, city, page)).collect()
    }

    fn run(&self, site: &FakeSite, max_pages: u32) -> (CrawlSummary, String) {
        let mut store = ListingStore::open(&self.db).unwrap();
        let (summary, output) = self.crawl(site, &mut store, &self.checkpoints(), max_pages, Vec::new());
        (summary, String::from_utf8(output).unwrap())
    }

    fn crawl<W: Write>(
        &self,
        site: &FakeSite,
        store: &mut ListingStore,
        checkpoints: &CheckpointStore,
        max_pages: u32,
        out: W,
    ) -> (CrawlSummary, W) {
        let options = CrawlOptions {
            max_pages,
            mode: ExtractMode::Incremental,
            csv_backup: Some(self.csv.clone()),
        };
        let mut crawler = Crawler::new(
            site,
            store,
            checkpoints,
            &self.registry,
            options,
            CrawlReporter::new(out),
        )
        .unwrap();
        let summary = crawler.run();
        (summary, crawler.into_reporter().into_inner())
    }

    fn stored(&self) -> i64 {
        ListingStore::open(&self.db).unwrap().count().unwrap()
    }
}

fn stored_in(db: &Path) -> ListingStore {
    ListingStore::open(db).unwrap()
}

/// Accepts a fixed number of writes, then fails like a closed pipe.
struct ClosingPipe {
    writes_left: usize,
    attempts: usize,
}

impl ClosingPipe {
    fn after(writes: usize) -> Self {
        Self {
            writes_left: writes,
            attempts: 0,
        }
    }
}

impl Write for ClosingPipe {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.attempts += 1;
        if self.writes_left == 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
        }
        self.writes_left -= 1;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.writes_left == 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
        }
        Ok(())
    }
}

#[test]
fn test_full_crawl_visits_every_page_in_order() {
    let fixture = Fixture::new();
    let site = FakeSite::new(fixture.checkpoints());

    let (summary, output) = fixture.run(&site, 2);

    let mut expected = Vec::new();
    for (zone, city) in [("Z1", "c1"), ("Z1", "c2"), ("Z2", "c1"), ("Z2", "c2")] {
        expected.extend(fixture.urls(zone, city, 1..=2));
    }
    assert_eq!(site.urls(), expected);
    assert_eq!(expected[4], "http://test/venta/z2/c1/");
    assert_eq!(summary.found, 8);
    assert_eq!(summary.inserted, 8);
    assert_eq!(summary.pages_ok, 8);
    assert_eq!(summary.pages_failed, 0);
    assert_eq!(fixture.stored(), 8);
    assert!(output.contains("CRAWL COMPLETE"));
}

#[test]
fn test_resume_skips_everything_up_to_the_checkpoint() {
    let fixture = Fixture::new();
    fixture.checkpoints().save("Z2", "c1", 3).unwrap();
    let site = FakeSite::new(fixture.checkpoints());

    let (summary, output) = fixture.run(&site, 5);

    let mut expected = fixture.urls("Z2", "c1", 4..=5);
    expected.extend(fixture.urls("Z2", "c2", 1..=5));
    assert_eq!(site.urls(), expected);
    assert_eq!(summary.pages_resumed, 3);
    assert_eq!(summary.pages_ok, 7);
    assert!(output.contains("Resuming crawl from checkpoint"));
    assert!(output.contains("ZONE: Z1 (already done)"));
}

#[test]
fn test_checkpoint_tracks_last_stored_page_and_is_cleared_at_the_end() {
    let fixture = Fixture::new();
    let site = FakeSite::new(fixture.checkpoints());

    fixture.run(&site, 2);

    let requests = site.requests.borrow();
    assert_eq!(requests[0].1, None);
    let before_second = requests[1].1.as_ref().unwrap();
    assert_eq!((before_second.zone.as_str(), before_second.city.as_str(), before_second.page), ("Z1", "c1", 1));
    let before_last = requests[7].1.as_ref().unwrap();
    assert_eq!((before_last.zone.as_str(), before_last.city.as_str(), before_last.page), ("Z2", "c2", 1));

    assert_eq!(fixture.checkpoints().load().unwrap(), None);
}

#[test]
fn test_unknown_checkpoint_starts_over() {
    let fixture = Fixture::new();
    fixture.checkpoints().save("Z9", "c1", 3).unwrap();
    let site = FakeSite::new(fixture.checkpoints());

    let (summary, _) = fixture.run(&site, 1);

    assert_eq!(site.urls()[0], fixture.url("Z1", "c1", 1));
    assert_eq!(summary.pages_resumed, 0);
    assert_eq!(summary.pages_ok, 4);
}

#[test]
fn test_empty_page_ends_the_city() {
    let fixture = Fixture::new();
    let mut site = FakeSite::new(fixture.checkpoints());
    site.empty.insert(fixture.url("Z1", "c1", 2));

    let (summary, output) = fixture.run(&site, 3);

    let urls = site.urls();
    assert!(urls.contains(&fixture.url("Z1", "c1", 2)));
    assert!(!urls.contains(&fixture.url("Z1", "c1", 3)));
    assert!(urls.contains(&fixture.url("Z1", "c2", 1)));
    assert_eq!(urls.len(), 2 + 3 * 3);
    assert_eq!(summary.pages_failed, 0);
    assert!(output.contains("no results (end of pages)"));
}

#[test]
fn test_unavailable_page_is_skipped_not_fatal() {
    let fixture = Fixture::new();
    let mut site = FakeSite::new(fixture.checkpoints());
    site.unavailable.insert(fixture.url("Z1", "c1", 2));

    let (summary, output) = fixture.run(&site, 3);

    assert!(site.urls().contains(&fixture.url("Z1", "c1", 3)));
    assert_eq!(summary.pages_failed, 1);
    assert_eq!(summary.pages_ok, 11);
    assert_eq!(fixture.stored(), 11);
    assert!(output.contains("no data, skipping this page"));
    assert!(output.contains("FAILED PAGES: 1"));
}

#[test]
fn test_second_run_inserts_nothing_new() {
    let fixture = Fixture::new();

    let first = fixture.run(&FakeSite::new(fixture.checkpoints()), 2).0;
    let second = fixture.run(&FakeSite::new(fixture.checkpoints()), 2).0;

    assert_eq!(first.inserted, 8);
    assert_eq!(second.found, 8);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.omitted, 8);
    assert_eq!(fixture.stored(), 8);
}

#[test]
fn test_run_writes_csv_backup_of_everything_seen() {
    let fixture = Fixture::new();
    let site = FakeSite::new(fixture.checkpoints());

    fixture.run(&site, 1);

    let backup = snapshot::load_listings_from_csv(&fixture.csv).unwrap();
    assert_eq!(backup.len(), 4);
    assert_eq!(backup[0].zone, "Z1");
    assert_eq!(backup[0].price.as_deref(), Some("120.000"));

    let stored = stored_in(&fixture.db).all().unwrap();
    assert_eq!(stored[0].price, 120_000);
    assert_eq!(stored[0].price_per_area, Some(800.0));
}

#[test]
fn test_closed_console_does_not_stop_the_crawl() {
    let fixture = Fixture::new();
    let site = FakeSite::new(fixture.checkpoints());
    let mut store = ListingStore::open(&fixture.db).unwrap();

    let (summary, pipe) = fixture.crawl(&site, &mut store, &fixture.checkpoints(), 3, ClosingPipe::after(40));

    assert_eq!(site.urls().len(), 12);
    assert_eq!(summary.pages_ok, 12);
    assert_eq!(store.count().unwrap(), 12);
    assert_eq!(fixture.checkpoints().load().unwrap(), None);
    // Muted after the first failure.
    assert!(pipe.attempts <= 41);
}

#[test]
fn test_stored_page_is_checkpointed_even_without_console() {
    let fixture = Fixture::new();
    let site = FakeSite::new(fixture.checkpoints());
    let mut store = ListingStore::open(&fixture.db).unwrap();

    fixture.crawl(&site, &mut store, &fixture.checkpoints(), 3, ClosingPipe::after(0));

    let requests = site.requests.borrow();
    let before_third = requests[2].1.as_ref().unwrap();
    assert_eq!((before_third.city.as_str(), before_third.page), ("c1", 2));
}

#[test]
fn test_locked_database_fails_pages_without_aborting() {
    let fixture = Fixture::with_registry(Registry::new(
        "http://test",
        vec![Zone::new("Z1", "z1", UrlLayout::Standard, &["c1"])],
    ));
    let site = FakeSite::new(fixture.checkpoints());
    let mut store = ListingStore::open(&fixture.db).unwrap();

    let locker = rusqlite::Connection::open(&fixture.db).unwrap();
    locker.execute_batch("BEGIN EXCLUSIVE;").unwrap();

    let (summary, output) = fixture.crawl(&site, &mut store, &fixture.checkpoints(), 2, Vec::new());
    let output = String::from_utf8(output).unwrap();

    assert_eq!(site.urls().len(), 2);
    assert_eq!(summary.pages_ok, 0);
    assert_eq!(summary.pages_failed, 2);
    assert!(output.contains("✗ Error"));
    assert_eq!(fixture.checkpoints().load().unwrap(), None);
    assert!(!fixture.csv.exists());

    drop(locker);
    assert_eq!(store.count().unwrap(), 0);
}

#[test]
fn test_unwritable_checkpoint_does_not_stop_the_crawl() {
    let fixture = Fixture::new();
    let checkpoints = CheckpointStore::new(fixture.db.with_file_name("missing").join("cp.json"));
    let site = FakeSite::new(checkpoints.clone());
    let mut store = ListingStore::open(&fixture.db).unwrap();

    let (summary, _) = fixture.crawl(&site, &mut store, &checkpoints, 1, Vec::new());

    assert_eq!(summary.pages_ok, 4);
    assert_eq!(summary.pages_failed, 0);
    assert_eq!(store.count().unwrap(), 4);
    assert_eq!(checkpoints.load().unwrap(), None);
}
