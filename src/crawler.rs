use crate::checkpoint::{CheckpointStore, Position};
use crate::extractor::{ExtractMode, ListingExtractor};
use crate::fetcher::PageSource;
use crate::models::RawListing;
use crate::registry::{Registry, Zone, DEFAULT_MAX_PAGES};
use crate::report::{CrawlReporter, CrawlSummary};
use crate::snapshot;
use crate::storage::{InsertOutcome, ListingStore};
use anyhow::Result;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub max_pages: u32,
    pub mode: ExtractMode,
    /// Where to write every listing seen during the run once it finishes.
    pub csv_backup: Option<PathBuf>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            mode: ExtractMode::default(),
            csv_backup: Some(PathBuf::from("data/data.csv")),
        }
    }
}

enum PageOutcome {
    /// The fetcher gave up on the page.
    Unavailable,
    /// The page had no listing cards.
    Empty,
    Stored {
        listings: Vec<RawListing>,
        outcome: InsertOutcome,
    },
    Failed(anyhow::Error),
}

/// Walks the registry zone by zone, city by city, page by page.
pub struct Crawler<'a, S: PageSource, W: Write> {
    source: &'a S,
    store: &'a mut ListingStore,
    checkpoints: &'a CheckpointStore,
    registry: &'a Registry,
    extractor: ListingExtractor,
    options: CrawlOptions,
    reporter: CrawlReporter<W>,
    console_broken: bool,
}

impl<'a, S: PageSource, W: Write> Crawler<'a, S, W> {
    pub fn new(
        source: &'a S,
        store: &'a mut ListingStore,
        checkpoints: &'a CheckpointStore,
        registry: &'a Registry,
        options: CrawlOptions,
        reporter: CrawlReporter<W>,
    ) -> Result<Self> {
        Ok(Self {
            source,
            store,
            checkpoints,
            registry,
            extractor: ListingExtractor::new(options.mode)?,
            options,
            reporter,
            console_broken: false,
        })
    }

    pub fn into_reporter(self) -> CrawlReporter<W> {
        self.reporter
    }

    /// Run the crawl to completion, resuming after the stored checkpoint if
    /// there is one. A failing page is reported and skipped. Console output
    /// errors are logged and never stop the crawl.
    pub fn run(&mut self) -> CrawlSummary {
        let registry = self.registry;
        let resume = self.checkpoints.resume_position(registry);
        let max_pages = self.options.max_pages;
        self.report(|r| r.start(resume.is_some(), max_pages));

        let mut summary = CrawlSummary::default();
        let mut seen: Vec<RawListing> = Vec::new();

        for (zone_index, zone) in registry.zones().iter().enumerate() {
            if resume.is_some_and(|cp| zone_index < cp.zone) {
                self.report(|r| r.zone_done_before(&zone.name));
                continue;
            }
            self.report(|r| r.zone_started(&zone.name));

            for (city_index, city) in zone.cities.iter().enumerate() {
                if resume.is_some_and(|cp| (zone_index, city_index) < (cp.zone, cp.city)) {
                    self.report(|r| r.city_done_before(city));
                    continue;
                }
                self.report(|r| r.city_started(city));
                let mut city_found = 0;

                for page in 1..=max_pages {
                    let position = Position::new(zone_index, city_index, page);
                    if resume.is_some_and(|cp| position <= cp) {
                        self.report(|r| r.page_done_before(page, max_pages));
                        summary.pages_resumed += 1;
                        continue;
                    }

                    match self.crawl_page(zone, city, page) {
                        PageOutcome::Unavailable => {
                            self.report(|r| r.page_unavailable(page, max_pages));
                            summary.pages_failed += 1;
                        }
                        PageOutcome::Empty => {
                            self.report(|r| r.page_empty(page, max_pages));
                            break;
                        }
                        PageOutcome::Failed(e) => {
                            warn!("{} / {} page {} failed: {:#}", zone.name, city, page, e);
                            self.report(|r| r.page_failed(page, max_pages, &format!("{:#}", e)));
                            summary.pages_failed += 1;
                        }
                        PageOutcome::Stored { listings, outcome } => {
                            if let Err(e) = self.checkpoints.save(&zone.name, city, page) {
                                warn!("Could not save checkpoint after page {}: {}", page, e);
                            }

                            self.report(|r| {
                                r.page_stored(
                                    page,
                                    max_pages,
                                    listings.len(),
                                    outcome.inserted,
                                    outcome.skipped(),
                                )
                            });
                            city_found += listings.len();
                            summary.found += listings.len();
                            summary.inserted += outcome.inserted;
                            summary.omitted += outcome.skipped();
                            summary.pages_ok += 1;
                            seen.extend(listings);
                        }
                    }
                }

                self.report(|r| r.city_finished(city, city_found));
            }
        }

        if let Err(e) = self.checkpoints.clear() {
            warn!("Could not remove checkpoint: {}", e);
        }

        self.report(|r| r.finished(&summary));
        self.write_backup(&seen);

        info!(
            "Crawl finished: {} found, {} inserted, {} omitted, {} pages failed",
            summary.found, summary.inserted, summary.omitted, summary.pages_failed
        );
        summary
    }

    /// Console output is best effort: the first failure is logged and the
    /// reporter is muted for the rest of the run.
    fn report(&mut self, line: impl FnOnce(&mut CrawlReporter<W>) -> io::Result<()>) {
        if self.console_broken {
            return;
        }
        if let Err(e) = line(&mut self.reporter) {
            warn!("Console output failed, continuing without progress lines: {}", e);
            self.console_broken = true;
        }
    }

    fn crawl_page(&mut self, zone: &Zone, city: &str, page: u32) -> PageOutcome {
        let url = self.registry.page_url(zone, city, page);
        debug!("Crawling {}", url);

        let Some(html) = self.source.fetch_page(&url) else {
            return PageOutcome::Unavailable;
        };

        let extracted = self.extractor.extract_page(&html, &zone.name, city);
        if extracted.is_empty() {
            return PageOutcome::Empty;
        }

        match self.store.insert_batch(&extracted.listings) {
            Ok(outcome) => PageOutcome::Stored {
                listings: extracted.listings,
                outcome,
            },
            Err(e) => PageOutcome::Failed(e.into()),
        }
    }

    fn write_backup(&self, seen: &[RawListing]) {
        let Some(path) = &self.options.csv_backup else {
            return;
        };
        if seen.is_empty() {
            info!("No listings collected this run, CSV backup not written");
            return;
        }
        if let Err(e) = snapshot::save_listings_to_csv(seen, path) {
            warn!("Could not write CSV backup to {}: {:#}", path.display(), e);
        }
    }
}
