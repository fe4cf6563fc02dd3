use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{self, Write};

/// Totals for one crawl run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Listings extracted from pages, valid or not.
    pub found: usize,
    pub inserted: usize,
    pub omitted: usize,
    pub pages_ok: usize,
    /// Pages whose fetch gave up or whose storage step failed.
    pub pages_failed: usize,
    /// Pages skipped because the checkpoint says they are done.
    pub pages_resumed: usize,
}

/// Coloured, line-oriented progress output for the crawl.
pub struct CrawlReporter<W: Write = io::Stdout> {
    out: W,
}

impl CrawlReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> CrawlReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, color: Color, text: String) -> io::Result<()> {
        execute!(
            self.out,
            SetForegroundColor(color),
            Print(text),
            Print("\n"),
            ResetColor
        )
    }

    fn banner(&mut self, color: Color, title: &str) -> io::Result<()> {
        let rule = "=".repeat(60);
        self.line(color, format!("\n{}\n{}\n{}", rule, title, rule))
    }

    pub fn start(&mut self, resuming: bool, max_pages: u32) -> io::Result<()> {
        if resuming {
            self.banner(Color::Yellow, "🔄 Resuming crawl from checkpoint")
        } else {
            self.banner(
                Color::White,
                &format!("🚀 Starting crawl - up to {} pages per city", max_pages),
            )
        }
    }

    pub fn zone_started(&mut self, zone: &str) -> io::Result<()> {
        self.line(Color::White, format!("\n=== ZONE: {} ===", zone))
    }

    pub fn zone_done_before(&mut self, zone: &str) -> io::Result<()> {
        self.line(Color::DarkGrey, format!("⏭️  ZONE: {} (already done)", zone))
    }

    pub fn city_started(&mut self, city: &str) -> io::Result<()> {
        self.line(Color::White, format!("\n  → City: {}", city))
    }

    pub fn city_done_before(&mut self, city: &str) -> io::Result<()> {
        self.line(Color::DarkGrey, format!("  ⏭️  City: {} (already done)", city))
    }

    pub fn page_done_before(&mut self, page: u32, max_pages: u32) -> io::Result<()> {
        self.line(
            Color::DarkGrey,
            format!("    ⏭️  Page {}/{} (already done)", page, max_pages),
        )
    }

    pub fn page_stored(
        &mut self,
        page: u32,
        max_pages: u32,
        found: usize,
        inserted: usize,
        omitted: usize,
    ) -> io::Result<()> {
        let mut text = format!("    Page {}/{}... ✓ {} listings", page, max_pages, found);
        if inserted > 0 {
            text.push_str(&format!(" ({} new in DB)", inserted));
        }
        if omitted > 0 {
            text.push_str(&format!(" [{} omitted]", omitted));
        }
        self.line(Color::Green, text)
    }

    pub fn page_unavailable(&mut self, page: u32, max_pages: u32) -> io::Result<()> {
        self.line(
            Color::Red,
            format!("    Page {}/{}... ✗ no data, skipping this page", page, max_pages),
        )
    }

    pub fn page_failed(&mut self, page: u32, max_pages: u32, error: &str) -> io::Result<()> {
        self.line(
            Color::Red,
            format!("    Page {}/{}... ✗ Error: {}", page, max_pages, error),
        )
    }

    pub fn page_empty(&mut self, page: u32, max_pages: u32) -> io::Result<()> {
        self.line(
            Color::DarkGrey,
            format!("    Page {}/{}... no results (end of pages)", page, max_pages),
        )
    }

    pub fn city_finished(&mut self, city: &str, found: usize) -> io::Result<()> {
        self.line(Color::White, format!("    TOTAL {}: {} listings", city, found))
    }

    pub fn finished(&mut self, summary: &CrawlSummary) -> io::Result<()> {
        let rule = "=".repeat(60);
        self.line(Color::Green, format!("\n{}\n✅ CRAWL COMPLETE", rule))?;
        self.line(Color::White, format!("TOTAL FOUND: {} listings", summary.found))?;
        self.line(Color::Green, format!("INSERTED INTO DB: {}", summary.inserted))?;
        self.line(Color::Yellow, format!("OMITTED: {}", summary.omitted))?;
        if summary.pages_failed > 0 {
            self.line(Color::Red, format!("FAILED PAGES: {}", summary.pages_failed))?;
        }
        self.line(Color::Green, rule)
    }
}
