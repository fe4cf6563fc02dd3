use crate::models::RawListing;
use crate::parser::{parse_characteristics, Characteristics};
use anyhow::{anyhow, Result};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

const CARD_SELECTOR: &str = "div.poly-card__content";
const PRICE_SELECTOR: &str = "div.poly-price__current span.andes-money-amount__fraction";
const ATTRIBUTE_SELECTOR: &str = "ul.poly-attributes_list li";
const LINK_SELECTOR: &str = "a[href]";

/// Minimum recognized characteristics for a card to survive [`ExtractMode::Strict`].
pub const STRICT_MIN_CHARACTERISTICS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractMode {
    /// Emit every card, with null fields where the card lacks data.
    #[default]
    Incremental,
    /// Drop cards with fewer than [`STRICT_MIN_CHARACTERISTICS`] recognized fields.
    Strict,
}

/// What one results page yielded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedPage {
    /// Listing cards present in the markup, kept or not.
    pub cards: usize,
    pub listings: Vec<RawListing>,
}

impl ExtractedPage {
    /// No cards at all; the crawl reads this as the end of a city's results.
    pub fn is_empty(&self) -> bool {
        self.cards == 0
    }
}

pub struct ListingExtractor {
    mode: ExtractMode,
    card: Selector,
    price: Selector,
    attributes: Selector,
    link: Selector,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Failed to parse selector {}: {:?}", css, e))
}

impl ListingExtractor {
    pub fn new(mode: ExtractMode) -> Result<Self> {
        Ok(Self {
            mode,
            card: selector(CARD_SELECTOR)?,
            price: selector(PRICE_SELECTOR)?,
            attributes: selector(ATTRIBUTE_SELECTOR)?,
            link: selector(LINK_SELECTOR)?,
        })
    }

    /// Lazily walk the listing cards of an already parsed page.
    pub fn extract<'a>(
        &'a self,
        document: &'a Html,
        zone: &'a str,
        city: &'a str,
    ) -> impl Iterator<Item = RawListing> + 'a {
        document
            .select(&self.card)
            .filter_map(move |card| self.extract_card(card, zone, city))
    }

    /// Parse `html` and collect every listing on it.
    pub fn extract_page(&self, html: &str, zone: &str, city: &str) -> ExtractedPage {
        let document = Html::parse_document(html);
        let cards = document.select(&self.card).count();
        let listings: Vec<RawListing> = self.extract(&document, zone, city).collect();
        debug!(
            "Extracted {} listings from {} cards for {}/{}",
            listings.len(),
            cards,
            zone,
            city
        );
        ExtractedPage { cards, listings }
    }

    fn extract_card(&self, card: ElementRef<'_>, zone: &str, city: &str) -> Option<RawListing> {
        let price = self.extract_price(card);
        let snippets = self.extract_snippets(card);
        let characteristics = parse_characteristics(&snippets);

        if self.mode == ExtractMode::Strict
            && characteristics.recognized() < STRICT_MIN_CHARACTERISTICS
        {
            debug!(
                "Dropping card with {} recognized characteristics: {:?}",
                characteristics.recognized(),
                snippets
            );
            return None;
        }

        let Characteristics {
            rooms,
            bathrooms,
            area,
        } = characteristics;

        Some(RawListing {
            price,
            rooms,
            bathrooms,
            area,
            url: self.extract_url(card),
            ..RawListing::new(zone, city)
        })
    }

    fn extract_price(&self, card: ElementRef<'_>) -> Option<String> {
        let text = card.select(&self.price).next()?.text().collect::<String>();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    fn extract_snippets(&self, card: ElementRef<'_>) -> Vec<String> {
        card.select(&self.attributes)
            .map(|li| li.text().collect::<Vec<_>>().join(" ").trim().to_string())
            .collect()
    }

    fn extract_url(&self, card: ElementRef<'_>) -> Option<String> {
        card.select(&self.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(|href| href.to_string())
    }
}
