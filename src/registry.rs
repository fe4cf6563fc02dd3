//! Static zone → city enumeration and page URL generation.
//!
//! The registry is built once and never mutated; its order is the crawl order.

pub const BASE_URL: &str = "https://inmuebles.mercadolibre.com.ar/casas/venta";

/// Listings per result page on the site; used to compute the `_Desde_` offset.
pub const LISTINGS_PER_PAGE: u32 = 48;

pub const DEFAULT_MAX_PAGES: u32 = 42;

/// How a zone's listing URLs are laid out under [`BASE_URL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlLayout {
    /// `{base}/{zone}/{city}/`
    Standard,
    /// `{base}/venta/{zone}/{city}/`
    Nested,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    pub name: String,
    pub slug: String,
    pub layout: UrlLayout,
    pub cities: Vec<String>,
}

impl Zone {
    pub fn new(name: &str, slug: &str, layout: UrlLayout, cities: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            slug: slug.to_string(),
            layout,
            cities: cities.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn city_index(&self, city: &str) -> Option<usize> {
        self.cities.iter().position(|c| c == city)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    base_url: String,
    zones: Vec<Zone>,
}

impl Registry {
    pub fn new(base_url: &str, zones: Vec<Zone>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            zones,
        }
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zone(&self, name: &str) -> Option<&Zone> {
        self.zones.iter().find(|z| z.name == name)
    }

    pub fn zone_index(&self, name: &str) -> Option<usize> {
        self.zones.iter().position(|z| z.name == name)
    }

    /// Zone a city belongs to. First zone wins when a city slug repeats.
    pub fn zone_for_city(&self, city: &str) -> Option<&str> {
        self.zones
            .iter()
            .find(|z| z.city_index(city).is_some())
            .map(|z| z.name.as_str())
    }

    pub fn is_known(&self, zone: &str, city: &str) -> bool {
        self.zone(zone)
            .map(|z| z.city_index(city).is_some())
            .unwrap_or(false)
    }

    pub fn page_url(&self, zone: &Zone, city: &str, page: u32) -> String {
        let suffix = if page <= 1 {
            String::new()
        } else {
            format!("_Desde_{}", (page - 1) * LISTINGS_PER_PAGE + 1)
        };

        match zone.layout {
            UrlLayout::Standard => format!("{}/{}/{}/{}", self.base_url, zone.slug, city, suffix),
            UrlLayout::Nested => {
                format!("{}/venta/{}/{}/{}", self.base_url, zone.slug, city, suffix)
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(
            BASE_URL,
            vec![
                Zone::new(
                    "GBA Norte",
                    "bsas-gba-norte",
                    UrlLayout::Standard,
                    &[
                        "pilar",
                        "escobar",
                        "tigre",
                        "san-isidro",
                        "san-miguel",
                        "general-san-martin",
                        "vicente-lopez",
                        "malvinas-argentina",
                        "san-fernando",
                    ],
                ),
                Zone::new(
                    "GBA Oeste",
                    "bsas-gba-oeste",
                    UrlLayout::Standard,
                    &[
                        "la-matanza",
                        "moron",
                        "ituzaingo",
                        "moreno",
                        "merlo",
                        "castelar",
                        "tres-de-febrero",
                        "hurlingham",
                    ],
                ),
                Zone::new(
                    "GBA Sur",
                    "bsas-gba-sur",
                    UrlLayout::Standard,
                    &[
                        "la-plata",
                        "esteban-echeverria",
                        "quilmes",
                        "lomas-de-zamora",
                        "ezeiza",
                        "berazategui",
                        "lanus",
                        "almirante-brown",
                        "avellaneda",
                    ],
                ),
                Zone::new(
                    "Córdoba",
                    "cordoba",
                    UrlLayout::Standard,
                    &["cordoba", "punilla", "colon", "villa-carlos-paz", "santa-maria"],
                ),
                Zone::new(
                    "Costa Atlántica",
                    "bsas-costa-atlantica",
                    UrlLayout::Standard,
                    &[
                        "mar-del-plata",
                        "costa-esmeralda",
                        "pinamar",
                        "mar-del-tuyu",
                        "villa-gesell",
                        "mar-de-ajo",
                    ],
                ),
                Zone::new(
                    "Buenos Aires Interior",
                    "buenos-aires-interior",
                    UrlLayout::Nested,
                    &["lujan", "san-vicente"],
                ),
            ],
        )
    }
}
