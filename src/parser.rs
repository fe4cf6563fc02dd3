use regex::Regex;
use std::sync::OnceLock;

/// Typed fields recovered from a listing's attribute snippets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Characteristics {
    pub rooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub area: Option<u32>,
}

impl Characteristics {
    /// How many of the three fields were filled in.
    pub fn recognized(&self) -> usize {
        [self.rooms, self.bathrooms, self.area]
            .iter()
            .filter(|v| v.is_some())
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Rooms,
    Bathrooms,
    Area,
}

fn digits() -> &'static Regex {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new(r"[0-9]+").expect("digit pattern is valid"))
}

fn classify(text: &str) -> Option<Kind> {
    let lower = text.to_lowercase();
    if lower.contains("dorm") || lower.contains("amb") {
        Some(Kind::Rooms)
    } else if lower.contains("baño") {
        Some(Kind::Bathrooms)
    } else if lower.contains("m²") || lower.contains("m2") {
        Some(Kind::Area)
    } else {
        None
    }
}

/// First run of ASCII digits in `text`.
pub fn first_number(text: &str) -> Option<u32> {
    digits().find(text)?.as_str().parse().ok()
}

/// Turn snippets like `["3 dormitorios", "2 baños", "120 m² cubiertos"]` into
/// typed fields. Snippets without digits or without a known keyword are
/// ignored. When two snippets hit the same field the first one is kept.
pub fn parse_characteristics<S: AsRef<str>>(snippets: &[S]) -> Characteristics {
    let mut result = Characteristics::default();

    for snippet in snippets {
        let text = snippet.as_ref();
        let Some(number) = first_number(text) else {
            continue;
        };

        let slot = match classify(text) {
            Some(Kind::Rooms) => &mut result.rooms,
            Some(Kind::Bathrooms) => &mut result.bathrooms,
            Some(Kind::Area) => &mut result.area,
            None => continue,
        };

        if slot.is_none() {
            *slot = Some(number);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_typical_card() {
        let parsed = parse_characteristics(&["3 dormitorios", "2 baños", "120 m² cubiertos"]);
        assert_eq!(
            parsed,
            Characteristics {
                rooms: Some(3),
                bathrooms: Some(2),
                area: Some(120),
            }
        );
        assert_eq!(parsed.recognized(), 3);
    }

    #[test]
    fn test_ambientes_count_as_rooms() {
        let parsed = parse_characteristics(&["4 ambientes", "300 m2 totales"]);
        assert_eq!(parsed.rooms, Some(4));
        assert_eq!(parsed.area, Some(300));
        assert_eq!(parsed.bathrooms, None);
    }

    #[test]
    fn test_snippet_without_digits_is_ignored() {
        let parsed = parse_characteristics(&["Monoambiente", "1 baño"]);
        assert_eq!(parsed.rooms, None);
        assert_eq!(parsed.bathrooms, Some(1));
    }

    #[test]
    fn test_unknown_keyword_is_ignored() {
        let parsed = parse_characteristics(&["2 cocheras"]);
        assert_eq!(parsed, Characteristics::default());
        assert_eq!(parsed.recognized(), 0);
    }

    #[test]
    fn test_first_match_wins() {
        let parsed = parse_characteristics(&["150 m² cubiertos", "600 m² totales"]);
        assert_eq!(parsed.area, Some(150));
    }

    #[test]
    fn test_rooms_keyword_takes_precedence_over_area() {
        // "amb" is checked before "m²", as on the site's cards.
        let parsed = parse_characteristics(&["5 amb. 200 m²"]);
        assert_eq!(parsed.rooms, Some(5));
        assert_eq!(parsed.area, None);
    }

    #[test]
    fn test_first_number_uses_first_run() {
        assert_eq!(first_number("1.200 m²"), Some(1));
        assert_eq!(first_number("sin datos"), None);
        assert_eq!(first_number("99999999999 m²"), None);
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let parsed = parse_characteristics(&["2 Dormitorios", "1 BAÑO"]);
        assert_eq!(parsed.rooms, Some(2));
        assert_eq!(parsed.bathrooms, Some(1));
    }
}
