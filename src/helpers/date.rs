//! Locale-aware date formatting
//!
//! Display dates use date-fns style long-format tokens (`P`, `PP`, `PPP`,
//! `p` and their combinations such as `PPPp`), expanded per locale into
//! chrono format strings.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use chrono_tz::Tz;

/// Locales the site can be rendered in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayLocale {
    PtBr,
    EnUs,
}

impl DisplayLocale {
    /// Resolve a language tag such as `pt-BR`, `pt_BR` or `en`
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.to_ascii_lowercase().replace('_', "-");
        if tag == "pt" || tag.starts_with("pt-") {
            DisplayLocale::PtBr
        } else {
            DisplayLocale::EnUs
        }
    }

    fn chrono(self) -> chrono::Locale {
        match self {
            DisplayLocale::PtBr => chrono::Locale::pt_BR,
            DisplayLocale::EnUs => chrono::Locale::en_US,
        }
    }

    /// Expansion of a single long-format token
    fn token(self, token: &str) -> Option<&'static str> {
        let expanded = match (self, token) {
            (DisplayLocale::PtBr, "P") => "%d/%m/%Y",
            (DisplayLocale::PtBr, "PP") => "%-d de %B de %Y",
            (DisplayLocale::PtBr, "PPP") => "%-d de %B de %Y",
            (DisplayLocale::PtBr, "p") => "%H:%M",
            (DisplayLocale::PtBr, "PPPp") => "%-d de %B de %Y às %H:%M",
            (DisplayLocale::PtBr, "PPp") => "%-d de %B de %Y, %H:%M",
            (DisplayLocale::EnUs, "P") => "%m/%d/%Y",
            (DisplayLocale::EnUs, "PP") => "%b %-d, %Y",
            (DisplayLocale::EnUs, "PPP") => "%B %-d, %Y",
            (DisplayLocale::EnUs, "p") => "%-I:%M %p",
            (DisplayLocale::EnUs, "PPPp") => "%B %-d, %Y at %-I:%M %p",
            (DisplayLocale::EnUs, "PPp") => "%b %-d, %Y, %-I:%M %p",
            _ => return None,
        };
        Some(expanded)
    }
}

/// Formats UTC timestamps for display in a locale and timezone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateFormatter {
    locale: DisplayLocale,
    tz: Tz,
}

impl DateFormatter {
    pub fn new(locale: DisplayLocale, tz: Tz) -> Self {
        Self { locale, tz }
    }

    /// Format with a date-fns style pattern
    pub fn format(&self, date: &DateTime<Utc>, pattern: &str) -> String {
        let format = date_fns_to_chrono(pattern, self.locale);
        date.with_timezone(&self.tz)
            .format_localized(&format, self.locale.chrono())
            .to_string()
    }

    /// Medium date, e.g. "1 de maio de 2021"
    pub fn date(&self, date: &DateTime<Utc>) -> String {
        self.format(date, "PP")
    }

    /// Long date with time, e.g. "1 de maio de 2021 às 14:30"
    pub fn date_time(&self, date: &DateTime<Utc>) -> String {
        self.format(date, "PPPp")
    }
}

impl Default for DateFormatter {
    fn default() -> Self {
        Self::new(DisplayLocale::PtBr, Tz::UTC)
    }
}

/// Parse a CMS timestamp: RFC 3339 or the `+0000` offset form the API uses
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::<FixedOffset>::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Convert date-fns long-format tokens to a chrono format string.
/// Anything that is not a token is kept literally.
fn date_fns_to_chrono(format: &str, locale: DisplayLocale) -> String {
    // Longest first so `PPPp` is not read as `PPP` followed by `p`
    const TOKENS: [&str; 6] = ["PPPp", "PPp", "PPP", "PP", "P", "p"];

    let mut result = String::with_capacity(format.len() * 2);
    let mut rest = format;

    'outer: while !rest.is_empty() {
        for token in TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                if let Some(expanded) = locale.token(token) {
                    result.push_str(expanded);
                    rest = tail;
                    continue 'outer;
                }
            }
        }

        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            if c == '%' {
                result.push_str("%%");
            } else {
                result.push(c);
            }
        }
        rest = chars.as_str();
    }

    result
}
