use lazy_regex::{regex, regex_captures};
use scraper::Html;
use url::Url;

/// Identity form of a URL: scheme folded to https, host lowercased, default
/// port, fragment and trailing slash dropped.
pub fn normalize_url(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    let port = match url.port() {
        Some(port) if port != 80 && port != 443 => format!(":{}", port),
        _ => String::new(),
    };
    let path = url.path().trim_end_matches('/');
    let query = url.query().map(|q| format!("?{}", q)).unwrap_or_default();
    format!("https://{}{}{}{}", host, port, path, query)
}

/// Decodes entities, strips inline markup and collapses whitespace.
pub(crate) fn clean_text(s: &str) -> String {
    let text = if s.contains('&') || s.contains('<') {
        Html::parse_fragment(s)
            .root_element()
            .text()
            .collect::<String>()
    } else {
        s.to_string()
    };
    regex!(r"\s+").replace_all(&text, " ").trim().to_string()
}

/// Reads durations such as "75 minutes", "1 hr 15 mins" or "45". `None` when
/// the total does not fit.
pub(crate) fn parse_minutes(s: &str) -> Option<u32> {
    let hours = regex_captures!(r"(?i)(\d+)\s*(?:h|hr|hrs|hour|hours)\b", s)
        .and_then(|(_, h)| h.parse::<u32>().ok());
    let minutes = regex_captures!(r"(?i)(\d+)\s*(?:m|min|mins|minute|minutes)\b", s)
        .and_then(|(_, m)| m.parse::<u32>().ok());

    match (hours, minutes) {
        (None, None) => regex_captures!(r"^\s*(\d+)\s*$", s).and_then(|(_, m)| m.parse().ok()),
        (h, m) => h.unwrap_or(0).checked_mul(60)?.checked_add(m.unwrap_or(0)),
    }
}

/// 75 becomes "PT1H15M".
pub(crate) fn minutes_to_iso_duration(minutes: u32) -> String {
    let (h, m) = (minutes / 60, minutes % 60);
    match (h, m) {
        (0, m) => format!("PT{}M", m),
        (h, 0) => format!("PT{}H", h),
        (h, m) => format!("PT{}H{}M", h, m),
    }
}
