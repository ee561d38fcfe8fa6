use regex::Regex;

pub const DEFAULT_PROMO_MARKER: &str = "PR";

/// Turns raw company names into their dedup key.
///
/// Trims, drops the promotional marker (case-insensitive), collapses every
/// whitespace run to one space and trims again. The marker only counts when
/// neither neighbour is an ASCII letter or digit, so it is removed from
/// "PR Acme" and "PR株式会社サンプル" but kept inside "PRISM".
#[derive(Debug, Clone)]
pub struct Normalizer {
    marker: Option<Regex>,
    whitespace: Regex,
}

impl Normalizer {
    pub fn new(promo_marker: &str) -> Self {
        let marker = promo_marker.trim();
        let marker = if marker.is_empty() {
            None
        } else {
            Regex::new(&format!("(?i){}", regex::escape(marker))).ok()
        };
        Normalizer {
            marker,
            whitespace: Regex::new(r"\s+").expect("static whitespace pattern"),
        }
    }

    pub fn normalize(&self, raw: &str) -> String {
        let mut name = raw.trim().to_string();
        if let Some(re) = &self.marker {
            // Repeat until stable so a key normalizes to itself.
            loop {
                let stripped = strip_marker(re, &name);
                if stripped == name {
                    break;
                }
                name = stripped;
            }
        }
        self.whitespace.replace_all(&name, " ").trim().to_string()
    }
}

fn is_boundary(c: Option<char>) -> bool {
    c.map_or(true, |c| !c.is_ascii_alphanumeric())
}

fn strip_marker(re: &Regex, name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last = 0;
    for m in re.find_iter(name) {
        let before = name[..m.start()].chars().next_back();
        let after = name[m.end()..].chars().next();
        if is_boundary(before) && is_boundary(after) {
            out.push_str(&name[last..m.start()]);
            // Keeps the neighbouring tokens apart.
            out.push(' ');
            last = m.end();
        }
    }
    out.push_str(&name[last..]);
    out
}

impl Default for Normalizer {
    fn default() -> Self {
        Normalizer::new(DEFAULT_PROMO_MARKER)
    }
}
