//! Capture normalization and digesting.
//!
//! Two runs of the same command at the same commit must hash identically,
//! so wall-clock noise is removed from the capture before hashing. The
//! artifact written to disk keeps the raw bytes; only the digest sees the
//! normalized form. The rules below define the digest equivalence relation:
//!
//! - lines reporting wall-clock accounting are dropped entirely
//!   (`real`/`user`/`sys` lines from time(1), `Test run by ... on ...`
//!   headers, `started/completed/finished at ...` trailers);
//! - inline elapsed-time tokens (`12.345s`, `3 seconds`, `512 ms`) are
//!   rewritten to `<elapsed>`;
//! - RFC-3339-style timestamps are rewritten to `<timestamp>`;
//! - trailing whitespace is stripped from every line.

use regex::Regex;
use sha2::{Digest, Sha256};

pub struct Normalizer {
    drop: Vec<Regex>,
    scrub: Vec<(Regex, &'static str)>,
}

impl Default for Normalizer {
    fn default() -> Self {
        let drop = vec![
            Regex::new(r"^(real|user|sys)\s+[0-9]").expect("static pattern is valid"),
            Regex::new(r"(?i)^test run by \S+ on ").expect("static pattern is valid"),
            Regex::new(r"(?i)^(started|completed|finished) at ").expect("static pattern is valid"),
        ];
        let scrub = vec![
            (
                Regex::new(r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:?\d{2})?")
                    .expect("static pattern is valid"),
                "<timestamp>",
            ),
            (
                Regex::new(r"\b\d+(\.\d+)?\s*(seconds?|secs?|milliseconds?|ms|s)\b")
                    .expect("static pattern is valid"),
                "<elapsed>",
            ),
        ];
        Self { drop, scrub }
    }
}

impl Normalizer {
    /// Normalize a raw capture per the module rules.
    pub fn normalize(&self, raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        for line in raw.lines() {
            if self.drop.iter().any(|re| re.is_match(line)) {
                continue;
            }
            let mut line = line.trim_end().to_string();
            for (re, replacement) in &self.scrub {
                line = re.replace_all(&line, *replacement).into_owned();
            }
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}

/// Hex SHA-256 of normalized content. The fixed-width equivalence key the
/// whole engine bisects over.
pub fn content_digest(normalized: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}
