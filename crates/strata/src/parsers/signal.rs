//! Shared signal scanning: depth label patterns, material vocabulary, and
//! color keywords.
//!
//! Both format parsers reduce cells or text lines to the same three signals
//! (depth, material, color) through a [`SignalScanner`]. The material and
//! color vocabularies are injected configuration data; the depth patterns are
//! fixed syntax.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// `depth: 12.5 ft` style labels.
static DEPTH_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bdepth\s*[:=]?\s*(-?\d+(?:\.\d+)?)\s*(ft\b|feet\b|foot\b|meters?\b|metres?\b|m\b|')?")
        .expect("depth prefix pattern is valid")
});

/// `0 - 5 ft` style ranges.
static DEPTH_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(-?\d+(?:\.\d+)?)\s*(?:-|–|to)\s*(\d+(?:\.\d+)?)\s*(ft\b|feet\b|foot\b|meters?\b|metres?\b|m\b|')?")
        .expect("depth range pattern is valid")
});

/// A bare numeric value with an optional unit suffix, nothing else.
static DEPTH_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(-?\d+(?:\.\d+)?)\s*(ft|feet|foot|meters?|metres?|m|')?\s*$")
        .expect("depth value pattern is valid")
});

/// Relaxed: the first number anywhere in the text.
static DEPTH_RELAXED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(-?\d+(?:\.\d+)?)\s*(ft\b|feet\b|foot\b|meters?\b|metres?\b|m\b|')?")
        .expect("relaxed depth pattern is valid")
});

/// Injected material and color vocabulary.
///
/// `keywords` are core material nouns; `modifiers` are adjectives that attach
/// to them ("sandy clay"); `colors` are fill/color words.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialVocabulary {
    pub keywords: Vec<String>,
    pub modifiers: Vec<String>,
    pub colors: Vec<String>,
}

impl Default for MaterialVocabulary {
    fn default() -> Self {
        let to_vec = |words: &[&str]| words.iter().map(|w| w.to_string()).collect();
        Self {
            keywords: to_vec(&[
                "clay", "sand", "gravel", "silt", "rock", "limestone", "sandstone", "shale", "topsoil",
                "fill", "bedrock", "loam", "peat", "chalk", "mudstone", "siltstone", "claystone", "till",
                "marl", "boulders", "cobbles",
            ]),
            modifiers: to_vec(&[
                "sandy", "silty", "clayey", "gravelly", "loamy", "weathered", "fractured", "soft", "stiff",
                "hard", "dense", "loose", "fine", "coarse", "wet", "moist", "dry", "organic",
            ]),
            colors: to_vec(&[
                "brown", "gray", "grey", "tan", "red", "yellow", "orange", "black", "white", "green",
                "blue", "olive", "purple",
            ]),
        }
    }
}

/// One recognized depth label.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthToken {
    pub value: f64,
    /// End of the interval for range labels (`0 - 5 ft`).
    pub end: Option<f64>,
    pub unit: Option<String>,
}

/// Scans free text for depth, material, and color signals.
#[derive(Debug, Clone, Default)]
pub struct SignalScanner {
    vocab: MaterialVocabulary,
}

impl SignalScanner {
    pub fn new(vocab: MaterialVocabulary) -> Self {
        Self { vocab }
    }

    /// Strict depth detection: explicit `depth:` prefixes, then ranges, then
    /// whole-cell numeric values.
    pub fn scan_depth(&self, text: &str) -> Option<DepthToken> {
        if let Some(caps) = DEPTH_PREFIX.captures(text) {
            return Some(DepthToken {
                value: caps.get(1)?.as_str().parse().ok()?,
                end: None,
                unit: caps.get(2).map(|m| m.as_str().to_lowercase()),
            });
        }
        if let Some(caps) = DEPTH_RANGE.captures(text) {
            return Some(DepthToken {
                value: caps.get(1)?.as_str().parse().ok()?,
                end: caps.get(2).and_then(|m| m.as_str().parse().ok()),
                unit: caps.get(3).map(|m| m.as_str().to_lowercase()),
            });
        }
        if let Some(caps) = DEPTH_VALUE.captures(text) {
            return Some(DepthToken {
                value: caps.get(1)?.as_str().parse().ok()?,
                end: None,
                unit: caps.get(2).map(|m| m.as_str().to_lowercase()),
            });
        }
        None
    }

    /// Relaxed depth detection: strict patterns first, then the first number
    /// anywhere in the text.
    pub fn scan_depth_relaxed(&self, text: &str) -> Option<DepthToken> {
        if let Some(token) = self.scan_depth(text) {
            return Some(token);
        }
        let caps = DEPTH_RELAXED.captures(text)?;
        Some(DepthToken {
            value: caps.get(1)?.as_str().parse().ok()?,
            end: None,
            unit: caps.get(2).map(|m| m.as_str().to_lowercase()),
        })
    }

    /// Find a material phrase: a contiguous word run around a vocabulary
    /// keyword, including attached modifiers, title-cased.
    pub fn scan_material(&self, text: &str) -> Option<String> {
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphabetic())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
            .collect();

        let anchor = words.iter().position(|w| self.is_keyword(w))?;

        let mut start = anchor;
        while start > 0 && (self.is_modifier(&words[start - 1]) || self.is_keyword(&words[start - 1])) {
            start -= 1;
        }
        let mut end = anchor;
        while end + 1 < words.len() && (self.is_modifier(&words[end + 1]) || self.is_keyword(&words[end + 1])) {
            end += 1;
        }

        Some(title_case(&words[start..=end].join(" ")))
    }

    /// Find a color signal: a vocabulary color word or a `#rrggbb` fill
    /// marker. `grey` normalizes to `gray` so segmentation keys stay stable
    /// across spellings.
    pub fn scan_color(&self, text: &str) -> Option<String> {
        if let Some(hex) = text.split_whitespace().find(|w| is_hex_color(w)) {
            return Some(hex.to_lowercase());
        }
        text.split(|c: char| !c.is_alphabetic())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
            .find(|w| self.vocab.colors.iter().any(|c| c == w))
            .map(|w| if w == "grey" { "gray".to_string() } else { w })
    }

    fn is_keyword(&self, word: &str) -> bool {
        let singular = word.strip_suffix('s').unwrap_or(word);
        self.vocab.keywords.iter().any(|k| k == word || k == singular)
    }

    fn is_modifier(&self, word: &str) -> bool {
        self.vocab.modifiers.iter().any(|m| m == word)
    }
}

fn is_hex_color(word: &str) -> bool {
    let Some(digits) = word.strip_prefix('#') else {
        return false;
    };
    digits.len() == 6 && digits.chars().all(|c| c.is_ascii_hexdigit())
}

/// Uppercase the first letter of each word.
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
