//! Brand and model normalization

use std::collections::HashMap;
use tracing::debug;

/// Brand code for records whose brand could not be mapped
pub const UNKNOWN_BRAND: &str = "UNKNOWN";

/// Built-in alias table (alias, canonical code)
const STANDARD_BRANDS: &[(&str, &str)] = &[
    ("OPEL", "OPEL"),
    ("CITROEN", "CITR"),
    ("CITR", "CITR"),
    ("PEUGEOT", "PEUG"),
    ("PEUG", "PEUG"),
    ("INEOS", "INO"),
    ("INO", "INO"),
    ("ASTON MARTIN", "AML"),
    ("AML", "AML"),
    ("BENTLEY", "BML"),
    ("BML", "BML"),
    ("JAGUAR LANDROVER", "JLR"),
    ("JLR", "JLR"),
    ("FIAT", "FIAT"),
    ("JEEP", "JEEP"),
];

/// Legacy manufacturer model prefixes (brand code, prefix)
const STANDARD_PREFIXES: &[(&str, &str)] = &[
    ("PEUG", "P"),
    ("CITR", "C"),
    ("OPEL", "O"),
    ("FIAT", "F"),
];

/// Uppercase, trim and collapse internal whitespace runs to a single space
pub fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Alias to brand code lookup, keyed on the collapsed uppercase alias
#[derive(Debug, Clone, Default)]
pub struct BrandMapping {
    aliases: HashMap<String, String>,
}

impl BrandMapping {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Mapping with the built-in manufacturer aliases
    pub fn standard() -> Self {
        let mut mapping = Self::new();
        for (alias, code) in STANDARD_BRANDS {
            mapping.insert(alias, code);
        }
        mapping
    }

    /// Add or replace an alias. The code is registered as an alias of itself.
    pub fn insert(&mut self, alias: &str, code: &str) {
        let code = collapse_whitespace(code);
        if code.is_empty() {
            return;
        }
        let alias = collapse_whitespace(alias);
        if !alias.is_empty() {
            self.aliases.insert(alias, code.clone());
        }
        self.aliases.entry(code.clone()).or_insert(code);
    }

    /// Exact lookup after normalization
    pub fn lookup(&self, raw: &str) -> Option<&str> {
        self.aliases
            .get(&collapse_whitespace(raw))
            .map(String::as_str)
    }

    /// All aliases of a code, longest first
    pub fn aliases_for(&self, code: &str) -> Vec<&str> {
        let mut aliases: Vec<&str> = self
            .aliases
            .iter()
            .filter(|(_, c)| c.as_str() == code)
            .map(|(alias, _)| alias.as_str())
            .collect();
        aliases.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        aliases
    }
}

/// Prefix removed from a model name, only for records of `brand_code`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixRule {
    pub brand_code: String,
    pub prefix: String,
}

impl PrefixRule {
    pub fn new(brand_code: &str, prefix: &str) -> Self {
        Self {
            brand_code: collapse_whitespace(brand_code),
            prefix: collapse_whitespace(prefix),
        }
    }

    /// Remainder when the prefix sits at the very start and is followed by model digits
    fn strip<'a>(&self, model: &'a str) -> Option<&'a str> {
        let rest = model.strip_prefix(self.prefix.as_str())?;
        rest.starts_with(|c: char| c.is_ascii_digit()).then_some(rest)
    }
}

/// Read-only brand/model normalization tables, built once per process
#[derive(Debug, Clone)]
pub struct Normalizer {
    brands: BrandMapping,
    prefixes: Vec<PrefixRule>,
}

impl Normalizer {
    /// Create a normalizer from explicit tables
    pub fn new(brands: BrandMapping, prefixes: Vec<PrefixRule>) -> Self {
        Self { brands, prefixes }
    }

    /// Normalizer with the built-in brand and prefix tables
    pub fn standard() -> Self {
        let prefixes = STANDARD_PREFIXES
            .iter()
            .map(|(code, prefix)| PrefixRule::new(code, prefix))
            .collect();
        Self::new(BrandMapping::standard(), prefixes)
    }

    /// Add site-specific aliases on top of the current brand table
    pub fn with_aliases<'a, I>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (alias, code) in aliases {
            self.brands.insert(alias, code);
        }
        self
    }

    /// Brand table
    pub fn brands(&self) -> &BrandMapping {
        &self.brands
    }

    /// Map free text to a canonical brand code, or [`UNKNOWN_BRAND`]
    pub fn normalize_brand(&self, raw: &str) -> String {
        match self.brands.lookup(raw) {
            Some(code) => code.to_string(),
            None => {
                if !raw.trim().is_empty() {
                    debug!("No brand mapping for '{}'", raw.trim());
                }
                UNKNOWN_BRAND.to_string()
            }
        }
    }

    /// Strip the brand name and legacy prefixes from a model, then collapse and uppercase it
    pub fn normalize_model(&self, raw: &str, brand_code: &str) -> String {
        self.normalize_model_with_brand(raw, None, brand_code)
    }

    /// Like [`Self::normalize_model`], also stripping the brand text as written in the
    /// source. Unmapped brands ("VAUXHALL" in "VAUXHALL CORSA") have no alias to strip.
    pub fn normalize_model_with_brand(
        &self,
        raw: &str,
        raw_brand: Option<&str>,
        brand_code: &str,
    ) -> String {
        let mut model = collapse_whitespace(raw);
        if model.is_empty() {
            return model;
        }

        let written = raw_brand.map(collapse_whitespace).unwrap_or_default();
        if let Some(rest) = strip_leading_word(&model, &written)
            .or_else(|| self.strip_brand_name(&model, brand_code))
        {
            model = rest.to_string();
        }

        if let Some(rest) = self
            .prefixes
            .iter()
            .filter(|rule| rule.brand_code == brand_code)
            .find_map(|rule| rule.strip(&model))
        {
            model = rest.to_string();
        }

        collapse_whitespace(&model)
    }

    /// Find a brand alias written as whole words inside a line of text
    pub fn detect_brand(&self, line: &str) -> Option<String> {
        let words: String = line
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();
        let haystack = format!(" {} ", collapse_whitespace(&words));

        let mut aliases: Vec<&String> = self.brands.aliases.keys().collect();
        aliases.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        aliases
            .into_iter()
            .find(|alias| haystack.contains(&format!(" {} ", alias)))
            .cloned()
    }

    fn strip_brand_name<'a>(&self, model: &'a str, brand_code: &str) -> Option<&'a str> {
        self.brands
            .aliases_for(brand_code)
            .into_iter()
            .find_map(|alias| strip_leading_word(model, alias))
    }
}

/// Remove `word` from the start of `text` when it ends on a word boundary
fn strip_leading_word<'a>(text: &'a str, word: &str) -> Option<&'a str> {
    if word.is_empty() {
        return None;
    }
    let rest = text.strip_prefix(word)?;
    if rest.starts_with(|c: char| c.is_alphanumeric()) {
        return None;
    }
    Some(rest.trim_start_matches(|c: char| !c.is_alphanumeric()))
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::standard()
    }
}
