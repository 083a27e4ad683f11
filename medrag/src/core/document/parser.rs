use crate::{core::model::{DocumentType, Page}, error::MedragError, map_err};
use pdf::PdfParser;
use regex::Regex;
use serde::{Deserialize, Serialize};
use text::TextParser;
use validify::{schema_err, schema_validation, Validate, ValidationErrors};

pub mod pdf;
pub mod text;

/// General parsing configuration for documents.
/// A text element is parser specific, for PDFs it is a page.
#[derive(Debug, Default, Clone, Serialize, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(Self::validate_schema)]
pub struct ParseConfig {
    /// Skip the first amount of text elements.
    #[serde(default)]
    pub start: usize,

    /// Skip the last amount of text elements.
    #[serde(default)]
    pub end: usize,

    /// If true, parsers treat [start](Self::start) and [end](Self::end)
    /// as a 1-based inclusive range instead of skipping elements.
    #[serde(default)]
    pub range: bool,

    /// Lines matching any of these are omitted.
    #[serde(default, with = "serde_regex")]
    #[schema(value_type = Vec<String>)]
    pub filters: Vec<Regex>,
}

impl ParseConfig {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            ..Default::default()
        }
    }

    /// Set the parser to use a range of elements instead of just skipping.
    pub fn use_range(mut self) -> Self {
        self.range = true;
        self
    }

    /// Add a filter to the parser.
    /// Lines matching the expression will be omitted.
    ///
    /// * `re`: The expression to match for.
    pub fn with_filter(mut self, re: &str) -> Result<Self, MedragError> {
        self.filters.push(map_err!(Regex::new(re)));
        Ok(self)
    }

    /// Whether the 1-based element `n` out of `total` should be kept.
    pub fn keeps(&self, n: usize, total: usize) -> bool {
        if self.range {
            return n >= self.start && n <= self.end;
        }
        n > self.start && n + self.end <= total
    }

    /// Whether a line matches any of the filters.
    pub fn filtered(&self, line: &str) -> bool {
        self.filters.iter().any(|re| re.is_match(line))
    }

    #[schema_validation]
    fn validate_schema(&self) -> Result<(), ValidationErrors> {
        if self.range && self.end < self.start {
            schema_err!(
                "range=true;start>end",
                "end must not be less than start when using range"
            );
        }
        if self.range && self.start == 0 {
            schema_err!("range=true;start=0", "start cannot be 0 when using range");
        }
    }
}

/// Enumeration of all supported parser types.
#[derive(Debug)]
pub enum Parser {
    Text(TextParser),
    Pdf(PdfParser),
}

impl Parser {
    /// Returns the default parser for a document.
    pub fn new(ty: DocumentType) -> Self {
        Self::new_from(ty, ParseConfig::default())
    }

    /// Returns a configured parser for a document.
    pub fn new_from(ty: DocumentType, config: ParseConfig) -> Self {
        match ty {
            DocumentType::Text => Self::Text(TextParser::new(config)),
            DocumentType::Pdf => Self::Pdf(PdfParser::new(config)),
        }
    }

    pub fn parse(&self, input: &[u8]) -> Result<Vec<Page>, MedragError> {
        match self {
            Self::Text(p) => p.parse(input),
            Self::Pdf(p) => p.parse(input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ParseConfig;
    use validify::Validate;

    #[test]
    fn skips_front_and_back() {
        let config = ParseConfig::new(1, 2);
        let kept = (1..=6).filter(|n| config.keeps(*n, 6)).collect::<Vec<_>>();
        assert_eq!(vec![2, 3, 4], kept);
    }

    #[test]
    fn selects_range() {
        let config = ParseConfig::new(2, 4).use_range();
        let kept = (1..=6).filter(|n| config.keeps(*n, 6)).collect::<Vec<_>>();
        assert_eq!(vec![2, 3, 4], kept);
    }

    #[test]
    fn validates_range() {
        assert!(ParseConfig::new(0, 3).use_range().validate().is_err());
        assert!(ParseConfig::new(4, 3).use_range().validate().is_err());
        assert!(ParseConfig::new(3, 3).use_range().validate().is_ok());
        assert!(ParseConfig::new(10, 10).validate().is_ok());
    }

    #[test]
    fn filters_lines() {
        let config = ParseConfig::default()
            .with_filter(r"^GALE ENCYCLOPEDIA")
            .unwrap();
        assert!(config.filtered("GALE ENCYCLOPEDIA OF MEDICINE 2"));
        assert!(!config.filtered("Anemia"));
    }
}
