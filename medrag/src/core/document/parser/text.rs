use super::ParseConfig;
use crate::{core::model::Page, error::MedragError};

/// Parses plain text as a single page. Line filters apply, page selection does not.
#[derive(Debug, Default)]
pub struct TextParser {
    config: ParseConfig,
}

impl TextParser {
    pub fn new(config: ParseConfig) -> Self {
        Self { config }
    }

    pub fn parse(&self, input: &[u8]) -> Result<Vec<Page>, MedragError> {
        let text = String::from_utf8_lossy(input);

        let text = if self.config.filters.is_empty() {
            text.to_string()
        } else {
            text.lines()
                .filter(|line| !self.config.filtered(line.trim()))
                .collect::<Vec<_>>()
                .join("\n")
        };

        if text.trim().is_empty() {
            return Ok(vec![]);
        }

        Ok(vec![Page::new(None, text)])
    }
}
