use super::ParseConfig;
use crate::{core::model::Page, error::MedragError, map_err};
use std::{fmt::Write, time::Instant};
use tracing::{debug, warn};

/// Parses PDFs, one [Page] per PDF page.
///
/// Lines consisting solely of the page number are dropped, as are lines matching
/// any of the configured filters. Pages are selected according to the [ParseConfig].
#[derive(Debug, Default)]
pub struct PdfParser {
    config: ParseConfig,
}

impl PdfParser {
    pub fn new(config: ParseConfig) -> Self {
        Self { config }
    }

    pub fn parse(&self, input: &[u8]) -> Result<Vec<Page>, MedragError> {
        let start = Instant::now();

        let document = map_err!(lopdf::Document::load_mem(input));
        let pages = document.get_pages();
        let total_pages = pages.len();

        let mut out = vec![];

        for page_num in pages.keys().copied() {
            if !self.config.keeps(page_num as usize, total_pages) {
                continue;
            }

            let text = match document.extract_text(&[page_num]) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to extract text from page {page_num}: {e}");
                    continue;
                }
            };

            let text = clean_page(&text, page_num, &self.config);

            if text.trim().is_empty() {
                continue;
            }

            out.push(Page::new(Some(page_num), text));
        }

        debug!(
            "Finished processing PDF, {} of {total_pages} pages with text, took {}ms",
            out.len(),
            start.elapsed().as_millis()
        );

        Ok(out)
    }
}

/// Trim every line, dropping bare page numbers and filtered lines.
fn clean_page(text: &str, page_num: u32, config: &ParseConfig) -> String {
    let page_num = page_num.to_string();
    let mut out = String::with_capacity(text.len());

    for line in text.lines() {
        let line = line.trim();

        if line == page_num || config.filtered(line) {
            continue;
        }

        let _ = writeln!(out, "{line}");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_page_numbers_and_filters() {
        let config = ParseConfig::default().with_filter("^HEADER").unwrap();
        let text = "HEADER line\n  Anemia is common.  \n12\nIt has many causes.\n";

        assert_eq!(
            "Anemia is common.\nIt has many causes.\n",
            clean_page(text, 12, &config)
        );
    }

    #[test]
    fn keeps_numbers_that_are_not_the_page() {
        let config = ParseConfig::default();
        assert_eq!("7\n", clean_page("7", 12, &config));
    }

    #[test]
    fn rejects_invalid_input() {
        assert!(PdfParser::default().parse(b"definitely not a pdf").is_err());
    }
}
