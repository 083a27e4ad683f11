//! Text splitters producing bounded, optionally overlapping chunks.
//!
//! All sizes are measured in characters, not bytes. Chunks borrow from the input.

pub mod recursive;
pub mod sliding;

pub use recursive::RecursiveSplitter;
pub use sliding::SlidingWindow;

#[derive(Debug, thiserror::Error)]
pub enum ChunkerError {
    #[error("{0}")]
    Config(String),
}

/// Shared bounds check for window based chunkers.
fn check_bounds(size: usize, overlap: usize) -> Result<(), ChunkerError> {
    if size == 0 {
        return Err(ChunkerError::Config("size must be greater than 0".to_string()));
    }
    if overlap >= size {
        return Err(ChunkerError::Config(
            "overlap must be less than size".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_checked() {
        assert!(check_bounds(0, 0).is_err());
        assert!(check_bounds(10, 10).is_err());
        assert!(check_bounds(10, 11).is_err());
        assert!(check_bounds(10, 9).is_ok());
        assert!(check_bounds(1, 0).is_ok());
    }
}
