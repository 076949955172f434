use once_cell::sync::Lazy;
use regex::Regex;

use crate::MutatorError;

static CELL_REF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Za-z]+)(\d+)$").unwrap());

/// Splits a cell reference like `"B5"` into its column letters and 1-based
/// row number.
pub fn parse(cell_reference: &str) -> Result<(String, u32), MutatorError> {
    let captures = CELL_REF_RE
        .captures(cell_reference.trim())
        .ok_or_else(|| MutatorError::InvalidReference(cell_reference.to_string()))?;

    let column = captures[1].to_uppercase();
    let row: u32 = captures[2]
        .parse()
        .map_err(|_| MutatorError::InvalidReference(cell_reference.to_string()))?;

    if row == 0 {
        return Err(MutatorError::InvalidReference(cell_reference.to_string()));
    }

    Ok((column, row))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_reference() {
        assert_eq!(parse("B5").unwrap(), ("B".to_string(), 5));
    }

    #[test]
    fn parses_multi_letter_column() {
        assert_eq!(parse("AA12").unwrap(), ("AA".to_string(), 12));
    }

    #[test]
    fn rejects_malformed_reference() {
        assert!(parse("5B").is_err());
        assert!(parse("").is_err());
        assert!(parse("B0").is_err());
    }
}
