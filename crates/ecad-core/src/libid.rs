use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Characters that may not appear in either half of a library identifier.
/// `/` used to be on this list; files written during that era escape it as
/// `{slash}`, which the parsers undo before calling [`LibId::parse`].
const ILLEGAL_CHARS: &[char] = &[':', '\t', '\n', '\r'];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LibIdError {
    #[error("library identifier contains invalid character '{ch}' at offset {offset}")]
    IllegalChar { ch: char, offset: usize },
    #[error("library identifier has an empty item name")]
    EmptyItem,
}

/// Two-part identifier of a library symbol or footprint: an optional library
/// nickname and an item name, written `Library:Item`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LibId {
    pub library: Option<String>,
    pub item: String,
}

impl LibId {
    /// Parse `Library:Item` or a bare `Item`. An empty item name or an
    /// illegal character is an error; the offset of the offending character
    /// within the input is reported for diagnostics.
    pub fn parse(text: &str) -> Result<Self, LibIdError> {
        let (library, item, item_offset) = match text.split_once(':') {
            Some((lib, item)) => (Some(lib), item, lib.len() + 1),
            None => (None, text, 0),
        };

        if let Some(lib) = library {
            if let Some((idx, ch)) = lib.char_indices().find(|(_, c)| ILLEGAL_CHARS.contains(c)) {
                return Err(LibIdError::IllegalChar { ch, offset: idx });
            }
        }

        if item.is_empty() {
            return Err(LibIdError::EmptyItem);
        }

        if let Some((idx, ch)) = item.char_indices().find(|(_, c)| ILLEGAL_CHARS.contains(c)) {
            return Err(LibIdError::IllegalChar { ch, offset: item_offset + idx });
        }

        Ok(LibId {
            library: library.filter(|l| !l.is_empty()).map(str::to_owned),
            item: item.to_owned(),
        })
    }

    /// Construct from a bare item name (no library half).
    pub fn from_item(item: impl Into<String>) -> Self {
        LibId { library: None, item: item.into() }
    }

    pub fn is_valid(&self) -> bool {
        !self.item.is_empty()
    }
}

impl fmt::Display for LibId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.library {
            Some(lib) => write!(f, "{lib}:{}", self.item),
            None => write!(f, "{}", self.item),
        }
    }
}

impl FromStr for LibId {
    type Err = LibIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LibId::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_part_id() {
        let id = LibId::parse("Device:R").unwrap();
        assert_eq!(id.library.as_deref(), Some("Device"));
        assert_eq!(id.item, "R");
        assert_eq!(id.to_string(), "Device:R");
    }

    #[test]
    fn parses_bare_item() {
        let id = LibId::parse("R_0402").unwrap();
        assert_eq!(id.library, None);
        assert_eq!(id.to_string(), "R_0402");
    }

    #[test]
    fn slash_is_legal() {
        // '/' stopped being illegal; it arrives unescaped from `{slash}`.
        assert!(LibId::parse("74xx:74LS00/SO14").is_ok());
    }

    #[test]
    fn rejects_control_chars() {
        assert_eq!(
            LibId::parse("Dev\tice:R"),
            Err(LibIdError::IllegalChar { ch: '\t', offset: 3 })
        );
        assert_eq!(LibId::parse("Device:"), Err(LibIdError::EmptyItem));
    }
}
