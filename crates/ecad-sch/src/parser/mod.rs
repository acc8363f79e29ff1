mod common;
mod groups;
mod schematic;
mod symbol;

use std::collections::HashSet;

use ecad_core::{Diagnostics, Kiid, LibId, ProgressReporter, UnitScale};
use ecad_sexpr::{Tokenizer, TokenKind};
use glam::IVec2;

use crate::document::Document;
use crate::error::SchError;
use crate::symbol::{LibSymbol, LibSymbolMap};

/// Newest schematic file format this reader understands.
pub const SCHEMATIC_FILE_VERSION: i32 = 20250827;

/// Newest symbol library file format this reader understands.
pub const SYMBOL_LIB_FILE_VERSION: i32 = 20250827;

/// Input lines between cooperative progress/cancellation checks.
const PROGRESS_DELTA: u32 = 500;

/// Options for one parse call. No ambient configuration: everything the
/// parser needs to know arrives here.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Parsing a copyable fragment (clipboard paste): no header, EOF is a
    /// legal terminator, and paper/title-block forms are rejected.
    pub copyable_only: bool,
    /// Version assumed when the input carries none (fragments).
    pub fallback_version: i32,
    /// Appending to an existing document: legacy instance paths are not
    /// prefixed with the root UUID.
    pub appending: bool,
    /// Whether this file is the hierarchy's root sheet. Only the root's
    /// legacy sheet-instance paths get the root UUID prepended.
    pub is_root: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            copyable_only: false,
            fallback_version: SCHEMATIC_FILE_VERSION,
            appending: false,
            is_root: true,
        }
    }
}

/// Group definitions are read into a side list during parse; members are
/// referenced by UUID and may not exist yet when the group form is seen.
#[derive(Debug, Default, Clone)]
pub(crate) struct GroupInfo {
    pub uuid: Kiid,
    pub name: String,
    pub lib_id: Option<LibId>,
    pub members: Vec<Kiid>,
}

/// The schematic/symbol-library parser: a single cooperative state machine
/// driven by the current token.
pub struct SchParser<'a, 'd> {
    pub(crate) lex: Tokenizer<'a>,
    pub(crate) version: i32,
    pub(crate) generator_version: Option<String>,
    pub(crate) uuids: HashSet<Kiid>,
    pub(crate) root_uuid: Kiid,
    pub(crate) unit: i32,
    pub(crate) body_style: i32,
    pub(crate) symbol_name: String,
    pub(crate) group_infos: Vec<GroupInfo>,
    pub(crate) diag: &'d mut Diagnostics,
    pub(crate) progress: Option<&'d mut dyn ProgressReporter>,
    pub(crate) last_progress_line: u32,
    pub(crate) opts: ParseOptions,
}

impl<'a, 'd> SchParser<'a, 'd> {
    pub fn new(input: &'a str, source: &str, diag: &'d mut Diagnostics) -> Self {
        SchParser {
            lex: Tokenizer::new(input, source),
            version: 0,
            generator_version: None,
            uuids: HashSet::new(),
            root_uuid: Kiid::nil(),
            unit: 1,
            body_style: 1,
            symbol_name: String::new(),
            group_infos: Vec::new(),
            diag,
            progress: None,
            last_progress_line: 0,
            opts: ParseOptions::default(),
        }
    }

    pub fn with_options(mut self, opts: ParseOptions) -> Self {
        self.opts = opts;
        self
    }

    pub fn with_progress(mut self, progress: &'d mut dyn ProgressReporter) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Read a whole symbol library file into `map`, keyed by symbol name.
    ///
    /// A parse failure inside one symbol is recorded as a warning and the
    /// parser skips to the end of that symbol block and continues; a
    /// structural error outside a symbol, a future-format file or a
    /// cancellation aborts the whole call.
    pub fn parse_library(&mut self, map: &mut LibSymbolMap) -> Result<(), SchError> {
        self.lex.need_left()?;
        self.lex.next()?;

        if self.lex.text() != "kicad_symbol_lib" {
            return Err(self.expecting("kicad_symbol_lib"));
        }

        self.parse_header(SYMBOL_LIB_FILE_VERSION)?;

        // Prior to this, bar was a valid string char for unquoted strings.
        self.lex.set_knows_bar(self.version >= 20240529);

        let mut version_checked = false;

        loop {
            match self.lex.next()? {
                TokenKind::Right => break,
                TokenKind::Left => {}
                _ => return Err(self.expecting("(")),
            }

            self.lex.next()?;
            let tok = self.lex.text().to_owned();

            match tok.as_str() {
                "generator" => {
                    self.lex.need_symbol()?;
                    self.lex.need_right()?;
                }
                "host" => {
                    // Old version of the generator token; really old files
                    // also carried a host version.
                    self.lex.need_symbol()?;
                    if self.version < 20200827 {
                        self.lex.need_symbol()?;
                    }
                    self.lex.need_right()?;
                }
                "generator_version" => {
                    self.generator_version = Some(self.lex.need_symbol()?);
                    self.lex.need_right()?;

                    // With a generator version in hand we know enough to do
                    // the version check here.
                    self.check_version(SYMBOL_LIB_FILE_VERSION, &mut version_checked)?;
                }
                "symbol" => {
                    // By the time we get to the first symbol we can check
                    // the version.
                    self.check_version(SYMBOL_LIB_FILE_VERSION, &mut version_checked)?;

                    self.unit = 1;
                    self.body_style = 1;

                    // Recovery boundary: a failure anywhere inside this
                    // symbol skips back out to the library's nesting depth
                    // and continues with the next symbol.
                    let enclosing_depth = self.lex.depth() - 1;

                    match self.parse_lib_symbol() {
                        Ok(symbol) => {
                            map.insert(symbol.name.clone(), symbol);
                        }
                        Err(err) if err.is_global() => return Err(err),
                        Err(err) => {
                            self.diag.warn(format!(
                                "Error parsing symbol at line {}: {}\n\
                                 Skipping symbol and continuing.",
                                self.lex.line_number(),
                                err
                            ));
                            self.skip_to_depth(enclosing_depth)?;
                        }
                    }
                }
                _ => return Err(self.expecting("symbol, generator, or generator_version")),
            }
        }

        // Derivation is depth one: every parent must exist in this file and
        // must not itself be derived.
        for symbol in map.values() {
            let Some(parent_name) = &symbol.parent else {
                continue;
            };

            match map.get(parent_name) {
                None => self.diag.warn(format!(
                    "Symbol '{}' extends '{parent_name}' but the parent was not found.",
                    symbol.name
                )),
                Some(parent) if parent.is_derived() => self.diag.warn(format!(
                    "Symbol '{}' extends '{parent_name}', which is itself derived; nested \
                     derivation is not supported.",
                    symbol.name
                )),
                Some(_) => {}
            }
        }

        Ok(())
    }

    /// Read a single `(symbol ...)` form, e.g. from the clipboard, resolving
    /// derivation against `map`. Returns `None` when the input holds
    /// nothing.
    pub fn parse_symbol(
        &mut self,
        map: &LibSymbolMap,
        file_version: i32,
    ) -> Result<Option<LibSymbol>, SchError> {
        if self.lex.next()? != TokenKind::Left {
            return Ok(None);
        }

        self.lex.next()?;

        if self.lex.text() != "symbol" {
            return Err(self.malformed(format!(
                "Cannot parse {} as a symbol",
                self.lex.cur().describe()
            )));
        }

        self.version = file_version;
        let symbol = self.parse_lib_symbol()?;

        if let Some(parent_name) = &symbol.parent {
            if !map.contains_key(parent_name) {
                self.diag.warn(format!(
                    "Symbol '{}' extends '{parent_name}' but the parent was not found.",
                    symbol.name
                ));
            }
        }

        Ok(Some(symbol))
    }

    /// Read a schematic sheet file (or fragment) into a new [`Document`].
    pub fn parse_schematic(&mut self) -> Result<Document, SchError> {
        let mut doc = Document::new();
        self.parse_schematic_into(&mut doc)?;
        Ok(doc)
    }

    /// Parse one draw item (`arc | bezier | circle | pin | polyline |
    /// rectangle | text | text_box`) with the stream positioned on its
    /// keyword token.
    pub fn parse_symbol_draw_item(
        &mut self,
    ) -> Result<crate::symbol::DrawItem, SchError> {
        self.parse_draw_item_inner()
    }

    // ------------------------------------------------------------------
    // Header and version handling
    // ------------------------------------------------------------------

    /// Parse `(version N)` after the file keyword; absent versions fall back
    /// to `default_version` (fragments and prehistoric files).
    pub(crate) fn parse_header(&mut self, default_version: i32) -> Result<(), SchError> {
        self.lex.need_left()?;
        self.lex.next()?;

        if self.lex.text() == "version" {
            self.version = self.lex.need_int("version")? as i32;
            self.lex.need_right()?;
        } else {
            self.version = default_version;
        }

        log::debug!("file format version {}", self.version);
        Ok(())
    }

    pub(crate) fn check_version(
        &mut self,
        max_supported: i32,
        checked: &mut bool,
    ) -> Result<(), SchError> {
        if !*checked && self.version > max_supported {
            return Err(SchError::FutureFormat {
                required: self.version,
                generator: self.generator_version.clone(),
            });
        }

        *checked = true;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Small shared primitives
    // ------------------------------------------------------------------

    pub(crate) fn expecting(&self, what: &str) -> SchError {
        SchError::Parse(self.lex.expecting(what))
    }

    pub(crate) fn malformed(&self, text: impl Into<String>) -> SchError {
        SchError::malformed(text, self.lex.location())
    }

    /// Cooperative progress/cancellation check, called roughly every
    /// [`PROGRESS_DELTA`] input lines.
    pub(crate) fn checkpoint(&mut self) -> Result<(), SchError> {
        let cur = self.lex.line_number();

        if let Some(progress) = self.progress.as_deref_mut() {
            if cur > self.last_progress_line + PROGRESS_DELTA {
                progress.report_progress(u64::from(cur), u64::from(self.lex.total_lines().max(1)));

                if progress.should_cancel() {
                    return Err(SchError::Canceled);
                }

                self.last_progress_line = cur;
            }
        }

        Ok(())
    }

    /// `yes` or `no` as the next token.
    pub(crate) fn parse_bool(&mut self) -> Result<bool, SchError> {
        self.lex.next()?;
        match self.lex.text() {
            "yes" => Ok(true),
            "no" => Ok(false),
            _ => Err(self.expecting("yes or no")),
        }
    }

    /// Handle the three spellings `hide`, `(hide)` and `(hide yes|no)`.
    ///
    /// Call with the keyword as the current token. When the keyword was
    /// parenthesized this consumes through the closing paren; a bare keyword
    /// consumes nothing further and yields `default`.
    pub(crate) fn parse_maybe_absent_bool(&mut self, default: bool) -> Result<bool, SchError> {
        if self.lex.prev_kind() != TokenKind::Left {
            return Ok(default);
        }

        match self.lex.next()? {
            TokenKind::Right => Ok(default),
            _ => {
                let value = match self.lex.text() {
                    "yes" => true,
                    "no" => false,
                    _ => return Err(self.expecting("yes or no")),
                };
                self.lex.need_right()?;
                Ok(value)
            }
        }
    }

    /// Read a UUID token, de-duplicating within the current document: a
    /// colliding value is incremented until unique.
    pub(crate) fn parse_kiid(&mut self) -> Result<Kiid, SchError> {
        let text = self.lex.need_symbol()?;

        let mut id: Kiid = text.parse().unwrap_or_else(|_| {
            log::debug!("replacing malformed UUID '{text}'");
            Kiid::new()
        });

        while self.uuids.contains(&id) {
            id.increment();
        }

        self.uuids.insert(id);
        Ok(id)
    }

    /// Two millimetre coordinates converted to internal units.
    pub(crate) fn parse_xy(&mut self) -> Result<IVec2, SchError> {
        let x = self.internal_units("X coordinate")?;
        let y = self.internal_units("Y coordinate")?;
        Ok(IVec2::new(x, y))
    }

    /// One millimetre length converted to clamped internal units.
    pub(crate) fn internal_units(&mut self, what: &str) -> Result<i32, SchError> {
        let mm = self.lex.need_double(what)?;
        Ok(UnitScale::SCHEMATIC.mm_to_iu(mm))
    }

    pub(crate) fn parse_int(&mut self, what: &str) -> Result<i64, SchError> {
        Ok(self.lex.need_int(what)?)
    }

    pub(crate) fn parse_double(&mut self, what: &str) -> Result<f64, SchError> {
        Ok(self.lex.need_double(what)?)
    }

    /// A string value with the legacy empty-value token applied: before
    /// 20250318 a literal `~` means the empty string.
    pub(crate) fn legacy_empty(&self, value: String) -> String {
        if self.version < 20250318 && value == "~" {
            String::new()
        } else {
            value
        }
    }

    /// Undo the historical escaping of `/` in library identifiers.
    pub(crate) fn unescape_slash(value: &str) -> String {
        value.replace("{slash}", "/")
    }

    /// Skip tokens until the current block is exited. Used to skip over
    /// well-formed blocks from a balanced position (the keyword token).
    pub(crate) fn skip_to_block_end(&mut self, mut depth: i32) -> Result<(), SchError> {
        while depth > 0 {
            match self.lex.next()? {
                TokenKind::Eof => break,
                TokenKind::Left => depth += 1,
                TokenKind::Right => depth -= 1,
                _ => {}
            }
        }

        Ok(())
    }

    /// Skip tokens until the stream is back at `depth` open lists. Used for
    /// error recovery, where the failure point's own depth is unknown.
    pub(crate) fn skip_to_depth(&mut self, depth: i32) -> Result<(), SchError> {
        while self.lex.depth() > depth {
            if self.lex.next()? == TokenKind::Eof {
                break;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_gate_fails_fast_with_generator_version() {
        let input = r#"(kicad_symbol_lib (version 99999999)
            (generator eeschema)
            (generator_version "99.9")
            (symbol "R" (property "Reference" "R" (at 0 0 0)))
        )"#;

        let mut diag = Diagnostics::new();
        let mut parser = SchParser::new(input, "future.kicad_sym", &mut diag);
        let mut map = LibSymbolMap::new();

        match parser.parse_library(&mut map) {
            Err(SchError::FutureFormat { required, generator }) => {
                assert_eq!(required, 99999999);
                assert_eq!(generator.as_deref(), Some("99.9"));
            }
            other => panic!("expected FutureFormat, got {other:?}"),
        }

        assert!(map.is_empty());
    }

    #[test]
    fn version_check_is_deferred_without_generator_version() {
        // Future version but no generator_version: the gate fires at the
        // first symbol instead of the header.
        let input = r#"(kicad_symbol_lib (version 99999999)
            (generator eeschema)
            (symbol "R")
        )"#;

        let mut diag = Diagnostics::new();
        let mut parser = SchParser::new(input, "future.kicad_sym", &mut diag);
        let mut map = LibSymbolMap::new();

        assert!(matches!(
            parser.parse_library(&mut map),
            Err(SchError::FutureFormat { .. })
        ));
    }

    #[test]
    fn maybe_absent_bool_spellings() {
        let mut diag = Diagnostics::new();

        // "(hide)" -> default, "(hide no)" -> false, bare "hide" -> default.
        let input = "(pin_names (hide) (hide no) hide)";
        let mut parser = SchParser::new(input, "t", &mut diag);
        parser.lex.next().unwrap(); // (
        parser.lex.next().unwrap(); // pin_names

        parser.lex.next().unwrap(); // (
        parser.lex.next().unwrap(); // hide
        assert!(parser.parse_maybe_absent_bool(true).unwrap());

        parser.lex.next().unwrap(); // (
        parser.lex.next().unwrap(); // hide
        assert!(!parser.parse_maybe_absent_bool(true).unwrap());

        parser.lex.next().unwrap(); // bare hide
        assert!(parser.parse_maybe_absent_bool(true).unwrap());
    }

    #[test]
    fn colliding_uuids_are_incremented() {
        let mut diag = Diagnostics::new();
        let input = r#"aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee
                       aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee"#;
        let mut parser = SchParser::new(input, "t", &mut diag);

        let a = parser.parse_kiid().unwrap();
        let b = parser.parse_kiid().unwrap();
        assert_ne!(a, b);
    }
}
