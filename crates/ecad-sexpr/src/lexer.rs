use std::iter::Peekable;
use std::str::CharIndices;

use ecad_core::Location;

use crate::error::{SexprError, SexprErrorKind};
use crate::token::{Token, TokenKind};

/// Streaming tokenizer with one token of history.
///
/// The reader owns the input for the duration of a parse. Line numbers are
/// tracked for diagnostics and for the periodic progress checkpoint.
pub struct Tokenizer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    source: String,
    line: u32,
    line_start: usize,
    total_lines: u32,
    cur: Token,
    prev_kind: TokenKind,
    knows_bar: bool,
    depth: i32,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str, source: impl Into<String>) -> Self {
        let total_lines = input.lines().count().max(1) as u32;

        Tokenizer {
            input,
            chars: input.char_indices().peekable(),
            source: source.into(),
            line: 1,
            line_start: 0,
            total_lines,
            cur: Token::eof(1, 0),
            prev_kind: TokenKind::Eof,
            knows_bar: false,
            depth: 0,
        }
    }

    /// Whether `|` terminates unquoted symbols. Old files predate the bar
    /// becoming a delimiter, so readers flip this once the file version is
    /// known.
    pub fn set_knows_bar(&mut self, knows_bar: bool) {
        self.knows_bar = knows_bar;
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// 1-based line of the current token.
    pub fn line_number(&self) -> u32 {
        self.cur.line
    }

    pub fn total_lines(&self) -> u32 {
        self.total_lines
    }

    pub fn location(&self) -> Location {
        Location { source: self.source.clone(), line: self.cur.line, offset: self.cur.offset }
    }

    pub fn cur(&self) -> &Token {
        &self.cur
    }

    pub fn prev_kind(&self) -> TokenKind {
        self.prev_kind
    }

    /// Text of the current token. Mirrors the original reader's `FromUTF8()`.
    pub fn text(&self) -> &str {
        &self.cur.text
    }

    /// Number of lists currently open, counting the current token. Lets
    /// error recovery skip back out to a known nesting depth.
    pub fn depth(&self) -> i32 {
        self.depth
    }

    /// Advance to the next token and return its kind.
    pub fn next(&mut self) -> Result<TokenKind, SexprError> {
        self.prev_kind = self.cur.kind;
        self.cur = self.scan()?;

        match self.cur.kind {
            TokenKind::Left => self.depth += 1,
            TokenKind::Right => self.depth -= 1,
            _ => {}
        }

        Ok(self.cur.kind)
    }

    /// Build an "expected X, found current token" error at the current
    /// position.
    pub fn expecting(&self, expected: &str) -> SexprError {
        SexprError {
            kind: SexprErrorKind::Expecting {
                expected: expected.to_owned(),
                found: self.cur.describe(),
            },
            location: self.location(),
        }
    }

    pub fn need_left(&mut self) -> Result<(), SexprError> {
        match self.next()? {
            TokenKind::Left => Ok(()),
            _ => Err(self.expecting("(")),
        }
    }

    pub fn need_right(&mut self) -> Result<(), SexprError> {
        match self.next()? {
            TokenKind::Right => Ok(()),
            _ => Err(self.expecting(")")),
        }
    }

    /// Advance and require a symbol or quoted string; returns its text.
    pub fn need_symbol(&mut self) -> Result<String, SexprError> {
        self.next()?;
        if self.cur.is_symbol() {
            Ok(self.cur.text.clone())
        } else {
            Err(self.expecting("symbol or quoted string"))
        }
    }

    /// Advance and require any textual atom, including bare numbers.
    pub fn need_symbol_or_number(&mut self) -> Result<String, SexprError> {
        self.next()?;
        if self.cur.is_symbol_or_number() {
            Ok(self.cur.text.clone())
        } else {
            Err(self.expecting("symbol, string or number"))
        }
    }

    /// Advance and parse a number atom as `f64`. Locale-independent: the
    /// decimal separator is always `.`.
    pub fn need_double(&mut self, what: &str) -> Result<f64, SexprError> {
        self.next()?;
        self.cur_double(what)
    }

    /// Parse the current token as `f64`.
    pub fn cur_double(&self, what: &str) -> Result<f64, SexprError> {
        self.cur.text.parse::<f64>().map_err(|_| SexprError {
            kind: SexprErrorKind::BadNumber { what: what.to_owned(), text: self.cur.text.clone() },
            location: self.location(),
        })
    }

    /// Advance and parse a number atom as `i64`.
    pub fn need_int(&mut self, what: &str) -> Result<i64, SexprError> {
        self.next()?;
        self.cur.text.parse::<i64>().map_err(|_| SexprError {
            kind: SexprErrorKind::BadNumber { what: what.to_owned(), text: self.cur.text.clone() },
            location: self.location(),
        })
    }

    fn scan(&mut self) -> Result<Token, SexprError> {
        self.skip_whitespace();

        let Some(&(start, ch)) = self.chars.peek() else {
            return Ok(Token::eof(self.line, self.input.len().saturating_sub(self.line_start)));
        };

        let line = self.line;
        let offset = start - self.line_start;

        match ch {
            '(' => {
                self.bump();
                Ok(Token { kind: TokenKind::Left, text: "(".into(), line, offset })
            }
            ')' => {
                self.bump();
                Ok(Token { kind: TokenKind::Right, text: ")".into(), line, offset })
            }
            '"' => self.scan_quoted(line, offset),
            '|' if self.knows_bar => Err(SexprError {
                kind: SexprErrorKind::UnexpectedChar('|'),
                location: Location { source: self.source.clone(), line, offset },
            }),
            _ => self.scan_atom(start, line, offset),
        }
    }

    fn scan_atom(&mut self, start: usize, line: u32, offset: usize) -> Result<Token, SexprError> {
        let mut end = start;

        while let Some(&(idx, ch)) = self.chars.peek() {
            if ch.is_whitespace() || ch == '(' || ch == ')' || ch == '"' {
                break;
            }

            if ch == '|' && self.knows_bar {
                break;
            }

            self.bump();
            end = idx + ch.len_utf8();
        }

        let text = &self.input[start..end];
        let kind =
            if text.parse::<f64>().is_ok() { TokenKind::Number } else { TokenKind::Symbol };

        Ok(Token { kind, text: text.to_owned(), line, offset })
    }

    fn scan_quoted(&mut self, line: u32, offset: usize) -> Result<Token, SexprError> {
        self.bump(); // opening quote

        let mut text = String::new();

        loop {
            let Some(&(_, ch)) = self.chars.peek() else {
                return Err(SexprError {
                    kind: SexprErrorKind::UnterminatedString,
                    location: Location { source: self.source.clone(), line, offset },
                });
            };

            match ch {
                '"' => {
                    self.bump();
                    break;
                }
                '\\' => {
                    self.bump();
                    match self.chars.peek().map(|&(_, c)| c) {
                        Some('n') => {
                            text.push('\n');
                            self.bump();
                        }
                        Some('r') => {
                            text.push('\r');
                            self.bump();
                        }
                        Some('t') => {
                            text.push('\t');
                            self.bump();
                        }
                        Some(c @ ('\\' | '"')) => {
                            text.push(c);
                            self.bump();
                        }
                        Some(c) => {
                            // Unknown escapes keep the character.
                            text.push(c);
                            self.bump();
                        }
                        None => {
                            return Err(SexprError {
                                kind: SexprErrorKind::UnterminatedString,
                                location: Location {
                                    source: self.source.clone(),
                                    line,
                                    offset,
                                },
                            });
                        }
                    }
                }
                _ => {
                    text.push(ch);
                    self.bump();
                }
            }
        }

        Ok(Token { kind: TokenKind::Quoted, text, line, offset })
    }

    fn skip_whitespace(&mut self) {
        let mut skipped = 0usize;

        while let Some(&(_, ch)) = self.chars.peek() {
            if ch.is_whitespace() {
                self.bump();
                skipped += 1;
            } else if ch == ';' {
                // Comment to end of line.
                while let Some(&(_, c)) = self.chars.peek() {
                    self.bump();
                    if c == '\n' {
                        break;
                    }
                }
                skipped += 1;
            } else {
                break;
            }

            if skipped % 100_000 == 0 && skipped > 0 {
                log::trace!("skipped {skipped} whitespace chars around line {}", self.line);
            }
        }
    }

    fn bump(&mut self) {
        if let Some((idx, ch)) = self.chars.next() {
            if ch == '\n' {
                self.line += 1;
                self.line_start = idx + 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<(TokenKind, String)> {
        let mut lex = Tokenizer::new(input, "test");
        let mut out = Vec::new();
        loop {
            let kind = lex.next().unwrap();
            if kind == TokenKind::Eof {
                break;
            }
            out.push((kind, lex.text().to_owned()));
        }
        out
    }

    #[test]
    fn tokenizes_nested_lists() {
        let toks = kinds(r#"(pin passive (at 0 -2.54 90) (name "~{CLK}"))"#);
        assert_eq!(toks[0].0, TokenKind::Left);
        assert_eq!(toks[1], (TokenKind::Symbol, "pin".into()));
        assert_eq!(toks[2], (TokenKind::Symbol, "passive".into()));
        assert_eq!(toks[5], (TokenKind::Number, "0".into()));
        assert_eq!(toks[6], (TokenKind::Number, "-2.54".into()));
        assert_eq!(toks[7], (TokenKind::Number, "90".into()));
        assert_eq!(toks.last().unwrap().0, TokenKind::Right);
        assert!(toks.iter().any(|t| t == &(TokenKind::Quoted, "~{CLK}".into())));
    }

    #[test]
    fn string_escapes_resolved() {
        let toks = kinds(r#"("line\nbreak" "quo\"te")"#);
        assert_eq!(toks[1], (TokenKind::Quoted, "line\nbreak".into()));
        assert_eq!(toks[2], (TokenKind::Quoted, "quo\"te".into()));
    }

    #[test]
    fn bar_is_a_symbol_char_for_old_files() {
        let mut lex = Tokenizer::new("(a|b)", "test");
        lex.next().unwrap();
        assert_eq!(lex.next().unwrap(), TokenKind::Symbol);
        assert_eq!(lex.text(), "a|b");
    }

    #[test]
    fn bar_terminates_symbols_for_new_files() {
        let mut lex = Tokenizer::new("(a|b)", "test");
        lex.set_knows_bar(true);
        lex.next().unwrap();
        lex.next().unwrap();
        assert_eq!(lex.text(), "a");
        assert!(lex.next().is_err());
    }

    #[test]
    fn tracks_line_numbers() {
        let mut lex = Tokenizer::new("(a\n  b\n  c)", "test");
        while lex.next().unwrap() != TokenKind::Eof {}
        assert_eq!(lex.total_lines(), 3);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let mut lex = Tokenizer::new(r#"("oops"#, "test");
        lex.next().unwrap();
        let err = lex.next().unwrap_err();
        assert_eq!(err.kind, SexprErrorKind::UnterminatedString);
    }
}
