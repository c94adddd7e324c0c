//! Line-oriented N-Triples reader.

use crate::error::ParseError;
use crate::term::{Term, Triple};

/// Parses an N-Triples document. Blank lines and `#` comments are skipped.
pub fn parse_ntriples(input: &str) -> Result<Vec<Triple>, ParseError> {
    let mut triples = Vec::new();
    for (number, line) in input.lines().enumerate() {
        let mut cursor = Cursor::new(line, number + 1);
        cursor.skip_ws();
        if cursor.at_end() || cursor.peek() == Some('#') {
            continue;
        }
        triples.push(cursor.triple()?);
    }
    Ok(triples)
}

struct Cursor {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Cursor {
    fn new(source: &str, line: usize) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line,
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            line: self.line,
            column: self.pos + 1,
            message: message.into(),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    fn expect(&mut self, wanted: char) -> Result<(), ParseError> {
        match self.peek() {
            Some(ch) if ch == wanted => {
                self.pos += 1;
                Ok(())
            }
            Some(ch) => Err(self.error(format!("expected '{}', found '{}'", wanted, ch))),
            None => Err(self.error(format!("expected '{}', found end of line", wanted))),
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.pos += 1;
        }
    }

    fn triple(&mut self) -> Result<Triple, ParseError> {
        let subject = match self.peek() {
            Some('<') => Term::iri(self.iri()?),
            Some('_') => self.blank()?,
            _ => return Err(self.error("subject must be an IRI or blank node")),
        };
        self.skip_ws();
        if self.peek() != Some('<') {
            return Err(self.error("predicate must be an IRI"));
        }
        let predicate = self.iri()?;
        self.skip_ws();
        let object = match self.peek() {
            Some('<') => Term::iri(self.iri()?),
            Some('_') => self.blank()?,
            Some('"') => self.literal()?,
            _ => return Err(self.error("object must be an IRI, blank node or literal")),
        };
        self.skip_ws();
        self.expect('.')?;
        self.skip_ws();
        if !self.at_end() && self.peek() != Some('#') {
            return Err(self.error("unexpected content after '.'"));
        }
        Ok(Triple::new(subject, predicate, object))
    }

    fn iri(&mut self) -> Result<String, ParseError> {
        self.expect('<')?;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('>') => return Ok(out),
                Some('\\') => out.push(self.unicode_escape()?),
                Some(ch) if ch == ' ' || ch == '<' => {
                    self.pos -= 1;
                    return Err(self.error(format!("invalid character '{}' in IRI", ch)));
                }
                Some(ch) => out.push(ch),
                None => return Err(self.error("unterminated IRI")),
            }
        }
    }

    fn blank(&mut self) -> Result<Term, ParseError> {
        self.expect('_')?;
        self.expect(':')?;
        let start = self.pos;
        while matches!(self.peek(), Some(ch) if ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.'))
        {
            self.pos += 1;
        }
        // A label cannot end with '.', which belongs to the statement terminator.
        while self.pos > start && self.chars[self.pos - 1] == '.' {
            self.pos -= 1;
        }
        if self.pos == start {
            return Err(self.error("empty blank node label"));
        }
        let label: String = self.chars[start..self.pos].iter().collect();
        Ok(Term::blank(label))
    }

    fn literal(&mut self) -> Result<Term, ParseError> {
        self.expect('"')?;
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('"') => break,
                Some('\\') => value.push(self.string_escape()?),
                Some(ch) => value.push(ch),
                None => return Err(self.error("unterminated literal")),
            }
        }
        match self.peek() {
            Some('@') => {
                self.pos += 1;
                let start = self.pos;
                while matches!(self.peek(), Some(ch) if ch.is_ascii_alphanumeric() || ch == '-') {
                    self.pos += 1;
                }
                if self.pos == start {
                    return Err(self.error("empty language tag"));
                }
                let tag: String = self.chars[start..self.pos].iter().collect();
                Ok(Term::lang(value, tag))
            }
            Some('^') => {
                self.expect('^')?;
                self.expect('^')?;
                let datatype = self.iri()?;
                Ok(Term::typed(value, datatype))
            }
            _ => Ok(Term::literal(value)),
        }
    }

    fn string_escape(&mut self) -> Result<char, ParseError> {
        match self.peek() {
            Some('u') | Some('U') => self.unicode_escape(),
            Some(ch) => {
                self.pos += 1;
                match ch {
                    't' => Ok('\t'),
                    'b' => Ok('\u{08}'),
                    'n' => Ok('\n'),
                    'r' => Ok('\r'),
                    'f' => Ok('\u{0c}'),
                    '"' => Ok('"'),
                    '\'' => Ok('\''),
                    '\\' => Ok('\\'),
                    other => Err(self.error(format!("unknown escape '\\{}'", other))),
                }
            }
            None => Err(self.error("dangling escape")),
        }
    }

    fn unicode_escape(&mut self) -> Result<char, ParseError> {
        let width = match self.bump() {
            Some('u') => 4,
            Some('U') => 8,
            _ => return Err(self.error("expected \\u or \\U escape")),
        };
        if self.pos + width > self.chars.len() {
            return Err(self.error("truncated unicode escape"));
        }
        let digits: String = self.chars[self.pos..self.pos + width].iter().collect();
        let code = u32::from_str_radix(&digits, 16)
            .map_err(|_| self.error(format!("invalid unicode escape '{}'", digits)))?;
        let ch = char::from_u32(code)
            .ok_or_else(|| self.error(format!("invalid code point U+{:X}", code)))?;
        self.pos += width;
        Ok(ch)
    }
}
