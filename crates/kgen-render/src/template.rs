//! Template text to a checked syntax tree.
//!
//! Grammar inside `{{ … }}`:
//!
//! ```text
//! expr    := primary ('|' filter)*
//! primary := literal | path | call
//! path    := ident ('.' ident | '[' int ']')*
//! call    := ident '(' (expr (',' expr)*)? ')'
//! filter  := ident ('(' (expr (',' expr)*)? ')')?
//! literal := string | number | 'true' | 'false' | 'null'
//! ```
//!
//! Every call and filter name is checked against the function table while
//! parsing, so a forbidden construct fails before any output is produced.

use kgen_canonical::{CanonicalNumber, CanonicalValue};

use crate::error::RenderError;
use crate::functions::{forbidden_category, FunctionTable, InputScope};

/// Parsed template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub(crate) segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Segment {
    Text(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Expr {
    pub primary: Primary,
    pub filters: Vec<Call>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Primary {
    Literal(CanonicalValue),
    Path(PathExpr),
    Call(Call),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PathExpr {
    pub text: String,
    pub steps: Vec<Step>,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Step {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Call {
    pub name: String,
    pub args: Vec<Expr>,
    pub offset: usize,
}

impl Template {
    /// Parses `source`, resolving every function name against `table`.
    pub fn parse(source: &str, table: &FunctionTable) -> Result<Self, RenderError> {
        let mut segments = Vec::new();
        let mut pos = 0;
        let bytes = source.as_bytes();

        while pos < source.len() {
            let next = find_open(&source[pos..]).map(|idx| idx + pos);
            let Some(open) = next else {
                segments.push(Segment::Text(source[pos..].to_string()));
                break;
            };
            if open > pos {
                segments.push(Segment::Text(source[pos..open].to_string()));
            }
            if bytes[open + 1] == b'#' {
                let close = source[open + 2..]
                    .find("#}")
                    .ok_or_else(|| syntax(open, "unterminated comment"))?;
                pos = open + 2 + close + 2;
                continue;
            }
            let mut parser = ExprParser {
                source,
                pos: open + 2,
                table,
            };
            let expr = parser.expr()?;
            parser.skip_ws();
            if !source[parser.pos..].starts_with("}}") {
                return Err(syntax(parser.pos, "expected `}}`"));
            }
            segments.push(Segment::Expr(expr));
            pos = parser.pos + 2;
        }

        Ok(Template { segments })
    }

    /// Number of `{{ … }}` substitutions.
    pub fn substitutions(&self) -> usize {
        self.segments
            .iter()
            .filter(|segment| matches!(segment, Segment::Expr(_)))
            .count()
    }
}

fn find_open(text: &str) -> Option<usize> {
    let a = text.find("{{");
    let b = text.find("{#");
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn syntax(offset: usize, message: impl Into<String>) -> RenderError {
    RenderError::Syntax {
        offset,
        message: message.into(),
    }
}

struct ExprParser<'a> {
    source: &'a str,
    pos: usize,
    table: &'a FunctionTable,
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn skip_ws(&mut self) {
        while let Some(ch) = self.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.pos += ch.len_utf8();
        }
    }

    fn eat(&mut self, ch: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(ch) {
            self.pos += ch.len_utf8();
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<Expr, RenderError> {
        let primary = self.primary()?;
        let mut filters = Vec::new();
        while self.eat('|') {
            self.skip_ws();
            let offset = self.pos;
            let name = self.ident()?;
            let args = if self.eat('(') { self.args()? } else { Vec::new() };
            filters.push(self.call(name, args, offset, 0)?);
        }
        Ok(Expr { primary, filters })
    }

    fn primary(&mut self) -> Result<Primary, RenderError> {
        self.skip_ws();
        let offset = self.pos;
        match self.peek() {
            Some('"') | Some('\'') => Ok(Primary::Literal(self.string()?)),
            Some(ch) if ch.is_ascii_digit() || ch == '-' => Ok(Primary::Literal(self.number()?)),
            Some(ch) if is_ident_start(ch) => {
                let name = self.ident()?;
                match name.as_str() {
                    "true" => return Ok(Primary::Literal(CanonicalValue::Bool(true))),
                    "false" => return Ok(Primary::Literal(CanonicalValue::Bool(false))),
                    "null" => return Ok(Primary::Literal(CanonicalValue::Null)),
                    _ => {}
                }
                if self.eat('(') {
                    let args = self.args()?;
                    return Ok(Primary::Call(self.call(name, args, offset, 1)?));
                }
                self.path(name, offset).map(Primary::Path)
            }
            Some(ch) => Err(syntax(offset, format!("unexpected `{}`", ch))),
            None => Err(syntax(offset, "unexpected end of template")),
        }
    }

    /// Resolves `name` against the table. `input_args` is how many of the
    /// written arguments stand in for the piped input.
    fn call(
        &self,
        name: String,
        args: Vec<Expr>,
        offset: usize,
        input_args: usize,
    ) -> Result<Call, RenderError> {
        if let Some(category) = forbidden_category(&name) {
            return Err(RenderError::NonDeterministicConstruct {
                name,
                category,
                offset,
            });
        }
        let def = self
            .table
            .get(&name)
            .ok_or_else(|| RenderError::UnknownFunction {
                name: name.clone(),
                offset,
            })?;
        let explicit = match def.scope {
            InputScope::Value => args.len().saturating_sub(input_args),
            InputScope::Context => args.len(),
        };
        if input_args > 0 && def.scope == InputScope::Value && args.is_empty() {
            return Err(RenderError::InvalidArgument {
                function: name,
                message: "missing input argument".into(),
            });
        }
        def.check_arity(explicit)?;
        Ok(Call { name, args, offset })
    }

    fn args(&mut self) -> Result<Vec<Expr>, RenderError> {
        let mut args = Vec::new();
        if self.eat(')') {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(')') {
                return Ok(args);
            }
            if !self.eat(',') {
                return Err(syntax(self.pos, "expected `,` or `)`"));
            }
        }
    }

    fn path(&mut self, root: String, offset: usize) -> Result<PathExpr, RenderError> {
        let mut steps = vec![Step::Key(root)];
        loop {
            match self.peek() {
                Some('.') => {
                    self.pos += 1;
                    steps.push(Step::Key(self.ident()?));
                }
                Some('[') => {
                    self.pos += 1;
                    let start = self.pos;
                    while matches!(self.peek(), Some(ch) if ch.is_ascii_digit()) {
                        self.pos += 1;
                    }
                    let index = self.source[start..self.pos]
                        .parse()
                        .map_err(|_| syntax(start, "expected list index"))?;
                    if self.peek() != Some(']') {
                        return Err(syntax(self.pos, "expected `]`"));
                    }
                    self.pos += 1;
                    steps.push(Step::Index(index));
                }
                _ => break,
            }
        }
        Ok(PathExpr {
            text: self.source[offset..self.pos].to_string(),
            steps,
            offset,
        })
    }

    fn ident(&mut self) -> Result<String, RenderError> {
        let start = self.pos;
        match self.peek() {
            Some(ch) if is_ident_start(ch) => self.pos += ch.len_utf8(),
            _ => return Err(syntax(start, "expected identifier")),
        }
        while let Some(ch) = self.peek() {
            if !(ch.is_alphanumeric() || ch == '_') {
                break;
            }
            self.pos += ch.len_utf8();
        }
        Ok(self.source[start..self.pos].to_string())
    }

    fn string(&mut self) -> Result<CanonicalValue, RenderError> {
        let start = self.pos;
        let quote = self.peek().ok_or_else(|| syntax(start, "expected string"))?;
        self.pos += 1;
        let mut out = String::new();
        loop {
            let ch = self
                .peek()
                .ok_or_else(|| syntax(start, "unterminated string"))?;
            self.pos += ch.len_utf8();
            match ch {
                c if c == quote => return Ok(CanonicalValue::String(out)),
                '\\' => {
                    let escaped = self
                        .peek()
                        .ok_or_else(|| syntax(start, "unterminated string"))?;
                    self.pos += escaped.len_utf8();
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '\\' | '"' | '\'' => escaped,
                        other => {
                            return Err(syntax(self.pos, format!("unknown escape `\\{}`", other)))
                        }
                    });
                }
                c => out.push(c),
            }
        }
    }

    fn number(&mut self) -> Result<CanonicalValue, RenderError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(ch) if ch.is_ascii_digit() || ch == '.') {
            self.pos += 1;
        }
        let text = &self.source[start..self.pos];
        let number = if text.contains('.') {
            text.parse::<f64>().ok().and_then(CanonicalNumber::from_f64)
        } else {
            text.parse::<i64>().ok().map(CanonicalNumber::from_i64)
        };
        number
            .map(CanonicalValue::Number)
            .ok_or_else(|| syntax(start, format!("invalid number `{}`", text)))
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}
