use serde::{Deserialize, Serialize};
use std::fmt;

/// Datatype IRI that canonical text leaves implicit.
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";

/// One position of a triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Term {
    /// Globally named resource.
    Iri {
        /// Absolute IRI.
        value: String,
    },
    /// Anonymous node with a graph-local label.
    BlankNode {
        /// Label without the `_:` prefix.
        label: String,
    },
    /// Literal value with optional datatype or language.
    Literal {
        /// Lexical form.
        value: String,
        /// Datatype IRI (`None` for plain strings).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        datatype: Option<String>,
        /// Language tag, mutually exclusive with a datatype.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
}

impl Term {
    /// IRI term.
    pub fn iri(value: impl Into<String>) -> Self {
        Term::Iri {
            value: value.into(),
        }
    }

    /// Blank node term; a leading `_:` is accepted and dropped.
    pub fn blank(label: impl Into<String>) -> Self {
        let label = label.into();
        let label = match label.strip_prefix("_:") {
            Some(rest) => rest.to_string(),
            None => label,
        };
        Term::BlankNode { label }
    }

    /// Plain string literal.
    pub fn literal(value: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    /// Typed literal.
    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: Some(datatype.into()),
            language: None,
        }
    }

    /// Language-tagged literal.
    pub fn lang(value: impl Into<String>, language: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: None,
            language: Some(language.into()),
        }
    }

    /// Blank node label, if this is a blank node.
    pub fn blank_label(&self) -> Option<&str> {
        match self {
            Term::BlankNode { label } => Some(label),
            _ => None,
        }
    }

    /// Same term with equivalent spellings collapsed: lowercase language
    /// tags and no explicit `xsd:string` datatype.
    pub fn normalized(&self) -> Term {
        match self {
            Term::Literal {
                value,
                language: Some(language),
                ..
            } => Term::Literal {
                value: value.clone(),
                datatype: None,
                language: Some(language.to_ascii_lowercase()),
            },
            Term::Literal {
                value,
                datatype,
                language: None,
            } => Term::Literal {
                value: value.clone(),
                datatype: datatype.clone().filter(|dt| dt != XSD_STRING),
                language: None,
            },
            other => other.clone(),
        }
    }

    /// Canonical N-Triples text; blank nodes use the given label.
    pub(crate) fn canonical_text_with(&self, blank: &str) -> String {
        match self {
            Term::Iri { value } => format!("<{}>", escape_iri(value)),
            Term::BlankNode { .. } => format!("_:{}", blank),
            Term::Literal {
                value,
                datatype,
                language,
            } => {
                let mut out = format!("\"{}\"", escape_literal(value));
                if let Some(language) = language {
                    out.push('@');
                    out.push_str(&language.to_ascii_lowercase());
                } else if let Some(datatype) = datatype.as_deref().filter(|dt| *dt != XSD_STRING) {
                    out.push_str("^^<");
                    out.push_str(&escape_iri(datatype));
                    out.push('>');
                }
                out
            }
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::BlankNode { label } => write!(f, "_:{}", label),
            other => f.write_str(&other.canonical_text_with("")),
        }
    }
}

/// Subject, predicate, object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    /// Subject term.
    pub subject: Term,
    /// Predicate IRI.
    pub predicate: String,
    /// Object term.
    pub object: Term,
}

impl Triple {
    /// Builds a triple.
    pub fn new(subject: Term, predicate: impl Into<String>, object: Term) -> Self {
        Self {
            subject,
            predicate: predicate.into(),
            object,
        }
    }

    /// Same triple with both ends normalized.
    pub fn normalized(&self) -> Triple {
        Triple {
            subject: self.subject.normalized(),
            predicate: self.predicate.clone(),
            object: self.object.normalized(),
        }
    }

    /// Whether either end is a blank node.
    pub fn has_blank_node(&self) -> bool {
        self.subject.blank_label().is_some() || self.object.blank_label().is_some()
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <{}> {} .",
            self.subject,
            escape_iri(&self.predicate),
            self.object
        )
    }
}

fn escape_iri(iri: &str) -> String {
    let mut out = String::with_capacity(iri.len());
    for ch in iri.chars() {
        match ch {
            '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\' => {
                out.push_str(&format!("\\u{:04X}", ch as u32))
            }
            c if (c as u32) <= 0x20 => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                out.push_str(&format!("\\u{:04X}", c as u32))
            }
            c => out.push(c),
        }
    }
    out
}
