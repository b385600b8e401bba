//! Compiler configuration.
//!
//! A [`SchemaConfig`] is passed explicitly to every compile and diff call;
//! there is no global state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier quoting style.
///
/// Most dialects use the same character on both sides (backtick for MySQL,
/// double quote for PostgreSQL and SQLite); SQL Server uses a bracket pair.
/// Serialized as its characters: `` "`" ``, `"\""` or `"[]"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Quote {
    open: char,
    close: char,
}

/// A quote style other than backtick, double quote or brackets.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported identifier quote {0:?}, expected one of `, \" or []")]
pub struct UnsupportedQuote(pub String);

impl Quote {
    /// MySQL-style backtick quoting.
    pub const BACKTICK: Self = Self {
        open: '`',
        close: '`',
    };

    /// ANSI double-quote quoting.
    pub const DOUBLE: Self = Self {
        open: '"',
        close: '"',
    };

    /// SQL Server bracket quoting.
    pub const BRACKETS: Self = Self {
        open: '[',
        close: ']',
    };

    /// Builds a quote style from a single character.
    ///
    /// `[` or `]` select the bracket pair and `'\0'` selects the backtick
    /// default.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedQuote`] for any other character.
    pub fn from_char(c: char) -> Result<Self, UnsupportedQuote> {
        match c {
            '\0' | '`' => Ok(Self::BACKTICK),
            '"' => Ok(Self::DOUBLE),
            '[' | ']' => Ok(Self::BRACKETS),
            c => Err(UnsupportedQuote(c.to_string())),
        }
    }

    /// Opening character.
    #[must_use]
    pub const fn open(self) -> char {
        self.open
    }

    /// Closing character.
    #[must_use]
    pub const fn close(self) -> char {
        self.close
    }

    /// Quotes an identifier.
    #[must_use]
    pub fn ident(self, name: &str) -> String {
        format!("{}{}{}", self.open, name, self.close)
    }

    /// Quotes each identifier and joins them with `", "`.
    #[must_use]
    pub fn ident_list<S: AsRef<str>>(self, names: &[S]) -> String {
        names
            .iter()
            .map(|n| self.ident(n.as_ref()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for Quote {
    fn default() -> Self {
        Self::BACKTICK
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.open == self.close {
            write!(f, "{}", self.open)
        } else {
            write!(f, "{}{}", self.open, self.close)
        }
    }
}

impl FromStr for Quote {
    type Err = UnsupportedQuote;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (None, ..) => Ok(Self::BACKTICK),
            (Some(c), None, _) => Self::from_char(c),
            (Some('['), Some(']'), None) => Ok(Self::BRACKETS),
            _ => Err(UnsupportedQuote(s.to_string())),
        }
    }
}

impl TryFrom<String> for Quote {
    type Error = UnsupportedQuote;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Quote> for String {
    fn from(quote: Quote) -> Self {
        quote.to_string()
    }
}

/// Settings shared by the schema compiler and the diff engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Quote style applied to every identifier in emitted SQL.
    pub quote: Quote,
    /// When set, columns removed from a model are left in the database
    /// instead of producing `DROP COLUMN` statements.
    pub keep_dropped_columns: bool,
}

impl SchemaConfig {
    /// Creates the default configuration (backtick quoting, drop removed
    /// columns).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the identifier quote style.
    #[must_use]
    pub const fn with_quote(mut self, quote: Quote) -> Self {
        self.quote = quote;
        self
    }

    /// Keeps columns that disappeared from the model.
    #[must_use]
    pub const fn keep_dropped_columns(mut self, keep: bool) -> Self {
        self.keep_dropped_columns = keep;
        self
    }
}
