//! Structured diagnostics for assembler phases.
//!
//! Every diagnostic formats to stderr as:
//! ```text
//! patrol.cards:10:5: error: unknown mnemonic: FOO
//! patrol.cards:40:1: warning: card 2 holds 18 instructions (recommended at most 16)
//! ```

use std::fmt;
use std::path::PathBuf;

use roomba_core::{MAX_CARD_COUNT, MAX_CARD_LENGTH};

use crate::parser::ParseError;
use crate::symbols::SymbolError;

/// A source location for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLoc {
    /// File path.
    pub file: PathBuf,
    /// 1-indexed line number.
    pub line: usize,
    /// 1-indexed column number (1 if unknown).
    pub column: usize,
}

impl SourceLoc {
    /// Creates a new source location.
    #[must_use]
    pub fn new(file: impl Into<PathBuf>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

/// An assembler error with source context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembleError {
    /// The kind of error.
    pub kind: AssembleErrorKind,
    /// Source location if available.
    pub location: Option<SourceLoc>,
}

impl AssembleError {
    /// Creates an error without a location.
    #[must_use]
    pub const fn new(kind: AssembleErrorKind) -> Self {
        Self {
            kind,
            location: None,
        }
    }

    /// Adds a source location to the error.
    #[must_use]
    pub fn with_location(mut self, loc: SourceLoc) -> Self {
        self.location = Some(loc);
        self
    }

    /// Wraps a parse error found on `line` of `file`.
    #[must_use]
    pub fn parse(file: &str, line: usize, error: ParseError) -> Self {
        let loc = SourceLoc::new(file, line, error.column);
        Self::new(AssembleErrorKind::Parse(error)).with_location(loc)
    }

    /// Wraps a layout or resolution error found in `file`.
    #[must_use]
    pub fn symbol(file: &str, error: SymbolError) -> Self {
        let loc = SourceLoc::new(file, error.line, error.column);
        Self::new(AssembleErrorKind::Symbol(error)).with_location(loc)
    }

    /// Formats the error for stderr output.
    #[must_use]
    pub fn format_for_stderr(&self) -> String {
        self.location.as_ref().map_or_else(
            || format!("error: {}", self.kind),
            |loc| format!("{loc}: error: {}", self.kind),
        )
    }
}

impl fmt::Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{loc}: {}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for AssembleError {}

/// Classification of assembler errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembleErrorKind {
    /// Source line did not parse.
    Parse(ParseError),
    /// Duplicate or unresolvable name.
    Symbol(SymbolError),
    /// Cards or instructions past what the 8-bit pointers can reach.
    Unaddressable(String),
    /// I/O error reading the source file.
    Io(String),
}

impl fmt::Display for AssembleErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "{e}"),
            Self::Symbol(e) => write!(f, "{e}"),
            Self::Unaddressable(what) => write!(f, "{what} cannot be addressed"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

/// Every error found in one assembly run, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorCollection {
    errors: Vec<AssembleError>,
}

impl ErrorCollection {
    /// Creates an empty error collection.
    #[must_use]
    pub const fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Adds an error to the collection.
    pub fn push(&mut self, error: AssembleError) {
        self.errors.push(error);
    }

    /// Returns true if the collection is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns an iterator over the errors.
    pub fn iter(&self) -> impl Iterator<Item = &AssembleError> {
        self.errors.iter()
    }

    /// Returns the first error, if any.
    #[must_use]
    pub fn first(&self) -> Option<&AssembleError> {
        self.errors.first()
    }

    /// Formats all errors for stderr output, one per line.
    #[must_use]
    pub fn format_for_stderr(&self) -> String {
        self.errors
            .iter()
            .map(AssembleError::format_for_stderr)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for ErrorCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorCollection {}

impl From<AssembleError> for ErrorCollection {
    fn from(error: AssembleError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl FromIterator<AssembleError> for ErrorCollection {
    fn from_iter<T: IntoIterator<Item = AssembleError>>(iter: T) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

/// A non-fatal assembly diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembleWarning {
    /// Kind of warning.
    pub kind: AssembleWarningKind,
    /// Source location if available.
    pub location: Option<SourceLoc>,
}

impl AssembleWarning {
    /// Formats the warning for stderr output.
    #[must_use]
    pub fn format_for_stderr(&self) -> String {
        self.location.as_ref().map_or_else(
            || format!("warning: {}", self.kind),
            |loc| format!("{loc}: warning: {}", self.kind),
        )
    }
}

impl fmt::Display for AssembleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

/// Classification of assembly warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembleWarningKind {
    /// More cards than the recommended capacity.
    TooManyCards {
        /// Cards in the program.
        count: usize,
    },
    /// A card longer than the recommended capacity.
    CardTooLong {
        /// Card index.
        card: usize,
        /// Instructions on the card.
        length: usize,
    },
    /// A literal outside the register range; it saturates when used.
    LiteralSaturates {
        /// The literal as written.
        value: i16,
    },
}

impl fmt::Display for AssembleWarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyCards { count } => write!(
                f,
                "program has {count} cards (recommended at most {MAX_CARD_COUNT})"
            ),
            Self::CardTooLong { card, length } => write!(
                f,
                "card {card} holds {length} instructions (recommended at most {MAX_CARD_LENGTH})"
            ),
            Self::LiteralSaturates { value } => {
                write!(f, "literal {value} is outside -999..=999 and will saturate")
            }
        }
    }
}
