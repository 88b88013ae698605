//! Line parser for card source.
//!
//! Grammar, one item per line, `;` starts a comment:
//!
//! ```text
//! .card [name]
//! label:
//! [label:] [FLAG] MNEMONIC operand
//! ```
//!
//! Operands are signed decimal or `0x` hex literals, register names, or
//! symbols resolved later against labels and card names.

use std::fmt;

use roomba_core::{ConditionalFlag, Opcode, Register};

use crate::mnemonic::{is_reserved, resolve_flag, resolve_mnemonic, resolve_register};

/// Parsed operand forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Numeric literal.
    Literal(i16),
    /// Register read at execution time.
    Register(Register),
    /// Label or card name, resolved in the second pass.
    Symbol(String),
}

/// A parsed instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInstruction {
    /// Optional conditional flag.
    pub flag: Option<ConditionalFlag>,
    /// Resolved opcode.
    pub opcode: Opcode,
    /// The single operand.
    pub operand: Operand,
    /// 1-indexed column of the operand.
    pub operand_column: usize,
}

/// A single parsed source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// Empty or comment-only line.
    Blank,
    /// `.card` directive opening a new card.
    Card {
        /// Optional card name.
        name: Option<String>,
    },
    /// Label definition on its own line.
    Label {
        /// Label name.
        name: String,
    },
    /// Instruction, possibly preceded by a label on the same line.
    Instruction {
        /// Label defined on the same line.
        label: Option<String>,
        /// The parsed instruction.
        instruction: ParsedInstruction,
    },
}

/// Parse error with its column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// 1-indexed column of the offending token.
    pub column: usize,
    /// Kind of parse error.
    pub kind: ParseErrorKind,
}

/// Classification of parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Unknown mnemonic.
    UnknownMnemonic(String),
    /// Unknown directive name.
    UnknownDirective(String),
    /// Literal that does not fit a 16-bit argument, or a malformed token.
    InvalidOperand(String),
    /// A label or card name collides with a register, flag or mnemonic.
    ReservedName(String),
    /// Malformed label or card name.
    InvalidName(String),
    /// Required operand missing.
    MissingOperand,
    /// Extra tokens after the operand.
    UnexpectedToken(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMnemonic(m) => write!(f, "unknown mnemonic: {m}"),
            Self::UnknownDirective(d) => write!(f, "unknown directive: .{d}"),
            Self::InvalidOperand(v) => write!(f, "invalid operand: {v}"),
            Self::ReservedName(n) => write!(f, "reserved word used as a name: {n}"),
            Self::InvalidName(n) => write!(f, "invalid name: {n}"),
            Self::MissingOperand => write!(f, "missing operand"),
            Self::UnexpectedToken(t) => write!(f, "unexpected token: {t}"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Result of parsing a single line.
pub type ParseResult = Result<ParsedLine, ParseError>;

/// A token and its 1-indexed starting column.
type Token<'a> = (usize, &'a str);

/// Parses one source line.
///
/// # Errors
///
/// Returns a [`ParseError`] for unknown mnemonics or directives, malformed
/// names and operands, or a wrong operand count.
pub fn parse_line(line: &str) -> ParseResult {
    let tokens = tokenize(strip_comment(line));
    let Some(&(column, first)) = tokens.first() else {
        return Ok(ParsedLine::Blank);
    };

    if let Some(directive) = first.strip_prefix('.') {
        return parse_directive(directive, column, &tokens[1..]);
    }

    match first.strip_suffix(':') {
        Some(label) => {
            let label = validate_name(label, column)?;
            if tokens.len() == 1 {
                return Ok(ParsedLine::Label { name: label });
            }
            let instruction = parse_instruction(&tokens[1..])?;
            Ok(ParsedLine::Instruction {
                label: Some(label),
                instruction,
            })
        }
        None => Ok(ParsedLine::Instruction {
            label: None,
            instruction: parse_instruction(&tokens)?,
        }),
    }
}

fn strip_comment(line: &str) -> &str {
    line.find(';').map_or(line, |pos| &line[..pos])
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;

    for (idx, ch) in text.char_indices() {
        match (ch.is_whitespace() || ch == ',', start) {
            (true, Some(begin)) => {
                tokens.push((begin + 1, &text[begin..idx]));
                start = None;
            }
            (false, None) => start = Some(idx),
            _ => {}
        }
    }
    if let Some(begin) = start {
        tokens.push((begin + 1, &text[begin..]));
    }

    tokens
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn validate_name(name: &str, column: usize) -> Result<String, ParseError> {
    if !is_identifier(name) {
        return Err(ParseError {
            column,
            kind: ParseErrorKind::InvalidName(name.to_string()),
        });
    }
    if is_reserved(name) {
        return Err(ParseError {
            column,
            kind: ParseErrorKind::ReservedName(name.to_string()),
        });
    }
    Ok(name.to_string())
}

fn parse_directive(name: &str, column: usize, args: &[Token<'_>]) -> ParseResult {
    if !name.eq_ignore_ascii_case("card") {
        return Err(ParseError {
            column,
            kind: ParseErrorKind::UnknownDirective(name.to_string()),
        });
    }

    match args {
        [] => Ok(ParsedLine::Card { name: None }),
        [(col, card)] => Ok(ParsedLine::Card {
            name: Some(validate_name(card, *col)?),
        }),
        [_, (col, extra), ..] => Err(ParseError {
            column: *col,
            kind: ParseErrorKind::UnexpectedToken((*extra).to_string()),
        }),
    }
}

fn parse_instruction(tokens: &[Token<'_>]) -> Result<ParsedInstruction, ParseError> {
    let (flag, rest) = match tokens.split_first() {
        Some(((_, word), rest)) if resolve_flag(word).is_some() => (resolve_flag(word), rest),
        _ => (None, tokens),
    };

    let Some((&(mnemonic_column, mnemonic), operands)) = rest.split_first() else {
        let column = tokens.last().map_or(1, |(col, word)| col + word.len());
        return Err(ParseError {
            column,
            kind: ParseErrorKind::MissingOperand,
        });
    };
    let opcode = resolve_mnemonic(mnemonic).ok_or_else(|| ParseError {
        column: mnemonic_column,
        kind: ParseErrorKind::UnknownMnemonic(mnemonic.to_string()),
    })?;

    match operands {
        [] => Err(ParseError {
            column: mnemonic_column + mnemonic.len(),
            kind: ParseErrorKind::MissingOperand,
        }),
        [(column, text)] => Ok(ParsedInstruction {
            flag,
            opcode,
            operand: parse_operand(text, *column)?,
            operand_column: *column,
        }),
        [_, (column, extra), ..] => Err(ParseError {
            column: *column,
            kind: ParseErrorKind::UnexpectedToken((*extra).to_string()),
        }),
    }
}

fn parse_operand(text: &str, column: usize) -> Result<Operand, ParseError> {
    if let Some(reg) = resolve_register(text) {
        return Ok(Operand::Register(reg));
    }
    if is_identifier(text) {
        return Ok(Operand::Symbol(text.to_string()));
    }

    parse_literal(text)
        .and_then(|value| i16::try_from(value).ok())
        .map(Operand::Literal)
        .ok_or_else(|| ParseError {
            column,
            kind: ParseErrorKind::InvalidOperand(text.to_string()),
        })
}

fn parse_literal(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None if digits.bytes().all(|b| b.is_ascii_digit()) => digits.parse::<i64>().ok()?,
        None => return None,
    };
    Some(if negative { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instruction(line: &str) -> ParsedInstruction {
        match parse_line(line) {
            Ok(ParsedLine::Instruction { instruction, .. }) => instruction,
            other => panic!("expected instruction, got {other:?}"),
        }
    }

    fn error(line: &str) -> ParseError {
        parse_line(line).expect_err("line should not parse")
    }

    #[test]
    fn blank_and_comment_lines() {
        assert_eq!(parse_line(""), Ok(ParsedLine::Blank));
        assert_eq!(parse_line("   "), Ok(ParsedLine::Blank));
        assert_eq!(parse_line("  ; just a note"), Ok(ParsedLine::Blank));
    }

    #[test]
    fn card_directive_with_and_without_name() {
        assert_eq!(parse_line(".card"), Ok(ParsedLine::Card { name: None }));
        assert_eq!(
            parse_line(".CARD patrol ; first"),
            Ok(ParsedLine::Card {
                name: Some("patrol".into())
            })
        );
        assert_eq!(
            error(".org 4").kind,
            ParseErrorKind::UnknownDirective("org".into())
        );
        assert_eq!(
            error(".card a").kind,
            ParseErrorKind::ReservedName("a".into())
        );
        assert_eq!(
            error(".card one two").kind,
            ParseErrorKind::UnexpectedToken("two".into())
        );
    }

    #[test]
    fn label_alone_and_before_instruction() {
        assert_eq!(
            parse_line("loop:"),
            Ok(ParsedLine::Label {
                name: "loop".into()
            })
        );
        match parse_line("top: ADD 1") {
            Ok(ParsedLine::Instruction { label, instruction }) => {
                assert_eq!(label.as_deref(), Some("top"));
                assert_eq!(instruction.opcode, Opcode::Add);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn flagged_instruction_with_register_operand() {
        let parsed = instruction("  pos sub d");
        assert_eq!(parsed.flag, Some(ConditionalFlag::Pos));
        assert_eq!(parsed.opcode, Opcode::Sub);
        assert_eq!(parsed.operand, Operand::Register(Register::D));
        assert_eq!(parsed.operand_column, 11);
    }

    #[test]
    fn literal_forms() {
        assert_eq!(instruction("LDA -12").operand, Operand::Literal(-12));
        assert_eq!(instruction("LDA +7").operand, Operand::Literal(7));
        assert_eq!(instruction("LDA 0x1F").operand, Operand::Literal(31));
        assert_eq!(instruction("LDA -0x10").operand, Operand::Literal(-16));
    }

    #[test]
    fn symbols_are_kept_for_resolution() {
        assert_eq!(
            instruction("JMP loop").operand,
            Operand::Symbol("loop".into())
        );
    }

    #[test]
    fn errors_carry_columns() {
        let err = error("  FOO 1");
        assert_eq!(err.kind, ParseErrorKind::UnknownMnemonic("FOO".into()));
        assert_eq!(err.column, 3);

        let err = error("LDA 40000");
        assert_eq!(err.kind, ParseErrorKind::InvalidOperand("40000".into()));
        assert_eq!(err.column, 5);

        let err = error("ADD");
        assert_eq!(err.kind, ParseErrorKind::MissingOperand);
        assert_eq!(err.column, 4);

        let err = error("ADD 1 2");
        assert_eq!(err.kind, ParseErrorKind::UnexpectedToken("2".into()));
        assert_eq!(err.column, 7);

        assert_eq!(error("POS").kind, ParseErrorKind::MissingOperand);
        assert_eq!(
            error("1x: ADD 1").kind,
            ParseErrorKind::InvalidName("1x".into())
        );
        assert_eq!(
            error("mov: ADD 1").kind,
            ParseErrorKind::ReservedName("mov".into())
        );
    }
}
