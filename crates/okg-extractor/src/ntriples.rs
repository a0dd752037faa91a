//! N-Triples line validation
//!
//! Two stages guard the graph against free-form model output:
//!
//! 1. [`prefilter`] is a cheap shape check run on every response line. Lines
//!    that fail it are dropped without further work.
//! 2. [`canonicalize`] fully tokenizes a surviving line, decodes escapes and
//!    validates every IRI and language tag, producing a [`Triple`].
//!
//! Grammar accepted by stage 2:
//!
//! ```text
//! line    := ws* term ws+ term ws+ term ws* "." ws*
//! term    := IRIREF | literal
//! IRIREF  := "<" ( char - [<>"{}|^`\ space] | UCHAR )* ">"
//! literal := '"' ( char - ["\\\n\r] | ECHAR | UCHAR )* '"' ( LANGTAG | "^^" IRIREF )?
//! ```

use std::fmt;

use okg_core::{Iri, Literal, Term, Triple};
use thiserror::Error;

// ============================================================================
// Stage 1
// ============================================================================

/// Shapes accepted by [`prefilter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrefilterMode {
    /// `<…> <…> <…> .` only
    #[default]
    IriOnly,
    /// Also accept a quoted literal (optionally `@lang` or `^^<…>`) as object
    AllowLiteralObjects,
}

impl PrefilterMode {
    /// Mode selected by the `accept_literal_objects` setting
    pub fn from_flag(accept_literal_objects: bool) -> Self {
        if accept_literal_objects {
            Self::AllowLiteralObjects
        } else {
            Self::IriOnly
        }
    }
}

/// Shape-only check of one response line.
///
/// Each bracketed term is one or more characters other than `>`. Terms are
/// separated by whitespace, and whitespace may precede the final period.
pub fn prefilter(line: &str, mode: PrefilterMode) -> bool {
    let mut rest = line.trim();

    for position in 0..3 {
        if position > 0 {
            let trimmed = rest.trim_start();
            if trimmed.len() == rest.len() {
                return false;
            }
            rest = trimmed;
        }

        let next = match bracketed_shape(rest) {
            Some(next) => Some(next),
            None if position == 2 && mode == PrefilterMode::AllowLiteralObjects => {
                literal_shape(rest)
            }
            None => None,
        };

        match next {
            Some(next) => rest = next,
            None => return false,
        }
    }

    rest.trim_start() == "."
}

fn bracketed_shape(s: &str) -> Option<&str> {
    let body = s.strip_prefix('<')?;
    let close = body.find('>')?;
    (close > 0).then(|| &body[close + 1..])
}

fn literal_shape(s: &str) -> Option<&str> {
    let body = s.strip_prefix('"')?;
    let mut chars = body.char_indices();
    let close = loop {
        match chars.next()? {
            (_, '\\') => {
                chars.next()?;
            }
            (i, '"') => break i,
            _ => {}
        }
    };
    let rest = &body[close + 1..];

    if let Some(tag) = rest.strip_prefix('@') {
        let end = tag
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
            .unwrap_or(tag.len());
        (end > 0).then(|| &tag[end..])
    } else if let Some(datatype) = rest.strip_prefix("^^") {
        bracketed_shape(datatype)
    } else {
        Some(rest)
    }
}

// ============================================================================
// Stage 2
// ============================================================================

/// Why a line failed to canonicalize
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineErrorKind {
    /// Line ended inside a term or before the period
    UnexpectedEnd,
    /// Character not allowed here
    UnexpectedChar(char),
    /// Character not allowed inside an IRI reference
    IllegalIriChar(char),
    /// Malformed `\` escape sequence
    InvalidEscape,
    /// Decoded IRI is not an absolute IRI
    InvalidIri { value: String, reason: String },
    /// Language tag rejected
    InvalidLanguageTag(String),
    /// Subject or predicate position holds a literal
    LiteralNotAllowed { position: &'static str },
    /// Two terms are not separated by whitespace
    MissingWhitespace,
    /// No terminating period
    MissingPeriod,
    /// Content after the terminating period
    TrailingContent,
}

impl fmt::Display for LineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEnd => write!(f, "unexpected end of line"),
            Self::UnexpectedChar(c) => write!(f, "unexpected character {c:?}"),
            Self::IllegalIriChar(c) => write!(f, "character {c:?} is not allowed in an IRI"),
            Self::InvalidEscape => write!(f, "invalid escape sequence"),
            Self::InvalidIri { value, reason } => write!(f, "invalid IRI <{value}>: {reason}"),
            Self::InvalidLanguageTag(tag) => write!(f, "invalid language tag @{tag}"),
            Self::LiteralNotAllowed { position } => write!(f, "literal not allowed as {position}"),
            Self::MissingWhitespace => write!(f, "terms must be separated by whitespace"),
            Self::MissingPeriod => write!(f, "missing terminating '.'"),
            Self::TrailingContent => write!(f, "unexpected content after '.'"),
        }
    }
}

/// Stage-2 rejection with the 1-based character column where it occurred
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("column {column}: {kind}")]
pub struct LineError {
    pub column: usize,
    pub kind: LineErrorKind,
}

/// Parse one line into a canonical triple.
pub fn canonicalize(line: &str) -> Result<Triple, LineError> {
    let mut cursor = Cursor::new(line);

    cursor.skip_whitespace();
    let subject = cursor.iri_position("subject")?;
    cursor.require_whitespace()?;
    let predicate = cursor.iri_position("predicate")?;
    cursor.require_whitespace()?;
    let object = cursor.term()?;
    cursor.skip_whitespace();

    if cursor.peek() != Some('.') {
        return Err(cursor.error(LineErrorKind::MissingPeriod));
    }
    cursor.bump();

    cursor.skip_whitespace();
    if cursor.peek().is_some() {
        return Err(cursor.error(LineErrorKind::TrailingContent));
    }

    Ok(Triple::new(subject, predicate, object))
}

struct Cursor {
    chars: Vec<char>,
    pos: usize,
}

impl Cursor {
    fn new(line: &str) -> Self {
        Self {
            chars: line.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn next_or_end(&mut self) -> Result<char, LineError> {
        self.bump()
            .ok_or_else(|| self.error(LineErrorKind::UnexpectedEnd))
    }

    fn error(&self, kind: LineErrorKind) -> LineError {
        self.error_at(self.pos, kind)
    }

    fn error_at(&self, pos: usize, kind: LineErrorKind) -> LineError {
        LineError {
            column: pos + 1,
            kind,
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn require_whitespace(&mut self) -> Result<(), LineError> {
        match self.peek() {
            Some(c) if c.is_whitespace() => {
                self.skip_whitespace();
                Ok(())
            }
            Some(_) => Err(self.error(LineErrorKind::MissingWhitespace)),
            None => Err(self.error(LineErrorKind::UnexpectedEnd)),
        }
    }

    fn iri_position(&mut self, position: &'static str) -> Result<Iri, LineError> {
        let start = self.pos;
        match self.term()? {
            Term::Iri(iri) => Ok(iri),
            Term::Literal(_) => Err(self.error_at(start, LineErrorKind::LiteralNotAllowed { position })),
        }
    }

    fn term(&mut self) -> Result<Term, LineError> {
        match self.peek() {
            Some('<') => self.iri_ref().map(Term::Iri),
            Some('"') => self.literal().map(Term::Literal),
            Some(c) => Err(self.error(LineErrorKind::UnexpectedChar(c))),
            None => Err(self.error(LineErrorKind::UnexpectedEnd)),
        }
    }

    fn iri_ref(&mut self) -> Result<Iri, LineError> {
        let start = self.pos;
        self.bump();
        let mut value = String::new();

        loop {
            let at = self.pos;
            match self.next_or_end()? {
                '>' => break,
                '\\' => value.push(self.uchar()?),
                c if is_illegal_in_iri(c) => {
                    return Err(self.error_at(at, LineErrorKind::IllegalIriChar(c)))
                }
                c => value.push(c),
            }
        }

        Iri::new(value.as_str()).map_err(|e| {
            self.error_at(
                start,
                LineErrorKind::InvalidIri {
                    value,
                    reason: e.to_string(),
                },
            )
        })
    }

    fn literal(&mut self) -> Result<Literal, LineError> {
        self.bump();
        let mut lexical = String::new();

        loop {
            let at = self.pos;
            match self.next_or_end()? {
                '"' => break,
                '\\' => lexical.push(self.escape()?),
                c @ ('\n' | '\r') => return Err(self.error_at(at, LineErrorKind::UnexpectedChar(c))),
                c => lexical.push(c),
            }
        }

        match self.peek() {
            Some('@') => {
                let start = self.pos;
                self.bump();
                let tag = self.language_tag();
                if tag.is_empty() {
                    return Err(self.error(LineErrorKind::InvalidLanguageTag(tag)));
                }
                Literal::language_tagged(lexical, tag.as_str())
                    .map_err(|_| self.error_at(start, LineErrorKind::InvalidLanguageTag(tag)))
            }
            Some('^') => {
                self.bump();
                if self.bump() != Some('^') {
                    return Err(self.error(LineErrorKind::UnexpectedChar('^')));
                }
                if self.peek() != Some('<') {
                    return Err(match self.peek() {
                        Some(c) => self.error(LineErrorKind::UnexpectedChar(c)),
                        None => self.error(LineErrorKind::UnexpectedEnd),
                    });
                }
                let datatype = self.iri_ref()?;
                Ok(Literal::typed(lexical, datatype))
            }
            _ => Ok(Literal::simple(lexical)),
        }
    }

    fn language_tag(&mut self) -> String {
        let mut tag = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '-' {
                tag.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        tag
    }

    /// `\u` or `\U` after the backslash has been consumed
    fn uchar(&mut self) -> Result<char, LineError> {
        let start = self.pos - 1;
        let digits = match self.bump() {
            Some('u') => 4,
            Some('U') => 8,
            _ => return Err(self.error_at(start, LineErrorKind::InvalidEscape)),
        };

        let mut code = 0u32;
        for _ in 0..digits {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error_at(start, LineErrorKind::InvalidEscape))?;
            code = code * 16 + digit;
        }

        char::from_u32(code).ok_or_else(|| self.error_at(start, LineErrorKind::InvalidEscape))
    }

    /// ECHAR or UCHAR inside a literal
    fn escape(&mut self) -> Result<char, LineError> {
        let decoded = match self.peek() {
            Some('t') => '\t',
            Some('b') => '\u{8}',
            Some('n') => '\n',
            Some('r') => '\r',
            Some('f') => '\u{c}',
            Some('"') => '"',
            Some('\'') => '\'',
            Some('\\') => '\\',
            Some('u' | 'U') => return self.uchar(),
            _ => return Err(self.error_at(self.pos - 1, LineErrorKind::InvalidEscape)),
        };
        self.bump();
        Ok(decoded)
    }
}

fn is_illegal_in_iri(c: char) -> bool {
    matches!(c, '<' | '"' | '{' | '}' | '|' | '^' | '`') || c <= ' '
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const GOOD: &str = "<http://www.enit.fr/2022/03/baeo#AccidentAvion> <http://www.enit.fr/2022/03/baeo#aCause> <http://www.enit.fr/2022/03/baeo#MauvaisTemps> .";

    #[test]
    fn test_prefilter_accepts_three_iris() {
        assert!(prefilter(GOOD, PrefilterMode::IriOnly));
        assert!(prefilter("  <a> <b>\t<c>.  ", PrefilterMode::IriOnly));
    }

    #[test]
    fn test_prefilter_rejects_bare_object() {
        let line = "<http://ex#A> <http://ex#p> not-a-uri .";
        assert!(!prefilter(line, PrefilterMode::IriOnly));
        assert!(!prefilter(line, PrefilterMode::AllowLiteralObjects));
    }

    #[test]
    fn test_prefilter_rejects_malformed_shapes() {
        for line in [
            "",
            "Voici les triplets :",
            "<http://ex#A> <http://ex#p> <http://ex#B>",
            "<http://ex#A><http://ex#p> <http://ex#B> .",
            "<> <http://ex#p> <http://ex#B> .",
            "<http://ex#A> <http://ex#p> <http://ex#B> . extra",
            "- <http://ex#A> <http://ex#p> <http://ex#B> .",
        ] {
            assert!(!prefilter(line, PrefilterMode::IriOnly), "accepted {line:?}");
        }
    }

    #[test]
    fn test_literal_objects_depend_on_mode() {
        let plain = r#"<http://ex#A> <http://ex#nom> "Airbus A320" ."#;
        let tagged = r#"<http://ex#A> <http://ex#nom> "avion"@fr ."#;
        let typed = r#"<http://ex#A> <http://ex#date> "2009-06-01"^^<http://www.w3.org/2001/XMLSchema#date> ."#;
        let escaped = r#"<http://ex#A> <http://ex#nom> "dit \"stop\"" ."#;

        for line in [plain, tagged, typed, escaped] {
            assert!(!prefilter(line, PrefilterMode::IriOnly), "{line}");
            assert!(prefilter(line, PrefilterMode::AllowLiteralObjects), "{line}");
        }

        let literal_subject = r#""A" <http://ex#p> <http://ex#B> ."#;
        assert!(!prefilter(literal_subject, PrefilterMode::AllowLiteralObjects));
        assert_eq!(PrefilterMode::from_flag(true), PrefilterMode::AllowLiteralObjects);
        assert_eq!(PrefilterMode::default(), PrefilterMode::IriOnly);
    }

    #[test]
    fn test_canonicalize_iri_triple() {
        let triple = canonicalize(GOOD).unwrap();
        assert_eq!(triple.subject.local_name(), "AccidentAvion");
        assert_eq!(triple.predicate.local_name(), "aCause");
        assert_eq!(triple.to_string(), GOOD);
    }

    #[test]
    fn test_canonicalize_literals() {
        let triple = canonicalize(r#"<http://ex.org/a> <http://ex.org/p> "ligne\nsuivante é"@FR ."#).unwrap();
        let Term::Literal(literal) = &triple.object else {
            panic!("expected literal");
        };
        assert_eq!(literal.lexical(), "ligne\nsuivante é");
        assert_eq!(literal.language(), Some("fr"));

        let triple = canonicalize(
            r#"<http://ex.org/a> <http://ex.org/p> "3"^^<http://www.w3.org/2001/XMLSchema#integer> ."#,
        )
        .unwrap();
        let Term::Literal(literal) = &triple.object else {
            panic!("expected literal");
        };
        assert_eq!(
            literal.datatype().map(Iri::as_str),
            Some("http://www.w3.org/2001/XMLSchema#integer")
        );
    }

    #[test]
    fn test_stage_two_rejects_what_stage_one_accepts() {
        let cases = [
            "<http://ex.org/a b> <http://ex.org/p> <http://ex.org/c> .",
            "<relative> <http://ex.org/p> <http://ex.org/c> .",
            "<http://ex.org/a\\u0020b> <http://ex.org/p> <http://ex.org/c> .",
            "<http://ex.org/a{1}> <http://ex.org/p> <http://ex.org/c> .",
        ];
        for line in cases {
            assert!(prefilter(line, PrefilterMode::IriOnly), "{line}");
            assert!(canonicalize(line).is_err(), "{line}");
        }
    }

    #[test]
    fn test_error_columns() {
        let err = canonicalize("<http://ex.org/a b> <http://ex.org/p> <http://ex.org/c> .").unwrap_err();
        assert_eq!(err.column, 17);
        assert_eq!(err.kind, LineErrorKind::IllegalIriChar(' '));

        let err = canonicalize("<relative> <http://ex.org/p> <http://ex.org/c> .").unwrap_err();
        assert_eq!(err.column, 1);
        assert!(matches!(err.kind, LineErrorKind::InvalidIri { .. }));

        let err = canonicalize(r#""a" <http://ex.org/p> <http://ex.org/c> ."#).unwrap_err();
        assert_eq!(err.kind, LineErrorKind::LiteralNotAllowed { position: "subject" });
    }

    #[test]
    fn test_structural_errors() {
        let base = "<http://ex.org/a> <http://ex.org/p> <http://ex.org/c>";
        assert_eq!(canonicalize(base).unwrap_err().kind, LineErrorKind::MissingPeriod);
        assert_eq!(
            canonicalize(&format!("{base} . <x>")).unwrap_err().kind,
            LineErrorKind::TrailingContent
        );
        assert_eq!(
            canonicalize("<http://ex.org/a><http://ex.org/p> <http://ex.org/c> .")
                .unwrap_err()
                .kind,
            LineErrorKind::MissingWhitespace
        );
        assert_eq!(
            canonicalize(r#"<http://ex.org/a> <http://ex.org/p> "x\q" ."#)
                .unwrap_err()
                .kind,
            LineErrorKind::InvalidEscape
        );
        assert_eq!(
            canonicalize("<http://ex.org/a> <http://ex.org/p> ").unwrap_err().kind,
            LineErrorKind::UnexpectedEnd
        );
    }

    proptest! {
        #[test]
        fn canonicalize_never_panics(line in "\\PC{0,80}") {
            let _ = canonicalize(&line);
        }

        #[test]
        fn generated_iri_lines_pass_both_stages(
            s in "[A-Za-z][A-Za-z0-9]{0,12}",
            p in "[a-z][A-Za-z0-9]{0,12}",
            o in "[A-Za-z][A-Za-z0-9]{0,12}",
        ) {
            let line = format!(
                "<http://www.enit.fr/2022/03/baeo#{s}> <http://www.enit.fr/2022/03/baeo#{p}> <http://www.enit.fr/2022/03/baeo#{o}> ."
            );
            prop_assert!(prefilter(&line, PrefilterMode::IriOnly));
            let triple = canonicalize(&line).unwrap();
            prop_assert_eq!(triple.to_string(), line);
        }
    }
}
