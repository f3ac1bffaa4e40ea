//! Tokenizer for the FlatBuffers IDL subset this crate understands.
//!
//! Structured as a single-pass cursor over the source `char`s, the same
//! shape as `no_proto_rs`'s `schema/ast_parser.rs` state-machine tokenizer,
//! generalized from that prototype's ES6-like token set to the punctuation
//! and literal forms the grammar in the format spec actually needs.

use super::ast::{Span, TokKind, Token};
use crate::error::{FbError, SourceContext};

/// Build the 4-line (2 before, the error line, 1 after where available)
/// context window used by `FbError::SchemaSyntax`.
pub fn source_context(source: &str, line: usize, column: usize) -> SourceContext {
    let lines: Vec<&str> = source.lines().collect();
    let first = line.saturating_sub(3);
    let last = (line + 1).min(lines.len());
    let mut snippet = String::new();
    for (i, l) in lines.iter().enumerate().take(last).skip(first) {
        snippet.push_str(&format!("{:>5} | {}\n", i + 1, l));
        if i + 1 == line {
            snippet.push_str(&format!("      | {}^\n", " ".repeat(column.saturating_sub(1))));
        }
    }
    SourceContext { line, column, snippet }
}

fn syntax_err(source: &str, line: usize, column: usize, message: impl Into<String>) -> FbError {
    FbError::SchemaSyntax { message: message.into(), at: source_context(source, line, column) }
}

/// Tokenize `source` into a flat token stream, terminated by one `Eof`
/// token. Comments (`// ...` and `/* ... */`) and whitespace are dropped.
pub fn tokenize(source: &str) -> Result<Vec<Token>, FbError> {
    let chars: Vec<char> = source.chars().collect();
    let mut out = Vec::new();
    let mut i = 0usize;
    let mut line = 1usize;
    let mut col = 1usize;

    // byte offset tracks alongside char index since chars may be
    // multi-byte; schema identifiers/literals are ASCII in practice but we
    // keep this correct for string contents regardless.
    let mut byte_off = 0usize;

    macro_rules! advance {
        () => {{
            if chars[i] == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
            byte_off += chars[i].len_utf8();
            i += 1;
        }};
    }

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            advance!();
            continue;
        }

        // line comment
        if c == '/' && i + 1 < chars.len() && chars[i + 1] == '/' {
            while i < chars.len() && chars[i] != '\n' {
                advance!();
            }
            continue;
        }

        // block comment
        if c == '/' && i + 1 < chars.len() && chars[i + 1] == '*' {
            advance!();
            advance!();
            loop {
                if i + 1 >= chars.len() {
                    return Err(syntax_err(source, line, col, "unterminated block comment"));
                }
                if chars[i] == '*' && chars[i + 1] == '/' {
                    advance!();
                    advance!();
                    break;
                }
                advance!();
            }
            continue;
        }

        // line-leading `#` comment, as the original schema loader tolerates
        if c == '#' {
            while i < chars.len() && chars[i] != '\n' {
                advance!();
            }
            continue;
        }

        let start_byte = byte_off;
        let start_line = line;
        let start_col = col;

        let simple = match c {
            ':' => Some(TokKind::Colon),
            ';' => Some(TokKind::Semicolon),
            ',' => Some(TokKind::Comma),
            '=' => Some(TokKind::Equals),
            '(' => Some(TokKind::LParen),
            ')' => Some(TokKind::RParen),
            '{' => Some(TokKind::LBrace),
            '}' => Some(TokKind::RBrace),
            '[' => Some(TokKind::LBracket),
            ']' => Some(TokKind::RBracket),
            _ => None,
        };

        if let Some(kind) = simple {
            advance!();
            out.push(Token { kind, span: Span { start: start_byte, end: byte_off }, line: start_line, column: start_col });
            continue;
        }

        if c == '"' {
            advance!();
            let mut escaped = false;
            loop {
                if i >= chars.len() {
                    return Err(syntax_err(source, start_line, start_col, "unterminated string literal"));
                }
                if escaped {
                    escaped = false;
                    advance!();
                    continue;
                }
                match chars[i] {
                    '\\' => {
                        escaped = true;
                        advance!();
                    }
                    '"' => {
                        advance!();
                        break;
                    }
                    _ => advance!(),
                }
            }
            out.push(Token {
                kind: TokKind::StrLit,
                span: Span { start: start_byte, end: byte_off },
                line: start_line,
                column: start_col,
            });
            continue;
        }

        if c.is_ascii_digit() || (c == '-' && i + 1 < chars.len() && chars[i + 1].is_ascii_digit()) {
            advance!();
            let mut is_float = false;
            while i < chars.len() {
                match chars[i] {
                    '0'..='9' | 'x' | 'X' | 'a'..='f' | 'A'..='F' => advance!(),
                    '.' => {
                        is_float = true;
                        advance!();
                    }
                    'e' | 'E' => {
                        is_float = true;
                        advance!();
                        if i < chars.len() && (chars[i] == '+' || chars[i] == '-') {
                            advance!();
                        }
                    }
                    _ => break,
                }
            }
            out.push(Token {
                kind: if is_float { TokKind::FloatLit } else { TokKind::IntLit },
                span: Span { start: start_byte, end: byte_off },
                line: start_line,
                column: start_col,
            });
            continue;
        }

        if c.is_alphabetic() || c == '_' || c == '.' {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                advance!();
            }
            out.push(Token {
                kind: TokKind::Ident,
                span: Span { start: start_byte, end: byte_off },
                line: start_line,
                column: start_col,
            });
            continue;
        }

        return Err(syntax_err(source, start_line, start_col, format!("unexpected character `{}`", c)));
    }

    out.push(Token { kind: TokKind::Eof, span: Span { start: byte_off, end: byte_off }, line, column: col });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_simple_table() {
        let toks = tokenize("table T { i8:byte; }").unwrap();
        let kinds: Vec<TokKind> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokKind::Ident,
                TokKind::Ident,
                TokKind::LBrace,
                TokKind::Ident,
                TokKind::Colon,
                TokKind::Ident,
                TokKind::Semicolon,
                TokKind::RBrace,
                TokKind::Eof,
            ]
        );
    }

    #[test]
    fn skips_comments() {
        let toks = tokenize("// hi\ntable T {}\n# also a comment\n").unwrap();
        assert_eq!(toks[0].kind, TokKind::Ident);
        assert_eq!(toks[0].line, 2);
    }

    #[test]
    fn reports_line_column_on_bad_char() {
        let err = tokenize("table T { f: @bad; }").unwrap_err();
        match err {
            FbError::SchemaSyntax { at, .. } => assert_eq!(at.line, 1),
            _ => panic!("expected syntax error"),
        }
    }

    #[test]
    fn negative_and_float_literals() {
        let toks = tokenize("-8 1.5 2e10").unwrap();
        assert_eq!(toks[0].kind, TokKind::IntLit);
        assert_eq!(toks[1].kind, TokKind::FloatLit);
        assert_eq!(toks[2].kind, TokKind::FloatLit);
    }
}
