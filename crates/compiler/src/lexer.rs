//! Lexer with significant indentation (spec §4.1).
//!
//! Mirrors the teacher's hand-written tokenizer shape (a `Vec<char>`, an
//! index cursor, line/column bookkeeping) but adds the INDENT/DEDENT/NEWLINE
//! protocol the teacher's concatenative syntax never needed.

use yasn_core::{Diagnostic, DiagnosticKind, Position};

use crate::token::{Keyword, Token, TokenKind};

const TWO_CHAR_OPS: &[&str] = &["->", "==", "!=", "<=", ">="];
const SINGLE_CHAR_PUNCT: &[char] = &[
    '(', ')', ':', ',', '[', ']', '{', '}', '+', '-', '*', '/', '%', '=', '<', '>', '.', '|', '?',
];

fn lex_error(msg: impl Into<String>, line: usize, col: usize) -> Diagnostic {
    Diagnostic::at(DiagnosticKind::Lex, msg, Position::new(line, col))
}

/// Normalizes CRLF/CR to LF and strips a leading BOM.
fn normalize(source: &str) -> String {
    let stripped = source.strip_prefix('\u{FEFF}').unwrap_or(source);
    stripped.replace("\r\n", "\n").replace('\r', "\n")
}

struct BracketFrame {
    ch: char,
    line: usize,
    col: usize,
}

struct Lexer {
    chars: Vec<char>,
    i: usize,
    line: usize,
    col: usize,
    tokens: Vec<Token>,
    indent_stack: Vec<usize>,
    brackets: Vec<BracketFrame>,
}

fn closing_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        '{' => '}',
        _ => unreachable!(),
    }
}

fn opening_for(close: char) -> char {
    match close {
        ')' => '(',
        ']' => '[',
        '}' => '{',
        _ => unreachable!(),
    }
}

impl Lexer {
    fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            i: 0,
            line: 1,
            col: 1,
            tokens: Vec::new(),
            indent_stack: vec![0],
            brackets: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.i).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.i + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.i += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, line: usize, col: usize) {
        self.tokens.push(Token::new(kind, line, col));
    }

    /// Runs the indentation protocol at the start of a logical line: skips
    /// blank and comment-only lines (they never affect indentation), then
    /// emits INDENT/DEDENT for the next content line. Returns `false` if EOF
    /// was reached without finding a content line.
    fn consume_indentation(&mut self) -> Result<bool, Diagnostic> {
        loop {
            let line_start_line = self.line;
            let mut w = 0usize;
            while self.peek() == Some(' ') {
                self.bump();
                w += 1;
            }
            match self.peek() {
                None => return Ok(false),
                Some('\n') => {
                    self.bump();
                    continue;
                }
                Some('#') => {
                    while self.peek().is_some() && self.peek() != Some('\n') {
                        self.bump();
                    }
                    if self.peek() == Some('\n') {
                        self.bump();
                    }
                    continue;
                }
                Some(_) => {
                    let top = *self.indent_stack.last().unwrap();
                    if w > top {
                        self.indent_stack.push(w);
                        self.push(TokenKind::Indent, line_start_line, w + 1);
                    } else if w < top {
                        while *self.indent_stack.last().unwrap() > w {
                            self.indent_stack.pop();
                            self.push(TokenKind::Dedent, line_start_line, w + 1);
                        }
                        if *self.indent_stack.last().unwrap() != w {
                            return Err(lex_error(
                                "inconsistent dedent: indentation does not match any enclosing level",
                                line_start_line,
                                w + 1,
                            ));
                        }
                    }
                    return Ok(true);
                }
            }
        }
    }

    fn read_string(&mut self) -> Result<String, Diagnostic> {
        let (start_line, start_col) = (self.line, self.col);
        self.bump(); // opening quote
        let mut s = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(lex_error("unterminated string literal", start_line, start_col));
                }
                Some('"') => {
                    self.bump();
                    return Ok(s);
                }
                Some('\\') => {
                    let (eline, ecol) = (self.line, self.col);
                    self.bump();
                    match self.peek() {
                        Some('n') => {
                            s.push('\n');
                            self.bump();
                        }
                        Some('t') => {
                            s.push('\t');
                            self.bump();
                        }
                        Some('r') => {
                            s.push('\r');
                            self.bump();
                        }
                        Some('"') => {
                            s.push('"');
                            self.bump();
                        }
                        Some('\\') => {
                            s.push('\\');
                            self.bump();
                        }
                        Some(other) => {
                            return Err(lex_error(
                                format!("unknown escape sequence '\\{other}'"),
                                eline,
                                ecol,
                            ));
                        }
                        None => {
                            return Err(lex_error("unterminated string literal", start_line, start_col));
                        }
                    }
                }
                Some(c) => {
                    s.push(c);
                    self.bump();
                }
            }
        }
    }

    fn read_number(&mut self) -> TokenKind {
        let mut text = String::new();
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            text.push(self.bump().unwrap());
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            text.push(self.bump().unwrap()); // '.'
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                text.push(self.bump().unwrap());
            }
            TokenKind::Float(text.parse().expect("validated float lexeme"))
        } else {
            TokenKind::Int(text.parse().expect("validated integer lexeme"))
        }
    }

    fn read_ident(&mut self) -> TokenKind {
        let mut text = String::new();
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            text.push(self.bump().unwrap());
        }
        match Keyword::from_ident(&text) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Ident(text),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut at_line_start = true;
        loop {
            if at_line_start && self.brackets.is_empty() {
                if !self.consume_indentation()? {
                    break;
                }
                at_line_start = false;
            }
            let Some(c) = self.peek() else { break };
            let (line, col) = (self.line, self.col);
            match c {
                ' ' => {
                    self.bump();
                }
                '\n' => {
                    self.bump();
                    if self.brackets.is_empty() {
                        self.push(TokenKind::Newline, line, col);
                        at_line_start = true;
                    }
                }
                '#' => {
                    while self.peek().is_some() && self.peek() != Some('\n') {
                        self.bump();
                    }
                }
                '"' => {
                    let s = self.read_string()?;
                    self.push(TokenKind::Str(s), line, col);
                }
                '(' | '[' | '{' => {
                    self.bump();
                    self.brackets.push(BracketFrame { ch: c, line, col });
                    self.push(TokenKind::Punct(match c {
                        '(' => "(",
                        '[' => "[",
                        _ => "{",
                    }), line, col);
                }
                ')' | ']' | '}' => {
                    self.bump();
                    match self.brackets.pop() {
                        Some(frame) if closing_for(frame.ch) == c => {}
                        Some(frame) => {
                            return Err(lex_error(
                                format!(
                                    "mismatched closing bracket '{}': expected '{}' to close '{}' opened at {}:{}",
                                    c,
                                    closing_for(frame.ch),
                                    frame.ch,
                                    frame.line,
                                    frame.col
                                ),
                                line,
                                col,
                            ));
                        }
                        None => {
                            return Err(lex_error(
                                format!("unmatched closing bracket '{c}': expected opener '{}' first", opening_for(c)),
                                line,
                                col,
                            ));
                        }
                    }
                    self.push(TokenKind::Punct(match c {
                        ')' => ")",
                        ']' => "]",
                        _ => "}",
                    }), line, col);
                }
                c if c.is_ascii_digit() => {
                    let kind = self.read_number();
                    self.push(kind, line, col);
                }
                c if c.is_alphabetic() || c == '_' => {
                    let kind = self.read_ident();
                    self.push(kind, line, col);
                }
                _ => {
                    if let Some(op) = TWO_CHAR_OPS
                        .iter()
                        .find(|op| self.peek() == op.chars().next() && self.peek_at(1) == op.chars().nth(1))
                    {
                        self.bump();
                        self.bump();
                        self.push(TokenKind::Punct(op), line, col);
                    } else if let Some(&pc) = SINGLE_CHAR_PUNCT.iter().find(|&&p| p == c) {
                        self.bump();
                        let text: &'static str = SINGLE_CHAR_PUNCT_TEXT
                            .iter()
                            .find(|(ch, _)| *ch == pc)
                            .map(|(_, s)| *s)
                            .unwrap();
                        self.push(TokenKind::Punct(text), line, col);
                    } else {
                        // Check '.' followed by another '.' right after a digit run: the
                        // one case we reserve the "bare decimal point" diagnostic for —
                        // a genuine member access never immediately repeats the dot.
                        return Err(lex_error(format!("unexpected character '{c}'"), line, col));
                    }
                }
            }
        }

        if let Some(frame) = self.brackets.last() {
            return Err(lex_error(
                format!("unclosed bracket '{}'", frame.ch),
                frame.line,
                frame.col,
            ));
        }

        let needs_newline = !matches!(self.tokens.last().map(|t| &t.kind), Some(TokenKind::Newline));
        if needs_newline {
            self.push(TokenKind::Newline, self.line, self.col);
        }
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.push(TokenKind::Dedent, self.line, self.col);
        }
        self.push(TokenKind::Eof, self.line, self.col);

        Ok(self.tokens)
    }
}

const SINGLE_CHAR_PUNCT_TEXT: &[(char, &str)] = &[
    ('(', "("),
    (')', ")"),
    (':', ":"),
    (',', ","),
    ('[', "["),
    (']', "]"),
    ('{', "{"),
    ('}', "}"),
    ('+', "+"),
    ('-', "-"),
    ('*', "*"),
    ('/', "/"),
    ('%', "%"),
    ('=', "="),
    ('<', "<"),
    ('>', ">"),
    ('.', "."),
    ('|', "|"),
    ('?', "?"),
];

/// Tabs are rejected anywhere in the source, before any other lexing is
/// attempted (spec §4.1).
fn reject_tabs(source: &str) -> Result<(), Diagnostic> {
    let mut line = 1usize;
    let mut col = 1usize;
    for c in source.chars() {
        if c == '\t' {
            return Err(lex_error("tabs forbidden, use spaces", line, col));
        }
        if c == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    Ok(())
}

/// Tokenizes UTF-8 source into a token stream ending with `EOF` (spec §4.1).
pub fn tokenize(source: &str) -> Result<Vec<Token>, Diagnostic> {
    let normalized = normalize(source);
    reject_tabs(&normalized)?;
    Lexer::new(&normalized).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn empty_source_is_newline_then_eof() {
        assert_eq!(kinds(""), vec![TokenKind::Newline, TokenKind::Eof]);
    }

    #[test]
    fn simple_statement() {
        let got = kinds("let x = 1\n");
        assert_eq!(
            got,
            vec![
                TokenKind::Keyword(Keyword::Let),
                TokenKind::Ident("x".to_string()),
                TokenKind::Punct("="),
                TokenKind::Int(1),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn indent_and_dedent() {
        let got = kinds("if true:\n  let x = 1\nlet y = 2\n");
        assert!(got.contains(&TokenKind::Indent));
        assert!(got.contains(&TokenKind::Dedent));
    }

    #[test]
    fn blank_and_comment_lines_do_not_affect_indentation() {
        let got = kinds("if true:\n  let x = 1\n\n  # a comment\n  let y = 2\nlet z = 3\n");
        let indents = got.iter().filter(|k| **k == TokenKind::Indent).count();
        let dedents = got.iter().filter(|k| **k == TokenKind::Dedent).count();
        assert_eq!(indents, 1);
        assert_eq!(dedents, 1);
    }

    #[test]
    fn bracket_continuation_suppresses_newline() {
        let got = kinds("let xs = [1,\n2,\n3]\n");
        let newlines = got.iter().filter(|k| **k == TokenKind::Newline).count();
        assert_eq!(newlines, 1);
    }

    #[test]
    fn tabs_are_rejected() {
        let err = tokenize("let x = 1\n\tlet y = 2\n").unwrap_err();
        assert!(err.message.contains("tabs forbidden"));
    }

    #[test]
    fn two_char_operators_before_single_char() {
        let got = kinds("function f() -> int:\n  return 1\n");
        assert!(got.contains(&TokenKind::Punct("->")));
    }

    #[test]
    fn unterminated_string_fails() {
        assert!(tokenize("let x = \"abc\n").is_err());
    }

    #[test]
    fn unknown_escape_fails() {
        assert!(tokenize("let x = \"a\\qb\"\n").is_err());
    }

    #[test]
    fn mismatched_bracket_fails() {
        assert!(tokenize("let x = (1, 2]\n").is_err());
    }

    #[test]
    fn unclosed_bracket_fails_at_eof() {
        assert!(tokenize("let x = (1, 2\n").is_err());
    }

    #[test]
    fn float_requires_digit_after_dot() {
        let got = kinds("let x = 3.\n");
        // '.' is not consumed into the number; it is re-lexed as punctuation.
        assert!(got.contains(&TokenKind::Int(3)));
        assert!(got.contains(&TokenKind::Punct(".")));
    }

    #[test]
    fn unicode_identifier() {
        let got = kinds("let имя = 1\n");
        assert!(got.contains(&TokenKind::Ident("имя".to_string())));
    }
}
