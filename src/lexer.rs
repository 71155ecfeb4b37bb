//! src/lexer.rs
//!
//! Converts raw source characters into a flat token sequence. Two modes are
//! supported: the default brace-based grammar, where a line feed simply
//! becomes a `Newline` token, and an indentation-sensitive grammar, where
//! leading whitespace is measured against a stack of indent widths and
//! `Indent`/`Dedent` tokens delimit blocks.

use crate::error::LexError;

#[derive(Debug, PartialEq, Clone)]
pub enum TokenType {
    // Keywords
    KeywordInt,
    KeywordVoid,
    KeywordString,
    KeywordIf,
    KeywordElse,
    KeywordWhile,
    KeywordReturn,

    Identifier(String),
    IntLiteral(i32),
    StringLiteral(String),

    // Operators
    Plus,      // +
    Minus,     // -
    Star,      // *
    Slash,     // /
    Assign,    // =
    Equal,     // ==
    NotEqual,  // !=
    Less,      // <
    LessEq,    // <=
    Greater,   // >
    GreaterEq, // >=
    Bang,      // !

    // Punctuation
    OpenParen,  // (
    CloseParen, // )
    OpenBrace,  // {
    CloseBrace, // }
    Semicolon,  // ;
    Comma,      // ,
    Colon,      // :

    // Structural
    Newline,
    Indent,
    Dedent,

    Eof,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Token {
    pub token_type: TokenType,
    pub line: usize,
    pub column: usize,
    pub length: usize,
}

/// How line structure is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexMode {
    /// Blocks are `{ ... }`; line feeds become plain `Newline` tokens.
    Braces,
    /// Blocks are delimited by indentation; line feeds trigger indent
    /// measurement and may produce `Indent`/`Dedent` tokens.
    Indentation,
}

/// Tabs count for this many spaces when measuring indentation.
const TAB_WIDTH: usize = 4;

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    mode: LexMode,
    /// Stack of indentation widths; strictly increasing bottom to top.
    indent_levels: Vec<usize>,
    /// Dedents not yet handed out (one per popped level).
    pending_dedents: usize,
    /// True at the start of input and right after a line feed, in
    /// indentation mode only.
    at_line_start: bool,
    emitted_eof: bool,
}

impl Lexer {
    /// Creates a lexer for the brace-based grammar.
    pub fn new(source: &str) -> Self {
        Self::with_mode(source, LexMode::Braces)
    }

    pub fn with_mode(source: &str, mode: LexMode) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            mode,
            indent_levels: vec![0],
            pending_dedents: 0,
            // Line 1 is measured like every other line in indentation mode.
            at_line_start: mode == LexMode::Indentation,
            emitted_eof: false,
        }
    }

    /// Tokenizes the whole input. The result always ends with exactly one
    /// `Eof` token; on malformed input no partial sequence is returned.
    pub fn tokenize(self) -> Result<Vec<Token>, LexError> {
        self.collect()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn make_token(&self, token_type: TokenType, line: usize, column: usize, length: usize) -> Token {
        Token {
            token_type,
            line,
            column,
            length,
        }
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError::new(message, self.line, self.column)
    }

    /// Skips spaces, tabs and carriage returns, plus both comment forms.
    /// Line feeds are left alone; they are structural.
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') => {
                    self.advance();
                }
                Some('/') if self.peek_next() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_next() == Some('*') => {
                    self.advance();
                    self.advance();
                    // No nesting. An unterminated block comment silently
                    // consumes to end of input.
                    loop {
                        match self.peek() {
                            None => break,
                            Some('*') if self.peek_next() == Some('/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            _ => {
                                self.advance();
                            }
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_identifier(&mut self) -> Token {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let length = text.len();
        let token_type = match text.as_str() {
            "int" => TokenType::KeywordInt,
            "void" => TokenType::KeywordVoid,
            "string" => TokenType::KeywordString,
            "if" => TokenType::KeywordIf,
            "else" => TokenType::KeywordElse,
            "while" => TokenType::KeywordWhile,
            "return" => TokenType::KeywordReturn,
            _ => TokenType::Identifier(text),
        };
        self.make_token(token_type, line, column, length)
    }

    fn scan_number(&mut self) -> Result<Token, LexError> {
        let (line, column) = (self.line, self.column);
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                digits.push(c);
                self.advance();
            } else {
                break;
            }
        }

        // A digit run flowing directly into an identifier is not two tokens.
        if let Some(c) = self.peek() {
            if c.is_ascii_alphabetic() || c == '_' {
                let mut bad = digits;
                while let Some(c) = self.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        bad.push(c);
                        self.advance();
                    } else {
                        break;
                    }
                }
                return Err(LexError::new(
                    format!("invalid numeric literal '{}'", bad),
                    line,
                    column,
                ));
            }
        }

        let value: i32 = digits
            .parse()
            .map_err(|_| LexError::new(format!("invalid numeric literal '{}'", digits), line, column))?;
        Ok(self.make_token(TokenType::IntLiteral(value), line, column, digits.len()))
    }

    fn scan_string(&mut self) -> Result<Token, LexError> {
        // Errors report the opening quote's position.
        let (line, column) = (self.line, self.column);
        self.advance(); // opening quote
        let mut value = String::new();
        let mut raw_len = 2; // both quotes
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(LexError::new("unterminated string literal", line, column));
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    raw_len += 2;
                    let escaped = match self.peek() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('b') => '\u{8}',
                        Some('"') => '"',
                        Some('\\') => '\\',
                        Some(c) => {
                            return Err(LexError::new(
                                format!("unknown escape sequence '\\{}'", c),
                                line,
                                column,
                            ));
                        }
                        None => {
                            return Err(LexError::new("unterminated string literal", line, column));
                        }
                    };
                    value.push(escaped);
                    self.advance();
                }
                Some(c) => {
                    value.push(c);
                    raw_len += 1;
                    self.advance();
                }
            }
        }
        Ok(self.make_token(TokenType::StringLiteral(value), line, column, raw_len))
    }

    /// Measures the indentation of the line starting at the current position.
    /// Blank lines and comment-only lines collapse without structural tokens;
    /// measuring continues on the next line. Returns `None` when the rest of
    /// the input holds no code.
    fn measure_indentation(&mut self) -> Result<Option<usize>, LexError> {
        loop {
            let mut width = 0;
            let mut seen_space = false;
            let mut seen_tab = false;
            loop {
                match self.peek() {
                    Some(' ') => {
                        seen_space = true;
                        width += 1;
                        self.advance();
                    }
                    Some('\t') => {
                        seen_tab = true;
                        width += TAB_WIDTH;
                        self.advance();
                    }
                    Some('\r') => {
                        self.advance();
                    }
                    _ => break,
                }
                if seen_space && seen_tab {
                    return Err(self.error("mixed tabs and spaces in indentation"));
                }
            }
            // A line holding only a comment collapses like a blank line.
            if self.peek() == Some('/') && self.peek_next() == Some('/') {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else if self.peek() == Some('/') && self.peek_next() == Some('*') {
                self.advance();
                self.advance();
                loop {
                    match self.peek() {
                        None => break,
                        Some('*') if self.peek_next() == Some('/') => {
                            self.advance();
                            self.advance();
                            break;
                        }
                        _ => {
                            self.advance();
                        }
                    }
                }
                // Code after the closing marker still belongs to this line.
                if !matches!(self.peek(), Some('\n') | None) {
                    return Ok(Some(width));
                }
            }
            match self.peek() {
                // Blank line: no structural tokens, keep measuring.
                Some('\n') => {
                    self.advance();
                }
                None => return Ok(None),
                _ => return Ok(Some(width)),
            }
        }
    }

    /// Compares a fresh line's indentation against the stack, queuing one
    /// dedent per popped level.
    fn apply_indentation(&mut self, width: usize) -> Result<Option<Token>, LexError> {
        let current = *self.indent_levels.last().unwrap_or(&0);
        if width > current {
            self.indent_levels.push(width);
            return Ok(Some(self.make_token(TokenType::Indent, self.line, self.column, 0)));
        }
        if width < current {
            while let Some(&top) = self.indent_levels.last() {
                if top > width {
                    self.indent_levels.pop();
                    self.pending_dedents += 1;
                } else {
                    break;
                }
            }
            if self.indent_levels.last() != Some(&width) {
                return Err(self.error("invalid dedent"));
            }
            self.pending_dedents -= 1;
            return Ok(Some(self.make_token(TokenType::Dedent, self.line, self.column, 0)));
        }
        Ok(None)
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        // Queued dedents are returned one per call.
        if self.pending_dedents > 0 {
            self.pending_dedents -= 1;
            return Ok(self.make_token(TokenType::Dedent, self.line, self.column, 0));
        }

        if self.at_line_start {
            self.at_line_start = false;
            match self.measure_indentation()? {
                Some(width) => {
                    if let Some(token) = self.apply_indentation(width)? {
                        return Ok(token);
                    }
                }
                None => {} // ran off the end; fall through to Eof handling
            }
        }

        self.skip_whitespace_and_comments();

        let (line, column) = (self.line, self.column);
        let c = match self.peek() {
            Some(c) => c,
            None => {
                // Close any still-open indentation levels before Eof.
                if self.indent_levels.len() > 1 {
                    self.indent_levels.pop();
                    return Ok(self.make_token(TokenType::Dedent, line, column, 0));
                }
                return Ok(self.make_token(TokenType::Eof, line, column, 0));
            }
        };

        if c == '\n' {
            self.advance();
            if self.mode == LexMode::Indentation {
                self.at_line_start = true;
            }
            return Ok(self.make_token(TokenType::Newline, line, column, 1));
        }

        if c.is_ascii_alphabetic() || c == '_' {
            return Ok(self.scan_identifier());
        }
        if c.is_ascii_digit() {
            return self.scan_number();
        }
        if c == '"' {
            return self.scan_string();
        }

        // Two-character operators are greedily preferred over their
        // one-character prefix.
        let two = self.peek_next().map(|n| (c, n));
        let token_type = match two {
            Some(('=', '=')) => Some(TokenType::Equal),
            Some(('!', '=')) => Some(TokenType::NotEqual),
            Some(('<', '=')) => Some(TokenType::LessEq),
            Some(('>', '=')) => Some(TokenType::GreaterEq),
            _ => None,
        };
        if let Some(token_type) = token_type {
            self.advance();
            self.advance();
            return Ok(self.make_token(token_type, line, column, 2));
        }

        let token_type = match c {
            '+' => TokenType::Plus,
            '-' => TokenType::Minus,
            '*' => TokenType::Star,
            '/' => TokenType::Slash,
            '=' => TokenType::Assign,
            '<' => TokenType::Less,
            '>' => TokenType::Greater,
            '!' => TokenType::Bang,
            '(' => TokenType::OpenParen,
            ')' => TokenType::CloseParen,
            '{' => TokenType::OpenBrace,
            '}' => TokenType::CloseBrace,
            ';' => TokenType::Semicolon,
            ',' => TokenType::Comma,
            ':' => TokenType::Colon,
            _ => {
                return Err(LexError::new(
                    format!("unexpected character '{}'", c),
                    line,
                    column,
                ));
            }
        };
        self.advance();
        Ok(self.make_token(token_type, line, column, 1))
    }
}

impl Iterator for Lexer {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.emitted_eof {
            return None;
        }
        let result = self.next_token();
        if let Ok(token) = &result {
            if token.token_type == TokenType::Eof {
                self.emitted_eof = true;
            }
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        Lexer::new(source).tokenize().expect("lexing should succeed")
    }

    fn lex_indented(source: &str) -> Vec<Token> {
        Lexer::with_mode(source, LexMode::Indentation)
            .tokenize()
            .expect("lexing should succeed")
    }

    fn kinds(tokens: &[Token]) -> Vec<&TokenType> {
        tokens.iter().map(|t| &t.token_type).collect()
    }

    #[test]
    fn ends_with_exactly_one_eof() {
        let tokens = lex("int main() { return 0; }");
        let eofs = tokens
            .iter()
            .filter(|t| t.token_type == TokenType::Eof)
            .count();
        assert_eq!(eofs, 1);
        assert_eq!(tokens.last().unwrap().token_type, TokenType::Eof);
    }

    #[test]
    fn lexing_is_deterministic() {
        let source = "int main() {\n  int x = 5;\n  return x;\n}\n";
        assert_eq!(lex(source), lex(source));
    }

    #[test]
    fn keywords_and_identifiers() {
        let tokens = lex("int void string if else while return foo _bar");
        assert_eq!(
            kinds(&tokens),
            vec![
                &TokenType::KeywordInt,
                &TokenType::KeywordVoid,
                &TokenType::KeywordString,
                &TokenType::KeywordIf,
                &TokenType::KeywordElse,
                &TokenType::KeywordWhile,
                &TokenType::KeywordReturn,
                &TokenType::Identifier("foo".to_string()),
                &TokenType::Identifier("_bar".to_string()),
                &TokenType::Eof,
            ]
        );
    }

    #[test]
    fn two_char_operators_beat_one_char_prefixes() {
        let tokens = lex("== = <= < >= > != !");
        assert_eq!(
            kinds(&tokens),
            vec![
                &TokenType::Equal,
                &TokenType::Assign,
                &TokenType::LessEq,
                &TokenType::Less,
                &TokenType::GreaterEq,
                &TokenType::Greater,
                &TokenType::NotEqual,
                &TokenType::Bang,
                &TokenType::Eof,
            ]
        );
    }

    #[test]
    fn tracks_line_and_column() {
        let tokens = lex("int\n  x");
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[0].column, 1);
        assert_eq!(tokens[0].length, 3);
        // tokens[1] is the Newline
        assert_eq!(tokens[2].token_type, TokenType::Identifier("x".to_string()));
        assert_eq!(tokens[2].line, 2);
        assert_eq!(tokens[2].column, 3);
    }

    #[test]
    fn comments_are_skipped() {
        let tokens = lex("int /* block\ncomment */ x // trailing\n;");
        assert_eq!(
            kinds(&tokens),
            vec![
                &TokenType::KeywordInt,
                &TokenType::Identifier("x".to_string()),
                &TokenType::Newline,
                &TokenType::Semicolon,
                &TokenType::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_block_comment_consumes_to_end() {
        let tokens = lex("int /* never closed");
        assert_eq!(kinds(&tokens), vec![&TokenType::KeywordInt, &TokenType::Eof]);
    }

    #[test]
    fn string_escapes() {
        let tokens = lex(r#""a\n\t\"b\\""#);
        assert_eq!(
            tokens[0].token_type,
            TokenType::StringLiteral("a\n\t\"b\\".to_string())
        );
    }

    #[test]
    fn unterminated_string_reports_opening_quote() {
        let err = Lexer::new("  \"unterminated").tokenize().unwrap_err();
        assert!(err.message.contains("unterminated"));
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 3);
    }

    #[test]
    fn unknown_escape_reports_opening_quote() {
        let err = Lexer::new("\"bad\\qescape\"").tokenize().unwrap_err();
        assert!(err.message.contains("escape"));
        assert_eq!(err.column, 1);
    }

    #[test]
    fn invalid_numeric_literal() {
        let err = Lexer::new("123abc").tokenize().unwrap_err();
        assert!(err.message.contains("invalid numeric literal '123abc'"));
    }

    #[test]
    fn numeric_overflow_is_an_error() {
        let err = Lexer::new("99999999999999999999").tokenize().unwrap_err();
        assert!(err.message.contains("invalid numeric literal"));
    }

    #[test]
    fn unexpected_character() {
        let err = Lexer::new("int @").tokenize().unwrap_err();
        assert!(err.message.contains("unexpected character '@'"));
        assert_eq!(err.column, 5);
    }

    #[test]
    fn indentation_produces_matching_indents_and_dedents() {
        let source = "int main():\n    int x\n    if x:\n        return\n    x = 1\n";
        let tokens = lex_indented(source);
        let indents = tokens
            .iter()
            .filter(|t| t.token_type == TokenType::Indent)
            .count();
        let dedents = tokens
            .iter()
            .filter(|t| t.token_type == TokenType::Dedent)
            .count();
        assert_eq!(indents, 2);
        assert_eq!(dedents, 2);
        assert_eq!(tokens.last().unwrap().token_type, TokenType::Eof);
    }

    #[test]
    fn indent_stack_is_strictly_increasing() {
        // Walk the structural tokens and replay the stack discipline.
        let source = "a:\n  b\n  c:\n      d\n  e\nf\n";
        let tokens = lex_indented(source);
        let mut depth = 0usize;
        for token in &tokens {
            match token.token_type {
                TokenType::Indent => depth += 1,
                TokenType::Dedent => {
                    assert!(depth > 0, "dedent below the initial level");
                    depth -= 1;
                }
                _ => {}
            }
        }
        assert_eq!(depth, 0, "all indents are closed by Eof");
    }

    #[test]
    fn blank_lines_collapse() {
        let source = "a\n\n\n    b\n";
        let tokens = lex_indented(source);
        let indents = tokens
            .iter()
            .filter(|t| t.token_type == TokenType::Indent)
            .count();
        assert_eq!(indents, 1);
    }

    #[test]
    fn comment_only_lines_collapse() {
        let source = "int main():\n    int x = 1\n        // note\n    return x\n";
        let tokens = lex_indented(source);
        let indents = tokens
            .iter()
            .filter(|t| t.token_type == TokenType::Indent)
            .count();
        let dedents = tokens
            .iter()
            .filter(|t| t.token_type == TokenType::Dedent)
            .count();
        assert_eq!(indents, 1);
        assert_eq!(dedents, 1);
    }

    #[test]
    fn block_comment_only_lines_collapse() {
        let source = "a:\n    b\n        /* spans\n           lines */\n    c\n";
        let tokens = lex_indented(source);
        let indents = tokens
            .iter()
            .filter(|t| t.token_type == TokenType::Indent)
            .count();
        assert_eq!(indents, 1);
    }

    #[test]
    fn first_line_indentation_is_structural() {
        let tokens = lex_indented("    a\n");
        assert_eq!(tokens[0].token_type, TokenType::Indent);
        assert!(tokens
            .iter()
            .any(|t| t.token_type == TokenType::Dedent));
        assert_eq!(tokens.last().unwrap().token_type, TokenType::Eof);
    }

    #[test]
    fn invalid_dedent_is_an_error() {
        let source = "a\n        b\n    c\n";
        let err = Lexer::with_mode(source, LexMode::Indentation)
            .tokenize()
            .unwrap_err();
        assert!(err.message.contains("invalid dedent"));
    }

    #[test]
    fn mixed_indentation_is_an_error() {
        let source = "a\n \tb\n";
        let err = Lexer::with_mode(source, LexMode::Indentation)
            .tokenize()
            .unwrap_err();
        assert!(err.message.contains("mixed tabs and spaces"));
    }

    #[test]
    fn tabs_count_as_four_spaces() {
        let source = "a\n\tb\n    c\n";
        let tokens = lex_indented(source);
        // The tab-indented and four-space-indented lines sit at the same
        // level, so exactly one indent/dedent pair is produced.
        let indents = tokens
            .iter()
            .filter(|t| t.token_type == TokenType::Indent)
            .count();
        let dedents = tokens
            .iter()
            .filter(|t| t.token_type == TokenType::Dedent)
            .count();
        assert_eq!(indents, 1);
        assert_eq!(dedents, 1);
    }
}
