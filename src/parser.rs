//! src/parser.rs
//!
//! Recursive-descent parser with precedence climbing. Consumes the token
//! sequence produced by the lexer and builds the AST. The first error aborts
//! parsing; `synchronize` is available for callers that want to resume at the
//! next statement boundary, but `parse` itself does not use it.

use crate::ast::{BinaryOp, Expr, Function, Parameter, Program, Stmt, Type, UnaryOp};
use crate::error::ParseError;
use crate::lexer::{Token, TokenType};

/// Stand-in for token slices that arrive without their trailing `Eof`.
static EOF_TOKEN: Token = Token {
    token_type: TokenType::Eof,
    line: 0,
    column: 0,
    length: 0,
};

pub struct Parser<'a> {
    tokens: &'a [Token],
    position: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Parser {
            tokens,
            position: 0,
        }
    }

    /// Parses the whole token stream into a `Program`.
    pub fn parse(&mut self) -> Result<Program, ParseError> {
        let mut functions = Vec::new();
        self.skip_newlines();
        while !self.is_at_end() {
            functions.push(self.parse_function()?);
            self.skip_newlines();
        }
        Ok(Program { functions })
    }

    /// Discards tokens until just past a statement terminator (`;` or a
    /// newline) or end of input. Recovery machinery for multi-error parsing;
    /// not wired into `parse`.
    pub fn synchronize(&mut self) {
        while !self.is_at_end() {
            match self.peek().token_type {
                TokenType::Semicolon | TokenType::Newline => {
                    self.advance();
                    break;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    // --- Token stream helpers ---

    fn peek(&self) -> &Token {
        // The lexer guarantees a trailing Eof token, so clamp to it.
        self.tokens
            .get(self.position)
            .or_else(|| self.tokens.last())
            .unwrap_or(&EOF_TOKEN)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().token_type, TokenType::Eof)
    }

    fn advance(&mut self) -> &Token {
        let token = self
            .tokens
            .get(self.position)
            .or_else(|| self.tokens.last())
            .unwrap_or(&EOF_TOKEN);
        if self.position < self.tokens.len() {
            self.position += 1;
        }
        token
    }

    fn check(&self, token_type: &TokenType) -> bool {
        &self.peek().token_type == token_type
    }

    fn matches(&mut self, token_type: &TokenType) -> bool {
        if self.check(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        let token = self.peek();
        ParseError::new(message, token.line, token.column)
    }

    fn expect(&mut self, token_type: TokenType, what: &str) -> Result<&Token, ParseError> {
        if self.check(&token_type) {
            Ok(self.advance())
        } else {
            Err(self.error_here(format!(
                "expected {}, found {:?}",
                what,
                self.peek().token_type
            )))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Result<String, ParseError> {
        if let TokenType::Identifier(name) = &self.peek().token_type {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.error_here(format!(
                "expected {}, found {:?}",
                what,
                self.peek().token_type
            )))
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(&TokenType::Newline) {
            self.advance();
        }
    }

    fn peek_type_keyword(&self) -> Option<Type> {
        match self.peek().token_type {
            TokenType::KeywordInt => Some(Type::Int),
            TokenType::KeywordVoid => Some(Type::Void),
            TokenType::KeywordString => Some(Type::String),
            _ => None,
        }
    }

    fn parse_type(&mut self) -> Result<Type, ParseError> {
        match self.peek_type_keyword() {
            Some(ty) => {
                self.advance();
                Ok(ty)
            }
            None => Err(self.error_here(format!(
                "expected a type ('int', 'void' or 'string'), found {:?}",
                self.peek().token_type
            ))),
        }
    }

    /// A statement ends with `;`, a newline, or the end of its block.
    fn expect_terminator(&mut self) -> Result<(), ParseError> {
        if self.matches(&TokenType::Semicolon) {
            return Ok(());
        }
        if self.matches(&TokenType::Newline) {
            return Ok(());
        }
        match self.peek().token_type {
            TokenType::CloseBrace | TokenType::Dedent | TokenType::Eof => Ok(()),
            _ => Err(self.error_here(format!(
                "expected ';' after statement, found {:?}",
                self.peek().token_type
            ))),
        }
    }

    // --- Declarations ---

    fn parse_function(&mut self) -> Result<Function, ParseError> {
        let return_type = self.parse_type()?;
        let name = self.expect_identifier("function name")?;
        self.expect(TokenType::OpenParen, "'(' after function name")?;
        let parameters = self.parse_parameters()?;
        self.expect(TokenType::CloseParen, "')' after parameters")?;
        let body = self.parse_block()?;
        Ok(Function {
            name,
            return_type,
            parameters,
            body,
        })
    }

    fn parse_parameters(&mut self) -> Result<Vec<Parameter>, ParseError> {
        let mut params = Vec::new();
        if self.check(&TokenType::CloseParen) {
            return Ok(params);
        }
        loop {
            let ty = self.parse_type()?;
            let name = self.expect_identifier("parameter name")?;
            params.push(Parameter { ty, name });
            if !self.matches(&TokenType::Comma) {
                break;
            }
        }
        Ok(params)
    }

    /// A block is `{ ... }`, or `Indent ... Dedent` in indentation-mode token
    /// streams. An optional `:` may precede either form. Newlines around the
    /// boundaries are skipped.
    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.matches(&TokenType::Colon);
        self.skip_newlines();
        if self.matches(&TokenType::OpenBrace) {
            let mut statements = Vec::new();
            self.skip_newlines();
            while !self.check(&TokenType::CloseBrace) && !self.is_at_end() {
                statements.push(self.parse_statement()?);
                self.skip_newlines();
            }
            self.expect(TokenType::CloseBrace, "'}' to close block")?;
            return Ok(statements);
        }
        if self.matches(&TokenType::Indent) {
            let mut statements = Vec::new();
            self.skip_newlines();
            while !self.check(&TokenType::Dedent) && !self.is_at_end() {
                statements.push(self.parse_statement()?);
                self.skip_newlines();
            }
            self.expect(TokenType::Dedent, "end of indented block")?;
            return Ok(statements);
        }
        Err(self.error_here(format!(
            "expected '{{' or an indented block, found {:?}",
            self.peek().token_type
        )))
    }

    // --- Statements ---

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        if self.peek_type_keyword().is_some() {
            return self.parse_var_decl_statement();
        }
        match self.peek().token_type {
            TokenType::KeywordIf => self.parse_if_statement(),
            TokenType::KeywordWhile => self.parse_while_statement(),
            TokenType::KeywordReturn => self.parse_return_statement(),
            TokenType::Identifier(_) => self.parse_assign_statement(),
            _ => Err(self.error_here(format!(
                "expected statement, found {:?}",
                self.peek().token_type
            ))),
        }
    }

    fn parse_var_decl_statement(&mut self) -> Result<Stmt, ParseError> {
        let ty = self.parse_type()?;
        let name = self.expect_identifier("variable name")?;
        let init = if self.matches(&TokenType::Assign) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.expect_terminator()?;
        Ok(Stmt::VarDecl { ty, name, init })
    }

    fn parse_assign_statement(&mut self) -> Result<Stmt, ParseError> {
        let name = self.expect_identifier("identifier")?;
        self.expect(TokenType::Assign, "'=' in assignment")?;
        let value = self.parse_expression()?;
        self.expect_terminator()?;
        Ok(Stmt::Assign { name, value })
    }

    fn parse_return_statement(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenType::KeywordReturn, "'return'")?;
        let value = match self.peek().token_type {
            TokenType::Semicolon
            | TokenType::Newline
            | TokenType::CloseBrace
            | TokenType::Dedent
            | TokenType::Eof => None,
            _ => Some(self.parse_expression()?),
        };
        self.expect_terminator()?;
        Ok(Stmt::Return(value))
    }

    /// Conditions accept optional surrounding parentheses; if `(` is present
    /// the matching `)` is required.
    fn parse_condition(&mut self) -> Result<Expr, ParseError> {
        if self.matches(&TokenType::OpenParen) {
            let condition = self.parse_expression()?;
            self.expect(TokenType::CloseParen, "')' after condition")?;
            Ok(condition)
        } else {
            self.parse_expression()
        }
    }

    fn parse_if_statement(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenType::KeywordIf, "'if'")?;
        let condition = self.parse_condition()?;
        let then_branch = self.parse_block()?;
        self.skip_newlines();
        let else_branch = if self.matches(&TokenType::KeywordElse) {
            self.parse_block()?
        } else {
            Vec::new()
        };
        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_while_statement(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenType::KeywordWhile, "'while'")?;
        let condition = self.parse_condition()?;
        let body = self.parse_block()?;
        Ok(Stmt::While { condition, body })
    }

    // --- Expressions (precedence climbing, low to high) ---

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_comparison()
    }

    fn comparison_op(&self) -> Option<BinaryOp> {
        match self.peek().token_type {
            TokenType::Equal => Some(BinaryOp::Equal),
            TokenType::NotEqual => Some(BinaryOp::NotEqual),
            TokenType::Less => Some(BinaryOp::LessThan),
            TokenType::LessEq => Some(BinaryOp::LessOrEqual),
            TokenType::Greater => Some(BinaryOp::GreaterThan),
            TokenType::GreaterEq => Some(BinaryOp::GreaterOrEqual),
            _ => None,
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_term()?;
        while let Some(op) = self.comparison_op() {
            self.advance();
            let right = self.parse_term()?;
            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_factor()?;
        loop {
            let op = match self.peek().token_type {
                TokenType::Plus => BinaryOp::Add,
                TokenType::Minus => BinaryOp::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn parse_factor(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = match self.peek().token_type {
                TokenType::Star => BinaryOp::Multiply,
                TokenType::Slash => BinaryOp::Divide,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek().token_type {
            TokenType::Minus => Some(UnaryOp::Negate),
            TokenType::Bang => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match &self.peek().token_type {
            TokenType::IntLiteral(value) => {
                let value = *value;
                self.advance();
                Ok(Expr::IntLiteral(value))
            }
            TokenType::StringLiteral(value) => {
                let value = value.clone();
                self.advance();
                Ok(Expr::StringLiteral(value))
            }
            TokenType::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(Expr::Identifier(name))
            }
            TokenType::OpenParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenType::CloseParen, "')' after expression")?;
                Ok(expr)
            }
            other => Err(self.error_here(format!("expected expression, found {:?}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{LexMode, Lexer};

    fn parse_source(source: &str) -> Result<Program, ParseError> {
        let tokens = Lexer::new(source).tokenize().expect("lexing should succeed");
        Parser::new(&tokens).parse()
    }

    fn parse_expr(source: &str) -> Expr {
        let tokens = Lexer::new(source).tokenize().expect("lexing should succeed");
        Parser::new(&tokens)
            .parse_expression()
            .expect("expression should parse")
    }

    #[test]
    fn parses_a_full_function() {
        let program = parse_source(
            "int main() {\n  int x = 5;\n  x = x + 1;\n  if (x > 0) { return x; } else { return 0; }\n}\n",
        )
        .expect("program should parse");
        assert_eq!(program.functions.len(), 1);
        let main = &program.functions[0];
        assert_eq!(main.name, "main");
        assert_eq!(main.return_type, Type::Int);
        assert!(main.parameters.is_empty());
        assert_eq!(main.body.len(), 3);
        assert!(matches!(main.body[2], Stmt::If { .. }));
    }

    #[test]
    fn parses_parameters() {
        let program = parse_source("int add(int a, int b) { return a + b; }").unwrap();
        let add = &program.functions[0];
        assert_eq!(
            add.parameters,
            vec![
                Parameter {
                    ty: Type::Int,
                    name: "a".to_string()
                },
                Parameter {
                    ty: Type::Int,
                    name: "b".to_string()
                },
            ]
        );
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = parse_expr("1 + 2 * 3");
        match expr {
            Expr::Binary {
                op: BinaryOp::Add,
                left,
                right,
            } => {
                assert_eq!(*left, Expr::IntLiteral(1));
                assert!(matches!(
                    *right,
                    Expr::Binary {
                        op: BinaryOp::Multiply,
                        ..
                    }
                ));
            }
            other => panic!("expected addition at the root, got {:?}", other),
        }
    }

    #[test]
    fn binary_operators_are_left_associative() {
        let expr = parse_expr("10 - 4 - 3");
        match expr {
            Expr::Binary {
                op: BinaryOp::Subtract,
                left,
                right,
            } => {
                assert!(matches!(
                    *left,
                    Expr::Binary {
                        op: BinaryOp::Subtract,
                        ..
                    }
                ));
                assert_eq!(*right, Expr::IntLiteral(3));
            }
            other => panic!("expected subtraction at the root, got {:?}", other),
        }
    }

    #[test]
    fn comparison_sits_below_term() {
        let expr = parse_expr("a + 1 < b * 2");
        assert!(matches!(
            expr,
            Expr::Binary {
                op: BinaryOp::LessThan,
                ..
            }
        ));
    }

    #[test]
    fn unary_binds_tighter_than_binary() {
        let expr = parse_expr("-a + !b");
        match expr {
            Expr::Binary {
                op: BinaryOp::Add,
                left,
                right,
            } => {
                assert!(matches!(
                    *left,
                    Expr::Unary {
                        op: UnaryOp::Negate,
                        ..
                    }
                ));
                assert!(matches!(
                    *right,
                    Expr::Unary {
                        op: UnaryOp::Not,
                        ..
                    }
                ));
            }
            other => panic!("expected addition at the root, got {:?}", other),
        }
    }

    #[test]
    fn parenthesized_expressions_override_precedence() {
        let expr = parse_expr("(1 + 2) * 3");
        assert!(matches!(
            expr,
            Expr::Binary {
                op: BinaryOp::Multiply,
                ..
            }
        ));
    }

    #[test]
    fn condition_parens_are_optional() {
        let with = parse_source("int f() { while (x < 1) { x = 1; } }").unwrap();
        let without = parse_source("int f() { while x < 1 { x = 1; } }").unwrap();
        assert_eq!(with, without);
    }

    #[test]
    fn if_without_else_gets_empty_else_branch() {
        let program = parse_source("int f() { if x { return 1; } return 0; }").unwrap();
        match &program.functions[0].body[0] {
            Stmt::If { else_branch, .. } => assert!(else_branch.is_empty()),
            other => panic!("expected if statement, got {:?}", other),
        }
    }

    #[test]
    fn bare_return_has_no_value() {
        let program = parse_source("void f() { return; }").unwrap();
        assert_eq!(program.functions[0].body[0], Stmt::Return(None));
    }

    #[test]
    fn missing_semicolon_is_an_error() {
        let err = parse_source("int f() { int x = 1 int y = 2; }").unwrap_err();
        assert!(err.message.contains("expected ';'"));
    }

    #[test]
    fn unrecognized_statement_start_is_an_error() {
        let err = parse_source("int f() { + 1; }").unwrap_err();
        assert!(err.message.contains("expected statement"));
    }

    #[test]
    fn error_carries_position() {
        let err = parse_source("int f( {}").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.column > 1);
    }

    #[test]
    fn valid_token_sequences_never_fail_to_reparse() {
        let source = "int main() { int x = 2; while x > 0 { x = x - 1; } return x; }";
        let tokens = Lexer::new(source).tokenize().unwrap();
        assert!(Parser::new(&tokens).parse().is_ok());
        // Determinism: same tokens, same tree.
        let a = Parser::new(&tokens).parse().unwrap();
        let b = Parser::new(&tokens).parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn parses_indentation_mode_stream() {
        let source = "int main():\n    int x = 1\n    if x > 0:\n        return x\n    return 0\n";
        let tokens = Lexer::with_mode(source, LexMode::Indentation)
            .tokenize()
            .expect("lexing should succeed");
        let program = Parser::new(&tokens).parse().expect("program should parse");
        let main = &program.functions[0];
        assert_eq!(main.body.len(), 3);
        assert!(matches!(main.body[1], Stmt::If { .. }));
    }

    #[test]
    fn parses_indentation_mode_stream_with_comment_lines() {
        let source =
            "int main():\n    int x = 1\n        // deeper than the code\n    return x\n";
        let tokens = Lexer::with_mode(source, LexMode::Indentation)
            .tokenize()
            .expect("lexing should succeed");
        let program = Parser::new(&tokens).parse().expect("program should parse");
        assert_eq!(program.functions[0].body.len(), 2);
    }

    #[test]
    fn empty_token_slice_parses_to_an_empty_program() {
        let program = Parser::new(&[]).parse().expect("no tokens, no functions");
        assert!(program.functions.is_empty());
    }

    #[test]
    fn synchronize_skips_to_next_statement() {
        let tokens = Lexer::new("garbage tokens ; int x").tokenize().unwrap();
        let mut parser = Parser::new(&tokens);
        assert!(parser.parse_statement().is_err());
        parser.synchronize();
        assert_eq!(parser.peek().token_type, TokenType::KeywordInt);
    }
}
