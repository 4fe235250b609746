/*!
Recursive-descent parser for the Quill language.

Grammar (EBNF, condensed)
-------------------------

```text
program        → declaration* EOF ;
declaration    → classDecl | funDecl | varDecl | statement ;
classDecl      → "class" IDENT ( "<" IDENT )? "{" method* "}" ;
method         → "static"? IDENT "(" parameters? ")" block ;
funDecl        → "fun" IDENT "(" parameters? ")" block ;
varDecl        → "var" IDENT ( "=" assignment )? ";" ;
statement      → exprStmt | printStmt | ifStmt | whileStmt | forStmt
               | returnStmt | controlStmt | block ;
exprStmt       → expression ";" ;
printStmt      → "print" expression ";" ;
ifStmt         → "if" "(" expression ")" statement ( "else" statement )? ;
whileStmt      → "while" "(" expression ")" statement ;
forStmt        → "for" "(" ( varDecl | exprStmt | ";" )
                 expression? ";" expression? ")" statement ;
returnStmt     → "return" expression? ";" ;
controlStmt    → ( "break" | "continue" ) ";" ;
block          → "{" declaration* "}" ;
parameters     → IDENT ( "," IDENT )* ;

expression     → comma ;
comma          → assignment ( "," assignment )* ;
assignment     → ( call "." )? IDENT "=" assignment | ternary ;
ternary        → lambda ( "?" expression ":" ternary )? ;
lambda         → "fun" "(" parameters? ")" block | logic_or ;
logic_or       → logic_and ( "or" logic_and )* ;
logic_and      → equality ( "and" equality )* ;
equality       → comparison ( ( "!=" | "==" ) comparison )* ;
comparison     → term ( ( ">" | ">=" | "<" | "<=" ) term )* ;
term           → factor ( ( "-" | "+" ) factor )* ;
factor         → unary ( ( "/" | "*" ) unary )* ;
unary          → ( "!" | "-" ) unary | call ;
call           → primary ( "(" arguments? ")" | "." IDENT )* ;
arguments      → assignment ( "," assignment )* ;
primary        → NUMBER | STRING | "true" | "false" | "nil" | "this"
               | "super" "." IDENT | IDENT | "(" expression ")" ;
```

The comma operator lives at the `expression` level only; argument lists and
`var` initializers parse at the `assignment` level, so `f(a, b)` stays a
two-argument call.

Error handling: each failed production records a `QuillError::Parse` and
resynchronizes at the next statement boundary, so one pass reports as many
syntax errors as possible. Statements that failed to parse are dropped.

Every expression node receives a fresh [`ExprId`]; a REPL session keeps ids
unique across lines by seeding each parser with `with_id_offset`.
*/

use log::{debug, info};

use crate::ast::{Expr, ExprId, ExprKind, FunctionDecl, Lit, Stmt};
use crate::error::QuillError;
use crate::token::{Token, TokenType};

type ParseResult<T> = Result<T, QuillError>;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    next_id: usize,
    errors: Vec<QuillError>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self::with_id_offset(tokens, 0)
    }

    /// Seed the expression-id counter; REPL sessions use this to keep ids
    /// unique across lines that share one interpreter.
    pub fn with_id_offset(tokens: Vec<Token>, id_offset: usize) -> Self {
        info!("Parser created over {} token(s)", tokens.len());

        Parser {
            tokens,
            current: 0,
            next_id: id_offset,
            errors: Vec::new(),
        }
    }

    /// The id the next parsed expression would receive.
    pub fn next_id(&self) -> usize {
        self.next_id
    }

    /// Parse a whole program, collecting every syntax error.
    pub fn parse(&mut self) -> (Vec<Stmt>, Vec<QuillError>) {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        info!(
            "Parsed {} statement(s), {} error(s)",
            statements.len(),
            self.errors.len()
        );

        (statements, std::mem::take(&mut self.errors))
    }

    /// Parse the token stream as a single expression (REPL display mode).
    pub fn parse_expression(&mut self) -> ParseResult<Expr> {
        let expr = self.expression()?;

        if !self.is_at_end() {
            let token = self.peek().clone();
            return Err(QuillError::parse(
                token.line,
                format!("Unexpected '{}' after expression.", token.lexeme),
            ));
        }

        Ok(expr)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Declarations
    // ─────────────────────────────────────────────────────────────────────

    fn declaration(&mut self) -> Option<Stmt> {
        let result = if self.match_token(TokenType::CLASS) {
            self.class_declaration()
        } else if self.check(TokenType::FUN) && self.check_next(TokenType::IDENTIFIER) {
            self.advance(); // consume `fun`; `fun (` stays an expression
            self.function("function").map(Stmt::Function)
        } else if self.match_token(TokenType::VAR) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => Some(stmt),
            Err(e) => {
                debug!("Recording parse error and resynchronizing: {}", e);
                self.errors.push(e);
                self.synchronize();
                None
            }
        }
    }

    fn class_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self
            .consume(TokenType::IDENTIFIER, "Expected class name.")?
            .clone();

        let superclass = if self.match_token(TokenType::LESS) {
            let super_name = self
                .consume(TokenType::IDENTIFIER, "Expected superclass name.")?
                .clone();
            Some(self.make_expr(ExprKind::Variable { name: super_name }))
        } else {
            None
        };

        self.consume(TokenType::LEFT_BRACE, "Expected '{' before class body.")?;

        let mut methods = Vec::new();
        while !self.check(TokenType::RIGHT_BRACE) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }

        self.consume(TokenType::RIGHT_BRACE, "Expected '}' after class body.")?;

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
        })
    }

    fn function(&mut self, kind: &str) -> ParseResult<FunctionDecl> {
        let is_static = self.match_token(TokenType::STATIC);

        let name = self
            .consume(TokenType::IDENTIFIER, format!("Expected {} name.", kind))?
            .clone();

        self.consume(
            TokenType::LEFT_PAREN,
            format!("Expected '(' after {} name.", kind),
        )?;
        let params = self.parameters()?;

        self.consume(
            TokenType::LEFT_BRACE,
            format!("Expected '{{' before {} body.", kind),
        )?;
        let body = self.block_statements()?;

        Ok(FunctionDecl {
            name,
            params,
            body,
            is_static,
        })
    }

    /// Parameter list, closing parenthesis included.
    fn parameters(&mut self) -> ParseResult<Vec<Token>> {
        let mut params = Vec::new();

        if !self.check(TokenType::RIGHT_PAREN) {
            loop {
                let param = self
                    .consume(TokenType::IDENTIFIER, "Expected parameter name.")?
                    .clone();
                params.push(param);

                if !self.match_token(TokenType::COMMA) {
                    break;
                }
            }
        }

        self.consume(TokenType::RIGHT_PAREN, "Expected ')' after parameters.")?;

        Ok(params)
    }

    fn var_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self
            .consume(TokenType::IDENTIFIER, "Expected variable name.")?
            .clone();

        let initializer = if self.match_token(TokenType::EQUAL) {
            Some(self.assignment()?)
        } else {
            None
        };

        self.consume(
            TokenType::SEMICOLON,
            "Expected ';' after variable declaration.",
        )?;

        Ok(Stmt::Var { name, initializer })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────

    fn statement(&mut self) -> ParseResult<Stmt> {
        if self.match_token(TokenType::PRINT) {
            return self.print_statement();
        }
        if self.match_token(TokenType::IF) {
            return self.if_statement();
        }
        if self.match_token(TokenType::WHILE) {
            return self.while_statement();
        }
        if self.match_token(TokenType::FOR) {
            return self.for_statement();
        }
        if self.match_token(TokenType::RETURN) {
            return self.return_statement();
        }
        if self.match_token(TokenType::BREAK) || self.match_token(TokenType::CONTINUE) {
            return self.control_statement();
        }
        if self.match_token(TokenType::LEFT_BRACE) {
            return Ok(Stmt::Block(self.block_statements()?));
        }

        self.expression_statement()
    }

    fn print_statement(&mut self) -> ParseResult<Stmt> {
        let value = self.expression()?;
        self.consume(TokenType::SEMICOLON, "Expected ';' after value.")?;
        Ok(Stmt::Print(value))
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expected '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expected ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_token(TokenType::ELSE) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expected '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expected ')' after condition.")?;
        let body = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body })
    }

    fn for_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expected '(' after 'for'.")?;

        let initializer = if self.match_token(TokenType::SEMICOLON) {
            None
        } else if self.match_token(TokenType::VAR) {
            Some(Box::new(self.var_declaration()?))
        } else {
            Some(Box::new(self.expression_statement()?))
        };

        // a missing condition means "loop forever"
        let condition = if self.check(TokenType::SEMICOLON) {
            self.make_expr(ExprKind::Literal(Lit::True))
        } else {
            self.expression()?
        };
        self.consume(TokenType::SEMICOLON, "Expected ';' after loop condition.")?;

        let increment = if self.check(TokenType::RIGHT_PAREN) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::RIGHT_PAREN, "Expected ')' after for clauses.")?;

        let body = Box::new(self.statement()?);

        Ok(Stmt::For {
            initializer,
            condition,
            increment,
            body,
        })
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().clone();

        let value = if self.check(TokenType::SEMICOLON) {
            None
        } else {
            Some(self.expression()?)
        };

        self.consume(TokenType::SEMICOLON, "Expected ';' after return value.")?;

        Ok(Stmt::Return { keyword, value })
    }

    fn control_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().clone();
        self.consume(
            TokenType::SEMICOLON,
            "Expected ';' after loop control statement.",
        )?;
        Ok(Stmt::Control { keyword })
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;
        self.consume(TokenType::SEMICOLON, "Expected ';' after expression.")?;
        Ok(Stmt::Expression(expr))
    }

    /// Statements up to and including the closing brace.
    fn block_statements(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();

        while !self.check(TokenType::RIGHT_BRACE) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        self.consume(TokenType::RIGHT_BRACE, "Expected '}' after block.")?;

        Ok(statements)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────

    fn expression(&mut self) -> ParseResult<Expr> {
        self.comma()
    }

    fn comma(&mut self) -> ParseResult<Expr> {
        let mut expr = self.assignment()?;

        while self.match_token(TokenType::COMMA) {
            let operator = self.previous().clone();
            let right = self.assignment()?;
            expr = self.make_expr(ExprKind::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    fn assignment(&mut self) -> ParseResult<Expr> {
        let expr = self.ternary()?;

        if self.match_token(TokenType::EQUAL) {
            let equals = self.previous().clone();
            let value = self.assignment()?;

            return match expr.kind {
                ExprKind::Variable { name } => Ok(self.make_expr(ExprKind::Assign {
                    name,
                    value: Box::new(value),
                })),
                ExprKind::Get { object, name } => Ok(self.make_expr(ExprKind::Set {
                    object,
                    name,
                    value: Box::new(value),
                })),
                _ => Err(QuillError::parse(equals.line, "Invalid assignment target.")),
            };
        }

        Ok(expr)
    }

    fn ternary(&mut self) -> ParseResult<Expr> {
        let condition = self.lambda()?;

        if self.match_token(TokenType::QUESTION) {
            let question = self.previous().clone();
            let then_branch = self.expression()?;
            self.consume(TokenType::COLON, "Expected ':' in ternary operator.")?;
            let else_branch = self.ternary()?; // right-associative

            return Ok(self.make_expr(ExprKind::Ternary {
                condition: Box::new(condition),
                question,
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            }));
        }

        Ok(condition)
    }

    fn lambda(&mut self) -> ParseResult<Expr> {
        if self.match_token(TokenType::FUN) {
            self.consume(TokenType::LEFT_PAREN, "Expected '(' after 'fun'.")?;
            let params = self.parameters()?;
            self.consume(TokenType::LEFT_BRACE, "Expected '{' before function body.")?;
            let body = self.block_statements()?;

            return Ok(self.make_expr(ExprKind::Lambda { params, body }));
        }

        self.logic_or()
    }

    fn logic_or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.logic_and()?;

        while self.match_token(TokenType::OR) {
            let operator = self.previous().clone();
            let right = self.logic_and()?;
            expr = self.make_expr(ExprKind::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    fn logic_and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.equality()?;

        while self.match_token(TokenType::AND) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = self.make_expr(ExprKind::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        let mut expr = self.comparison()?;

        while self.match_any(&[TokenType::BANG_EQUAL, TokenType::EQUAL_EQUAL]) {
            let operator = self.previous().clone();
            let right = self.comparison()?;
            expr = self.make_expr(ExprKind::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let mut expr = self.term()?;

        while self.match_any(&[
            TokenType::GREATER,
            TokenType::GREATER_EQUAL,
            TokenType::LESS,
            TokenType::LESS_EQUAL,
        ]) {
            let operator = self.previous().clone();
            let right = self.term()?;
            expr = self.make_expr(ExprKind::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut expr = self.factor()?;

        while self.match_any(&[TokenType::MINUS, TokenType::PLUS]) {
            let operator = self.previous().clone();
            let right = self.factor()?;
            expr = self.make_expr(ExprKind::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let mut expr = self.unary()?;

        while self.match_any(&[TokenType::SLASH, TokenType::STAR]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            expr = self.make_expr(ExprKind::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if self.match_any(&[TokenType::BANG, TokenType::MINUS]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            return Ok(self.make_expr(ExprKind::Unary {
                operator,
                right: Box::new(right),
            }));
        }

        self.call()
    }

    fn call(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.match_token(TokenType::LEFT_PAREN) {
                expr = self.finish_call(expr)?;
            } else if self.match_token(TokenType::DOT) {
                let name = self
                    .consume(TokenType::IDENTIFIER, "Expected property name after '.'.")?
                    .clone();
                expr = self.make_expr(ExprKind::Get {
                    object: Box::new(expr),
                    name,
                });
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> ParseResult<Expr> {
        let mut arguments = Vec::new();

        if !self.check(TokenType::RIGHT_PAREN) {
            loop {
                arguments.push(self.assignment()?);
                if !self.match_token(TokenType::COMMA) {
                    break;
                }
            }
        }

        let paren = self
            .consume(TokenType::RIGHT_PAREN, "Expected ')' after arguments.")?
            .clone();

        Ok(self.make_expr(ExprKind::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        }))
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        if self.match_token(TokenType::FALSE) {
            return Ok(self.make_expr(ExprKind::Literal(Lit::False)));
        }
        if self.match_token(TokenType::TRUE) {
            return Ok(self.make_expr(ExprKind::Literal(Lit::True)));
        }
        if self.match_token(TokenType::NIL) {
            return Ok(self.make_expr(ExprKind::Literal(Lit::Nil)));
        }

        if self.match_token(TokenType::NUMBER(0.0)) {
            let n = match &self.previous().token_type {
                TokenType::NUMBER(n) => *n,
                _ => unreachable!("matched NUMBER"),
            };
            return Ok(self.make_expr(ExprKind::Literal(Lit::Number(n))));
        }

        if self.match_token(TokenType::STRING(String::new())) {
            let TokenType::STRING(s) = self.previous().token_type.clone() else {
                unreachable!("matched STRING");
            };
            return Ok(self.make_expr(ExprKind::Literal(Lit::Str(s))));
        }

        if self.match_token(TokenType::SUPER) {
            let keyword = self.previous().clone();
            self.consume(TokenType::DOT, "Expected '.' after 'super'.")?;
            let method = self
                .consume(TokenType::IDENTIFIER, "Expected superclass method name.")?
                .clone();
            return Ok(self.make_expr(ExprKind::Super { keyword, method }));
        }

        if self.match_token(TokenType::THIS) {
            let keyword = self.previous().clone();
            return Ok(self.make_expr(ExprKind::This { keyword }));
        }

        if self.match_token(TokenType::IDENTIFIER) {
            let name = self.previous().clone();
            return Ok(self.make_expr(ExprKind::Variable { name }));
        }

        if self.match_token(TokenType::LEFT_PAREN) {
            let expr = self.expression()?;
            self.consume(TokenType::RIGHT_PAREN, "Expected ')' after expression.")?;
            return Ok(self.make_expr(ExprKind::Grouping(Box::new(expr))));
        }

        let token = self.peek().clone();
        Err(QuillError::parse(
            token.line,
            format!("Expected expression, got '{}'.", token.lexeme),
        ))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Token-stream helpers
    // ─────────────────────────────────────────────────────────────────────

    fn make_expr(&mut self, kind: ExprKind) -> Expr {
        let id = ExprId(self.next_id);
        self.next_id += 1;
        Expr { id, kind }
    }

    fn match_token(&mut self, token_type: TokenType) -> bool {
        if self.check(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_any(&mut self, token_types: &[TokenType]) -> bool {
        for token_type in token_types {
            if self.check(token_type.clone()) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn check(&self, token_type: TokenType) -> bool {
        !self.is_at_end() && self.peek().token_type == token_type
    }

    fn check_next(&self, token_type: TokenType) -> bool {
        match self.tokens.get(self.current + 1) {
            Some(token) => token.token_type == token_type,
            None => false,
        }
    }

    fn consume(&mut self, token_type: TokenType, message: impl Into<String>) -> ParseResult<&Token> {
        if self.check(token_type) {
            Ok(self.advance())
        } else {
            let token = self.peek();
            Err(QuillError::parse(
                token.line,
                format!("at '{}': {}", token.lexeme, message.into()),
            ))
        }
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::EOF
    }

    /// Discard tokens until a likely statement boundary, so one syntax
    /// error does not cascade into dozens.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == TokenType::SEMICOLON {
                return;
            }

            match self.peek().token_type {
                TokenType::CLASS
                | TokenType::FUN
                | TokenType::VAR
                | TokenType::FOR
                | TokenType::IF
                | TokenType::WHILE
                | TokenType::PRINT
                | TokenType::RETURN
                | TokenType::BREAK
                | TokenType::CONTINUE => return,
                _ => {}
            }

            self.advance();
        }
    }
}
