//! Recursive-descent parser for the Source Language.
//!
//! Types parse through the same expression machinery as values (see
//! [`crate::ast`]), which keeps conversions, composite literals and generic
//! instantiation uniform for the consumer. The parser follows the reference
//! grammar's two classic ambiguity rules:
//!
//! - a `{` directly after the header expression of `if`/`for`/`switch`
//!   opens the body, not a composite literal (`brace_ok` tracking);
//! - parameter lists are parsed as bare types first and names are fixed up
//!   afterwards, since `(a, b int)` and `(int, string)` are only
//!   distinguishable once the whole list is known.

use crate::{
    ast::{
        AssignOp, BinaryOp, Block, CallExpr, CaseClause, Decl, Expr, File, ForStmt, FuncDecl, FuncLit, FuncSig, Ident,
        IfStmt, ImportSpec, InterfaceElem, Param, RangeStmt, Receiver, Stmt, StructField, SwitchStmt, TypeParam,
        TypeSpec, TypeSwitchStmt, UnaryOp, VarGroup, VarSpec,
    },
    error::SyntaxError,
    lexer::{tokenize, Spanned},
    pos::Pos,
    token::Token,
};

/// Parses a whole source file.
pub fn parse_file(file_name: &str, src: &str) -> Result<File, SyntaxError> {
    let tokens = tokenize(file_name, src)?;
    let mut parser = Parser::new(file_name, tokens);
    parser.file()
}

/// Parses a single expression, for hosts and tests.
pub fn parse_expr(src: &str) -> Result<Expr, SyntaxError> {
    let tokens = tokenize("<expr>", src)?;
    let mut parser = Parser::new("<expr>", tokens);
    let expr = parser.expr()?;
    parser.skip_semis();
    if let Some(tok) = parser.peek_spanned() {
        return Err(parser.unexpected("end of expression", &tok.token.clone(), tok.pos));
    }
    Ok(expr)
}

struct Parser {
    file: String,
    tokens: Vec<Spanned>,
    idx: usize,
    /// When false, a `{` after an operand opens a statement block rather
    /// than a composite literal (control-clause headers).
    brace_ok: bool,
    /// When true, `func` parses as a function type and never consumes a
    /// body: in `[]func() int{}` the braces belong to the composite
    /// literal, not to a literal function.
    in_type: bool,
}

impl Parser {
    fn new(file: &str, tokens: Vec<Spanned>) -> Self {
        Self {
            file: file.to_owned(),
            tokens,
            idx: 0,
            brace_ok: true,
            in_type: false,
        }
    }

    // --- token plumbing ---

    fn peek_spanned(&self) -> Option<&Spanned> {
        self.tokens.get(self.idx)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.idx).map(|s| &s.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.idx + offset).map(|s| &s.token)
    }

    fn pos(&self) -> Pos {
        self.tokens.get(self.idx).map_or(Pos::NONE, |s| s.pos)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let tok = self.tokens.get(self.idx).cloned();
        if tok.is_some() {
            self.idx += 1;
        }
        tok
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.idx += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, context: &str) -> Result<Pos, SyntaxError> {
        match self.peek_spanned() {
            Some(spanned) if spanned.token == *token => {
                let pos = spanned.pos;
                self.idx += 1;
                Ok(pos)
            }
            Some(spanned) => Err(self.unexpected(
                &format!("{} in {context}", token.describe()),
                &spanned.token.clone(),
                spanned.pos,
            )),
            None => Err(self.eof(context)),
        }
    }

    fn expect_ident(&mut self, context: &str) -> Result<Ident, SyntaxError> {
        match self.peek_spanned().cloned() {
            Some(Spanned {
                token: Token::Ident(name),
                pos,
            }) => {
                self.idx += 1;
                Ok(Ident::new(name, pos))
            }
            Some(spanned) => Err(self.unexpected(&format!("identifier in {context}"), &spanned.token, spanned.pos)),
            None => Err(self.eof(context)),
        }
    }

    fn unexpected(&self, expected: &str, found: &Token, pos: Pos) -> SyntaxError {
        SyntaxError::Unexpected {
            file: self.file.clone(),
            pos,
            expected: expected.to_owned(),
            found: found.describe(),
        }
    }

    fn eof(&self, context: &str) -> SyntaxError {
        SyntaxError::UnexpectedEof {
            file: self.file.clone(),
            context: context.to_owned(),
        }
    }

    fn skip_semis(&mut self) {
        while self.eat(&Token::Semi) {}
    }

    fn expect_terminator(&mut self, context: &str) -> Result<(), SyntaxError> {
        // `}` and `)` may directly follow a final statement or spec.
        if matches!(self.peek(), Some(Token::RBrace | Token::RParen) | None) {
            return Ok(());
        }
        self.expect(&Token::Semi, context)?;
        Ok(())
    }

    // --- file structure ---

    fn file(&mut self) -> Result<File, SyntaxError> {
        self.skip_semis();
        self.expect(&Token::Package, "package clause")?;
        let package = self.expect_ident("package clause")?;
        self.expect_terminator("package clause")?;
        self.skip_semis();

        let mut imports = Vec::new();
        while self.check(&Token::Import) {
            self.advance();
            if self.eat(&Token::LParen) {
                self.skip_semis();
                while !self.check(&Token::RParen) {
                    imports.push(self.import_spec()?);
                    self.skip_semis();
                }
                self.expect(&Token::RParen, "import group")?;
            } else {
                imports.push(self.import_spec()?);
            }
            self.expect_terminator("import declaration")?;
            self.skip_semis();
        }

        let mut decls = Vec::new();
        while self.peek().is_some() {
            decls.push(self.top_decl()?);
            self.skip_semis();
        }

        Ok(File {
            name: self.file.clone(),
            package,
            imports,
            decls,
        })
    }

    fn import_spec(&mut self) -> Result<ImportSpec, SyntaxError> {
        let pos = self.pos();
        let alias = match self.peek().cloned() {
            Some(Token::Ident(name)) => {
                self.advance();
                Some(name)
            }
            Some(Token::Dot) => {
                self.advance();
                Some(".".to_owned())
            }
            _ => None,
        };
        match self.advance() {
            Some(Spanned {
                token: Token::Str(path) | Token::RawStr(path),
                ..
            }) => Ok(ImportSpec { alias, path, pos }),
            Some(spanned) => Err(self.unexpected("import path string", &spanned.token, spanned.pos)),
            None => Err(self.eof("import declaration")),
        }
    }

    fn top_decl(&mut self) -> Result<Decl, SyntaxError> {
        match self.peek() {
            Some(Token::Func) => self.func_decl(),
            Some(Token::Type) => self.type_decl(),
            Some(Token::Var) => Ok(Decl::Var(self.var_group(false)?)),
            Some(Token::Const) => Ok(Decl::Const(self.var_group(true)?)),
            Some(other) => {
                let other = other.clone();
                let pos = self.pos();
                Err(self.unexpected("declaration", &other, pos))
            }
            None => Err(self.eof("declaration")),
        }
    }

    // --- declarations ---

    fn func_decl(&mut self) -> Result<Decl, SyntaxError> {
        let pos = self.expect(&Token::Func, "function declaration")?;
        let recv = if self.check(&Token::LParen) {
            Some(self.receiver()?)
        } else {
            None
        };
        let name = self.expect_ident("function declaration")?;
        let mut sig = FuncSig::default();
        if self.check(&Token::LBracket) && recv.is_none() {
            sig.type_params = self.type_params()?;
        }
        self.signature_tail(&mut sig)?;
        let body = if self.check(&Token::LBrace) {
            Some(self.block()?)
        } else {
            None
        };
        Ok(Decl::Func(Box::new(FuncDecl {
            recv,
            name,
            sig,
            body,
            pos,
        })))
    }

    fn receiver(&mut self) -> Result<Receiver, SyntaxError> {
        let pos = self.expect(&Token::LParen, "method receiver")?;
        let first = self.expect_ident("method receiver")?;
        let (name, pointer, type_name) = if self.eat(&Token::Star) {
            (Some(first), true, self.expect_ident("method receiver")?)
        } else if let Some(Token::Ident(_)) = self.peek() {
            let type_name = self.expect_ident("method receiver")?;
            (Some(first), false, type_name)
        } else {
            (None, false, first)
        };
        let mut type_params = Vec::new();
        if self.eat(&Token::LBracket) {
            loop {
                type_params.push(self.expect_ident("receiver type parameters")?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::RBracket, "receiver type parameters")?;
        }
        self.expect(&Token::RParen, "method receiver")?;
        Ok(Receiver {
            name,
            type_name,
            pointer,
            type_params,
            pos,
        })
    }

    fn type_decl(&mut self) -> Result<Decl, SyntaxError> {
        self.expect(&Token::Type, "type declaration")?;
        let mut specs = Vec::new();
        if self.eat(&Token::LParen) {
            self.skip_semis();
            while !self.check(&Token::RParen) {
                specs.push(self.type_spec()?);
                self.skip_semis();
            }
            self.expect(&Token::RParen, "type declaration group")?;
        } else {
            specs.push(self.type_spec()?);
        }
        Ok(Decl::Type(specs))
    }

    fn type_spec(&mut self) -> Result<TypeSpec, SyntaxError> {
        let name = self.expect_ident("type declaration")?;
        let pos = name.pos;
        let mut type_params = Vec::new();
        if self.check(&Token::LBracket) && self.looks_like_type_params() {
            type_params = self.type_params()?;
        }
        let alias = self.eat(&Token::Assign);
        let ty = self.type_expr()?;
        Ok(TypeSpec {
            name,
            type_params,
            alias,
            ty,
            pos,
        })
    }

    /// Distinguishes `type List[T any] ...` from `type A [N]int`.
    ///
    /// After the `[`: an identifier followed by `]` is an array length
    /// (`[N]int`), anything else identifier-led is a type parameter list.
    fn looks_like_type_params(&self) -> bool {
        match self.peek_at(1) {
            Some(Token::Ident(_)) => !matches!(self.peek_at(2), Some(Token::RBracket)),
            _ => false,
        }
    }

    fn type_params(&mut self) -> Result<Vec<TypeParam>, SyntaxError> {
        self.expect(&Token::LBracket, "type parameter list")?;
        let mut params = Vec::new();
        loop {
            let mut names = vec![self.expect_ident("type parameter list")?];
            while self.eat(&Token::Comma) {
                names.push(self.expect_ident("type parameter list")?);
            }
            let constraint = if self.check(&Token::RBracket) {
                None
            } else {
                Some(self.constraint_expr()?)
            };
            for name in names {
                params.push(TypeParam {
                    name,
                    constraint: constraint.clone(),
                });
            }
            if !self.eat(&Token::Comma) {
                break;
            }
            if self.check(&Token::RBracket) {
                break;
            }
        }
        self.expect(&Token::RBracket, "type parameter list")?;
        Ok(params)
    }

    /// A constraint: type terms (`T`, `~T`) joined by `|` into a union.
    fn constraint_expr(&mut self) -> Result<Expr, SyntaxError> {
        let first = self.constraint_term()?;
        if !self.check(&Token::Pipe) {
            return Ok(first);
        }
        let pos = first.pos();
        let mut terms = vec![first];
        while self.eat(&Token::Pipe) {
            terms.push(self.constraint_term()?);
        }
        Ok(Expr::UnionType { terms, pos })
    }

    fn constraint_term(&mut self) -> Result<Expr, SyntaxError> {
        if self.check(&Token::Tilde) {
            let pos = self.pos();
            self.advance();
            let ty = self.type_expr()?;
            return Ok(Expr::TildeTerm { ty: Box::new(ty), pos });
        }
        self.type_expr()
    }

    fn var_group(&mut self, constant: bool) -> Result<VarGroup, SyntaxError> {
        let pos = self.pos();
        if constant {
            self.expect(&Token::Const, "const declaration")?;
        } else {
            self.expect(&Token::Var, "var declaration")?;
        }
        let mut specs = Vec::new();
        if self.eat(&Token::LParen) {
            self.skip_semis();
            while !self.check(&Token::RParen) {
                specs.push(self.var_spec()?);
                self.skip_semis();
            }
            self.expect(&Token::RParen, "declaration group")?;
        } else {
            specs.push(self.var_spec()?);
        }
        Ok(VarGroup { specs, pos })
    }

    fn var_spec(&mut self) -> Result<VarSpec, SyntaxError> {
        let mut names = vec![self.expect_ident("declaration")?];
        let pos = names[0].pos;
        while self.eat(&Token::Comma) {
            names.push(self.expect_ident("declaration")?);
        }
        let ty = if matches!(self.peek(), Some(Token::Assign | Token::Semi | Token::RParen) | None) {
            None
        } else {
            Some(self.type_expr()?)
        };
        let mut values = Vec::new();
        if self.eat(&Token::Assign) {
            values.push(self.expr()?);
            while self.eat(&Token::Comma) {
                values.push(self.expr()?);
            }
        }
        Ok(VarSpec { names, ty, values, pos })
    }

    // --- signatures ---

    /// Parses `(params) results` into `sig`.
    fn signature_tail(&mut self, sig: &mut FuncSig) -> Result<(), SyntaxError> {
        let (params, variadic) = self.params()?;
        sig.params = params;
        sig.variadic = variadic;
        sig.results = self.results()?;
        Ok(())
    }

    fn params(&mut self) -> Result<(Vec<Param>, bool), SyntaxError> {
        self.expect(&Token::LParen, "parameter list")?;
        let saved = std::mem::replace(&mut self.brace_ok, true);
        let mut entries: Vec<Param> = Vec::new();
        let mut variadic = false;
        while !self.check(&Token::RParen) {
            let entry_variadic = self.check(&Token::Ellipsis);
            if entry_variadic {
                self.advance();
                let elem = self.type_expr()?;
                entries.push(Param { name: None, ty: elem });
                variadic = true;
            } else {
                let first = self.type_expr()?;
                if self.starts_type() {
                    // `name Type` or `name ...Type`
                    let name = match first {
                        Expr::Ident(ident) => ident,
                        other => {
                            return Err(SyntaxError::Invalid {
                                file: self.file.clone(),
                                pos: other.pos(),
                                message: "parameter name must be an identifier".to_owned(),
                            });
                        }
                    };
                    if self.eat(&Token::Ellipsis) {
                        variadic = true;
                    }
                    let ty = self.type_expr()?;
                    entries.push(Param { name: Some(name), ty });
                } else {
                    entries.push(Param { name: None, ty: first });
                }
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen, "parameter list")?;
        self.brace_ok = saved;
        fixup_param_names(&mut entries);
        Ok((entries, variadic))
    }

    fn results(&mut self) -> Result<Vec<Param>, SyntaxError> {
        if self.check(&Token::LParen) {
            let (params, _) = self.params()?;
            return Ok(params);
        }
        if self.starts_type() {
            let ty = self.type_expr()?;
            return Ok(vec![Param { name: None, ty }]);
        }
        Ok(Vec::new())
    }

    /// Whether the current token can begin a type expression.
    fn starts_type(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Ident(_)
                    | Token::Star
                    | Token::LBracket
                    | Token::Map
                    | Token::Func
                    | Token::Chan
                    | Token::Interface
                    | Token::Struct
                    | Token::LParen
                    | Token::Arrow
                    | Token::Ellipsis
            )
        )
    }

    /// Type expressions reuse the unary/primary machinery; binary operators
    /// never appear in type position outside constraints, so this stops
    /// before binary parsing.
    fn type_expr(&mut self) -> Result<Expr, SyntaxError> {
        let saved = std::mem::replace(&mut self.in_type, true);
        let result = self.unary_expr();
        self.in_type = saved;
        result
    }

    // --- statements ---

    fn block(&mut self) -> Result<Block, SyntaxError> {
        let pos = self.expect(&Token::LBrace, "block")?;
        let saved = std::mem::replace(&mut self.brace_ok, true);
        let mut stmts = Vec::new();
        self.skip_semis();
        while !self.check(&Token::RBrace) {
            if self.peek().is_none() {
                return Err(self.eof("block"));
            }
            stmts.push(self.stmt()?);
            self.skip_semis();
        }
        self.expect(&Token::RBrace, "block")?;
        self.brace_ok = saved;
        Ok(Block { stmts, pos })
    }

    fn stmt(&mut self) -> Result<Stmt, SyntaxError> {
        let pos = self.pos();
        match self.peek() {
            Some(Token::Var) => {
                let group = self.var_group(false)?;
                self.expect_terminator("var declaration")?;
                Ok(Stmt::Decl(Decl::Var(group)))
            }
            Some(Token::Const) => {
                let group = self.var_group(true)?;
                self.expect_terminator("const declaration")?;
                Ok(Stmt::Decl(Decl::Const(group)))
            }
            Some(Token::Type) => {
                let decl = self.type_decl()?;
                self.expect_terminator("type declaration")?;
                Ok(Stmt::Decl(decl))
            }
            Some(Token::Return) => {
                self.advance();
                let mut results = Vec::new();
                if !matches!(self.peek(), Some(Token::Semi | Token::RBrace) | None) {
                    results.push(self.expr()?);
                    while self.eat(&Token::Comma) {
                        results.push(self.expr()?);
                    }
                }
                self.expect_terminator("return statement")?;
                Ok(Stmt::Return { results, pos })
            }
            Some(Token::If) => self.if_stmt(),
            Some(Token::For) => self.for_stmt(),
            Some(Token::Switch) => self.switch_stmt(),
            Some(Token::LBrace) => {
                let block = self.block()?;
                self.expect_terminator("block")?;
                Ok(Stmt::Block(block))
            }
            Some(Token::Defer) => {
                self.advance();
                let call = self.expr()?;
                self.expect_terminator("defer statement")?;
                Ok(Stmt::Defer { call, pos })
            }
            Some(Token::Go) => {
                self.advance();
                let call = self.expr()?;
                self.expect_terminator("go statement")?;
                Ok(Stmt::Go { call, pos })
            }
            Some(Token::Break) => {
                self.advance();
                let label = self.opt_label();
                self.expect_terminator("break statement")?;
                Ok(Stmt::Break { label, pos })
            }
            Some(Token::Continue) => {
                self.advance();
                let label = self.opt_label();
                self.expect_terminator("continue statement")?;
                Ok(Stmt::Continue { label, pos })
            }
            Some(Token::Fallthrough) => {
                self.advance();
                self.expect_terminator("fallthrough statement")?;
                Ok(Stmt::Fallthrough { pos })
            }
            Some(Token::Semi) => {
                self.advance();
                Ok(Stmt::Empty { pos })
            }
            Some(Token::Ident(_)) if matches!(self.peek_at(1), Some(Token::Colon)) => {
                let label = self.expect_ident("label")?;
                self.expect(&Token::Colon, "labeled statement")?;
                self.skip_semis();
                let stmt = self.stmt()?;
                Ok(Stmt::Labeled {
                    label,
                    stmt: Box::new(stmt),
                    pos,
                })
            }
            Some(_) => {
                let stmt = self.simple_stmt(false)?.into_stmt();
                self.expect_terminator("statement")?;
                Ok(stmt)
            }
            None => Err(self.eof("statement")),
        }
    }

    fn opt_label(&mut self) -> Option<Ident> {
        if let Some(Token::Ident(_)) = self.peek() {
            Some(self.expect_ident("label").expect("checked ident"))
        } else {
            None
        }
    }

    fn if_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        let pos = self.expect(&Token::If, "if statement")?;
        let saved = std::mem::replace(&mut self.brace_ok, false);
        let mut init = None;
        let mut cond_stmt = self.simple_stmt(false)?;
        if self.eat(&Token::Semi) {
            init = Some(cond_stmt.into_stmt());
            cond_stmt = self.simple_stmt(false)?;
        }
        self.brace_ok = saved;
        let cond = cond_stmt.into_expr(&self.file)?;
        let then = self.block()?;
        let else_branch = if self.eat(&Token::Else) {
            if self.check(&Token::If) {
                Some(self.if_stmt()?)
            } else {
                Some(Stmt::Block(self.block()?))
            }
        } else {
            None
        };
        if else_branch.is_none() {
            self.expect_terminator("if statement")?;
        }
        Ok(Stmt::If(Box::new(IfStmt {
            init,
            cond,
            then,
            else_branch,
            pos,
        })))
    }

    fn for_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        let pos = self.expect(&Token::For, "for statement")?;
        let saved = std::mem::replace(&mut self.brace_ok, false);

        // `for { ... }`
        if self.check(&Token::LBrace) {
            self.brace_ok = saved;
            let body = self.block()?;
            self.expect_terminator("for statement")?;
            return Ok(Stmt::For(Box::new(ForStmt {
                init: None,
                cond: None,
                post: None,
                body,
                pos,
            })));
        }

        // `for range x { ... }`
        if self.eat(&Token::Range) {
            let subject = self.expr()?;
            self.brace_ok = saved;
            let body = self.block()?;
            self.expect_terminator("for statement")?;
            return Ok(Stmt::Range(Box::new(RangeStmt {
                key: None,
                value: None,
                define: false,
                subject,
                body,
                pos,
            })));
        }

        let first = self.simple_stmt(true)?;
        if let Simple::Range {
            key,
            value,
            define,
            subject,
        } = first
        {
            self.brace_ok = saved;
            let body = self.block()?;
            self.expect_terminator("for statement")?;
            return Ok(Stmt::Range(Box::new(RangeStmt {
                key,
                value,
                define,
                subject,
                body,
                pos,
            })));
        }

        if self.eat(&Token::Semi) {
            // three-clause form
            let init = Some(first.into_stmt());
            let cond = if self.check(&Token::Semi) {
                None
            } else {
                Some(self.expr()?)
            };
            self.expect(&Token::Semi, "for clause")?;
            let post = if self.check(&Token::LBrace) {
                None
            } else {
                Some(self.simple_stmt(false)?.into_stmt())
            };
            self.brace_ok = saved;
            let body = self.block()?;
            self.expect_terminator("for statement")?;
            return Ok(Stmt::For(Box::new(ForStmt {
                init,
                cond,
                post,
                body,
                pos,
            })));
        }

        // condition-only form
        self.brace_ok = saved;
        let cond = first.into_expr(&self.file)?;
        let body = self.block()?;
        self.expect_terminator("for statement")?;
        Ok(Stmt::For(Box::new(ForStmt {
            init: None,
            cond: Some(cond),
            post: None,
            body,
            pos,
        })))
    }

    fn switch_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        let pos = self.expect(&Token::Switch, "switch statement")?;
        let saved = std::mem::replace(&mut self.brace_ok, false);
        let mut init = None;
        let mut header = None;
        if !self.check(&Token::LBrace) {
            let first = self.simple_stmt(false)?;
            if self.eat(&Token::Semi) {
                init = Some(first.into_stmt());
                if !self.check(&Token::LBrace) {
                    header = Some(self.simple_stmt(false)?);
                }
            } else {
                header = Some(first);
            }
        }
        self.brace_ok = saved;

        // Type switch headers take two shapes: `v := x.(type)` and
        // `x.(type)`.
        let type_switch = match &header {
            Some(Simple::Stmt(Stmt::Assign { op, rhs, lhs, .. })) => {
                if *op == AssignOp::Define
                    && rhs.len() == 1
                    && matches!(rhs[0].unparenthesized(), Expr::TypeAssert { ty: None, .. })
                {
                    let bind = match lhs[0].unparenthesized() {
                        Expr::Ident(ident) => Some(ident.clone()),
                        _ => None,
                    };
                    Some((bind, rhs[0].clone()))
                } else {
                    None
                }
            }
            Some(Simple::Stmt(Stmt::Expr(expr))) => {
                if matches!(expr.unparenthesized(), Expr::TypeAssert { ty: None, .. }) {
                    Some((None, expr.clone()))
                } else {
                    None
                }
            }
            _ => None,
        };

        if let Some((bind, assert_expr)) = type_switch {
            let subject = match assert_expr.unparenthesized() {
                Expr::TypeAssert { base, .. } => (**base).clone(),
                _ => unreachable!("checked TypeAssert above"),
            };
            let cases = self.case_clauses()?;
            self.expect_terminator("switch statement")?;
            return Ok(Stmt::TypeSwitch(Box::new(TypeSwitchStmt {
                init,
                bind,
                subject,
                cases,
                pos,
            })));
        }

        let tag = match header {
            None => None,
            Some(simple) => Some(simple.into_expr(&self.file)?),
        };
        let cases = self.case_clauses()?;
        self.expect_terminator("switch statement")?;
        Ok(Stmt::Switch(Box::new(SwitchStmt { init, tag, cases, pos })))
    }

    fn case_clauses(&mut self) -> Result<Vec<CaseClause>, SyntaxError> {
        self.expect(&Token::LBrace, "switch body")?;
        let saved = std::mem::replace(&mut self.brace_ok, true);
        let mut cases = Vec::new();
        self.skip_semis();
        while !self.check(&Token::RBrace) {
            let pos = self.pos();
            let exprs = if self.eat(&Token::Case) {
                let mut exprs = vec![self.expr()?];
                while self.eat(&Token::Comma) {
                    exprs.push(self.expr()?);
                }
                exprs
            } else {
                self.expect(&Token::Default, "switch body")?;
                Vec::new()
            };
            self.expect(&Token::Colon, "case clause")?;
            self.skip_semis();
            let mut body = Vec::new();
            while !matches!(self.peek(), Some(Token::Case | Token::Default | Token::RBrace) | None) {
                body.push(self.stmt()?);
                self.skip_semis();
            }
            cases.push(CaseClause { exprs, body, pos });
        }
        self.expect(&Token::RBrace, "switch body")?;
        self.brace_ok = saved;
        Ok(cases)
    }

    fn simple_stmt(&mut self, allow_range: bool) -> Result<Simple, SyntaxError> {
        let pos = self.pos();
        let mut lhs = vec![self.expr()?];
        while self.eat(&Token::Comma) {
            lhs.push(self.expr()?);
        }

        let op = match self.peek() {
            Some(Token::Assign) => Some(AssignOp::Assign),
            Some(Token::Define) => Some(AssignOp::Define),
            Some(Token::PlusAssign) => Some(AssignOp::Add),
            Some(Token::MinusAssign) => Some(AssignOp::Sub),
            Some(Token::StarAssign) => Some(AssignOp::Mul),
            Some(Token::SlashAssign) => Some(AssignOp::Div),
            Some(Token::PercentAssign) => Some(AssignOp::Rem),
            Some(Token::AmpAssign) => Some(AssignOp::BitAnd),
            Some(Token::PipeAssign) => Some(AssignOp::BitOr),
            Some(Token::CaretAssign) => Some(AssignOp::BitXor),
            Some(Token::ShlAssign) => Some(AssignOp::Shl),
            Some(Token::ShrAssign) => Some(AssignOp::Shr),
            Some(Token::AmpCaretAssign) => Some(AssignOp::AndNot),
            _ => None,
        };

        if let Some(op) = op {
            self.advance();
            if allow_range && matches!(op, AssignOp::Assign | AssignOp::Define) && self.eat(&Token::Range) {
                let subject = self.expr()?;
                let mut iter = lhs.into_iter();
                let key = iter.next();
                let value = iter.next();
                return Ok(Simple::Range {
                    key,
                    value,
                    define: op == AssignOp::Define,
                    subject,
                });
            }
            let mut rhs = vec![self.expr()?];
            while self.eat(&Token::Comma) {
                rhs.push(self.expr()?);
            }
            return Ok(Simple::Stmt(Stmt::Assign { lhs, op, rhs, pos }));
        }

        if lhs.len() == 1 {
            if self.eat(&Token::PlusPlus) {
                return Ok(Simple::Stmt(Stmt::IncDec {
                    target: lhs.pop().expect("single lhs"),
                    inc: true,
                    pos,
                }));
            }
            if self.eat(&Token::MinusMinus) {
                return Ok(Simple::Stmt(Stmt::IncDec {
                    target: lhs.pop().expect("single lhs"),
                    inc: false,
                    pos,
                }));
            }
            if self.eat(&Token::Arrow) {
                let value = self.expr()?;
                return Ok(Simple::Stmt(Stmt::Send {
                    chan: lhs.pop().expect("single lhs"),
                    value,
                    pos,
                }));
            }
            return Ok(Simple::Stmt(Stmt::Expr(lhs.pop().expect("single lhs"))));
        }

        Err(SyntaxError::Invalid {
            file: self.file.clone(),
            pos,
            message: "expression list is only valid on the left of an assignment".to_owned(),
        })
    }

    // --- expressions ---

    fn expr(&mut self) -> Result<Expr, SyntaxError> {
        // Expressions nested inside a type (array lengths, instantiation
        // arguments) leave type context.
        let saved = std::mem::replace(&mut self.in_type, false);
        let result = self.binary_expr(1);
        self.in_type = saved;
        result
    }

    fn binary_expr(&mut self, min_prec: u8) -> Result<Expr, SyntaxError> {
        let mut lhs = self.unary_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                Some(Token::Shl) => BinaryOp::Shl,
                Some(Token::Shr) => BinaryOp::Shr,
                Some(Token::Amp) => BinaryOp::BitAnd,
                Some(Token::AmpCaret) => BinaryOp::AndNot,
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                Some(Token::Pipe) => BinaryOp::BitOr,
                Some(Token::Caret) => BinaryOp::BitXor,
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::Ne,
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                Some(Token::AndAnd) => BinaryOp::LogicalAnd,
                Some(Token::OrOr) => BinaryOp::LogicalOr,
                _ => break,
            };
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            let pos = self.pos();
            self.advance();
            let rhs = self.binary_expr(prec + 1)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
            };
        }
        Ok(lhs)
    }

    fn unary_expr(&mut self) -> Result<Expr, SyntaxError> {
        let pos = self.pos();
        let op = match self.peek() {
            Some(Token::Not) => Some(UnaryOp::Not),
            Some(Token::Minus) => Some(UnaryOp::Neg),
            Some(Token::Plus) => Some(UnaryOp::Plus),
            Some(Token::Caret) => Some(UnaryOp::BitNot),
            Some(Token::Star) => Some(UnaryOp::Deref),
            Some(Token::Amp) => Some(UnaryOp::Addr),
            Some(Token::Arrow) => Some(UnaryOp::Recv),
            Some(Token::Tilde) => {
                self.advance();
                let ty = self.type_expr()?;
                return Ok(Expr::TildeTerm { ty: Box::new(ty), pos });
            }
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            // `<-chan T` is a receive-only channel type, not a receive.
            if op == UnaryOp::Recv && self.check(&Token::Chan) {
                self.advance();
                let elem = self.type_expr()?;
                return Ok(Expr::ChanType {
                    elem: Box::new(elem),
                    pos,
                });
            }
            let operand = self.unary_expr()?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
                pos,
            });
        }
        self.primary_expr()
    }

    fn primary_expr(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.operand()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.advance();
                    if self.eat(&Token::LParen) {
                        let pos = self.pos();
                        let ty = if self.eat(&Token::Type) {
                            None
                        } else {
                            Some(Box::new(self.type_expr()?))
                        };
                        self.expect(&Token::RParen, "type assertion")?;
                        expr = Expr::TypeAssert {
                            base: Box::new(expr),
                            ty,
                            pos,
                        };
                    } else {
                        let sel = self.expect_ident("selector")?;
                        expr = Expr::Selector {
                            base: Box::new(expr),
                            sel,
                        };
                    }
                }
                Some(Token::LBracket) => {
                    expr = self.index_or_slice(expr)?;
                }
                Some(Token::LParen) => {
                    expr = self.call(expr)?;
                }
                Some(Token::LBrace) if can_start_composite(&expr) && (self.brace_ok || !is_type_name(&expr)) => {
                    let pos = expr.pos();
                    let elems = self.composite_body()?;
                    expr = Expr::Composite {
                        ty: Some(Box::new(expr)),
                        elems,
                        pos,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn index_or_slice(&mut self, base: Expr) -> Result<Expr, SyntaxError> {
        let pos = self.expect(&Token::LBracket, "index expression")?;
        let saved = std::mem::replace(&mut self.brace_ok, true);

        // slice with absent low bound: `a[:high]`, `a[:high:max]`, `a[:]`
        if self.eat(&Token::Colon) {
            let (high, max) = self.slice_tail()?;
            self.expect(&Token::RBracket, "slice expression")?;
            self.brace_ok = saved;
            return Ok(Expr::Slice {
                base: Box::new(base),
                low: None,
                high,
                max,
                pos,
            });
        }

        let first = self.expr()?;
        if self.eat(&Token::Colon) {
            let (high, max) = self.slice_tail()?;
            self.expect(&Token::RBracket, "slice expression")?;
            self.brace_ok = saved;
            return Ok(Expr::Slice {
                base: Box::new(base),
                low: Some(Box::new(first)),
                high,
                max,
                pos,
            });
        }

        let mut indices = vec![first];
        while self.eat(&Token::Comma) {
            indices.push(self.expr()?);
        }
        self.expect(&Token::RBracket, "index expression")?;
        self.brace_ok = saved;
        Ok(Expr::Index {
            base: Box::new(base),
            indices,
            pos,
        })
    }

    fn slice_tail(&mut self) -> Result<(Option<Box<Expr>>, Option<Box<Expr>>), SyntaxError> {
        let high = if matches!(self.peek(), Some(Token::RBracket | Token::Colon)) {
            None
        } else {
            Some(Box::new(self.expr()?))
        };
        let max = if self.eat(&Token::Colon) {
            Some(Box::new(self.expr()?))
        } else {
            None
        };
        Ok((high, max))
    }

    fn call(&mut self, func: Expr) -> Result<Expr, SyntaxError> {
        let pos = self.expect(&Token::LParen, "call expression")?;
        let saved = std::mem::replace(&mut self.brace_ok, true);
        let mut args = Vec::new();
        let mut spread = false;
        while !self.check(&Token::RParen) {
            args.push(self.expr()?);
            if self.eat(&Token::Ellipsis) {
                spread = true;
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen, "call expression")?;
        self.brace_ok = saved;
        Ok(Expr::Call(Box::new(CallExpr { func, args, spread, pos })))
    }

    fn composite_body(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        self.expect(&Token::LBrace, "composite literal")?;
        let saved = std::mem::replace(&mut self.brace_ok, true);
        let mut elems = Vec::new();
        self.skip_semis();
        while !self.check(&Token::RBrace) {
            elems.push(self.composite_elem()?);
            if !self.eat(&Token::Comma) {
                break;
            }
            self.skip_semis();
        }
        self.skip_semis();
        self.expect(&Token::RBrace, "composite literal")?;
        self.brace_ok = saved;
        Ok(elems)
    }

    fn composite_elem(&mut self) -> Result<Expr, SyntaxError> {
        let value = self.composite_value()?;
        if self.eat(&Token::Colon) {
            let pos = value.pos();
            let rhs = self.composite_value()?;
            return Ok(Expr::KeyValue {
                key: Box::new(value),
                value: Box::new(rhs),
                pos,
            });
        }
        Ok(value)
    }

    /// A composite element value: either a nested untyped `{...}` or a
    /// plain expression.
    fn composite_value(&mut self) -> Result<Expr, SyntaxError> {
        if self.check(&Token::LBrace) {
            let pos = self.pos();
            let elems = self.composite_body()?;
            return Ok(Expr::Composite { ty: None, elems, pos });
        }
        self.expr()
    }

    fn operand(&mut self) -> Result<Expr, SyntaxError> {
        let pos = self.pos();
        match self.peek().cloned() {
            Some(Token::Ident(name)) => {
                self.advance();
                Ok(Expr::Ident(Ident::new(name, pos)))
            }
            Some(Token::Int(value)) => {
                self.advance();
                Ok(Expr::IntLit { value, pos })
            }
            Some(Token::Float(value)) => {
                self.advance();
                Ok(Expr::FloatLit { value, pos })
            }
            Some(Token::Str(value) | Token::RawStr(value)) => {
                self.advance();
                Ok(Expr::StringLit { value, pos })
            }
            Some(Token::Rune(value)) => {
                self.advance();
                Ok(Expr::RuneLit { value, pos })
            }
            Some(Token::LParen) => {
                self.advance();
                let saved = std::mem::replace(&mut self.brace_ok, true);
                let inner = self.expr()?;
                self.expect(&Token::RParen, "parenthesized expression")?;
                self.brace_ok = saved;
                Ok(Expr::Paren {
                    inner: Box::new(inner),
                    pos,
                })
            }
            Some(Token::Func) => self.func_lit_or_type(),
            Some(Token::LBracket) => {
                self.advance();
                let len = if self.check(&Token::RBracket) {
                    None
                } else if self.eat(&Token::Ellipsis) {
                    // `[...]T{...}` length is inferred from the literal.
                    None
                } else {
                    Some(Box::new(self.expr()?))
                };
                self.expect(&Token::RBracket, "array type")?;
                let elem = self.type_expr()?;
                Ok(Expr::ArrayType {
                    len,
                    elem: Box::new(elem),
                    pos,
                })
            }
            Some(Token::Map) => {
                self.advance();
                self.expect(&Token::LBracket, "map type")?;
                let key = self.type_expr()?;
                self.expect(&Token::RBracket, "map type")?;
                let value = self.type_expr()?;
                Ok(Expr::MapType {
                    key: Box::new(key),
                    value: Box::new(value),
                    pos,
                })
            }
            Some(Token::Chan) => {
                self.advance();
                self.eat(&Token::Arrow);
                let elem = self.type_expr()?;
                Ok(Expr::ChanType {
                    elem: Box::new(elem),
                    pos,
                })
            }
            Some(Token::Struct) => {
                self.advance();
                let fields = self.struct_fields()?;
                Ok(Expr::StructType { fields, pos })
            }
            Some(Token::Interface) => {
                self.advance();
                let elems = self.interface_elems()?;
                Ok(Expr::InterfaceType { elems, pos })
            }
            Some(Token::Ellipsis) => {
                self.advance();
                let elem = if self.starts_type() {
                    Some(Box::new(self.type_expr()?))
                } else {
                    None
                };
                Ok(Expr::VariadicType { elem, pos })
            }
            Some(other) => Err(self.unexpected("expression", &other, pos)),
            None => Err(self.eof("expression")),
        }
    }

    fn func_lit_or_type(&mut self) -> Result<Expr, SyntaxError> {
        let pos = self.expect(&Token::Func, "function literal")?;
        let mut sig = FuncSig::default();
        if self.check(&Token::LBracket) {
            sig.type_params = self.type_params()?;
        }
        self.signature_tail(&mut sig)?;
        if !self.in_type && self.check(&Token::LBrace) {
            let body = self.block()?;
            return Ok(Expr::FuncLit(Box::new(FuncLit { sig, body, pos })));
        }
        Ok(Expr::FuncType {
            sig: Box::new(sig),
            pos,
        })
    }

    fn struct_fields(&mut self) -> Result<Vec<StructField>, SyntaxError> {
        self.expect(&Token::LBrace, "struct type")?;
        let saved = std::mem::replace(&mut self.brace_ok, true);
        let mut fields = Vec::new();
        self.skip_semis();
        while !self.check(&Token::RBrace) {
            fields.push(self.struct_field()?);
            self.expect_terminator("struct field")?;
            self.skip_semis();
        }
        self.expect(&Token::RBrace, "struct type")?;
        self.brace_ok = saved;
        Ok(fields)
    }

    fn struct_field(&mut self) -> Result<StructField, SyntaxError> {
        let pos = self.pos();

        // Pointer-embedded field: `*Base`.
        if self.eat(&Token::Star) {
            let ty = self.type_expr()?;
            let ty = Expr::Unary {
                op: UnaryOp::Deref,
                operand: Box::new(ty),
                pos,
            };
            let tag = self.field_tag();
            return Ok(StructField {
                names: Vec::new(),
                ty,
                embedded: true,
                tag,
                pos,
            });
        }

        let first = self.expect_ident("struct field")?;

        // Embedded qualified field: `pkg.Base`.
        if self.check(&Token::Dot) {
            self.advance();
            let sel = self.expect_ident("struct field")?;
            let ty = Expr::Selector {
                base: Box::new(Expr::Ident(first)),
                sel,
            };
            let tag = self.field_tag();
            return Ok(StructField {
                names: Vec::new(),
                ty,
                embedded: true,
                tag,
                pos,
            });
        }

        // Embedded plain field: `Base` followed by terminator/tag.
        if matches!(
            self.peek(),
            Some(Token::Semi | Token::RBrace | Token::Str(_) | Token::RawStr(_)) | None
        ) {
            let tag = self.field_tag();
            return Ok(StructField {
                names: Vec::new(),
                ty: Expr::Ident(first),
                embedded: true,
                tag,
                pos,
            });
        }

        let mut names = vec![first];
        while self.eat(&Token::Comma) {
            names.push(self.expect_ident("struct field")?);
        }
        let ty = self.type_expr()?;
        let tag = self.field_tag();
        Ok(StructField {
            names,
            ty,
            embedded: false,
            tag,
            pos,
        })
    }

    fn field_tag(&mut self) -> Option<String> {
        match self.peek().cloned() {
            Some(Token::Str(tag) | Token::RawStr(tag)) => {
                self.advance();
                Some(tag)
            }
            _ => None,
        }
    }

    fn interface_elems(&mut self) -> Result<Vec<InterfaceElem>, SyntaxError> {
        self.expect(&Token::LBrace, "interface type")?;
        let saved = std::mem::replace(&mut self.brace_ok, true);
        let mut elems = Vec::new();
        self.skip_semis();
        while !self.check(&Token::RBrace) {
            // A method is an identifier directly followed by `(`; anything
            // else is an embedded interface or constraint term.
            if let (Some(Token::Ident(_)), Some(Token::LParen)) = (self.peek(), self.peek_at(1)) {
                let name = self.expect_ident("interface method")?;
                let mut sig = FuncSig::default();
                self.signature_tail(&mut sig)?;
                elems.push(InterfaceElem::Method { name, sig });
            } else {
                let term = self.constraint_expr()?;
                elems.push(InterfaceElem::Embed(term));
            }
            self.expect_terminator("interface element")?;
            self.skip_semis();
        }
        self.expect(&Token::RBrace, "interface type")?;
        self.brace_ok = saved;
        Ok(elems)
    }
}

/// Result of parsing a simple statement, with the `range` clause folded in
/// so `for` headers need only one parse.
enum Simple {
    Stmt(Stmt),
    Range {
        key: Option<Expr>,
        value: Option<Expr>,
        define: bool,
        subject: Expr,
    },
}

impl Simple {
    fn into_stmt(self) -> Stmt {
        match self {
            Self::Stmt(stmt) => stmt,
            Self::Range { subject, .. } => {
                // Only reachable on malformed input; degrade to the subject
                // expression so the caller's error points somewhere useful.
                Stmt::Expr(subject)
            }
        }
    }

    fn into_expr(self, file: &str) -> Result<Expr, SyntaxError> {
        match self {
            Self::Stmt(Stmt::Expr(expr)) => Ok(expr),
            Self::Stmt(stmt) => Err(SyntaxError::Invalid {
                file: file.to_owned(),
                pos: stmt.pos(),
                message: "expected an expression, found a statement".to_owned(),
            }),
            Self::Range { subject, .. } => Err(SyntaxError::Invalid {
                file: file.to_owned(),
                pos: subject.pos(),
                message: "range clause is only valid in a for statement".to_owned(),
            }),
        }
    }
}

/// Whether `{` after this operand may begin a composite literal.
///
/// True for type-shaped operands (`T`, `pkg.T`, `T[A]`, `[]T`, `map[K]V`,
/// `struct{...}`); false for calls, literals, and other value shapes.
fn can_start_composite(expr: &Expr) -> bool {
    match expr {
        Expr::Ident(_) | Expr::ArrayType { .. } | Expr::MapType { .. } | Expr::StructType { .. } => true,
        Expr::Selector { base, .. } => matches!(base.unparenthesized(), Expr::Ident(_)),
        Expr::Index { base, .. } => can_start_composite(base),
        _ => false,
    }
}

/// Whether the operand is a bare (possibly qualified or instantiated)
/// type name. Only these are ambiguous with a control-clause body, so in
/// `if`/`for`/`switch` headers a `{` after them opens the block while
/// `[]T{...}` and `map[K]V{...}` literals stay allowed.
fn is_type_name(expr: &Expr) -> bool {
    match expr {
        Expr::Ident(_) => true,
        Expr::Selector { base, .. } => matches!(base.unparenthesized(), Expr::Ident(_)),
        Expr::Index { base, .. } => is_type_name(base),
        _ => false,
    }
}

/// Rewrites `(a, b int)`-style parameter lists.
///
/// Entries are parsed as bare types first; when any entry carries a name,
/// bare identifier entries to its left are names that share the nearest
/// following entry's type.
fn fixup_param_names(entries: &mut [Param]) {
    if !entries.iter().any(|p| p.name.is_some()) {
        return;
    }
    let mut pending_ty: Option<Expr> = None;
    for param in entries.iter_mut().rev() {
        if param.name.is_some() {
            pending_ty = Some(param.ty.clone());
        } else if let Expr::Ident(ident) = param.ty.clone() {
            if let Some(ty) = pending_ty.clone() {
                param.name = Some(ident);
                param.ty = ty;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn file(src: &str) -> File {
        parse_file("test.go", src).unwrap()
    }

    #[test]
    fn package_clause_and_imports() {
        let f = file("package main\n\nimport (\n\t\"fmt\"\n\tfoo \"example.com/bar\"\n\t. \"strings\"\n)\n");
        assert_eq!(f.package.name, "main");
        assert_eq!(f.imports.len(), 3);
        assert_eq!(f.imports[0].local_name(), Some("fmt"));
        assert_eq!(f.imports[1].local_name(), Some("foo"));
        assert!(f.imports[2].is_dot());
    }

    #[test]
    fn method_declaration_with_pointer_receiver() {
        let f = file("package p\n\nfunc (c *Counter) Add(n int) int { return n }\n");
        let Decl::Func(decl) = &f.decls[0] else {
            panic!("expected func decl");
        };
        let recv = decl.recv.as_ref().unwrap();
        assert!(recv.pointer);
        assert_eq!(recv.type_name.name, "Counter");
        assert_eq!(decl.sig.params.len(), 1);
        assert_eq!(decl.sig.params[0].name.as_ref().unwrap().name, "n");
    }

    #[test]
    fn grouped_parameter_names_share_type() {
        let f = file("package p\n\nfunc add(a, b int) int { return a + b }\n");
        let Decl::Func(decl) = &f.decls[0] else {
            panic!("expected func decl");
        };
        assert_eq!(decl.sig.params.len(), 2);
        assert_eq!(decl.sig.params[0].name.as_ref().unwrap().name, "a");
        assert_eq!(decl.sig.params[0].ty, decl.sig.params[1].ty);
    }

    #[test]
    fn composite_literal_not_consumed_by_if_header() {
        let f = file("package p\n\nfunc f(x int) bool {\n\tif x == 1 {\n\t\treturn true\n\t}\n\treturn false\n}\n");
        let Decl::Func(decl) = &f.decls[0] else {
            panic!("expected func decl");
        };
        let body = decl.body.as_ref().unwrap();
        assert!(matches!(body.stmts[0], Stmt::If(_)), "got {:?}", body.stmts[0]);
    }

    #[test]
    fn generic_function_with_constraint() {
        let f = file("package p\n\nfunc First[T any](xs []T) T { return xs[0] }\n");
        let Decl::Func(decl) = &f.decls[0] else {
            panic!("expected func decl");
        };
        assert_eq!(decl.sig.type_params.len(), 1);
        assert_eq!(decl.sig.type_params[0].name.name, "T");
        assert!(matches!(decl.sig.params[0].ty, Expr::ArrayType { .. }));
    }

    #[test]
    fn type_declaration_with_array_length_is_not_generic() {
        let f = file("package p\n\ntype Grid [4]int\n");
        let Decl::Type(specs) = &f.decls[0] else {
            panic!("expected type decl");
        };
        assert!(specs[0].type_params.is_empty());
        assert!(matches!(specs[0].ty, Expr::ArrayType { len: Some(_), .. }));
    }

    #[test]
    fn range_over_map_with_two_variables() {
        let f = file("package p\n\nfunc f(m map[string]int) {\n\tfor k, v := range m {\n\t\t_ = k\n\t\t_ = v\n\t}\n}\n");
        let Decl::Func(decl) = &f.decls[0] else {
            panic!("expected func decl");
        };
        let body = decl.body.as_ref().unwrap();
        let Stmt::Range(range) = &body.stmts[0] else {
            panic!("expected range stmt, got {:?}", body.stmts[0]);
        };
        assert!(range.define);
        assert!(range.key.is_some() && range.value.is_some());
    }

    #[test]
    fn type_switch_with_binding() {
        let f = file("package p\n\nfunc f(x any) {\n\tswitch v := x.(type) {\n\tcase int:\n\t\t_ = v\n\tdefault:\n\t}\n}\n");
        let Decl::Func(decl) = &f.decls[0] else {
            panic!("expected func decl");
        };
        let body = decl.body.as_ref().unwrap();
        let Stmt::TypeSwitch(sw) = &body.stmts[0] else {
            panic!("expected type switch, got {:?}", body.stmts[0]);
        };
        assert_eq!(sw.bind.as_ref().unwrap().name, "v");
        assert_eq!(sw.cases.len(), 2);
        assert!(sw.cases[1].exprs.is_empty(), "second clause is default");
    }

    #[test]
    fn three_index_slice() {
        let expr = parse_expr("a[1:2:3]").unwrap();
        let Expr::Slice { low, high, max, .. } = expr else {
            panic!("expected slice, got {expr:?}");
        };
        assert!(low.is_some() && high.is_some() && max.is_some());
    }

    #[test]
    fn variadic_call_spread() {
        let expr = parse_expr("f(xs...)").unwrap();
        let Expr::Call(call) = expr else {
            panic!("expected call");
        };
        assert!(call.spread);
    }

    #[test]
    fn struct_type_with_embedded_and_tagged_fields() {
        let f = file("package p\n\ntype T struct {\n\tBase\n\tName string `json:\"name\"`\n\tx, y int\n}\n");
        let Decl::Type(specs) = &f.decls[0] else {
            panic!("expected type decl");
        };
        let Expr::StructType { fields, .. } = &specs[0].ty else {
            panic!("expected struct type");
        };
        assert_eq!(fields.len(), 3);
        assert!(fields[0].embedded);
        assert_eq!(fields[0].embedded_name(), Some("Base"));
        assert_eq!(fields[1].tag.as_deref(), Some("json:\"name\""));
        assert_eq!(fields[2].names.len(), 2);
    }

    #[test]
    fn defer_and_go_statements() {
        let f = file("package p\n\nfunc f() {\n\tdefer close()\n\tgo work(1)\n}\n");
        let Decl::Func(decl) = &f.decls[0] else {
            panic!("expected func decl");
        };
        let body = decl.body.as_ref().unwrap();
        assert!(matches!(body.stmts[0], Stmt::Defer { .. }));
        assert!(matches!(body.stmts[1], Stmt::Go { .. }));
    }

    #[test]
    fn const_group_with_iota() {
        let f = file("package p\n\nconst (\n\tA = iota\n\tB\n\tC\n)\n");
        let Decl::Const(group) = &f.decls[0] else {
            panic!("expected const decl");
        };
        assert_eq!(group.specs.len(), 3);
        assert!(group.specs[1].values.is_empty(), "iota repetition spec has no values");
    }

    #[test]
    fn generic_instantiation_parses_as_index() {
        let expr = parse_expr("Pair[int, string]{}").unwrap();
        let Expr::Composite { ty: Some(ty), .. } = expr else {
            panic!("expected composite, got {expr:?}");
        };
        assert!(matches!(*ty, Expr::Index { .. }));
    }

    #[test]
    fn labeled_statement_parses() {
        let f = file("package p\n\nfunc f() {\nloop:\n\tfor {\n\t\tbreak loop\n\t}\n}\n");
        let Decl::Func(decl) = &f.decls[0] else {
            panic!("expected func decl");
        };
        let body = decl.body.as_ref().unwrap();
        assert!(matches!(body.stmts[0], Stmt::Labeled { .. }));
    }
}
