//! Recursive-descent parser (spec §4.2).

use yasn_core::{Diagnostic, DiagnosticKind, Position};

use crate::ast::{AssignTarget, BinOp, Expr, FunctionDecl, ImportClause, Literal, Module, Param, Stmt, UnOp};
use crate::token::{Keyword, Token, TokenKind};
use crate::types::TypeNode;

fn parse_error(msg: impl Into<String>, pos: Position) -> Diagnostic {
    Diagnostic::at(DiagnosticKind::Parse, msg, pos)
}

struct Parser {
    tokens: Vec<Token>,
    i: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, i: 0 }
    }

    fn cur(&self) -> &Token {
        &self.tokens[self.i]
    }

    fn pos(&self) -> Position {
        self.cur().pos
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.i].clone();
        if self.i + 1 < self.tokens.len() {
            self.i += 1;
        }
        t
    }

    fn check_punct(&self, text: &str) -> bool {
        self.cur().is_punct(text)
    }

    fn check_kw(&self, kw: Keyword) -> bool {
        self.cur().is_keyword(kw)
    }

    fn eat_punct(&mut self, text: &str) -> Result<Token, Diagnostic> {
        if self.check_punct(text) {
            Ok(self.advance())
        } else {
            Err(parse_error(
                format!("expected '{text}' but found {}", self.cur().describe()),
                self.pos(),
            ))
        }
    }

    fn eat_kw(&mut self, kw: Keyword) -> Result<Token, Diagnostic> {
        if self.check_kw(kw) {
            Ok(self.advance())
        } else {
            Err(parse_error(
                format!("expected keyword '{}' but found {}", kw.text(), self.cur().describe()),
                self.pos(),
            ))
        }
    }

    fn eat_ident(&mut self) -> Result<(String, Position), Diagnostic> {
        let pos = self.pos();
        match &self.cur().kind {
            TokenKind::Ident(s) => {
                let s = s.clone();
                self.advance();
                Ok((s, pos))
            }
            _ => Err(parse_error(
                format!("expected identifier but found {}", self.cur().describe()),
                pos,
            )),
        }
    }

    fn eat_newline(&mut self) -> Result<(), Diagnostic> {
        if matches!(self.cur().kind, TokenKind::Newline) {
            self.advance();
            Ok(())
        } else {
            Err(parse_error(
                format!("expected newline but found {}", self.cur().describe()),
                self.pos(),
            ))
        }
    }

    fn skip_newlines(&mut self) {
        while matches!(self.cur().kind, TokenKind::Newline) {
            self.advance();
        }
    }

    // ---- Program ----

    fn parse_module(&mut self) -> Result<Module, Diagnostic> {
        let mut statements = Vec::new();
        self.skip_newlines();
        while !matches!(self.cur().kind, TokenKind::Eof) {
            statements.push(self.parse_stmt()?);
            self.skip_newlines();
        }
        Ok(Module { statements })
    }

    fn parse_stmt(&mut self) -> Result<Stmt, Diagnostic> {
        if self.check_kw(Keyword::Export) {
            self.advance();
            return self.parse_exportable(true);
        }
        if self.check_kw(Keyword::Let) {
            return self.parse_var_decl(false);
        }
        if self.check_kw(Keyword::Function) {
            return self.parse_func_decl(false, false);
        }
        if self.check_kw(Keyword::Async) {
            self.advance();
            return self.parse_func_decl(false, true);
        }
        if self.check_kw(Keyword::If) {
            return self.parse_if();
        }
        if self.check_kw(Keyword::While) {
            return self.parse_while();
        }
        if self.check_kw(Keyword::For) {
            return self.parse_for();
        }
        if self.check_kw(Keyword::Import) {
            return self.parse_import_all();
        }
        if self.check_kw(Keyword::From) {
            return self.parse_import_from();
        }
        if self.check_kw(Keyword::Return) {
            return self.parse_return();
        }
        if self.check_kw(Keyword::Break) {
            let pos = self.pos();
            self.advance();
            self.eat_newline()?;
            return Ok(Stmt::Break { pos });
        }
        if self.check_kw(Keyword::Continue) {
            let pos = self.pos();
            self.advance();
            self.eat_newline()?;
            return Ok(Stmt::Continue { pos });
        }
        self.parse_expr_or_assign()
    }

    fn parse_exportable(&mut self, exported: bool) -> Result<Stmt, Diagnostic> {
        if self.check_kw(Keyword::Let) {
            return self.parse_var_decl(exported);
        }
        if self.check_kw(Keyword::Function) {
            return self.parse_func_decl(exported, false);
        }
        if self.check_kw(Keyword::Async) {
            self.advance();
            return self.parse_func_decl(exported, true);
        }
        Err(parse_error(
            format!(
                "expected a declaration after 'export' but found {}",
                self.cur().describe()
            ),
            self.pos(),
        ))
    }

    fn parse_var_decl(&mut self, exported: bool) -> Result<Stmt, Diagnostic> {
        let pos = self.pos();
        self.eat_kw(Keyword::Let)?;
        let (name, _) = self.eat_ident()?;
        let type_node = if self.check_punct(":") {
            self.advance();
            Some(self.parse_type()?)
        } else {
            None
        };
        self.eat_punct("=")?;
        let value = self.parse_expr()?;
        self.eat_newline()?;
        Ok(Stmt::Let {
            name,
            type_node,
            value,
            exported,
            pos,
        })
    }

    fn parse_func_decl(&mut self, exported: bool, is_async: bool) -> Result<Stmt, Diagnostic> {
        let pos = self.pos();
        self.eat_kw(Keyword::Function)?;
        let (name, _) = self.eat_ident()?;
        self.eat_punct("(")?;
        let mut params = Vec::new();
        if !self.check_punct(")") {
            loop {
                let ppos = self.pos();
                let (pname, _) = self.eat_ident()?;
                self.eat_punct(":")?;
                let ptype = self.parse_type()?;
                params.push(Param {
                    name: pname,
                    type_node: ptype,
                    pos: ppos,
                });
                if self.check_punct(",") {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.eat_punct(")")?;
        self.eat_punct("->")?;
        let return_type = self.parse_type()?;
        self.eat_punct(":")?;
        let body = self.parse_block()?;
        Ok(Stmt::Function(FunctionDecl {
            name,
            params,
            return_type,
            is_async,
            exported,
            body,
            pos,
        }))
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, Diagnostic> {
        self.eat_newline()?;
        if !matches!(self.cur().kind, TokenKind::Indent) {
            return Err(parse_error(
                format!("expected an indented block but found {}", self.cur().describe()),
                self.pos(),
            ));
        }
        self.advance();
        let mut stmts = Vec::new();
        loop {
            self.skip_newlines();
            if matches!(self.cur().kind, TokenKind::Dedent) {
                self.advance();
                break;
            }
            stmts.push(self.parse_stmt()?);
        }
        if stmts.is_empty() {
            return Err(parse_error("empty block", self.pos()));
        }
        Ok(stmts)
    }

    fn parse_if(&mut self) -> Result<Stmt, Diagnostic> {
        let pos = self.pos();
        self.eat_kw(Keyword::If)?;
        let cond = self.parse_expr()?;
        self.eat_punct(":")?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.check_kw(Keyword::Else) {
            self.advance();
            if self.check_kw(Keyword::If) {
                Some(vec![self.parse_if()?])
            } else {
                self.eat_punct(":")?;
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_branch,
            else_branch,
            pos,
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, Diagnostic> {
        let pos = self.pos();
        self.eat_kw(Keyword::While)?;
        let cond = self.parse_expr()?;
        self.eat_punct(":")?;
        let body = self.parse_block()?;
        Ok(Stmt::While { cond, body, pos })
    }

    fn parse_for(&mut self) -> Result<Stmt, Diagnostic> {
        let pos = self.pos();
        self.eat_kw(Keyword::For)?;
        let (var, _) = self.eat_ident()?;
        self.eat_kw(Keyword::In)?;
        let iterable = self.parse_expr()?;
        self.eat_punct(":")?;
        let body = self.parse_block()?;
        Ok(Stmt::For {
            var,
            iterable,
            body,
            pos,
        })
    }

    fn parse_import_all(&mut self) -> Result<Stmt, Diagnostic> {
        let pos = self.pos();
        self.eat_kw(Keyword::Import)?;
        let path = self.parse_string_lit()?;
        let alias = if self.check_kw(Keyword::As) {
            self.advance();
            Some(self.eat_ident()?.0)
        } else {
            None
        };
        self.eat_newline()?;
        Ok(Stmt::Import {
            clause: ImportClause::Module { path, alias },
            pos,
        })
    }

    fn parse_import_from(&mut self) -> Result<Stmt, Diagnostic> {
        let pos = self.pos();
        self.eat_kw(Keyword::From)?;
        let path = self.parse_string_lit()?;
        self.eat_kw(Keyword::Import)?;
        let mut names = Vec::new();
        loop {
            let (name, _) = self.eat_ident()?;
            let alias = if self.check_kw(Keyword::As) {
                self.advance();
                Some(self.eat_ident()?.0)
            } else {
                None
            };
            names.push((name, alias));
            if self.check_punct(",") {
                self.advance();
                continue;
            }
            break;
        }
        self.eat_newline()?;
        Ok(Stmt::Import {
            clause: ImportClause::Names { path, names },
            pos,
        })
    }

    fn parse_string_lit(&mut self) -> Result<String, Diagnostic> {
        let pos = self.pos();
        match &self.cur().kind {
            TokenKind::Str(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            _ => Err(parse_error(
                format!("expected a string literal but found {}", self.cur().describe()),
                pos,
            )),
        }
    }

    fn parse_return(&mut self) -> Result<Stmt, Diagnostic> {
        let pos = self.pos();
        self.eat_kw(Keyword::Return)?;
        let value = if matches!(self.cur().kind, TokenKind::Newline) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.eat_newline()?;
        Ok(Stmt::Return { value, pos })
    }

    fn parse_expr_or_assign(&mut self) -> Result<Stmt, Diagnostic> {
        let pos = self.pos();
        let expr = self.parse_expr()?;
        if self.check_punct("=") {
            self.advance();
            let value = self.parse_expr()?;
            self.eat_newline()?;
            let target = match expr {
                Expr::Ident { name, .. } => AssignTarget::Name(name),
                Expr::Index { target, index, .. } => AssignTarget::Index {
                    target: *target,
                    index: *index,
                },
                other => {
                    return Err(parse_error(
                        "left-hand side of assignment must be an identifier or index expression",
                        other.pos(),
                    ));
                }
            };
            return Ok(Stmt::Assign { target, value, pos });
        }
        self.eat_newline()?;
        Ok(Stmt::ExprStmt { expr, pos })
    }

    // ---- Types ----

    fn parse_type(&mut self) -> Result<TypeNode, Diagnostic> {
        let mut variants = vec![self.parse_type_atom()?];
        while self.check_punct("|") {
            self.advance();
            variants.push(self.parse_type_atom()?);
        }
        let mut node = TypeNode::union(variants);
        if self.check_punct("?") {
            self.advance();
            node = TypeNode::union(vec![node, TypeNode::null()]);
        }
        Ok(node)
    }

    fn parse_type_atom(&mut self) -> Result<TypeNode, Diagnostic> {
        let pos = self.pos();
        if self.check_punct("(") {
            self.advance();
            let t = self.parse_type()?;
            self.eat_punct(")")?;
            return Ok(t);
        }
        let (name, _) = self.eat_ident()?;
        match name.as_str() {
            "int" | "integer" => Ok(TypeNode::int()),
            "float" | "floating" => Ok(TypeNode::float()),
            "bool" | "boolean" => Ok(TypeNode::bool()),
            "string" => Ok(TypeNode::str()),
            "null" | "void" => Ok(TypeNode::null()),
            "any" => Ok(TypeNode::any()),
            "task" | "task_handle" => Ok(TypeNode::Primitive(crate::types::Primitive::Any)),
            "List" => {
                self.eat_punct("[")?;
                let elem = self.parse_type()?;
                self.eat_punct("]")?;
                Ok(TypeNode::list(elem))
            }
            "Dict" => {
                self.eat_punct("[")?;
                let key = self.parse_type()?;
                self.eat_punct(",")?;
                let value = self.parse_type()?;
                self.eat_punct("]")?;
                Ok(TypeNode::dict(key, value))
            }
            other => Err(parse_error(format!("unknown type '{other}'"), pos)),
        }
    }

    // ---- Expressions (precedence climbing) ----

    fn parse_expr(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_and()?;
        while self.check_kw(Keyword::Or) {
            let pos = self.pos();
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Binary {
                op: BinOp::Or,
                left: Box::new(left),
                right: Box::new(right),
                pos,
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_comparison()?;
        while self.check_kw(Keyword::And) {
            let pos = self.pos();
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::Binary {
                op: BinOp::And,
                left: Box::new(left),
                right: Box::new(right),
                pos,
            };
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_additive()?;
        loop {
            let op = if self.check_punct("==") {
                BinOp::Eq
            } else if self.check_punct("!=") {
                BinOp::Ne
            } else if self.check_punct("<=") {
                BinOp::Le
            } else if self.check_punct(">=") {
                BinOp::Ge
            } else if self.check_punct("<") {
                BinOp::Lt
            } else if self.check_punct(">") {
                BinOp::Gt
            } else {
                break;
            };
            let pos = self.pos();
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                pos,
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = if self.check_punct("+") {
                BinOp::Add
            } else if self.check_punct("-") {
                BinOp::Sub
            } else {
                break;
            };
            let pos = self.pos();
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                pos,
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_unary()?;
        loop {
            let op = if self.check_punct("*") {
                BinOp::Mul
            } else if self.check_punct("/") {
                BinOp::Div
            } else if self.check_punct("%") {
                BinOp::Mod
            } else {
                break;
            };
            let pos = self.pos();
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                pos,
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, Diagnostic> {
        let pos = self.pos();
        if self.check_kw(Keyword::Not) {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnOp::Not,
                operand: Box::new(operand),
                pos,
            });
        }
        if self.check_punct("-") {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnOp::Neg,
                operand: Box::new(operand),
                pos,
            });
        }
        if self.check_kw(Keyword::Await) {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Await {
                operand: Box::new(operand),
                pos,
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.check_punct("(") {
                let pos = self.pos();
                self.advance();
                let mut args = Vec::new();
                if !self.check_punct(")") {
                    loop {
                        args.push(self.parse_expr()?);
                        if self.check_punct(",") {
                            self.advance();
                            continue;
                        }
                        break;
                    }
                }
                self.eat_punct(")")?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    pos,
                };
            } else if self.check_punct("[") {
                let pos = self.pos();
                self.advance();
                let index = self.parse_expr()?;
                self.eat_punct("]")?;
                expr = Expr::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                    pos,
                };
            } else if self.check_punct(".") {
                let pos = self.pos();
                self.advance();
                let (name, _) = self.eat_ident()?;
                expr = Expr::Member {
                    target: Box::new(expr),
                    name,
                    pos,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        let pos = self.pos();
        match self.cur().kind.clone() {
            TokenKind::Int(n) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Int(n),
                    pos,
                })
            }
            TokenKind::Float(n) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Float(n),
                    pos,
                })
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Str(s),
                    pos,
                })
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Bool(true),
                    pos,
                })
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Bool(false),
                    pos,
                })
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Null,
                    pos,
                })
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expr::Ident { name, pos })
            }
            TokenKind::Punct("(") => {
                self.advance();
                let inner = self.parse_expr()?;
                self.eat_punct(")")?;
                Ok(inner)
            }
            TokenKind::Punct("[") => {
                self.advance();
                let mut items = Vec::new();
                if !self.check_punct("]") {
                    loop {
                        items.push(self.parse_expr()?);
                        if self.check_punct(",") {
                            self.advance();
                            continue;
                        }
                        break;
                    }
                }
                self.eat_punct("]")?;
                Ok(Expr::ListLit { items, pos })
            }
            TokenKind::Punct("{") => {
                self.advance();
                let mut entries = Vec::new();
                if !self.check_punct("}") {
                    loop {
                        let key = self.parse_expr()?;
                        self.eat_punct(":")?;
                        let value = self.parse_expr()?;
                        entries.push((key, value));
                        if self.check_punct(",") {
                            self.advance();
                            continue;
                        }
                        break;
                    }
                }
                self.eat_punct("}")?;
                Ok(Expr::DictLit { entries, pos })
            }
            _ => Err(parse_error(
                format!("unexpected token {}", self.cur().describe()),
                pos,
            )),
        }
    }
}

/// Parses a token stream (as produced by [`crate::lexer::tokenize`]) into a
/// [`Module`].
pub fn parse(tokens: Vec<Token>) -> Result<Module, Diagnostic> {
    Parser::new(tokens).parse_module()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_src(src: &str) -> Result<Module, Diagnostic> {
        parse(tokenize(src).unwrap())
    }

    #[test]
    fn var_decl() {
        let m = parse_src("let x = 1\n").unwrap();
        assert_eq!(m.statements.len(), 1);
        assert!(matches!(m.statements[0], Stmt::Let { .. }));
    }

    #[test]
    fn var_decl_with_annotation() {
        let m = parse_src("let x: int = 1\n").unwrap();
        match &m.statements[0] {
            Stmt::Let { type_node, .. } => assert_eq!(*type_node, Some(TypeNode::int())),
            _ => panic!("expected let"),
        }
    }

    #[test]
    fn function_decl() {
        let m = parse_src("function add(a: int, b: int) -> int:\n  return a + b\n").unwrap();
        assert_eq!(m.statements.len(), 1);
        match &m.statements[0] {
            Stmt::Function(f) => {
                assert_eq!(f.name, "add");
                assert_eq!(f.params.len(), 2);
                assert!(!f.is_async);
            }
            _ => panic!("expected function"),
        }
    }

    #[test]
    fn async_function_decl() {
        let m = parse_src("async function f() -> int:\n  return 1\n").unwrap();
        match &m.statements[0] {
            Stmt::Function(f) => assert!(f.is_async),
            _ => panic!("expected function"),
        }
    }

    #[test]
    fn if_else_chain() {
        let m = parse_src("if x:\n  let a = 1\nelse if y:\n  let b = 2\nelse:\n  let c = 3\n").unwrap();
        assert!(matches!(m.statements[0], Stmt::If { .. }));
    }

    #[test]
    fn assignment_to_identifier() {
        let m = parse_src("x = 1\n").unwrap();
        match &m.statements[0] {
            Stmt::Assign { target, .. } => assert_eq!(*target, AssignTarget::Name("x".to_string())),
            _ => panic!("expected assign"),
        }
    }

    #[test]
    fn assignment_to_index() {
        let m = parse_src("xs[0] = 1\n").unwrap();
        assert!(matches!(
            &m.statements[0],
            Stmt::Assign {
                target: AssignTarget::Index { .. },
                ..
            }
        ));
    }

    #[test]
    fn assignment_to_other_expr_is_rejected() {
        assert!(parse_src("1 + 2 = 3\n").is_err());
    }

    #[test]
    fn import_all_with_alias() {
        let m = parse_src("import \"util\" as u\n").unwrap();
        assert!(matches!(m.statements[0], Stmt::Import { .. }));
    }

    #[test]
    fn import_from_with_aliases() {
        let m = parse_src("from \"util\" import a, b as c\n").unwrap();
        match &m.statements[0] {
            Stmt::Import {
                clause: ImportClause::Names { names, .. },
                ..
            } => assert_eq!(names, &vec![("a".to_string(), None), ("b".to_string(), Some("c".to_string()))]),
            _ => panic!("expected import-from"),
        }
    }

    #[test]
    fn optional_type_sugar() {
        let m = parse_src("let x: int? = null\n").unwrap();
        match &m.statements[0] {
            Stmt::Let { type_node, .. } => {
                assert_eq!(*type_node, Some(TypeNode::union(vec![TypeNode::int(), TypeNode::null()])));
            }
            _ => panic!("expected let"),
        }
    }

    #[test]
    fn precedence_and_or() {
        let m = parse_src("let x = true or false and false\n").unwrap();
        match &m.statements[0] {
            Stmt::Let { value, .. } => {
                assert!(matches!(value, Expr::Binary { op: BinOp::Or, .. }));
            }
            _ => panic!("expected let"),
        }
    }

    #[test]
    fn call_index_and_member_chain() {
        let m = parse_src("let x = f(1)[0].k\n").unwrap();
        match &m.statements[0] {
            Stmt::Let { value, .. } => assert!(matches!(value, Expr::Member { .. })),
            _ => panic!("expected let"),
        }
    }

    #[test]
    fn export_function() {
        let m = parse_src("export function f() -> null:\n  return null\n").unwrap();
        match &m.statements[0] {
            Stmt::Function(f) => assert!(f.exported),
            _ => panic!("expected function"),
        }
    }

    #[test]
    fn while_and_for_loops() {
        let m = parse_src("while true:\n  break\nfor x in xs:\n  continue\n").unwrap();
        assert!(matches!(m.statements[0], Stmt::While { .. }));
        assert!(matches!(m.statements[1], Stmt::For { .. }));
    }

    #[test]
    fn list_and_dict_types() {
        let m = parse_src("let x: List[int] = []\nlet y: Dict[string, int] = {}\n").unwrap();
        match &m.statements[0] {
            Stmt::Let { type_node, .. } => assert_eq!(*type_node, Some(TypeNode::list(TypeNode::int()))),
            _ => panic!("expected let"),
        }
        match &m.statements[1] {
            Stmt::Let { type_node, .. } => {
                assert_eq!(*type_node, Some(TypeNode::dict(TypeNode::str(), TypeNode::int())));
            }
            _ => panic!("expected let"),
        }
    }
}
