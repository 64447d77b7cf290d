//! Syntax tree for the Source Language.
//!
//! Types double as expressions: `*T`, `[]T`, `map[K]V`, `struct{...}` and
//! friends are ordinary [`Expr`] nodes, so the evaluator can treat a type
//! name in value position uniformly (conversions, composite literals, type
//! assertions all consume the same shape).
//!
//! Every node carries the [`Pos`] of its first token.

use serde::{Deserialize, Serialize};

use crate::pos::Pos;

/// An identifier with its position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ident {
    pub name: String,
    pub pos: Pos,
}

impl Ident {
    #[must_use]
    pub fn new(name: impl Into<String>, pos: Pos) -> Self {
        Self { name: name.into(), pos }
    }

    /// The blank identifier `_` discards assignments and declarations.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.name == "_"
    }
}

/// Unary operator tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// `!x`
    Not,
    /// `-x`
    Neg,
    /// `+x`
    Plus,
    /// `^x` (bitwise complement) and `~T` in constraints share a token but
    /// not a node: constraint terms parse as [`Expr::TildeTerm`].
    BitNot,
    /// `*x` — pointer dereference in value position, pointer type in type
    /// position.
    Deref,
    /// `&x`
    Addr,
    /// `<-ch`
    Recv,
}

/// Binary operator tokens, strongest-binding first in the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    BitAnd,
    AndNot,
    Add,
    Sub,
    BitOr,
    BitXor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogicalAnd,
    LogicalOr,
}

impl BinaryOp {
    /// Operator precedence, 5 (tightest) down to 1 (`||`).
    #[must_use]
    pub fn precedence(self) -> u8 {
        match self {
            Self::Mul | Self::Div | Self::Rem | Self::Shl | Self::Shr | Self::BitAnd | Self::AndNot => 5,
            Self::Add | Self::Sub | Self::BitOr | Self::BitXor => 4,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge => 3,
            Self::LogicalAnd => 2,
            Self::LogicalOr => 1,
        }
    }
}

/// Expression and type nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Ident(Ident),
    IntLit {
        value: i64,
        pos: Pos,
    },
    FloatLit {
        value: f64,
        pos: Pos,
    },
    StringLit {
        value: String,
        pos: Pos,
    },
    /// Rune literals evaluate as integers.
    RuneLit {
        value: i64,
        pos: Pos,
    },
    /// `T{...}` or an untyped `{...}` nested inside another composite.
    Composite {
        ty: Option<Box<Expr>>,
        elems: Vec<Expr>,
        pos: Pos,
    },
    /// `key: value` inside a composite literal.
    KeyValue {
        key: Box<Expr>,
        value: Box<Expr>,
        pos: Pos,
    },
    FuncLit(Box<FuncLit>),
    Paren {
        inner: Box<Expr>,
        pos: Pos,
    },
    Selector {
        base: Box<Expr>,
        sel: Ident,
    },
    /// `a[i]` — indexing or generic instantiation, disambiguated at
    /// evaluation time; instantiation with several arguments parses to
    /// several `indices`.
    Index {
        base: Box<Expr>,
        indices: Vec<Expr>,
        pos: Pos,
    },
    Slice {
        base: Box<Expr>,
        low: Option<Box<Expr>>,
        high: Option<Box<Expr>>,
        max: Option<Box<Expr>>,
        pos: Pos,
    },
    /// `x.(T)`; `ty` is `None` for the `x.(type)` form inside a type switch.
    TypeAssert {
        base: Box<Expr>,
        ty: Option<Box<Expr>>,
        pos: Pos,
    },
    Call(Box<CallExpr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        pos: Pos,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        pos: Pos,
    },

    // --- type-only shapes ---
    /// `[]T` (no length) or `[N]T`.
    ArrayType {
        len: Option<Box<Expr>>,
        elem: Box<Expr>,
        pos: Pos,
    },
    MapType {
        key: Box<Expr>,
        value: Box<Expr>,
        pos: Pos,
    },
    ChanType {
        elem: Box<Expr>,
        pos: Pos,
    },
    FuncType {
        sig: Box<FuncSig>,
        pos: Pos,
    },
    StructType {
        fields: Vec<StructField>,
        pos: Pos,
    },
    InterfaceType {
        elems: Vec<InterfaceElem>,
        pos: Pos,
    },
    /// `...T` as the final parameter type.
    VariadicType {
        elem: Option<Box<Expr>>,
        pos: Pos,
    },
    /// `A | B` in a constraint.
    UnionType {
        terms: Vec<Expr>,
        pos: Pos,
    },
    /// `~T` in a constraint.
    TildeTerm {
        ty: Box<Expr>,
        pos: Pos,
    },
}

impl Expr {
    /// The position of the node's first token.
    #[must_use]
    pub fn pos(&self) -> Pos {
        match self {
            Self::Ident(ident) => ident.pos,
            Self::Selector { base, .. } => base.pos(),
            Self::FuncLit(lit) => lit.pos,
            Self::Call(call) => call.func.pos(),
            Self::IntLit { pos, .. }
            | Self::FloatLit { pos, .. }
            | Self::StringLit { pos, .. }
            | Self::RuneLit { pos, .. }
            | Self::Composite { pos, .. }
            | Self::KeyValue { pos, .. }
            | Self::Paren { pos, .. }
            | Self::Index { pos, .. }
            | Self::Slice { pos, .. }
            | Self::TypeAssert { pos, .. }
            | Self::Unary { pos, .. }
            | Self::Binary { pos, .. }
            | Self::ArrayType { pos, .. }
            | Self::MapType { pos, .. }
            | Self::ChanType { pos, .. }
            | Self::FuncType { pos, .. }
            | Self::StructType { pos, .. }
            | Self::InterfaceType { pos, .. }
            | Self::VariadicType { pos, .. }
            | Self::UnionType { pos, .. }
            | Self::TildeTerm { pos, .. } => *pos,
        }
    }

    /// Unwraps any number of `(...)` wrappers.
    #[must_use]
    pub fn unparenthesized(&self) -> &Self {
        let mut expr = self;
        while let Self::Paren { inner, .. } = expr {
            expr = inner;
        }
        expr
    }
}

/// A function call; `spread` marks a trailing `...` on the last argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpr {
    pub func: Expr,
    pub args: Vec<Expr>,
    pub spread: bool,
    pub pos: Pos,
}

/// One field group in a struct type: `x, y int` or an embedded `Base`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructField {
    /// Empty for embedded (anonymous) fields.
    pub names: Vec<Ident>,
    pub ty: Expr,
    pub embedded: bool,
    pub tag: Option<String>,
    pub pos: Pos,
}

impl StructField {
    /// Name of an embedded field: the base type name with any pointer
    /// indirection and package qualifier stripped.
    #[must_use]
    pub fn embedded_name(&self) -> Option<&str> {
        fn base_name(expr: &Expr) -> Option<&str> {
            match expr {
                Expr::Ident(ident) => Some(&ident.name),
                Expr::Selector { sel, .. } => Some(&sel.name),
                Expr::Unary {
                    op: UnaryOp::Deref,
                    operand,
                    ..
                } => base_name(operand),
                Expr::Index { base, .. } => base_name(base),
                _ => None,
            }
        }
        if self.embedded { base_name(&self.ty) } else { None }
    }
}

/// An interface body element: a required method or an embedded
/// interface/constraint expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InterfaceElem {
    Method { name: Ident, sig: FuncSig },
    Embed(Expr),
}

/// A single parameter (or result) with an optional name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: Option<Ident>,
    pub ty: Expr,
}

/// A declared type parameter with its constraint expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeParam {
    pub name: Ident,
    pub constraint: Option<Expr>,
}

/// A function signature: type parameters, parameters, results.
///
/// A variadic final parameter stores its *element* type in `params` and sets
/// `variadic`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FuncSig {
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,
    pub results: Vec<Param>,
    pub variadic: bool,
}

impl FuncSig {
    /// Whether any result parameter is named (named-return semantics).
    #[must_use]
    pub fn has_named_results(&self) -> bool {
        self.results.iter().any(|r| r.name.is_some())
    }
}

/// `func(...) ... { ... }` in expression position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncLit {
    pub sig: FuncSig,
    pub body: Block,
    pub pos: Pos,
}

/// A braced statement sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub pos: Pos,
}

/// Assignment operators, including the compound arithmetic forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,
    Define,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    AndNot,
}

impl AssignOp {
    /// The binary operator a compound assignment expands to, if any.
    #[must_use]
    pub fn binary_op(self) -> Option<BinaryOp> {
        match self {
            Self::Assign | Self::Define => None,
            Self::Add => Some(BinaryOp::Add),
            Self::Sub => Some(BinaryOp::Sub),
            Self::Mul => Some(BinaryOp::Mul),
            Self::Div => Some(BinaryOp::Div),
            Self::Rem => Some(BinaryOp::Rem),
            Self::BitAnd => Some(BinaryOp::BitAnd),
            Self::BitOr => Some(BinaryOp::BitOr),
            Self::BitXor => Some(BinaryOp::BitXor),
            Self::Shl => Some(BinaryOp::Shl),
            Self::Shr => Some(BinaryOp::Shr),
            Self::AndNot => Some(BinaryOp::AndNot),
        }
    }
}

/// Statement nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Decl(Decl),
    Expr(Expr),
    Send {
        chan: Expr,
        value: Expr,
        pos: Pos,
    },
    IncDec {
        target: Expr,
        inc: bool,
        pos: Pos,
    },
    Assign {
        lhs: Vec<Expr>,
        op: AssignOp,
        rhs: Vec<Expr>,
        pos: Pos,
    },
    Return {
        results: Vec<Expr>,
        pos: Pos,
    },
    If(Box<IfStmt>),
    For(Box<ForStmt>),
    Range(Box<RangeStmt>),
    Switch(Box<SwitchStmt>),
    TypeSwitch(Box<TypeSwitchStmt>),
    Block(Block),
    Defer {
        call: Expr,
        pos: Pos,
    },
    Go {
        call: Expr,
        pos: Pos,
    },
    Break {
        label: Option<Ident>,
        pos: Pos,
    },
    Continue {
        label: Option<Ident>,
        pos: Pos,
    },
    Labeled {
        label: Ident,
        stmt: Box<Stmt>,
        pos: Pos,
    },
    Fallthrough {
        pos: Pos,
    },
    Empty {
        pos: Pos,
    },
}

impl Stmt {
    /// The position of the statement's first token.
    #[must_use]
    pub fn pos(&self) -> Pos {
        match self {
            Self::Decl(decl) => decl.pos(),
            Self::Expr(expr) => expr.pos(),
            Self::If(stmt) => stmt.pos,
            Self::For(stmt) => stmt.pos,
            Self::Range(stmt) => stmt.pos,
            Self::Switch(stmt) => stmt.pos,
            Self::TypeSwitch(stmt) => stmt.pos,
            Self::Block(block) => block.pos,
            Self::Send { pos, .. }
            | Self::IncDec { pos, .. }
            | Self::Assign { pos, .. }
            | Self::Return { pos, .. }
            | Self::Defer { pos, .. }
            | Self::Go { pos, .. }
            | Self::Break { pos, .. }
            | Self::Continue { pos, .. }
            | Self::Labeled { pos, .. }
            | Self::Fallthrough { pos }
            | Self::Empty { pos } => *pos,
        }
    }
}

/// `if` with optional init statement and `else` branch (block or nested if).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStmt {
    pub init: Option<Stmt>,
    pub cond: Expr,
    pub then: Block,
    pub else_branch: Option<Stmt>,
    pub pos: Pos,
}

/// Three-clause or condition-only `for`; all clauses optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForStmt {
    pub init: Option<Stmt>,
    pub cond: Option<Expr>,
    pub post: Option<Stmt>,
    pub body: Block,
    pub pos: Pos,
}

/// `for k, v := range subject { ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeStmt {
    pub key: Option<Expr>,
    pub value: Option<Expr>,
    /// `:=` vs `=` binding of the loop variables.
    pub define: bool,
    pub subject: Expr,
    pub body: Block,
    pub pos: Pos,
}

/// One `case`/`default` clause; `exprs` is empty for `default`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseClause {
    pub exprs: Vec<Expr>,
    pub body: Vec<Stmt>,
    pub pos: Pos,
}

/// Expression switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchStmt {
    pub init: Option<Stmt>,
    pub tag: Option<Expr>,
    pub cases: Vec<CaseClause>,
    pub pos: Pos,
}

/// `switch v := x.(type) { ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeSwitchStmt {
    pub init: Option<Stmt>,
    pub bind: Option<Ident>,
    pub subject: Expr,
    pub cases: Vec<CaseClause>,
    pub pos: Pos,
}

/// Declarations, usable at top level and (except `func`) inside blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Decl {
    Func(Box<FuncDecl>),
    Type(Vec<TypeSpec>),
    Var(VarGroup),
    Const(VarGroup),
}

impl Decl {
    /// The position of the declaration's first token.
    #[must_use]
    pub fn pos(&self) -> Pos {
        match self {
            Self::Func(decl) => decl.pos,
            Self::Type(specs) => specs.first().map_or(Pos::NONE, |s| s.pos),
            Self::Var(group) | Self::Const(group) => group.pos,
        }
    }
}

/// A function or method declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncDecl {
    pub recv: Option<Receiver>,
    pub name: Ident,
    pub sig: FuncSig,
    /// `None` for bodyless declarations (assembly/external stubs).
    pub body: Option<Block>,
    pub pos: Pos,
}

/// A method receiver: `(r *T)` or `(r T)`, with any receiver type
/// parameters (`(r List[T])`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receiver {
    pub name: Option<Ident>,
    pub type_name: Ident,
    pub pointer: bool,
    pub type_params: Vec<Ident>,
    pub pos: Pos,
}

/// One spec in a `type` declaration; `alias` marks `type A = B`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeSpec {
    pub name: Ident,
    pub type_params: Vec<TypeParam>,
    pub alias: bool,
    pub ty: Expr,
    pub pos: Pos,
}

/// A `var` or `const` group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarGroup {
    pub specs: Vec<VarSpec>,
    pub pos: Pos,
}

/// `names [type] [= values]`; in const groups a spec with no values repeats
/// the previous spec's expressions with the spec index bound to `iota`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarSpec {
    pub names: Vec<Ident>,
    pub ty: Option<Expr>,
    pub values: Vec<Expr>,
    pub pos: Pos,
}

/// One import line: `import alias "path"`, `import . "path"`, or
/// `import _ "path"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSpec {
    pub alias: Option<String>,
    pub path: String,
    pub pos: Pos,
}

impl ImportSpec {
    /// The file-local name this import binds, `None` for dot and blank
    /// imports.
    #[must_use]
    pub fn local_name(&self) -> Option<&str> {
        match self.alias.as_deref() {
            Some(".") | Some("_") => None,
            Some(alias) => Some(alias),
            None => Some(self.path.rsplit('/').next().unwrap_or(&self.path)),
        }
    }

    #[must_use]
    pub fn is_dot(&self) -> bool {
        self.alias.as_deref() == Some(".")
    }
}

/// A parsed source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    /// File name as given to the parser, used in positions and frames.
    pub name: String,
    pub package: Ident,
    pub imports: Vec<ImportSpec>,
    pub decls: Vec<Decl>,
}
