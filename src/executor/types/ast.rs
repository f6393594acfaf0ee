//! Flow syntax tree.
//!
//! Every node carries the [`Span`] it was parsed from; tracebacks only need
//! the line, the syntax-error caret needs the column.

/// Where a node sits in its source. Lines and columns are 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl Span {
    pub fn new(
        start: usize,
        end: usize,
        start_line: usize,
        start_col: usize,
        end_line: usize,
        end_col: usize,
    ) -> Self {
        Self {
            start,
            end,
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Smallest span holding both
    pub fn merge(&self, other: &Span) -> Span {
        let (first, last) = match (self.start <= other.start, self.end >= other.end) {
            (true, true) => (self, self),
            (true, false) => (self, other),
            (false, true) => (other, self),
            (false, false) => (other, other),
        };
        Span::new(
            first.start,
            last.end,
            first.start_line,
            first.start_col,
            last.end_line,
            last.end_col,
        )
    }

    /// 1-based line number, as shown in tracebacks
    pub fn line(&self) -> usize {
        self.start_line + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Let,
    Const,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForLoopKind {
    /// `for (let k in obj)` walks keys
    In,
    /// `for (let v of list)` walks values
    Of,
}

/// Left-hand side of `let`/`const`
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Name(String),
    /// `{ a, b }`: pull fields out of an object or module
    Fields(Vec<String>),
}

/// One step of an assignment target such as `obj.items[0]`
#[derive(Debug, Clone)]
pub enum PathSegment {
    Field(String),
    Index(Expr),
}

/// A single name pulled in by `from m import a, b`
#[derive(Debug, Clone)]
pub struct ImportName {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Block {
        body: Vec<Stmt>,
        span: Span,
    },
    Declare {
        var_kind: VarKind,
        target: Binding,
        init: Option<Expr>,
        span: Span,
    },
    Assign {
        var: String,
        path: Vec<PathSegment>,
        value: Expr,
        span: Span,
    },
    If {
        test: Expr,
        then_s: Box<Stmt>,
        else_s: Option<Box<Stmt>>,
        span: Span,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    ForLoop {
        kind: ForLoopKind,
        binding: String,
        iterable: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    Try {
        body: Box<Stmt>,
        catch_var: String,
        catch_body: Box<Stmt>,
        span: Span,
    },
    /// `import m` / `import m as alias`
    Import {
        module: String,
        alias: Option<String>,
        span: Span,
    },
    /// `from m import a, b`
    FromImport {
        module: String,
        names: Vec<ImportName>,
        span: Span,
    },
    Expr {
        expr: Expr,
        span: Span,
    },
    Break {
        span: Span,
    },
    Continue {
        span: Span,
    },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Block { span, .. }
            | Stmt::Declare { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::ForLoop { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Try { span, .. }
            | Stmt::Import { span, .. }
            | Stmt::FromImport { span, .. }
            | Stmt::Expr { span, .. }
            | Stmt::Break { span }
            | Stmt::Continue { span } => *span,
        }
    }

    /// Whether an `await` appears anywhere inside this statement
    pub fn contains_await(&self) -> bool {
        match self {
            Stmt::Block { body, .. } => body.iter().any(Stmt::contains_await),
            Stmt::Declare { init, .. } => init.as_ref().is_some_and(Expr::contains_await),
            Stmt::Assign { path, value, .. } => {
                value.contains_await()
                    || path.iter().any(|segment| match segment {
                        PathSegment::Index(expr) => expr.contains_await(),
                        PathSegment::Field(_) => false,
                    })
            }
            Stmt::If {
                test,
                then_s,
                else_s,
                ..
            } => {
                test.contains_await()
                    || then_s.contains_await()
                    || else_s.as_ref().is_some_and(|s| s.contains_await())
            }
            Stmt::While { test, body, .. } => test.contains_await() || body.contains_await(),
            Stmt::ForLoop { iterable, body, .. } => {
                iterable.contains_await() || body.contains_await()
            }
            Stmt::Return { value, .. } => value.as_ref().is_some_and(Expr::contains_await),
            Stmt::Try {
                body, catch_body, ..
            } => body.contains_await() || catch_body.contains_await(),
            Stmt::Expr { expr, .. } => expr.contains_await(),
            Stmt::Import { .. }
            | Stmt::FromImport { .. }
            | Stmt::Break { .. }
            | Stmt::Continue { .. } => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,     // &&
    Or,      // ||
    Nullish, // ??
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Nullish => "??",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not, // !
    Neg, // -
}

#[derive(Debug, Clone)]
pub enum Expr {
    LitBool {
        v: bool,
        span: Span,
    },
    LitNum {
        v: f64,
        span: Span,
    },
    LitStr {
        v: String,
        span: Span,
    },
    LitNull {
        span: Span,
    },
    LitList {
        elements: Vec<Expr>,
        span: Span,
    },
    LitObj {
        /// In source order
        properties: Vec<(String, Expr)>,
        span: Span,
    },
    Ident {
        name: String,
        span: Span,
    },
    Member {
        object: Box<Expr>,
        property: String,
        optional: bool,
        span: Span,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    Await {
        inner: Box<Expr>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },
    BinaryOp {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Ternary {
        condition: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::LitBool { span, .. }
            | Expr::LitNum { span, .. }
            | Expr::LitStr { span, .. }
            | Expr::LitNull { span }
            | Expr::LitList { span, .. }
            | Expr::LitObj { span, .. }
            | Expr::Ident { span, .. }
            | Expr::Member { span, .. }
            | Expr::Index { span, .. }
            | Expr::Call { span, .. }
            | Expr::Await { span, .. }
            | Expr::Unary { span, .. }
            | Expr::BinaryOp { span, .. }
            | Expr::Ternary { span, .. } => *span,
        }
    }

    pub fn contains_await(&self) -> bool {
        match self {
            Expr::Await { .. } => true,
            Expr::LitBool { .. }
            | Expr::LitNum { .. }
            | Expr::LitStr { .. }
            | Expr::LitNull { .. }
            | Expr::Ident { .. } => false,
            Expr::LitList { elements, .. } => elements.iter().any(Expr::contains_await),
            Expr::LitObj { properties, .. } => properties.iter().any(|(_, v)| v.contains_await()),
            Expr::Member { object, .. } => object.contains_await(),
            Expr::Index { object, index, .. } => object.contains_await() || index.contains_await(),
            Expr::Call { callee, args, .. } => {
                callee.contains_await() || args.iter().any(Expr::contains_await)
            }
            Expr::Unary { operand, .. } => operand.contains_await(),
            Expr::BinaryOp { left, right, .. } => left.contains_await() || right.contains_await(),
            Expr::Ternary {
                condition,
                consequent,
                alternate,
                ..
            } => {
                condition.contains_await() || consequent.contains_await() || alternate.contains_await()
            }
        }
    }
}
