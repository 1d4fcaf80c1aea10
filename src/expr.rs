//! Expressions, statements and declarations of the tGo surface language.
//!
//! These are the AST nodes the verifier computes over. Annotation bodies
//! (`PRE`/`POST`/`INV` strings) parse into the same `Expr` type, extended
//! with the reserved logical combinators `Implies`, `ForAll` and `Exists`
//! which appear as ordinary calls.

use serde::{Deserialize, Serialize};

/// Literal kinds admitted by the calculus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LitKind {
    Int,
    Str,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    /// Arithmetic negation `-`
    Neg,
    /// Logical negation `!`
    Not,
}

impl UnOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Not => "!",
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::And => "&&",
            Self::Or => "||",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// An expression in the tGo AST.
///
/// Structural equality is the derived one: same variant, equal children.
/// Identifiers compare by name, literals by kind plus textual value, calls
/// by callee name and pointwise-equal argument lists. `Paren` is a distinct
/// variant and is *not* stripped by equality; callers wanting normalized
/// comparison must strip it themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    /// Integer or string literal. `value` is the literal's textual form;
    /// string literals keep their enclosing double quotes.
    Lit { kind: LitKind, value: String },
    /// Variable or type name reference.
    Ident(String),
    Unary { op: UnOp, operand: Box<Expr> },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Parenthesized expression. Transparent to the emitter and to
    /// substitution results, significant to equality.
    Paren(Box<Expr>),
    /// Array indexing `a[i]`. Recognized by the parser so that the WP
    /// calculus can reject index assignments explicitly.
    Index { base: Box<Expr>, index: Box<Expr> },
    /// Call expression. The head is one of the reserved combinators
    /// (`Implies`, `ForAll`, `Exists`, `Select`, `Store`) or an
    /// uninterpreted user procedure.
    Call { func: String, args: Vec<Expr> },
    /// Array type expression `[]T` (occurs in type position only).
    ArrayType { elem: Box<Expr> },
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Self::Ident(name.into())
    }

    #[must_use]
    pub fn int(value: i64) -> Self {
        Self::Lit {
            kind: LitKind::Int,
            value: value.to_string(),
        }
    }

    /// String literal from unquoted content.
    pub fn str_lit(content: impl AsRef<str>) -> Self {
        Self::Lit {
            kind: LitKind::Str,
            value: format!("\"{}\"", content.as_ref()),
        }
    }

    /// The identifier name, if this node is an identifier.
    #[must_use]
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Self::Ident(name) => Some(name),
            _ => None,
        }
    }

    #[must_use]
    pub fn unary(op: UnOp, operand: Self) -> Self {
        Self::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    #[must_use]
    pub fn binary(op: BinOp, lhs: Self, rhs: Self) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::binary(BinOp::And, self, other)
    }

    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::binary(BinOp::Or, self, other)
    }

    #[must_use]
    pub fn not(self) -> Self {
        Self::unary(UnOp::Not, self)
    }

    /// `Implies(self, other)` as a reserved call.
    #[must_use]
    pub fn implies(self, other: Self) -> Self {
        Self::Call {
            func: "Implies".to_string(),
            args: vec![self, other],
        }
    }

    /// `ForAll(var, ty, self)` as a reserved call. The bound variable is an
    /// identifier argument.
    #[must_use]
    pub fn forall(var: Self, ty: Self, body: Self) -> Self {
        Self::Call {
            func: "ForAll".to_string(),
            args: vec![var, ty, body],
        }
    }

    /// `Exists("var", ty, self)` as a reserved call. The bound variable is a
    /// string-literal argument, mirroring the annotation sub-language.
    #[must_use]
    pub fn exists(var: Self, ty: Self, body: Self) -> Self {
        Self::Call {
            func: "Exists".to_string(),
            args: vec![var, ty, body],
        }
    }
}

/// The variable environment threaded through the WP traversal: identifier
/// name to type expression. Ordered so that emitted scripts declare
/// constants deterministically.
pub type VarEnv = std::collections::BTreeMap<String, Expr>;

/// A statement in a procedure body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// Parallel assignment `x1, …, xn = e1, …, en`.
    Assign { lhs: Vec<Expr>, rhs: Vec<Expr> },
    /// Variable declaration `var x, y T`.
    Decl { names: Vec<String>, ty: Expr },
    If {
        cond: Expr,
        then_block: Vec<Stmt>,
        else_stmt: Option<Box<Stmt>>,
    },
    /// Condition-only loop `for c { … }`; the body carries the `INV`
    /// annotation as an ordinary statement.
    For { cond: Expr, body: Vec<Stmt> },
    Block(Vec<Stmt>),
    Return,
    /// Expression statement; must be a call (annotation markers included).
    Expr(Expr),
}

/// A procedure parameter: name and type expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: Expr,
}

/// A procedure declaration with named inputs and outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncDecl {
    pub name: String,
    pub inputs: Vec<Param>,
    pub outputs: Vec<Param>,
    pub body: Vec<Stmt>,
}

/// A parsed source file: the ordered top-level procedure declarations.
#[derive(Debug, Clone, Default)]
pub struct SourceFile {
    pub decls: Vec<FuncDecl>,
}

impl SourceFile {
    /// Look up a top-level procedure by name.
    #[must_use]
    pub fn func(&self, name: &str) -> Option<&FuncDecl> {
        self.decls.iter().find(|d| d.name == name)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ExprPrec {
    Lowest = 0,
    Or = 1,
    And = 2,
    Cmp = 3,
    Add = 4,
    Mul = 5,
    Unary = 6,
    Postfix = 7,
}

impl ExprPrec {
    const fn next_tighter(self) -> Self {
        match self {
            Self::Lowest => Self::Or,
            Self::Or => Self::And,
            Self::And => Self::Cmp,
            Self::Cmp => Self::Add,
            Self::Add => Self::Mul,
            Self::Mul => Self::Unary,
            Self::Unary | Self::Postfix => Self::Postfix,
        }
    }
}

const fn bin_prec(op: BinOp) -> (ExprPrec, bool) {
    // (precedence, associative)
    match op {
        BinOp::Or => (ExprPrec::Or, true),
        BinOp::And => (ExprPrec::And, true),
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            (ExprPrec::Cmp, false)
        }
        BinOp::Add => (ExprPrec::Add, true),
        BinOp::Sub => (ExprPrec::Add, false),
        BinOp::Mul => (ExprPrec::Mul, true),
        BinOp::Div | BinOp::Rem => (ExprPrec::Mul, false),
    }
}

const fn expr_prec(e: &Expr) -> ExprPrec {
    match e {
        Expr::Binary { op, .. } => bin_prec(*op).0,
        Expr::Unary { .. } => ExprPrec::Unary,
        Expr::Index { .. } | Expr::Call { .. } => ExprPrec::Postfix,
        Expr::Lit { .. } | Expr::Ident(_) | Expr::Paren(_) | Expr::ArrayType { .. } => {
            ExprPrec::Postfix
        }
    }
}

fn fmt_expr(e: &Expr, parent_prec: ExprPrec, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let prec = expr_prec(e);
    let needs_parens = prec < parent_prec;
    if needs_parens {
        write!(f, "(")?;
    }

    match e {
        Expr::Lit { value, .. } => write!(f, "{value}")?,
        Expr::Ident(name) => write!(f, "{name}")?,
        Expr::Unary { op, operand } => {
            write!(f, "{}", op.symbol())?;
            fmt_expr(operand, ExprPrec::Unary, f)?;
        }
        Expr::Binary { op, lhs, rhs } => {
            let (prec, associative) = bin_prec(*op);
            fmt_expr(lhs, prec, f)?;
            write!(f, " {} ", op.symbol())?;
            let rhs_parent = if associative { prec } else { prec.next_tighter() };
            let rhs_prec = expr_prec(rhs);
            if rhs_prec < rhs_parent || (!associative && rhs_prec == prec) {
                write!(f, "(")?;
                fmt_expr(rhs, ExprPrec::Lowest, f)?;
                write!(f, ")")?;
            } else {
                fmt_expr(rhs, rhs_parent, f)?;
            }
        }
        Expr::Paren(inner) => {
            write!(f, "(")?;
            fmt_expr(inner, ExprPrec::Lowest, f)?;
            write!(f, ")")?;
        }
        Expr::Index { base, index } => {
            fmt_expr(base, ExprPrec::Postfix, f)?;
            write!(f, "[")?;
            fmt_expr(index, ExprPrec::Lowest, f)?;
            write!(f, "]")?;
        }
        Expr::Call { func, args } => {
            write!(f, "{func}(")?;
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                fmt_expr(arg, ExprPrec::Lowest, f)?;
            }
            write!(f, ")")?;
        }
        Expr::ArrayType { elem } => {
            write!(f, "[]")?;
            fmt_expr(elem, ExprPrec::Postfix, f)?;
        }
    }

    if needs_parens {
        write!(f, ")")?;
    }
    Ok(())
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt_expr(self, ExprPrec::Lowest, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let x = Expr::ident("x");
        assert!(matches!(x, Expr::Ident(ref n) if n == "x"));

        let lit = Expr::int(42);
        assert!(matches!(lit, Expr::Lit { kind: LitKind::Int, ref value } if value == "42"));

        let s = Expr::str_lit("abc");
        assert!(matches!(s, Expr::Lit { kind: LitKind::Str, ref value } if value == "\"abc\""));

        let conj = Expr::ident("a").and(Expr::ident("b"));
        assert!(matches!(conj, Expr::Binary { op: BinOp::And, .. }));

        let imp = Expr::ident("p").implies(Expr::ident("q"));
        assert!(matches!(imp, Expr::Call { ref func, ref args } if func == "Implies" && args.len() == 2));
    }

    #[test]
    fn test_structural_equality_identifiers_and_literals() {
        assert_eq!(Expr::ident("x"), Expr::ident("x"));
        assert_ne!(Expr::ident("x"), Expr::ident("y"));
        assert_eq!(Expr::int(1), Expr::int(1));
        // Same text, different kind: not equal.
        assert_ne!(
            Expr::Lit {
                kind: LitKind::Int,
                value: "1".to_string()
            },
            Expr::Lit {
                kind: LitKind::Str,
                value: "1".to_string()
            }
        );
    }

    #[test]
    fn test_equality_does_not_strip_parens() {
        let bare = Expr::ident("x");
        let wrapped = Expr::Paren(Box::new(Expr::ident("x")));
        assert_ne!(bare, wrapped);
    }

    #[test]
    fn test_equality_operand_order_significant() {
        let xy = Expr::binary(BinOp::Add, Expr::ident("x"), Expr::ident("y"));
        let yx = Expr::binary(BinOp::Add, Expr::ident("y"), Expr::ident("x"));
        assert_ne!(xy, yx);
    }

    #[test]
    fn test_call_equality_requires_pointwise_args() {
        let one_arg = Expr::Call {
            func: "f".to_string(),
            args: vec![Expr::ident("x")],
        };
        let two_args = Expr::Call {
            func: "f".to_string(),
            args: vec![Expr::ident("x"), Expr::ident("y")],
        };
        // Argument lists of different length are never equal.
        assert_ne!(one_arg, two_args);

        let same = Expr::Call {
            func: "f".to_string(),
            args: vec![Expr::ident("x")],
        };
        assert_eq!(one_arg, same);
    }

    #[test]
    fn test_display_minimal_parens() {
        let e = Expr::binary(BinOp::Gt, Expr::ident("age"), Expr::int(18));
        assert_eq!(e.to_string(), "age > 18");

        let e = Expr::ident("a").and(Expr::ident("b")).or(Expr::ident("c"));
        assert_eq!(e.to_string(), "a && b || c");

        let e = Expr::binary(
            BinOp::Mul,
            Expr::binary(BinOp::Add, Expr::ident("x"), Expr::int(1)),
            Expr::int(2),
        );
        assert_eq!(e.to_string(), "(x + 1) * 2");
    }

    #[test]
    fn test_display_non_associative_rhs() {
        // a - (b - c) must keep its parentheses.
        let e = Expr::binary(
            BinOp::Sub,
            Expr::ident("a"),
            Expr::binary(BinOp::Sub, Expr::ident("b"), Expr::ident("c")),
        );
        assert_eq!(e.to_string(), "a - (b - c)");
    }

    #[test]
    fn test_display_explicit_paren_node() {
        let e = Expr::Paren(Box::new(Expr::ident("x")));
        assert_eq!(e.to_string(), "(x)");
    }

    #[test]
    fn test_display_unary_and_call() {
        let e = Expr::unary(
            UnOp::Not,
            Expr::Paren(Box::new(Expr::binary(
                BinOp::Ge,
                Expr::ident("x"),
                Expr::int(0),
            ))),
        );
        assert_eq!(e.to_string(), "!(x >= 0)");

        let e = Expr::forall(
            Expr::ident("u"),
            Expr::ident("int"),
            Expr::binary(BinOp::Ge, Expr::ident("u"), Expr::int(0)),
        );
        assert_eq!(e.to_string(), "ForAll(u, int, u >= 0)");
    }

    #[test]
    fn test_display_array_type_and_index() {
        let ty = Expr::ArrayType {
            elem: Box::new(Expr::ident("int")),
        };
        assert_eq!(ty.to_string(), "[]int");

        let ix = Expr::Index {
            base: Box::new(Expr::ident("a")),
            index: Box::new(Expr::ident("i")),
        };
        assert_eq!(ix.to_string(), "a[i]");
    }

    #[test]
    fn test_source_file_lookup() {
        let file = SourceFile {
            decls: vec![FuncDecl {
                name: "abs".to_string(),
                inputs: vec![Param {
                    name: "x".to_string(),
                    ty: Expr::ident("int"),
                }],
                outputs: vec![Param {
                    name: "y".to_string(),
                    ty: Expr::ident("int"),
                }],
                body: vec![],
            }],
        };
        assert!(file.func("abs").is_some());
        assert!(file.func("missing").is_none());
    }

    #[test]
    fn test_serialization_round_trip() {
        let expr = Expr::ident("x").and(Expr::int(1));
        let json = serde_json::to_string(&expr).expect("serialize");
        let parsed: Expr = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, expr);
    }
}
