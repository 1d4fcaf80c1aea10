//! Translation from tGo expressions to SMT-LIB 2 scripts.
//!
//! A script declares one constant per variable-environment entry, asserts
//! the translated condition, then asks for `(check-sat)` and `(get-model)`.
//! The verifier asserts *negated* VCs, so `sat` means the original
//! condition is refutable and the model is the counter-example.
//!
//! Unknown type identifiers translate to the literal text `unknown`; the
//! solver will reject the script and the driver surfaces that error.
//! Unknown call heads are translation errors here.

use crate::expr::{BinOp, Expr, LitKind, UnOp, VarEnv};
use thiserror::Error;

/// Translation failure.
#[derive(Debug, Clone, Error)]
pub enum TranslateError {
    #[error("translation: call head '{0}' is not supported")]
    UnknownCallee(String),

    #[error("translation: '{0}' is reserved but not implemented")]
    Reserved(&'static str),

    #[error("translation: malformed {func} application: {reason}")]
    Malformed {
        func: &'static str,
        reason: String,
    },

    #[error("translation: expression form not supported: {0}")]
    Unsupported(String),
}

/// Assemble the full SMT-LIB script for one condition.
///
/// # Errors
/// Propagates [`TranslateError`] from the expression translation.
pub fn make_script(vars: &VarEnv, cond: &Expr) -> Result<String, TranslateError> {
    let mut lines = Vec::new();
    for (name, ty) in vars {
        lines.push(format!("(declare-const {name} {})", translate_type(ty)));
    }
    lines.push(format!("(assert {})", translate_expr(cond)?));
    lines.push("(check-sat)".to_string());
    lines.push("(get-model)".to_string());
    // The trailing newline matters to some solvers reading from a pipe.
    Ok(lines.join("\n") + "\n")
}

/// Translate a type expression: `int`/`bool`/`string` to their SMT sorts,
/// `[]T` to `(Array Int T')`, anything else to the literal `unknown`.
#[must_use]
pub fn translate_type(ty: &Expr) -> String {
    match ty {
        Expr::Ident(name) => match name.as_str() {
            "int" => "Int".to_string(),
            "bool" => "Bool".to_string(),
            "string" => "String".to_string(),
            _ => "unknown".to_string(),
        },
        Expr::ArrayType { elem } => format!("(Array Int {})", translate_type(elem)),
        _ => "unknown".to_string(),
    }
}

/// SMT symbol for a binary operator. `Ne` maps to `=`; the caller wraps
/// the whole application in `(not …)`.
#[must_use]
pub const fn translate_bin_op(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "div",
        BinOp::Rem => "mod",
        BinOp::And => "and",
        BinOp::Or => "or",
        BinOp::Eq | BinOp::Ne => "=",
        BinOp::Lt => "<",
        BinOp::Gt => ">",
        BinOp::Le => "<=",
        BinOp::Ge => ">=",
    }
}

#[must_use]
pub const fn translate_un_op(op: UnOp) -> &'static str {
    match op {
        UnOp::Neg => "-",
        UnOp::Not => "not",
    }
}

/// Translate an expression into S-expression text.
///
/// # Errors
/// Fails on `Select`/`Store`, on any other unrecognized call head, on
/// malformed quantifier arguments, and on index/array-type nodes in
/// expression position.
pub fn translate_expr(expr: &Expr) -> Result<String, TranslateError> {
    match expr {
        Expr::Lit { value, .. } => Ok(value.clone()),
        Expr::Ident(name) => Ok(name.clone()),
        Expr::Unary { op, operand } => Ok(format!(
            "({} {})",
            translate_un_op(*op),
            translate_expr(operand)?
        )),
        Expr::Binary { op, lhs, rhs } => {
            let body = format!(
                "({} {} {})",
                translate_bin_op(*op),
                translate_expr(lhs)?,
                translate_expr(rhs)?
            );
            if *op == BinOp::Ne {
                Ok(format!("(not {body})"))
            } else {
                Ok(body)
            }
        }
        // S-expressions are self-delimiting; emitting the parens of a
        // ParenExpr would produce text the solver rejects.
        Expr::Paren(inner) => translate_expr(inner),
        Expr::Call { func, args } => match func.as_str() {
            "Implies" => {
                if args.len() != 2 {
                    return Err(TranslateError::Malformed {
                        func: "Implies",
                        reason: format!("expected 2 arguments, found {}", args.len()),
                    });
                }
                Ok(format!(
                    "(=> {} {})",
                    translate_expr(&args[0])?,
                    translate_expr(&args[1])?
                ))
            }
            "ForAll" => {
                let (name, ty, body) = quantifier_parts("ForAll", args)?;
                let Some(bound) = name.as_ident() else {
                    return Err(TranslateError::Malformed {
                        func: "ForAll",
                        reason: "bound variable must be an identifier".to_string(),
                    });
                };
                Ok(format!(
                    "(forall (({bound} {})) {})",
                    translate_type(ty),
                    translate_expr(body)?
                ))
            }
            "Exists" => {
                let (name, ty, body) = quantifier_parts("Exists", args)?;
                let Expr::Lit {
                    kind: LitKind::Str,
                    value,
                } = name
                else {
                    return Err(TranslateError::Malformed {
                        func: "Exists",
                        reason: "bound variable must be a string literal".to_string(),
                    });
                };
                let bound = value.trim_matches('"');
                Ok(format!(
                    "(exists (({bound} {})) {})",
                    translate_type(ty),
                    translate_expr(body)?
                ))
            }
            "Select" => Err(TranslateError::Reserved("Select")),
            "Store" => Err(TranslateError::Reserved("Store")),
            other => Err(TranslateError::UnknownCallee(other.to_string())),
        },
        Expr::Index { .. } | Expr::ArrayType { .. } => {
            Err(TranslateError::Unsupported(expr.to_string()))
        }
    }
}

fn quantifier_parts<'a>(
    func: &'static str,
    args: &'a [Expr],
) -> Result<(&'a Expr, &'a Expr, &'a Expr), TranslateError> {
    if args.len() != 3 {
        return Err(TranslateError::Malformed {
            func,
            reason: format!("expected 3 arguments, found {}", args.len()),
        });
    }
    Ok((&args[0], &args[1], &args[2]))
}
