//! Substitution over annotation expressions: `e[vs := es]`.
//!
//! The calculus is closed over the reserved combinators `Implies`, `ForAll`
//! and `Exists`; any other call head is a substitution error. Quantifiers
//! shadow: pairs whose variable equals the bound identifier are pruned
//! before descending into the body. Capture of a substituend's free
//! variables by a quantifier binder is *not* repaired by alpha-renaming;
//! the WP calculus only pushes solver-fresh `u…` names under binders (see
//! the fresh-name allocator), which keeps capture from arising.

use crate::expr::{Expr, LitKind};
use std::collections::BTreeSet;
use thiserror::Error;

/// Substitution failure.
#[derive(Debug, Clone, Error)]
pub enum SubstError {
    #[error("substitution: call head '{0}' is not a supported combinator")]
    UnknownCallee(String),

    #[error("substitution: {func} expects {want} arguments, found {found}")]
    Arity {
        func: &'static str,
        want: usize,
        found: usize,
    },

    #[error("substitution: quantifier bound variable is not an identifier: {0}")]
    BadBinder(String),

    #[error("substitution: unsupported expression: {0}")]
    Unsupported(String),
}

/// Replace every occurrence of `vs[i]` in `expr` with `es[i]`.
///
/// Every `vs[i]` must be identifier-shaped; `vs` and `es` have equal
/// length. Returns a fresh expression; the input is never mutated.
/// Parenthesized nodes are recursed into and the wrapper is dropped from
/// the result.
///
/// # Errors
/// Fails on call heads other than `Implies`/`ForAll`/`Exists`, on arity
/// violations of those combinators, and on a non-identifier binder.
pub fn subst(expr: &Expr, vs: &[Expr], es: &[Expr]) -> Result<Expr, SubstError> {
    debug_assert_eq!(vs.len(), es.len());
    match expr {
        Expr::Lit { .. } => Ok(expr.clone()),
        Expr::Ident(_) => {
            for (v, e) in vs.iter().zip(es) {
                if expr == v {
                    return Ok(e.clone());
                }
            }
            Ok(expr.clone())
        }
        Expr::Unary { op, operand } => Ok(Expr::Unary {
            op: *op,
            operand: Box::new(subst(operand, vs, es)?),
        }),
        Expr::Binary { op, lhs, rhs } => Ok(Expr::Binary {
            op: *op,
            lhs: Box::new(subst(lhs, vs, es)?),
            rhs: Box::new(subst(rhs, vs, es)?),
        }),
        Expr::Paren(inner) => subst(inner, vs, es),
        Expr::Call { func, args } => match func.as_str() {
            "Implies" => {
                if args.len() != 2 {
                    return Err(SubstError::Arity {
                        func: "Implies",
                        want: 2,
                        found: args.len(),
                    });
                }
                Ok(Expr::Call {
                    func: func.clone(),
                    args: vec![subst(&args[0], vs, es)?, subst(&args[1], vs, es)?],
                })
            }
            "ForAll" | "Exists" => {
                if args.len() != 3 {
                    return Err(SubstError::Arity {
                        func: if func == "ForAll" { "ForAll" } else { "Exists" },
                        want: 3,
                        found: args.len(),
                    });
                }
                let binder = &args[0];
                let Some(bound_name) = binder_name(binder) else {
                    return Err(SubstError::BadBinder(binder.to_string()));
                };
                let (pruned_vs, pruned_es) = prune_shadowed(bound_name, vs, es);
                if pruned_vs.is_empty() {
                    return Ok(expr.clone());
                }
                Ok(Expr::Call {
                    func: func.clone(),
                    args: vec![
                        binder.clone(),
                        args[1].clone(),
                        subst(&args[2], &pruned_vs, &pruned_es)?,
                    ],
                })
            }
            other => Err(SubstError::UnknownCallee(other.to_string())),
        },
        // Index expressions never survive to a substitution site; the WP
        // calculus rejects index assignments first.
        Expr::Index { .. } | Expr::ArrayType { .. } => {
            Err(SubstError::Unsupported(expr.to_string()))
        }
    }
}

/// The name bound by a quantifier's first argument: an identifier for
/// `ForAll`, a quoted string literal for `Exists`.
fn binder_name(binder: &Expr) -> Option<&str> {
    match binder {
        Expr::Ident(name) => Some(name),
        Expr::Lit {
            kind: LitKind::Str,
            value,
        } => Some(value.trim_matches('"')),
        _ => None,
    }
}

/// Remove from `(vs, es)` every pair whose variable carries the bound name,
/// so the binder shadows outer substitutions.
fn prune_shadowed(bound_name: &str, vs: &[Expr], es: &[Expr]) -> (Vec<Expr>, Vec<Expr>) {
    let mut kept_vs = Vec::new();
    let mut kept_es = Vec::new();
    for (v, e) in vs.iter().zip(es) {
        if v.as_ident() != Some(bound_name) {
            kept_vs.push(v.clone());
            kept_es.push(e.clone());
        }
    }
    (kept_vs, kept_es)
}

/// Identifier names occurring free in `expr`. Quantifier binders are
/// excluded from their body's contribution; the bound-variable and type
/// arguments themselves are not scanned.
#[must_use]
pub fn free_vars(expr: &Expr) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect_free(expr, &mut out);
    out
}

fn collect_free(expr: &Expr, out: &mut BTreeSet<String>) {
    match expr {
        Expr::Lit { .. } => {}
        Expr::Ident(name) => {
            out.insert(name.clone());
        }
        Expr::Unary { operand, .. } => collect_free(operand, out),
        Expr::Binary { lhs, rhs, .. } => {
            collect_free(lhs, out);
            collect_free(rhs, out);
        }
        Expr::Paren(inner) => collect_free(inner, out),
        Expr::Index { base, index } => {
            collect_free(base, out);
            collect_free(index, out);
        }
        Expr::ArrayType { elem } => collect_free(elem, out),
        Expr::Call { func, args } => match (func.as_str(), args.as_slice()) {
            ("ForAll" | "Exists", [binder, _ty, body]) => {
                let mut inner = BTreeSet::new();
                collect_free(body, &mut inner);
                if let Some(name) = binder.as_ident() {
                    inner.remove(name);
                } else if let Expr::Lit {
                    kind: LitKind::Str,
                    value,
                } = binder
                {
                    inner.remove(value.trim_matches('"'));
                }
                out.extend(inner);
            }
            _ => {
                for arg in args {
                    collect_free(arg, out);
                }
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::BinOp;
    use crate::parser::parse_condition;

    fn ident(name: &str) -> Expr {
        Expr::ident(name)
    }

    // ==================== basic cases ====================

    #[test]
    fn test_literal_unchanged() {
        let lit = Expr::int(7);
        let r = subst(&lit, &[ident("x")], &[Expr::int(0)]).expect("subst");
        assert_eq!(r, lit);
    }

    #[test]
    fn test_identifier_replaced() {
        let r = subst(&ident("x"), &[ident("x")], &[Expr::int(3)]).expect("subst");
        assert_eq!(r, Expr::int(3));
    }

    #[test]
    fn test_identifier_untouched_when_not_listed() {
        let r = subst(&ident("y"), &[ident("x")], &[Expr::int(3)]).expect("subst");
        assert_eq!(r, ident("y"));
    }

    #[test]
    fn test_parallel_pairs_pick_matching_index() {
        let e = Expr::binary(BinOp::Add, ident("a"), ident("b"));
        let r = subst(
            &e,
            &[ident("a"), ident("b")],
            &[Expr::int(1), Expr::int(2)],
        )
        .expect("subst");
        assert_eq!(r.to_string(), "1 + 2");
    }

    #[test]
    fn test_binary_rebuilt_recursively() {
        let e = parse_condition("y >= 0").expect("parse");
        let r = subst(&e, &[ident("y")], &[ident("x")]).expect("subst");
        assert_eq!(r.to_string(), "x >= 0");
    }

    #[test]
    fn test_paren_dropped_from_result() {
        let e = parse_condition("(y) + 1").expect("parse");
        let r = subst(&e, &[ident("y")], &[Expr::int(5)]).expect("subst");
        // The wrapper around the substituted identifier is gone.
        assert_eq!(r, parse_condition("5 + 1").expect("parse"));
    }

    #[test]
    fn test_unknown_call_head_is_error() {
        let e = parse_condition("f(x)").expect("parse");
        let err = subst(&e, &[ident("x")], &[Expr::int(1)]).expect_err("must fail");
        assert!(matches!(err, SubstError::UnknownCallee(ref name) if name == "f"));
    }

    #[test]
    fn test_implies_arity_enforced() {
        let bad = Expr::Call {
            func: "Implies".to_string(),
            args: vec![ident("p")],
        };
        let err = subst(&bad, &[], &[]).expect_err("must fail");
        assert!(matches!(err, SubstError::Arity { want: 2, found: 1, .. }));
    }

    #[test]
    fn test_implies_substitutes_both_sides() {
        let e = parse_condition("Implies(x > 0, y > x)").expect("parse");
        let r = subst(&e, &[ident("x")], &[Expr::int(2)]).expect("subst");
        assert_eq!(r.to_string(), "Implies(2 > 0, y > 2)");
    }

    // ==================== quantifiers ====================

    #[test]
    fn test_quantifier_shadows_bound_variable() {
        // Property: subst(ForAll(x, T, body), [x], [e]) == the original.
        let e = parse_condition("ForAll(x, int, x >= 0)").expect("parse");
        let r = subst(&e, &[ident("x")], &[Expr::int(9)]).expect("subst");
        assert_eq!(r, e);
    }

    #[test]
    fn test_quantifier_substitutes_free_variables_only() {
        let e = parse_condition("ForAll(x, int, x >= lo)").expect("parse");
        let r = subst(
            &e,
            &[ident("x"), ident("lo")],
            &[Expr::int(1), Expr::int(0)],
        )
        .expect("subst");
        assert_eq!(r.to_string(), "ForAll(x, int, x >= 0)");
    }

    #[test]
    fn test_quantifier_binder_and_type_not_substituted() {
        let e = parse_condition("ForAll(u, int, u > n)").expect("parse");
        let r = subst(&e, &[ident("int"), ident("n")], &[ident("bool"), Expr::int(4)])
            .expect("subst");
        // Only the body's free occurrence changes.
        assert_eq!(r.to_string(), "ForAll(u, int, u > 4)");
    }

    #[test]
    fn test_exists_with_string_binder() {
        let e = parse_condition("Exists(\"u\", int, u > x)").expect("parse");
        let r = subst(&e, &[ident("x")], &[Expr::int(0)]).expect("subst");
        assert_eq!(r.to_string(), "Exists(\"u\", int, u > 0)");
    }

    #[test]
    fn test_exists_string_binder_shadows_by_name() {
        let e = parse_condition("Exists(\"u\", int, u > x)").expect("parse");
        let r = subst(&e, &[ident("u")], &[Expr::int(7)]).expect("subst");
        // "u" is bound here even though the binder is a string literal.
        assert_eq!(r, e);
    }

    #[test]
    fn test_quantifier_arity_enforced() {
        let bad = Expr::Call {
            func: "ForAll".to_string(),
            args: vec![ident("x"), ident("int")],
        };
        let err = subst(&bad, &[ident("x")], &[Expr::int(1)]).expect_err("must fail");
        assert!(matches!(err, SubstError::Arity { want: 3, .. }));
    }

    // ==================== substitution identity ====================

    #[test]
    fn test_identity_when_variable_absent() {
        // Property: v not free in e implies subst(e, [v], [anything]) == e.
        for text in [
            "1 + 2",
            "y >= 0",
            "Implies(a > 0, b > 0)",
            "ForAll(x, int, x >= y)",
        ] {
            let e = parse_condition(text).expect("parse");
            let r = subst(&e, &[ident("zz")], &[Expr::int(99)]).expect("subst");
            assert_eq!(r, e, "identity failed for {text}");
        }
    }

    // ==================== free variables ====================

    #[test]
    fn test_free_vars_simple() {
        let e = parse_condition("x + y * x").expect("parse");
        let fv = free_vars(&e);
        assert_eq!(fv.into_iter().collect::<Vec<_>>(), vec!["x", "y"]);
    }

    #[test]
    fn test_free_vars_quantifier_excludes_binder() {
        let e = parse_condition("ForAll(u, int, u > n)").expect("parse");
        let fv = free_vars(&e);
        assert!(fv.contains("n"));
        assert!(!fv.contains("u"));
        // The type identifier is not scanned.
        assert!(!fv.contains("int"));
    }

    #[test]
    fn test_free_vars_string_binder() {
        let e = parse_condition("Exists(\"u\", int, u > n)").expect("parse");
        let fv = free_vars(&e);
        assert!(fv.contains("n"));
        assert!(!fv.contains("u"));
    }
}
