//! Weakest precondition calculus.
//!
//! Computes, for a statement `S` and postcondition `P`, the weakest
//! predicate `wp(S, P)` such that running `S` from any state satisfying
//! `wp(S, P)` ends in a state satisfying `P` (partial correctness;
//! termination is assumed).
//!
//! ## WP rules
//!
//! - **Assignment**: `wp(x := e, P) = P[x := e]` (parallel form included)
//! - **Sequence**: fold right-to-left, `wp(S1; S2, P) = wp(S1, wp(S2, P))`
//! - **Branch**: `wp(if c then S1 else S2, P) =
//!   (c && wp(S1, P)) || (!c && wp(S2, P))`
//! - **Loop**: `wp(for c { INV(I); body }, P) = I`, emitting the side
//!   conditions `(I && c) => wp(body, I)` and `(I && !c) => P`
//! - **Return**: identity
//! - **Call**: summarized by the callee's cached contract; results of a
//!   call-with-assignment are generalized through fresh universally
//!   quantified shadows
//!
//! A procedure's VC list is the negation of `PRE => wp(body, POST)`
//! followed by the negated loop side conditions; each is handed to the
//! solver so that `sat` exhibits a counter-example.

use crate::cache::{CacheError, ContractCache};
use crate::contract::ContractError;
use crate::expr::{Expr, FuncDecl, LitKind, Stmt, VarEnv};
use crate::parser::{parse_condition, ParseError};
use crate::subst::{free_vars, subst, SubstError};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// WP computation failure.
#[derive(Debug, Error)]
pub enum WpError {
    #[error("procedure '{func}' has no {tag} annotation")]
    MissingAnnotation { func: String, tag: &'static str },

    #[error("loop has no INV annotation")]
    MissingInvariant,

    #[error("duplicate {tag} annotation")]
    DuplicateAnnotation { tag: String },

    #[error("{tag} annotation expects a single string-literal argument")]
    AnnotationArg { tag: String },

    #[error("{tag} annotation body does not parse: {source}")]
    BadAnnotation {
        tag: String,
        #[source]
        source: ParseError,
    },

    #[error("array-index assignment is not implemented: {target}")]
    IndexAssignment { target: String },

    #[error("assignment target is not an identifier: {target}")]
    NonIdentTarget { target: String },

    #[error("assignment mixes a call with other values: {call}")]
    MultiAssignCall { call: String },

    #[error("assignment count mismatch: {targets} targets, {values} values")]
    AssignCountMismatch { targets: usize, values: usize },

    #[error("expression statement must be a call: {0}")]
    ExprStmtNotCall(String),

    #[error("call to '{func}': expected {want} {what}, found {found}")]
    ArityMismatch {
        func: String,
        what: &'static str,
        want: usize,
        found: usize,
    },

    #[error(transparent)]
    Subst(#[from] SubstError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Contract(#[from] ContractError),
}

/// The verification conditions derived for one procedure.
#[derive(Debug)]
pub struct FunctionVcs {
    /// Negated conditions, primary VC first, in discharge order.
    pub conds: Vec<Expr>,
    /// Parsed `PRE`, kept for persistence and diagnostics.
    pub pre: Expr,
    /// Parsed `POST`.
    pub post: Expr,
    /// The variable environment after traversal; declares the script
    /// constants.
    pub vars: VarEnv,
}

/// Monotonic fresh-name allocator for call-result shadows.
///
/// Replaces a randomized scheme whose collision probability grows with the
/// number of call sites: candidates are `u00000`, `u00001`, … and any
/// candidate colliding with the avoid-set is skipped.
#[derive(Debug, Default)]
struct FreshNames {
    next: u32,
}

impl FreshNames {
    fn fresh(&mut self, avoid: &BTreeSet<String>) -> String {
        loop {
            let name = format!("u{:05}", self.next);
            self.next += 1;
            if !avoid.contains(&name) {
                return name;
            }
        }
    }
}

struct WpContext<'a> {
    cache: &'a mut ContractCache,
    ignore_funcs: &'a [String],
    vars: VarEnv,
    side_vcs: Vec<Expr>,
    fresh: FreshNames,
}

/// Derive the VCs for one annotated procedure.
///
/// # Errors
/// Structural errors (annotations), unsupported statement forms, contract
/// lookup failures, and substitution failures all surface here with the
/// offending construct rendered in the message.
pub fn function_vcs(
    decl: &FuncDecl,
    cache: &mut ContractCache,
    ignore_funcs: &[String],
) -> Result<FunctionVcs, WpError> {
    let (mut asserts, stmts) = separate_annotations(&decl.body)?;

    let pre = asserts
        .remove("PRE")
        .ok_or_else(|| WpError::MissingAnnotation {
            func: decl.name.clone(),
            tag: "PRE",
        })?;
    let post = asserts
        .remove("POST")
        .ok_or_else(|| WpError::MissingAnnotation {
            func: decl.name.clone(),
            tag: "POST",
        })?;

    let mut vars = VarEnv::new();
    for param in decl.inputs.iter().chain(&decl.outputs) {
        vars.insert(param.name.clone(), param.ty.clone());
    }

    let mut ctx = WpContext {
        cache,
        ignore_funcs,
        vars,
        side_vcs: Vec::new(),
        fresh: FreshNames::default(),
    };

    let wp = wp_stmts(&mut ctx, &stmts, post.clone())?;

    let mut conds = vec![pre.clone().implies(wp).not()];
    for side in ctx.side_vcs {
        conds.push(side.not());
    }

    Ok(FunctionVcs {
        conds,
        pre,
        post,
        vars: ctx.vars,
    })
}

/// Split a statement list into its annotations and the ordinary
/// statements, rejecting duplicate tags.
fn separate_annotations<'a>(
    stmts: &'a [Stmt],
) -> Result<(BTreeMap<&'static str, Expr>, Vec<&'a Stmt>), WpError> {
    let mut asserts = BTreeMap::new();
    let mut rest = Vec::new();
    for stmt in stmts {
        match annotation(stmt)? {
            Some((tag, cond)) => {
                if asserts.insert(tag, cond).is_some() {
                    return Err(WpError::DuplicateAnnotation {
                        tag: tag.to_string(),
                    });
                }
            }
            None => rest.push(stmt),
        }
    }
    Ok((asserts, rest))
}

/// Recognize `PRE("…")` / `POST("…")` / `INV("…")` and re-parse the
/// string-literal body as a condition.
fn annotation(stmt: &Stmt) -> Result<Option<(&'static str, Expr)>, WpError> {
    let Stmt::Expr(Expr::Call { func, args }) = stmt else {
        return Ok(None);
    };
    let tag = match func.as_str() {
        "PRE" => "PRE",
        "POST" => "POST",
        "INV" => "INV",
        _ => return Ok(None),
    };
    let [Expr::Lit {
        kind: LitKind::Str,
        value,
    }] = args.as_slice()
    else {
        return Err(WpError::AnnotationArg {
            tag: tag.to_string(),
        });
    };
    let body = value.trim_matches('"');
    let cond = parse_condition(body).map_err(|source| WpError::BadAnnotation {
        tag: tag.to_string(),
        source,
    })?;
    Ok(Some((tag, cond)))
}

fn wp_stmts(ctx: &mut WpContext<'_>, stmts: &[&Stmt], post: Expr) -> Result<Expr, WpError> {
    let mut pre = post;
    for stmt in stmts.iter().rev() {
        pre = wp_stmt(ctx, stmt, pre)?;
    }
    Ok(pre)
}

fn wp_stmt(ctx: &mut WpContext<'_>, stmt: &Stmt, post: Expr) -> Result<Expr, WpError> {
    match stmt {
        Stmt::Assign { lhs, rhs } => wp_assign(ctx, lhs, rhs, post),
        Stmt::Decl { names, ty } => {
            for name in names {
                ctx.vars.insert(name.clone(), ty.clone());
            }
            Ok(post)
        }
        Stmt::If {
            cond,
            then_block,
            else_stmt,
        } => wp_if(ctx, cond, then_block, else_stmt.as_deref(), post),
        Stmt::For { cond, body } => wp_for(ctx, cond, body, post),
        Stmt::Block(stmts) => {
            let refs: Vec<&Stmt> = stmts.iter().collect();
            wp_stmts(ctx, &refs, post)
        }
        Stmt::Return => Ok(post),
        Stmt::Expr(expr) => match expr {
            Expr::Call { func, args } => wp_call_stmt(ctx, func, args, post),
            other => Err(WpError::ExprStmtNotCall(other.to_string())),
        },
    }
}

fn wp_assign(
    ctx: &mut WpContext<'_>,
    lhs: &[Expr],
    rhs: &[Expr],
    post: Expr,
) -> Result<Expr, WpError> {
    if let [target @ Expr::Index { .. }] = lhs {
        return Err(WpError::IndexAssignment {
            target: target.to_string(),
        });
    }
    for target in lhs {
        if target.as_ident().is_none() {
            return Err(WpError::NonIdentTarget {
                target: target.to_string(),
            });
        }
    }

    // A single call on the right distributes the callee's contract over
    // the assigned results.
    if let [Expr::Call { func, args }] = rhs {
        return wp_call_assign(ctx, lhs, func, args, post);
    }

    for value in rhs {
        if matches!(value, Expr::Call { .. }) {
            return Err(WpError::MultiAssignCall {
                call: value.to_string(),
            });
        }
    }
    if lhs.len() != rhs.len() {
        return Err(WpError::AssignCountMismatch {
            targets: lhs.len(),
            values: rhs.len(),
        });
    }

    let mut vs = Vec::new();
    let mut es = Vec::new();
    for (target, value) in lhs.iter().zip(rhs) {
        // Self-assignments substitute to themselves; skip them.
        if target != value {
            vs.push(target.clone());
            es.push(value.clone());
        }
    }
    Ok(subst(&post, &vs, &es)?)
}

fn wp_if(
    ctx: &mut WpContext<'_>,
    cond: &Expr,
    then_block: &[Stmt],
    else_stmt: Option<&Stmt>,
    post: Expr,
) -> Result<Expr, WpError> {
    let then_refs: Vec<&Stmt> = then_block.iter().collect();
    let then_wp = wp_stmts(ctx, &then_refs, post.clone())?;
    let else_wp = match else_stmt {
        Some(stmt) => wp_stmt(ctx, stmt, post)?,
        // An absent else branch is the empty block.
        None => post,
    };
    Ok(cond
        .clone()
        .and(then_wp)
        .or(cond.clone().not().and(else_wp)))
}

fn wp_for(
    ctx: &mut WpContext<'_>,
    cond: &Expr,
    body: &[Stmt],
    post: Expr,
) -> Result<Expr, WpError> {
    let (mut asserts, stmts) = separate_annotations(body)?;
    let inv = asserts.remove("INV").ok_or(WpError::MissingInvariant)?;

    // {inv} for cond { stmts } {post}
    let inner = wp_stmts(ctx, &stmts, inv.clone())?;

    // inv && cond  =>  wp(body, inv)      (the invariant is preserved)
    ctx.side_vcs
        .push(inv.clone().and(cond.clone()).implies(inner));
    // inv && !cond =>  post               (exit establishes the postcondition)
    ctx.side_vcs
        .push(inv.clone().and(cond.clone().not()).implies(post));

    // The procedure entry must establish the invariant.
    Ok(inv)
}

/// `x1, …, xn = f(a1, …, am)` summarized by `f`'s contract:
/// `pre[i := a]  &&  ForAll u… (post[o := u][i := a] => Q[o := u])`.
fn wp_call_assign(
    ctx: &mut WpContext<'_>,
    lhs: &[Expr],
    func: &str,
    args: &[Expr],
    post: Expr,
) -> Result<Expr, WpError> {
    let contract = ctx.cache.get(func)?.clone();

    let i_params = contract.input_idents();
    let o_params = contract.output_idents();
    let o_types = contract.output_type_idents();

    if lhs.len() != o_params.len() {
        return Err(WpError::ArityMismatch {
            func: func.to_string(),
            what: "assignment targets",
            want: o_params.len(),
            found: lhs.len(),
        });
    }
    if args.len() != i_params.len() {
        return Err(WpError::ArityMismatch {
            func: func.to_string(),
            what: "arguments",
            want: i_params.len(),
            found: args.len(),
        });
    }

    let (callee_pre, callee_post) = contract.parsed_asserts()?;

    let pre = subst(&callee_pre, &i_params, args)?;

    // Shadow names must be fresh for everything in sight: the caller's
    // postcondition, the callee's conditions, the arguments, and the
    // whole variable environment.
    let mut avoid: BTreeSet<String> = ctx.vars.keys().cloned().collect();
    avoid.extend(free_vars(&post));
    avoid.extend(free_vars(&callee_pre));
    avoid.extend(free_vars(&callee_post));
    for arg in args {
        avoid.extend(free_vars(arg));
    }

    let us: Vec<Expr> = o_params
        .iter()
        .map(|_| Expr::ident(ctx.fresh.fresh(&avoid)))
        .collect();

    let callee_post = subst(&callee_post, &o_params, &us)?;
    let callee_post = subst(&callee_post, &i_params, args)?;

    let q = subst(&post, &o_params, &us)?;

    let mut quantified = callee_post.implies(q);
    for (u, ty) in us.into_iter().zip(o_types) {
        quantified = Expr::forall(u, ty, quantified);
    }

    Ok(pre.and(quantified))
}

/// `f(a1, …, am)` with no assignment: ignore-set members are pure
/// observation; anything else must have a contract, whose precondition is
/// obligated at the call site.
fn wp_call_stmt(
    ctx: &mut WpContext<'_>,
    func: &str,
    args: &[Expr],
    post: Expr,
) -> Result<Expr, WpError> {
    if ctx.ignore_funcs.iter().any(|f| f == func) {
        return Ok(post);
    }

    let contract = ctx.cache.get(func)?.clone();
    let i_params = contract.input_idents();
    if args.len() != i_params.len() {
        return Err(WpError::ArityMismatch {
            func: func.to_string(),
            what: "arguments",
            want: i_params.len(),
            found: args.len(),
        });
    }

    let (callee_pre, _) = contract.parsed_asserts()?;
    let pre = subst(&callee_pre, &i_params, args)?;
    Ok(pre.and(post))
}
