//! Deductive verification of annotated tGo procedures.
//!
//! This crate derives and discharges the verification conditions of
//! procedures written in a small Go-like language, annotated with
//! `PRE`/`POST` contracts and per-loop `INV` invariants:
//!
//! 1. [`parser`] turns source text into the [`expr`] AST, and annotation
//!    strings into condition expressions;
//! 2. [`weakest_precondition`] computes `wp(body, POST)` and the loop
//!    side conditions, consulting the [`cache`] for callee contracts;
//! 3. [`smtlib`] renders each negated condition as an SMT-LIB 2 script;
//! 4. [`solver`] pipes the script into an external solver process under
//!    a wall-clock timeout and classifies the answer;
//! 5. [`verify`] orchestrates the pipeline per procedure and persists
//!    successful [`contract`]s for modular reuse.
//!
//! The solver is reached purely over its wire protocol (`z3 -in` by
//! default, configurable via `conf.json` — see [`config`]); `sat` on a
//! negated condition refutes the procedure and quotes the model as the
//! counter-example.

pub mod cache;
pub mod config;
pub mod contract;
pub mod expr;
pub mod parser;
pub mod smtlib;
pub mod solver;
pub mod subst;
pub mod verify;
pub mod weakest_precondition;

pub use cache::{contract_path, CacheError, ContractCache};
pub use config::{Config, ConfigError};
pub use contract::{Contract, ContractError};
pub use expr::{BinOp, Expr, FuncDecl, LitKind, Param, SourceFile, Stmt, UnOp, VarEnv};
pub use parser::{parse_condition, parse_file, ParseError};
pub use smtlib::{make_script, TranslateError};
pub use solver::{check_script, run_solver, SolverError, SolverOutput, SolverVerdict};
pub use subst::{free_vars, subst, SubstError};
pub use verify::{Verifier, VerifyError};
pub use weakest_precondition::{function_vcs, FunctionVcs, WpError};
