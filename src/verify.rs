//! Per-procedure verification driver.
//!
//! For each requested procedure: a cache hit prints the stored contract
//! and skips; otherwise the VCs are derived, emitted and discharged in
//! order, halting on the first `sat` (refutation, with the model quoted)
//! or inconclusive answer. A fully discharged procedure's contract is
//! persisted through the cache, making it available to later procedures
//! as a call summary.

use crate::cache::{CacheError, ContractCache};
use crate::config::Config;
use crate::contract::{iso_timestamp, Contract};
use crate::expr::{FuncDecl, Param, SourceFile};
use crate::smtlib::{make_script, TranslateError};
use crate::solver::{check_script, SolverError, SolverVerdict};
use crate::weakest_precondition::{function_vcs, WpError};
use std::path::PathBuf;
use thiserror::Error;

/// A verification run failure, carrying enough context to locate the
/// offending procedure and condition.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("unknown procedure: {0}")]
    UnknownFunction(String),

    #[error("procedure '{function}': {source}")]
    Wp {
        function: String,
        #[source]
        source: WpError,
    },

    #[error("procedure '{function}', condition '{vc}': {source}")]
    Translate {
        function: String,
        vc: String,
        #[source]
        source: TranslateError,
    },

    #[error("procedure '{function}', condition '{vc}': {source}")]
    Solver {
        function: String,
        vc: String,
        #[source]
        source: SolverError,
    },

    #[error("procedure '{function}' refuted: '{vc}' has a counter-example:\n{counter_example}")]
    Refuted {
        function: String,
        vc: String,
        counter_example: String,
    },

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// The verifier: configuration, contract cache, and the source file the
/// contracts belong to.
pub struct Verifier {
    config: Config,
    cache: ContractCache,
}

impl Verifier {
    pub fn new(config: Config, source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        Self {
            config,
            cache: ContractCache::new(source),
        }
    }

    /// Verify the named procedures in order; the first failure stops the
    /// run. Already-verified procedures print their stored contract under
    /// a `(cached)` marker.
    ///
    /// # Errors
    /// The first failing procedure's [`VerifyError`].
    pub fn verify_all(&mut self, file: &SourceFile, names: &[String]) -> Result<(), VerifyError> {
        for name in names {
            match self.cache.get(name) {
                Ok(contract) => {
                    println!("(cached)");
                    println!("{contract}");
                    continue;
                }
                Err(CacheError::NotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }

            let decl = file
                .func(name)
                .ok_or_else(|| VerifyError::UnknownFunction(name.clone()))?;
            let contract = self.verify_function(decl)?;
            println!("{contract}");
        }
        Ok(())
    }

    /// Derive, discharge and persist the contract of one procedure.
    ///
    /// # Errors
    /// See [`VerifyError`].
    pub fn verify_function(&mut self, decl: &FuncDecl) -> Result<Contract, VerifyError> {
        let function = decl.name.clone();

        let vcs = function_vcs(decl, &mut self.cache, &self.config.ignore_funcs).map_err(
            |source| VerifyError::Wp {
                function: function.clone(),
                source,
            },
        )?;

        let mut cond_texts = Vec::with_capacity(vcs.conds.len());
        for cond in &vcs.conds {
            let text = cond.to_string();

            let script =
                make_script(&vcs.vars, cond).map_err(|source| VerifyError::Translate {
                    function: function.clone(),
                    vc: text.clone(),
                    source,
                })?;
            if self.config.debug {
                eprintln!("# vc: {text}");
                eprintln!("# script:\n{script}");
            }

            match check_script(&self.config.cmd, &script, self.config.timeout()) {
                Ok(SolverVerdict::Unsat) => cond_texts.push(text),
                Ok(SolverVerdict::Sat { model }) => {
                    return Err(VerifyError::Refuted {
                        function,
                        vc: text,
                        counter_example: model,
                    });
                }
                Err(source) => {
                    return Err(VerifyError::Solver {
                        function,
                        vc: text,
                        source,
                    });
                }
            }
        }

        let contract = Contract {
            name: function,
            inputs: param_pairs(&decl.inputs),
            outputs: param_pairs(&decl.outputs),
            pre: vcs.pre.to_string(),
            post: vcs.post.to_string(),
            conds: cond_texts,
            date: iso_timestamp(),
            note: String::new(),
        };
        self.cache.insert(contract.clone())?;
        Ok(contract)
    }
}

fn param_pairs(params: &[Param]) -> Vec<(String, String)> {
    params
        .iter()
        .map(|p| (p.name.clone(), p.ty.to_string()))
        .collect()
}
