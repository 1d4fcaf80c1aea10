//! Verified-contract records and their JSON persistence.
//!
//! A contract is the durable result of verifying one procedure: its
//! signature, its pre/postcondition texts, and the discharged VC texts for
//! diagnostics. Contracts are what make verification modular — a call to a
//! verified procedure is summarized by its contract instead of its body.

use crate::expr::Expr;
use crate::parser::{parse_condition, ParseError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Contract file I/O failure.
#[derive(Debug, Error)]
pub enum ContractError {
    #[error("failed to read contract file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write contract file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("contract file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("contract for '{name}': {field} does not parse: {source}")]
    Condition {
        name: String,
        field: &'static str,
        #[source]
        source: ParseError,
    },
}

/// The verified contract of one procedure.
///
/// `inputs`/`outputs` are ordered `(name, type)` pairs; `pre`/`post` are
/// the condition texts exactly as rendered by the pretty-printer; `conds`
/// lists the discharged VC texts for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub name: String,
    pub inputs: Vec<(String, String)>,
    pub outputs: Vec<(String, String)>,
    pub pre: String,
    pub post: String,
    pub conds: Vec<String>,
    pub date: String,
    pub note: String,
}

impl Contract {
    /// Input parameter names as identifier expressions, in declaration
    /// order.
    #[must_use]
    pub fn input_idents(&self) -> Vec<Expr> {
        self.inputs.iter().map(|(n, _)| Expr::ident(n)).collect()
    }

    /// Output parameter names as identifier expressions.
    #[must_use]
    pub fn output_idents(&self) -> Vec<Expr> {
        self.outputs.iter().map(|(n, _)| Expr::ident(n)).collect()
    }

    /// Output parameter types as identifier expressions, used to type the
    /// quantified shadows of call results.
    #[must_use]
    pub fn output_type_idents(&self) -> Vec<Expr> {
        self.outputs.iter().map(|(_, t)| Expr::ident(t)).collect()
    }

    /// Re-parse the stored pre/postcondition texts.
    ///
    /// # Errors
    /// Fails when a stored text is not a well-formed condition (a contract
    /// file edited by hand, usually).
    pub fn parsed_asserts(&self) -> Result<(Expr, Expr), ContractError> {
        let pre = parse_condition(&self.pre).map_err(|source| ContractError::Condition {
            name: self.name.clone(),
            field: "pre",
            source,
        })?;
        let post = parse_condition(&self.post).map_err(|source| ContractError::Condition {
            name: self.name.clone(),
            field: "post",
            source,
        })?;
        Ok((pre, post))
    }

    /// Load a contract from its JSON file.
    ///
    /// # Errors
    /// Fails on missing/unreadable files and invalid JSON.
    pub fn load(path: &Path) -> Result<Self, ContractError> {
        let content = std::fs::read_to_string(path).map_err(|source| ContractError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ContractError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the contract pretty-printed (two-space indent) for human
    /// editability. The JSON is fully serialized before the file is
    /// touched, so a contract file is never partially observable.
    ///
    /// # Errors
    /// Fails on serialization or filesystem write errors.
    pub fn save(&self, path: &Path) -> Result<(), ContractError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|source| ContractError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        std::fs::write(path, content).map_err(|source| ContractError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl std::fmt::Display for Contract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Function: {}", self.name)?;

        let ins: Vec<String> = self
            .inputs
            .iter()
            .map(|(n, t)| format!("{n}:{t}"))
            .collect();
        writeln!(f, "IN:  {}", ins.join(", "))?;

        let outs: Vec<String> = self
            .outputs
            .iter()
            .map(|(n, t)| format!("{n}:{t}"))
            .collect();
        writeln!(f, "OUT: {}", outs.join(", "))?;

        writeln!(f, "PRE: {}", self.pre)?;
        writeln!(f, "POST: {}", self.post)?;

        for (i, cond) in self.conds.iter().enumerate() {
            writeln!(f, "Cond[{i}]: {cond}")?;
        }

        if !self.date.is_empty() {
            writeln!(f, "Date: {}", self.date)?;
        }
        if !self.note.is_empty() {
            writeln!(f, "Note: {}", self.note)?;
        }
        Ok(())
    }
}

/// Current time as ISO 8601 UTC, without a clock crate.
#[must_use]
pub fn iso_timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let secs = now.as_secs();

    let days = secs / 86400;
    let remaining = secs % 86400;
    let hours = remaining / 3600;
    let minutes = (remaining % 3600) / 60;
    let seconds = remaining % 60;

    let mut year: i64 = 1970;
    let mut remaining_days = days as i64;
    loop {
        let days_in_year = if is_leap_year(year) { 366 } else { 365 };
        if remaining_days < days_in_year {
            break;
        }
        remaining_days -= days_in_year;
        year += 1;
    }

    let mut month = 1;
    loop {
        let in_month = i64::from(days_in_month(year, month));
        if remaining_days < in_month {
            break;
        }
        remaining_days -= in_month;
        month += 1;
    }
    let day = remaining_days + 1;

    format!("{year:04}-{month:02}-{day:02}T{hours:02}:{minutes:02}:{seconds:02}Z")
}

const fn is_leap_year(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

const fn days_in_month(year: i64, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 30,
    }
}
