//! tgo-verify CLI: deductive verification of annotated tGo procedures.
//!
//! # Usage
//!
//! ```text
//! tgo-verify <source-file> <proc-name>...
//! ```
//!
//! Each named procedure is verified in order against its `PRE`/`POST`
//! annotations; already-verified procedures are reported from their
//! contract files. Successful contracts and `(cached)` markers go to
//! stdout, diagnostics and counter-examples to stderr.
//!
//! # Exit codes
//!
//! - `0` — all requested procedures hold (or were cached)
//! - `1` — argument misuse
//! - `2` — configuration or source-parse failure
//! - `3` — verification failure (refutation, missing contract, solver
//!   error, malformed annotations)

use std::env;
use std::fs;
use std::process::ExitCode;

use vc_ir_go::{parse_file, Config, Verifier};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        let prog = args.first().map_or("tgo-verify", String::as_str);
        eprintln!("usage: {prog} <source-file> <proc-name>...");
        return ExitCode::from(1);
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    let source = &args[1];
    let names = &args[2..];

    let text = match fs::read_to_string(source) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("{source}: {e}");
            return ExitCode::from(2);
        }
    };
    let file = match parse_file(&text) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("{source}: {e}");
            return ExitCode::from(2);
        }
    };

    let mut verifier = Verifier::new(config, source);
    match verifier.verify_all(&file, names) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(3)
        }
    }
}
