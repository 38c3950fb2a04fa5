//! # Introduction
//!
//! krun runs K&R-style C programs the way a reference evaluator would: it
//! parses and type-checks one translation unit, then walks the tree against
//! a checked memory model so that out-of-bounds access, use after release,
//! invalid frees and reads of uninitialized memory are reported as errors
//! with a source position instead of silently producing garbage.
//!
//! ## Execution pipeline
//!
//! ```text
//! Source → Lexer → Parser → AST → Resolver → Interpreter → stdout / stderr / status
//! ```
//!
//! 1. [`parser`] tokenises the source (after a small built-in prelude of
//!    library types and constants) and builds an AST.
//! 2. [`resolver`] types every expression, makes implicit conversions
//!    explicit, binds names to storage and computes struct layouts.
//! 3. [`interpreter`] executes `main`, implementing the C library subset
//!    directly.
//! 4. [`memory`] is the address space: blocks per region, byte-level
//!    initialization tracking and tombstones for released blocks.
//! 5. [`fs`] is the only way a program reaches files: an in-memory tree or a
//!    confined host directory.
//!
//! ## Example
//!
//! ```
//! let run = krun::run("int main(void) { printf(\"%d\\n\", 6 * 7); return 0; }").unwrap();
//! assert_eq!(run.stdout, b"42\n");
//! assert_eq!(run.status, 0);
//! ```

pub mod config;
pub mod error;
pub mod fs;
pub mod interpreter;
pub mod memory;
pub mod parser;
pub mod resolver;

pub use config::{OverflowPolicy, RunConfig};
pub use error::{Error, Phase};
pub use fs::{FileSystem, HostFs, MemoryFs};

use interpreter::constants::INTERPRETER_STACK_SIZE;
use interpreter::engine::Interpreter;
use interpreter::errors::RuntimeError;
use parser::Parser;
use resolver::ResolvedProgram;
use thiserror::Error as ThisError;

/// A finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub status: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl Execution {
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// A run that stopped at an error, with whatever the program wrote first
#[derive(Debug, Clone, ThisError)]
#[error("{error}")]
pub struct Failure {
    pub error: Error,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl Failure {
    fn compile(error: Error) -> Self {
        Failure {
            error,
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }
}

/// Lex, parse and resolve `source`
pub fn compile(source: &str) -> Result<ResolvedProgram, Error> {
    let program = Parser::new(source)?.parse_program()?;
    log::debug!("parsed {} top-level item(s)", program.items.len());
    let resolved = resolver::resolve(program)?;
    log::debug!(
        "resolved {} function(s), {} static object(s)",
        resolved.program.functions().count(),
        resolved.globals.len()
    );
    Ok(resolved)
}

/// Compile and run `source` with `config`, giving the program `fs` as its
/// filesystem
pub fn execute(source: &str, config: RunConfig, fs: Box<dyn FileSystem>) -> Result<Execution, Failure> {
    let resolved = compile(source).map_err(Failure::compile)?;

    // Deep C recursion is deep host recursion, so the walk gets its own stack
    let worker = std::thread::Builder::new()
        .name("krun-interpreter".to_string())
        .stack_size(INTERPRETER_STACK_SIZE)
        .spawn(move || {
            let mut interpreter = Interpreter::new(resolved, config, fs);
            let result = interpreter.run();
            let (stdout, stderr) = interpreter.into_output();
            (result, stdout, stderr)
        });
    let handle = match worker {
        Ok(handle) => handle,
        Err(err) => {
            return Err(Failure::compile(Error::Runtime(RuntimeError::Unsupported {
                message: format!("cannot start the interpreter thread: {}", err),
                location: Default::default(),
            })))
        }
    };
    let (result, stdout, stderr) = match handle.join() {
        Ok(outcome) => outcome,
        Err(panic) => std::panic::resume_unwind(panic),
    };

    match result {
        Ok(status) => {
            log::debug!("program exited with status {}", status);
            Ok(Execution { status, stdout, stderr })
        }
        Err(error) => Err(Failure {
            error: Error::Runtime(error),
            stdout,
            stderr,
        }),
    }
}

/// Run `source` with the default configuration and an empty in-memory
/// filesystem
pub fn run(source: &str) -> Result<Execution, Failure> {
    execute(source, RunConfig::default(), Box::new(MemoryFs::new()))
}
