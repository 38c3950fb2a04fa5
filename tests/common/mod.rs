// Shared helpers for the integration tests
#![allow(dead_code)]

use krun::{execute, Execution, Failure, FileSystem, MemoryFs, RunConfig};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Run a program that must finish, with an empty in-memory filesystem
pub fn run_ok(source: &str) -> Execution {
    run_with(source, RunConfig::default(), Box::new(MemoryFs::new()))
}

pub fn run_with(source: &str, config: RunConfig, fs: Box<dyn FileSystem>) -> Execution {
    init_logging();
    match execute(source, config, fs) {
        Ok(run) => run,
        Err(failure) => panic!(
            "program failed: {}\nstdout so far:\n{}",
            failure.error,
            String::from_utf8_lossy(&failure.stdout)
        ),
    }
}

/// Run a program that must stop with an error
pub fn run_err(source: &str) -> Failure {
    run_err_with(source, RunConfig::default())
}

pub fn run_err_with(source: &str, config: RunConfig) -> Failure {
    init_logging();
    match execute(source, config, Box::new(MemoryFs::new())) {
        Ok(run) => panic!("program finished with status {}, expected an error", run.status),
        Err(failure) => failure,
    }
}

/// Tag of the runtime error a failed program stopped with
pub fn runtime_tag(failure: &Failure) -> &'static str {
    match &failure.error {
        krun::Error::Runtime(err) => err.tag(),
        other => panic!("expected a runtime error, got {}", other),
    }
}

pub fn stdout_of(source: &str) -> String {
    run_ok(source).stdout_str()
}
