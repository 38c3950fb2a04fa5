//! Run configuration
//!
//! [`RunConfig`] collects everything a single program run depends on besides
//! the source text: the program's arguments and stdin, and the limits and
//! checking policies of the interpreter. Construct it with
//! [`RunConfig::default`] and adjust it with the `with_*` methods.

use crate::memory::MemoryLimits;

/// Default heap budget for the `malloc` family (16 MiB)
pub const DEFAULT_HEAP_LIMIT: usize = 16 * 1024 * 1024;

/// Default budget for live automatic objects (64 MiB)
pub const DEFAULT_STACK_LIMIT: usize = 64 * 1024 * 1024;

/// Default budget for globals, statics and `argv` (64 MiB)
pub const DEFAULT_STATIC_LIMIT: usize = 64 * 1024 * 1024;

/// Default limit on nested function calls
pub const DEFAULT_MAX_CALL_DEPTH: usize = 4096;

/// What happens when signed integer arithmetic overflows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Two's-complement wrap-around
    #[default]
    Wrap,
    /// Raise a runtime error
    Trap,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    /// `argv[0]`
    pub program_name: String,
    /// `argv[1..]`
    pub args: Vec<String>,
    pub stdin: Vec<u8>,
    pub heap_limit: usize,
    /// Bytes of local variables live at once
    pub stack_limit: usize,
    pub static_limit: usize,
    pub max_call_depth: usize,
    pub overflow: OverflowPolicy,
    /// Report reads of uninitialized scalars
    pub check_uninitialized: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            program_name: "a.out".to_string(),
            args: Vec::new(),
            stdin: Vec::new(),
            heap_limit: DEFAULT_HEAP_LIMIT,
            stack_limit: DEFAULT_STACK_LIMIT,
            static_limit: DEFAULT_STATIC_LIMIT,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            overflow: OverflowPolicy::Wrap,
            check_uninitialized: true,
        }
    }
}

impl RunConfig {
    pub fn with_program_name(mut self, name: impl Into<String>) -> Self {
        self.program_name = name.into();
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_stdin(mut self, stdin: impl Into<Vec<u8>>) -> Self {
        self.stdin = stdin.into();
        self
    }

    pub fn with_heap_limit(mut self, bytes: usize) -> Self {
        self.heap_limit = bytes;
        self
    }

    pub fn with_stack_limit(mut self, bytes: usize) -> Self {
        self.stack_limit = bytes;
        self
    }

    pub fn with_static_limit(mut self, bytes: usize) -> Self {
        self.static_limit = bytes;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_overflow(mut self, policy: OverflowPolicy) -> Self {
        self.overflow = policy;
        self
    }

    pub fn with_uninitialized_check(mut self, enabled: bool) -> Self {
        self.check_uninitialized = enabled;
        self
    }

    /// Byte budgets handed to the memory model
    pub fn memory_limits(&self) -> MemoryLimits {
        MemoryLimits {
            heap: self.heap_limit,
            stack: self.stack_limit,
            statics: self.static_limit,
        }
    }

    /// `argv` as the program sees it
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program_name.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = RunConfig::default()
            .with_program_name("echo")
            .with_args(["a", "b"])
            .with_heap_limit(64)
            .with_overflow(OverflowPolicy::Trap);
        assert_eq!(config.argv(), vec!["echo", "a", "b"]);
        assert_eq!(config.heap_limit, 64);
        assert_eq!(config.memory_limits().heap, 64);
        assert_eq!(config.memory_limits().stack, DEFAULT_STACK_LIMIT);
        assert_eq!(config.overflow, OverflowPolicy::Trap);
        assert!(config.check_uninitialized);
    }
}
