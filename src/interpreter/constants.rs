// Address map and fixed limits of the interpreter

/// Start of the static region (globals, statics, argv)
pub const STATIC_BASE: u64 = 0x0000_0000_0001_0000;

/// Start of the read-only string literal region
pub const LITERAL_BASE: u64 = 0x0000_0001_0000_0000;

/// Start of the heap region
pub const HEAP_BASE: u64 = 0x0000_1000_0000_0000;

/// Start of the stack region. Stack addresses grow upwards and are never reused.
pub const STACK_BASE: u64 = 0x0000_7000_0000_0000;

/// Unmapped bytes left after every block so small overruns never land in a neighbour
pub const GUARD_GAP: u64 = 16;

/// Released blocks remembered for use-after-release diagnostics
pub const MAX_TOMBSTONES: usize = 1 << 16;

/// Native stack reserved for the interpreter thread; deep C recursion
/// becomes deep Rust recursion in the tree walker
pub const INTERPRETER_STACK_SIZE: usize = 1 << 30;

/// Lowest descriptor handed out by `open`; 0-2 are the standard streams
pub const FIRST_FILE_DESCRIPTOR: i64 = 3;
