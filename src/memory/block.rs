//! Memory blocks
//!
//! Every object the program can point at lives in a [`Block`]: a contiguous
//! byte run with a per-byte initialization map, the [`Region`] it belongs to,
//! and a liveness state. Released blocks are kept as tombstones so a later
//! access through a dangling pointer is reported as use-after-release.

use std::fmt;

/// Which storage region a block belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// Globals, statics and `argv`; live for the whole run
    Static,
    /// String literals; read-only
    Literal,
    /// Automatic variables and parameters
    Stack,
    /// `malloc` family and library handles
    Heap,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Region::Static => "static",
            Region::Literal => "literal",
            Region::Stack => "stack",
            Region::Heap => "heap",
        };
        write!(f, "{}", name)
    }
}

/// State of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Live,
    /// Released but kept to diagnose dangling accesses
    Tombstone,
}

/// A block of memory
#[derive(Debug, Clone)]
pub struct Block {
    pub data: Vec<u8>,
    /// Size in bytes; survives `bury`
    pub size: usize,
    /// Per-byte initialization tracking
    pub init_map: Vec<bool>,
    pub region: Region,
    pub state: BlockState,
    /// What the block holds (variable name, `malloc`, literal), for diagnostics
    pub label: String,
}

impl Block {
    pub fn new(size: usize, region: Region, label: String) -> Self {
        Block {
            data: vec![0; size],
            size,
            init_map: vec![false; size],
            region,
            state: BlockState::Live,
            label,
        }
    }

    pub fn is_live(&self) -> bool {
        self.state == BlockState::Live
    }

    /// Check if a byte range is initialized
    pub fn is_initialized(&self, offset: usize, size: usize) -> bool {
        self.init_map
            .get(offset..offset + size)
            .is_some_and(|bits| bits.iter().all(|&b| b))
    }

    /// Mark a byte range as initialized or not
    pub fn set_initialized(&mut self, offset: usize, size: usize, initialized: bool) {
        if let Some(bits) = self.init_map.get_mut(offset..offset + size) {
            bits.fill(initialized);
        }
    }

    /// Write bytes into the block and mark them initialized
    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        self.set_initialized(offset, bytes.len(), true);
    }

    /// Drop the contents of a released block; only the tombstone metadata remains
    pub fn bury(&mut self) {
        self.state = BlockState::Tombstone;
        self.data = Vec::new();
        self.init_map = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialization_tracking() {
        let mut block = Block::new(8, Region::Heap, "malloc".to_string());
        assert!(!block.is_initialized(0, 4));

        block.write_bytes(2, &[1, 2]);
        assert!(block.is_initialized(2, 2));
        assert!(!block.is_initialized(0, 4));
        assert!(!block.is_initialized(6, 4)); // past the end

        block.set_initialized(0, 8, true);
        assert!(block.is_initialized(0, 8));
    }

    #[test]
    fn test_bury() {
        let mut block = Block::new(4, Region::Stack, "x".to_string());
        block.bury();
        assert!(!block.is_live());
        assert_eq!(block.size, 4);
        assert_eq!(block.label, "x");
    }
}
