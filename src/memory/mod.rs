//! Memory model for the C interpreter
//!
//! This module provides the core memory abstractions:
//! - [`value`]: Runtime value representation and scalar encoding
//! - [`block`]: Blocks with per-byte initialization tracking and tombstones
//! - [`stack`]: Call stack with frames, slots and scopes
//!
//! # Address Space
//!
//! [`Memory`] is a flat, byte-addressable store made of blocks keyed by base
//! address. Each [`Region`] hands out addresses from its own range, always
//! upwards, with a guard gap after every block: an address is never reused
//! within a run, so a dangling pointer can never alias a newer object.
//!
//! # Checked Access
//!
//! Every read and write is checked: NULL, unmapped addresses, released blocks
//! (tombstones), out-of-bounds ranges, writes to string literals and (when
//! enabled) reads of uninitialized bytes all fail with a [`MemoryError`]. All
//! mutation of program state funnels through [`Memory::write`].
//!
//! # Budgets
//!
//! The heap, stack and static regions each have a byte budget
//! ([`MemoryLimits`]); an allocation that would exceed it fails with
//! [`MemoryError::OutOfMemory`] before any host memory is reserved.
//!
//! # Tombstones
//!
//! A released block keeps its metadata so dangling accesses are reported as
//! use-after-release. Past `MAX_TOMBSTONES` the oldest tombstones are folded
//! into released address ranges: the diagnosis stays the same, only the
//! variable name is lost.

pub mod block;
pub mod stack;
pub mod value;

use crate::interpreter::constants::{
    GUARD_GAP, HEAP_BASE, LITERAL_BASE, MAX_TOMBSTONES, STACK_BASE, STATIC_BASE,
};
use crate::parser::ast::Type;
pub use block::{Block, BlockState, Region};
use std::collections::{BTreeMap, VecDeque};
use thiserror::Error;
use value::{Address, Value, NULL};

/// Memory access failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MemoryError {
    #[error("null pointer dereference")]
    Null,

    #[error("address {address:#x} is not mapped")]
    Unmapped { address: Address },

    #[error("use of released {region} memory at {address:#x} ('{label}')")]
    Released {
        address: Address,
        region: Region,
        label: String,
    },

    #[error("access of {len} byte(s) at {address:#x} is outside '{label}' ({size} bytes at {base:#x})")]
    OutOfBounds {
        address: Address,
        len: usize,
        base: Address,
        size: usize,
        label: String,
    },

    #[error("write to read-only {label} at {address:#x}")]
    ReadOnly { address: Address, label: String },

    #[error("read of uninitialized memory at {address:#x} ('{label}')")]
    Uninitialized { address: Address, label: String },

    #[error("double free of {address:#x}")]
    DoubleFree { address: Address },

    #[error("invalid free of {address:#x}: {reason}")]
    InvalidFree {
        address: Address,
        reason: &'static str,
    },

    #[error("{region} limit of {limit} bytes exceeded (requested {requested}, {in_use} in use)")]
    OutOfMemory {
        region: Region,
        requested: usize,
        in_use: usize,
        limit: usize,
    },
}

/// Byte budgets per region. String literals are bounded by the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLimits {
    pub heap: usize,
    pub stack: usize,
    pub statics: usize,
}

impl Default for MemoryLimits {
    fn default() -> Self {
        MemoryLimits {
            heap: crate::config::DEFAULT_HEAP_LIMIT,
            stack: crate::config::DEFAULT_STACK_LIMIT,
            statics: crate::config::DEFAULT_STATIC_LIMIT,
        }
    }
}

/// The program's address space
#[derive(Debug, Clone)]
pub struct Memory {
    blocks: BTreeMap<Address, Block>,
    /// Next free address per region
    cursors: [Address; 4],
    /// Live bytes per region
    in_use: [usize; 4],
    limits: MemoryLimits,
    /// Oldest first; folded into `released` beyond `MAX_TOMBSTONES`
    tombstones: VecDeque<Address>,
    /// Start of each folded range to its end and region
    released: BTreeMap<Address, (Address, Region)>,
    check_uninitialized: bool,
}

fn region_index(region: Region) -> usize {
    match region {
        Region::Static => 0,
        Region::Literal => 1,
        Region::Stack => 2,
        Region::Heap => 3,
    }
}

fn align_up(address: Address, align: usize) -> Address {
    let align = align.max(1) as Address;
    address.div_ceil(align) * align
}

impl Memory {
    pub fn new(limits: MemoryLimits, check_uninitialized: bool) -> Self {
        Memory {
            blocks: BTreeMap::new(),
            cursors: [STATIC_BASE, LITERAL_BASE, STACK_BASE, HEAP_BASE],
            in_use: [0; 4],
            limits,
            tombstones: VecDeque::new(),
            released: BTreeMap::new(),
            check_uninitialized,
        }
    }

    fn limit(&self, region: Region) -> usize {
        match region {
            Region::Static => self.limits.statics,
            Region::Literal => usize::MAX,
            Region::Stack => self.limits.stack,
            Region::Heap => self.limits.heap,
        }
    }

    /// Allocate a block of `size` bytes aligned to `align`
    pub fn allocate(
        &mut self,
        size: usize,
        align: usize,
        region: Region,
        label: impl Into<String>,
    ) -> Result<Address, MemoryError> {
        let index = region_index(region);
        let limit = self.limit(region);
        if self.in_use[index].saturating_add(size) > limit {
            return Err(MemoryError::OutOfMemory {
                region,
                requested: size,
                in_use: self.in_use[index],
                limit,
            });
        }
        self.in_use[index] += size;

        let cursor = &mut self.cursors[index];
        let address = align_up(*cursor, align);
        *cursor = address + size as Address + GUARD_GAP;

        let block = Block::new(size, region, label.into());
        log::trace!(
            "allocate {} bytes at {:#x} ({} '{}')",
            size,
            address,
            region,
            block.label
        );
        self.blocks.insert(address, block);
        Ok(address)
    }

    /// Allocate a block whose bytes all start as initialized zeros
    pub fn allocate_zeroed(
        &mut self,
        size: usize,
        align: usize,
        region: Region,
        label: impl Into<String>,
    ) -> Result<Address, MemoryError> {
        let address = self.allocate(size, align, region, label)?;
        if let Some(block) = self.blocks.get_mut(&address) {
            block.set_initialized(0, size, true);
        }
        Ok(address)
    }

    /// Allocate a read-only string literal holding `bytes` (NUL included by the caller)
    pub fn allocate_literal(&mut self, bytes: &[u8]) -> Result<Address, MemoryError> {
        let address = self.allocate(bytes.len(), 1, Region::Literal, "string literal")?;
        if let Some(block) = self.blocks.get_mut(&address) {
            block.write_bytes(0, bytes);
        }
        Ok(address)
    }

    /// Release a stack or static block by its base address (scope exit)
    pub fn release(&mut self, address: Address) -> Result<(), MemoryError> {
        match self.blocks.get(&address) {
            Some(block) if block.is_live() => {
                self.bury(address);
                Ok(())
            }
            Some(_) => Err(MemoryError::DoubleFree { address }),
            None if self.released_region(address).is_some() => Err(MemoryError::DoubleFree { address }),
            None => Err(MemoryError::Unmapped { address }),
        }
    }

    /// Release a heap block (`free`). Freeing NULL does nothing.
    pub fn free(&mut self, address: Address) -> Result<(), MemoryError> {
        if address == NULL {
            return Ok(());
        }
        match self.blocks.get(&address) {
            Some(block) if block.region != Region::Heap => Err(MemoryError::InvalidFree {
                address,
                reason: "not a heap allocation",
            }),
            Some(block) if !block.is_live() => Err(MemoryError::DoubleFree { address }),
            Some(_) => {
                self.bury(address);
                Ok(())
            }
            None if self.released_region(address) == Some(Region::Heap) => {
                Err(MemoryError::DoubleFree { address })
            }
            None => Err(MemoryError::InvalidFree {
                address,
                reason: "not the start of an allocation",
            }),
        }
    }

    fn bury(&mut self, address: Address) {
        if let Some(block) = self.blocks.get_mut(&address) {
            log::trace!("release {:#x} ({} '{}')", address, block.region, block.label);
            let index = region_index(block.region);
            self.in_use[index] = self.in_use[index].saturating_sub(block.size);
            block.bury();
        }
        self.tombstones.push_back(address);
        while self.tombstones.len() > MAX_TOMBSTONES {
            if let Some(old) = self.tombstones.pop_front() {
                self.fold_tombstone(old);
            }
        }
    }

    /// Replace the tombstone at `base` by a released range, merging with
    /// neighbouring ranges when no block lies in between
    fn fold_tombstone(&mut self, base: Address) {
        let Some(block) = self.blocks.remove(&base) else {
            return;
        };
        let region = block.region;
        let mut start = base;
        let mut end = base + block.size.max(1) as Address;

        let before = self.released.range(..start).next_back().map(|(&s, &r)| (s, r));
        if let Some((prev_start, (prev_end, prev_region))) = before {
            if prev_region == region && self.blocks.range(prev_end..start).next().is_none() {
                self.released.remove(&prev_start);
                start = prev_start;
            }
        }
        let after = self.released.range(end..).next().map(|(&s, &r)| (s, r));
        if let Some((next_start, (next_end, next_region))) = after {
            if next_region == region && self.blocks.range(end..next_start).next().is_none() {
                self.released.remove(&next_start);
                end = next_end;
            }
        }
        self.released.insert(start, (end, region));
    }

    /// Region of the folded released range containing `address`
    fn released_region(&self, address: Address) -> Option<Region> {
        let (_, &(end, region)) = self.released.range(..=address).next_back()?;
        (address < end).then_some(region)
    }

    /// Base address, size and region of the live block containing `address`
    pub fn block_info(&self, address: Address) -> Option<(Address, usize, Region)> {
        let (&base, block) = self.blocks.range(..=address).next_back()?;
        (block.is_live() && address < base + block.size.max(1) as Address)
            .then_some((base, block.size, block.region))
    }

    /// Find the block holding `[address, address + len)` and the offset into it
    fn locate(&self, address: Address, len: usize) -> Result<(Address, usize), MemoryError> {
        if address == NULL {
            return Err(MemoryError::Null);
        }
        if let Some(region) = self.released_region(address) {
            return Err(MemoryError::Released {
                address,
                region,
                label: "released memory".to_string(),
            });
        }
        let (&base, block) = self
            .blocks
            .range(..=address)
            .next_back()
            .ok_or(MemoryError::Unmapped { address })?;

        let offset = (address - base) as usize;
        if !block.is_live() && offset < block.size.max(1) {
            return Err(MemoryError::Released {
                address,
                region: block.region,
                label: block.label.clone(),
            });
        }
        if offset.checked_add(len).map_or(true, |end| end > block.size) || !block.is_live() {
            return Err(MemoryError::OutOfBounds {
                address,
                len,
                base,
                size: block.size,
                label: block.label.clone(),
            });
        }
        Ok((base, offset))
    }

    /// Read `len` bytes; fails on uninitialized bytes when checking is enabled
    pub fn read(&self, address: Address, len: usize) -> Result<Vec<u8>, MemoryError> {
        let (base, offset) = self.locate(address, len)?;
        let block = &self.blocks[&base];
        if self.check_uninitialized && !block.is_initialized(offset, len) {
            let first = (offset..offset + len)
                .find(|&i| !block.init_map[i])
                .unwrap_or(offset);
            return Err(MemoryError::Uninitialized {
                address: base + first as Address,
                label: block.label.clone(),
            });
        }
        Ok(block.data[offset..offset + len].to_vec())
    }

    /// Read `len` bytes without the initialization check (aggregate copies)
    pub fn read_raw(&self, address: Address, len: usize) -> Result<Vec<u8>, MemoryError> {
        let (base, offset) = self.locate(address, len)?;
        Ok(self.blocks[&base].data[offset..offset + len].to_vec())
    }

    /// Load a scalar of type `ty`
    pub fn read_scalar(&self, address: Address, ty: &Type) -> Result<Value, MemoryError> {
        let size = value::scalar_size(ty).unwrap_or(0);
        let bytes = self.read(address, size)?;
        Ok(value::decode(&bytes, ty))
    }

    /// Write bytes, marking them initialized
    pub fn write(&mut self, address: Address, bytes: &[u8]) -> Result<(), MemoryError> {
        let (base, offset) = self.locate(address, bytes.len())?;
        let block = self
            .blocks
            .get_mut(&base)
            .ok_or(MemoryError::Unmapped { address })?;
        if block.region == Region::Literal {
            return Err(MemoryError::ReadOnly {
                address,
                label: block.label.clone(),
            });
        }
        block.write_bytes(offset, bytes);
        Ok(())
    }

    /// Store a scalar of type `ty`
    pub fn write_scalar(&mut self, address: Address, ty: &Type, value: &Value) -> Result<(), MemoryError> {
        self.write(address, &value::encode(value, ty))
    }

    /// `memmove` semantics: overlapping ranges are fine; initialization bits travel with the data
    pub fn copy(&mut self, dst: Address, src: Address, len: usize) -> Result<(), MemoryError> {
        if len == 0 {
            return Ok(());
        }
        let (src_base, src_offset) = self.locate(src, len)?;
        let src_block = &self.blocks[&src_base];
        let data = src_block.data[src_offset..src_offset + len].to_vec();
        let init = src_block.init_map[src_offset..src_offset + len].to_vec();

        self.write(dst, &data)?;
        let (dst_base, dst_offset) = self.locate(dst, len)?;
        if let Some(block) = self.blocks.get_mut(&dst_base) {
            block.init_map[dst_offset..dst_offset + len].copy_from_slice(&init);
        }
        Ok(())
    }

    /// `memset` semantics
    pub fn fill(&mut self, address: Address, byte: u8, len: usize) -> Result<(), MemoryError> {
        self.locate(address, len)?;
        self.write(address, &vec![byte; len])
    }

    /// Read a NUL-terminated string starting at `address` (terminator excluded)
    pub fn read_c_string(&self, address: Address) -> Result<Vec<u8>, MemoryError> {
        let (base, offset) = self.locate(address, 0)?;
        let block = &self.blocks[&base];
        let mut bytes = Vec::new();
        for i in offset..block.size {
            if self.check_uninitialized && !block.init_map[i] {
                return Err(MemoryError::Uninitialized {
                    address: base + i as Address,
                    label: block.label.clone(),
                });
            }
            if block.data[i] == 0 {
                return Ok(bytes);
            }
            bytes.push(block.data[i]);
        }
        Err(MemoryError::OutOfBounds {
            address: base + block.size as Address,
            len: 1,
            base,
            size: block.size,
            label: block.label.clone(),
        })
    }

    /// Live bytes in `region`
    pub fn in_use(&self, region: Region) -> usize {
        self.in_use[region_index(region)]
    }

    /// Number of live blocks in `region`
    pub fn live_blocks(&self, region: Region) -> usize {
        self.blocks
            .values()
            .filter(|b| b.region == region && b.is_live())
            .count()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(MemoryLimits::default(), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_round_trip() {
        let mut mem = Memory::default();
        let addr = mem.allocate(4, 4, Region::Stack, "x").unwrap();
        mem.write_scalar(addr, &Type::Int, &Value::Int(-42)).unwrap();
        assert_eq!(mem.read_scalar(addr, &Type::Int).unwrap(), Value::Int(-42));
    }

    #[test]
    fn test_uninitialized_read() {
        let mut mem = Memory::default();
        let addr = mem.allocate(4, 4, Region::Stack, "x").unwrap();
        assert!(matches!(
            mem.read_scalar(addr, &Type::Int),
            Err(MemoryError::Uninitialized { .. })
        ));

        let mut lenient = Memory::new(MemoryLimits::default(), false);
        let addr = lenient.allocate(4, 4, Region::Stack, "x").unwrap();
        assert_eq!(lenient.read_scalar(addr, &Type::Int).unwrap(), Value::Int(0));
    }

    #[test]
    fn test_out_of_bounds() {
        let mut mem = Memory::default();
        let addr = mem.allocate_zeroed(8, 4, Region::Stack, "a").unwrap();
        assert!(mem.read(addr + 4, 4).is_ok());
        assert!(matches!(
            mem.read(addr + 6, 4),
            Err(MemoryError::OutOfBounds { .. })
        ));
        assert!(matches!(
            mem.write(addr + 8, &[1]),
            Err(MemoryError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_null_and_unmapped() {
        let mem = Memory::default();
        assert_eq!(mem.read(NULL, 1), Err(MemoryError::Null));
        assert!(matches!(mem.read(1, 1), Err(MemoryError::Unmapped { .. })));
    }

    #[test]
    fn test_use_after_free_and_double_free() {
        let mut mem = Memory::default();
        let addr = mem.allocate_zeroed(16, 8, Region::Heap, "malloc").unwrap();
        assert_eq!(mem.in_use(Region::Heap), 16);
        mem.free(addr).unwrap();
        assert_eq!(mem.in_use(Region::Heap), 0);

        assert!(matches!(mem.read(addr, 1), Err(MemoryError::Released { .. })));
        assert_eq!(mem.free(addr), Err(MemoryError::DoubleFree { address: addr }));
    }

    #[test]
    fn test_invalid_free() {
        let mut mem = Memory::default();
        let heap = mem.allocate(16, 8, Region::Heap, "malloc").unwrap();
        let stack = mem.allocate(4, 4, Region::Stack, "x").unwrap();
        assert!(matches!(mem.free(heap + 4), Err(MemoryError::InvalidFree { .. })));
        assert!(matches!(mem.free(stack), Err(MemoryError::InvalidFree { .. })));
        assert_eq!(mem.free(NULL), Ok(()));
    }

    #[test]
    fn test_addresses_never_reused() {
        let mut mem = Memory::default();
        let a = mem.allocate(4, 4, Region::Stack, "x").unwrap();
        mem.release(a).unwrap();
        let b = mem.allocate(4, 4, Region::Stack, "x").unwrap();
        assert_ne!(a, b);
        assert!(matches!(mem.read(a, 4), Err(MemoryError::Released { .. })));
    }

    #[test]
    fn test_heap_limit() {
        let limits = MemoryLimits {
            heap: 32,
            ..MemoryLimits::default()
        };
        let mut mem = Memory::new(limits, true);
        mem.allocate(24, 8, Region::Heap, "malloc").unwrap();
        assert!(matches!(
            mem.allocate(16, 8, Region::Heap, "malloc"),
            Err(MemoryError::OutOfMemory { region: Region::Heap, .. })
        ));
    }

    #[test]
    fn test_stack_and_static_limits() {
        let limits = MemoryLimits {
            heap: 1024,
            stack: 64,
            statics: 128,
        };
        let mut mem = Memory::new(limits, true);
        let a = mem.allocate(48, 8, Region::Stack, "a").unwrap();
        assert!(matches!(
            mem.allocate(32, 8, Region::Stack, "b"),
            Err(MemoryError::OutOfMemory { region: Region::Stack, requested: 32, in_use: 48, limit: 64 })
        ));
        mem.release(a).unwrap();
        assert_eq!(mem.in_use(Region::Stack), 0);
        assert!(mem.allocate(32, 8, Region::Stack, "b").is_ok());

        assert!(matches!(
            mem.allocate(usize::MAX, 1, Region::Static, "huge"),
            Err(MemoryError::OutOfMemory { region: Region::Static, .. })
        ));
        assert!(matches!(
            mem.fill(a, 0, usize::MAX),
            Err(MemoryError::Released { .. })
        ));
    }

    #[test]
    fn test_folded_tombstones_keep_their_diagnosis() {
        let mut mem = Memory::default();
        let first = mem.allocate_zeroed(16, 8, Region::Heap, "malloc").unwrap();
        let live = mem.allocate_zeroed(8, 8, Region::Heap, "kept").unwrap();
        mem.free(first).unwrap();
        let mut oldest_scratch = None;
        for _ in 0..MAX_TOMBSTONES + 8 {
            let scratch = mem.allocate(4, 4, Region::Stack, "scratch").unwrap();
            mem.release(scratch).unwrap();
            oldest_scratch.get_or_insert(scratch);
        }
        let oldest_scratch = oldest_scratch.unwrap();

        assert!(matches!(mem.read(first + 4, 4), Err(MemoryError::Released { region: Region::Heap, .. })));
        assert_eq!(mem.free(first), Err(MemoryError::DoubleFree { address: first }));
        assert!(mem.read(live, 8).is_ok());
        assert!(matches!(mem.read(oldest_scratch, 4), Err(MemoryError::Released { region: Region::Stack, .. })));
        assert_eq!(mem.release(oldest_scratch), Err(MemoryError::DoubleFree { address: oldest_scratch }));
    }

    #[test]
    fn test_literals_are_read_only() {
        let mut mem = Memory::default();
        let addr = mem.allocate_literal(b"hi\0").unwrap();
        assert_eq!(mem.read_c_string(addr).unwrap(), b"hi");
        assert!(matches!(mem.write(addr, b"H"), Err(MemoryError::ReadOnly { .. })));
    }

    #[test]
    fn test_copy_overlapping() {
        let mut mem = Memory::default();
        let addr = mem.allocate(6, 1, Region::Heap, "buf").unwrap();
        mem.write(addr, b"abcd").unwrap();
        mem.copy(addr + 2, addr, 4).unwrap();
        assert_eq!(mem.read(addr, 6).unwrap(), b"ababcd");
    }

    #[test]
    fn test_unterminated_string() {
        let mut mem = Memory::default();
        let addr = mem.allocate(3, 1, Region::Heap, "buf").unwrap();
        mem.write(addr, b"abc").unwrap();
        assert!(matches!(mem.read_c_string(addr), Err(MemoryError::OutOfBounds { .. })));
    }
}
