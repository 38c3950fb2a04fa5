//! Call stack implementation
//!
//! This module provides the call stack for function execution:
//! - [`Stack`]: The call stack containing frames
//! - [`StackFrame`]: A single function's activation record
//!
//! Each frame maps the resolver's local slot indices to the addresses of the
//! blocks allocated for them, and keeps a scope stack recording what each
//! block scope allocated so the allocations can be released LIFO on exit.

use super::value::Address;
use crate::parser::ast::{SourceLocation, Type};

#[derive(Debug, Clone, Default)]
struct ScopeData {
    /// (slot, address) pairs allocated in this scope, in allocation order
    allocated: Vec<(usize, Address)>,
}

/// Stack frame for a function call
#[derive(Debug, Clone)]
pub struct StackFrame {
    pub function_name: String,
    pub return_type: Type,
    /// Location of the call expression (for diagnostics)
    pub call_location: SourceLocation,
    slots: Vec<Option<Address>>,
    scope_stack: Vec<ScopeData>,
}

impl StackFrame {
    pub fn new(
        function_name: String,
        frame_size: usize,
        return_type: Type,
        call_location: SourceLocation,
    ) -> Self {
        StackFrame {
            function_name,
            return_type,
            call_location,
            slots: vec![None; frame_size],
            scope_stack: Vec::new(),
        }
    }

    /// Enter a new scope
    pub fn push_scope(&mut self) {
        self.scope_stack.push(ScopeData::default());
    }

    /// Exit the current scope, returning its allocations newest first
    pub fn pop_scope(&mut self) -> Vec<Address> {
        let Some(scope) = self.scope_stack.pop() else {
            return Vec::new();
        };
        scope
            .allocated
            .into_iter()
            .rev()
            .map(|(slot, address)| {
                if let Some(entry) = self.slots.get_mut(slot) {
                    *entry = None;
                }
                address
            })
            .collect()
    }

    /// Exit every open scope (function return)
    pub fn pop_all_scopes(&mut self) -> Vec<Address> {
        let mut released = Vec::new();
        while !self.scope_stack.is_empty() {
            released.extend(self.pop_scope());
        }
        released
    }

    /// Bind a local slot to its storage in the current scope
    pub fn bind(&mut self, slot: usize, address: Address) {
        if slot >= self.slots.len() {
            self.slots.resize(slot + 1, None);
        }
        self.slots[slot] = Some(address);
        if let Some(scope) = self.scope_stack.last_mut() {
            scope.allocated.push((slot, address));
        }
    }

    /// Address bound to a local slot, if its declaration has executed
    pub fn slot(&self, slot: usize) -> Option<Address> {
        self.slots.get(slot).copied().flatten()
    }

    pub fn scope_depth(&self) -> usize {
        self.scope_stack.len()
    }
}

/// The call stack
#[derive(Debug, Clone, Default)]
pub struct Stack {
    frames: Vec<StackFrame>,
}

impl Stack {
    pub fn new() -> Self {
        Stack { frames: Vec::new() }
    }

    /// Push a new stack frame
    pub fn push_frame(&mut self, frame: StackFrame) {
        self.frames.push(frame);
    }

    /// Pop the top stack frame
    pub fn pop_frame(&mut self) -> Option<StackFrame> {
        self.frames.pop()
    }

    /// Get the current (top) frame
    pub fn current_frame(&self) -> Option<&StackFrame> {
        self.frames.last()
    }

    /// Get a mutable reference to the current frame
    pub fn current_frame_mut(&mut self) -> Option<&mut StackFrame> {
        self.frames.last_mut()
    }

    /// Get the depth of the call stack
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Check if stack is empty
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Function names from the outermost call inwards
    pub fn backtrace(&self) -> Vec<&str> {
        self.frames.iter().map(|f| f.function_name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scopes_release_lifo_and_unbind() {
        let mut frame = StackFrame::new("main".into(), 3, Type::Int, SourceLocation::default());
        frame.push_scope();
        frame.bind(0, 0x100);
        frame.push_scope();
        frame.bind(1, 0x200);
        frame.bind(2, 0x300);

        assert_eq!(frame.pop_scope(), vec![0x300, 0x200]);
        assert_eq!(frame.slot(1), None);
        assert_eq!(frame.slot(0), Some(0x100));
        assert_eq!(frame.pop_all_scopes(), vec![0x100]);
        assert_eq!(frame.scope_depth(), 0);
    }

    #[test]
    fn test_stack_frames() {
        let mut stack = Stack::new();
        assert!(stack.is_empty());
        stack.push_frame(StackFrame::new("main".into(), 0, Type::Int, SourceLocation::default()));
        stack.push_frame(StackFrame::new("f".into(), 0, Type::Void, SourceLocation::default()));
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.backtrace(), vec!["main", "f"]);
        assert_eq!(stack.pop_frame().map(|f| f.function_name), Some("f".to_string()));
    }
}
