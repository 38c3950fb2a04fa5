// Execution engine for the C interpreter

use crate::config::RunConfig;
use crate::fs::FileSystem;
use crate::interpreter::errors::{AtLocation, RuntimeError};
use crate::interpreter::files::FileTable;
use crate::interpreter::terminal::Console;
use crate::memory::stack::{Stack, StackFrame};
use crate::memory::value::{Address, Value};
use crate::memory::{Memory, MemoryError, Region};
use crate::parser::ast::{Binding, FunctionDef, Item, NodeId, SourceLocation, Type};
use crate::resolver::layout::Layouts;
use crate::resolver::{GlobalSlot, ResolvedProgram};
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// Pending non-local control transfer out of the statement being executed
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ControlFlow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Tree-walking interpreter over a resolved program
pub struct Interpreter {
    /// Function definitions (name -> FunctionDef)
    pub(crate) functions: FxHashMap<String, Rc<FunctionDef>>,

    pub(crate) layouts: Layouts,

    pub(crate) memory: Memory,

    /// Call stack
    pub(crate) stack: Stack,

    /// Static segment objects awaiting allocation, consumed when the run starts
    statics: Vec<GlobalSlot>,

    /// Base address of each global / static local, by binding index
    pub(crate) globals: Vec<Address>,

    /// Read-only storage of each string literal, created on first evaluation
    literals: FxHashMap<NodeId, Address>,

    pub(crate) console: Console,

    pub(crate) files: FileTable,

    /// `FILE` objects of stdin, stdout and stderr
    pub(crate) streams: [Address; 3],

    pub(crate) control_flow: ControlFlow,

    /// Current source location being executed
    pub(crate) current_location: SourceLocation,

    pub(crate) config: RunConfig,
}

impl Interpreter {
    pub fn new(resolved: ResolvedProgram, config: RunConfig, fs: Box<dyn FileSystem>) -> Self {
        let ResolvedProgram {
            program,
            layouts,
            globals,
        } = resolved;

        let functions = program
            .items
            .into_iter()
            .filter_map(|item| match item {
                Item::Function(def) => Some((def.name.clone(), Rc::new(def))),
                _ => None,
            })
            .collect();

        Interpreter {
            functions,
            layouts,
            memory: Memory::new(config.memory_limits(), config.check_uninitialized),
            stack: Stack::new(),
            statics: globals,
            globals: Vec::new(),
            literals: FxHashMap::default(),
            console: Console::new(config.stdin.clone()),
            files: FileTable::new(fs),
            streams: [0; 3],
            control_flow: ControlFlow::Normal,
            current_location: SourceLocation::default(),
            config,
        }
    }

    /// Run `main` to completion and return the exit status.
    ///
    /// Output written before a runtime error stays available through
    /// [`Interpreter::console`].
    pub fn run(&mut self) -> Result<i32, RuntimeError> {
        self.load_statics()?;

        let main = self
            .functions
            .get("main")
            .cloned()
            .ok_or(RuntimeError::NoMainFunction)?;

        let args = match main.params.len() {
            0 => Vec::new(),
            _ => self.build_argv(main.location)?,
        };
        let args: Vec<Value> = args.into_iter().take(main.params.len()).collect();

        log::info!("running main with {} argument(s)", self.config.args.len());
        match self.call_function(&main, args, main.location) {
            Ok(status) => Ok(status.as_int().unwrap_or(0) as i32),
            Err(RuntimeError::Exit { code }) => {
                log::debug!("exit({}) called", code);
                Ok(code)
            }
            Err(err) => Err(err),
        }
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    /// Consume the interpreter, keeping what the program wrote
    pub fn into_output(self) -> (Vec<u8>, Vec<u8>) {
        self.console.into_output()
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Allocate and initialize the static segment and the standard streams.
    /// Every object is zero-filled before any initializer runs, so
    /// initializers may take the address of later globals.
    fn load_statics(&mut self) -> Result<(), RuntimeError> {
        let statics = std::mem::take(&mut self.statics);
        for slot in &statics {
            let size = self.layouts.size_of(&slot.ty).unwrap_or(0);
            let align = self.layouts.align_of(&slot.ty).unwrap_or(1);
            let address = self
                .memory
                .allocate_zeroed(size, align, Region::Static, slot.name.as_str())
                .at(slot.location)?;
            self.globals.push(address);
        }

        for fd in 0..3 {
            self.streams[fd] = self.new_stream(fd as i64, Region::Static, SourceLocation::default())?;
        }

        for (slot, &address) in statics.iter().zip(&self.globals.clone()) {
            if let Some(init) = &slot.init {
                self.current_location = slot.location;
                self.initialize(address, &slot.ty, init)?;
            }
        }
        log::debug!("static segment holds {} object(s)", statics.len());
        Ok(())
    }

    /// `argc` and `argv` for `main`; the strings and the pointer array live
    /// in the static segment
    fn build_argv(&mut self, location: SourceLocation) -> Result<Vec<Value>, RuntimeError> {
        let argv: Vec<String> = self.config.argv().into_iter().map(str::to_string).collect();
        let mut pointers = Vec::with_capacity(argv.len() + 1);
        for (i, arg) in argv.iter().enumerate() {
            let mut bytes = arg.as_bytes().to_vec();
            bytes.push(0);
            let address = self
                .memory
                .allocate(bytes.len(), 1, Region::Static, format!("argv[{}]", i))
                .at(location)?;
            self.memory.write(address, &bytes).at(location)?;
            pointers.push(address);
        }
        pointers.push(0);

        let bytes: Vec<u8> = pointers.iter().flat_map(|p| p.to_le_bytes()).collect();
        let array = self
            .memory
            .allocate(bytes.len(), 8, Region::Static, "argv")
            .at(location)?;
        self.memory.write(array, &bytes).at(location)?;
        Ok(vec![Value::Int(argv.len() as i64), Value::Pointer(array)])
    }

    /// Call a user-defined function with already converted arguments
    pub(crate) fn call_function(
        &mut self,
        def: &FunctionDef,
        args: Vec<Value>,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        if self.stack.depth() >= self.config.max_call_depth {
            return Err(RuntimeError::StackOverflow {
                function: def.name.clone(),
                limit: self.config.max_call_depth,
                location,
            });
        }
        log::trace!("call {} at {}", def.name, location);

        self.stack.push_frame(StackFrame::new(
            def.name.clone(),
            def.frame_size,
            def.return_type.clone(),
            location,
        ));
        self.enter_scope();

        let result = self.execute_function_body(def, args);
        if let Err(err) = &result {
            if !matches!(err, RuntimeError::Exit { .. }) {
                log::debug!("unwinding {}: {}", self.stack.backtrace().join(" -> "), err);
            }
        }

        if let Some(frame) = self.stack.current_frame_mut() {
            let allocated = frame.pop_all_scopes();
            for address in allocated {
                self.memory.release(address).at(location)?;
            }
        }
        self.stack.pop_frame();
        self.current_location = location;

        result
    }

    fn execute_function_body(&mut self, def: &FunctionDef, args: Vec<Value>) -> Result<Value, RuntimeError> {
        for (param, value) in def.params.iter().zip(args) {
            let Some(slot) = param.slot else { continue };
            let address = self.allocate_local(slot, &param.ty, param.name.as_deref().unwrap_or("?"), param.location)?;
            self.store(address, &param.ty, &value, param.location)?;
        }

        self.execute_statements(&def.body)?;

        match std::mem::replace(&mut self.control_flow, ControlFlow::Normal) {
            ControlFlow::Return(value) => Ok(value),
            _ => self.zero_value(&def.return_type).at(def.location),
        }
    }

    /// Value of a function that ends without `return`: `main` yields 0 and
    /// so does every other non-void function
    fn zero_value(&self, ty: &Type) -> Result<Value, MemoryError> {
        Ok(match ty {
            Type::Void => Value::Void,
            Type::Float | Type::Double => Value::Float(0.0),
            Type::Pointer(_) => Value::Pointer(0),
            Type::Struct(_) => {
                let size = self.layouts.size_of(ty).unwrap_or(0);
                if size > self.config.stack_limit {
                    return Err(MemoryError::OutOfMemory {
                        region: Region::Stack,
                        requested: size,
                        in_use: self.memory.in_use(Region::Stack),
                        limit: self.config.stack_limit,
                    });
                }
                Value::Bytes(vec![0; size])
            }
            _ => Value::Int(0),
        })
    }

    /// Allocate stack storage for local `slot` in the innermost scope
    pub(crate) fn allocate_local(
        &mut self,
        slot: usize,
        ty: &Type,
        name: &str,
        location: SourceLocation,
    ) -> Result<Address, RuntimeError> {
        let size = self.layouts.size_of(ty).unwrap_or(0);
        let align = self.layouts.align_of(ty).unwrap_or(1);
        let address = self.memory.allocate(size, align, Region::Stack, name).at(location)?;
        match self.stack.current_frame_mut() {
            Some(frame) => frame.bind(slot, address),
            None => {
                return Err(RuntimeError::UnresolvedSymbol {
                    name: name.to_string(),
                    location,
                })
            }
        }
        Ok(address)
    }

    pub(crate) fn enter_scope(&mut self) {
        if let Some(frame) = self.stack.current_frame_mut() {
            frame.push_scope();
        }
    }

    /// Leave the innermost scope, releasing its objects newest first
    pub(crate) fn exit_scope(&mut self) -> Result<(), RuntimeError> {
        let released = match self.stack.current_frame_mut() {
            Some(frame) => frame.pop_scope(),
            None => return Ok(()),
        };
        for address in released {
            self.memory.release(address).at(self.current_location)?;
        }
        Ok(())
    }

    /// Address of the object a resolved identifier names
    pub(crate) fn binding_address(
        &self,
        binding: Option<Binding>,
        name: &str,
        location: SourceLocation,
    ) -> Result<Address, RuntimeError> {
        let address = match binding {
            Some(Binding::Local(slot)) => self.stack.current_frame().and_then(|frame| frame.slot(slot)),
            Some(Binding::Global(index)) => self.globals.get(index).copied(),
            None => None,
        };
        address.ok_or_else(|| RuntimeError::UnresolvedSymbol {
            name: name.to_string(),
            location,
        })
    }

    /// Storage of a string literal; one read-only block per literal occurrence
    pub(crate) fn literal_address(
        &mut self,
        id: NodeId,
        bytes: &[u8],
        location: SourceLocation,
    ) -> Result<Address, RuntimeError> {
        if let Some(&address) = self.literals.get(&id) {
            return Ok(address);
        }
        let mut data = bytes.to_vec();
        data.push(0);
        let address = self.memory.allocate_literal(&data).at(location)?;
        self.literals.insert(id, address);
        Ok(address)
    }

    /// Read an object of type `ty`. Arrays evaluate to the address of their
    /// first element.
    pub(crate) fn load(&self, address: Address, ty: &Type, location: SourceLocation) -> Result<Value, RuntimeError> {
        match ty {
            Type::Array(..) => Ok(Value::Pointer(address)),
            Type::Struct(_) => {
                let size = self.layouts.size_of(ty).unwrap_or(0);
                if address == 0 {
                    return Err(RuntimeError::memory(crate::memory::MemoryError::Null, location));
                }
                Ok(Value::Bytes(self.memory.read_raw(address, size).at(location)?))
            }
            _ => self.memory.read_scalar(address, ty).at(location),
        }
    }

    pub(crate) fn store(
        &mut self,
        address: Address,
        ty: &Type,
        value: &Value,
        location: SourceLocation,
    ) -> Result<(), RuntimeError> {
        match value {
            Value::Bytes(bytes) if ty.is_struct() => self.memory.write(address, bytes).at(location),
            _ => self.memory.write_scalar(address, ty, value).at(location),
        }
    }
}
