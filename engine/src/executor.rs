// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::arithmetic_visitor::{
    ArithmeticVisitor, BinaryInstruction, ComparisonInstruction, ConversionInstruction,
    UnaryInstruction,
};
use crate::call_visitor::CallVisitor;
use crate::descriptor::ValueKind;
use crate::environment::{Statistics, SymbolicEnvironment};
use crate::errors::{Result, VmError};
use crate::frame::Dispatch;
use crate::heap_visitor::HeapVisitor;
use crate::jump_visitor::{Condition, JumpVisitor};
use crate::operand::HostValue;
use crate::options::Options;
use crate::path_constraint::{BranchCondition, BranchLocation};
use crate::reference::ConcreteObject;
use crate::stack_visitor::{StackInstruction, StackVisitor};

use log_derive::logfn;
use std::fmt::{Arguments, Debug, Formatter};
use std::rc::Rc;

/// The surface the instrumentation drives. There is one method per instruction callback,
/// each of which forwards to the visitor that handles its category.
///
/// The first error poisons the executor: the shadow state no longer describes the concrete
/// execution, so every later callback fails with the same error.
pub struct SymbolicExecutor {
    env: SymbolicEnvironment,
    options: Options,
    poisoned: Option<VmError>,
}

impl Debug for SymbolicExecutor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        "SymbolicExecutor".fmt(f)
    }
}

impl Default for SymbolicExecutor {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

/// Constructors and state
impl SymbolicExecutor {
    pub fn new(options: Options) -> SymbolicExecutor {
        SymbolicExecutor {
            env: SymbolicEnvironment::new(&options),
            options,
            poisoned: None,
        }
    }

    pub fn env(&self) -> &SymbolicEnvironment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut SymbolicEnvironment {
        &mut self.env
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The error that ended the run, if any.
    pub fn poisoned(&self) -> Option<&VmError> {
        self.poisoned.as_ref()
    }

    /// The branch conditions of the execution so far, oldest first.
    pub fn snapshot(&self) -> Vec<Rc<BranchCondition>> {
        self.env.path_constraint.snapshot()
    }

    pub fn statistics(&self) -> Statistics {
        self.env.statistics()
    }

    /// Sweeps the symbolic heap now rather than when the threshold is reached.
    #[logfn(DEBUG)]
    pub fn symbolic_gc(&mut self) -> usize {
        self.env.heap.symbolic_gc()
    }

    /// Counts and logs an instruction, and hands out the environment unless the executor is
    /// poisoned.
    fn begin(&mut self, instruction: Arguments<'_>) -> Result<&mut SymbolicEnvironment> {
        if let Some(error) = &self.poisoned {
            return Err(error.clone());
        }
        self.env.statistics.instructions += 1;
        if self.options.log_instructions {
            info!("{}", instruction);
        }
        Ok(&mut self.env)
    }

    fn finish(&mut self, result: Result<()>) -> Result<()> {
        if let Err(error) = &result {
            warn!(
                "instruction {} failed: {}",
                self.env.statistics.instructions, error
            );
            self.poisoned = Some(error.clone());
        }
        result
    }
}

/// Constants, locals and stack shuffles
impl SymbolicExecutor {
    pub fn constant(&mut self, value: HostValue) -> Result<()> {
        let env = self.begin(format_args!("constant {:?}", value))?;
        let result = StackVisitor::new(env).visit_constant(value);
        self.finish(result)
    }

    /// Pushes an input of the program under test as a named variable.
    pub fn symbolic_input(&mut self, name: &str, value: HostValue) -> Result<()> {
        let env = self.begin(format_args!("input {} = {:?}", name, value))?;
        let result = StackVisitor::new(env).visit_symbolic_input(name, value);
        self.finish(result)
    }

    pub fn load(&mut self, kind: ValueKind, index: usize) -> Result<()> {
        let env = self.begin(format_args!("load {:?} {}", kind, index))?;
        let result = StackVisitor::new(env).visit_load(kind, index);
        self.finish(result)
    }

    pub fn store(&mut self, kind: ValueKind, index: usize) -> Result<()> {
        let env = self.begin(format_args!("store {:?} {}", kind, index))?;
        let result = StackVisitor::new(env).visit_store(kind, index);
        self.finish(result)
    }

    pub fn stack(&mut self, instruction: StackInstruction) -> Result<()> {
        let env = self.begin(format_args!("{:?}", instruction))?;
        let result = StackVisitor::new(env).visit_stack(instruction);
        self.finish(result)
    }
}

/// Arithmetic
impl SymbolicExecutor {
    pub fn binary(&mut self, instruction: BinaryInstruction) -> Result<()> {
        let env = self.begin(format_args!("{:?}", instruction))?;
        let result = ArithmeticVisitor::new(env).visit_binary(instruction);
        self.finish(result)
    }

    pub fn unary(&mut self, instruction: UnaryInstruction) -> Result<()> {
        let env = self.begin(format_args!("{:?}", instruction))?;
        let result = ArithmeticVisitor::new(env).visit_unary(instruction);
        self.finish(result)
    }

    pub fn comparison(&mut self, instruction: ComparisonInstruction) -> Result<()> {
        let env = self.begin(format_args!("{:?}", instruction))?;
        let result = ArithmeticVisitor::new(env).visit_comparison(instruction);
        self.finish(result)
    }

    pub fn conversion(&mut self, instruction: ConversionInstruction) -> Result<()> {
        let env = self.begin(format_args!("{:?}", instruction))?;
        let result = ArithmeticVisitor::new(env).visit_conversion(instruction);
        self.finish(result)
    }

    pub fn increment(&mut self, index: usize, delta: i32) -> Result<()> {
        let env = self.begin(format_args!("iinc {} {}", index, delta))?;
        let result = ArithmeticVisitor::new(env).visit_increment(index, delta);
        self.finish(result)
    }
}

/// Objects, fields and arrays
impl SymbolicExecutor {
    pub fn new_object(&mut self, class_name: &str) -> Result<()> {
        let env = self.begin(format_args!("new {}", class_name))?;
        let result = HeapVisitor::new(env).visit_new(class_name);
        self.finish(result)
    }

    pub fn get_field(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        holder: Option<Rc<ConcreteObject>>,
        value: HostValue,
    ) -> Result<()> {
        let env = self.begin(format_args!("getfield {}.{}", owner, name))?;
        let result = HeapVisitor::new(env).visit_get_field(owner, name, descriptor, holder, value);
        self.finish(result)
    }

    pub fn put_field(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        holder: Option<Rc<ConcreteObject>>,
    ) -> Result<()> {
        let env = self.begin(format_args!("putfield {}.{}", owner, name))?;
        let result = HeapVisitor::new(env).visit_put_field(owner, name, descriptor, holder);
        self.finish(result)
    }

    pub fn get_static(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        value: HostValue,
    ) -> Result<()> {
        let env = self.begin(format_args!("getstatic {}.{}", owner, name))?;
        let result = HeapVisitor::new(env).visit_get_static(owner, name, descriptor, value);
        self.finish(result)
    }

    pub fn put_static(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<()> {
        let env = self.begin(format_args!("putstatic {}.{}", owner, name))?;
        let result = HeapVisitor::new(env).visit_put_static(owner, name, descriptor);
        self.finish(result)
    }

    pub fn new_array(&mut self, type_name: &str) -> Result<()> {
        let env = self.begin(format_args!("newarray {}", type_name))?;
        let result = HeapVisitor::new(env).visit_new_array(type_name);
        self.finish(result)
    }

    pub fn multi_new_array(&mut self, type_name: &str, dimensions: usize) -> Result<()> {
        let env = self.begin(format_args!("multianewarray {} {}", type_name, dimensions))?;
        let result = HeapVisitor::new(env).visit_multi_new_array(type_name, dimensions);
        self.finish(result)
    }

    pub fn array_length(&mut self, array: Option<Rc<ConcreteObject>>) -> Result<()> {
        let env = self.begin(format_args!("arraylength"))?;
        let result = HeapVisitor::new(env).visit_array_length(array);
        self.finish(result)
    }

    pub fn array_load(
        &mut self,
        kind: ValueKind,
        array: Option<Rc<ConcreteObject>>,
        value: HostValue,
    ) -> Result<()> {
        let env = self.begin(format_args!("array load {:?}", kind))?;
        let result = HeapVisitor::new(env).visit_array_load(kind, array, value);
        self.finish(result)
    }

    pub fn array_store(&mut self, kind: ValueKind, array: Option<Rc<ConcreteObject>>) -> Result<()> {
        let env = self.begin(format_args!("array store {:?}", kind))?;
        let result = HeapVisitor::new(env).visit_array_store(kind, array);
        self.finish(result)
    }

    pub fn check_cast(&mut self, value: Option<Rc<ConcreteObject>>) -> Result<()> {
        let env = self.begin(format_args!("checkcast"))?;
        let result = HeapVisitor::new(env).visit_check_cast(value);
        self.finish(result)
    }

    pub fn instance_of(&mut self, value: Option<Rc<ConcreteObject>>, result: bool) -> Result<()> {
        let env = self.begin(format_args!("instanceof {}", result))?;
        let result = HeapVisitor::new(env).visit_instance_of(value, result);
        self.finish(result)
    }
}

/// Jumps
impl SymbolicExecutor {
    pub fn if_zero(&mut self, condition: Condition, location: BranchLocation, value: i32) -> Result<()> {
        let env = self.begin(format_args!("if {:?} zero at {:?}", condition, location))?;
        let result = JumpVisitor::new(env).visit_if_zero(condition, location, value);
        self.finish(result)
    }

    pub fn if_compare(
        &mut self,
        condition: Condition,
        location: BranchLocation,
        left: i32,
        right: i32,
    ) -> Result<()> {
        let env = self.begin(format_args!("if_icmp {:?} at {:?}", condition, location))?;
        let result = JumpVisitor::new(env).visit_if_compare(condition, location, left, right);
        self.finish(result)
    }

    pub fn if_reference(
        &mut self,
        left: Option<Rc<ConcreteObject>>,
        right: Option<Rc<ConcreteObject>>,
    ) -> Result<()> {
        let env = self.begin(format_args!("if_acmp"))?;
        let result = JumpVisitor::new(env).visit_if_reference(left, right);
        self.finish(result)
    }

    pub fn if_null(&mut self, value: Option<Rc<ConcreteObject>>) -> Result<()> {
        let env = self.begin(format_args!("ifnull"))?;
        let result = JumpVisitor::new(env).visit_if_null(value);
        self.finish(result)
    }

    pub fn table_switch(
        &mut self,
        location: BranchLocation,
        value: i32,
        low: i32,
        high: i32,
    ) -> Result<()> {
        let env = self.begin(format_args!("tableswitch at {:?}", location))?;
        let result = JumpVisitor::new(env).visit_table_switch(location, value, low, high);
        self.finish(result)
    }

    pub fn lookup_switch(&mut self, location: BranchLocation, value: i32, goals: &[i32]) -> Result<()> {
        let env = self.begin(format_args!("lookupswitch at {:?}", location))?;
        let result = JumpVisitor::new(env).visit_lookup_switch(location, value, goals);
        self.finish(result)
    }

    /// GOTO does not touch the shadow state.
    pub fn goto(&mut self) -> Result<()> {
        self.begin(format_args!("goto"))?;
        Ok(())
    }

    pub fn throw(&mut self, exception: Option<Rc<ConcreteObject>>) -> Result<()> {
        let env = self.begin(format_args!("athrow"))?;
        let result = JumpVisitor::new(env).visit_throw(exception);
        self.finish(result)
    }
}

/// Calls
impl SymbolicExecutor {
    pub fn method_begin(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        is_static: bool,
    ) -> Result<()> {
        let env = self.begin(format_args!("begin {}.{}{}", owner, name, descriptor))?;
        let result = CallVisitor::new(env).visit_method_begin(owner, name, descriptor, is_static);
        self.finish(result)
    }

    pub fn method_begin_receiver(&mut self, receiver: Option<Rc<ConcreteObject>>) -> Result<()> {
        let env = self.begin(format_args!("begin receiver"))?;
        let result = CallVisitor::new(env).visit_method_begin_receiver(receiver);
        self.finish(result)
    }

    pub fn method_begin_param(&mut self, parameter: usize, value: HostValue) -> Result<()> {
        let env = self.begin(format_args!("begin param {} = {:?}", parameter, value))?;
        let result = CallVisitor::new(env).visit_method_begin_param(parameter, value);
        self.finish(result)
    }

    pub fn invoke(
        &mut self,
        dispatch: Dispatch,
        owner: &str,
        name: &str,
        descriptor: &str,
        receiver: Option<Rc<ConcreteObject>>,
    ) -> Result<()> {
        let env = self.begin(format_args!("invoke {:?} {}.{}{}", dispatch, owner, name, descriptor))?;
        let result = CallVisitor::new(env).visit_invoke(dispatch, owner, name, descriptor, receiver);
        self.finish(result)
    }

    pub fn caller_stack_param(&mut self, parameter: usize, value: HostValue) -> Result<()> {
        let env = self.begin(format_args!("argument {} = {:?}", parameter, value))?;
        let result = CallVisitor::new(env).visit_caller_stack_param(parameter, value);
        self.finish(result)
    }

    /// RETURN when `kind` is None, otherwise IRETURN, LRETURN, FRETURN, DRETURN or ARETURN.
    pub fn method_return(&mut self, kind: Option<ValueKind>) -> Result<()> {
        let env = self.begin(format_args!("return {:?}", kind))?;
        let result = CallVisitor::new(env).visit_return(kind);
        self.finish(result)
    }

    pub fn call_result(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        result: Option<HostValue>,
    ) -> Result<()> {
        let env = self.begin(format_args!("result of {}.{}{} = {:?}", owner, name, descriptor, result))?;
        let result = CallVisitor::new(env).visit_call_result(owner, name, descriptor, result);
        self.finish(result)
    }

    pub fn handler_begin(
        &mut self,
        owner: &str,
        name: &str,
        exception: Option<Rc<ConcreteObject>>,
    ) -> Result<()> {
        let env = self.begin(format_args!("handler in {}.{}", owner, name))?;
        let result = CallVisitor::new(env).visit_handler_begin(owner, name, exception);
        self.finish(result)
    }
}
