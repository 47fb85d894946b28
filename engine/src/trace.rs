// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! A trace is a recorded run of the instrumentation callbacks, stored as a JSON array of
//! events. Replaying it drives a `SymbolicExecutor` exactly as the live instrumentation would.
//!
//! Concrete objects are named by small integers. A `new_object` event brings an object into
//! existence and a `release` event drops the last strong reference to it, which is what lets
//! traces exercise the parts of the engine that care about object lifetimes.

use crate::arithmetic_visitor::{
    BinaryInstruction, ComparisonInstruction, ConversionInstruction, UnaryInstruction,
};
use crate::descriptor::ValueKind;
use crate::errors::{Result, VmError};
use crate::executor::SymbolicExecutor;
use crate::frame::Dispatch;
use crate::jump_visitor::Condition;
use crate::operand::HostValue;
use crate::options::Options;
use crate::path_constraint::BranchLocation;
use crate::reference::{ConcreteObject, ObjectKind};
use crate::stack_visitor::StackInstruction;

use log_derive::logfn_inputs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::rc::Rc;

/// A concrete value as it appears in a trace. Objects are referred to by their trace id.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TraceValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Null,
    Object(u64),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    NewObject {
        id: u64,
        class_name: String,
        /// Defaults to the low bits of the id.
        #[serde(default)]
        identity_hash: Option<i32>,
        kind: ObjectKind,
    },
    Release {
        id: u64,
    },
    SymbolicGc,

    Constant {
        value: TraceValue,
    },
    SymbolicInput {
        name: String,
        value: TraceValue,
    },
    Load {
        kind: ValueKind,
        index: usize,
    },
    Store {
        kind: ValueKind,
        index: usize,
    },
    Stack {
        instruction: StackInstruction,
    },
    Binary {
        instruction: BinaryInstruction,
    },
    Unary {
        instruction: UnaryInstruction,
    },
    Comparison {
        instruction: ComparisonInstruction,
    },
    Conversion {
        instruction: ConversionInstruction,
    },
    Increment {
        index: usize,
        delta: i32,
    },

    New {
        class_name: String,
    },
    GetField {
        owner: String,
        name: String,
        descriptor: String,
        holder: Option<u64>,
        value: TraceValue,
    },
    PutField {
        owner: String,
        name: String,
        descriptor: String,
        holder: Option<u64>,
    },
    GetStatic {
        owner: String,
        name: String,
        descriptor: String,
        value: TraceValue,
    },
    PutStatic {
        owner: String,
        name: String,
        descriptor: String,
    },
    NewArray {
        type_name: String,
    },
    MultiNewArray {
        type_name: String,
        dimensions: usize,
    },
    ArrayLength {
        array: Option<u64>,
    },
    ArrayLoad {
        kind: ValueKind,
        array: Option<u64>,
        value: TraceValue,
    },
    ArrayStore {
        kind: ValueKind,
        array: Option<u64>,
    },
    CheckCast {
        value: Option<u64>,
    },
    InstanceOf {
        value: Option<u64>,
        result: bool,
    },

    IfZero {
        condition: Condition,
        location: BranchLocation,
        value: i32,
    },
    IfCompare {
        condition: Condition,
        location: BranchLocation,
        left: i32,
        right: i32,
    },
    IfReference {
        left: Option<u64>,
        right: Option<u64>,
    },
    IfNull {
        value: Option<u64>,
    },
    TableSwitch {
        location: BranchLocation,
        value: i32,
        low: i32,
        high: i32,
    },
    LookupSwitch {
        location: BranchLocation,
        value: i32,
        goals: Vec<i32>,
    },
    Goto,
    Throw {
        exception: Option<u64>,
    },

    MethodBegin {
        owner: String,
        name: String,
        descriptor: String,
        is_static: bool,
    },
    MethodBeginReceiver {
        receiver: Option<u64>,
    },
    MethodBeginParam {
        parameter: usize,
        value: TraceValue,
    },
    Invoke {
        dispatch: Dispatch,
        owner: String,
        name: String,
        descriptor: String,
        #[serde(default)]
        receiver: Option<u64>,
    },
    CallerStackParam {
        parameter: usize,
        value: TraceValue,
    },
    Return {
        #[serde(default)]
        kind: Option<ValueKind>,
    },
    CallResult {
        owner: String,
        name: String,
        descriptor: String,
        #[serde(default)]
        result: Option<TraceValue>,
    },
    HandlerBegin {
        owner: String,
        name: String,
        exception: Option<u64>,
    },
}

/// Feeds trace events to an executor, keeping the concrete objects of the trace alive in
/// between.
pub struct TraceReplayer {
    executor: SymbolicExecutor,
    objects: HashMap<u64, Rc<ConcreteObject>>,
}

impl Debug for TraceReplayer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceReplayer")
            .field("objects", &self.objects.len())
            .finish()
    }
}

impl TraceReplayer {
    pub fn new(options: Options) -> TraceReplayer {
        TraceReplayer {
            executor: SymbolicExecutor::new(options),
            objects: HashMap::new(),
        }
    }

    /// Reads a trace from a JSON file.
    pub fn load(path: &Path) -> Result<Vec<TraceEvent>> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| VmError::invalid_trace(format!("{}: {}", path.display(), e)))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Vec<TraceEvent>> {
        serde_json::from_str(text).map_err(VmError::invalid_trace)
    }

    pub fn executor(&self) -> &SymbolicExecutor {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut SymbolicExecutor {
        &mut self.executor
    }

    pub fn into_executor(self) -> SymbolicExecutor {
        self.executor
    }

    /// Replays the events in order and stops at the first error.
    pub fn replay(&mut self, events: Vec<TraceEvent>) -> Result<()> {
        for (position, event) in events.into_iter().enumerate() {
            self.step(event).map_err(|e| {
                debug!("trace event {} failed", position);
                e
            })?;
        }
        Ok(())
    }

    fn object(&self, id: Option<u64>) -> Result<Option<Rc<ConcreteObject>>> {
        match id {
            None => Ok(None),
            Some(id) => self
                .objects
                .get(&id)
                .cloned()
                .map(Some)
                .ok_or_else(|| VmError::invalid_trace(format!("unknown object {}", id))),
        }
    }

    fn value(&self, value: TraceValue) -> Result<HostValue> {
        Ok(match value {
            TraceValue::Int(v) => HostValue::Int(v),
            TraceValue::Long(v) => HostValue::Long(v),
            TraceValue::Float(v) => HostValue::Float(v),
            TraceValue::Double(v) => HostValue::Double(v),
            TraceValue::Null => HostValue::Reference(None),
            TraceValue::Object(id) => HostValue::Reference(self.object(Some(id))?),
        })
    }

    #[logfn_inputs(TRACE)]
    pub fn step(&mut self, event: TraceEvent) -> Result<()> {
        use TraceEvent::*;
        match event {
            NewObject {
                id,
                class_name,
                identity_hash,
                kind,
            } => {
                let hash = identity_hash.unwrap_or(id as i32);
                let object = ConcreteObject::new(hash, &class_name, kind);
                if self.objects.insert(id, object).is_some() {
                    return Err(VmError::invalid_trace(format!("object {} created twice", id)));
                }
                Ok(())
            }
            Release { id } => match self.objects.remove(&id) {
                Some(..) => Ok(()),
                None => Err(VmError::invalid_trace(format!("unknown object {}", id))),
            },
            SymbolicGc => {
                self.executor.symbolic_gc();
                Ok(())
            }

            Constant { value } => {
                let value = self.value(value)?;
                self.executor.constant(value)
            }
            SymbolicInput { name, value } => {
                let value = self.value(value)?;
                self.executor.symbolic_input(&name, value)
            }
            Load { kind, index } => self.executor.load(kind, index),
            Store { kind, index } => self.executor.store(kind, index),
            Stack { instruction } => self.executor.stack(instruction),
            Binary { instruction } => self.executor.binary(instruction),
            Unary { instruction } => self.executor.unary(instruction),
            Comparison { instruction } => self.executor.comparison(instruction),
            Conversion { instruction } => self.executor.conversion(instruction),
            Increment { index, delta } => self.executor.increment(index, delta),

            New { class_name } => self.executor.new_object(&class_name),
            GetField {
                owner,
                name,
                descriptor,
                holder,
                value,
            } => {
                let holder = self.object(holder)?;
                let value = self.value(value)?;
                self.executor
                    .get_field(&owner, &name, &descriptor, holder, value)
            }
            PutField {
                owner,
                name,
                descriptor,
                holder,
            } => {
                let holder = self.object(holder)?;
                self.executor.put_field(&owner, &name, &descriptor, holder)
            }
            GetStatic {
                owner,
                name,
                descriptor,
                value,
            } => {
                let value = self.value(value)?;
                self.executor.get_static(&owner, &name, &descriptor, value)
            }
            PutStatic {
                owner,
                name,
                descriptor,
            } => self.executor.put_static(&owner, &name, &descriptor),
            NewArray { type_name } => self.executor.new_array(&type_name),
            MultiNewArray {
                type_name,
                dimensions,
            } => self.executor.multi_new_array(&type_name, dimensions),
            ArrayLength { array } => {
                let array = self.object(array)?;
                self.executor.array_length(array)
            }
            ArrayLoad { kind, array, value } => {
                let array = self.object(array)?;
                let value = self.value(value)?;
                self.executor.array_load(kind, array, value)
            }
            ArrayStore { kind, array } => {
                let array = self.object(array)?;
                self.executor.array_store(kind, array)
            }
            CheckCast { value } => {
                let value = self.object(value)?;
                self.executor.check_cast(value)
            }
            InstanceOf { value, result } => {
                let value = self.object(value)?;
                self.executor.instance_of(value, result)
            }

            IfZero {
                condition,
                location,
                value,
            } => self.executor.if_zero(condition, location, value),
            IfCompare {
                condition,
                location,
                left,
                right,
            } => self.executor.if_compare(condition, location, left, right),
            IfReference { left, right } => {
                let left = self.object(left)?;
                let right = self.object(right)?;
                self.executor.if_reference(left, right)
            }
            IfNull { value } => {
                let value = self.object(value)?;
                self.executor.if_null(value)
            }
            TableSwitch {
                location,
                value,
                low,
                high,
            } => self.executor.table_switch(location, value, low, high),
            LookupSwitch {
                location,
                value,
                goals,
            } => self.executor.lookup_switch(location, value, &goals),
            Goto => self.executor.goto(),
            Throw { exception } => {
                let exception = self.object(exception)?;
                self.executor.throw(exception)
            }

            MethodBegin {
                owner,
                name,
                descriptor,
                is_static,
            } => self
                .executor
                .method_begin(&owner, &name, &descriptor, is_static),
            MethodBeginReceiver { receiver } => {
                let receiver = self.object(receiver)?;
                self.executor.method_begin_receiver(receiver)
            }
            MethodBeginParam { parameter, value } => {
                let value = self.value(value)?;
                self.executor.method_begin_param(parameter, value)
            }
            Invoke {
                dispatch,
                owner,
                name,
                descriptor,
                receiver,
            } => {
                let receiver = self.object(receiver)?;
                self.executor
                    .invoke(dispatch, &owner, &name, &descriptor, receiver)
            }
            CallerStackParam { parameter, value } => {
                let value = self.value(value)?;
                self.executor.caller_stack_param(parameter, value)
            }
            Return { kind } => self.executor.method_return(kind),
            CallResult {
                owner,
                name,
                descriptor,
                result,
            } => {
                let result = result.map(|r| self.value(r)).transpose()?;
                self.executor
                    .call_result(&owner, &name, &descriptor, result)
            }
            HandlerBegin {
                owner,
                name,
                exception,
            } => {
                let exception = self.object(exception)?;
                self.executor.handler_begin(&owner, &name, exception)
            }
        }
    }
}
