// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::{Result, VmError};
use crate::frame::{Frame, FrameKind};
use crate::heap::SymbolicHeap;
use crate::operand::{HostValue, Operand, OperandStack};
use crate::options::Options;
use crate::path_constraint::{BranchKind, BranchLocation, Comparator, Constraint, PathConstraint};
use crate::reference::{ConcreteObject, Reference};
use crate::summaries::FunctionRegistry;
use crate::symbolic_value::SymbolicValue;

use log_derive::{logfn, logfn_inputs};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::rc::Rc;

/// Counters that describe a run.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Statistics {
    pub instructions: u64,
    /// Calls to methods that were neither instrumented nor summarized.
    pub opaque_calls: u64,
    pub summarized_calls: u64,
    pub gc_runs: u64,
    pub collected_entries: u64,
}

/// Everything the engine knows about the execution it shadows.
///
/// There is one of these per analysis run. It is handed to the instruction visitors by mutable
/// borrow, so there is no global state.
pub struct SymbolicEnvironment {
    /// The shadow call stack. The first frame is always the stack bottom sentinel.
    pub frames: Vec<Frame>,
    pub heap: SymbolicHeap,
    pub path_constraint: PathConstraint,
    pub functions: FunctionRegistry,
    pub statistics: Statistics,
}

impl Debug for SymbolicEnvironment {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_list().entries(self.frames.iter()).finish()
    }
}

impl SymbolicEnvironment {
    pub fn new(options: &Options) -> SymbolicEnvironment {
        SymbolicEnvironment {
            frames: vec![Frame::stack_bottom()],
            heap: SymbolicHeap::new(options.gc_threshold),
            path_constraint: PathConstraint::default(),
            functions: FunctionRegistry::default(),
            statistics: Statistics::default(),
        }
    }

    pub fn top_frame(&self) -> Result<&Frame> {
        self.frames.last().ok_or(VmError::EmptyFrameStack)
    }

    pub fn top_frame_mut(&mut self) -> Result<&mut Frame> {
        self.frames.last_mut().ok_or(VmError::EmptyFrameStack)
    }

    /// The frame below the top frame.
    pub fn caller_frame_mut(&mut self) -> Result<&mut Frame> {
        let len = self.frames.len();
        if len < 2 {
            return Err(VmError::EmptyFrameStack);
        }
        Ok(&mut self.frames[len - 2])
    }

    pub fn stack(&mut self) -> Result<&mut OperandStack> {
        Ok(&mut self.top_frame_mut()?.operand_stack)
    }

    #[logfn_inputs(TRACE)]
    pub fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Pops the top frame. The stack bottom sentinel is never popped.
    #[logfn(TRACE)]
    pub fn pop_frame(&mut self) -> Result<Frame> {
        if self.frames.len() < 2 {
            return Err(VmError::EmptyFrameStack);
        }
        self.frames.pop().ok_or(VmError::EmptyFrameStack)
    }

    /// Counters, including those kept by the heap.
    pub fn statistics(&self) -> Statistics {
        Statistics {
            gc_runs: self.heap.gc_runs(),
            collected_entries: self.heap.collected_entries(),
            ..self.statistics
        }
    }

    /// Turns a concrete value reported by the host into the operand the shadow stack should
    /// hold for it when nothing is known about how it was computed.
    pub fn operand_for(&mut self, value: &HostValue) -> Result<Operand> {
        match value {
            HostValue::Reference(object) => Ok(Operand::Reference(
                self.heap.get_reference(object.as_ref()),
            )),
            _ => {
                let concrete = value.numeric_value(value.kind())?;
                Operand::from_value(value.kind(), SymbolicValue::make_constant(concrete))
            }
        }
    }

    /// Links a shadow reference to the concrete object the host reports for it.
    pub fn link_reference(&mut self, reference: &Rc<Reference>, object: Option<&Rc<ConcreteObject>>) {
        if let Some(object) = object {
            if !reference.is_null() {
                self.heap.initialize_reference(reference, object);
            }
        }
    }

    /// The location used for checks that the instrumentation does not number, such as array
    /// bounds checks. It names the method of the top frame.
    pub fn implicit_location(&self) -> BranchLocation {
        let (class_name, method_name) = match self.frames.last().map(|f| &f.kind) {
            Some(FrameKind::Method { owner, name, .. }) => (owner.clone(), name.clone()),
            Some(FrameKind::ClassInitializer { class_name }) => {
                (class_name.clone(), Rc::from("<clinit>"))
            }
            _ => (Rc::from(""), Rc::from("")),
        };
        BranchLocation {
            class_name,
            method_name,
            branch_index: None,
        }
    }

    /// Records a branch if its constraint depends on an input.
    pub fn record_branch(
        &mut self,
        location: BranchLocation,
        kind: BranchKind,
        left: Rc<SymbolicValue>,
        comparator: Comparator,
        right: Rc<SymbolicValue>,
    ) {
        let constraint = Constraint::new(left, comparator, right);
        if constraint.is_symbolic() {
            self.path_constraint
                .record_branch(location, kind, constraint);
        }
    }
}
