// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::descriptor::MethodDescriptor;
use crate::errors::{Result, VmError};
use crate::operand::{LocalsTable, OperandStack};
use crate::summaries::SummaryCall;

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// How the caller dispatched a call. Everything except static calls passes a receiver below
/// the arguments.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Dispatch {
    Static,
    Special,
    Virtual,
    Interface,
}

impl Dispatch {
    pub fn has_receiver(self) -> bool {
        self != Dispatch::Static
    }
}

/// A call made by the code running in a frame that has not yet produced its result.
#[derive(Clone, Debug)]
pub struct PendingCall {
    pub dispatch: Dispatch,
    pub owner: Rc<str>,
    pub name: Rc<str>,
    pub descriptor: MethodDescriptor,
    /// Set when an instrumented callee starts running for this call.
    pub callee_entered: bool,
    /// Set when the instrumented callee has returned and left its result on the caller's stack.
    pub callee_returned: bool,
    /// Present if the callee has a registered summary.
    pub summary: Option<SummaryCall>,
}

impl PendingCall {
    /// The number of operands the call consumes from the caller's stack, receiver included.
    pub fn operand_count(&self) -> usize {
        self.descriptor.parameter_count() + usize::from(self.dispatch.has_receiver())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FrameKind {
    /// Sits below the frame of the first method executed.
    StackBottom,
    /// Marks the execution of a static initializer, which can start at almost any instruction.
    ClassInitializer { class_name: Rc<str> },
    Method {
        owner: Rc<str>,
        name: Rc<str>,
        descriptor: MethodDescriptor,
        is_static: bool,
        is_constructor: bool,
    },
}

/// The shadow of one activation record.
pub struct Frame {
    pub kind: FrameKind,
    pub operand_stack: OperandStack,
    pub locals: LocalsTable,
    pub pending_call: Option<PendingCall>,
    /// True if the caller invoked this frame through a call the engine saw, in which case the
    /// arguments came from the caller's shadow stack.
    pub called_from_instrumented_code: bool,
}

impl Debug for Frame {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("kind", &self.kind)
            .field("operand_stack", &self.operand_stack)
            .finish()
    }
}

impl Frame {
    pub fn new(kind: FrameKind) -> Frame {
        Frame {
            kind,
            operand_stack: OperandStack::default(),
            locals: LocalsTable::default(),
            pending_call: None,
            called_from_instrumented_code: false,
        }
    }

    pub fn stack_bottom() -> Frame {
        Frame::new(FrameKind::StackBottom)
    }

    pub fn is_sentinel(&self) -> bool {
        !matches!(self.kind, FrameKind::Method { .. })
    }

    /// True if this is the frame of the given method.
    pub fn is_method(&self, method_owner: &str, method_name: &str) -> bool {
        matches!(&self.kind, FrameKind::Method { owner, name, .. }
            if &**owner == method_owner && &**name == method_name)
    }

    pub fn descriptor(&self) -> Result<&MethodDescriptor> {
        match &self.kind {
            FrameKind::Method { descriptor, .. } => Ok(descriptor),
            _ => Err(VmError::SentinelFrame {
                operation: "descriptor",
            }),
        }
    }

    /// The number of declared parameters, not counting the receiver.
    pub fn parameter_count(&self) -> Result<usize> {
        match &self.kind {
            FrameKind::Method { descriptor, .. } => Ok(descriptor.parameter_count()),
            _ => Err(VmError::SentinelFrame {
                operation: "parameter_count",
            }),
        }
    }

    /// True if the receiver occupies local 0.
    pub fn has_receiver(&self) -> Result<bool> {
        match &self.kind {
            FrameKind::Method { is_static, .. } => Ok(!is_static),
            _ => Err(VmError::SentinelFrame {
                operation: "has_receiver",
            }),
        }
    }

    /// The locals slot that holds the parameter with the given position.
    pub fn parameter_slot(&self, parameter: usize) -> Result<usize> {
        let descriptor = self.descriptor()?;
        if parameter >= descriptor.parameter_count() {
            return Err(VmError::unexpected(format!(
                "parameter {} of a method with descriptor {:?}",
                parameter, descriptor
            )));
        }
        let receiver = usize::from(self.has_receiver()?);
        Ok(receiver
            + descriptor.parameters[..parameter]
                .iter()
                .map(|k| k.slot_count())
                .sum::<usize>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_have_no_parameters() {
        let bottom = Frame::stack_bottom();
        assert_eq!(
            bottom.parameter_count().unwrap_err(),
            VmError::SentinelFrame {
                operation: "parameter_count"
            }
        );
        let clinit = Frame::new(FrameKind::ClassInitializer {
            class_name: Rc::from("Foo"),
        });
        assert!(clinit.is_sentinel());
        assert!(clinit.parameter_count().is_err());
    }

    #[test]
    fn parameter_slots_skip_the_receiver_and_wide_values() {
        let frame = Frame::new(FrameKind::Method {
            owner: Rc::from("Foo"),
            name: Rc::from("bar"),
            descriptor: MethodDescriptor::parse("(JIF)V").unwrap(),
            is_static: false,
            is_constructor: false,
        });
        assert_eq!(frame.parameter_count().unwrap(), 3);
        assert_eq!(frame.parameter_slot(0).unwrap(), 1);
        assert_eq!(frame.parameter_slot(1).unwrap(), 3);
        assert_eq!(frame.parameter_slot(2).unwrap(), 4);
        assert!(frame.parameter_slot(3).is_err());
    }
}
