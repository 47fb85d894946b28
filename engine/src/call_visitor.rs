// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::descriptor::{MethodDescriptor, ValueKind};
use crate::environment::SymbolicEnvironment;
use crate::errors::{Result, VmError};
use crate::frame::{Dispatch, Frame, FrameKind, PendingCall};
use crate::operand::{HostValue, Operand};
use crate::reference::ConcreteObject;
use crate::summaries::{Argument, CallResult};

use log_derive::logfn_inputs;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// Handles method entry and exit, calls and exception handlers.
///
/// A call is seen from two sides. The caller reports the invocation, each argument and
/// finally the result. If the callee is instrumented, it also reports its own entry, its
/// parameters and its return, in between. The events of a call arrive in this order:
///
/// 1. `visit_invoke`, while the receiver and the arguments are still on the caller's stack.
/// 2. `visit_caller_stack_param`, once per argument.
/// 3. If the callee is instrumented: `visit_method_begin`, the parameter events, the body of
///    the callee and `visit_return`.
/// 4. `visit_call_result`.
///
/// The arguments stay on the caller's stack until either the callee returns or the call
/// result arrives, whichever comes first.
pub struct CallVisitor<'env> {
    pub env: &'env mut SymbolicEnvironment,
}

impl Debug for CallVisitor<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        "CallVisitor".fmt(f)
    }
}

impl<'env> CallVisitor<'env> {
    pub fn new(env: &'env mut SymbolicEnvironment) -> CallVisitor<'env> {
        CallVisitor { env }
    }

    /// A method, constructor or static initializer starts running.
    #[logfn_inputs(TRACE)]
    pub fn visit_method_begin(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        is_static: bool,
    ) -> Result<()> {
        if name == "<clinit>" {
            self.env.push_frame(Frame::new(FrameKind::ClassInitializer {
                class_name: Rc::from(owner),
            }));
            return Ok(());
        }
        let descriptor = MethodDescriptor::parse(descriptor)?;
        let is_constructor = name == "<init>";
        let mut frame = Frame::new(FrameKind::Method {
            owner: Rc::from(owner),
            name: Rc::from(name),
            descriptor: descriptor.clone(),
            is_static,
            is_constructor,
        });

        let dispatch = match &mut self.env.top_frame_mut()?.pending_call {
            Some(call)
                if !call.callee_entered
                    && &*call.name == name
                    && call.descriptor == descriptor =>
            {
                call.callee_entered = true;
                Some(call.dispatch)
            }
            _ => None,
        };

        match dispatch {
            Some(dispatch) => {
                if dispatch.has_receiver() == is_static {
                    return Err(VmError::unexpected(format!(
                        "{:?} call entered {}.{} with is_static = {}",
                        dispatch, owner, name, is_static
                    )));
                }
                self.copy_arguments(&mut frame, &descriptor, is_static)?;
                frame.called_from_instrumented_code = true;
            }
            None if is_constructor => {
                // The allocation happened in code the engine did not see.
                let reference = self.env.heap.new_uninitialized_reference(owner);
                frame.locals.store(0, Operand::Reference(reference));
            }
            None => {
                debug!("{}.{} entered from code that is not instrumented", owner, name);
            }
        }
        self.env.push_frame(frame);
        Ok(())
    }

    /// Copies the receiver and the arguments of a call from the caller's stack into the locals
    /// of the callee. The caller keeps them until the callee returns.
    fn copy_arguments(
        &self,
        frame: &mut Frame,
        descriptor: &MethodDescriptor,
        is_static: bool,
    ) -> Result<()> {
        let stack = &self.env.top_frame()?.operand_stack;
        let count = descriptor.parameter_count();
        let mut slot = usize::from(!is_static);
        for (position, kind) in descriptor.parameters.iter().enumerate() {
            let operand = stack.peek(count - 1 - position)?.clone();
            check_kind(*kind, &operand)?;
            frame.locals.store(slot, operand);
            slot += kind.slot_count();
        }
        if !is_static {
            let receiver = stack.peek(count)?.clone();
            check_kind(ValueKind::Reference, &receiver)?;
            frame.locals.store(0, receiver);
        }
        Ok(())
    }

    /// The receiver of the method that just started.
    #[logfn_inputs(TRACE)]
    pub fn visit_method_begin_receiver(&mut self, receiver: Option<Rc<ConcreteObject>>) -> Result<()> {
        let existing = match self.env.top_frame()?.locals.load(0) {
            Ok(Operand::Reference(reference)) => Some(reference.clone()),
            _ => None,
        };
        match existing {
            Some(reference) => self.env.link_reference(&reference, receiver.as_ref()),
            None => {
                let reference = self.env.heap.get_reference(receiver.as_ref());
                self.env
                    .top_frame_mut()?
                    .locals
                    .store(0, Operand::Reference(reference));
            }
        }
        Ok(())
    }

    /// Parameter `parameter` of the method that just started. If the caller passed it
    /// through the shadow stack, it is already in place and the value only serves to link
    /// references.
    #[logfn_inputs(TRACE)]
    pub fn visit_method_begin_param(&mut self, parameter: usize, value: HostValue) -> Result<()> {
        let frame = self.env.top_frame()?;
        let slot = frame.parameter_slot(parameter)?;
        let expected = frame.descriptor()?.parameters[parameter];
        if value.kind() != expected {
            return Err(VmError::OperandMismatch {
                expected: expected.name(),
                found: value.kind().name(),
            });
        }
        if frame.called_from_instrumented_code {
            let reference = match frame.locals.load(slot)? {
                Operand::Reference(reference) => reference.clone(),
                _ => return Ok(()),
            };
            self.env.link_reference(&reference, value.object());
            return Ok(());
        }
        let operand = self.env.operand_for(&value)?;
        self.env.top_frame_mut()?.locals.store(slot, operand);
        Ok(())
    }

    /// INVOKESTATIC, INVOKESPECIAL, INVOKEVIRTUAL and INVOKEINTERFACE. Arms the pending call
    /// of the current frame. The receiver is the concrete object the call is dispatched on,
    /// if there is one and it is already initialized.
    #[logfn_inputs(TRACE)]
    pub fn visit_invoke(
        &mut self,
        dispatch: Dispatch,
        owner: &str,
        name: &str,
        descriptor: &str,
        receiver: Option<Rc<ConcreteObject>>,
    ) -> Result<()> {
        let parsed = MethodDescriptor::parse(descriptor)?;
        let mut summary = self.env.functions.start_call(owner, name, descriptor);
        if dispatch.has_receiver() {
            let reference = self
                .env
                .top_frame()?
                .operand_stack
                .peek(parsed.parameter_count())?
                .reference()?
                .clone();
            self.env.link_reference(&reference, receiver.as_ref());
            if let Some(call) = summary.as_mut() {
                call.set_argument(
                    0,
                    Argument {
                        operand: Operand::Reference(reference),
                        concrete: HostValue::Reference(receiver),
                    },
                )?;
            }
        }
        let frame = self.env.top_frame_mut()?;
        if let Some(previous) = &frame.pending_call {
            debug!("abandoning pending call of {}.{}", previous.owner, previous.name);
        }
        frame.pending_call = Some(PendingCall {
            dispatch,
            owner: Rc::from(owner),
            name: Rc::from(name),
            descriptor: parsed,
            callee_entered: false,
            callee_returned: false,
            summary,
        });
        Ok(())
    }

    /// Argument `parameter` of the pending call, as the caller pushed it. Arguments are found
    /// on the caller's stack counting down from the top, since the last one was pushed last.
    #[logfn_inputs(TRACE)]
    pub fn visit_caller_stack_param(&mut self, parameter: usize, value: HostValue) -> Result<()> {
        let frame = self.env.top_frame()?;
        let call = frame.pending_call.as_ref().ok_or_else(|| {
            VmError::unexpected(format!("argument {} without a pending call", parameter))
        })?;
        let count = call.descriptor.parameter_count();
        if parameter >= count {
            return Err(VmError::unexpected(format!(
                "argument {} of {}.{}{:?}",
                parameter, call.owner, call.name, call.descriptor
            )));
        }
        let receiver_offset = usize::from(call.dispatch.has_receiver());
        let operand = frame.operand_stack.peek(count - 1 - parameter)?.clone();
        check_kind(value.kind(), &operand)?;
        if let Operand::Reference(reference) = &operand {
            self.env.link_reference(reference, value.object());
        }
        let frame = self.env.top_frame_mut()?;
        if let Some(summary) = frame
            .pending_call
            .as_mut()
            .and_then(|call| call.summary.as_mut())
        {
            summary.set_argument(
                parameter + receiver_offset,
                Argument {
                    operand,
                    concrete: value,
                },
            )?;
        }
        Ok(())
    }

    /// RETURN and its typed variants. `kind` is None for RETURN.
    ///
    /// Pops the frame of the returning method. If the caller passed the arguments through
    /// the shadow stack, they are popped now and the return value takes their place.
    #[logfn_inputs(TRACE)]
    pub fn visit_return(&mut self, kind: Option<ValueKind>) -> Result<()> {
        let mut callee = self.env.pop_frame()?;
        if let FrameKind::ClassInitializer { .. } = callee.kind {
            return Ok(());
        }
        let result = match kind {
            Some(kind) => {
                let operand = callee.operand_stack.pop()?;
                check_kind(kind, &operand)?;
                Some(operand)
            }
            None => None,
        };
        if !callee.called_from_instrumented_code {
            return Ok(());
        }
        let caller = self.env.top_frame_mut()?;
        let call = caller
            .pending_call
            .as_mut()
            .filter(|call| call.callee_entered && !call.callee_returned)
            .ok_or_else(|| VmError::unexpected("return without a matching call"))?;
        call.callee_returned = true;
        let count = call.operand_count();
        caller.operand_stack.pop_many(count)?;
        if let Some(result) = result {
            caller.operand_stack.push(result);
        }
        Ok(())
    }

    /// The caller regains control after a call. `result` is None for void methods.
    ///
    /// If no instrumented callee produced a return value, the arguments are still on the
    /// stack. They are dropped, and the result is pushed as a constant. A summary of the
    /// callee may then replace that constant with an expression.
    #[logfn_inputs(TRACE)]
    pub fn visit_call_result(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        result: Option<HostValue>,
    ) -> Result<()> {
        let call = self.env.top_frame_mut()?.pending_call.take().ok_or_else(|| {
            VmError::unexpected(format!("result of {}.{} without a pending call", owner, name))
        })?;
        if &*call.owner != owner || &*call.name != name || &*call.descriptor.text != descriptor {
            return Err(VmError::unexpected(format!(
                "result of {}.{}{} while {}.{}{:?} is pending",
                owner, name, descriptor, call.owner, call.name, call.descriptor
            )));
        }
        let result_kind = result.as_ref().map(HostValue::kind);
        if result_kind != call.descriptor.result {
            return Err(VmError::OperandMismatch {
                expected: call.descriptor.result.map_or("void", ValueKind::name),
                found: result_kind.map_or("void", ValueKind::name),
            });
        }

        if !call.callee_returned {
            self.env.stack()?.pop_many(call.operand_count())?;
            if let Some(value) = &result {
                let operand = self.env.operand_for(value)?;
                self.env.stack()?.push(operand);
            }
            if call.summary.is_none() {
                self.env.statistics.opaque_calls += 1;
            }
        }

        if let Some(summary) = &call.summary {
            match &result {
                Some(value) => {
                    let top = self.env.stack()?.peek(0)?.clone();
                    let replacement = summary.apply(
                        &CallResult {
                            operand: &top,
                            concrete: value,
                        },
                        &mut self.env.heap,
                    )?;
                    if let Some(replacement) = replacement {
                        self.env.stack()?.replace_top(replacement)?;
                    }
                }
                None => summary.apply_void(&mut self.env.heap)?,
            }
            self.env.statistics.summarized_calls += 1;
        }
        Ok(())
    }

    /// An exception handler of the given method starts running. Frames of the methods the
    /// exception passed through are discarded.
    #[logfn_inputs(TRACE)]
    pub fn visit_handler_begin(
        &mut self,
        owner: &str,
        name: &str,
        exception: Option<Rc<ConcreteObject>>,
    ) -> Result<()> {
        loop {
            let frame = self.env.top_frame()?;
            let found = if name == "<clinit>" {
                matches!(&frame.kind, FrameKind::ClassInitializer { class_name }
                    if &**class_name == owner)
            } else {
                frame.is_method(owner, name)
            };
            if found {
                break;
            }
            if self.env.frames.len() < 2 {
                return Err(VmError::unexpected(format!(
                    "handler of {}.{} has no frame",
                    owner, name
                )));
            }
            let discarded = self.env.pop_frame()?;
            debug!("unwinding {:?}", discarded.kind);
        }
        let reference = self.env.heap.get_reference(exception.as_ref());
        let frame = self.env.top_frame_mut()?;
        frame.operand_stack.clear();
        frame.pending_call = None;
        frame.operand_stack.push_reference(reference);
        Ok(())
    }
}

fn check_kind(expected: ValueKind, operand: &Operand) -> Result<()> {
    if operand.kind() != expected {
        return Err(VmError::OperandMismatch {
            expected: expected.name(),
            found: operand.kind().name(),
        });
    }
    Ok(())
}
