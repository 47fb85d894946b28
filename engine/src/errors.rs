// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, VmError>;

/// Everything that can go wrong while shadowing a concrete execution.
///
/// None of these are recoverable. Faulting arithmetic, opaque library calls and stale
/// references are handled locally by the interpreter and never show up here.
#[derive(Error, Clone, Debug, Eq, PartialEq)]
pub enum VmError {
    #[error("operand mismatch: expected {expected} but found {found} on the shadow stack")]
    OperandMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("pop from an empty shadow operand stack")]
    EmptyOperandStack,

    #[error("local {index} holds {found} but {expected} was expected")]
    LocalMismatch {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error("local {index} was never written")]
    UndefinedLocal { index: usize },

    #[error("{operation} is not defined on a sentinel frame")]
    SentinelFrame { operation: &'static str },

    #[error("the shadow frame stack is empty")]
    EmptyFrameStack,

    #[error("malformed type descriptor: {descriptor}")]
    MalformedDescriptor { descriptor: String },

    #[error("unexpected instruction: {reason}")]
    UnexpectedInstruction { reason: String },

    #[error("summary of {function} has no argument {index}")]
    MissingSummaryArgument { function: String, index: usize },

    #[error("invalid trace: {reason}")]
    InvalidTrace { reason: String },
}

impl VmError {
    pub fn unexpected<S: Into<String>>(reason: S) -> Self {
        VmError::UnexpectedInstruction {
            reason: reason.into(),
        }
    }

    pub fn invalid_trace<E: std::fmt::Display>(e: E) -> Self {
        VmError::InvalidTrace {
            reason: e.to_string(),
        }
    }

    /// True if the error means the instrumentation and the shadow state disagree, as opposed
    /// to a malformed input handed to the engine.
    pub fn is_desynchronization(&self) -> bool {
        !matches!(
            self,
            VmError::MalformedDescriptor { .. } | VmError::InvalidTrace { .. }
        )
    }
}
