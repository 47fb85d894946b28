// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! A shadow interpreter for concolic testing of JVM programs.
//!
//! The instrumented program reports every instruction it executes, together with the concrete
//! values involved. The engine replays each instruction on a shadow machine whose values are
//! expressions over the inputs of the program, and records the outcome of every branch that
//! depends on an input. The resulting path constraint is what a solver negates to steer the
//! next execution down a different path.

#[macro_use]
extern crate log;

pub mod arithmetic_visitor;
pub mod call_visitor;
pub mod concrete_value;
pub mod descriptor;
pub mod environment;
pub mod errors;
pub mod executor;
pub mod expression;
pub mod frame;
pub mod heap;
pub mod heap_visitor;
pub mod jump_visitor;
pub mod k_limits;
pub mod known_names;
pub mod operand;
pub mod options;
pub mod path_constraint;
pub mod reference;
pub mod stack_visitor;
pub mod summaries;
pub mod symbolic_value;
pub mod trace;
