// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

// Somewhat arbitrary constants used to size and bound the shadow state.

/// The number of heap reads and writes after which the symbolic heap is swept for references
/// whose concrete objects have been reclaimed.
pub const DEFAULT_GC_THRESHOLD: u64 = 9_000_000;

/// Most methods use only a handful of locals.
pub const DEFAULT_LOCALS_CAPACITY: usize = 8;

/// Initial capacity of a frame's shadow operand stack.
pub const DEFAULT_STACK_CAPACITY: usize = 16;
