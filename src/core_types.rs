/* Copyright (c) Meta Platforms, Inc. and affiliates. All rights reserved.
 *
 * This source code is licensed under the Apache 2.0 license found in
 * the LICENSE file in the root directory of this source tree.
 */

// variables are named x_0, x_1, etc..
pub type VarNum = u32;
pub type Weight = f64;

pub const VAR_NAME_STUB: &str = "x_";
// Incremented by the generated code itself, and returned by run() so that the work can't be optimized away.
pub const EXEC_COUNTER: &str = "execCount";

// Integer literals are drawn from [1, DEFAULT_MAX_INT)
pub const DEFAULT_MAX_INT: i32 = 100;
pub const DEFAULT_MIN_MEANINGFUL: u32 = 10;

pub fn var_name(v: VarNum) -> String {
    format!("{}{}", VAR_NAME_STUB, v)
}

// Zero-guarded helpers defined by every assembled program, see program.rs
pub const SAFE_DIV: &str = "safeDiv";
pub const SAFE_MOD: &str = "safeMod";
