/* Copyright (c) Meta Platforms, Inc. and affiliates. All rights reserved.
 *
 * This source code is licensed under the Apache 2.0 license found in
 * the LICENSE file in the root directory of this source tree.
 */

mod core_types;
mod generator;
mod grammar;
mod instrumenter;
mod program;
mod state;

pub use core_types::DEFAULT_MAX_INT;
pub use core_types::DEFAULT_MIN_MEANINGFUL;
pub use core_types::EXEC_COUNTER;
pub use core_types::VAR_NAME_STUB;
pub use generator::gen_program;
pub use generator::sample;
pub use generator::Config;
pub use grammar::ChoicePoint;
pub use grammar::Grammar;
pub use grammar::GrammarError;
pub use grammar::Production;
pub use instrumenter::InstrumentationKind;
pub use instrumenter::Instrumenter;
pub use instrumenter::NaiveInstrumenter;
pub use instrumenter::NoInstrumenter;
pub use program::artifact_name;
pub use program::Artifact;
pub use program::Program;
pub use state::BranchKind;
pub use state::BranchPoint;
pub use state::ProgramState;
