//! Test helpers for pseudoflow.
//!
//! A small syntax tree, a reference traversal that drives the builder the
//! way a front end would, and listing utilities for snapshot tests.

pub mod ast;
pub mod listing;
pub mod processor;

use pseudoflow_core::{CollectingTrace, ControlFlowInstructionsGenerator, GeneratorConfig, Result};
use tracing_subscriber::EnvFilter;

pub use ast::{Catch, Expr, Function, Stmt, TreeBuilder};
pub use listing::{instructions, occurrences, render};
pub use processor::generate;

/// Installs a test-friendly `tracing` subscriber once per process.
///
/// Honors `RUST_LOG`; repeated calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Runs the reference traversal over `function` in a fresh session.
pub fn build(function: &Function) -> Result<CollectingTrace> {
    build_with_config(function, GeneratorConfig::default())
}

pub fn build_with_config(function: &Function, config: GeneratorConfig) -> Result<CollectingTrace> {
    init_tracing();
    let mut generator = ControlFlowInstructionsGenerator::with_config(CollectingTrace::new(), config);
    generate(&mut generator, function);
    generator.finish()
}
