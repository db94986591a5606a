//! Control-flow pseudocode construction.
//!
//! Flattens the structured body of a subroutine (function, accessor, lambda)
//! into a linear instruction sequence connected by labels, the form classic
//! flow analyses (reachability, definite assignment, liveness) expect.
//!
//! ```text
//! traversal ──calls──> ControlFlowInstructionsGenerator
//!                        ├─ worker stack (one Pseudocode per open subroutine)
//!                        ├─ BlockScopes (loops, subroutines, try/finally)
//!                        └─ PseudocodeTrace (finished graphs, representatives, loops)
//! ```
//!
//! The only structural primitive is "jump to label". A jump that leaves one
//! or more try/finally regions is preceded by a replay of those regions'
//! `finally` bodies, innermost first, so every exit path runs the completed
//! finally logic in the flattened graph.

pub mod block;
pub mod builder;
pub mod config;
pub mod error;
pub mod generator;
pub mod instruction;
pub mod label;
pub mod node;
pub mod pseudocode;
pub mod trace;

pub use block::{BlockInfo, BlockScopes, BreakableBlockInfo, LoopInfo, TryFinallyBlockInfo};
pub use builder::{ControlFlowBuilder, FinallyGenerator};
pub use config::GeneratorConfig;
pub use error::{FlowError, Result};
pub use generator::ControlFlowInstructionsGenerator;
pub use instruction::{ExitKind, Instruction};
pub use label::{Label, PseudocodeId};
pub use node::NodeId;
pub use pseudocode::Pseudocode;
pub use trace::{CollectingTrace, EmptyTrace, PseudocodeTrace};
