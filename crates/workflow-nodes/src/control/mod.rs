//! Branching, pacing and iteration nodes

mod condition;
mod delay;
mod loop_node;

pub use condition::{ConditionNode, Operator};
pub use delay::{DelayNode, DelayUnit};
pub use loop_node::{LoopNode, LoopType};
