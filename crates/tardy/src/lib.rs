#![doc = include_str!("../README.md")]

mod collector;
mod config;
mod engine;
mod error;
mod mask;
mod pool;
mod queue;
mod simulator;
mod step;
mod task;
mod types;
mod worker;

pub use crate::collector::*;
pub use crate::config::*;
pub use crate::engine::*;
pub use crate::error::*;
pub use crate::mask::*;
pub use crate::pool::*;
pub use crate::queue::*;
pub use crate::simulator::*;
pub use crate::step::*;
pub use crate::task::*;
pub use crate::types::*;
pub use crate::worker::*;
