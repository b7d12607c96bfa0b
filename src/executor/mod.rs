mod builder;
mod core;
mod state;
mod worker;

pub use builder::ExecutorBuilder;
pub use core::Executor;
