mod combinators;
mod core;

pub use combinators::{all, any};
pub use core::{Future, Promise};
