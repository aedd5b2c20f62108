//! Asynchronous job infrastructure: the durable job store and the queue
//! runner that drains it.

pub mod runner;
pub mod store;
#[cfg(test)]
pub mod testing;
pub mod types;
