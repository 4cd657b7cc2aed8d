//! Serial-radio side channel: port discovery and the per-port client.

pub mod link;
pub mod scanner;
