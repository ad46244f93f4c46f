//! Master (segment server) / slave (segment client + applier) replication.
//!
//! The storage façade consults a small tagged role, not a trait object --
//! see `storage::ReplicaRole`.

mod frame;
mod master;
mod slave;

pub use master::Master;
pub use slave::Slave;
