//! Services wired from the ports: the controller front door, the worker
//! pools that consume jobs, the encoder driver, and the notifying store
//! facade that links segment writes to readiness notifications.

pub mod controller;
pub mod notify;
pub mod pool;
pub mod worker;
