//! Fleet-wide coordination: waiting for nodes to boot and fanning commands
//! out across them.

pub mod dispatch;
pub mod poller;

pub use dispatch::Dispatcher;
pub use poller::FleetPoller;
