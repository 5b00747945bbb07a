//! Host environment adapters: routing-table reachability, default-route
//! monitoring and sysfs link metadata.

pub mod network;
pub mod route_monitor;
