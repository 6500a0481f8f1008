pub mod cluster;
pub mod directive;
pub mod jobspec;
pub mod matcher;
pub mod select;
pub mod subsystem;
pub mod transform;
pub mod utils;
