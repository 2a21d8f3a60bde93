pub mod signals;
pub mod snapshot;
