pub mod batch;
pub mod gauge;
pub mod poll;
pub mod snapshot;
