pub mod heartbeat;
pub mod new_relic;
pub mod powerwall;
pub mod weather;
