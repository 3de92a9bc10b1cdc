// Application layer - Use cases and the ports they depend on
pub mod clock;
pub mod coalescer;
pub mod dashboard_service;
pub mod freshness_cache;
pub mod monitor_service;
pub mod upstream;

#[cfg(test)]
pub mod testing;
