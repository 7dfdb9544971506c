// Domain layer: data model and ports. Concrete implementations live in adapters.

pub mod model;
pub mod ports;
