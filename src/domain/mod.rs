// Domain layer: core models and ports (interfaces). Adapters live under config/ and core/.

pub mod model;
pub mod ports;
