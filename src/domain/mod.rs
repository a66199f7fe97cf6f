// Domain layer: core models and ports (interfaces). No transport types here.

pub mod model;
pub mod ports;
