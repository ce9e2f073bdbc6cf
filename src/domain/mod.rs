// Domain layer: view model, request/style types and the ports the controller depends on.

pub mod model;
pub mod ports;
