pub mod dx;

pub use dx::DxCliGateway;
pub use dxtest_core::gateway::{Gateway, GatewayResult, JobDescription, JobSpec};
