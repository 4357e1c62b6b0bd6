pub mod fixture;
pub mod stub;

pub use fixture::{artifact_tarball, FixtureTree};
pub use stub::{Call, Failure, Operation, StubGateway};
