pub mod config;
pub mod echo;
pub mod expectation;
pub mod roundtrip;
pub mod suite;

pub use crate::config::{Config, TimeoutConfig};
pub use crate::roundtrip::{
    CapturedRequest, CapturedResponse, DefaultRoundTripper, Request, RoundTripError, RoundTripper,
};
pub use crate::suite::{ConformanceTest, ShardPlan, ShardSettings, TestRegistry};
