//! Library side of the `edi` command: configuration, logging and the
//! orchestration session shared with the integration tests.

#![deny(unsafe_code)]

pub mod config;
pub mod logging;
pub mod pipeline;
