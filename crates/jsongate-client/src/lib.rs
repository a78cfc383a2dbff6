//! Host side of the jsongate link: routing, request correlation, sessions
//!
//! This crate also provides the `jsongate` command-line interface.

pub mod cli;
pub mod commands;
pub mod config;
pub mod correlator;
pub mod error;
pub mod hex;
pub mod link;
pub mod router;

pub use cli::Cli;
pub use config::{ClientConfig, LinkSettings};
pub use correlator::{MatchPredicate, QueryOutcome, RequestCorrelator};
pub use error::{ClientError, ClientResult};
pub use link::{Inbound, Link, Session};
pub use router::{MessageRouter, RouteOutcome};
