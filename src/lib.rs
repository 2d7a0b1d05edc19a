//! Transaction-level verification harness for clocked, register-mapped
//! queue cores.
//!
//! A [`session::TestSession`] runs scenarios one after another against a
//! device behind the [`sim_if::SimIf`] boundary. Each scenario gets a fresh
//! [`environment::Environment`]: a driver applying stimulus in the DRIVE
//! phase, a monitor decoding the ports in the SAMPLE phase, a scoreboard
//! checking every read against a reference model, and a coverage tracker
//! shared by the whole session.

pub mod config;
pub mod coverage;
pub mod driver;
pub mod environment;
pub mod error;
mod executor;
pub mod fifo_model;
pub mod junit;
pub mod logging;
pub mod monitor;
pub mod prelude;
pub mod reference;
pub mod scheduler;
pub mod scoreboard;
pub mod session;
mod shared;
pub mod sim_if;
pub mod transaction;
mod trigger;
pub mod utils;
pub mod value;

pub use error::{HarnessError, HarnessResult};
pub use shared::Shared;
pub use trigger::{Phase, Trigger};
