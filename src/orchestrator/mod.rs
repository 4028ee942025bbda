//! Dependent two-stage lookup orchestration.
//!
//! `matcher` reduces stage-1 results to a resolution, `pipeline` is the pure state machine
//! that decides what runs next, `controller` drives it against a `DependentSource`, and
//! `presenter` is the interface presentation layers implement to consume its events.

mod controller;
mod matcher;
mod pipeline;
mod presenter;

pub(crate) use controller::{run_controller, UiCommand};
pub use presenter::{dispatch, Presenter, Progress};
