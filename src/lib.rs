//! termcine library crate.
//!
//! Plays video as text in the terminal. The playback pipeline is
//! source -> [`producer`] -> [`store`] -> [`scheduler`] (paced by an
//! [`audio`] clock) -> [`renderer`]; [`session`] wires it together.

pub mod audio;
pub mod captions;
pub mod cli;
pub mod config;
pub mod error;
pub mod frame;
pub mod glyph;
pub mod logging;
pub mod producer;
pub mod renderer;
pub mod scheduler;
pub mod session;
pub mod source;
pub mod store;
pub mod terminal;

pub use error::SessionError;
pub use session::{Session, SessionSummary};
