//! Line-delimited JSON protocol over stdio.
//!
//! - `event`: outbound event vocabulary, envelope, and bare control lines.
//! - `command`: inbound command parsing.
//! - `codec`: [`LinesCodec`](tokio_util::codec::LinesCodec)-based inbound framing.
//! - `emitter`: envelope construction and sequence numbering.
//! - `writer`: the task that owns stdout.

pub mod codec;
pub mod command;
pub mod emitter;
pub mod event;
pub mod writer;

pub use command::{parse_command, Command};
pub use emitter::{Emitter, Transcript};
pub use event::{ControlMessage, Envelope, Event, Phase, PhaseState};
