//! Protocol engine for the DMRlink client:
//! - `session`: login/keep-alive state machine over the homebrew envelope
//! - `scheduler`: superframe cursor and outbound burst pacing
//! - `mode`: capability trait shared by digital-voice protocol engines
//! - `engine`: single-threaded event loop tying it all together
//! - `transport`: the UDP socket

pub mod engine;
pub mod mode;
pub mod scheduler;
pub mod session;
pub mod transport;

pub use engine::{Engine, EngineCommand, EngineEvent};
pub use mode::{CallContext, DigitalMode};
pub use session::{Session, SessionEvent, SessionOutput, SessionState};
