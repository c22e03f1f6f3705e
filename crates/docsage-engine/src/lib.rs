//! # DocSage Engine
//! The conversation core: explicit dialog state machine, localization,
//! intent derivation, retrieval-augmented answering, and the per-turn
//! driver that wires them to the store, oracles, index, and messenger.

pub mod answer;
pub mod dialog;
pub mod intent;
pub mod localize;
pub mod phrases;
pub mod turn;

pub use answer::AnswerService;
pub use dialog::{Action, DialogState, Event, Step, session_is_fresh, transition};
pub use localize::Localizer;
pub use turn::{Engine, TurnStatus};
