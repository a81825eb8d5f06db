//! Chat runtime: payload assembly, settings ownership, change
//! notifications and turn execution.

pub mod assembler;
pub mod feed;
pub mod settings;
pub mod turn;

pub use assembler::assemble;
pub use feed::{spawn_listener, ChangeCue, ChangeFeed};
pub use settings::{SettingsPatch, SettingsStore};
pub use turn::{ChatTurnService, TurnOutcome, SERVICE_UNAVAILABLE_NOTICE};
