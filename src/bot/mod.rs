//! Bot module for handling LINE interactions
//!
//! - `controller`: Routes events and owns the pending-action store
//! - `message_handler`: Handles incoming text and image messages
//! - `callback_handler`: Handles confirmation card postbacks
//! - `ui_builder`: Creates confirmation cards and formats replies

pub mod callback_handler;
pub mod controller;
pub mod message_handler;
pub mod ui_builder;

pub use controller::{spawn_session_sweeper, Collaborators, ControllerSettings, InteractionController, Outcome};
pub use ui_builder::{format_analysis_result, format_confirmation, format_error, format_plain_list, ConfirmationPayload};
