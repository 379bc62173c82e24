//! Tool dispatch: confirmation, execution and result collection

pub mod confirm;
mod dispatcher;
pub mod executor;
mod session;

pub use confirm::{
    AutoConfirm, AutoReject, ChannelConfirmer, Confirmation, ConfirmationPolicy, Confirmer,
    PendingConfirmation, TimeoutAction,
};
pub use dispatcher::{Dispatched, Dispatcher, DEFAULT_FIRE_AND_FORGET_PLACEHOLDER};
pub use executor::{ExecutorError, ExecutorResult, FnExecutor, ToolExecutor};
pub use session::{EventSink, SessionState};
