#[cfg(feature = "serial")]
mod channel;
pub(crate) mod listener;
pub(crate) mod master;
pub(crate) mod reply;
pub(crate) mod request;
#[cfg(feature = "serial")]
pub(crate) mod task;

#[cfg(feature = "serial")]
pub use crate::client::channel::*;
pub use crate::client::listener::*;
pub use crate::client::master::{
    Action, Event, MasterConfig, RtuMaster, State, Timer, MIN_RESPONSE_TIMEOUT,
};
pub use crate::client::reply::*;
pub use crate::client::request::{
    build_read_request, build_read_write_request, build_write_request, decode_response,
    validate_raw_request,
};
