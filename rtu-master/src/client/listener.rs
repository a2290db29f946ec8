use std::time::Duration;

use crate::error::RequestError;

/// A generic listener type that can be invoked multiple times
pub trait Listener<T>: Send {
    /// inform the listener that the value has changed
    fn update(&mut self, _value: T) {}
}

/// Listener that does nothing
#[derive(Copy, Clone)]
pub(crate) struct NullListener;

impl NullListener {
    /// create a Box<dyn Listener<T>> that does nothing
    pub(crate) fn create<T>() -> Box<dyn Listener<T>> {
        Box::new(NullListener)
    }
}

impl<T> Listener<T> for NullListener {}

/// Forwards every value into a tokio mpsc channel, dropping values if the channel is full
impl<T> Listener<T> for tokio::sync::mpsc::Sender<T>
where
    T: Send,
{
    fn update(&mut self, value: T) {
        if let Err(err) = self.try_send(value) {
            tracing::debug!("listener dropped a value: {err}");
        }
    }
}

/// state of the serial port
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PortState {
    /// disabled and idle until enabled
    Disabled,
    /// waiting to perform an open retry
    Wait(Duration),
    /// port is open
    Open,
    /// port has been shut down
    Shutdown,
}

/// Events reported by a master channel
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MasterEvent {
    /// The state of the serial port changed
    PortState(PortState),
    /// The serial port reported an error, the request in flight failed with it
    DeviceError(RequestError),
}
