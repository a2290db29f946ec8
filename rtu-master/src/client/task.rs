use std::time::Duration;

use tokio::time::Instant;

use crate::client::listener::{Listener, MasterEvent, PortState};
use crate::client::master::{Action, Event, RtuMaster, Timer};
use crate::client::reply::Promise;
use crate::client::request::Request;
use crate::common::phys::PhysLayer;
use crate::decode::DecodeLevel;
use crate::error::*;

/// Messages sent from a [`Channel`](crate::Channel) to its task
pub(crate) enum Command {
    Request(Request, Promise),
    Setting(Setting),
}

pub(crate) enum Setting {
    DecodeLevel(DecodeLevel),
    ResponseTimeout(Duration),
    NumberOfRetries(usize),
    Enable,
    Disable,
}

/**
* We run the master on an open port until one of the following occurs
*/
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum SessionError {
    /// the port failed
    IoError(std::io::ErrorKind),
    /// channel was disabled
    Disabled,
    /// the mpsc is closed (dropped) on the sender side
    Shutdown,
}

impl From<Shutdown> for SessionError {
    fn from(_: Shutdown) -> Self {
        SessionError::Shutdown
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum StateChange {
    Disable,
    Shutdown,
}

impl From<Shutdown> for StateChange {
    fn from(_: Shutdown) -> Self {
        StateChange::Shutdown
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SessionError::IoError(err) => {
                write!(f, "I/O error: {err}")
            }
            SessionError::Disabled => {
                write!(f, "Channel was disabled")
            }
            SessionError::Shutdown => {
                write!(f, "Shutdown was requested")
            }
        }
    }
}

/// Deadlines of the scheduler's timers
#[derive(Default)]
struct Timers {
    inter_frame: Option<Instant>,
    send: Option<Instant>,
    response: Option<Instant>,
}

impl Timers {
    fn slot(&mut self, timer: Timer) -> &mut Option<Instant> {
        match timer {
            Timer::InterFrame => &mut self.inter_frame,
            Timer::Send => &mut self.send,
            Timer::Response => &mut self.response,
        }
    }

    fn start(&mut self, timer: Timer, duration: Duration) {
        *self.slot(timer) = Some(Instant::now() + duration);
    }

    fn stop(&mut self, timer: Timer) {
        *self.slot(timer) = None;
    }

    fn deadline(&mut self, timer: Timer) -> Option<Instant> {
        *self.slot(timer)
    }

    fn clear(&mut self) {
        *self = Self::default();
    }

    fn next(&self) -> Option<(Timer, Instant)> {
        [
            (Timer::InterFrame, self.inter_frame),
            (Timer::Send, self.send),
            (Timer::Response, self.response),
        ]
        .into_iter()
        .filter_map(|(timer, deadline)| deadline.map(|x| (timer, x)))
        .min_by_key(|(_, deadline)| *deadline)
    }

    /// Wait for the earliest timer, forever if none are running
    async fn expired(&mut self) -> Timer {
        match self.next() {
            Some((timer, deadline)) => {
                tokio::time::sleep_until(deadline).await;
                self.stop(timer);
                timer
            }
            None => std::future::pending().await,
        }
    }
}

// RTU frames are at most 256 bytes
const READ_BUFFER_SIZE: usize = 256;

/// Drives an [`RtuMaster`] over a physical layer
pub(crate) struct MasterLoop {
    rx: tokio::sync::mpsc::Receiver<Command>,
    master: RtuMaster,
    timers: Timers,
    listener: Box<dyn Listener<MasterEvent>>,
    decode: DecodeLevel,
    enabled: bool,
}

impl MasterLoop {
    pub(crate) fn new(
        rx: tokio::sync::mpsc::Receiver<Command>,
        master: RtuMaster,
        listener: Box<dyn Listener<MasterEvent>>,
        decode: DecodeLevel,
    ) -> Self {
        Self {
            rx,
            master,
            timers: Timers::default(),
            listener,
            decode,
            enabled: false,
        }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn notify(&mut self, state: PortState) {
        self.listener.update(MasterEvent::PortState(state));
    }

    pub(crate) fn report(&mut self, err: RequestError) {
        self.listener.update(MasterEvent::DeviceError(err));
    }

    async fn recv(&mut self) -> Result<Command, Shutdown> {
        self.rx.recv().await.ok_or(Shutdown)
    }

    /// Run the master until the port fails, the channel is disabled or shut down
    ///
    /// Outstanding requests are aborted before returning.
    pub(crate) async fn run(&mut self, io: &mut PhysLayer) -> SessionError {
        self.master.open();
        let err = loop {
            if let Err(err) = self.poll(io).await {
                break err;
            }
        };
        tracing::warn!("closing port: {err}");
        self.close();
        err
    }

    fn close(&mut self) {
        self.master.close();
        // close only stops timers and aborts replies, nothing left to perform
        while self.master.poll_action().is_some() {}
        self.timers.clear();
    }

    async fn poll(&mut self, io: &mut PhysLayer) -> Result<(), SessionError> {
        self.perform_actions(io).await?;

        let mut buffer = [0u8; READ_BUFFER_SIZE];

        // the mpsc is the queue, take from it only when the master has nothing waiting
        let ready = self.master.queued() == 0;

        tokio::select! {
            res = self.rx.recv(), if ready => {
                let cmd = res.ok_or(Shutdown)?;
                self.run_cmd(cmd)
            }
            res = io.read(&mut buffer, self.decode.physical) => {
                match res {
                    Ok(0) => self.link_error(RequestError::Read(std::io::ErrorKind::UnexpectedEof)),
                    Ok(count) => {
                        if let Some(data) = buffer.get(..count) {
                            self.master.handle(Event::BytesReceived(data));
                        }
                        Ok(())
                    }
                    Err(err) => self.link_error(RequestError::Read(err.kind())),
                }
            }
            timer = self.timers.expired() => {
                self.master.handle(Event::Timeout(timer));
                Ok(())
            }
        }
    }

    async fn perform_actions(&mut self, io: &mut PhysLayer) -> Result<(), SessionError> {
        while let Some(action) = self.master.poll_action() {
            match action {
                Action::Write(bytes) => self.write(io, &bytes).await?,
                Action::StartTimer(timer, duration) => self.timers.start(timer, duration),
                Action::StopTimer(timer) => self.timers.stop(timer),
                Action::ClearLink => {
                    if let Err(err) = io.clear() {
                        tracing::warn!("unable to clear serial port buffers: {err}");
                        self.report(err);
                    }
                }
                Action::DeviceError(err) => self.report(err),
            }
        }
        Ok(())
    }

    /// Write the frame, reporting progress, until it completes or the send timer expires
    async fn write(&mut self, io: &mut PhysLayer, bytes: &[u8]) -> Result<(), SessionError> {
        let mut remaining = bytes;
        while !remaining.is_empty() {
            let write = io.write(remaining, self.decode.physical);
            let result = match self.timers.deadline(Timer::Send) {
                Some(deadline) => match tokio::time::timeout_at(deadline, write).await {
                    Ok(x) => x,
                    Err(_) => {
                        self.timers.stop(Timer::Send);
                        self.master.handle(Event::Timeout(Timer::Send));
                        return Ok(());
                    }
                },
                None => write.await,
            };

            match result {
                Ok(0) => {
                    return self.link_error(RequestError::Write(std::io::ErrorKind::WriteZero))
                }
                Ok(count) => {
                    self.master.handle(Event::BytesWritten(count));
                    remaining = remaining.get(count..).unwrap_or_default();
                }
                Err(err) => return self.link_error(RequestError::Write(err.kind())),
            }
        }
        Ok(())
    }

    /// Report the fault through the master, then end the session
    fn link_error(&mut self, err: RequestError) -> Result<(), SessionError> {
        self.master.handle(Event::LinkError(err));
        while let Some(action) = self.master.poll_action() {
            if let Action::DeviceError(err) = action {
                self.report(err);
            }
        }

        let kind = match err {
            RequestError::Read(x) | RequestError::Write(x) => x,
            _ => std::io::ErrorKind::Other,
        };
        Err(SessionError::IoError(kind))
    }

    fn run_cmd(&mut self, cmd: Command) -> Result<(), SessionError> {
        match cmd {
            Command::Request(request, promise) => {
                self.master.enqueue(request, promise);
                Ok(())
            }
            Command::Setting(setting) => {
                self.change_setting(setting);
                if !self.enabled {
                    return Err(SessionError::Disabled);
                }
                Ok(())
            }
        }
    }

    pub(crate) fn change_setting(&mut self, setting: Setting) {
        match setting {
            Setting::DecodeLevel(level) => {
                tracing::info!("Decode level changed: {:?}", level);
                self.decode = level;
                self.master.set_decode_level(level);
            }
            Setting::ResponseTimeout(timeout) => {
                self.master.set_response_timeout(timeout);
            }
            Setting::NumberOfRetries(retries) => {
                self.master.set_number_of_retries(retries);
            }
            Setting::Enable => {
                if !self.enabled {
                    self.enabled = true;
                    tracing::info!("channel enabled");
                }
            }
            Setting::Disable => {
                if self.enabled {
                    self.enabled = false;
                    tracing::info!("channel disabled");
                }
            }
        }
    }

    pub(crate) async fn wait_for_enabled(&mut self) -> Result<(), Shutdown> {
        loop {
            if self.enabled {
                return Ok(());
            }

            if let Err(StateChange::Shutdown) = self.fail_next_request().await {
                return Err(Shutdown);
            }
        }
    }

    async fn fail_next_request(&mut self) -> Result<(), StateChange> {
        match self.recv().await? {
            Command::Request(_, promise) => {
                promise.failure(RequestError::NoConnection);
                Ok(())
            }
            Command::Setting(x) => {
                self.change_setting(x);
                if self.enabled {
                    Ok(())
                } else {
                    Err(StateChange::Disable)
                }
            }
        }
    }

    pub(crate) async fn fail_requests_for(
        &mut self,
        duration: Duration,
    ) -> Result<(), StateChange> {
        let deadline = Instant::now() + duration;

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    // Timeout occurred
                    return Ok(())
                }
                x = self.fail_next_request() => {
                    x?
                }
            }
        }
    }
}
