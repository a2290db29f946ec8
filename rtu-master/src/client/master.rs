use std::collections::VecDeque;
use std::time::Duration;

use crate::client::reply::{Promise, Reply, Response};
use crate::client::request::{self, Expected, Request};
use crate::common::pdu::{Pdu, PduDisplay};
use crate::decode::DecodeLevel;
use crate::error::RequestError;
use crate::serial::frame::{try_parse_response, Adu, RtuDisplay};
use crate::types::{DataUnit, ServerAddress};

/// Response timeouts shorter than this are raised to it
pub const MIN_RESPONSE_TIMEOUT: Duration = Duration::from_millis(50);

/// Configuration of the transaction scheduler
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct MasterConfig {
    response_timeout: Duration,
    number_of_retries: usize,
    inter_frame_delay: Option<Duration>,
    turnaround_delay: Duration,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_millis(1000),
            number_of_retries: 3,
            inter_frame_delay: None,
            turnaround_delay: Duration::from_millis(100),
        }
    }
}

impl MasterConfig {
    /// Default configuration: 1 s response timeout and 3 retries
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the time to wait for a response after a request is written
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.set_response_timeout(timeout);
        self
    }

    /// Set how many times a request is re-sent after the first attempt
    pub fn with_number_of_retries(mut self, retries: usize) -> Self {
        self.number_of_retries = retries;
        self
    }

    /// Override the silent interval between frames
    ///
    /// Only honored when it is longer than the interval required by the baud rate.
    pub fn with_inter_frame_delay(mut self, delay: Duration) -> Self {
        self.inter_frame_delay = Some(delay);
        self
    }

    /// Set the delay after a broadcast before the next request is sent
    pub fn with_turnaround_delay(mut self, delay: Duration) -> Self {
        self.turnaround_delay = delay;
        self
    }

    /// Time to wait for a response after a request is written
    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    /// Number of retries after the first attempt
    pub fn number_of_retries(&self) -> usize {
        self.number_of_retries
    }

    /// Silent interval override, if any
    pub fn inter_frame_delay(&self) -> Option<Duration> {
        self.inter_frame_delay
    }

    /// Delay after a broadcast
    pub fn turnaround_delay(&self) -> Duration {
        self.turnaround_delay
    }

    pub(crate) fn set_response_timeout(&mut self, timeout: Duration) {
        if timeout < MIN_RESPONSE_TIMEOUT {
            tracing::warn!(
                "response timeout of {} ms raised to the minimum of {} ms",
                timeout.as_millis(),
                MIN_RESPONSE_TIMEOUT.as_millis()
            );
        }
        self.response_timeout = timeout.max(MIN_RESPONSE_TIMEOUT);
    }

    pub(crate) fn set_number_of_retries(&mut self, retries: usize) {
        self.number_of_retries = retries;
    }
}

/// Phase of the transaction scheduler
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    /// Nothing queued and nothing in flight
    Idle,
    /// Waiting out the silent interval before taking the next request from the queue
    Schedule,
    /// Writing the current request, or waiting to write it again
    Send,
    /// Request fully written, waiting for the response
    Receive,
}

/// Timers the scheduler asks its driver to run
///
/// Each timer is single-shot. Starting a timer that is already running restarts it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Timer {
    /// Silent interval before the next write (also used for the broadcast turnaround)
    InterFrame,
    /// Bounds how long a write may take to complete
    Send,
    /// Bounds how long to wait for a response
    Response,
}

/// Input to the scheduler
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event<'a> {
    /// The link completed writing this many bytes
    BytesWritten(usize),
    /// The link received these bytes
    BytesReceived(&'a [u8]),
    /// A timer previously started with [`Action::StartTimer`] fired
    Timeout(Timer),
    /// The link reported a fault
    LinkError(RequestError),
}

/// Output of the scheduler, to be performed by its driver in order
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Write these bytes to the link, then report [`Event::BytesWritten`]
    ///
    /// The write is bounded by the [`Timer::Send`] started just before it. Partial progress
    /// may be reported as several events.
    Write(Vec<u8>),
    /// Start (or restart) a timer, then report [`Event::Timeout`] when it fires
    StartTimer(Timer, Duration),
    /// Stop a timer, its expiration must no longer be reported
    StopTimer(Timer),
    /// Discard whatever the link has buffered in either direction
    ClearLink,
    /// Report a device level error
    DeviceError(RequestError),
}

/// One pending transaction
struct QueueElement {
    server: ServerAddress,
    pdu: Pdu,
    adu: Vec<u8>,
    expected: Expected,
    promise: Promise,
    remaining_attempts: usize,
    response_timeout: Duration,
    bytes_written: usize,
    // a write was issued and has not timed out
    writing: bool,
}

impl QueueElement {
    fn is_broadcast(&self) -> bool {
        self.server.is_broadcast()
    }

    fn unit(&self) -> Option<&DataUnit> {
        match &self.expected {
            Expected::Unit(x) => Some(x),
            Expected::Raw => None,
        }
    }
}

/// Modbus RTU master transaction scheduler
///
/// This type performs no I/O and keeps no clock. Requests are queued with the
/// `send_*` methods, and everything that happens on the link or to a timer is
/// fed in with [`RtuMaster::handle`]. In return the scheduler emits [`Action`]s
/// that must be drained with [`RtuMaster::poll_action`] after every call.
///
/// Requests are processed strictly one at a time in the order they were queued.
pub struct RtuMaster {
    config: MasterConfig,
    inter_frame_delay: Duration,
    decode: DecodeLevel,
    state: State,
    open: bool,
    queue: VecDeque<QueueElement>,
    current: Option<QueueElement>,
    rx_buffer: Vec<u8>,
    actions: VecDeque<Action>,
}

impl RtuMaster {
    /// Create a closed master for a line running at `baud_rate`
    pub fn new(config: MasterConfig, baud_rate: u32, decode: DecodeLevel) -> Self {
        let mut config = config;
        config.set_response_timeout(config.response_timeout);

        let required = crate::serial::inter_frame_delay(baud_rate);
        let inter_frame_delay = match config.inter_frame_delay {
            Some(x) if x > required => x,
            _ => required,
        };

        Self {
            config,
            inter_frame_delay,
            decode,
            state: State::Idle,
            open: false,
            queue: VecDeque::new(),
            current: None,
            rx_buffer: Vec::new(),
            actions: VecDeque::new(),
        }
    }

    /// Current phase of the scheduler
    pub fn state(&self) -> State {
        self.state
    }

    /// True between [`RtuMaster::open`] and [`RtuMaster::close`]
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Effective silent interval between frames
    pub fn inter_frame_delay(&self) -> Duration {
        self.inter_frame_delay
    }

    /// Number of requests waiting behind the one in flight
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Current configuration
    pub fn config(&self) -> MasterConfig {
        self.config
    }

    /// Change the response timeout of requests queued from now on
    pub fn set_response_timeout(&mut self, timeout: Duration) {
        self.config.set_response_timeout(timeout);
    }

    /// Change the number of retries of requests queued from now on
    pub fn set_number_of_retries(&mut self, retries: usize) {
        self.config.set_number_of_retries(retries);
    }

    /// Change the protocol decoding level
    pub fn set_decode_level(&mut self, decode: DecodeLevel) {
        self.decode = decode;
    }

    /// The link has been opened, requests are accepted from now on
    pub fn open(&mut self) {
        if !self.open {
            self.open = true;
            self.state = State::Idle;
            self.rx_buffer.clear();
        }
    }

    /// The link is closing
    ///
    /// Every outstanding request, in flight or queued, fails with
    /// [`RequestError::Aborted`] and all timers are stopped.
    pub fn close(&mut self) {
        if !self.open {
            return;
        }

        self.open = false;
        self.stop_all_timers();

        let aborted = self.current.take().into_iter().chain(self.queue.drain(..));
        let mut count = 0;
        for element in aborted {
            count += 1;
            element.promise.failure(RequestError::Aborted);
        }
        if count > 0 {
            tracing::info!("aborted {count} outstanding request(s)");
        }

        self.rx_buffer.clear();
        self.state = State::Idle;
    }

    /// Queue a read of the values described by `unit`
    pub fn send_read_request(
        &mut self,
        unit: DataUnit,
        server: ServerAddress,
    ) -> Result<Reply, RequestError> {
        self.check_open()?;
        Ok(self.submit(Request::read(server, unit)?))
    }

    /// Queue a write of the values in `unit`
    pub fn send_write_request(
        &mut self,
        unit: DataUnit,
        server: ServerAddress,
    ) -> Result<Reply, RequestError> {
        self.check_open()?;
        Ok(self.submit(Request::write(server, unit)?))
    }

    /// Queue a combined write then read of holding registers
    pub fn send_read_write_request(
        &mut self,
        read: DataUnit,
        write: DataUnit,
        server: ServerAddress,
    ) -> Result<Reply, RequestError> {
        self.check_open()?;
        Ok(self.submit(Request::read_write(server, read, write)?))
    }

    /// Queue an arbitrary PDU, the response PDU is returned without decoding
    pub fn send_raw_request(
        &mut self,
        pdu: Pdu,
        server: ServerAddress,
    ) -> Result<Reply, RequestError> {
        self.check_open()?;
        Ok(self.submit(Request::raw(server, pdu)?))
    }

    fn submit(&mut self, request: Request) -> Reply {
        let (promise, reply) = Promise::new();
        self.enqueue(request, promise);
        reply
    }

    /// Next action for the driver, `None` once all have been taken
    pub fn poll_action(&mut self) -> Option<Action> {
        self.actions.pop_front()
    }

    /// Feed an event into the scheduler
    pub fn handle(&mut self, event: Event) {
        match event {
            Event::BytesWritten(count) => self.on_bytes_written(count),
            Event::BytesReceived(data) => self.on_bytes_received(data),
            Event::Timeout(Timer::InterFrame) => self.on_inter_frame_timeout(),
            Event::Timeout(Timer::Send) => self.on_send_timeout(),
            Event::Timeout(Timer::Response) => self.on_response_timeout(),
            Event::LinkError(err) => self.on_link_error(err),
        }
    }

    fn check_open(&self) -> Result<(), RequestError> {
        if self.open {
            Ok(())
        } else {
            Err(RequestError::NoConnection)
        }
    }

    /// Queue a request whose reply was created by the caller
    ///
    /// Fails the promise with [`RequestError::NoConnection`] if the master is closed.
    pub(crate) fn enqueue(&mut self, request: Request, promise: Promise) {
        if !self.open {
            promise.failure(RequestError::NoConnection);
            return;
        }

        if request.server.is_rtu_reserved() {
            tracing::warn!("sending to reserved server address {}", request.server);
        }

        self.queue.push_back(QueueElement {
            server: request.server,
            pdu: request.pdu,
            adu: request.adu,
            expected: request.expected,
            promise,
            remaining_attempts: self.config.number_of_retries.saturating_add(1),
            response_timeout: self.config.response_timeout,
            bytes_written: 0,
            writing: false,
        });

        if self.state == State::Idle {
            self.schedule_next(self.inter_frame_delay);
        }
    }

    fn schedule_next(&mut self, delay: Duration) {
        self.state = State::Schedule;
        self.actions
            .push_back(Action::StartTimer(Timer::InterFrame, delay));
    }

    fn stop_all_timers(&mut self) {
        for timer in [Timer::InterFrame, Timer::Send, Timer::Response] {
            self.actions.push_back(Action::StopTimer(timer));
        }
    }

    fn on_inter_frame_timeout(&mut self) {
        match self.state {
            State::Schedule => self.process_queue(),
            State::Send => self.resend_current(),
            State::Idle | State::Receive => {
                tracing::debug!("ignoring inter-frame timer in state {:?}", self.state)
            }
        }
    }

    fn process_queue(&mut self) {
        while let Some(element) = self.queue.pop_front() {
            if !element.promise.is_alive() {
                tracing::debug!("skipping request to {}, reply was dropped", element.server);
                continue;
            }
            self.current = Some(element);
            self.write_current();
            return;
        }

        self.state = State::Idle;
    }

    fn resend_current(&mut self) {
        let alive = match &self.current {
            Some(x) => x.promise.is_alive(),
            None => {
                self.schedule_next(self.inter_frame_delay);
                return;
            }
        };

        if alive {
            self.write_current();
        } else {
            tracing::debug!("abandoning retry, reply was dropped");
            self.current = None;
            self.schedule_next(self.inter_frame_delay);
        }
    }

    fn write_current(&mut self) {
        let decode = self.decode;
        let inter_frame_delay = self.inter_frame_delay;

        let element = match self.current.as_mut() {
            Some(x) => x,
            None => return,
        };

        element.bytes_written = 0;
        element.writing = true;
        element.remaining_attempts = element.remaining_attempts.saturating_sub(1);

        if decode.app.enabled() {
            tracing::info!(
                "PDU TX - {}",
                PduDisplay::new(decode.app, &element.pdu, element.unit())
            );
        }
        if decode.frame.enabled() {
            tracing::info!("RTU TX - {}", RtuDisplay::new(decode.frame, &element.adu));
        }

        // the write may take up to one silent interval per byte
        let timeout = inter_frame_delay * element.adu.len() as u32;
        let adu = element.adu.clone();

        self.rx_buffer.clear();
        self.state = State::Send;
        self.actions
            .push_back(Action::StartTimer(Timer::Send, timeout));
        self.actions.push_back(Action::Write(adu));
    }

    fn on_bytes_written(&mut self, count: usize) {
        if self.state != State::Send {
            tracing::debug!("ignoring {count} written bytes in state {:?}", self.state);
            return;
        }

        let element = match self.current.as_mut() {
            Some(x) if x.writing => x,
            _ => {
                tracing::debug!("ignoring {count} written bytes, a retry is pending");
                return;
            }
        };

        element.bytes_written += count;
        if element.bytes_written < element.adu.len() {
            return;
        }

        element.writing = false;
        self.actions.push_back(Action::StopTimer(Timer::Send));

        if element.is_broadcast() {
            if let Some(element) = self.current.take() {
                let unit = element.unit().cloned();
                element
                    .promise
                    .success(Response::new(element.server, element.pdu, unit));
            }
            self.schedule_next(self.config.turnaround_delay);
            return;
        }

        let timeout = element.response_timeout;
        self.state = State::Receive;
        self.actions
            .push_back(Action::StartTimer(Timer::Response, timeout));
    }

    fn on_send_timeout(&mut self) {
        if self.state != State::Send {
            return;
        }

        let (written, length, remaining) = match self.current.as_mut() {
            Some(x) if x.writing => {
                x.writing = false;
                (x.bytes_written, x.adu.len(), x.remaining_attempts)
            }
            _ => return,
        };

        tracing::warn!("timeout writing request, {written} of {length} bytes written");

        if remaining == 0 {
            self.fail_current(RequestError::ResponseTimeout);
            self.schedule_next(self.inter_frame_delay);
        } else {
            self.actions.push_back(Action::ClearLink);
            self.actions
                .push_back(Action::StartTimer(Timer::InterFrame, self.inter_frame_delay));
        }
    }

    fn on_response_timeout(&mut self) {
        if self.state != State::Receive {
            return;
        }

        let remaining = match &self.current {
            Some(x) => x.remaining_attempts,
            None => return,
        };

        if remaining == 0 {
            tracing::warn!("response timeout, no retries left");
            self.fail_current(RequestError::ResponseTimeout);
            self.schedule_next(self.inter_frame_delay);
        } else {
            tracing::warn!("response timeout, {remaining} attempt(s) left");
            self.actions.push_back(Action::ClearLink);
            self.state = State::Send;
            self.actions
                .push_back(Action::StartTimer(Timer::InterFrame, self.inter_frame_delay));
        }
    }

    fn on_bytes_received(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }

        if self.state != State::Receive {
            tracing::warn!(
                "discarding {} unexpected byte(s) in state {:?}",
                data.len(),
                self.state
            );
            return;
        }

        self.rx_buffer.extend_from_slice(data);

        loop {
            let (consumed, adu) = match &self.current {
                Some(element) => try_parse_response(&self.rx_buffer, &element.pdu),
                None => return,
            };

            if consumed == 0 {
                return;
            }

            let frame: Vec<u8> = self.rx_buffer.drain(..consumed).collect();

            let adu = match adu {
                Some(x) => x,
                None => continue,
            };

            if self.decode.frame.enabled() {
                tracing::info!("RTU RX - {}", RtuDisplay::new(self.decode.frame, &frame));
            }

            if self.matches_current(&adu) {
                self.actions.push_back(Action::StopTimer(Timer::Response));
                self.rx_buffer.clear();
                self.complete_current(adu);
                self.schedule_next(self.inter_frame_delay);
                return;
            }

            tracing::warn!(
                "ignoring {} from server {}, it does not answer the outstanding request",
                adu.pdu,
                adu.server
            );
        }
    }

    fn matches_current(&self, adu: &Adu) -> bool {
        match &self.current {
            Some(element) => adu.server == element.server && adu.pdu.answers(&element.pdu),
            None => false,
        }
    }

    fn complete_current(&mut self, adu: Adu) {
        let element = match self.current.take() {
            Some(x) => x,
            None => return,
        };

        if !element.promise.is_alive() {
            tracing::debug!("response received for a dropped reply");
            return;
        }

        let decoded = match &element.expected {
            Expected::Unit(unit) => request::decode_response(&adu.pdu, unit).map(Some),
            Expected::Raw => match adu.pdu.exception_code() {
                Some(code) => Err(RequestError::Exception(code)),
                None => Ok(None),
            },
        };

        if self.decode.app.enabled() {
            let unit = decoded.as_ref().ok().and_then(|x| x.as_ref());
            tracing::info!(
                "PDU RX - {}",
                PduDisplay::new(self.decode.app, &adu.pdu, unit)
            );
        }

        match decoded {
            Ok(unit) => element
                .promise
                .success(Response::new(adu.server, adu.pdu, unit)),
            Err(err) => {
                tracing::warn!("request failed: {err}");
                element.promise.failure(err)
            }
        }
    }

    fn fail_current(&mut self, err: RequestError) {
        if let Some(element) = self.current.take() {
            element.promise.failure(err);
        }
    }

    fn on_link_error(&mut self, err: RequestError) {
        tracing::warn!("link error: {err}");
        self.actions.push_back(Action::DeviceError(err));

        if self.current.is_some() {
            self.actions.push_back(Action::StopTimer(Timer::Send));
            self.actions.push_back(Action::StopTimer(Timer::Response));
            self.fail_current(err);
            self.rx_buffer.clear();
            self.schedule_next(self.inter_frame_delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::ExceptionCode;
    use crate::serial::frame::crc16;
    use crate::types::RegisterType;

    const BAUD: u32 = 9600;

    fn master(retries: usize) -> RtuMaster {
        let mut master = RtuMaster::new(
            MasterConfig::new().with_number_of_retries(retries),
            BAUD,
            DecodeLevel::nothing(),
        );
        master.open();
        master
    }

    fn actions(master: &mut RtuMaster) -> Vec<Action> {
        std::iter::from_fn(|| master.poll_action()).collect()
    }

    fn writes(actions: &[Action]) -> Vec<Vec<u8>> {
        actions
            .iter()
            .filter_map(|x| match x {
                Action::Write(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    fn frame(bytes: &[u8]) -> Vec<u8> {
        let mut frame = bytes.to_vec();
        frame.extend_from_slice(&crc16(bytes).to_le_bytes());
        frame
    }

    fn read_holding(start: u16, count: u16) -> DataUnit {
        DataUnit::new(RegisterType::HoldingRegisters, start, count)
    }

    /// Fire the inter-frame timer and report the whole write as complete
    fn send(master: &mut RtuMaster) -> Vec<u8> {
        master.handle(Event::Timeout(Timer::InterFrame));
        let written = writes(&actions(master));
        assert_eq!(written.len(), 1, "expected exactly one write");
        let bytes = written.into_iter().next().unwrap();
        master.handle(Event::BytesWritten(bytes.len()));
        bytes
    }

    #[test]
    fn closed_master_rejects_requests() {
        let mut master = RtuMaster::new(MasterConfig::new(), BAUD, DecodeLevel::nothing());
        assert_eq!(
            master
                .send_read_request(read_holding(0, 1), ServerAddress::new(1))
                .err(),
            Some(RequestError::NoConnection)
        );
        assert!(actions(&mut master).is_empty());
    }

    #[test]
    fn invalid_unit_is_rejected_without_queueing() {
        let mut master = master(3);
        let err = master
            .send_read_request(read_holding(0, 0), ServerAddress::new(1))
            .err()
            .unwrap();
        assert_eq!(err.kind(), crate::ErrorKind::UnknownError);
        assert_eq!(master.state(), State::Idle);
        assert!(actions(&mut master).is_empty());
    }

    #[test]
    fn enqueue_schedules_after_inter_frame_delay() {
        let mut master = master(3);
        let _reply = master
            .send_read_request(read_holding(0, 2), ServerAddress::new(1))
            .unwrap();
        assert_eq!(master.state(), State::Schedule);
        assert_eq!(
            actions(&mut master),
            vec![Action::StartTimer(
                Timer::InterFrame,
                Duration::from_micros(4011)
            )]
        );
    }

    #[test]
    fn read_holding_registers_scenario() {
        let mut master = master(3);
        let mut reply = master
            .send_read_request(read_holding(0, 2), ServerAddress::new(1))
            .unwrap();
        actions(&mut master);

        let request = send(&mut master);
        assert_eq!(request, frame(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x02]));
        assert_eq!(master.state(), State::Receive);
        let after_write = actions(&mut master);
        assert!(after_write.contains(&Action::StopTimer(Timer::Send)));
        assert!(after_write.contains(&Action::StartTimer(
            Timer::Response,
            Duration::from_millis(1000)
        )));

        master.handle(Event::BytesReceived(&frame(&[
            0x01, 0x03, 0x04, 0x00, 0x0A, 0x00, 0x14,
        ])));

        let response = reply.try_result().unwrap().unwrap();
        assert_eq!(response.unit().unwrap().values(), &[10, 20]);
        assert_eq!(response.server(), ServerAddress::new(1));
        assert_eq!(master.state(), State::Schedule);
        assert!(actions(&mut master).contains(&Action::StopTimer(Timer::Response)));
    }

    #[test]
    fn response_split_across_reads() {
        let mut master = master(3);
        let mut reply = master
            .send_read_request(read_holding(0, 2), ServerAddress::new(1))
            .unwrap();
        send(&mut master);

        let response = frame(&[0x01, 0x03, 0x04, 0x00, 0x0A, 0x00, 0x14]);
        for byte in &response[..response.len() - 1] {
            master.handle(Event::BytesReceived(std::slice::from_ref(byte)));
            assert_eq!(reply.try_result(), None);
        }
        master.handle(Event::BytesReceived(&response[response.len() - 1..]));
        assert!(reply.try_result().unwrap().is_ok());
    }

    #[test]
    fn queue_is_serialized() {
        let mut master = master(3);
        let mut first = master
            .send_read_request(read_holding(0, 1), ServerAddress::new(1))
            .unwrap();
        let mut second = master
            .send_read_request(read_holding(10, 1), ServerAddress::new(2))
            .unwrap();
        assert_eq!(master.queued(), 2);

        let request = send(&mut master);
        assert_eq!(request[0], 0x01);

        // nothing else is written while the first request is outstanding
        master.handle(Event::Timeout(Timer::InterFrame));
        assert!(writes(&actions(&mut master)).is_empty());
        assert_eq!(second.try_result(), None);

        master.handle(Event::BytesReceived(&frame(&[0x01, 0x03, 0x02, 0x00, 0x07])));
        assert!(first.try_result().unwrap().is_ok());

        let request = send(&mut master);
        assert_eq!(request[0], 0x02);
        master.handle(Event::BytesReceived(&frame(&[0x02, 0x03, 0x02, 0x00, 0x08])));
        let response = second.try_result().unwrap().unwrap();
        assert_eq!(response.unit().unwrap().values(), &[8]);
        assert_eq!(response.unit().unwrap().start_address(), 10);

        master.handle(Event::Timeout(Timer::InterFrame));
        assert_eq!(master.state(), State::Idle);
    }

    #[test]
    fn retries_are_exhausted_before_timeout() {
        let mut master = master(2);
        let mut reply = master
            .send_read_request(read_holding(0, 1), ServerAddress::new(1))
            .unwrap();

        let mut attempts = 0;
        loop {
            send(&mut master);
            attempts += 1;
            master.handle(Event::Timeout(Timer::Response));
            if let Some(result) = reply.try_result() {
                assert_eq!(result, Err(RequestError::ResponseTimeout));
                break;
            }
            let retry = actions(&mut master);
            assert!(retry.contains(&Action::ClearLink));
            assert_eq!(master.state(), State::Send);
        }

        assert_eq!(attempts, 3);
        assert_eq!(master.state(), State::Schedule);
    }

    #[test]
    fn dropped_reply_is_skipped() {
        let mut master = master(3);
        let dropped = master
            .send_read_request(read_holding(0, 1), ServerAddress::new(1))
            .unwrap();
        let mut kept = master
            .send_read_request(read_holding(0, 1), ServerAddress::new(2))
            .unwrap();
        drop(dropped);

        let request = send(&mut master);
        assert_eq!(request[0], 0x02);
        master.handle(Event::BytesReceived(&frame(&[0x02, 0x03, 0x02, 0x00, 0x01])));
        assert!(kept.try_result().unwrap().is_ok());
    }

    #[test]
    fn reply_dropped_in_flight_is_not_retried() {
        let mut master = master(3);
        let reply = master
            .send_read_request(read_holding(0, 1), ServerAddress::new(1))
            .unwrap();
        send(&mut master);
        drop(reply);

        master.handle(Event::Timeout(Timer::Response));
        actions(&mut master);
        master.handle(Event::Timeout(Timer::InterFrame));
        assert!(writes(&actions(&mut master)).is_empty());
        assert_eq!(master.state(), State::Schedule);
    }

    #[test]
    fn exception_is_not_retried() {
        let mut master = master(3);
        let mut reply = master
            .send_read_request(
                DataUnit::new(RegisterType::Coils, 0, 8),
                ServerAddress::new(1),
            )
            .unwrap();
        send(&mut master);

        master.handle(Event::BytesReceived(&frame(&[0x01, 0x81, 0x02])));
        let err = reply.try_result().unwrap().unwrap_err();
        assert_eq!(
            err,
            RequestError::Exception(ExceptionCode::IllegalDataAddress)
        );
        assert_eq!(err.kind(), crate::ErrorKind::ProtocolError);

        master.handle(Event::Timeout(Timer::InterFrame));
        assert!(writes(&actions(&mut master)).is_empty());
    }

    #[test]
    fn bad_response_is_not_retried() {
        let mut master = master(3);
        let mut reply = master
            .send_read_request(read_holding(0, 2), ServerAddress::new(1))
            .unwrap();
        send(&mut master);

        // valid frame, but only one register
        master.handle(Event::BytesReceived(&frame(&[0x01, 0x03, 0x02, 0x00, 0x0A])));
        let err = reply.try_result().unwrap().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::UnknownError);
    }

    #[test]
    fn corrupted_crc_leads_to_timeout() {
        let mut master = master(0);
        let mut reply = master
            .send_read_request(read_holding(0, 2), ServerAddress::new(1))
            .unwrap();
        send(&mut master);
        actions(&mut master);

        let mut corrupted = frame(&[0x01, 0x03, 0x04, 0x00, 0x0A, 0x00, 0x14]);
        corrupted[8] ^= 0x01;
        master.handle(Event::BytesReceived(&corrupted));
        assert_eq!(reply.try_result(), None);
        assert_eq!(master.state(), State::Receive);
        assert!(!actions(&mut master).contains(&Action::StopTimer(Timer::Response)));

        master.handle(Event::Timeout(Timer::Response));
        assert_eq!(reply.try_result(), Some(Err(RequestError::ResponseTimeout)));
    }

    #[test]
    fn mismatched_responses_are_ignored() {
        let mut master = master(3);
        let mut reply = master
            .send_read_request(read_holding(0, 1), ServerAddress::new(1))
            .unwrap();
        send(&mut master);

        // wrong server, then wrong function, then the answer
        let mut bytes = frame(&[0x02, 0x03, 0x02, 0x00, 0x01]);
        bytes.extend(frame(&[0x01, 0x04, 0x02, 0x00, 0x02]));
        bytes.extend(frame(&[0x01, 0x03, 0x02, 0x00, 0x03]));
        master.handle(Event::BytesReceived(&bytes));

        let response = reply.try_result().unwrap().unwrap();
        assert_eq!(response.unit().unwrap().values(), &[3]);
    }

    #[test]
    fn partial_write_is_retried() {
        let mut master = master(1);
        let mut reply = master
            .send_read_request(read_holding(0, 1), ServerAddress::new(1))
            .unwrap();

        master.handle(Event::Timeout(Timer::InterFrame));
        let first = writes(&actions(&mut master));
        master.handle(Event::BytesWritten(3));
        master.handle(Event::Timeout(Timer::Send));
        let retry = actions(&mut master);
        assert!(retry.contains(&Action::ClearLink));
        assert!(retry.contains(&Action::StartTimer(
            Timer::InterFrame,
            master.inter_frame_delay()
        )));

        master.handle(Event::Timeout(Timer::InterFrame));
        assert_eq!(writes(&actions(&mut master)), first);

        // second partial write exhausts the budget
        master.handle(Event::BytesWritten(3));
        master.handle(Event::Timeout(Timer::Send));
        assert_eq!(reply.try_result(), Some(Err(RequestError::ResponseTimeout)));
    }

    #[test]
    fn late_write_completion_does_not_preempt_retry() {
        let mut master = master(1);
        let mut reply = master
            .send_read_request(read_holding(0, 1), ServerAddress::new(1))
            .unwrap();

        master.handle(Event::Timeout(Timer::InterFrame));
        let first = writes(&actions(&mut master));
        master.handle(Event::BytesWritten(3));
        master.handle(Event::Timeout(Timer::Send));
        actions(&mut master);

        // the rest of the stalled write shows up after the retry was scheduled
        master.handle(Event::BytesWritten(first[0].len() - 3));
        assert_eq!(master.state(), State::Send);
        let late = actions(&mut master);
        assert!(!late
            .iter()
            .any(|x| matches!(x, Action::StartTimer(Timer::Response, _))));

        // the retry goes out and gets answered
        master.handle(Event::Timeout(Timer::InterFrame));
        assert_eq!(writes(&actions(&mut master)), first);
        master.handle(Event::BytesWritten(first[0].len()));
        assert_eq!(master.state(), State::Receive);
        master.handle(Event::BytesReceived(&frame(&[0x01, 0x03, 0x02, 0x00, 0x05])));
        assert_eq!(
            reply.try_result().unwrap().unwrap().unit().unwrap().values(),
            &[5]
        );
    }

    #[test]
    fn send_timer_starts_before_write() {
        let mut master = master(0);
        let _reply = master
            .send_read_request(read_holding(0, 1), ServerAddress::new(1))
            .unwrap();
        actions(&mut master);

        master.handle(Event::Timeout(Timer::InterFrame));
        let sent = actions(&mut master);
        assert!(matches!(sent.first(), Some(Action::StartTimer(Timer::Send, _))));
        assert!(matches!(sent.get(1), Some(Action::Write(_))));
    }

    #[test]
    fn send_timeout_after_complete_write_is_ignored() {
        let mut master = master(0);
        let mut reply = master
            .send_read_request(read_holding(0, 1), ServerAddress::new(1))
            .unwrap();
        send(&mut master);
        master.handle(Event::Timeout(Timer::Send));
        assert_eq!(master.state(), State::Receive);
        assert_eq!(reply.try_result(), None);
    }

    #[test]
    fn close_aborts_everything() {
        let mut master = master(3);
        let mut in_flight = master
            .send_read_request(read_holding(0, 1), ServerAddress::new(1))
            .unwrap();
        let mut queued = master
            .send_read_request(read_holding(0, 1), ServerAddress::new(1))
            .unwrap();
        send(&mut master);
        actions(&mut master);

        master.close();
        assert_eq!(in_flight.try_result(), Some(Err(RequestError::Aborted)));
        assert_eq!(queued.try_result(), Some(Err(RequestError::Aborted)));
        assert_eq!(master.state(), State::Idle);
        assert!(!master.is_open());

        let stopped = actions(&mut master);
        assert!(stopped.contains(&Action::StopTimer(Timer::Response)));
        assert_eq!(RequestError::Aborted.kind(), crate::ErrorKind::ReplyAbortedError);
    }

    #[test]
    fn broadcast_completes_after_write() {
        let mut master = master(3);
        let unit = DataUnit::holding_registers(4, &[0x1234]);
        let mut reply = master
            .send_write_request(unit.clone(), ServerAddress::broadcast())
            .unwrap();
        send(&mut master);

        let response = reply.try_result().unwrap().unwrap();
        assert_eq!(response.unit(), Some(&unit));
        assert_eq!(master.state(), State::Schedule);
        assert!(actions(&mut master).contains(&Action::StartTimer(
            Timer::InterFrame,
            Duration::from_millis(100)
        )));
    }

    #[test]
    fn raw_request_returns_response_pdu() {
        let mut master = master(3);
        let mut reply = master
            .send_raw_request(Pdu::from_raw(0x07, vec![]), ServerAddress::new(1))
            .unwrap();
        send(&mut master);
        master.handle(Event::BytesReceived(&frame(&[0x01, 0x07, 0x6D])));

        let response = reply.try_result().unwrap().unwrap();
        assert_eq!(response.pdu().data(), &[0x6D]);
        assert!(response.unit().is_none());
    }

    #[test]
    fn link_error_fails_current_request() {
        let mut master = master(3);
        let mut reply = master
            .send_read_request(read_holding(0, 1), ServerAddress::new(1))
            .unwrap();
        master.handle(Event::Timeout(Timer::InterFrame));
        actions(&mut master);

        let err = RequestError::Write(std::io::ErrorKind::BrokenPipe);
        master.handle(Event::LinkError(err));
        assert_eq!(reply.try_result(), Some(Err(err)));
        assert!(actions(&mut master).contains(&Action::DeviceError(err)));
    }

    #[test]
    fn unexpected_bytes_while_idle_are_dropped() {
        let mut master = master(3);
        master.handle(Event::BytesReceived(&[0x01, 0x02, 0x03]));
        assert_eq!(master.state(), State::Idle);
        assert!(actions(&mut master).is_empty());
    }

    #[test]
    fn settings_apply_to_new_requests() {
        let mut master = master(3);
        master.set_response_timeout(Duration::from_millis(10));
        assert_eq!(master.config().response_timeout(), MIN_RESPONSE_TIMEOUT);
        master.set_response_timeout(Duration::from_millis(250));

        let _reply = master
            .send_read_request(read_holding(0, 1), ServerAddress::new(1))
            .unwrap();
        send(&mut master);
        assert!(actions(&mut master).contains(&Action::StartTimer(
            Timer::Response,
            Duration::from_millis(250)
        )));
    }

    #[test]
    fn inter_frame_override_must_exceed_minimum() {
        let shorter = RtuMaster::new(
            MasterConfig::new().with_inter_frame_delay(Duration::from_micros(100)),
            BAUD,
            DecodeLevel::nothing(),
        );
        assert_eq!(shorter.inter_frame_delay(), Duration::from_micros(4011));

        let longer = RtuMaster::new(
            MasterConfig::new().with_inter_frame_delay(Duration::from_millis(10)),
            BAUD,
            DecodeLevel::nothing(),
        );
        assert_eq!(longer.inter_frame_delay(), Duration::from_millis(10));
    }
}
