use std::time::Duration;

use tokio::sync::mpsc;
use tracing::Instrument;

use crate::client::listener::{Listener, MasterEvent, NullListener};
use crate::client::master::{MasterConfig, RtuMaster};
use crate::client::reply::{Promise, Reply};
use crate::client::request::Request;
use crate::client::task::{Command, MasterLoop, Setting};
use crate::common::pdu::Pdu;
use crate::decode::DecodeLevel;
use crate::error::*;
use crate::retry::RetryStrategy;
use crate::serial::client::SerialChannelTask;
use crate::serial::SerialSettings;
use crate::types::{DataUnit, ServerAddress};

/// Async channel used to make requests
///
/// Cloning the handle is cheap; the task behind it runs until every clone is dropped.
#[derive(Debug, Clone)]
pub struct Channel {
    tx: mpsc::Sender<Command>,
}

impl Channel {
    #[cfg(test)]
    pub(crate) fn new(tx: mpsc::Sender<Command>) -> Self {
        Self { tx }
    }

    pub(crate) fn spawn_rtu(
        path: &str,
        serial_settings: SerialSettings,
        config: MasterConfig,
        max_queued_requests: usize,
        retry: Box<dyn RetryStrategy>,
        decode: DecodeLevel,
        listener: Option<Box<dyn Listener<MasterEvent>>>,
    ) -> Self {
        let (handle, task) = Self::create_rtu_handle_and_task(
            path,
            serial_settings,
            config,
            max_queued_requests,
            retry,
            decode,
            listener,
        );
        tokio::spawn(task);
        handle
    }

    pub(crate) fn create_rtu_handle_and_task(
        path: &str,
        serial_settings: SerialSettings,
        config: MasterConfig,
        max_queued_requests: usize,
        retry: Box<dyn RetryStrategy>,
        decode: DecodeLevel,
        listener: Option<Box<dyn Listener<MasterEvent>>>,
    ) -> (Self, impl std::future::Future<Output = ()>) {
        let path = path.to_string();
        let (tx, rx) = mpsc::channel(max_queued_requests);
        let master = RtuMaster::new(config, serial_settings.baud_rate, decode);
        let master_loop = MasterLoop::new(
            rx,
            master,
            listener.unwrap_or_else(NullListener::create),
            decode,
        );
        let task = async move {
            let mut task = SerialChannelTask::new(&path, serial_settings, retry, master_loop);
            task.run()
                .instrument(tracing::info_span!("Modbus-Client-RTU", "port" = ?path))
                .await;
        };
        (Channel { tx }, task)
    }

    /// Enable communications
    pub async fn enable(&mut self) -> Result<(), Shutdown> {
        self.send_setting(Setting::Enable).await
    }

    /// Disable communications
    ///
    /// The port is closed and all outstanding requests are aborted.
    pub async fn disable(&mut self) -> Result<(), Shutdown> {
        self.send_setting(Setting::Disable).await
    }

    /// Set the decode level for the channel
    pub async fn set_decode_level(&mut self, level: DecodeLevel) -> Result<(), Shutdown> {
        self.send_setting(Setting::DecodeLevel(level)).await
    }

    /// Set the response timeout applied to requests queued after this call
    ///
    /// Values below [`MIN_RESPONSE_TIMEOUT`](crate::MIN_RESPONSE_TIMEOUT) are raised to it.
    pub async fn set_response_timeout(&mut self, timeout: Duration) -> Result<(), Shutdown> {
        self.send_setting(Setting::ResponseTimeout(timeout)).await
    }

    /// Set the number of retries applied to requests queued after this call
    pub async fn set_number_of_retries(&mut self, retries: usize) -> Result<(), Shutdown> {
        self.send_setting(Setting::NumberOfRetries(retries)).await
    }

    /// Queue a read of the values described by `unit`
    ///
    /// Malformed requests are rejected before anything is queued.
    pub async fn send_read_request(
        &mut self,
        unit: DataUnit,
        server: ServerAddress,
    ) -> Result<Reply, RequestError> {
        self.send(Request::read(server, unit)?).await
    }

    /// Queue a write of the values in `unit`
    pub async fn send_write_request(
        &mut self,
        unit: DataUnit,
        server: ServerAddress,
    ) -> Result<Reply, RequestError> {
        self.send(Request::write(server, unit)?).await
    }

    /// Queue a combined write then read of holding registers
    pub async fn send_read_write_request(
        &mut self,
        read: DataUnit,
        write: DataUnit,
        server: ServerAddress,
    ) -> Result<Reply, RequestError> {
        self.send(Request::read_write(server, read, write)?).await
    }

    /// Queue an arbitrary PDU, the response PDU is returned without decoding
    pub async fn send_raw_request(
        &mut self,
        pdu: Pdu,
        server: ServerAddress,
    ) -> Result<Reply, RequestError> {
        self.send(Request::raw(server, pdu)?).await
    }

    /// Read the values described by `unit` and wait for the result
    pub async fn read(
        &mut self,
        unit: DataUnit,
        server: ServerAddress,
    ) -> Result<DataUnit, RequestError> {
        let reply = self.send_read_request(unit, server).await?;
        Self::wait_for_unit(reply).await
    }

    /// Write the values in `unit` and wait for the acknowledgement
    pub async fn write(
        &mut self,
        unit: DataUnit,
        server: ServerAddress,
    ) -> Result<DataUnit, RequestError> {
        let reply = self.send_write_request(unit, server).await?;
        Self::wait_for_unit(reply).await
    }

    async fn wait_for_unit(reply: Reply) -> Result<DataUnit, RequestError> {
        reply
            .await?
            .into_unit()
            .ok_or(RequestError::Internal(InternalError::MissingDataUnit))
    }

    async fn send(&mut self, request: Request) -> Result<Reply, RequestError> {
        let (promise, reply) = Promise::new();
        self.tx.send(Command::Request(request, promise)).await?;
        Ok(reply)
    }

    async fn send_setting(&mut self, setting: Setting) -> Result<(), Shutdown> {
        self.tx.send(Command::Setting(setting)).await?;
        Ok(())
    }
}

/// Spawns a channel task onto the runtime that maintains a serial port and processes
/// requests. The task completes when the returned channel handle and all clones are dropped.
///
/// The channel starts disabled; call [`Channel::enable`] to open the port.
///
/// * `path` - Path to the serial device. Generally `/dev/tty0` on Linux and `COM1` on Windows.
/// * `serial_settings` - Serial port settings
/// * `config` - Scheduler settings shared by every request on the channel
/// * `max_queued_requests` - The maximum size of the request queue. Sending waits while it is full.
/// * `retry` - Controls how long the task waits before re-opening the port
/// * `decode` - Decode log level
/// * `listener` - Optional callback to monitor the state of the port
pub fn spawn_rtu_master(
    path: &str,
    serial_settings: SerialSettings,
    config: MasterConfig,
    max_queued_requests: usize,
    retry: Box<dyn RetryStrategy>,
    decode: DecodeLevel,
    listener: Option<Box<dyn Listener<MasterEvent>>>,
) -> Channel {
    Channel::spawn_rtu(
        path,
        serial_settings,
        config,
        max_queued_requests,
        retry,
        decode,
        listener,
    )
}

/// Creates a channel handle and a task future without spawning it. Most users will prefer
/// [`spawn_rtu_master`], unless they need to spawn the task on a specific runtime handle.
///
/// Arguments are the same as [`spawn_rtu_master`].
pub fn create_rtu_master(
    path: &str,
    serial_settings: SerialSettings,
    config: MasterConfig,
    max_queued_requests: usize,
    retry: Box<dyn RetryStrategy>,
    decode: DecodeLevel,
    listener: Option<Box<dyn Listener<MasterEvent>>>,
) -> (Channel, impl std::future::Future<Output = ()>) {
    Channel::create_rtu_handle_and_task(
        path,
        serial_settings,
        config,
        max_queued_requests,
        retry,
        decode,
        listener,
    )
}
