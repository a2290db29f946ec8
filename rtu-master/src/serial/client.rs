use crate::client::listener::PortState;
use crate::client::task::{MasterLoop, SessionError, StateChange};
use crate::common::phys::PhysLayer;
use crate::error::Shutdown;
use crate::retry::RetryStrategy;
use crate::serial::SerialSettings;

pub(crate) struct SerialChannelTask {
    path: String,
    serial_settings: SerialSettings,
    retry: Box<dyn RetryStrategy>,
    master_loop: MasterLoop,
}

impl SerialChannelTask {
    pub(crate) fn new(
        path: &str,
        serial_settings: SerialSettings,
        retry: Box<dyn RetryStrategy>,
        master_loop: MasterLoop,
    ) -> Self {
        Self {
            path: path.to_string(),
            serial_settings,
            retry,
            master_loop,
        }
    }

    pub(crate) async fn run(&mut self) -> Shutdown {
        let ret = self.run_inner().await;
        self.master_loop.notify(PortState::Shutdown);
        ret
    }

    async fn run_inner(&mut self) -> Shutdown {
        loop {
            // wait for the channel to be enabled
            if !self.master_loop.is_enabled() {
                self.master_loop.notify(PortState::Disabled);
            }
            if let Err(Shutdown) = self.master_loop.wait_for_enabled().await {
                return Shutdown;
            }

            if let Err(StateChange::Shutdown) = self.try_open_and_run().await {
                return Shutdown;
            }
        }
    }

    async fn try_open_and_run(&mut self) -> Result<(), StateChange> {
        match crate::serial::open(self.path.as_str(), self.serial_settings) {
            Err(err) => {
                let delay = self.retry.after_failed_open();
                tracing::warn!(
                    "{} - waiting {} ms to re-open port",
                    err,
                    delay.as_millis()
                );
                self.master_loop.report(err.into());
                self.master_loop.notify(PortState::Wait(delay));
                self.master_loop.fail_requests_for(delay).await
            }
            Ok(serial) => {
                self.retry.reset();
                let mut phys = PhysLayer::new_serial(serial);
                tracing::info!("serial port open");
                self.master_loop.notify(PortState::Open);
                match self.master_loop.run(&mut phys).await {
                    // the mpsc was closed, end the task
                    SessionError::Shutdown => Err(StateChange::Shutdown),
                    // wait to be enabled
                    SessionError::Disabled => Ok(()),
                    // the port failed, wait before re-opening it
                    SessionError::IoError(_) => {
                        let delay = self.retry.after_disconnect();
                        tracing::warn!("waiting {} ms to re-open port", delay.as_millis());
                        self.master_loop.notify(PortState::Wait(delay));
                        self.master_loop.fail_requests_for(delay).await
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::client::{Channel, MasterConfig, MasterEvent, PortState};
    use crate::decode::DecodeLevel;
    use crate::error::ErrorKind;
    use crate::retry::default_retry_strategy;
    use crate::serial::SerialSettings;

    #[tokio::test]
    async fn failed_open_raises_connection_error() {
        let (tx, mut events) = tokio::sync::mpsc::channel(16);
        let (mut channel, task) = Channel::create_rtu_handle_and_task(
            "/dev/rtu-master-no-such-port",
            SerialSettings::default(),
            MasterConfig::default(),
            4,
            default_retry_strategy(),
            DecodeLevel::nothing(),
            Some(Box::new(tx)),
        );
        let _task = tokio::spawn(task);

        channel.enable().await.unwrap();

        assert_eq!(
            events.recv().await,
            Some(MasterEvent::PortState(PortState::Disabled))
        );
        match events.recv().await {
            Some(MasterEvent::DeviceError(err)) => {
                assert_eq!(err.kind(), ErrorKind::ConnectionError)
            }
            other => panic!("expected a device error, got {other:?}"),
        }
        assert!(matches!(
            events.recv().await,
            Some(MasterEvent::PortState(PortState::Wait(_)))
        ));
    }
}
