use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::common::pdu::Pdu;
use crate::error::RequestError;
use crate::types::{DataUnit, ServerAddress};

/// Successful result of a request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    server: ServerAddress,
    pdu: Pdu,
    unit: Option<DataUnit>,
}

impl Response {
    pub(crate) fn new(server: ServerAddress, pdu: Pdu, unit: Option<DataUnit>) -> Self {
        Self { server, pdu, unit }
    }

    /// Address of the server the request was sent to
    pub fn server(&self) -> ServerAddress {
        self.server
    }

    /// Raw response PDU
    ///
    /// For broadcast requests, which are never answered, this is the request PDU.
    pub fn pdu(&self) -> &Pdu {
        &self.pdu
    }

    /// Decoded data unit, `None` for raw requests
    pub fn unit(&self) -> Option<&DataUnit> {
        self.unit.as_ref()
    }

    /// Consume the response, returning the decoded data unit
    pub fn into_unit(self) -> Option<DataUnit> {
        self.unit
    }
}

/// Sending half of a reply, owned by the master
///
/// The master never owns the [`Reply`] itself, it can only observe whether
/// the user still holds it.
#[derive(Debug)]
pub(crate) struct Promise {
    sender: oneshot::Sender<Result<Response, RequestError>>,
}

impl Promise {
    pub(crate) fn new() -> (Self, Reply) {
        let (sender, receiver) = oneshot::channel();
        (Self { sender }, Reply { receiver })
    }

    /// False once the user has dropped the [`Reply`]
    pub(crate) fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }

    pub(crate) fn failure(self, err: RequestError) {
        self.complete(Err(err))
    }

    pub(crate) fn success(self, response: Response) {
        self.complete(Ok(response))
    }

    fn complete(self, result: Result<Response, RequestError>) {
        self.sender.send(result).ok();
    }
}

/// Handle to the result of a request
///
/// Resolves exactly once, either by awaiting it or by polling [`Reply::try_result`].
/// Dropping the handle before the request is sent cancels it.
#[derive(Debug)]
pub struct Reply {
    receiver: oneshot::Receiver<Result<Response, RequestError>>,
}

impl Reply {
    /// Non-blocking check for the terminal state
    ///
    /// Returns `None` while the request is still pending.
    pub fn try_result(&mut self) -> Option<Result<Response, RequestError>> {
        match self.receiver.try_recv() {
            Ok(x) => Some(x),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(RequestError::Shutdown)),
        }
    }
}

impl Future for Reply {
    type Output = Result<Response, RequestError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|x| x.unwrap_or(Err(RequestError::Shutdown)))
    }
}
