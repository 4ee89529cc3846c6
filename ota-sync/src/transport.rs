//! Blocking HTTP GET seam.
//!
//! The engine talks to the network only through [`Transport`], so tests can
//! substitute canned responses. [`UreqTransport`] is the production
//! implementation.

use std::collections::BTreeMap;
use std::io::Read;
use std::time::Duration;

use crate::error::{transport_err, SyncError};

/// A response whose body has not been read yet. Dropping it closes the
/// underlying connection.
pub struct Response {
    pub status: u16,
    pub body: Box<dyn Read + Send>,
}

impl Response {
    pub fn new(status: u16, body: impl Read + Send + 'static) -> Self {
        Self {
            status,
            body: Box::new(body),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Issue a GET with the given headers.
///
/// Non-2xx statuses are returned as [`Response`]s, not errors; only
/// connection-level failures are `Err`. Status policy belongs to the caller.
pub trait Transport {
    fn get(&self, url: &str, headers: &BTreeMap<String, String>) -> Result<Response, SyncError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, url: &str, headers: &BTreeMap<String, String>) -> Result<Response, SyncError> {
        (**self).get(url, headers)
    }
}

/// [`Transport`] over a blocking `ureq` agent.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn get(&self, url: &str, headers: &BTreeMap<String, String>) -> Result<Response, SyncError> {
        let mut request = self.agent.get(url);
        for (name, value) in headers {
            request = request.set(name, value);
        }
        match request.call() {
            Ok(resp) => Ok(Response::new(resp.status(), resp.into_reader())),
            Err(ureq::Error::Status(code, _)) => Ok(Response::new(code, std::io::empty())),
            Err(ureq::Error::Transport(t)) => Err(transport_err(url, t)),
        }
    }
}
