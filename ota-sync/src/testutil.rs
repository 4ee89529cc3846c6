//! Test doubles shared by the unit tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::io::Cursor;

use crate::error::{transport_err, SyncError};
use crate::transport::{Response, Transport};

/// Serves queued `(status, body)` pairs per URL; the last one repeats.
/// Unknown URLs fail like a refused connection.
#[derive(Default)]
pub(crate) struct Canned {
    responses: RefCell<BTreeMap<String, VecDeque<(u16, Vec<u8>)>>>,
    calls: RefCell<usize>,
}

impl Canned {
    pub(crate) fn push(&self, url: &str, status: u16, body: &[u8]) {
        self.responses
            .borrow_mut()
            .entry(url.to_string())
            .or_default()
            .push_back((status, body.to_vec()));
    }

    pub(crate) fn calls(&self) -> usize {
        *self.calls.borrow()
    }
}

impl Transport for Canned {
    fn get(&self, url: &str, _: &BTreeMap<String, String>) -> Result<Response, SyncError> {
        *self.calls.borrow_mut() += 1;
        let mut map = self.responses.borrow_mut();
        let Some(queue) = map.get_mut(url) else {
            return Err(transport_err(url, "connection refused"));
        };
        let (status, body) = if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        };
        Ok(Response::new(status, Cursor::new(body)))
    }
}
