//! Background network worker
//!
//! The dashboard never blocks on HTTP. Requests go to a single worker thread
//! over an mpsc channel; each finished request comes back as a [`Msg`] on a
//! second channel that the event loop drains every tick.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use tracing::{debug, warn};

use super::msg::Msg;
use crate::api::{ApiClient, ConfigBackend};
use crate::model::{CommitRequest, SyncRequest};
use crate::versions::{self, Ticket};

/// Work the dashboard can hand to the worker
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Versions { seq: u64, preserve_selection: bool },
    Config(Ticket),
    Commit(CommitRequest),
    Sync(SyncRequest),
    Traces { seq: u64 },
    Trace { seq: u64, id: String },
}

/// Handle to the running worker
pub struct Worker {
    requests: Sender<Request>,
    replies: Receiver<Msg>,
}

impl Worker {
    /// Spawn the worker thread; it exits when the handle is dropped
    pub fn spawn(client: ApiClient) -> std::io::Result<Self> {
        let (request_tx, request_rx) = mpsc::channel::<Request>();
        let (reply_tx, reply_rx) = mpsc::channel::<Msg>();

        thread::Builder::new()
            .name("agensight-worker".to_string())
            .spawn(move || {
                for request in request_rx {
                    debug!(?request, "worker request");
                    if reply_tx.send(execute(&client, request)).is_err() {
                        break;
                    }
                }
            })?;

        Ok(Self {
            requests: request_tx,
            replies: reply_rx,
        })
    }

    pub fn send(&self, request: Request) {
        if self.requests.send(request).is_err() {
            warn!("worker thread has exited; request dropped");
        }
    }

    /// Next finished reply, if any
    pub fn try_recv(&self) -> Option<Msg> {
        self.replies.try_recv().ok()
    }
}

/// Run one request to completion
pub fn execute(client: &ApiClient, request: Request) -> Msg {
    match request {
        Request::Versions {
            seq,
            preserve_selection,
        } => Msg::VersionsLoaded {
            seq,
            listing: versions::list_versions(client),
            preserve_selection,
        },
        Request::Config(ticket) => {
            let result = client.fetch_config(Some(&ticket.version));
            Msg::ConfigLoaded { ticket, result }
        }
        Request::Commit(request) => Msg::Committed(client.commit(&request)),
        Request::Sync(request) => Msg::Synced {
            result: client.sync(&request).map(|_| ()),
            version: request.version,
        },
        Request::Traces { seq } => Msg::TracesLoaded {
            seq,
            result: client.list_traces(),
        },
        Request::Trace { seq, id } => Msg::TraceLoaded {
            seq,
            result: client.get_trace(&id),
            id,
        },
    }
}
