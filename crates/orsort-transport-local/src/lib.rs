//! In-process loopback transport.
//!
//! Runs the N ranks of one job as threads of a single process, one
//! endpoint per rank. Each rank owns a mailbox; sends are buffered
//! (enqueue + wake), receives match in arrival order, which keeps
//! delivery FIFO per `(sender, receiver, tag)`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use orsort_core::error::SortError;
use orsort_core::transport::{
    ANY_SOURCE, ANY_TAG, Completion, RecvStatus, Request, Transport, WaitOutcome,
};

struct Envelope {
    source: usize,
    tag: u16,
    payload: Vec<u8>,
}

impl Envelope {
    fn matches(&self, source: usize, tag: u16) -> bool {
        (source == ANY_SOURCE || self.source == source) && (tag == ANY_TAG || self.tag == tag)
    }
}

struct Mailbox {
    queue: Mutex<VecDeque<Envelope>>,
    cv: Condvar,
}

struct ClusterShared {
    mailboxes: Vec<Mailbox>,
}

enum Pending {
    Send,
    Recv {
        capacity: usize,
        source: usize,
        tag: u16,
    },
}

/// One rank's endpoint into the loopback cluster.
pub struct LocalEndpoint {
    rank: usize,
    shared: Arc<ClusterShared>,
    next_request: AtomicU64,
    pending: Mutex<HashMap<u64, Pending>>,
}

/// Builder for a set of connected endpoints.
pub struct LocalCluster;

impl LocalCluster {
    /// Create `size` connected endpoints, index = rank.
    pub fn endpoints(size: usize) -> Vec<LocalEndpoint> {
        assert!(size >= 1);
        let shared = Arc::new(ClusterShared {
            mailboxes: (0..size)
                .map(|_| Mailbox {
                    queue: Mutex::new(VecDeque::new()),
                    cv: Condvar::new(),
                })
                .collect(),
        });
        (0..size)
            .map(|rank| LocalEndpoint {
                rank,
                shared: Arc::clone(&shared),
                next_request: AtomicU64::new(1),
                pending: Mutex::new(HashMap::new()),
            })
            .collect()
    }
}

struct PostedRecv {
    slot: usize,
    id: u64,
    capacity: usize,
    source: usize,
    tag: u16,
}

impl LocalEndpoint {
    fn deliver(&self, env: Envelope, dest: usize) -> Result<(), SortError> {
        let mailbox = self
            .shared
            .mailboxes
            .get(dest)
            .ok_or(SortError::InvalidArgument)?;
        mailbox.queue.lock().unwrap().push_back(env);
        mailbox.cv.notify_all();
        Ok(())
    }

    fn new_request(&self, pending: Pending) -> Request {
        let id = self.next_request.fetch_add(1, Ordering::Relaxed);
        self.pending.lock().unwrap().insert(id, pending);
        Request(id)
    }
}

impl Transport for LocalEndpoint {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.mailboxes.len()
    }

    fn send(&self, buf: &[u8], dest: usize, tag: u16) -> Result<(), SortError> {
        self.deliver(
            Envelope {
                source: self.rank,
                tag,
                payload: buf.to_vec(),
            },
            dest,
        )
    }

    fn recv(&self, buf: &mut [u8], source: usize, tag: u16) -> Result<RecvStatus, SortError> {
        let mailbox = &self.shared.mailboxes[self.rank];
        let mut queue = mailbox.queue.lock().unwrap();
        loop {
            if let Some(pos) = queue.iter().position(|env| env.matches(source, tag)) {
                let env = queue.remove(pos).unwrap();
                drop(queue);
                if env.payload.len() > buf.len() {
                    return Err(SortError::MessageSize {
                        got: env.payload.len(),
                        expected: buf.len(),
                    });
                }
                buf[..env.payload.len()].copy_from_slice(&env.payload);
                return Ok(RecvStatus {
                    source: env.source,
                    tag: env.tag,
                    count: env.payload.len(),
                });
            }
            queue = mailbox.cv.wait(queue).unwrap();
        }
    }

    fn isend(&self, buf: &[u8], dest: usize, tag: u16) -> Result<Request, SortError> {
        // Buffered channel: the staging copy is handed over right away,
        // so the request is born complete.
        self.send(buf, dest, tag)?;
        Ok(self.new_request(Pending::Send))
    }

    fn irecv(&self, capacity: usize, source: usize, tag: u16) -> Result<Request, SortError> {
        Ok(self.new_request(Pending::Recv {
            capacity,
            source,
            tag,
        }))
    }

    fn wait_any(&self, requests: &mut [Option<Request>]) -> Result<WaitOutcome, SortError> {
        // Completed sends win first; the remaining slots are receives.
        let mut recvs: Vec<PostedRecv> = Vec::new();
        {
            let mut pending = self.pending.lock().unwrap();
            for (slot, entry) in requests.iter_mut().enumerate() {
                let Some(req) = *entry else { continue };
                match pending.get(&req.0) {
                    Some(Pending::Send) => {
                        pending.remove(&req.0);
                        *entry = None;
                        return Ok(WaitOutcome {
                            index: slot,
                            completion: Completion::Send,
                        });
                    }
                    Some(Pending::Recv {
                        capacity,
                        source,
                        tag,
                    }) => recvs.push(PostedRecv {
                        slot,
                        id: req.0,
                        capacity: *capacity,
                        source: *source,
                        tag: *tag,
                    }),
                    None => return Err(SortError::InvalidArgument),
                }
            }
        }
        if recvs.is_empty() {
            return Err(SortError::InvalidArgument);
        }

        let mailbox = &self.shared.mailboxes[self.rank];
        let mut queue = mailbox.queue.lock().unwrap();
        loop {
            let mut hit: Option<(usize, usize)> = None;
            'scan: for (pos, env) in queue.iter().enumerate() {
                for (si, posted) in recvs.iter().enumerate() {
                    if env.matches(posted.source, posted.tag) {
                        hit = Some((pos, si));
                        break 'scan;
                    }
                }
            }
            if let Some((pos, si)) = hit {
                let env = queue.remove(pos).unwrap();
                drop(queue);
                let posted = &recvs[si];
                self.pending.lock().unwrap().remove(&posted.id);
                requests[posted.slot] = None;
                if env.payload.len() > posted.capacity {
                    return Err(SortError::MessageSize {
                        got: env.payload.len(),
                        expected: posted.capacity,
                    });
                }
                let status = RecvStatus {
                    source: env.source,
                    tag: env.tag,
                    count: env.payload.len(),
                };
                return Ok(WaitOutcome {
                    index: posted.slot,
                    completion: Completion::Recv {
                        status,
                        data: env.payload,
                    },
                });
            }
            queue = mailbox.cv.wait(queue).unwrap();
        }
    }
}
