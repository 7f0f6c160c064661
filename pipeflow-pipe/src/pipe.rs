use crate::{Error, FieldList, Record, Row, Value};
use derivative::Derivative;
use log::{debug, warn};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::{
    fmt::{self, Display},
    mem,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    vec,
};

/// Rows collected before a batch is handed to the queue.
pub const DEFAULT_CAPACITY: usize = 1000;
/// Batches held by the queue before the producer blocks.
pub const DEFAULT_QUEUE_DEPTH: usize = 1;

static NEXT_PIPE_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique pipe number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PipeId(u64);

impl PipeId {
    fn next() -> Self {
        Self(NEXT_PIPE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl Display for PipeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "pipe#{}", self.0)
    }
}

/// A unit moved through the queue. The batch produced by
/// [Pipe::flush] is the last one and carries end-of-stream in-band.
#[derive(Debug)]
struct Batch {
    rows: Vec<Row>,
    last: bool,
}

/// A bounded, batching channel between one producer and one consumer.
///
/// `Pipe` is a handle: clones refer to the same channel, and
/// [Pipe::same] compares handles by identity. The producer side uses
/// [put](Pipe::put), [put_record](Pipe::put_record) and
/// [flush](Pipe::flush); the consumer side uses [rows](Pipe::rows),
/// [records](Pipe::records) and [stop](Pipe::stop).
#[derive(Debug, Clone)]
pub struct Pipe {
    inner: Arc<Inner>,
}

#[derive(Derivative)]
#[derivative(Debug)]
struct Inner {
    id: PipeId,
    capacity: usize,
    queue_depth: usize,
    #[derivative(Debug = "ignore")]
    tx: flume::Sender<Batch>,
    #[derivative(Debug = "ignore")]
    rx: flume::Receiver<Batch>,
    /// The batch being filled. Only the producer touches it.
    #[derivative(Debug = "ignore")]
    buffer: Mutex<Vec<Row>>,
    #[derivative(Debug = "ignore")]
    stop_guard: Mutex<()>,
    closed: AtomicBool,
    finished: AtomicBool,
    /// The consumer has received the last batch.
    exhausted: AtomicBool,
    late_write_reported: AtomicBool,
    fields: OnceCell<FieldList>,
}

impl Default for Pipe {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_QUEUE_DEPTH)
    }
}

impl Pipe {
    /// Create a pipe that batches `capacity` rows and queues up to
    /// `queue_depth` batches. A depth of 0 makes the queue unbounded.
    pub fn new(capacity: usize, queue_depth: usize) -> Self {
        let (tx, rx) = match queue_depth {
            0 => flume::unbounded(),
            depth => flume::bounded(depth),
        };

        Self {
            inner: Arc::new(Inner {
                id: PipeId::next(),
                capacity: capacity.max(1),
                queue_depth,
                tx,
                rx,
                buffer: Mutex::new(vec![]),
                stop_guard: Mutex::new(()),
                closed: AtomicBool::new(false),
                finished: AtomicBool::new(false),
                exhausted: AtomicBool::new(false),
                late_write_reported: AtomicBool::new(false),
                fields: OnceCell::new(),
            }),
        }
    }

    /// Returns true if both handles refer to the same pipe.
    pub fn same(lhs: &Pipe, rhs: &Pipe) -> bool {
        Arc::ptr_eq(&lhs.inner, &rhs.inner)
    }

    pub fn id(&self) -> PipeId {
        self.inner.id
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn queue_depth(&self) -> usize {
        self.inner.queue_depth
    }

    /// The consumer asked for no more data.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// The producer ended the stream.
    pub fn is_finished(&self) -> bool {
        self.inner.finished.load(Ordering::Acquire)
    }

    /// Number of batches waiting in the queue.
    pub fn queued_batches(&self) -> usize {
        self.inner.rx.len()
    }

    pub fn fields(&self) -> Option<&FieldList> {
        self.inner.fields.get()
    }

    /// Set the field list. It can be set once; setting an equal list
    /// again is accepted.
    pub fn set_fields(&self, fields: FieldList) -> Result<(), Error> {
        match self.inner.fields.try_insert(fields) {
            Ok(_) => Ok(()),
            Err((current, fields)) if *current == fields => Ok(()),
            Err(_) => Err(Error::fields_conflict(self.id())),
        }
    }

    /// The field list required by the record view. An empty list counts
    /// as missing.
    pub fn record_fields(&self) -> Result<&FieldList, Error> {
        self.fields()
            .filter(|fields| !fields.is_empty())
            .ok_or_else(|| Error::missing_fields(self.id()))
    }

    /// Append a row to the current batch.
    ///
    /// The row is dropped if the consumer stopped the pipe. When the
    /// batch is full it is moved into the queue, blocking while the
    /// queue is at its depth bound.
    pub fn put(&self, row: Row) {
        if self.is_closed() {
            return;
        }

        if self.is_finished() {
            if !self.inner.late_write_reported.swap(true, Ordering::Relaxed) {
                warn!("{} was already flushed, dropping late writes", self.id());
            }
            return;
        }

        let full = {
            let mut buffer = self.inner.buffer.lock();
            buffer.push(row);
            (buffer.len() >= self.inner.capacity).then(|| mem::take(&mut *buffer))
        };

        if let Some(rows) = full {
            self.send(Batch { rows, last: false });
        }
    }

    /// Convert a record into a row following the field list. Absent
    /// keys become [Value::Null].
    pub fn put_record(&self, record: &Record) -> Result<(), Error> {
        let row = self
            .record_fields()?
            .names()
            .map(|name| record.get(name).cloned().unwrap_or(Value::Null))
            .collect();
        self.put(row);
        Ok(())
    }

    /// Hand the partial batch to the consumer and end the stream.
    ///
    /// Calling it again has no effect. On a stopped pipe the partial
    /// batch is discarded.
    pub fn flush(&self) {
        if self.is_finished() {
            return;
        }

        let rows = mem::take(&mut *self.inner.buffer.lock());
        self.send(Batch { rows, last: true });
        self.inner.finished.store(true, Ordering::Release);
    }

    fn send(&self, batch: Batch) {
        if self.is_closed() {
            debug!(
                "{} is closed, discarding a batch of {} rows",
                self.id(),
                batch.rows.len()
            );
            return;
        }

        // Both channel ends live in `Inner`, so the channel cannot disconnect.
        if self.inner.tx.send(batch).is_err() {
            return;
        }

        // `stop` may have drained the queue before this hand-off landed.
        if self.is_closed() {
            self.discard_queued();
        }
    }

    /// Close the pipe from the consumer side: no more data is needed.
    ///
    /// Queued batches are discarded, which also releases a producer
    /// blocked on a full queue. Later writes are silently dropped.
    pub fn stop(&self) {
        let _guard = self.inner.stop_guard.lock();
        let was_closed = self.inner.closed.swap(true, Ordering::AcqRel);
        let discarded = self.discard_queued();
        debug!(
            "{} stop requested (already closed: {}, discarded batches: {})",
            self.id(),
            was_closed,
            discarded
        );
    }

    fn discard_queued(&self) -> usize {
        // `try_iter` pulls pending senders into the queue, waking them.
        self.inner.rx.try_iter().count()
    }

    fn next_batch(&self) -> Option<Batch> {
        if self.is_closed() || self.inner.exhausted.load(Ordering::Acquire) {
            return None;
        }

        let batch = self.inner.rx.recv().ok()?;
        if batch.last {
            self.inner.exhausted.store(true, Ordering::Release);
        }
        Some(batch)
    }

    /// Iterate over received rows, blocking until the producer sends a
    /// batch or ends the stream.
    ///
    /// The iterator is single-pass. It ends after the last batch of a
    /// flushed stream, or as soon as the pipe is stopped.
    pub fn rows(&self) -> Rows<'_> {
        Rows {
            pipe: self,
            current: vec![].into_iter(),
            done: false,
        }
    }

    /// Iterate over received rows as records. Fails before reading
    /// anything if the field list is missing.
    pub fn records(&self) -> Result<Records<'_>, Error> {
        let fields = self.record_fields()?.clone();
        Ok(Records {
            rows: self.rows(),
            fields,
        })
    }
}

impl Display for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.id().fmt(f)
    }
}

/// Row iterator returned by [Pipe::rows].
#[derive(Debug)]
pub struct Rows<'a> {
    pipe: &'a Pipe,
    current: vec::IntoIter<Row>,
    done: bool,
}

impl Iterator for Rows<'_> {
    type Item = Row;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.pipe.is_closed() {
                return None;
            }

            if let Some(row) = self.current.next() {
                return Some(row);
            }

            if self.done {
                return None;
            }

            match self.pipe.next_batch() {
                Some(batch) => {
                    self.done = batch.last;
                    self.current = batch.rows.into_iter();
                }
                None => self.done = true,
            }
        }
    }
}

/// Record iterator returned by [Pipe::records].
#[derive(Debug)]
pub struct Records<'a> {
    rows: Rows<'a>,
    fields: FieldList,
}

impl Iterator for Records<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        let record = self
            .fields
            .names()
            .map(str::to_owned)
            .zip(row)
            .collect();
        Some(record)
    }
}
