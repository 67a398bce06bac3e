//! Bounded concurrent execution of write batches.
//!
//! A stage runs its dataset scan on a blocking thread (the producer). The
//! producer hands full batches to a [`BatchSink`]; the runner writes each
//! batch on its own pooled connection inside one transaction, with at most
//! `workers` batches in flight. The first failed batch stops dispatch; batches
//! already committed stay committed.

use std::ops::AddAssign;
use std::sync::Arc;

use reelsync_common::{Error, Result};
use reelsync_db::pool::{get_conn, DbPool};
use rusqlite::{Connection, TransactionBehavior};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

use crate::dataset::reader::Flow;

/// Rows written by one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Written {
    pub inserted: u64,
    pub updated: u64,
}

impl Written {
    pub fn inserted(n: usize) -> Self {
        Self { inserted: n as u64, updated: 0 }
    }

    pub fn updated(n: usize) -> Self {
        Self { inserted: 0, updated: n as u64 }
    }
}

impl AddAssign for Written {
    fn add_assign(&mut self, rhs: Self) {
        self.inserted += rhs.inserted;
        self.updated += rhs.updated;
    }
}

/// Producer-side handle for submitting batches.
pub(crate) struct BatchSink<B> {
    tx: mpsc::Sender<B>,
}

impl<B> BatchSink<B> {
    /// Blocks while every worker is busy. Returns [`Flow::Stop`] once the
    /// runner has given up, so the scan can end early.
    pub fn send(&self, batch: B) -> Flow {
        match self.tx.blocking_send(batch) {
            Ok(()) => Flow::Continue,
            Err(_) => Flow::Stop,
        }
    }
}

/// Accumulates rows and yields a full batch every `size` rows.
pub(crate) struct Batcher<T> {
    items: Vec<T>,
    size: usize,
}

impl<T> Batcher<T> {
    pub fn new(size: usize) -> Self {
        Self {
            items: Vec::with_capacity(size),
            size: size.max(1),
        }
    }

    pub fn push(&mut self, item: T) -> Option<Vec<T>> {
        self.items.push(item);
        if self.items.len() >= self.size {
            Some(std::mem::replace(&mut self.items, Vec::with_capacity(self.size)))
        } else {
            None
        }
    }

    pub fn finish(self) -> Option<Vec<T>> {
        (!self.items.is_empty()).then_some(self.items)
    }
}

#[derive(Clone)]
pub(crate) struct BatchRunner {
    pool: DbPool,
    workers: usize,
    batch_size: usize,
}

impl BatchRunner {
    pub fn new(pool: DbPool, workers: usize, batch_size: usize) -> Self {
        Self {
            pool,
            workers: workers.max(1),
            batch_size: batch_size.max(1),
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Run `produce` on a blocking thread and write every batch it submits
    /// with `apply`.
    ///
    /// Returns the producer's own result together with the summed
    /// [`Written`] counts. A store error from any batch, or from the
    /// producer, fails the stage.
    pub async fn run<B, O, P, A>(&self, stage: &'static str, produce: P, apply: A) -> Result<(O, Written)>
    where
        B: Send + 'static,
        O: Send + 'static,
        P: FnOnce(BatchSink<B>) -> Result<O> + Send + 'static,
        A: Fn(&Connection, B) -> Result<Written> + Send + Sync + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<B>(self.workers);
        let producer = tokio::task::spawn_blocking(move || produce(BatchSink { tx }));

        let apply = Arc::new(apply);
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut in_flight: JoinSet<Result<Written>> = JoinSet::new();
        let mut written = Written::default();
        let mut failure: Option<Error> = None;
        let mut dispatched = 0usize;

        while let Some(batch) = rx.recv().await {
            while let Some(done) = in_flight.try_join_next() {
                settle(done, &mut written, &mut failure);
            }
            if failure.is_some() {
                break;
            }

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| Error::internal(e.to_string()))?;
            let pool = self.pool.clone();
            let apply = Arc::clone(&apply);
            in_flight.spawn_blocking(move || {
                let _permit = permit;
                write_batch(&pool, apply.as_ref(), batch)
            });

            dispatched += 1;
            if dispatched % 20 == 0 {
                tracing::info!(stage, batches = dispatched, "Batches dispatched");
            }
        }
        // Dropping the receiver makes any further `send` return Stop.
        drop(rx);

        while let Some(done) = in_flight.join_next().await {
            settle(done, &mut written, &mut failure);
        }

        let produced = producer
            .await
            .map_err(|e| Error::internal(format!("{stage} scan panicked: {e}")))?;

        if let Some(err) = failure {
            tracing::error!(stage, batches = dispatched, error = %err, "Batch write failed, stage aborted");
            return Err(err);
        }
        let output = produced?;

        tracing::debug!(
            stage,
            batches = dispatched,
            inserted = written.inserted,
            updated = written.updated,
            "Stage batches complete"
        );
        Ok((output, written))
    }

    /// Run a blocking closure against one pooled connection.
    pub async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        crate::store::with_conn(&self.pool, f).await
    }
}

fn settle(
    done: std::result::Result<Result<Written>, tokio::task::JoinError>,
    written: &mut Written,
    failure: &mut Option<Error>,
) {
    match done {
        Ok(Ok(n)) => *written += n,
        Ok(Err(e)) => {
            failure.get_or_insert(e);
        }
        Err(e) => {
            failure.get_or_insert(Error::internal(format!("batch worker panicked: {e}")));
        }
    }
}

fn write_batch<B, A>(pool: &DbPool, apply: &A, batch: B) -> Result<Written>
where
    A: Fn(&Connection, B) -> Result<Written>,
{
    let mut conn = get_conn(pool)?;
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| Error::database(e.to_string()))?;
    let written = apply(&tx, batch)?;
    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelsync_db::pool::init_pool;

    #[test]
    fn batcher_emits_full_batches() {
        let mut batcher = Batcher::new(2);
        assert!(batcher.push(1).is_none());
        assert_eq!(batcher.push(2), Some(vec![1, 2]));
        assert!(batcher.push(3).is_none());
        assert_eq!(batcher.finish(), Some(vec![3]));
        assert_eq!(Batcher::<i32>::new(2).finish(), None);
    }

    #[tokio::test]
    async fn runner_writes_every_batch() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_pool(dir.path().join("db.sqlite").to_str().unwrap()).unwrap();
        let runner = BatchRunner::new(pool.clone(), 4, 10);

        let (produced, written) = runner
            .run(
                "test",
                |sink: BatchSink<Vec<String>>| {
                    for b in 0..10 {
                        let keys = (0..10).map(|i| format!("k{b}_{i}")).collect();
                        if sink.send(keys) == Flow::Stop {
                            break;
                        }
                    }
                    Ok(10usize)
                },
                |conn, keys| {
                    for key in &keys {
                        conn.execute(
                            "INSERT INTO sync_state (key, value) VALUES (?, 'v')",
                            [key],
                        )
                        .map_err(|e| Error::database(e.to_string()))?;
                    }
                    Ok(Written::inserted(keys.len()))
                },
            )
            .await
            .unwrap();

        assert_eq!(produced, 10);
        assert_eq!(written.inserted, 100);
        let count: i64 = get_conn(&pool)
            .unwrap()
            .query_row("SELECT COUNT(*) FROM sync_state", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 100);
    }

    #[tokio::test]
    async fn first_failure_aborts_stage() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_pool(dir.path().join("db.sqlite").to_str().unwrap()).unwrap();
        let runner = BatchRunner::new(pool, 1, 10);

        let result = runner
            .run(
                "test",
                |sink: BatchSink<u32>| {
                    let mut sent = 0;
                    for i in 0..1000 {
                        if sink.send(i) == Flow::Stop {
                            break;
                        }
                        sent += 1;
                    }
                    Ok(sent)
                },
                |_conn, i| {
                    if i == 3 {
                        Err(Error::database("disk full"))
                    } else {
                        Ok(Written::updated(1))
                    }
                },
            )
            .await;

        assert!(matches!(result, Err(Error::Database(_))));
    }
}
