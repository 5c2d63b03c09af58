use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use tessera_api::{Error, Item, Next, Prefetch, Result, Sink, Source, Stream, StreamOptions};

// ═══════════════════════════════════════════════════════════════
//  Shared drain state
// ═══════════════════════════════════════════════════════════════

/// First error wins; later ones are logged and dropped.
struct Failure {
    slot: Mutex<Option<Error>>,
    token: CancellationToken,
}

impl Failure {
    fn record(&self, e: Error) {
        let mut slot = self.slot.lock();
        if slot.is_none() {
            *slot = Some(e);
        } else {
            tracing::debug!(error = %e, "drain: secondary error dropped");
        }
        self.token.cancel();
    }

    fn take(&self) -> Option<Error> {
        self.slot.lock().take()
    }
}

struct Shared {
    stream: Box<dyn Stream>,
    ended: bool,
}

// ═══════════════════════════════════════════════════════════════
//  drain
// ═══════════════════════════════════════════════════════════════

/// Drive `source` into `sink` with `options.workers` blocking workers.
///
/// Workers pull `(item, index)` pairs and push them into the sink
/// concurrently, so the sink sees indices in arbitrary order. The
/// terminal `finish` is delivered only after every worker has joined,
/// i.e. after every indexed write has been applied. The first error
/// (open, per-item, terminal stream error, close) stops the other workers,
/// is handed to `finish`, and is returned.
pub async fn drain(source: Arc<dyn Source>, sink: Arc<dyn Sink>, options: StreamOptions) -> Result<()> {
    drain_until(source, sink, options, CancellationToken::new()).await
}

/// [`drain`] that also stops when `cancel` fires.
///
/// Cancellation is handled like a terminal error: workers stop pulling,
/// in-flight writes complete, the stream is closed and the sink's
/// `finish` receives [`Error::Cancelled`], which is also returned.
/// Dropping the returned future cancels the workers as well.
pub async fn drain_until(
    source: Arc<dyn Source>,
    sink: Arc<dyn Sink>,
    options: StreamOptions,
    cancel: CancellationToken,
) -> Result<()> {
    let workers = options.workers.max(1);

    let stream = match source.open(&options) {
        Ok(s) => s,
        Err(e) => {
            if let Err(fe) = sink.finish(Some(&e)) {
                tracing::warn!(error = %fe, "drain: sink finish after open failure");
            }
            return Err(e);
        }
    };

    let failure = Arc::new(Failure { slot: Mutex::new(None), token: cancel.child_token() });
    // stops the workers if this future is dropped before they join
    let _stop = failure.token.clone().drop_guard();
    let delivered = Arc::new(AtomicUsize::new(0));
    let shared = Arc::new(Mutex::new(Shared { stream, ended: false }));

    tracing::debug!(workers, prefetch = ?options.prefetch, "drain started");

    let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(workers + 1);
    match options.prefetch {
        Prefetch::None => {
            for _ in 0..workers {
                let shared = shared.clone();
                let sink = sink.clone();
                let failure = failure.clone();
                let delivered = delivered.clone();
                handles.push(tokio::task::spawn_blocking(move || {
                    pull_worker(&shared, &*sink, &failure, &delivered);
                }));
            }
        }
        Prefetch::Buffered(size) => {
            let (tx, rx) = mpsc::channel::<(Item, usize)>(size.max(1));
            let rx = Arc::new(Mutex::new(rx));

            let producer_shared = shared.clone();
            let producer_failure = failure.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                produce(&producer_shared, &tx, &producer_failure);
            }));

            for _ in 0..workers {
                let rx = rx.clone();
                let sink = sink.clone();
                let failure = failure.clone();
                let delivered = delivered.clone();
                handles.push(tokio::task::spawn_blocking(move || {
                    buffered_worker(&rx, &*sink, &failure, &delivered);
                }));
            }
        }
    }

    for h in handles {
        if let Err(e) = h.await {
            failure.record(Error::type_err(format!("drain worker failed: {e}")));
        }
    }

    if let Err(e) = shared.lock().stream.close() {
        failure.record(e);
    }

    let terminal = failure.take().or_else(|| cancel.is_cancelled().then_some(Error::Cancelled));
    let finished = sink.finish(terminal.as_ref());
    match terminal {
        Some(e) => {
            if let Err(fe) = finished {
                tracing::warn!(error = %fe, "drain: sink finish after failure");
            }
            tracing::debug!(error = %e, "drain failed");
            Err(e)
        }
        None => {
            finished?;
            tracing::debug!(items = delivered.load(Ordering::Relaxed), "drain finished");
            Ok(())
        }
    }
}

/// Pull the next position under the stream lock. `None` once ended.
fn pull(shared: &Mutex<Shared>, failure: &Failure) -> Option<(Item, usize)> {
    let mut guard = shared.lock();
    if guard.ended || failure.token.is_cancelled() {
        return None;
    }
    match guard.stream.next() {
        Next::Item(item, index) => Some((item, index)),
        Next::End(err) => {
            guard.ended = true;
            if let Some(e) = err {
                failure.record(e);
            }
            None
        }
    }
}

fn pull_worker(shared: &Mutex<Shared>, sink: &dyn Sink, failure: &Failure, delivered: &AtomicUsize) {
    while let Some((item, index)) = pull(shared, failure) {
        if let Err(e) = sink.put(item, index) {
            failure.record(e);
            return;
        }
        delivered.fetch_add(1, Ordering::Relaxed);
    }
}

fn produce(shared: &Mutex<Shared>, tx: &mpsc::Sender<(Item, usize)>, failure: &Failure) {
    while let Some(pair) = pull(shared, failure) {
        if tx.blocking_send(pair).is_err() {
            // every worker is gone
            return;
        }
    }
}

fn buffered_worker(
    rx: &Mutex<mpsc::Receiver<(Item, usize)>>,
    sink: &dyn Sink,
    failure: &Failure,
    delivered: &AtomicUsize,
) {
    loop {
        if failure.token.is_cancelled() {
            return;
        }
        let next = rx.lock().blocking_recv();
        let Some((item, index)) = next else { return };
        if let Err(e) = sink.put(item, index) {
            failure.record(e);
            return;
        }
        delivered.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ListSource;
    use tessera_api::{RowFactory, Value};

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<usize>>,
        finished: Mutex<Option<bool>>,
        fail_at: Option<usize>,
    }

    impl Sink for Recorder {
        fn put(&self, item: Item, index: usize) -> Result<()> {
            if self.fail_at == Some(index) {
                return Err(Error::type_err("boom"));
            }
            if let Item::Row(_) = item {
                self.seen.lock().push(index);
            }
            Ok(())
        }

        fn finish(&self, terminal: Option<&Error>) -> Result<()> {
            *self.finished.lock() = Some(terminal.is_none());
            Ok(())
        }
    }

    fn rows(n: usize) -> ListSource {
        let f = RowFactory::new(["n"]);
        ListSource::rows((0..n).map(|i| f.row(vec![Some(Value::Usize(i))]).unwrap()))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn every_index_delivered_once() {
        let sink = Arc::new(Recorder::default());
        drain(Arc::new(rows(50)), sink.clone(), StreamOptions::workers(4)).await.unwrap();
        let mut seen = sink.seen.lock().clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
        assert_eq!(*sink.finished.lock(), Some(true));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn buffered_prefetch_delivers_everything() {
        let sink = Arc::new(Recorder::default());
        let options = StreamOptions::workers(3).with_prefetch(Prefetch::Buffered(4));
        drain(Arc::new(rows(40)), sink.clone(), options).await.unwrap();
        assert_eq!(sink.seen.lock().len(), 40);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn put_error_is_terminal() {
        let sink = Arc::new(Recorder { fail_at: Some(7), ..Default::default() });
        let err = drain(Arc::new(rows(20)), sink.clone(), StreamOptions::workers(2)).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert_eq!(*sink.finished.lock(), Some(false));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancelled_drain_finishes_sink_with_error() {
        let sink = Arc::new(Recorder::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = drain_until(Arc::new(rows(1000)), sink.clone(), StreamOptions::workers(2), cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled), "{err}");
        assert!(sink.seen.lock().is_empty());
        assert_eq!(*sink.finished.lock(), Some(false));
    }

    struct Endless;

    impl Source for Endless {
        fn open(&self, _options: &StreamOptions) -> Result<Box<dyn Stream>> {
            Ok(Box::new(EndlessStream { index: 0 }))
        }
    }

    struct EndlessStream {
        index: usize,
    }

    impl Stream for EndlessStream {
        fn next(&mut self) -> Next {
            let j = self.index;
            self.index += 1;
            Next::Item(Item::Sync, j)
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Counter {
        puts: AtomicUsize,
    }

    impl Sink for Counter {
        fn put(&self, _item: Item, _index: usize) -> Result<()> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_micros(50));
            Ok(())
        }

        fn finish(&self, _terminal: Option<&Error>) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dropping_the_drain_stops_its_workers() {
        let sink = Arc::new(Counter::default());
        let run = drain(Arc::new(Endless), sink.clone(), StreamOptions::workers(2));
        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(20), run).await;
        assert!(timed_out.is_err());

        // give in-flight puts time to return, then the count must stay put
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let settled = sink.puts.load(Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(sink.puts.load(Ordering::SeqCst), settled);
    }

    #[tokio::test]
    async fn sync_items_reach_the_sink() {
        let sink = Arc::new(Recorder::default());
        let f = RowFactory::new(["n"]);
        let source = ListSource::new(vec![Item::Sync, Item::Row(f.new_row()), Item::Sync]);
        drain(Arc::new(source), sink.clone(), StreamOptions::default()).await.unwrap();
        assert_eq!(*sink.seen.lock(), vec![1]);
    }
}
