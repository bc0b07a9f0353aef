//! Bounded worker pool for CPU-bound, independent items. Results are tagged with their input
//! position and reassembled in input order regardless of completion order.

use crossbeam::channel;
use tracing::warn;

/// Apply `f` to every item on at most `workers` threads. Slot `i` holds the result for
/// `items[i]`; it is `None` only if the worker handling it panicked.
pub fn map_ordered<T, R, F>(items: &[T], workers: usize, f: F) -> Vec<Option<R>>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> R + Sync,
{
    let workers = workers.max(1).min(items.len());
    if workers <= 1 {
        return items.iter().enumerate().map(|(i, t)| Some(f(i, t))).collect();
    }

    let (job_tx, job_rx) = channel::bounded::<usize>(items.len());
    for i in 0..items.len() {
        // Capacity equals the item count and the receiver is alive.
        let _ = job_tx.send(i);
    }
    drop(job_tx);

    let (res_tx, res_rx) = channel::unbounded::<(usize, R)>();
    let f = &f;
    let joined = crossbeam::thread::scope(|s| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let res_tx = res_tx.clone();
            s.spawn(move |_| {
                for i in job_rx.iter() {
                    if res_tx.send((i, f(i, &items[i]))).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(res_tx);
    if joined.is_err() {
        warn!(workers, "worker panicked; affected items left unfilled");
    }

    let mut out: Vec<Option<R>> = std::iter::repeat_with(|| None).take(items.len()).collect();
    for (i, r) in res_rx.try_iter() {
        out[i] = Some(r);
    }
    out
}
