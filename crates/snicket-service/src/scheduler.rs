use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Runs `tick` every `period` until `shutdown` is cancelled.
///
/// Ticks run back to back on the same task, so a slow sweep delays the
/// next one instead of overlapping it. Cancellation lets a sweep that is
/// already underway finish before the loop exits.
pub async fn run_purge<F, Fut>(period: Duration, shutdown: CancellationToken, tick: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(period);
    // A fresh interval yields immediately; swallow that tick so the first
    // sweep happens one full period in.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                debug!("running scheduled purge");
                tick().await;
            }
            _ = shutdown.cancelled() => {
                info!("purge task stopped");
                break;
            }
        }
    }
}

/// Spawns [`run_purge`] onto the runtime and returns its join handle.
pub fn spawn_purge<F, Fut>(
    period: Duration,
    shutdown: CancellationToken,
    tick: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(run_purge(period, shutdown, tick))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_tick(count: &Arc<AtomicUsize>) -> impl Fn() -> std::future::Ready<()> {
        let count = Arc::clone(count);
        move || {
            count.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test]
    async fn purge_runs_on_every_tick() {
        let count = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();
        let handle = spawn_purge(
            Duration::from_millis(20),
            token.clone(),
            counting_tick(&count),
        );

        tokio::time::sleep(Duration::from_millis(130)).await;
        token.cancel();
        handle.await.unwrap();

        let ticks = count.load(Ordering::SeqCst);
        assert!(ticks >= 3, "expected several sweeps, got {ticks}");
    }

    #[tokio::test]
    async fn first_sweep_waits_a_full_period() {
        let count = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();
        let handle = spawn_purge(
            Duration::from_millis(200),
            token.clone(),
            counting_tick(&count),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop_promptly() {
        let count = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();
        let handle = spawn_purge(
            Duration::from_millis(10),
            token.clone(),
            counting_tick(&count),
        );

        tokio::time::sleep(Duration::from_millis(35)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_millis(500), handle)
            .await
            .expect("purge task should stop after cancellation")
            .unwrap();

        let after_cancel = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_cancel);
    }

    #[tokio::test]
    async fn async_ticks_are_awaited() {
        let count = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();
        let handle = spawn_purge(Duration::from_millis(20), token.clone(), {
            let count = Arc::clone(&count);
            move || {
                let count = Arc::clone(&count);
                async move {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    count.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(120)).await;
        token.cancel();
        handle.await.unwrap();

        assert!(count.load(Ordering::SeqCst) >= 2);
    }
}
