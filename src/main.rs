use managed_pool::{Config, ThreadPool};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};


fn main() -> Result<(), managed_pool::PoolError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "managed_pool=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let now = Instant::now();
    let pool = ThreadPool::with_config(Config::from_env())?;
    let counter = Arc::new(AtomicUsize::new(0));

    for i in 0..100_000 {
        let counter = counter.clone();
        pool.post_with(i, move |_i| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
    }

    pool.shutdown();
    let drained = pool.wait_for_termination(Some(Duration::from_secs(30)));
    tracing::info!(
        drained,
        executed = counter.load(Ordering::Relaxed),
        elapsed = ?now.elapsed(),
        "demo finished"
    );
    Ok(())
}
