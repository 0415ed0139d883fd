use std::time::Duration;

use dishdash_engine::{OutboxDispatcher, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

/// Starts the outbox worker, which retries side effects of order transitions that failed or timed out.
/// Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_outbox_worker(dispatcher: OutboxDispatcher<SqliteDatabase>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("📤️ Outbox worker started. Looking for due side effects every {}s", interval.as_secs_f32());
        loop {
            timer.tick().await;
            trace!("📤️ Running outbox sweep");
            match dispatcher.dispatch_due().await {
                Ok(summary) if summary.dispatched + summary.failed == 0 => {},
                Ok(summary) => {
                    info!("📤️ Outbox sweep complete. {} side effects done, {} failed", summary.dispatched, summary.failed);
                },
                Err(e) => {
                    error!("📤️ Error running the outbox sweep: {e}");
                },
            }
        }
    })
}
