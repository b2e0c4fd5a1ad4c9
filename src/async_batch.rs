//! Batch conversion on a tokio runtime.
//!
//! Same discovery, failure isolation and ordering as [`BatchDriver`], with
//! the concurrency gate expressed as a semaphore in front of blocking
//! conversion tasks.
//!
//! [`BatchDriver`]: crate::BatchDriver

use crate::{
    batch::plan_batch,
    config::Config,
    converter::{Converter, FileConverter},
    error::{Error, Result},
    report::BatchItemResult,
};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, instrument};

/// Converts every candidate under `config.input` with the default converter.
///
/// # Errors
///
/// Returns an error only for batch-level failures (see
/// [`convert_batch_async_with`]).
pub async fn convert_batch_async(config: Config) -> Result<Vec<BatchItemResult>> {
    let converter = Arc::new(Converter::new(&config));
    convert_batch_async_with(config, converter).await
}

/// Converts every candidate under `config.input` with `converter`, holding
/// at most `config.workers` conversions in flight.
///
/// Results come back in discovery order.
///
/// # Errors
///
/// Returns an error if:
/// - The configuration is invalid
/// - The root does not exist (`NotFound`)
/// - No candidates are found (`NoInputFiles`)
/// - The output directory cannot be created
#[instrument(skip(config, converter), fields(root = %config.input.display()))]
pub async fn convert_batch_async_with<C>(config: Config, converter: Arc<C>) -> Result<Vec<BatchItemResult>>
where
    C: FileConverter + 'static,
{
    config.validate()?;

    let plan_config = config.clone();
    let tasks = tokio::task::spawn_blocking(move || plan_batch(&plan_config))
        .await
        .map_err(|e| Error::worker_pool(e.to_string()))??;

    let workers = config.workers.max(1);
    info!("Converting {} files with {} permits", tasks.len(), workers);

    let semaphore = Arc::new(Semaphore::new(workers));
    let overwrite = config.overwrite;

    let handles: Vec<_> = tasks
        .into_iter()
        .map(|task| {
            let semaphore = Arc::clone(&semaphore);
            let converter = Arc::clone(&converter);
            let input = task.input.clone();

            let handle = tokio::spawn(async move {
                let permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::worker_pool(e.to_string()));

                match permit {
                    Ok(permit) => {
                        let input = task.input.clone();
                        tokio::task::spawn_blocking(move || {
                            let _permit = permit;
                            task.execute(converter.as_ref(), overwrite)
                        })
                        .await
                        .unwrap_or_else(|e| {
                            BatchItemResult::failure(input, &Error::worker_pool(e.to_string()))
                        })
                    }
                    Err(e) => BatchItemResult::failure(task.input, &e),
                }
            });

            (input, handle)
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (input, handle) in handles {
        let item = handle
            .await
            .unwrap_or_else(|e| BatchItemResult::failure(input, &Error::worker_pool(e.to_string())));
        results.push(item);
    }

    let succeeded = results.iter().filter(|r| r.ok).count();
    info!(
        "✓ Batch finished: {} ok, {} failed",
        succeeded,
        results.len() - succeeded
    );

    Ok(results)
}
