use rayon::prelude::*;
use tracing::warn;

/// Maps `func` over `items` on up to `jobs` threads. Output order always
/// matches input order; `jobs <= 1` runs inline.
pub fn map_in_parallel<T, R, F>(items: Vec<T>, jobs: usize, func: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Send + Sync,
{
    if jobs <= 1 || items.len() <= 1 {
        return items.into_iter().map(func).collect();
    }
    match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
        Ok(pool) => pool.install(|| items.into_par_iter().map(func).collect()),
        Err(err) => {
            warn!(error = %err, "falling back to sequential fetch");
            items.into_iter().map(func).collect()
        }
    }
}

pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
