//! Process-wide CPU parallelism for the rayon-backed stages (block matching
//! and neighbor search).

use crate::{Error, Result};
use rayon::ThreadPoolBuilder;
use std::sync::OnceLock;

/// Environment variable overriding the CPU worker count.
pub const CPU_THREADS_ENV: &str = "SCANMESH_CPU_THREADS";

/// Outcome of the one and only pool construction.
static POOL: OnceLock<std::result::Result<usize, String>> = OnceLock::new();

/// Worker count to request from rayon: the explicit value wins over the
/// environment; `None` leaves the choice to rayon.
fn resolve_cpu_threads(
    explicit: Option<usize>,
    env_value: Option<&str>,
) -> Result<Option<usize>> {
    let requested = match (explicit, env_value) {
        (Some(n), _) => n,
        (None, Some(raw)) => raw.trim().parse().map_err(|_| {
            Error::InvalidInput(format!(
                "{CPU_THREADS_ENV} must be a positive integer, got '{raw}'"
            ))
        })?,
        (None, None) => return Ok(None),
    };
    if requested == 0 {
        return Err(Error::InvalidInput(format!("{CPU_THREADS_ENV} must be >= 1")));
    }
    Ok(Some(requested))
}

/// Build the global rayon pool.
///
/// The worker count comes from `num_threads`, else `SCANMESH_CPU_THREADS`,
/// else rayon's default. The pool is built at most once; later calls report
/// the first outcome whatever their argument.
pub fn init_global_thread_pool(num_threads: Option<usize>) -> Result<()> {
    let outcome = POOL.get_or_init(|| {
        let env_value = std::env::var(CPU_THREADS_ENV).ok();
        let threads = resolve_cpu_threads(num_threads, env_value.as_deref())
            .map_err(|e| e.to_string())?;

        let mut builder = ThreadPoolBuilder::new();
        if let Some(n) = threads {
            builder = builder.num_threads(n);
        }
        builder
            .build_global()
            .map(|()| rayon::current_num_threads())
            .map_err(|e| format!("failed to build the global thread pool: {e}"))
    });
    match outcome {
        Ok(_) => Ok(()),
        Err(msg) => Err(Error::RuntimeError(msg.clone())),
    }
}

/// Workers available to rayon-parallel stages.
pub fn current_cpu_threads() -> usize {
    match POOL.get() {
        Some(Ok(n)) => *n,
        _ => rayon::current_num_threads(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_count_beats_environment() {
        assert_eq!(resolve_cpu_threads(Some(3), Some("8")).unwrap(), Some(3));
        assert_eq!(resolve_cpu_threads(None, Some(" 2 ")).unwrap(), Some(2));
        assert_eq!(resolve_cpu_threads(None, None).unwrap(), None);
    }

    #[test]
    fn test_zero_and_garbage_are_rejected() {
        for (explicit, env_value) in [(Some(0), None), (None, Some("0")), (None, Some("many"))] {
            assert!(matches!(
                resolve_cpu_threads(explicit, env_value),
                Err(Error::InvalidInput(_))
            ));
        }
    }
}
