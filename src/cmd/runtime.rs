use crate::cancel::CancelToken;
use anyhow::Context;
use tokio::runtime::Runtime;

/// 128 + SIGINT
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// What to do when Ctrl-C arrives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interrupt {
    /// Stop cooperatively before the next batch
    Cancel,
    /// Already cancelling; leave now
    Exit,
}

/// Record an interrupt on `token` and decide how to react to it.
pub(crate) fn on_interrupt(token: &CancelToken) -> Interrupt {
    if token.is_cancelled() {
        Interrupt::Exit
    } else {
        token.cancel();
        Interrupt::Cancel
    }
}

/// Runtime that drives the SQL Server client.
///
/// Multi-threaded so `Handle::block_on` from the main thread has a worker to
/// poll the socket. The first Ctrl-C flips `cancel` and the import stops before
/// the next batch; a second one exits immediately.
pub fn build(cancel: &CancelToken) -> anyhow::Result<Runtime> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("schema-import-io")
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let token = cancel.clone();
    runtime.spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            match on_interrupt(&token) {
                Interrupt::Cancel => tracing::warn!(
                    "interrupt received, stopping after the current batch (Ctrl-C again to exit)"
                ),
                Interrupt::Exit => {
                    tracing::error!("second interrupt received, exiting");
                    std::process::exit(INTERRUPTED_EXIT_CODE);
                }
            }
        }
    });

    Ok(runtime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_interrupt_exits() {
        let token = CancelToken::new();
        assert_eq!(on_interrupt(&token), Interrupt::Cancel);
        assert!(token.is_cancelled());
        assert_eq!(on_interrupt(&token), Interrupt::Exit);
        assert_eq!(on_interrupt(&token), Interrupt::Exit);
    }

    #[test]
    fn test_runtime_builds() {
        let cancel = CancelToken::new();
        let runtime = build(&cancel).unwrap();
        assert_eq!(runtime.block_on(async { 1 + 1 }), 2);
        assert!(!cancel.is_cancelled());
    }
}
