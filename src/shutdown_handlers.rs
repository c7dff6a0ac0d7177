use crate::shutdown::RunFlag;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Translates Ctrl-C (and SIGTERM on unix) into [`RunFlag::stop`].
///
/// The task also exits once the flag is cleared by any other path.
pub fn setup_signal_shutdown_handler(run_flag: &RunFlag) -> tokio::task::JoinHandle<()> {
    let run_flag = run_flag.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        let mut term_signal = match signal(SignalKind::terminate()) {
            Ok(signal) => Some(signal),
            Err(err) => {
                tracing::warn!("Failed to register SIGTERM handler: {}", err);
                None
            }
        };

        #[cfg(unix)]
        {
            tokio::select! {
                () = run_flag.stopped() => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::warn!("Interrupt received. Stopping load test...");
                    run_flag.stop();
                }
                () = async {
                    if let Some(signal) = term_signal.as_mut() {
                        signal.recv().await;
                    } else {
                        std::future::pending::<()>().await;
                    }
                } => {
                    tracing::warn!("SIGTERM received. Stopping load test...");
                    run_flag.stop();
                }
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                () = run_flag.stopped() => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::warn!("Interrupt received. Stopping load test...");
                    run_flag.stop();
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult};
    use std::time::Duration;

    const SIGNAL_HANDLER_SETTLE: Duration = Duration::from_millis(10);
    const SHUTDOWN_HANDLER_TIMEOUT: Duration = Duration::from_secs(1);

    #[test]
    fn signal_handler_exits_on_stop() -> AppResult<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| AppError::validation(format!("Failed to build runtime: {}", err)))?;
        runtime.block_on(async {
            let run_flag = RunFlag::new();
            let handle = setup_signal_shutdown_handler(&run_flag);

            tokio::time::sleep(SIGNAL_HANDLER_SETTLE).await;
            run_flag.stop();

            tokio::time::timeout(SHUTDOWN_HANDLER_TIMEOUT, handle)
                .await
                .map_err(|err| {
                    AppError::validation(format!("Timed out waiting for shutdown handler: {}", err))
                })?
                .map_err(|err| {
                    AppError::validation(format!("Shutdown task join error: {}", err))
                })?;
            Ok(())
        })
    }
}
