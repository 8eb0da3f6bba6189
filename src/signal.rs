//! Process shutdown signal, for wiring to [`Supervisor::cancellation_token`].
//!
//! [`Supervisor::cancellation_token`]: crate::Supervisor::cancellation_token

/// Completes on `SIGINT`, `SIGTERM` or `SIGQUIT`.
///
/// Errors if the signal handlers cannot be registered.
#[cfg(unix)]
pub async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    };
    tracing::info!(signal = name, "shutdown requested");

    Ok(())
}

/// Completes on Ctrl-C.
#[cfg(not(unix))]
pub async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!(signal = "ctrl_c", "shutdown requested");

    Ok(())
}
