//! # Process termination signals.
//!
//! [`wait_for_shutdown_signal`] completes when the host asks the appliance
//! process to stop. On the device there is no such signal; the runtime is
//! stopped through its cancellation token instead.
//!
//! Unix: `SIGINT`, `SIGTERM`, `SIGQUIT`. Elsewhere: Ctrl-C.

/// Waits for a termination signal.
///
/// Returns `Err` if the listeners cannot be installed.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = sigint.recv()  => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    };
    log::info!("[shutdown] received {name}");
    Ok(())
}

/// Waits for a termination signal.
///
/// Returns `Err` if the listener cannot be installed.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    log::info!("[shutdown] received Ctrl-C");
    Ok(())
}
