use log::{info, warn};
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::Signals,
};
use tokio::sync::oneshot;

/// The first SIGINT or SIGTERM tells systemd we are stopping and resolves the
/// returned receiver so buffered events can be flushed. A second signal ends
/// the process right away.
pub fn handle_shutdown() -> std::io::Result<oneshot::Receiver<()>> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let (stop_tx, stop_rx) = oneshot::channel();

    std::thread::spawn(move || {
        let mut stop_tx = Some(stop_tx);
        for signal in signals.forever() {
            match stop_tx.take() {
                Some(stop_tx) => {
                    info!("Received signal {signal}, shutting down");
                    let _ = sd_notify::notify(true, &[sd_notify::NotifyState::Stopping]);
                    let _ = stop_tx.send(());
                }
                None => {
                    warn!("Received signal {signal} again, exiting now");
                    std::process::exit(1);
                }
            }
        }
    });
    Ok(stop_rx)
}
