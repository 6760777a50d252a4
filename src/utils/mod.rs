pub mod io;

use std::sync::atomic::{AtomicBool, Ordering};

static STOP_SOON: AtomicBool = AtomicBool::new(false);

/// Whether a stop was requested; checked between targets so a batch winds
/// down at a run boundary instead of dying mid-supervision.
pub fn stop_soon() -> bool {
    STOP_SOON.load(Ordering::Relaxed)
}

pub fn stop_req() {
    STOP_SOON.store(true, Ordering::Relaxed)
}

/// Turns the first TERM signal into a stop request and logs its origin.
pub fn setup_signal_handler() {
    use signal_hook::consts::TERM_SIGNALS;
    use signal_hook::iterator::exfiltrator::WithOrigin;
    use signal_hook::iterator::SignalsInfo;

    std::thread::spawn(move || {
        let mut signals = SignalsInfo::<WithOrigin>::new(TERM_SIGNALS).unwrap();
        if let Some(info) = signals.forever().next() {
            let name = signal_hook::low_level::signal_name(info.signal)
                .map(|n| format!("{}({})", n, info.signal))
                .unwrap_or_else(|| info.signal.to_string());
            log::info!("{} received, finishing current target before exit", name);
            stop_req();
        }
    });
}
