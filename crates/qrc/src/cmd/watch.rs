use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::cmd::request::{send_get, Session};
use crate::cmd::{parse_duration, WatchArgs};
use crate::exit::{device_error, event_code, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_event, OutputFormat};

const SLEEP_STEP: Duration = Duration::from_millis(25);

pub fn run(args: WatchArgs, format: OutputFormat) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let session = Session::open(&args.target.line)?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut polls = 0usize;

    while running.load(Ordering::SeqCst) {
        send_get(session.dispatcher(), args.what, args.target.address)
            .map_err(|e| device_error("request failed", e))?;
        let event = session.finish()?;
        if event.is_failure() {
            tracing::warn!(event = event.name(), "{}", event.summary());
        }
        print_event(&event, format);
        polls = polls.saturating_add(1);

        if let Some(count) = args.count {
            if polls >= count {
                return Ok(event_code(&event));
            }
        }

        pause(interval, &running);
    }

    tracing::debug!(polls, "watch interrupted");
    Ok(SUCCESS)
}

/// Sleep for `interval`, waking early once `running` is cleared.
fn pause(interval: Duration, running: &AtomicBool) {
    let deadline = Instant::now() + interval;
    while running.load(Ordering::SeqCst) {
        let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
            return;
        };
        thread::sleep(remaining.min(SLEEP_STEP));
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
