//! Host demo: the acquisition core driven by a simulated receiver, a reporting thread
//! standing in for the SMS sender, and a few simulated movement triggers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing_subscriber::filter::LevelFilter;

use tracker::gnss::sim::{synthetic_fix, SimulatedReceiver};
use tracker::gnss::{FixFlags, RawSentence, SearchParameters};
use tracker::{thread, Config, EventSignal, Events, FixReader, Timeout, Tracker};

const STACK_SIZE: usize = 64 * 1024;
const FRAME_INTERVAL: Duration = Duration::from_millis(250);

const SAMPLE_RMC: &str =
    "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .init();

    log::info!("hello, small black box!");

    let signal = Arc::new(EventSignal::new());
    let receiver = Arc::new(SimulatedReceiver::new());

    let config = Config::default()
        .with_search(SearchParameters::default().with_retry_budget(Duration::from_secs(2)))
        .with_watchdog_timeout(Duration::from_secs(3))
        .with_await_application(true);

    let mut tracker = Tracker::start(Arc::clone(&receiver), Arc::clone(&signal), config)
        .context("failed to start the acquisition core")?;

    let reporter = spawn_reporter(Arc::clone(&signal), tracker.reader())?;
    let sky = spawn_sky(Arc::clone(&signal), Arc::clone(&receiver))?;

    let ready = Events::ACQUISITION_INITIALIZED | Events::SMS_INITIALIZED;
    if !signal.wait_all(ready, Duration::from_secs(5)).contains(ready) {
        anyhow::bail!("collaborators did not come up in time");
    }
    signal.post(Events::APPLICATION_INITIALIZED);

    // Each movement asks for a fresh position; the second round gets no sky view
    for round in 0..3 {
        log::info!("movement {} detected", round + 1);
        signal.post(Events::MOVEMENT_TRIGGERED | Events::REQUEST_ACQUISITION);

        signal.wait_any(
            Events::POSITION_FIXED | Events::TIMED_OUT | Events::SMS_LOG_SEND,
            Duration::from_secs(10),
        );
        std::thread::sleep(Duration::from_secs(1));
        signal.clear(Events::MOVEMENT_TRIGGERED | Events::SMS_LOG_SEND);
    }

    log::info!(
        "searches: {:?}, relay: {:?}",
        tracker.machine_stats(),
        tracker.relay_stats()
    );

    tracker.shutdown().context("failed to stop the acquisition core")?;

    for (name, worker) in [("reporter", reporter), ("sky", sky)] {
        if worker.join().is_err() {
            anyhow::bail!("the {} thread panicked", name);
        }
    }

    Ok(())
}

/// Reports every search outcome, the way the SMS sender would, and releases the receiver.
fn spawn_reporter(
    signal: Arc<EventSignal>,
    reader: FixReader,
) -> Result<std::thread::JoinHandle<()>> {
    let worker = thread::spawn("reporter", STACK_SIZE, move || {
        signal.post(Events::SMS_INITIALIZED);

        loop {
            let events = signal.wait_any(
                Events::POSITION_FIXED | Events::TIMED_OUT | Events::SHUTDOWN,
                Timeout::Forever,
            );
            if events.contains(Events::SHUTDOWN) {
                return Ok(());
            }

            if events.contains(Events::POSITION_FIXED) {
                match reader.get_last_fix() {
                    Some(fix) => log::info!(
                        "[reporter] sending position {:.06},{:.06}",
                        fix.latitude,
                        fix.longitude
                    ),
                    None => log::warn!("[reporter] fix announced but not readable"),
                }

                // No need to keep the receiver powered once the position is out
                signal.set_masked(
                    Events::STOP_ACQUISITION | Events::SMS_LOG_SEND,
                    !Events::POSITION_FIXED,
                );
            }

            if events.contains(Events::TIMED_OUT) {
                log::warn!("[reporter] no position available");
                signal.set_masked(Events::SMS_LOG_SEND, !Events::TIMED_OUT);
            }

            if let Some(sentence) = reader.last_sentence() {
                match sentence.decode() {
                    Ok(position) => log::debug!("[reporter] last sentence: {:?}", position),
                    Err(e) => log::debug!("[reporter] last sentence unusable: {}", e),
                }
            }
        }
    })?;

    Ok(worker)
}

/// Feeds the simulated receiver with frames while it searches.
fn spawn_sky(
    signal: Arc<EventSignal>,
    receiver: Arc<SimulatedReceiver>,
) -> Result<std::thread::JoinHandle<()>> {
    let start = NaiveDate::from_ymd_opt(2024, 6, 1)
        .and_then(|date| date.and_hms_opt(8, 30, 0))
        .context("invalid start time")?;

    let worker = thread::spawn("sky", STACK_SIZE, move || {
        let mut search = 0u32;

        loop {
            let events = signal.wait_any(Events::SEARCHING | Events::SHUTDOWN, Timeout::Forever);
            if events.contains(Events::SHUTDOWN) {
                return Ok(());
            }
            search += 1;

            // Nothing but tracking frames on the second search
            let frames = if search == 2 { u32::MAX } else { 4 };

            let mut frame = 0u32;
            while signal.current().contains(Events::SEARCHING) {
                let offset = i64::from(search) * 60 + i64::from(frame);
                let datetime = start + chrono::Duration::seconds(offset);
                let flags = if frame.saturating_add(1) >= frames {
                    FixFlags::FIX_VALID.with(FixFlags::VELOCITY_VALID)
                } else {
                    FixFlags::default()
                };

                receiver.report(synthetic_fix(59.437, 24.7536, datetime, flags));
                if flags.contains(FixFlags::FIX_VALID) {
                    receiver.report_sentence(RawSentence::new(SAMPLE_RMC)?);
                }

                frame = frame.saturating_add(1);
                std::thread::sleep(FRAME_INTERVAL);
            }
        }
    })?;

    Ok(worker)
}
