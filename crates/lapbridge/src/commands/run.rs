//! `lapbridge run`: the long-running bridge with its stdin console.

use std::io::{self, BufRead};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use lapbridge_core::{
    Bridge, ConnectionState, Epc, HttpDispatcher, LogNotifier, NetReader, PassNotifier,
    ReaderEvent, ReaderTransport, SimReader, event_channel,
};

use crate::cli::{GlobalOpts, RunArgs};
use crate::config;
use crate::console::{self, Reply};
use crate::error::CliError;
use crate::output;

struct Session<'a> {
    global: &'a GlobalOpts,
    auto_start: bool,
    connect_wait: Duration,
}

pub async fn handle(args: &RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let debounce = lapbridge_config::debounce_config(&cfg.stream);

    let mut background: Vec<JoinHandle<()>> = Vec::new();
    let notifier: Arc<dyn PassNotifier> = if args.dry_run {
        info!("dry run, passes are logged and not sent");
        Arc::new(LogNotifier)
    } else {
        let bridge_cfg = config::bridge_config(global, &cfg)?;
        let dispatcher = HttpDispatcher::from_config(&bridge_cfg.api)?;
        if bridge_cfg.ping_interval.is_zero() {
            info!("keepalive ping disabled");
        } else {
            background.push(dispatcher.spawn_ping_task(bridge_cfg.ping_interval));
        }
        Arc::new(dispatcher)
    };

    let session = Session {
        global,
        auto_start: args.start_stream || cfg.stream.auto_start,
        connect_wait: Duration::from_secs(cfg.reader.request_timeout_secs.max(1)),
    };
    let (events_tx, events_rx) = event_channel();

    if args.simulate {
        let epcs = parse_epcs(&args.sim_tags)?;
        let sim = Arc::new(SimReader::new(events_tx));
        let period = Duration::from_millis(args.sim_period_ms.max(1));
        background.push(Arc::clone(&sim).spawn_demo_feed(epcs, period));
        info!(period_ms = args.sim_period_ms, "using simulated reader");
        serve(Bridge::new(sim, notifier, debounce), events_rx, background, &session).await
    } else {
        let endpoint = lapbridge_config::reader_endpoint(&cfg.reader);
        info!(reader = %endpoint, "using network reader");
        let reader = Arc::new(NetReader::new(endpoint, events_tx));
        serve(Bridge::new(reader, notifier, debounce), events_rx, background, &session).await
    }
}

async fn serve<R: ReaderTransport>(
    bridge: Bridge<R>,
    events: mpsc::Receiver<ReaderEvent>,
    background: Vec<JoinHandle<()>>,
    session: &Session<'_>,
) -> Result<(), CliError> {
    bridge.spawn_event_loop(events).await;
    for handle in background {
        bridge.track(handle).await;
    }

    let connect = bridge.connect();
    if session.auto_start {
        auto_start(&bridge, connect, session.connect_wait).await;
    }

    let result = console_loop(&bridge, session.global).await;
    bridge.shutdown().await;
    info!("bridge stopped");
    result
}

/// Start streaming once the initial connect has landed.
async fn auto_start<R: ReaderTransport>(
    bridge: &Bridge<R>,
    connect: JoinHandle<()>,
    wait: Duration,
) {
    if connect.await.is_err() {
        return;
    }
    if let Some(err) = bridge.status().await.last_error {
        warn!(error = %err, "reader not connected, stream not started");
        return;
    }

    let mut state = bridge.connection_state();
    let connected = tokio::time::timeout(
        wait,
        state.wait_for(|s| *s == ConnectionState::Connected),
    )
    .await;
    match connected {
        Ok(Ok(_)) => drop(bridge.start_stream().await),
        _ => warn!("reader did not report a connection, stream not started"),
    }
}

async fn console_loop<R: ReaderTransport>(
    bridge: &Bridge<R>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(global.color);
    let mut lines = spawn_stdin_reader();

    loop {
        let line = tokio::select! {
            line = lines.recv() => line,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                return Ok(());
            }
        };
        let line = match line {
            None => return Ok(()),
            Some(line) => line?,
        };

        match console::dispatch(bridge, &line).await {
            None => {}
            Some(Reply::Quit) => return Ok(()),
            Some(reply) => {
                if let Some(text) = reply.render(global.output, color) {
                    output::print_output(&text, false);
                }
            }
        }
    }
}

/// Blocking stdin reads on a plain thread, so a pending read never holds
/// up runtime shutdown.
fn spawn_stdin_reader() -> mpsc::Receiver<io::Result<String>> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn parse_epcs(raw: &[String]) -> Result<Vec<Epc>, CliError> {
    raw.iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|e| CliError::Validation {
                field: "--sim-tags".into(),
                reason: format!("'{s}': {e}"),
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn sim_tags_parse_and_skip_blanks() {
        let epcs = parse_epcs(&["E200-01".into(), " ".into(), "aabb".into()]).unwrap();
        assert_eq!(epcs.len(), 2);
        assert_eq!(epcs[0].to_hex(), "E20001");
        assert_eq!(epcs[1].to_hex(), "AABB");
    }

    #[test]
    fn bad_sim_tag_is_a_usage_error() {
        let err = parse_epcs(&["XYZ".into()]).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::exit_code::USAGE);
    }
}
