pub mod config;
pub mod logging_system;

pub use config::{Config, LogLevel};
pub use logging_system::{LoggingError, setup_logging};

use crate::sender::{MemoryTransport, Transport};
use crate::shipper::LogShipper;
use chrono::{SecondsFormat, Utc};
use clap::Parser;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// 320 bytes, so each generated line is roughly the size of a real record.
fn padding() -> String {
    "123456789 ".repeat(32)
}

pub fn traffic_line(run_id: &Uuid, padding: &str, counter: u64) -> String {
    format!(
        "{} {} {}{}",
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        run_id,
        padding,
        counter
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub generated: u64,
    pub sent: u64,
    pub status_codes: std::collections::BTreeMap<u16, u64>,
}

/// Feeds `per_tick` lines into the shipper every `tick` until `run` elapses,
/// then shuts down with a final flush and waits `drain` for responses.
pub async fn generate_traffic<T: Transport>(
    shipper: &LogShipper<T>,
    run: Duration,
    tick: Duration,
    per_tick: usize,
    drain: Duration,
) -> RunSummary {
    let run_id = Uuid::new_v4();
    let padding = padding();
    info!(%run_id, run_ms = run.as_millis() as u64, per_tick, "generating traffic");

    let mut counter: u64 = 0;
    let mut ticker = tokio::time::interval(tick);
    let stop = tokio::time::sleep(run);
    tokio::pin!(stop);

    loop {
        tokio::select! {
            () = &mut stop => break,
            _ = ticker.tick() => {
                for _ in 0..per_tick {
                    counter += 1;
                    shipper.submit(traffic_line(&run_id, &padding, counter));
                }
            }
        }
    }

    shipper.shutdown(true);
    tokio::time::sleep(drain).await;

    RunSummary {
        generated: counter,
        sent: shipper.message_count(),
        status_codes: shipper.status_codes(),
    }
}

pub async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    setup_logging(config.effective_log_level())?;

    let shipper_config = config.shipper_config()?;
    info!("Starting rask-log-shipper v{}", crate::VERSION);

    let summary = if config.dry_run {
        let shipper = LogShipper::with_transport(shipper_config, MemoryTransport::counting())?;
        let summary = run(&shipper, &config).await;
        info!(requests = shipper.transport().request_count(), "dry run finished");
        summary
    } else {
        let shipper = LogShipper::new(shipper_config)?;
        run(&shipper, &config).await
    };

    info!(
        generated = summary.generated,
        sent = summary.sent,
        status_codes = ?summary.status_codes,
        "DONE"
    );
    Ok(())
}

async fn run<T: Transport>(shipper: &LogShipper<T>, config: &Config) -> RunSummary {
    generate_traffic(
        shipper,
        config.run_duration(),
        config.tick(),
        config.batch,
        config.drain_grace(),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shipper::ShipperConfig;

    #[test]
    fn test_traffic_line_layout() {
        let run_id = Uuid::new_v4();
        let line = traffic_line(&run_id, &padding(), 42);
        assert!(line.contains(&run_id.to_string()));
        assert!(line.ends_with("123456789 42"));
        assert!(line.len() > 320);
        assert!(!line.contains('\n'));
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_traffic_delivers_everything() {
        let transport = MemoryTransport::new();
        let config = ShipperConfig {
            max_messages: 25,
            flush_interval_ms: 100,
            ..ShipperConfig::new("collector.test", "/logs")
        };
        let shipper = LogShipper::with_transport(config, transport.clone()).unwrap();

        let summary = generate_traffic(
            &shipper,
            Duration::from_millis(50),
            Duration::from_millis(10),
            10,
            Duration::from_millis(100),
        )
        .await;

        assert!(summary.generated >= 50);
        assert_eq!(summary.sent, summary.generated);
        assert!(shipper.is_stopped());

        let lines: usize = transport
            .requests()
            .iter()
            .map(|r| r.body.iter().filter(|b| **b == b'\n').count())
            .sum();
        assert_eq!(lines as u64, summary.generated);
        assert_eq!(summary.status_codes.values().sum::<u64>(), transport.request_count() as u64);
    }
}
