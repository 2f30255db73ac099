use anyhow::{Context, bail};
use clap::Parser;
use core::time::Duration;
use tardy::{DEFAULT_MAX_ROUNDS, DEFAULT_STEP_COUNT, DEFAULT_WORK_QUEUE_SIZE, EngineConfig};

/// Runtime configuration for the `tardy-server` binary.
///
/// These settings control how each request is split into steps, how long the
/// server polls for their results before answering, and whether steps run on
/// a per-request worker loop or a shared pool. All values are parsed from CLI
/// arguments or environment variables.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "tardy-server",
    version,
    about = "Answers multi-step requests within a bounded polling budget"
)]
pub struct CliArgs {
    /// Number of steps each request is split into.
    ///
    /// Environment variable: `STEP_COUNT`
    #[arg(long, env = "STEP_COUNT", default_value_t = DEFAULT_STEP_COUNT)]
    pub step_count: usize,

    /// Pause between polling rounds, in milliseconds.
    ///
    /// Must be non-zero unless `MAX_ROUNDS` is 0.
    ///
    /// Environment variable: `ROUND_DELAY_MS`
    #[arg(long, env = "ROUND_DELAY_MS", default_value_t = 10)]
    pub round_delay_ms: u64,

    /// Maximum number of polling rounds before answering with partial results.
    ///
    /// Environment variable: `MAX_ROUNDS`
    #[arg(long, env = "MAX_ROUNDS", default_value_t = DEFAULT_MAX_ROUNDS)]
    pub max_rounds: u32,

    /// Simulated step latencies in milliseconds. Each step picks one at random.
    ///
    /// Example: "5,50,500"
    ///
    /// Environment variable: `LATENCIES_MS`
    #[arg(long, env = "LATENCIES_MS", value_delimiter = ',', default_value = "5,50,500")]
    pub latencies_ms: Vec<u64>,

    /// Number of pooled worker loops shared by all requests.
    ///
    /// With 0, every request gets its own worker loop that executes its steps
    /// one after another.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long, env = "NUM_WORKERS", default_value_t = 0)]
    pub num_workers: usize,

    /// Capacity of each pooled worker's queue. Ignored without `NUM_WORKERS`.
    ///
    /// Environment variable: `WORK_QUEUE_SIZE`
    #[arg(long, env = "WORK_QUEUE_SIZE", default_value_t = DEFAULT_WORK_QUEUE_SIZE)]
    pub work_queue_size: usize,

    /// Seconds to wait for each pooled worker to acknowledge shutdown.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,

    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("127.0.0.1:4000"))]
    pub server_addr: String,

    /// Client request id used by `GET /process`.
    ///
    /// Environment variable: `DEFAULT_REQUEST_ID`
    #[arg(long, env = "DEFAULT_REQUEST_ID", default_value_t = String::from("1001"))]
    pub default_request_id: String,

    /// Request content used by `GET /process`.
    ///
    /// Environment variable: `DEFAULT_CONTENT`
    #[arg(long, env = "DEFAULT_CONTENT", default_value_t = String::from("all your gifts are belong to us"))]
    pub default_content: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub engine: EngineConfig,
    pub num_workers: usize,
    pub work_queue_size: usize,
    pub shutdown_timeout: Duration,
    pub server_addr: String,
    pub default_request_id: String,
    pub default_content: String,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.num_workers > 0 && args.work_queue_size == 0 {
            bail!("WORK_QUEUE_SIZE must be greater than 0 when NUM_WORKERS is set");
        }

        let engine = EngineConfig::new(
            args.step_count,
            args.max_rounds,
            Duration::from_millis(args.round_delay_ms),
            args.latencies_ms
                .iter()
                .copied()
                .map(Duration::from_millis)
                .collect(),
        )
        .context("invalid engine configuration")?;

        Ok(Self {
            engine,
            num_workers: args.num_workers,
            work_queue_size: args.work_queue_size,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
            server_addr: args.server_addr,
            default_request_id: args.default_request_id,
            default_content: args.default_content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<ServerConfig> {
        let argv = core::iter::once("tardy-server").chain(args.iter().copied());
        ServerConfig::try_from(CliArgs::try_parse_from(argv)?)
    }

    #[test]
    fn defaults_match_reference_sizing() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.num_workers, 0);
        assert_eq!(config.server_addr, "127.0.0.1:4000");
        assert_eq!(config.default_request_id, "1001");
    }

    #[test]
    fn parses_latency_list() {
        let config = parse(&["--latencies-ms", "1,2,3", "--step-count", "5"]).unwrap();
        assert_eq!(config.engine.step_count(), 5);
        assert_eq!(
            config.engine.latencies().as_slice(),
            &[
                Duration::from_millis(1),
                Duration::from_millis(2),
                Duration::from_millis(3)
            ]
        );
    }

    #[test]
    fn rejects_busy_spin() {
        assert!(parse(&["--round-delay-ms", "0"]).is_err());
        assert!(parse(&["--round-delay-ms", "0", "--max-rounds", "0"]).is_ok());
    }

    #[test]
    fn rejects_pool_without_queue() {
        assert!(parse(&["--num-workers", "2", "--work-queue-size", "0"]).is_err());
    }
}
