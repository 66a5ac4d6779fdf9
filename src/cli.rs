//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use pnet_datalink::MacAddr;

use crate::config::{
    default_log_dir, MonitorConfig, OutputFormat, RateUnit, DEFAULT_FILTER, DEFAULT_INTERFACE,
    DEFAULT_INTERVAL_SECS,
};
use crate::error::{MonitorError, Result};

#[derive(Parser, Debug)]
#[command(name = "netband")]
#[command(version, about = "Live bandwidth monitor per direction or per subnet", long_about = None)]
pub struct Cli {
    /// Network interface to capture on
    #[arg(short = 'i', long, default_value = DEFAULT_INTERFACE)]
    pub interface: String,

    /// BPF capture filter
    #[arg(short = 'f', long, default_value = DEFAULT_FILTER)]
    pub filter: String,

    /// Subnets to account separately, e.g. "10.0.0.0/24 172.16.0.0/16".
    /// Enables per-subnet file reports.
    #[arg(short = 's', long, value_name = "CIDR", num_args = 1..)]
    pub subnets: Vec<String>,

    /// Reporting interval in seconds
    #[arg(short = 't', long, value_name = "SECONDS", default_value_t = DEFAULT_INTERVAL_SECS)]
    pub interval: u64,

    /// Report bit-rates or byte-rates
    #[arg(short = 'u', long, value_enum, default_value_t = RateUnit::Bits)]
    pub unit: RateUnit,

    /// Terminal output format (direction-only mode)
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Directory for per-subnet report files [default: log/ beside the executable]
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Local hardware address used for direction classification
    /// [default: the interface's own address]
    #[arg(long, value_name = "MAC")]
    pub local_mac: Option<String>,

    /// Capture in promiscuous mode
    #[arg(long)]
    pub promiscuous: bool,

    /// List network interfaces and exit
    #[arg(long)]
    pub list_interfaces: bool,

    /// Verbose logging (-v, -vv for increasing verbosity)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Validate arguments into an immutable configuration.
    pub fn into_config(self) -> Result<MonitorConfig> {
        let local_mac = self
            .local_mac
            .as_deref()
            .map(|s| {
                s.parse::<MacAddr>().map_err(|e| {
                    MonitorError::Config(format!("invalid --local-mac '{s}': {e:?}"))
                })
            })
            .transpose()?;

        let mut config = MonitorConfig::new(self.interface, self.filter).with_interval_secs(self.interval)?;
        config.unit = self.unit;
        config.format = self.format;
        config.promiscuous = self.promiscuous;
        config.local_mac = local_mac;

        if !self.subnets.is_empty() {
            let log_dir = self.log_dir.unwrap_or_else(default_log_dir);
            config = config.with_subnets(self.subnets.as_slice(), log_dir)?;
        }
        Ok(config)
    }

    /// Default tracing directive for the `-v` count.
    pub fn log_directive(&self) -> &'static str {
        match self.verbose {
            0 => "netband=info",
            1 => "netband=debug",
            _ => "netband=trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccountingMode;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("netband").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_are_direction_mode() {
        let config = parse(&[]).into_config().unwrap();
        assert_eq!(config.interface, "eth0");
        assert_eq!(config.filter, "tcp");
        assert_eq!(config.interval.as_secs(), 1);
        assert_eq!(config.unit, RateUnit::Bits);
        assert_eq!(config.mode, AccountingMode::Direction);
        assert!(!config.promiscuous);
    }

    #[test]
    fn test_subnet_mode_from_space_separated_list() {
        let config = parse(&["-i", "wlan0", "-s", "10.0.0.0/24 172.16.0.0/16", "-t", "5", "--log-dir", "/tmp/nb"])
            .into_config()
            .unwrap();
        assert_eq!(config.interval.as_secs(), 5);
        match config.mode {
            AccountingMode::Subnets { subnets, log_dir } => {
                assert_eq!(subnets.len(), 2);
                assert_eq!(subnets[1].to_string(), "172.16.0.0/16");
                assert_eq!(log_dir, PathBuf::from("/tmp/nb"));
            }
            AccountingMode::Direction => panic!("expected subnet mode"),
        }
    }

    #[test]
    fn test_subnets_as_separate_values() {
        let config = parse(&["-s", "10.0.0.0/24", "192.168.0.0/16"]).into_config().unwrap();
        assert_eq!(config.buckets().len(), 2);
    }

    #[test]
    fn test_malformed_subnet_fails_before_capture() {
        let err = parse(&["-s", "10.0.0.0"]).into_config().unwrap_err();
        assert_eq!(err.kind(), "Config");
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(parse(&["-t", "0"]).into_config().is_err());
    }

    #[test]
    fn test_local_mac_override() {
        let config = parse(&["--local-mac", "02:42:AC:11:00:02"]).into_config().unwrap();
        assert_eq!(config.local_mac, Some(MacAddr(0x02, 0x42, 0xac, 0x11, 0x00, 0x02)));
        assert!(parse(&["--local-mac", "nope"]).into_config().is_err());
    }

    #[test]
    fn test_unit_and_format_flags() {
        let config = parse(&["-u", "bytes", "--format", "json"]).into_config().unwrap();
        assert_eq!(config.unit, RateUnit::Bytes);
        assert_eq!(config.format, OutputFormat::Json);
    }

    #[test]
    fn test_verbosity_directive() {
        assert_eq!(parse(&[]).log_directive(), "netband=info");
        assert_eq!(parse(&["-vv"]).log_directive(), "netband=trace");
    }
}
