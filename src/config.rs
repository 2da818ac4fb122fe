use std::{
    env,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

#[cfg(feature = "tch-backend")]
use tch::Device;

use crate::model::DecodingConfig;

/// Beam count, length penalty and repetition penalty of the formal rewrite.
/// These never follow the environment.
pub const FORMAL_NUM_BEAMS: usize = 4;
pub const FORMAL_LENGTH_PENALTY: f32 = 1.0;
pub const FORMAL_REPETITION_PENALTY: f32 = 2.6;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub model_dir: PathBuf,
    pub max_input_len: usize,
    pub max_summary_len: usize,
    pub num_beams: usize,
    pub length_penalty: f32,
    pub repetition_penalty: f32,
    /// `None` means generation is not time-bounded.
    pub generation_timeout: Option<Duration>,
    #[cfg(feature = "tch-backend")]
    pub device: Device,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 5000),
            model_dir: PathBuf::from("exported_t5_news"),
            max_input_len: 512,
            max_summary_len: 150,
            num_beams: 2,
            length_penalty: 1.0,
            repetition_penalty: 2.5,
            generation_timeout: Some(Duration::from_secs(300)),
            #[cfg(feature = "tch-backend")]
            device: Device::Cpu,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Builds the configuration from `var`, falling back to the defaults for
    /// absent or unparsable values.
    fn from_vars(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let host: IpAddr = parse_or(&var, "HOST", IpAddr::V4(Ipv4Addr::LOCALHOST));
        let port: u16 = parse_or(&var, "PORT", defaults.listen_addr.port());
        let listen_addr = SocketAddr::new(host, port);

        let model_dir = var("MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.model_dir);

        let max_input_len = parse_or(&var, "MAX_INPUT_LEN", defaults.max_input_len);
        let max_summary_len = parse_or(&var, "MAX_SUM_LEN", defaults.max_summary_len);
        let num_beams = parse_or(&var, "NUM_BEAMS", defaults.num_beams);
        let length_penalty = parse_or(&var, "LENGTH_PENALTY", defaults.length_penalty);
        let repetition_penalty =
            parse_or(&var, "REPETITION_PENALTY", defaults.repetition_penalty);

        if max_input_len == 0 || max_summary_len < 2 || num_beams == 0 {
            anyhow::bail!(
                "invalid decoding limits: MAX_INPUT_LEN={max_input_len}, \
                 MAX_SUM_LEN={max_summary_len}, NUM_BEAMS={num_beams}"
            );
        }

        let timeout_secs: u64 = parse_or(&var, "GENERATION_TIMEOUT_SECS", 300);
        let generation_timeout = match timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        #[cfg(feature = "tch-backend")]
        let device = parse_device(&var("DEVICE").unwrap_or_else(|| "auto".into()));

        Ok(Self {
            listen_addr,
            model_dir,
            max_input_len,
            max_summary_len,
            num_beams,
            length_penalty,
            repetition_penalty,
            generation_timeout,
            #[cfg(feature = "tch-backend")]
            device,
        })
    }

    /// Decoding parameters for the primary summary.
    pub fn default_decoding(&self) -> DecodingConfig {
        DecodingConfig {
            max_length: self.max_summary_len,
            num_beams: self.num_beams,
            length_penalty: self.length_penalty,
            repetition_penalty: self.repetition_penalty,
            early_stopping: true,
        }
    }

    /// Decoding parameters for the formal rewrite. Only the output length is
    /// shared with the primary stage.
    pub fn formal_decoding(&self) -> DecodingConfig {
        DecodingConfig {
            max_length: self.max_summary_len,
            num_beams: FORMAL_NUM_BEAMS,
            length_penalty: FORMAL_LENGTH_PENALTY,
            repetition_penalty: FORMAL_REPETITION_PENALTY,
            early_stopping: true,
        }
    }
}

fn parse_or<T: FromStr>(var: impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    var(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(feature = "tch-backend")]
fn parse_device(raw: &str) -> Device {
    let lower = raw.to_lowercase();
    if lower == "cpu" {
        Device::Cpu
    } else if lower.starts_with("cuda") {
        let idx = lower
            .split(':')
            .nth(1)
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(0);
        if tch::Cuda::is_available() {
            Device::Cuda(idx)
        } else {
            Device::Cpu
        }
    } else {
        Device::cuda_if_available()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = from_pairs(&[]).unwrap();
        let defaults = AppConfig::default();
        assert_eq!(config.listen_addr, defaults.listen_addr);
        assert_eq!(config.model_dir, defaults.model_dir);
        assert_eq!(config.default_decoding(), defaults.default_decoding());
        assert_eq!(config.generation_timeout, Some(Duration::from_secs(300)));
    }

    #[test]
    fn environment_overrides_are_read() {
        let config = from_pairs(&[
            ("HOST", "0.0.0.0"),
            ("PORT", "8080"),
            ("MODEL_DIR", "/models/t5"),
            ("MAX_INPUT_LEN", "256"),
            ("MAX_SUM_LEN", " 64 "),
            ("NUM_BEAMS", "3"),
            ("LENGTH_PENALTY", "0.8"),
            ("REPETITION_PENALTY", "1.5"),
            ("GENERATION_TIMEOUT_SECS", "30"),
            ("DEVICE", "cpu"),
        ])
        .unwrap();

        assert_eq!(config.listen_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.model_dir, PathBuf::from("/models/t5"));
        assert_eq!(config.max_input_len, 256);
        let decoding = config.default_decoding();
        assert_eq!(decoding.max_length, 64);
        assert_eq!(decoding.num_beams, 3);
        assert_eq!(decoding.length_penalty, 0.8);
        assert_eq!(decoding.repetition_penalty, 1.5);
        assert_eq!(config.generation_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn zero_timeout_disables_the_limit() {
        let config = from_pairs(&[("GENERATION_TIMEOUT_SECS", "0")]).unwrap();
        assert_eq!(config.generation_timeout, None);
    }

    #[test]
    fn unparsable_values_fall_back_to_defaults() {
        let config = from_pairs(&[("PORT", "http"), ("NUM_BEAMS", "many")]).unwrap();
        assert_eq!(config.listen_addr.port(), 5000);
        assert_eq!(config.num_beams, 2);
    }

    #[test]
    fn invalid_limits_are_rejected() {
        for pairs in [
            [("NUM_BEAMS", "0")],
            [("MAX_INPUT_LEN", "0")],
            [("MAX_SUM_LEN", "1")],
        ] {
            let err = from_pairs(&pairs).unwrap_err();
            assert!(err.to_string().contains("invalid decoding limits"), "{pairs:?}");
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.listen_addr.port(), 5000);
        assert_eq!(config.max_input_len, 512);

        let decoding = config.default_decoding();
        assert_eq!(decoding.max_length, 150);
        assert_eq!(decoding.num_beams, 2);
        assert_eq!(decoding.length_penalty, 1.0);
        assert_eq!(decoding.repetition_penalty, 2.5);
        assert!(decoding.early_stopping);
    }

    #[test]
    fn formal_decoding_ignores_primary_overrides() {
        let config = AppConfig {
            num_beams: 8,
            length_penalty: 0.4,
            repetition_penalty: 1.1,
            max_summary_len: 64,
            ..AppConfig::default()
        };

        let formal = config.formal_decoding();
        assert_eq!(formal.num_beams, 4);
        assert_eq!(formal.length_penalty, 1.0);
        assert_eq!(formal.repetition_penalty, 2.6);
        assert_eq!(formal.max_length, 64);
        assert_eq!(formal, AppConfig::default().formal_decoding().with_max_length(64));
    }
}
