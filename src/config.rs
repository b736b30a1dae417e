//! Configuration loading for the polling bridge.
//!
//! Deserializes the JSON configuration shape that describes which PLCs to
//! poll and which symbolic addresses to read from each one. This mirrors the
//! source's `load_config` (a JSON file read once at process start) but drops
//! its multi-encoding fallback chain: a Rust deployment only needs to accept
//! UTF-8 and UTF-8-with-BOM.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Sentinel `plc_reg_add` value reserved for the synthetic heartbeat tag.
pub const HEARTBEAT: &str = "HEARTBEAT";

/// Default inter-cycle sleep when a `PlcConfig` does not specify one.
pub const DEFAULT_SLEEP_INTERVAL_SECS: f64 = 0.01;

/// Errors that can occur while loading or validating a [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read from disk.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file's bytes are not valid UTF-8 (after stripping a BOM).
    #[error("config file {path} is not valid UTF-8: {source}")]
    Encoding {
        /// Path that failed to decode.
        path: String,
        /// Underlying UTF-8 error.
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// The file parsed as UTF-8 but not as the expected JSON shape.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// `plcs` was empty.
    #[error("config must declare at least one PLC")]
    NoPlcs,

    /// Two `PlcConfig` entries shared the same `plc_name`.
    #[error("duplicate plc_name '{0}' in config")]
    DuplicatePlcName(String),
}

/// One entry in a `PlcConfig`'s `address_mappings` list.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressMapping {
    /// Symbolic PLC address (e.g. `D100`, `W0.05`), or the literal
    /// [`HEARTBEAT`] sentinel.
    pub plc_reg_add: String,
    /// The tag name this reading is published under.
    pub opcua_reg_add: String,
    /// Data type name, matched case-insensitively against
    /// [`crate::data_type::DataType::from_name`].
    pub data_type: String,
}

/// Configuration for one polled PLC.
#[derive(Debug, Clone, Deserialize)]
pub struct PlcConfig {
    /// Unique name identifying this PLC across the config.
    pub plc_name: String,
    /// PLC's IP address (FINS/UDP, default port 9600).
    pub plc_ip: String,
    /// OPC UA endpoint URL. Carried through for a `PublishSink`
    /// implementation; not otherwise interpreted by the core.
    pub opcua_url: String,
    /// Inter-cycle sleep, in seconds. Defaults to
    /// [`DEFAULT_SLEEP_INTERVAL_SECS`] (10 ms) when omitted.
    #[serde(default = "default_sleep_interval")]
    pub sleep_interval: f64,
    /// Ordered list of addresses to poll and publish every cycle.
    pub address_mappings: Vec<AddressMapping>,
}

fn default_sleep_interval() -> f64 {
    DEFAULT_SLEEP_INTERVAL_SECS
}

/// Top-level configuration: the set of PLCs this process polls.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// One entry per polled PLC.
    pub plcs: Vec<PlcConfig>,
}

impl Config {
    /// Loads and validates a [`Config`] from a JSON file at `path`.
    ///
    /// Accepts UTF-8 and UTF-8-with-BOM encoded files. Rejects a config with
    /// zero `plcs` entries or a duplicate `plc_name`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        let bytes = fs::read(path).map_err(|source| ConfigError::Io {
            path: path_str.clone(),
            source,
        })?;
        let bytes = bytes
            .strip_prefix(&[0xEF, 0xBB, 0xBF])
            .unwrap_or(&bytes);
        let text = String::from_utf8(bytes.to_vec()).map_err(|source| ConfigError::Encoding {
            path: path_str.clone(),
            source,
        })?;

        let config: Config =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path_str.clone(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.plcs.is_empty() {
            return Err(ConfigError::NoPlcs);
        }

        let mut seen = std::collections::HashSet::new();
        for plc in &self.plcs {
            if !seen.insert(plc.plc_name.clone()) {
                return Err(ConfigError::DuplicatePlcName(plc.plc_name.clone()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    const SAMPLE_JSON: &str = r#"
    {
        "plcs": [
            {
                "plc_name": "line1",
                "plc_ip": "192.168.1.10",
                "opcua_url": "opc.tcp://localhost:4840",
                "address_mappings": [
                    { "plc_reg_add": "D100", "opcua_reg_add": "Temperature1", "data_type": "INT16" },
                    { "plc_reg_add": "HEARTBEAT", "opcua_reg_add": "PLC_Heartbeat", "data_type": "BOOL" }
                ]
            }
        ]
    }
    "#;

    #[test]
    fn test_load_parses_valid_config() {
        let file = write_temp(SAMPLE_JSON.as_bytes());
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.plcs.len(), 1);
        assert_eq!(config.plcs[0].plc_name, "line1");
        assert_eq!(config.plcs[0].sleep_interval, DEFAULT_SLEEP_INTERVAL_SECS);
        assert_eq!(config.plcs[0].address_mappings.len(), 2);
    }

    #[test]
    fn test_load_strips_utf8_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(SAMPLE_JSON.as_bytes());
        let file = write_temp(&bytes);
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.plcs.len(), 1);
    }

    #[test]
    fn test_load_honors_explicit_sleep_interval() {
        let json = r#"{"plcs":[{"plc_name":"a","plc_ip":"1.2.3.4","opcua_url":"x","sleep_interval":0.5,"address_mappings":[]}]}"#;
        let file = write_temp(json.as_bytes());
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.plcs[0].sleep_interval, 0.5);
    }

    #[test]
    fn test_rejects_zero_plcs() {
        let file = write_temp(br#"{"plcs":[]}"#);
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::NoPlcs));
    }

    #[test]
    fn test_rejects_duplicate_plc_name() {
        let json = r#"{"plcs":[
            {"plc_name":"a","plc_ip":"1.2.3.4","opcua_url":"x","address_mappings":[]},
            {"plc_name":"a","plc_ip":"5.6.7.8","opcua_url":"y","address_mappings":[]}
        ]}"#;
        let file = write_temp(json.as_bytes());
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicatePlcName(name) if name == "a"));
    }

    #[test]
    fn test_rejects_missing_file() {
        let err = Config::load("/nonexistent/path/plc_data.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let file = write_temp(b"not json");
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
