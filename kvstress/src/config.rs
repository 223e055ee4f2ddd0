//! Run configuration for the load generator.
//!
//! Configuration is assembled from the following sources, with the later ones taking precedence:
//!
//! 1. Defaults
//! 2. YAML configuration file (specified via `-C` or `--config`)
//! 3. Command line flags
//!
//! # YAML Configuration File
//!
//! All fields are optional. Durations use a human readable format, sizes accept units:
//!
//! ```yaml
//! nodes: ["cache-1", "cache-2:11311"]
//! bucket: default
//! num_clients: 2
//! num_threads: 8
//! num_docs: 100000
//! ratio: 10
//! sampling: 25
//! workload: getscas
//! ramp: 30s
//! doc_size: 4KiB
//! ```

use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use argh::FromArgs;
use bytesize::ByteSize;
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

use crate::workload::WorkloadKind;

/// Node used when none are configured.
pub const DEFAULT_NODES: &str = "127.0.0.1";
/// Bucket used when none is configured.
pub const DEFAULT_BUCKET: &str = "default";

/// Errors while loading or validating the run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be opened.
    #[error("failed to open config file {}", path.display())]
    Open {
        /// Path of the configuration file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML or has unknown fields.
    #[error("failed to parse config YAML")]
    Parse(#[from] serde_yaml::Error),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Load generator for memcached-compatible key-value stores
#[derive(Debug, Default, FromArgs)]
pub struct Args {
    /// path to a YAML configuration file, values are overridden by flags
    #[argh(option, short = 'C')]
    pub config: Option<PathBuf>,

    /// list of nodes to connect to, separated with "," (default: "127.0.0.1")
    #[argh(option, short = 'n')]
    pub nodes: Option<String>,

    /// name of the bucket (default: "default")
    #[argh(option, short = 'b')]
    pub bucket: Option<String>,

    /// password of the bucket (default: "")
    #[argh(option, short = 'p')]
    pub password: Option<String>,

    /// number of worker threads per client (default: 1)
    #[argh(option, short = 't')]
    pub num_threads: Option<usize>,

    /// number of clients, each with its own connection (default: 1)
    #[argh(option, short = 'c')]
    pub num_clients: Option<usize>,

    /// number of documents to work with (default: 1000)
    #[argh(option, short = 'd')]
    pub num_docs: Option<u64>,

    /// operations per document, depending on the workload (default: 50)
    #[argh(option, short = 'R')]
    pub ratio: Option<u32>,

    /// percentage of iterations to measure, 1 to 100 (default: 100)
    #[argh(option, short = 's')]
    pub sampling: Option<u32>,

    /// name of the workload, "getset" or "getscas" (default: "getset")
    #[argh(option, short = 'w')]
    pub workload: Option<WorkloadKind>,

    /// ramp-up time in seconds during which measurements are discarded (default: 0)
    #[argh(option, short = 'r')]
    pub ramp: Option<u64>,

    /// size of the random documents in bytes (default: 1000)
    #[argh(option, short = 'S')]
    pub doc_size: Option<u64>,

    /// read the document from this file instead of generating random bytes
    #[argh(option, short = 'f')]
    pub filename: Option<PathBuf>,
}

/// Immutable settings of a load test run, shared by all clients and workloads.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Store nodes as `host` or `host:port`.
    pub nodes: Vec<String>,
    /// Bucket to authenticate against.
    pub bucket: String,
    /// Bucket password; empty disables authentication.
    pub password: SecretString,
    /// Worker threads, and thereby workload units, per client.
    pub num_threads: usize,
    /// Number of clients, each owning one store connection.
    pub num_clients: usize,
    /// Total number of documents, split evenly across clients and then workers.
    pub num_docs: u64,
    /// Number of reads (or gets/cas pairs) per written document.
    pub ratio: u32,
    /// Percentage of iterations whose operations are timed.
    pub sampling: u32,
    /// The operation mix to run.
    pub workload: WorkloadKind,
    /// Initial window of each workload during which measurements are discarded.
    #[serde(with = "humantime_serde")]
    pub ramp: Duration,
    /// Size of randomly generated documents.
    pub doc_size: ByteSize,
    /// Source file for the document payload, replacing random documents.
    pub filename: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            nodes: vec![DEFAULT_NODES.to_owned()],
            bucket: DEFAULT_BUCKET.to_owned(),
            password: SecretString::from(""),
            num_threads: 1,
            num_clients: 1,
            num_docs: 1000,
            ratio: 50,
            sampling: 100,
            workload: WorkloadKind::default(),
            ramp: Duration::ZERO,
            doc_size: ByteSize::b(1000),
            filename: None,
        }
    }
}

impl RunConfig {
    /// Loads the configuration file referenced by `args`, if any, and applies the flags on top.
    pub fn load(args: Args) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => {
                let file = File::open(path).map_err(|source| ConfigError::Open {
                    path: path.clone(),
                    source,
                })?;
                serde_yaml::from_reader(file)?
            }
            None => RunConfig::default(),
        };

        config.apply(args);
        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, args: Args) {
        if let Some(nodes) = args.nodes {
            self.nodes = parse_nodes(&nodes);
        }
        if let Some(bucket) = args.bucket {
            self.bucket = bucket;
        }
        if let Some(password) = args.password {
            self.password = SecretString::from(password);
        }
        if let Some(num_threads) = args.num_threads {
            self.num_threads = num_threads;
        }
        if let Some(num_clients) = args.num_clients {
            self.num_clients = num_clients;
        }
        if let Some(num_docs) = args.num_docs {
            self.num_docs = num_docs;
        }
        if let Some(ratio) = args.ratio {
            self.ratio = ratio;
        }
        if let Some(sampling) = args.sampling {
            self.sampling = sampling;
        }
        if let Some(workload) = args.workload {
            self.workload = workload;
        }
        if let Some(ramp) = args.ramp {
            self.ramp = Duration::from_secs(ramp);
        }
        if let Some(doc_size) = args.doc_size {
            self.doc_size = ByteSize::b(doc_size);
        }
        if let Some(filename) = args.filename {
            self.filename = Some(filename);
        }
    }

    /// Checks that all values are within their supported ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nodes.is_empty() {
            return Err(ConfigError::Invalid("at least one node is required"));
        }
        if self.num_clients == 0 {
            return Err(ConfigError::Invalid("num-clients must be at least 1"));
        }
        if self.num_threads == 0 {
            return Err(ConfigError::Invalid("num-threads must be at least 1"));
        }
        if self.num_docs == 0 {
            return Err(ConfigError::Invalid("num-docs must be at least 1"));
        }
        if !(1..=100).contains(&self.sampling) {
            return Err(ConfigError::Invalid("sampling must be between 1 and 100"));
        }
        if self.filename.is_none() && self.doc_size.as_u64() == 0 {
            return Err(ConfigError::Invalid("doc-size must be at least 1 byte"));
        }
        Ok(())
    }

    /// Number of documents each client works on; the remainder is not assigned.
    pub fn docs_per_client(&self) -> u64 {
        self.num_docs / self.num_clients as u64
    }
}

/// Splits a comma separated node list, dropping empty entries.
fn parse_nodes(nodes: &str) -> Vec<String> {
    nodes
        .split(',')
        .map(str::trim)
        .filter(|node| !node.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use secrecy::ExposeSecret;

    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::from_args(&["kvstress"], args).expect("valid arguments")
    }

    #[test]
    fn defaults() {
        let config = RunConfig::load(parse(&[])).unwrap();

        assert_eq!(config.nodes, vec!["127.0.0.1"]);
        assert_eq!(config.bucket, "default");
        assert_eq!(config.password.expose_secret(), "");
        assert_eq!(config.num_threads, 1);
        assert_eq!(config.num_clients, 1);
        assert_eq!(config.num_docs, 1000);
        assert_eq!(config.ratio, 50);
        assert_eq!(config.sampling, 100);
        assert_eq!(config.workload, WorkloadKind::GetSet);
        assert_eq!(config.ramp, Duration::ZERO);
        assert_eq!(config.doc_size, ByteSize::b(1000));
        assert_eq!(config.filename, None);
    }

    #[test]
    fn short_options() {
        let args = parse(&[
            "-n", "1.2.3.4", "-b", "testBucket", "-p", "testPassword", "-t", "97", "-c", "55",
            "-d", "1234", "-R", "76", "-s", "99", "-w", "getscas", "-r", "13", "-S", "5678", "-f",
            "doc.json",
        ]);
        let config = RunConfig::load(args).unwrap();

        assert_eq!(config.nodes, vec!["1.2.3.4"]);
        assert_eq!(config.bucket, "testBucket");
        assert_eq!(config.password.expose_secret(), "testPassword");
        assert_eq!(config.num_threads, 97);
        assert_eq!(config.num_clients, 55);
        assert_eq!(config.num_docs, 1234);
        assert_eq!(config.ratio, 76);
        assert_eq!(config.sampling, 99);
        assert_eq!(config.workload, WorkloadKind::GetsCas);
        assert_eq!(config.ramp, Duration::from_secs(13));
        assert_eq!(config.doc_size, ByteSize::b(5678));
        assert_eq!(config.filename, Some(PathBuf::from("doc.json")));
    }

    #[test]
    fn long_options_and_node_list() {
        let args = parse(&[
            "--nodes",
            "cache-1, cache-2:11311,,",
            "--num-threads",
            "4",
            "--workload",
            "getset",
        ]);
        let config = RunConfig::load(args).unwrap();

        assert_eq!(config.nodes, vec!["cache-1", "cache-2:11311"]);
        assert_eq!(config.num_threads, 4);
    }

    #[test]
    fn unknown_workload_is_rejected() {
        assert!(Args::from_args(&["kvstress"], &["-w", "scan"]).is_err());
    }

    #[test]
    fn out_of_range_values() {
        for args in [
            &["-s", "0"][..],
            &["-s", "101"],
            &["-t", "0"],
            &["-c", "0"],
            &["-d", "0"],
            &["-S", "0"],
            &["-n", ","],
        ] {
            let err = RunConfig::load(parse(args)).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{args:?}: {err}");
        }

        // a zero doc size is fine when the payload comes from a file
        let config = RunConfig::load(parse(&["-S", "0", "-f", "doc.json"])).unwrap();
        assert_eq!(config.doc_size, ByteSize::b(0));
    }

    #[test]
    fn yaml_file_with_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
nodes: ["cache-1", "cache-2"]
password: secret
num_clients: 3
num_docs: 300
ratio: 2
workload: getscas
ramp: 1m 30s
doc_size: 4KiB
"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap();
        let config = RunConfig::load(parse(&["-C", path, "-R", "7"])).unwrap();

        assert_eq!(config.nodes, vec!["cache-1", "cache-2"]);
        assert_eq!(config.password.expose_secret(), "secret");
        assert_eq!(config.num_clients, 3);
        assert_eq!(config.num_docs, 300);
        assert_eq!(config.ratio, 7);
        assert_eq!(config.workload, WorkloadKind::GetsCas);
        assert_eq!(config.ramp, Duration::from_secs(90));
        assert_eq!(config.doc_size, ByteSize::kib(4));
        // untouched fields keep their defaults
        assert_eq!(config.num_threads, 1);
        assert_eq!(config.sampling, 100);
    }

    #[test]
    fn yaml_rejects_unknown_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "num_docz: 10").unwrap();

        let path = file.path().to_str().unwrap();
        let err = RunConfig::load(parse(&["-C", path])).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "{err}");
    }

    #[test]
    fn missing_config_file() {
        let err = RunConfig::load(parse(&["-C", "/does/not/exist.yaml"])).unwrap_err();
        assert!(matches!(err, ConfigError::Open { .. }), "{err}");
    }

    #[test]
    fn password_is_redacted() {
        let config = RunConfig::load(parse(&["-p", "hunter2"])).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"), "{debug}");
        assert!(debug.contains("REDACTED"), "{debug}");
    }

    #[test]
    fn docs_per_client_drops_remainder() {
        let config = RunConfig {
            num_docs: 1003,
            num_clients: 4,
            ..Default::default()
        };
        assert_eq!(config.docs_per_client(), 250);
    }
}
