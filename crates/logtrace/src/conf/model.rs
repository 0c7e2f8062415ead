//! Model — TraceConfig and related structs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::correlate::{StoreLimits, StreamRole};
use crate::parser::Grammar;
use crate::source::buffer::DEFAULT_CAPACITY;
use crate::source::tailer::{DEFAULT_ROTATION_CHECK, DEFAULT_SEEK_THRESHOLD};

pub const DEFAULT_LOG_DIR: &str = "/opt/mailmarshal/logging";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Picks the correlator's store limits when they are not set explicitly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    #[default]
    Production,
    Debug,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Production => "production",
            Profile::Debug => "debug",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Some(Profile::Production),
            "debug" => Some(Profile::Debug),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Product logging directory; relative source dirs resolve against it
    pub log_dir: PathBuf,
    pub poll_interval_ms: u64,
    pub profile: Profile,
    pub sources: Vec<SourceConfig>,
    pub correlator: CorrelatorConfig,
}

/// One tailed log lineage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Display name, unique across sources
    pub name: String,
    /// Directory to scan; `None` means `log_dir`
    pub dir: Option<PathBuf>,
    /// Case-insensitive file name prefix
    pub prefix: String,
    pub grammar: Grammar,
    pub capacity: usize,
    pub rotation_check_secs: u64,
    pub seek_threshold_bytes: u64,
    /// Feed this source to the correlator in the given role
    pub role: Option<StreamRole>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelatorConfig {
    pub threshold: Option<usize>,
    pub evict_batch: Option<usize>,
    pub history_per_role: Option<usize>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            profile: Profile::default(),
            sources: default_sources(),
            correlator: CorrelatorConfig::default(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            dir: None,
            prefix: String::new(),
            grammar: Grammar::Plain,
            capacity: DEFAULT_CAPACITY,
            rotation_check_secs: DEFAULT_ROTATION_CHECK.as_secs(),
            seek_threshold_bytes: DEFAULT_SEEK_THRESHOLD,
            role: None,
        }
    }
}

impl SourceConfig {
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    pub fn with_role(mut self, role: StreamRole) -> Self {
        self.role = Some(role);
        self
    }

    /// Directory this source scans, given the global logging directory
    pub fn resolve_dir(&self, log_dir: &Path) -> PathBuf {
        match &self.dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => log_dir.join(dir),
            None => log_dir.to_path_buf(),
        }
    }
}

impl CorrelatorConfig {
    /// Explicit values win; the rest come from the profile
    pub fn limits(&self, profile: Profile) -> StoreLimits {
        let base = match profile {
            Profile::Production => StoreLimits::PRODUCTION,
            Profile::Debug => StoreLimits::DEBUG,
        };
        StoreLimits {
            threshold: self.threshold.unwrap_or(base.threshold),
            evict_batch: self.evict_batch.unwrap_or(base.evict_batch),
            history_per_role: self.history_per_role.unwrap_or(base.history_per_role),
        }
    }
}

impl TraceConfig {
    pub fn correlator_limits(&self) -> StoreLimits {
        self.correlator.limits(self.profile)
    }

    /// Sources carrying a correlation role, with that role
    pub fn role_sources(&self) -> impl Iterator<Item = (StreamRole, &SourceConfig)> {
        self.sources.iter().filter_map(|s| s.role.map(|r| (r, s)))
    }
}

/// The product's standard set of logs
pub fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig::new("AM", "MMArrayManager"),
        SourceConfig::new("Controller", "MMController"),
        SourceConfig::new("Receiver", "MMReceiver").with_role(StreamRole::Ingress),
        SourceConfig::new("Engine", "MMEngine").with_role(StreamRole::Process),
        SourceConfig::new("Sender", "MMSender").with_role(StreamRole::Egress),
        SourceConfig::new("Pop3", "MMPop3"),
        SourceConfig {
            dir: Some(PathBuf::from("../Config Service/logging")),
            grammar: Grammar::Service,
            ..SourceConfig::new("Cfg Service", "segcfgapi")
        },
    ]
}
