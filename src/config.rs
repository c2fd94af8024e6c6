use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub sled_path: String,
    pub cors_origin: String,
    /// JSON file of ranked words imported into the store at startup
    pub lexicon_seed_path: Option<String>,
    pub retention: RetentionConfig,
    pub worker: WorkerConfig,
    pub survey: SurveyEnvConfig,
}

#[derive(Debug, Clone)]
pub struct RetentionConfig {
    pub session_ttl_secs: u64,
    pub report_ttl_days: u64,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub is_leader: bool,
}

#[derive(Debug, Clone)]
pub struct SurveyEnvConfig {
    pub max_rank: u32,
    pub target_questions: u32,
    pub max_questions: u32,
    pub similarity_threshold: f64,
}

impl Config {
    pub fn from_env() -> Self {
        let seed = env_or("LEXICON_SEED_PATH", "");
        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 3000_u16),
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            sled_path: env_or("SLED_PATH", "./data/survey.sled"),
            cors_origin: env_or("CORS_ORIGIN", "http://localhost:5173"),
            lexicon_seed_path: (!seed.trim().is_empty()).then_some(seed),
            retention: RetentionConfig {
                session_ttl_secs: env_or_parse("SESSION_TTL_SECS", 3600_u64),
                report_ttl_days: env_or_parse("REPORT_TTL_DAYS", 90_u64),
            },
            worker: WorkerConfig {
                is_leader: env_or_bool("WORKER_LEADER", true),
            },
            survey: SurveyEnvConfig {
                max_rank: env_or_parse("SURVEY_MAX_RANK", 8000_u32),
                target_questions: env_or_parse("SURVEY_TARGET_QUESTIONS", 15_u32),
                max_questions: env_or_parse("SURVEY_MAX_QUESTIONS", 20_u32),
                similarity_threshold: env_or_parse("SURVEY_SIMILARITY_THRESHOLD", 0.6_f64),
            },
        }
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.retention.session_ttl_secs.min(i64::MAX as u64) as i64)
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
