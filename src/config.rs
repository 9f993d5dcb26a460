use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("invalid value for {name}: {value:?}")]
  Invalid { name: &'static str, value: String },

  #[error("{0} must be greater than zero")]
  Zero(&'static str),
}

#[derive(Debug, Clone)]
pub struct Config {
  pub server_port: u16,
  pub project_id: String,
  pub worker_sleep_secs: u64,
  pub work_time_mins: u64,
  pub request_sleep_secs: u64,
  pub database_url: Option<String>,
  pub rabbitmq_url: Option<String>,
}

impl Config {
  pub fn from_env() -> Result<Self, ConfigError> {
    let config = Self {
      server_port: parse_var("PORT", 8080)?,
      project_id: env::var("PROJECT_ID").unwrap_or_else(|_| "ljs".into()),
      worker_sleep_secs: parse_var("SLEEP_TIME", 5)?,
      work_time_mins: parse_var("WORK_TIME", 1)?,
      request_sleep_secs: parse_var("REQUEST_TIME", 5)?,
      database_url: non_empty_var("DATABASE_URL"),
      rabbitmq_url: non_empty_var("RABBITMQ_URL"),
    };
    config.validate()
  }

  pub fn validate(self) -> Result<Self, ConfigError> {
    if self.worker_sleep_secs == 0 {
      return Err(ConfigError::Zero("SLEEP_TIME"));
    }
    if self.work_time_mins.checked_mul(60).is_none() {
      return Err(ConfigError::Invalid { name: "WORK_TIME", value: self.work_time_mins.to_string() });
    }
    Ok(self)
  }

  pub fn job_settings(&self) -> JobSettings {
    JobSettings {
      tick_interval: Duration::from_secs(self.worker_sleep_secs),
      work_duration: Duration::from_secs(self.work_time_mins.saturating_mul(60)),
      poll_delay: Duration::from_secs(self.request_sleep_secs),
    }
  }
}

/// Timing knobs shared by the manager and every worker it spawns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSettings {
  pub tick_interval: Duration,
  pub work_duration: Duration,
  pub poll_delay: Duration,
}

impl JobSettings {
  /// Number of ticks a worker runs before writing the terminal record:
  /// `ceil(work_duration / tick_interval)`, never less than one.
  pub fn total_ticks(&self) -> u64 {
    let tick = self.tick_interval.as_nanos().max(1);
    let work = self.work_duration.as_nanos();
    let ticks = work.div_ceil(tick);
    u64::try_from(ticks).unwrap_or(u64::MAX).max(1)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFlavor {
  /// `POST /job`, `GET /job/{id}`, `GET /job/{id}/output`
  Rest,
  /// `GET /longtask`, `GET /taskstatus?task={id}`
  Simple,
}

impl FromStr for ApiFlavor {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "rest" => Ok(ApiFlavor::Rest),
      "simple" => Ok(ApiFlavor::Simple),
      _ => Err(ConfigError::Invalid { name: "API_FLAVOR", value: s.to_string() }),
    }
  }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
  pub target_url: String,
  pub requests: usize,
  pub flavor: ApiFlavor,
  pub payload: String,
  pub poll_interval: Duration,
}

impl ClientConfig {
  pub fn from_env() -> Result<Self, ConfigError> {
    let flavor = match env::var("API_FLAVOR") {
      Ok(value) => value.parse()?,
      Err(_) => ApiFlavor::Rest,
    };
    let config = Self {
      target_url: env::var("TARGET_URL").unwrap_or_else(|_| "http://localhost:8080/".into()),
      requests: parse_var("REQUESTS", 5)?,
      flavor,
      payload: env::var("PAYLOAD").unwrap_or_else(|_| "work".into()),
      poll_interval: Duration::from_millis(parse_var("POLL_INTERVAL_MS", 0)?),
    };
    if config.requests == 0 {
      return Err(ConfigError::Zero("REQUESTS"));
    }
    Ok(config)
  }
}

fn non_empty_var(name: &str) -> Option<String> {
  env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
  match env::var(name) {
    Ok(value) => value
      .trim()
      .parse()
      .map_err(|_| ConfigError::Invalid { name, value }),
    Err(_) => Ok(default),
  }
}
