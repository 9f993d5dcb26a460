use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::join_all;
use reqwest::{StatusCode, Url};
use serde_json::json;
use tracing::{error, info, warn};

use crate::config::{ApiFlavor, ClientConfig};
use crate::error::PollerError;
use crate::models::{AcceptedResponse, StatusResponse, parse_elapsed};

/// What a single polling request observed.
#[derive(Debug)]
pub enum Observation {
  Pending(StatusResponse),
  Done(StatusResponse),
  /// The server answered with a non-success status: the job is gone.
  Gone(u16),
}

#[derive(Debug, Clone, Default)]
pub struct PollerReport {
  pub poller: usize,
  pub polls: u64,
  pub last_duration: Option<Duration>,
  pub saw_done: bool,
  /// Times a poll returned a shorter duration than an earlier one.
  pub regressions: u64,
  pub error: Option<String>,
}

#[derive(Clone)]
pub struct ClientPoller {
  http: reqwest::Client,
  base: Url,
  flavor: ApiFlavor,
  interval: Duration,
}

impl ClientPoller {
  pub fn new(base_url: &str, flavor: ApiFlavor) -> Result<Self, PollerError> {
    let normalized = if base_url.ends_with('/') { base_url.to_string() } else { format!("{}/", base_url) };
    let base = Url::parse(&normalized).map_err(|_| PollerError::InvalidUrl(base_url.to_string()))?;
    let http = reqwest::Client::builder()
      .redirect(reqwest::redirect::Policy::none())
      .build()?;
    Ok(Self { http, base, flavor, interval: Duration::ZERO })
  }

  /// Pause between consecutive polls of one loop.
  pub fn with_interval(mut self, interval: Duration) -> Self {
    self.interval = interval;
    self
  }

  fn url(&self, path: &str) -> Result<Url, PollerError> {
    self.base.join(path).map_err(|_| PollerError::InvalidUrl(path.to_string()))
  }

  pub async fn submit(&self, data: &str) -> Result<AcceptedResponse, PollerError> {
    let request = match self.flavor {
      ApiFlavor::Rest => self.http.post(self.url("job")?).json(&json!({ "Data": data })),
      ApiFlavor::Simple => self.http.get(self.url("longtask")?),
    };
    let response = request.header("Accept", "*/*").send().await?;
    if response.status() != StatusCode::ACCEPTED {
      return Err(unexpected(response).await);
    }
    Ok(response.json().await?)
  }

  pub async fn observe(&self, id: &str) -> Result<Observation, PollerError> {
    match self.flavor {
      ApiFlavor::Rest => {
        let response = self.http.get(self.url(&format!("job/{}", id))?).send().await?;
        match response.status() {
          StatusCode::OK => Ok(Observation::Pending(response.json().await?)),
          StatusCode::SEE_OTHER => {
            let output = self.http.get(self.url(&format!("job/{}/output", id))?).send().await?;
            if output.status() != StatusCode::OK {
              return Ok(Observation::Gone(output.status().as_u16()));
            }
            Ok(Observation::Done(output.json().await?))
          }
          other => Ok(Observation::Gone(other.as_u16())),
        }
      }
      ApiFlavor::Simple => {
        let mut url = self.url("taskstatus")?;
        url.query_pairs_mut().append_pair("task", id);
        let response = self.http.get(url).send().await?;
        if response.status() != StatusCode::OK {
          return Ok(Observation::Gone(response.status().as_u16()));
        }
        let status: StatusResponse = response.json().await?;
        if status.task_data.is_done() {
          Ok(Observation::Done(status))
        } else {
          Ok(Observation::Pending(status))
        }
      }
    }
  }

  /// Polls `id` until the server stops answering with success. On the REST
  /// flavour the loop also ends once it has fetched the final output.
  pub async fn poll_loop(&self, id: &str, poller: usize) -> PollerReport {
    let mut report = PollerReport { poller, ..Default::default() };
    loop {
      let observation = match self.observe(id).await {
        Ok(observation) => observation,
        Err(e) => {
          error!("poller {}: {}", poller, e);
          report.error = Some(e.to_string());
          return report;
        }
      };
      report.polls += 1;

      let status = match observation {
        Observation::Gone(code) => {
          info!("poller {}: task {} gone (status {})", poller, id, code);
          return report;
        }
        Observation::Pending(status) => status,
        Observation::Done(status) => {
          report.saw_done = true;
          status
        }
      };

      info!(
        "poller {}: server {} task {} status {:?} duration {} original server {}",
        poller, status.server_id, status.id, status.task_data.status, status.task_data.duration,
        status.task_data.original_server
      );
      if let Some(duration) = parse_elapsed(&status.task_data.duration) {
        if report.last_duration.is_some_and(|last| duration < last) {
          warn!("poller {}: duration went backwards to {:?}", poller, duration);
          report.regressions += 1;
        }
        report.last_duration = Some(report.last_duration.map_or(duration, |last| last.max(duration)));
      }

      if report.saw_done && self.flavor == ApiFlavor::Rest {
        return report;
      }
      if !self.interval.is_zero() {
        tokio::time::sleep(self.interval).await;
      }
    }
  }

  /// Runs `count` independent polling loops against `id` and waits for all.
  pub async fn fan_out(&self, id: &str, count: usize) -> Vec<PollerReport> {
    let finished = Arc::new(AtomicUsize::new(0));
    let handles = (1..=count).map(|poller| {
      let client = self.clone();
      let id = id.to_string();
      let finished = finished.clone();
      tokio::spawn(async move {
        let report = client.poll_loop(&id, poller).await;
        let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
        info!("poller {} finished after {} polls ({}/{})", poller, report.polls, done, count);
        report
      })
    });

    join_all(handles)
      .await
      .into_iter()
      .enumerate()
      .map(|(i, joined)| {
        joined.unwrap_or_else(|e| PollerReport {
          poller: i + 1,
          error: Some(format!("poller task failed: {}", e)),
          ..Default::default()
        })
      })
      .collect()
  }

  pub async fn delete_output(&self, id: &str) -> Result<(), PollerError> {
    let response = self.http.delete(self.url(&format!("job/{}/output", id))?).send().await?;
    if !response.status().is_success() {
      return Err(unexpected(response).await);
    }
    Ok(())
  }

  /// Submits one job, fans out the pollers, and cleans up a finished REST
  /// job once every loop is done.
  pub async fn run(&self, payload: &str, requests: usize) -> Result<Vec<PollerReport>, PollerError> {
    let accepted = self.submit(payload).await?;
    info!("Submitted task {} to server {}", accepted.task.id, accepted.server_id);

    let reports = self.fan_out(&accepted.task.id, requests).await;
    if self.flavor == ApiFlavor::Rest && reports.iter().any(|r| r.saw_done) {
      match self.delete_output(&accepted.task.id).await {
        Ok(()) => info!("Deleted completed task {}", accepted.task.id),
        Err(e) => warn!("Cleanup of task {} failed: {}", accepted.task.id, e),
      }
    }
    Ok(reports)
  }
}

impl TryFrom<&ClientConfig> for ClientPoller {
  type Error = PollerError;

  fn try_from(config: &ClientConfig) -> Result<Self, Self::Error> {
    Ok(ClientPoller::new(&config.target_url, config.flavor)?.with_interval(config.poll_interval))
  }
}

async fn unexpected(response: reqwest::Response) -> PollerError {
  let status = response.status().as_u16();
  let body = response.text().await.unwrap_or_default();
  PollerError::UnexpectedStatus { status, body }
}
