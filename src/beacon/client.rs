//! A wrapper around `reqwest::Client` which provides convenience methods for the
//! subset of the Beacon Node HTTP API the monitor consumes.
//!
//! Every outbound request first acquires a token from a global rate limiter. GET
//! requests retry on transport errors and retryable statuses (429/503) with
//! exponential backoff; POST requests are issued exactly once.

use crate::backoff::{self, Backoff};
use crate::beacon::types::*;
use crate::beacon::Error;
use crate::config::Config;
use crate::types::Epoch;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use slog::{warn, Logger};
use std::num::NonZeroU32;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct BeaconNodeHttpClient {
    client: reqwest::Client,
    server: Url,
    limiter: DefaultDirectRateLimiter,
    max_retries: u32,
    backoff_config: backoff::Config,
    shutdown: CancellationToken,
    log: Logger,
}

impl BeaconNodeHttpClient {
    pub fn new(config: &Config, shutdown: CancellationToken, log: Logger) -> Result<Self, Error> {
        let server = Url::parse(&config.beacon_node_url)
            .map_err(|_| Error::InvalidUrl(config.beacon_node_url.clone()))?;

        let client = reqwest::Client::builder()
            .timeout(config.http.timeout())
            .pool_max_idle_per_host(config.http.max_idle_conns)
            .build()?;

        let period = Duration::from_secs_f64(1.0 / config.rate_limit.requests_per_second);
        let burst = NonZeroU32::new(config.rate_limit.burst)
            .ok_or_else(|| Error::InvalidConfig("rate_limit.burst must be positive".into()))?;
        let quota = Quota::with_period(period)
            .ok_or_else(|| {
                Error::InvalidConfig("rate_limit.requests_per_second is too high".into())
            })?
            .allow_burst(burst);

        Ok(Self {
            client,
            server,
            limiter: RateLimiter::direct(quota),
            max_retries: config.store.max_retries,
            backoff_config: backoff::Config::default(),
            shutdown,
            log,
        })
    }

    /// `GET /eth/v1/beacon/genesis`
    pub async fn get_beacon_genesis(&self) -> Result<GenesisData, Error> {
        let mut path = self.server.clone();
        path.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(self.server.to_string()))?
            .push("eth")
            .push("v1")
            .push("beacon")
            .push("genesis");

        self.get::<GenericResponse<GenesisData>>(path)
            .await
            .map(|resp| resp.data)
    }

    /// `GET /eth/v1/node/syncing`
    pub async fn get_node_syncing(&self) -> Result<SyncingData, Error> {
        let mut path = self.server.clone();
        path.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(self.server.to_string()))?
            .push("eth")
            .push("v1")
            .push("node")
            .push("syncing");

        self.get::<GenericResponse<SyncingData>>(path)
            .await
            .map(|resp| resp.data)
    }

    /// Returns `true` if the beacon node reports itself fully synced.
    pub async fn is_node_synced(&self) -> Result<bool, Error> {
        Ok(!self.get_node_syncing().await?.is_syncing)
    }

    /// `GET /eth/v1/beacon/states/{state_id}/validators/{validator_id}`
    pub async fn get_beacon_states_validator_id(
        &self,
        state_id: StateId,
        validator_index: u64,
    ) -> Result<ValidatorData, Error> {
        let mut path = self.server.clone();
        path.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(self.server.to_string()))?
            .push("eth")
            .push("v1")
            .push("beacon")
            .push("states")
            .push(&state_id.to_string())
            .push("validators")
            .push(&validator_index.to_string());

        self.get::<ExecutionOptimisticFinalizedResponse<ValidatorData>>(path)
            .await
            .map(|resp| resp.data)
    }

    /// `GET /eth/v1/beacon/states/{state_id}/finality_checkpoints`
    pub async fn get_beacon_states_finality_checkpoints(
        &self,
        state_id: StateId,
    ) -> Result<FinalityCheckpointsData, Error> {
        let mut path = self.server.clone();
        path.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(self.server.to_string()))?
            .push("eth")
            .push("v1")
            .push("beacon")
            .push("states")
            .push(&state_id.to_string())
            .push("finality_checkpoints");

        self.get::<GenericResponse<FinalityCheckpointsData>>(path)
            .await
            .map(|resp| resp.data)
    }

    /// `POST /eth/v1/validator/duties/attester/{epoch}`
    pub async fn post_validator_duties_attester(
        &self,
        epoch: Epoch,
        validator_indices: &[u64],
    ) -> Result<DutiesResponse<Vec<AttesterData>>, Error> {
        let mut path = self.server.clone();
        path.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(self.server.to_string()))?
            .push("eth")
            .push("v1")
            .push("validator")
            .push("duties")
            .push("attester")
            .push(&epoch.to_string());

        let body: Vec<String> = validator_indices.iter().map(u64::to_string).collect();
        self.post_json(path, &body).await
    }

    /// `POST /eth/v1/beacon/rewards/attestations/{epoch}`
    ///
    /// The epoch must already be finalized for rewards to be available.
    pub async fn post_beacon_rewards_attestations(
        &self,
        epoch: Epoch,
        validator_indices: &[u64],
    ) -> Result<StandardAttestationRewards, Error> {
        let mut path = self.server.clone();
        path.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(self.server.to_string()))?
            .push("eth")
            .push("v1")
            .push("beacon")
            .push("rewards")
            .push("attestations")
            .push(&epoch.to_string());

        let body: Vec<String> = validator_indices.iter().map(u64::to_string).collect();
        self.post_json::<_, ExecutionOptimisticFinalizedResponse<StandardAttestationRewards>>(
            path, &body,
        )
        .await
        .map(|resp| resp.data)
    }

    /// Blocks until the rate limiter grants a token, or the root deadline is cancelled.
    async fn acquire_token(&self) -> Result<(), Error> {
        tokio::select! {
            _ = self.shutdown.cancelled() => Err(Error::Shutdown),
            _ = self.limiter.until_ready() => Ok(()),
        }
    }

    /// Performs a HTTP GET request with rate limiting, retries and backoff.
    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        let mut backoff = Backoff::new(self.backoff_config.clone());
        let mut attempt: u32 = 0;

        loop {
            self.acquire_token().await?;

            let response = tokio::select! {
                _ = self.shutdown.cancelled() => return Err(Error::Shutdown),
                response = self.client.get(url.clone()).send() => response,
            };

            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    if attempt < self.max_retries {
                        warn!(
                            self.log,
                            "Beacon node request failed, retrying";
                            "url" => %url,
                            "attempt" => attempt + 1,
                            "error" => %e,
                        );
                        attempt += 1;
                        if !backoff.wait(&self.shutdown).await {
                            return Err(Error::Shutdown);
                        }
                        continue;
                    }
                    return Err(Error::Reqwest(e));
                }
            };

            let status = response.status();
            if status == StatusCode::OK {
                return tokio::select! {
                    _ = self.shutdown.cancelled() => Err(Error::Shutdown),
                    body = response.json() => body.map_err(Error::Reqwest),
                };
            }

            let body = tokio::select! {
                _ = self.shutdown.cancelled() => return Err(Error::Shutdown),
                body = response.text() => body.unwrap_or_default(),
            };

            if backoff::should_retry(status.as_u16()) {
                if attempt < self.max_retries {
                    warn!(
                        self.log,
                        "Retryable beacon node error, backing off";
                        "status" => status.as_u16(),
                        "url" => %url,
                        "attempt" => attempt + 1,
                    );
                    attempt += 1;
                    if !backoff.wait(&self.shutdown).await {
                        return Err(Error::Shutdown);
                    }
                    continue;
                }
                return Err(Error::RetriesExhausted {
                    attempts: attempt + 1,
                    status: status.as_u16(),
                    body,
                });
            }

            return Err(Error::ServerMessage {
                status: status.as_u16(),
                body,
            });
        }
    }

    /// Performs a HTTP POST request with a JSON body.
    ///
    /// POSTs are issued exactly once; retrying a request with a body is left to
    /// the caller's next tick.
    async fn post_json<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        url: Url,
        body: &T,
    ) -> Result<R, Error> {
        self.acquire_token().await?;

        let response = tokio::select! {
            _ = self.shutdown.cancelled() => return Err(Error::Shutdown),
            response = self.client.post(url).json(body).send() => response?,
        };

        let status = response.status();
        if status == StatusCode::OK {
            return tokio::select! {
                _ = self.shutdown.cancelled() => Err(Error::Shutdown),
                body = response.json() => body.map_err(Error::Reqwest),
            };
        }

        let body = tokio::select! {
            _ = self.shutdown.cancelled() => return Err(Error::Shutdown),
            body = response.text() => body.unwrap_or_default(),
        };

        Err(Error::ServerMessage {
            status: status.as_u16(),
            body,
        })
    }
}
