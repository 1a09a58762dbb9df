//! Five-stage flow verification pipeline

use super::matcher::{find_capture, MatcherConfig};
use super::request::{topic_matches, FlowRequest};
use super::status::{FlowStatus, FlowStep, StepState};
use crate::chain::{block_timestamp, receipt_succeeded, ChainRegistry, ExplorerClient};
use crate::config::ChainConfig;
use crate::error::{TracerError, TracerResult};
use crate::reactive::{CallbackTransaction, ReactiveRpc, RvmTransaction};

use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// The one origin chain allowed to lack a callback proxy (reactive Kopli testnet).
/// Destinations never get this exemption.
pub const CALLBACK_EXEMPT_ORIGIN_CHAIN_ID: u64 = 5_318_008;

/// Stage 3 payload: the RVM id and the RVM transaction that captured the origin tx
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RscCapture {
    pub rvm_id: String,
    pub transaction: RvmTransaction,
}

/// Verifies one flow request. Built per request and dropped after `track_flow`.
pub struct FlowController {
    run_id: Uuid,
    request: FlowRequest,
    origin: ChainConfig,
    destination: ChainConfig,
    explorer: Arc<dyn ExplorerClient>,
    reactive: Arc<dyn ReactiveRpc>,
    matcher: MatcherConfig,
    /// Checked between stages
    shutdown: Option<Arc<RwLock<bool>>>,
}

impl FlowController {
    /// Resolve both chains and check they can take part in a callback flow.
    /// Performs no I/O.
    pub fn new(
        request: FlowRequest,
        registry: &ChainRegistry,
        explorer: Arc<dyn ExplorerClient>,
        reactive: Arc<dyn ReactiveRpc>,
    ) -> TracerResult<Self> {
        let (origin, destination) = Self::resolve_chains(&request, registry).map_err(|e| {
            crate::metrics::record_flow_rejected(e.kind());
            e
        })?;

        Ok(Self {
            run_id: Uuid::new_v4(),
            request,
            origin,
            destination,
            explorer,
            reactive,
            matcher: MatcherConfig::default(),
            shutdown: None,
        })
    }

    fn resolve_chains(
        request: &FlowRequest,
        registry: &ChainRegistry,
    ) -> TracerResult<(ChainConfig, ChainConfig)> {
        request.validate()?;

        let origin = registry
            .get(request.origin_chain_id)
            .ok_or(TracerError::UnsupportedChain {
                chain_id: request.origin_chain_id,
            })?;
        let destination = registry
            .get(request.destination_chain_id)
            .ok_or(TracerError::UnsupportedChain {
                chain_id: request.destination_chain_id,
            })?;

        if !origin.supports_callbacks() && origin.chain_id != CALLBACK_EXEMPT_ORIGIN_CHAIN_ID {
            return Err(TracerError::OriginCallbackUnsupported {
                chain_id: origin.chain_id,
            });
        }
        if !destination.supports_callbacks() {
            return Err(TracerError::DestinationCallbackUnsupported {
                chain_id: destination.chain_id,
            });
        }

        Ok((origin.clone(), destination.clone()))
    }

    /// Override the capture search window and batch size
    pub fn with_matcher_config(mut self, matcher: MatcherConfig) -> Self {
        self.matcher = matcher;
        self
    }

    /// Stop between stages once the flag is set
    pub fn with_shutdown(mut self, shutdown: Arc<RwLock<bool>>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn request(&self) -> &FlowRequest {
        &self.request
    }

    /// Run all five stages in order.
    ///
    /// Never fails: the first failing stage is recorded as `error`, later
    /// stages stay `pending`, and the accumulated status is returned.
    pub async fn track_flow(&self) -> FlowStatus {
        let span = info_span!(
            "flow",
            run_id = %self.run_id,
            origin_chain = self.origin.chain_id,
            destination_chain = self.destination.chain_id,
            origin_tx = %self.request.origin_tx_hash,
        );

        async {
            crate::metrics::record_flow_started(self.origin.chain_id, self.destination.chain_id);
            info!("Tracking flow from {} to {}", self.origin.name, self.destination.name);

            let mut status = FlowStatus::new();
            match self.run_stages(&mut status).await {
                Ok(()) => info!("Flow verified end to end"),
                Err(TracerError::Cancelled { step }) => info!("Flow cancelled before {}", step),
                Err(e) => warn!("Flow halted: {}", e),
            }
            status
        }
        .instrument(span)
        .await
    }

    async fn run_stages(&self, status: &mut FlowStatus) -> TracerResult<()> {
        let receipt = self
            .stage(status, FlowStep::OriginTransaction, self.verify_origin_transaction())
            .await?;

        let event_log = self
            .stage(status, FlowStep::EventEmission, self.verify_event_emission())
            .await?;

        let origin_timestamp = block_timestamp(&receipt).or_else(|| block_timestamp(&event_log));
        let capture = self
            .stage(status, FlowStep::RscCapture, self.track_rsc_capture(origin_timestamp))
            .await?;

        let callback = self
            .stage(status, FlowStep::CallbackTransaction, self.verify_callback(&capture))
            .await?;

        self.stage(status, FlowStep::DestinationExecution, self.verify_destination(&callback))
            .await?;

        Ok(())
    }

    /// Run one stage and record its outcome into `status`
    async fn stage<T, Fut>(&self, status: &mut FlowStatus, step: FlowStep, work: Fut) -> TracerResult<T>
    where
        T: Serialize,
        Fut: Future<Output = TracerResult<T>>,
    {
        self.check_shutdown(step).await?;

        let started = Instant::now();
        let result = work.await.and_then(|value| {
            serde_json::to_value(&value)
                .map(|data| (value, data))
                .map_err(|e| TracerError::Internal(format!("Cannot encode {} result: {}", step, e)))
        });
        crate::metrics::record_step_latency(step, started.elapsed().as_secs_f64());

        match result {
            Ok((value, data)) => {
                status.mark_success(step, data)?;
                crate::metrics::record_step(step, StepState::Success);
                debug!(%step, "Step verified");
                Ok(value)
            }
            Err(e) => {
                status.mark_error(step, e.to_string())?;
                crate::metrics::record_step(step, StepState::Error);
                warn!(
                    %step,
                    kind = e.kind(),
                    transport = e.is_transport_error(),
                    "Step failed: {}",
                    e
                );
                Err(e)
            }
        }
    }

    async fn check_shutdown(&self, step: FlowStep) -> TracerResult<()> {
        if let Some(shutdown) = &self.shutdown {
            if *shutdown.read().await {
                return Err(TracerError::Cancelled {
                    step: step.name().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Stage 1: origin receipt exists and succeeded
    async fn verify_origin_transaction(&self) -> TracerResult<Value> {
        let receipt = self
            .explorer
            .fetch_transaction_receipt(&self.origin, &self.request.origin_tx_hash)
            .await?;

        match receipt {
            Some(receipt) if receipt_succeeded(&receipt) => Ok(receipt),
            _ => Err(TracerError::OriginTxNotFound {
                chain_id: self.origin.chain_id,
                tx_hash: self.request.origin_tx_hash.clone(),
            }),
        }
    }

    /// Stage 2: some log's topic0 is the target event signature
    async fn verify_event_emission(&self) -> TracerResult<Value> {
        let logs = self
            .explorer
            .fetch_transaction_logs(&self.origin, &self.request.origin_tx_hash)
            .await?;
        debug!(count = logs.len(), "Fetched origin transaction logs");

        logs.into_iter()
            .find(|log| {
                log.get("topics")
                    .and_then(Value::as_array)
                    .and_then(|topics| topics.first())
                    .and_then(Value::as_str)
                    .is_some_and(|topic0| topic_matches(topic0, &self.request.event_signature))
            })
            .ok_or_else(|| TracerError::EventNotFound {
                tx_hash: self.request.origin_tx_hash.clone(),
                signature: self.request.event_signature.clone(),
            })
    }

    /// Stage 3: locate the RVM transaction that references the origin hash
    async fn track_rsc_capture(&self, origin_timestamp: Option<i64>) -> TracerResult<RscCapture> {
        let rvm_id = self
            .reactive
            .get_rvm_id(&self.request.reactive_contract)
            .await?;
        debug!(%rvm_id, "Resolved RVM id");

        let origin_timestamp = origin_timestamp.ok_or_else(|| {
            TracerError::MalformedResponse(
                "origin receipt and event log carry no block timestamp".to_string(),
            )
        })?;

        let reactive: &dyn ReactiveRpc = self.reactive.as_ref();
        let rvm: &str = &rvm_id;
        let search = find_capture(
            &self.request.origin_tx_hash,
            origin_timestamp,
            self.matcher,
            move |pivot, batch_size| reactive.get_transactions(rvm, pivot, batch_size),
        )
        .await?;
        crate::metrics::record_capture_probes(search.probes);

        match search.found {
            Some(transaction) => {
                info!(rvm_tx = %transaction.hash, probes = search.probes, "Reactive capture found");
                Ok(RscCapture {
                    rvm_id,
                    transaction,
                })
            }
            None => Err(TracerError::CaptureNotFound {
                tx_hash: self.request.origin_tx_hash.clone(),
                timestamp: origin_timestamp,
                window_secs: self.matcher.window_secs,
            }),
        }
    }

    /// Stage 4: the captured RVM transaction produced a callback
    async fn verify_callback(&self, capture: &RscCapture) -> TracerResult<CallbackTransaction> {
        let callbacks = self
            .reactive
            .get_callback_transactions(&capture.rvm_id, &capture.transaction.hash)
            .await?;

        if callbacks.len() > 1 {
            debug!(count = callbacks.len(), "Multiple callback records, taking the first");
        }

        callbacks
            .into_iter()
            .next()
            .ok_or_else(|| TracerError::NoCallbackFound {
                rsc_tx_hash: capture.transaction.hash.clone(),
            })
    }

    /// Stage 5: the callback executed successfully on the destination chain
    async fn verify_destination(&self, callback: &CallbackTransaction) -> TracerResult<Value> {
        let receipt = self
            .explorer
            .fetch_transaction_receipt(&self.destination, &callback.hash)
            .await?;

        match receipt {
            Some(receipt) if receipt_succeeded(&receipt) => Ok(receipt),
            _ => Err(TracerError::DestinationTxFailed {
                chain_id: self.destination.chain_id,
                tx_hash: callback.hash.clone(),
            }),
        }
    }
}
