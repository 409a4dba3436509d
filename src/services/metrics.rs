use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Instant;

use crate::models::{Entitlement, SettlementOutcome};

pub struct MetricsService {
    registry: Registry,
    chat_turns: IntCounterVec,
    quota_denials: IntCounter,
    settlements: IntCounterVec,
    responses: IntCounterVec,
    request_duration: HistogramVec,
}

impl MetricsService {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new_custom(Some("mindspark".to_string()), None)?;

        let chat_turns = IntCounterVec::new(
            Opts::new("chat_turns_total", "Completed chat turns"),
            &["tier"],
        )?;
        let quota_denials =
            IntCounter::new("quota_denials_total", "Chat turns denied by the daily limit")?;
        let settlements = IntCounterVec::new(
            Opts::new("settlements_total", "Payment callbacks by outcome"),
            &["outcome"],
        )?;
        let responses = IntCounterVec::new(
            Opts::new("http_responses_total", "HTTP responses by status class"),
            &["class"],
        )?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new("request_duration_seconds", "Request latency"),
            &["endpoint"],
        )?;

        registry.register(Box::new(chat_turns.clone()))?;
        registry.register(Box::new(quota_denials.clone()))?;
        registry.register(Box::new(settlements.clone()))?;
        registry.register(Box::new(responses.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(Self {
            registry,
            chat_turns,
            quota_denials,
            settlements,
            responses,
            request_duration,
        })
    }

    pub fn record_chat_turn(&self, entitlement: Entitlement) {
        let tier = match entitlement {
            Entitlement::Free => "free",
            Entitlement::Premium => "premium",
        };
        self.chat_turns.with_label_values(&[tier]).inc();
    }

    pub fn record_quota_denial(&self) {
        self.quota_denials.inc();
    }

    pub fn record_settlement(&self, outcome: SettlementOutcome) {
        let label = match outcome {
            SettlementOutcome::Applied => "applied",
            SettlementOutcome::Ignored => "ignored",
            SettlementOutcome::UnknownAccount => "unknown_account",
        };
        self.settlements.with_label_values(&[label]).inc();
    }

    pub fn record_invalid_signature(&self) {
        self.settlements.with_label_values(&["invalid_signature"]).inc();
    }

    pub fn record_response(&self, class: &str) {
        self.responses.with_label_values(&[class]).inc();
    }

    pub fn start_timer(&self, endpoint: String) -> RequestTimer {
        RequestTimer {
            start: Instant::now(),
            endpoint,
            histogram: self.request_duration.clone(),
        }
    }

    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

pub struct RequestTimer {
    start: Instant,
    endpoint: String,
    histogram: HistogramVec,
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        self.histogram
            .with_label_values(&[self.endpoint.as_str()])
            .observe(duration.as_secs_f64());
    }
}
