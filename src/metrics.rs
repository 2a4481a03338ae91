//! Service Metrics
//!
//! Prometheus counters and histograms for inventory commands, exposed in
//! text format on the API's `/metrics` route.

use crate::domain::ports::ObjectType;
use crate::error::{Error, Result};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metrics collected by the inventory layer
pub struct ServiceMetrics {
    registry: Registry,
    commands: IntCounterVec,
    command_duration: HistogramVec,
    reauthentications: IntCounter,
    ambiguous_resolutions: IntCounterVec,
}

impl ServiceMetrics {
    /// Create and register all metrics in a private registry
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let commands = IntCounterVec::new(
            Opts::new(
                "vm_provisioner_inventory_commands_total",
                "Inventory CLI invocations by subcommand and outcome",
            ),
            &["subcommand", "outcome"],
        )?;
        let command_duration = HistogramVec::new(
            HistogramOpts::new(
                "vm_provisioner_inventory_command_duration_seconds",
                "Wall time of inventory CLI invocations",
            )
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
            &["subcommand"],
        )?;
        let reauthentications = IntCounter::new(
            "vm_provisioner_reauthentications_total",
            "Sessions re-authenticated after an authentication failure",
        )?;
        let ambiguous_resolutions = IntCounterVec::new(
            Opts::new(
                "vm_provisioner_ambiguous_resolutions_total",
                "Path resolutions that matched several objects without a decisive hint",
            ),
            &["object_type"],
        )?;

        registry.register(Box::new(commands.clone()))?;
        registry.register(Box::new(command_duration.clone()))?;
        registry.register(Box::new(reauthentications.clone()))?;
        registry.register(Box::new(ambiguous_resolutions.clone()))?;

        Ok(Self {
            registry,
            commands,
            command_duration,
            reauthentications,
            ambiguous_resolutions,
        })
    }

    pub fn observe_command(&self, subcommand: &str, outcome: &Result<String>, elapsed: Duration) {
        let outcome = match outcome {
            Ok(_) => "ok",
            Err(e) => e.code(),
        };
        self.commands
            .with_label_values(&[subcommand, outcome])
            .inc();
        self.command_duration
            .with_label_values(&[subcommand])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_reauthentication(&self) {
        self.reauthentications.inc();
    }

    pub fn record_ambiguous(&self, object_type: ObjectType) {
        self.ambiguous_resolutions
            .with_label_values(&[object_type.to_string().as_str()])
            .inc();
    }

    pub fn command_count(&self, subcommand: &str, outcome: &str) -> u64 {
        self.commands.with_label_values(&[subcommand, outcome]).get()
    }

    pub fn reauthentication_count(&self) -> u64 {
        self.reauthentications.get()
    }

    /// Render all metrics in the Prometheus text format
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| Error::Internal(format!("metrics are not UTF-8: {}", e)))
    }
}
