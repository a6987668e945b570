//! The unit stored in the sample store.

use std::collections::HashMap;

use prometheus::core::Collector;
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, Opts};
use tokio::time::Instant;

/// One metric observation plus the instant it was collected.
///
/// The metric is a ready-to-export family holding a single gauge; the store
/// never looks inside it.
#[derive(Debug, Clone)]
pub struct Sample {
    metric: MetricFamily,
    observed_at: Instant,
}

impl Sample {
    pub fn new(metric: MetricFamily, observed_at: Instant) -> Self {
        Self {
            metric,
            observed_at,
        }
    }

    /// Build a constant gauge sample.
    ///
    /// Fails if the metric or a label name is not a valid Prometheus name.
    pub fn gauge(
        name: &str,
        help: &str,
        labels: &[(&str, &str)],
        value: f64,
        observed_at: Instant,
    ) -> prometheus::Result<Self> {
        let const_labels: HashMap<String, String> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let gauge = Gauge::with_opts(Opts::new(name, help).const_labels(const_labels))?;
        gauge.set(value);

        let metric = gauge
            .collect()
            .pop()
            .ok_or_else(|| prometheus::Error::Msg(format!("gauge {name} collected nothing")))?;
        Ok(Self::new(metric, observed_at))
    }

    pub fn metric(&self) -> &MetricFamily {
        &self.metric
    }

    pub fn into_metric(self) -> MetricFamily {
        self.metric
    }

    pub fn observed_at(&self) -> Instant {
        self.observed_at
    }

    /// Metric name, for logging and tests.
    pub fn name(&self) -> &str {
        self.metric.get_name()
    }

    /// Value of the single gauge in this sample.
    pub fn value(&self) -> Option<f64> {
        self.metric
            .get_metric()
            .first()
            .map(|m| m.get_gauge().get_value())
    }

    /// Metric name plus label pairs; equal keys mean the same time series.
    pub fn series_key(&self) -> (String, Vec<(String, String)>) {
        let labels = self
            .metric
            .get_metric()
            .first()
            .map(|m| {
                m.get_label()
                    .iter()
                    .map(|l| (l.get_name().to_string(), l.get_value().to_string()))
                    .collect()
            })
            .unwrap_or_default();
        (self.name().to_string(), labels)
    }

    /// Value of the label `name`, if present.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.metric.get_metric().first().and_then(|m| {
            m.get_label()
                .iter()
                .find(|l| l.get_name() == name)
                .map(|l| l.get_value())
        })
    }
}
