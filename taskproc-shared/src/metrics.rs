/// Abstract metric registry
///
/// The core emits named counters and timers through this trait instead
/// of talking to a metric backend directly. The registry is injected
/// into the framework constructor: it is a process-wide collaborator,
/// not an ambient singleton.
///
/// Two implementations ship here:
///
/// - [`InMemoryMetrics`]: plain maps behind mutexes, readable back in
///   tests and health endpoints.
/// - [`TelemetryRegistry`]: forwards to the `metrics` facade crate, so
///   whatever exporter the process installed receives the series.
///
/// Dimensions are key/value tags attached at registration time (e.g.
/// `framework_name`, `framework_role`) and reported with every sample.
use std::collections::HashMap;
use std::sync::Mutex;

/// Dimension tags attached to a metric at registration time
pub type Dimensions = Vec<(String, String)>;

/// Named counters and timers with dimension tags
pub trait MetricRegistry: Send + Sync {
    /// Declares a counter before first use
    fn register_counter(&self, name: &str, dimensions: &Dimensions);

    /// Declares a timer before first use
    fn register_timer(&self, name: &str, dimensions: &Dimensions);

    /// Adds `delta` to a counter
    fn count(&self, name: &str, delta: u64);

    /// Records one timer observation, in seconds
    fn record(&self, name: &str, value: f64);
}

/// Map-backed registry, readable back in tests
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    counters: Mutex<HashMap<String, u64>>,
    timers: Mutex<HashMap<String, Vec<f64>>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        InMemoryMetrics::default()
    }

    /// Current value of a counter; 0 when never touched
    pub fn counter_value(&self, name: &str) -> u64 {
        self.counters
            .lock()
            .expect("metrics lock poisoned")
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// All observations recorded for a timer
    pub fn timer_values(&self, name: &str) -> Vec<f64> {
        self.timers
            .lock()
            .expect("metrics lock poisoned")
            .get(name)
            .cloned()
            .unwrap_or_default()
    }
}

impl MetricRegistry for InMemoryMetrics {
    fn register_counter(&self, name: &str, _dimensions: &Dimensions) {
        self.counters
            .lock()
            .expect("metrics lock poisoned")
            .entry(name.to_string())
            .or_insert(0);
    }

    fn register_timer(&self, name: &str, _dimensions: &Dimensions) {
        self.timers
            .lock()
            .expect("metrics lock poisoned")
            .entry(name.to_string())
            .or_default();
    }

    fn count(&self, name: &str, delta: u64) {
        *self
            .counters
            .lock()
            .expect("metrics lock poisoned")
            .entry(name.to_string())
            .or_insert(0) += delta;
    }

    fn record(&self, name: &str, value: f64) {
        self.timers
            .lock()
            .expect("metrics lock poisoned")
            .entry(name.to_string())
            .or_default()
            .push(value);
    }
}

/// Registry forwarding to the `metrics` facade
///
/// Registered dimensions are remembered and attached as labels on every
/// emission. Whatever recorder the process installed (prometheus
/// exporter, statsd bridge) receives the series.
#[derive(Debug, Default)]
pub struct TelemetryRegistry {
    dimensions: Mutex<HashMap<String, Dimensions>>,
}

impl TelemetryRegistry {
    pub fn new() -> Self {
        TelemetryRegistry::default()
    }

    fn labels_for(&self, name: &str) -> Vec<metrics::Label> {
        self.dimensions
            .lock()
            .expect("metrics lock poisoned")
            .get(name)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| metrics::Label::new(key, value))
            .collect()
    }
}

impl MetricRegistry for TelemetryRegistry {
    fn register_counter(&self, name: &str, dimensions: &Dimensions) {
        self.dimensions
            .lock()
            .expect("metrics lock poisoned")
            .insert(name.to_string(), dimensions.clone());
    }

    fn register_timer(&self, name: &str, dimensions: &Dimensions) {
        self.dimensions
            .lock()
            .expect("metrics lock poisoned")
            .insert(name.to_string(), dimensions.clone());
    }

    fn count(&self, name: &str, delta: u64) {
        let labels = self.labels_for(name);
        metrics::counter!(name.to_string(), labels).increment(delta);
    }

    fn record(&self, name: &str, value: f64) {
        let labels = self.labels_for(name);
        metrics::histogram!(name.to_string(), labels).record(value);
    }
}
