use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Aggregation request duration in seconds. Tagged with status.",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of requests currently being processed",
};

pub const BRANCH_DURATION: MetricDef = MetricDef {
    name: "branch.duration",
    metric_type: MetricType::Histogram,
    description: "Upstream branch duration in seconds, including timeouts. Tagged with branch.",
};

pub const BRANCH_FAILURES: MetricDef = MetricDef {
    name: "branch.failures",
    metric_type: MetricType::Counter,
    description: "Number of branches omitted from a response because they failed. Tagged with branch.",
};

/// Every metric emitted by the aggregator, described to the recorder at startup.
pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    REQUESTS_INFLIGHT,
    BRANCH_DURATION,
    BRANCH_FAILURES,
];
