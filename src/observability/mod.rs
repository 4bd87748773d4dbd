pub mod logging;
pub mod metrics;

pub use self::logging::{
    init_logging, mask_sensitive, request_span, service_span, LogConfig, LogFormat, LogOutput,
};
pub use self::metrics::{HttpMetrics, LatencyTimer};
