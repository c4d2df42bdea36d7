use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, register_counter, register_counter_vec, register_gauge,
    register_histogram,
};

lazy_static! {
    pub static ref LIKE_REQUESTS: Counter =
        register_counter!("likes_requests_total", "Total number of like api requests")
            .expect("likes_requests_total registers once");
    pub static ref LIKES_ACCEPTED: Counter =
        register_counter!("likes_accepted_total", "Total likes committed to the store")
            .expect("likes_accepted_total registers once");
    pub static ref LIKES_REJECTED: CounterVec = register_counter_vec!(
        "likes_rejected_total",
        "Rejected like api requests by reason",
        &["reason"]
    )
    .expect("likes_rejected_total registers once");
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "likes_request_latency_seconds",
        "Like api request latency in seconds"
    )
    .expect("likes_request_latency_seconds registers once");
    pub static ref CATALOG_REFRESHES: Counter =
        register_counter!("likes_catalog_refreshes_total", "Successful catalog downloads")
            .expect("likes_catalog_refreshes_total registers once");
    pub static ref CATALOG_REFRESH_FAILURES: Counter = register_counter!(
        "likes_catalog_refresh_failures_total",
        "Catalog refreshes where every source failed"
    )
    .expect("likes_catalog_refresh_failures_total registers once");
    pub static ref TRACKED_APPS: Gauge =
        register_gauge!("likes_tracked_apps", "Number of apps with at least one like")
            .expect("likes_tracked_apps registers once");
}
