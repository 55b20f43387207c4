//! Metric names and descriptions.
//!
//! The library only emits through the `metrics` facade; installing a
//! recorder (Prometheus exporter or otherwise) is left to the host.

/// Messages successfully handed to the transport.
pub const MESSAGES_SENT_TOTAL: &str = "notification_messages_sent_total";

/// Send calls that failed, labelled with the error reason.
pub const SEND_ERRORS_TOTAL: &str = "notification_send_errors_total";

/// Public send operations, used as the `operation` label.
pub const OPERATIONS: [&str; 4] = [
    crate::notify::OP_TEMPLATE,
    crate::notify::OP_TEMPLATE_MULTI,
    crate::notify::OP_STRING,
    crate::notify::OP_STRING_MULTI,
];

/// Register all metric descriptions.
///
/// Call once after the recorder is installed.
pub fn register_metric_descriptions() {
    use metrics::describe_counter;

    describe_counter!(
        MESSAGES_SENT_TOTAL,
        "Total number of messages successfully handed to the mail transport"
    );
    describe_counter!(
        SEND_ERRORS_TOTAL,
        "Total number of send calls rejected by validation or failed in the transport"
    );
}

/// Initialize the sent counter at zero for every operation so it is
/// exported before the first message goes out.
pub fn initialize_metrics(transport_type: &str) {
    for operation in OPERATIONS {
        metrics::counter!(
            MESSAGES_SENT_TOTAL,
            "operation" => operation,
            "transport" => transport_type.to_string()
        )
        .absolute(0);
    }
}
