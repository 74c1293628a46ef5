//! Metric names and descriptions

pub const HEARTBEATS_SENT: &str = "canvas_sync_heartbeats_sent_total";
pub const PROMOTIONS: &str = "canvas_sync_promotions_total";
pub const STEP_DOWNS: &str = "canvas_sync_step_downs_total";
pub const STATE_UPDATES_SENT: &str = "canvas_sync_state_updates_sent_total";
pub const STATE_UPDATES_APPLIED: &str = "canvas_sync_state_updates_applied_total";
pub const STATE_UPDATES_DISCARDED: &str = "canvas_sync_state_updates_discarded_total";
pub const MUTATIONS_REJECTED: &str = "canvas_sync_mutations_rejected_total";
pub const MALFORMED_MESSAGES: &str = "canvas_sync_malformed_messages_total";

/// Register descriptions with the installed recorder
pub fn describe_metrics() {
    metrics::describe_counter!(HEARTBEATS_SENT, "Heartbeats broadcast while MAIN");
    metrics::describe_counter!(PROMOTIONS, "Transitions into MAIN");
    metrics::describe_counter!(STEP_DOWNS, "Transitions into SECONDARY");
    metrics::describe_counter!(STATE_UPDATES_SENT, "Full state pushes broadcast by MAIN");
    metrics::describe_counter!(
        STATE_UPDATES_APPLIED,
        "Replicated states applied by followers"
    );
    metrics::describe_counter!(
        STATE_UPDATES_DISCARDED,
        "Replicated states dropped because the sender is not the believed MAIN"
    );
    metrics::describe_counter!(
        MUTATIONS_REJECTED,
        "Mutation requests ignored because the peer is not MAIN"
    );
    metrics::describe_counter!(MALFORMED_MESSAGES, "Channel values that failed to decode");
}
