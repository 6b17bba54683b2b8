//! Real vs synthetic traffic classification.
//!
//! The rules are heuristics inherited from the deployed firmware and Node-RED
//! flows, and downstream consumers rely on them as-is. In particular a bare
//! integer body (`"42"`) on an ordinary topic is treated as test traffic even
//! if a real sensor sent it.

// ---

/// Topic substrings (case-sensitive) that mark synthetic traffic.
const TOPIC_TRIGGERS: &[&str] = &["node-red", "test", "simulation"];

/// Body substrings (matched against the lower-cased body) that mark
/// synthetic traffic.
const BODY_TRIGGERS: &[&str] = &["test", "simulation", "mock", "fake"];

/// Which pipeline a message goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficPath {
    Real,
    Test,
}

/// Returns `true` when the message looks like test/simulation traffic.
///
/// First match wins: topic triggers, then body triggers, then an
/// all-digits body.
pub fn classify(topic: &str, body: &str) -> bool {
    // ---
    if TOPIC_TRIGGERS.iter().any(|t| topic.contains(t)) {
        return true;
    }

    let lowered = body.to_lowercase();
    if BODY_TRIGGERS.iter().any(|t| lowered.contains(t)) {
        return true;
    }

    is_bare_integer(body.trim())
}

/// [`classify`], expressed as the path the coordinator should take.
pub fn traffic_path(topic: &str, body: &str) -> TrafficPath {
    if classify(topic, body) {
        TrafficPath::Test
    } else {
        TrafficPath::Real
    }
}

fn is_bare_integer(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
