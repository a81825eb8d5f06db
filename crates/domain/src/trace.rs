use serde::Serialize;

/// Structured trace events emitted across all CentralGate crates.
///
/// Credentials appear only as fingerprints, never in clear.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    UpstreamAttempt {
        provider: String,
        model: String,
        credential_index: usize,
        credential_fingerprint: String,
        outcome: String,
        duration_ms: u64,
    },
    CredentialRotated {
        from_index: usize,
        to_index: usize,
        reason: String,
    },
    DispatchCompleted {
        outcome: String,
        attempts: usize,
        pool_size: usize,
    },
    SessionEstablished {
        identity_id: String,
        class: String,
        restored: bool,
    },
    SessionEnded {
        identity_id: Option<String>,
    },
    SessionRejected {
        class: String,
        reason: String,
    },
    ChatLogAppend {
        identity_id: String,
        lines: usize,
    },
    SettingsRefreshed {
        pool_size: usize,
        identities: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "cg_event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_by_name() {
        let ev = TraceEvent::ChatLogAppend {
            identity_id: "u1".into(),
            lines: 2,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "ChatLogAppend");
        assert_eq!(json["lines"], 2);
    }
}
