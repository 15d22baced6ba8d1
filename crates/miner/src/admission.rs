use registry::MetagraphView;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AdmissionConfig {
    pub allow_non_registered: bool,
    pub force_validator_permit: bool,
}

/// Explicit decision, not a raised error: rejects carry the human-readable
/// reason returned to the caller.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AdmissionVerdict {
    Granted,
    Rejected(String),
}

impl AdmissionVerdict {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

pub fn admit(
    caller: Option<&str>,
    metagraph: &dyn MetagraphView,
    config: AdmissionConfig,
) -> AdmissionVerdict {
    let Some(hotkey) = caller else {
        return AdmissionVerdict::Rejected("Missing caller hotkey".to_owned());
    };
    if !config.allow_non_registered && !metagraph.is_registered(hotkey) {
        tracing::warn!(hotkey = %hotkey, "rejecting unrecognized caller");
        return AdmissionVerdict::Rejected("Unrecognized hotkey".to_owned());
    }
    if config.force_validator_permit && !metagraph.has_validator_permit(hotkey) {
        tracing::warn!(hotkey = %hotkey, "rejecting caller without validator permit");
        return AdmissionVerdict::Rejected("Non-validator hotkey".to_owned());
    }
    AdmissionVerdict::Granted
}

/// Queueing hint for the layer above this core: no identity serves at zero,
/// otherwise the caller's stake. Higher stake is served first under load.
pub fn priority_of(caller: Option<&str>, metagraph: &dyn MetagraphView) -> f64 {
    caller
        .map(|hotkey| metagraph.stake_of(hotkey))
        .unwrap_or(0.0)
}
