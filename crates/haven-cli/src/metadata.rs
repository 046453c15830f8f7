use std::fmt::{Display, Formatter};

use haven_core::{DataOrigin, EnvelopeMeta, StageId, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request identifier (UUID v4) for end-to-end request tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Command metadata used to construct envelope metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub request_id: RequestId,
    pub stage_chain: Vec<StageId>,
    pub latency_ms: u64,
    pub cache_hit: bool,
    pub origin: Option<(DataOrigin, &'static str)>,
    pub warnings: Vec<String>,
}

impl Metadata {
    pub fn new(stage_chain: Vec<StageId>, latency_ms: u64, cache_hit: bool) -> Self {
        Self {
            request_id: RequestId::new_v4(),
            stage_chain,
            latency_ms,
            cache_hit,
            origin: None,
            warnings: Vec::new(),
        }
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn into_envelope_meta(self) -> Result<EnvelopeMeta, ValidationError> {
        let mut envelope_meta = EnvelopeMeta::new(
            self.request_id.to_string(),
            self.stage_chain,
            self.latency_ms,
            self.cache_hit,
        )?;
        if let Some((origin, status)) = self.origin {
            envelope_meta = envelope_meta.with_origin(origin, status);
        }

        for warning in self.warnings {
            envelope_meta.push_warning(warning);
        }

        Ok(envelope_meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_is_uuid_v4() {
        let request_id = RequestId::new_v4();
        assert_eq!(request_id.0.get_version_num(), 4);
    }

    #[test]
    fn envelope_meta_carries_origin_and_warnings() {
        let mut metadata = Metadata::new(vec![StageId::Grounded], 12, false);
        metadata.origin = Some((DataOrigin::Real, "live market data"));
        metadata.push_warning("w1");

        let meta = metadata.into_envelope_meta().expect("valid meta");

        assert_eq!(meta.origin, Some(DataOrigin::Real));
        assert_eq!(meta.status.as_deref(), Some("live market data"));
        assert_eq!(meta.warnings, vec![String::from("w1")]);
        assert_eq!(meta.request_id.len(), 36);
    }
}
