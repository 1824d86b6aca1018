//! Requests sent from clients to the relay.

use serde::{Deserialize, Serialize};

/// Kind of an SDP message, as used by the browser `RTCSessionDescription`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    /// An offer from the initiating side.
    Offer,

    /// A final answer.
    Answer,

    /// A provisional answer.
    Pranswer,

    /// Roll back to the previous stable state.
    Rollback,
}

/// A session description as exchanged over HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// Description kind.
    #[serde(rename = "type")]
    pub sdp_type: SdpType,

    /// Raw SDP text.
    pub sdp: String,
}

impl SessionDescription {
    /// Build an offer description.
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    /// Returns true if the SDP carries ICE credentials.
    pub fn has_ice_credentials(&self) -> bool {
        self.sdp.contains("ice-ufrag")
    }
}

/// Request to change the current genre.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreRequest {
    /// Genre name, passed through verbatim.
    pub genre: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offer_parses_browser_shape() {
        let json = r#"{"type":"offer","sdp":"v=0\r\na=ice-ufrag:abcd\r\n"}"#;
        let desc: SessionDescription = serde_json::from_str(json).unwrap();

        assert_eq!(desc.sdp_type, SdpType::Offer);
        assert!(desc.has_ice_credentials());
    }

    #[test]
    fn test_genre_request_requires_genre() {
        assert!(serde_json::from_str::<GenreRequest>(r#"{"name":"jazz"}"#).is_err());
        assert!(serde_json::from_str::<GenreRequest>(r#"{"genre":42}"#).is_err());

        let req: GenreRequest = serde_json::from_str(r#"{"genre":"jazz"}"#).unwrap();
        assert_eq!(req.genre, "jazz");
    }
}
