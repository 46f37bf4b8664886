use serde::{Deserialize, Serialize};

use crate::domain::{ContentId, RequestId};

/// IPLD link object the gateway uses to carry content identifiers: `{"/": "<cid>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CidLink {
    #[serde(rename = "/")]
    pub cid: ContentId,
}

impl From<ContentId> for CidLink {
    fn from(cid: ContentId) -> Self {
        Self { cid }
    }
}

/// Result of a successful store call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRequest {
    pub id: RequestId,
    pub cid: CidLink,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<i64>,
}

impl StoredRequest {
    pub fn new(id: impl Into<RequestId>, cid: impl Into<ContentId>) -> Self {
        Self {
            id: id.into(),
            cid: CidLink { cid: cid.into() },
            status_code: None,
        }
    }

    pub fn content_id(&self) -> &ContentId {
        &self.cid.cid
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestInfo {
    pub id: RequestId,
    pub status_code: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub request: RequestInfo,
}

impl StatusResponse {
    pub fn new(id: impl Into<RequestId>, status_code: i64) -> Self {
        Self {
            request: RequestInfo {
                id: id.into(),
                status_code,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositResponse {
    pub has_deposit: bool,
}
