use serde::Deserialize;

/// Query parameters of the SSE subscriber stream.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubscribeParams {
    /// Route group to join in addition to the unfiltered one.
    pub(crate) route_id: Option<String>,
}
