use serde::Deserialize;

/// Query parameters accepted when generating a driver token
///
/// # Fields
///
/// * `bus_id` - Vehicle the token is bound to; a random `bus-<n>` id is used when absent
/// * `route_id` - Route the token is issued for; the default route is used when absent
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateTokenParams {
    pub(crate) bus_id: Option<String>,
    pub(crate) route_id: Option<String>,
}
