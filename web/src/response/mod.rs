use domain::VehicleLocation;
use serde::Serialize;
use std::collections::BTreeMap;

/// `{ "ok": true }`
#[derive(Debug, Serialize)]
pub(crate) struct Acknowledged {
    pub(crate) ok: bool,
}

impl Acknowledged {
    pub(crate) fn ok() -> Self {
        Self { ok: true }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IssuedToken {
    pub(crate) token: String,
    pub(crate) bus_id: String,
    pub(crate) route_id: String,
}

/// Latest location of every vehicle, keyed by vehicle id.
#[derive(Debug, Serialize)]
pub(crate) struct VehicleSnapshot {
    pub(crate) buses: BTreeMap<String, VehicleLocation>,
}
