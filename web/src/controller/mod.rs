pub(crate) mod driver_controller;
pub(crate) mod health_check_controller;
pub(crate) mod token_controller;
pub(crate) mod vehicle_controller;
