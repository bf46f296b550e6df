pub(crate) mod authorization_controller;
pub(crate) mod health_check_controller;
