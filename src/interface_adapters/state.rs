use crate::interface_adapters::net::Hub;

#[derive(Clone)]
pub struct AppState {
    // Sessions, authorization and fan-out for the running game.
    pub hub: Hub,
}
