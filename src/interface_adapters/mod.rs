// Interface adapters: wire protocol, network hub and client transports.

pub mod clients;
pub mod net;
pub mod protocol;
pub mod state;
pub mod utils;
