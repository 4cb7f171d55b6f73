pub mod protocol {
    pub mod codec;
    pub mod codes;
    pub mod commands;
    pub mod telemetry;
}

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod emulator;
pub mod encoder;
pub mod session;
pub mod sink;
pub mod state;
pub mod trace;
pub mod uptime;
