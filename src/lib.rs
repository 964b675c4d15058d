pub mod biomechanics;
pub mod capability;
pub mod config;
pub mod demo;
pub mod fusion;
pub mod governor;
pub mod pipeline;
pub mod pose;
pub mod protocol;
pub mod server;
pub mod session;
