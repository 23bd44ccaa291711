pub mod config;
pub mod frame;
pub mod net;
pub mod queue;
pub mod seq;
pub mod sim;
pub mod socket;
pub mod tunnel;
pub mod wire;

#[cfg(test)]
mod test;
