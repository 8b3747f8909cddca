mod client;
mod network;

pub use client::{CountingStore, SharedStore, TestClient};
pub use network::TestNetwork;
