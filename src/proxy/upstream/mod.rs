// Upstream module - watsonx.ai client

pub mod client;
