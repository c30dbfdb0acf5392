// Mappers module - caller <-> upstream protocol conversion

pub mod watsonx;
