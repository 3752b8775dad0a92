pub mod assembler;
pub mod balancer;
pub mod filter;
pub mod generator;
pub mod nutri_eval;
pub mod portion;
pub mod scoring;
pub mod selector;
pub mod structure;
pub mod targets;

pub use generator::ComboGenerator;
