pub mod backend;
pub mod cases;
pub mod compare;
pub mod engine;
pub mod normalize;
pub mod report;
pub mod types;
