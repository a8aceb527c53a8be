pub mod formulation;
pub mod market;
pub mod storage;
