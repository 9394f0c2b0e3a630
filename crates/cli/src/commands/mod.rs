pub mod inspect;
pub mod start;
pub mod status;
