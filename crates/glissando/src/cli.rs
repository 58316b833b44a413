pub mod inspect;
pub mod smooth;
