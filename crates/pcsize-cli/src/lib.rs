pub mod inspect;
pub mod merge;
pub mod verify;
