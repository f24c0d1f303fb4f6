pub mod profiles;
pub mod secrets;
