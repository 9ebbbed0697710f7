pub mod biometrics;
pub mod check_in;
pub mod coping;
pub mod goal;
pub mod intervention;
pub mod journal;
pub mod profile;
pub mod user;
