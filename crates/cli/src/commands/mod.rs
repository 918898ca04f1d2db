pub mod budget;
pub mod doctor;
pub mod generate;
pub mod init;

mod inputs;
