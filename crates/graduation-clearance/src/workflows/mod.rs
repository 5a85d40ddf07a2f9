pub mod graduation;
