pub mod pelando;
