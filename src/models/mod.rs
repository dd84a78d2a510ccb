pub mod cluster;
pub mod k8s;
pub mod views;
