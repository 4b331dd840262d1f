pub mod host_probe;
