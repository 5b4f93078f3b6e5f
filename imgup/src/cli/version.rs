use std::env;

use serde::Serialize;
use server::config::{DEFAULT_ALLOWED_TYPES, DEFAULT_MAX_FILE_SIZE, DEFAULT_PORT};

#[derive(Debug, Clone, Serialize)]
struct VersionInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub os: &'static str,
    pub architecture: &'static str,
    pub default_port: u16,
    pub max_file_size: u64,
    pub allowed_types: String,
}

pub fn run() {
    let info = VersionInfo {
        name: clap::crate_name!(),
        version: clap::crate_version!(),
        os: env::consts::OS,
        architecture: env::consts::ARCH,
        default_port: DEFAULT_PORT,
        max_file_size: DEFAULT_MAX_FILE_SIZE,
        allowed_types: DEFAULT_ALLOWED_TYPES.join(", "),
    };

    println!("Name           : {}", info.name);
    println!("Version        : {}", info.version);
    println!("OS             : {}", info.os);
    println!("Architecture   : {}", info.architecture);
    println!("Default port   : {}", info.default_port);
    println!("Max file size  : {} bytes", info.max_file_size);
    println!("Allowed types  : {}", info.allowed_types);
}
