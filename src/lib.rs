pub mod config;
pub mod downloader;
pub mod server;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use server::serve;
