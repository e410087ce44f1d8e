mod bootstrap;
mod config;
mod loop_runner;
mod metrics;
mod render_thread;
#[cfg(test)]
mod test_support;

pub(crate) use bootstrap::{build_host, init_tracing};
pub(crate) use loop_runner::run_host;
