mod remote;
mod synthetic;

pub use remote::RemoteMetricsSource;
pub use synthetic::SyntheticMetricsSource;
