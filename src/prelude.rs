pub use std::sync::Arc;
pub use std::time::Duration;

pub use anyhow::{anyhow, bail, Result};
pub use log::{debug, error, info, trace, warn};
pub use tokio::sync::broadcast;

pub use crate::channels::Channels;
pub use crate::command::Command;
pub use crate::config::{self, Config};
pub use crate::mqtt;
pub use crate::options::Options;
