//! time module functions
//!
//! `sleep` and `tick` return promises; nothing suspends until they are awaited.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::{expect_arg_count, num_arg};
use crate::executor::errors::{self, Failure};
use crate::executor::types::{Promise, Val};

/// time.sleep(ms) - promise resolving to null after `ms` milliseconds
pub fn sleep(args: &[Val]) -> Result<Val, Failure> {
    expect_arg_count(args, 1, "sleep")?;
    let ms = num_arg(args, 0, "sleep")?;
    if ms < 0.0 || !ms.is_finite() {
        return Err(Failure::throw(
            errors::WRONG_ARG_TYPE,
            format!("sleep() duration must be a non-negative number, got {}", ms),
        ));
    }

    let duration = Duration::from_millis(ms as u64);
    Ok(Val::Promise(Promise::new(async move {
        tokio::time::sleep(duration).await;
        Ok(Val::Null)
    })))
}

/// time.tick() - promise resolving after one pass through the scheduler
pub fn tick(args: &[Val]) -> Result<Val, Failure> {
    expect_arg_count(args, 0, "tick")?;
    Ok(Val::Promise(Promise::new(async {
        tokio::task::yield_now().await;
        Ok(Val::Null)
    })))
}

/// time.now() - seconds since the Unix epoch
pub fn now(args: &[Val]) -> Result<Val, Failure> {
    expect_arg_count(args, 0, "now")?;
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    Ok(Val::Num(secs))
}
