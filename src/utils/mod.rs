//! Small helpers shared across the crate.

use std::any::Any;
use std::sync::Arc;

pub mod time;

pub use self::time::*;

pub fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Smallest f64 strictly greater than a finite `x`.
/// Only used by the warm-up calculator, whose inputs stay rational.
pub(crate) fn next_after(x: f64) -> f64 {
    let bits = x.to_bits();
    // stepping toward +inf moves the mantissa in opposite directions
    // depending on the sign bit
    let bits = if (bits >> 63) == 0 { bits + 1 } else { bits - 1 };
    f64::from_bits(bits)
}

/// Upcast to `Any` for downcasting concrete slot and snapshot types.
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &(dyn Any + Send + Sync);
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn next_after_is_strictly_greater() {
        let x = 0.1_f64;
        assert!(next_after(x) > x);
    }

    #[test]
    fn blank_strings() {
        assert!(is_blank(""));
        assert!(is_blank("  \t"));
        assert!(!is_blank("a"));
    }
}
