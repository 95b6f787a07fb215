use bitey_native::NativeError;
use std::fmt;

/// A function the driver could not wrap, and why.
#[derive(Debug)]
pub struct SkippedFunction {
    pub name: String,
    pub reason: NativeError,
}

/// Outcome of wrapping one module.
#[derive(Debug, Default)]
pub struct WrapReport {
    /// Names installed into the table, in module order.
    pub wrapped: Vec<String>,
    pub skipped: Vec<SkippedFunction>,
}

impl WrapReport {
    pub fn is_wrapped(&self, name: &str) -> bool {
        self.wrapped.iter().any(|n| n == name)
    }

    pub fn skipped_names(&self) -> impl Iterator<Item = &str> {
        self.skipped.iter().map(|s| s.name.as_str())
    }
}

impl fmt::Display for WrapReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} wrapped, {} skipped", self.wrapped.len(), self.skipped.len())?;
        for skipped in &self.skipped {
            write!(f, "\n  {}: {}", skipped.name, skipped.reason)?;
        }
        Ok(())
    }
}
