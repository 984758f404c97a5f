use std::fmt;

/// RampartRule is the abstraction of all rule kinds managed by the engine.
pub trait RampartRule: fmt::Debug + fmt::Display + Send + Sync {
    fn resource_name(&self) -> String;

    fn id(&self) -> String {
        String::new()
    }

    fn is_valid(&self) -> crate::Result<()> {
        Ok(())
    }
}
