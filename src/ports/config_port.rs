//! Configuration access port trait.

/// Keyed lookup into sectioned configuration. Typed parsing and validation
/// happen in the domain so every source reports errors the same way.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;
}
