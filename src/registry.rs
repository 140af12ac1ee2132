//! Explicit format registration (spec.md §9 "Format registry" design note).
//!
//! The original registers the `"ctf"` format name at constructor time via a
//! hidden static initializer. This crate has no hidden initialization:
//! a containing framework that keeps its own table of format openers calls
//! [`register`] explicitly, at whatever point in its own startup sequence
//! it likes.

use crate::error::Error;
use crate::trace::Trace;
use std::path::Path;

/// The name this format is registered under (spec.md §6).
pub const FORMAT_NAME: &str = "ctf";

/// Anything a containing framework uses to dispatch `open` calls by format
/// name implements this to receive the registration.
pub trait FormatRegistry {
    fn register_opener(&mut self, name: &'static str, opener: fn(&Path) -> Result<Trace, Error>);
}

/// Registers this crate's trace opener under [`FORMAT_NAME`] (spec.md §6's
/// "The format is registered under the name `ctf` at process init").
pub fn register<R: FormatRegistry>(registry: &mut R) {
    registry.register_opener(FORMAT_NAME, |path| Trace::open(path));
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Default)]
    struct MockRegistry {
        registered: Vec<(&'static str, fn(&Path) -> Result<Trace, Error>)>,
    }

    impl FormatRegistry for MockRegistry {
        fn register_opener(&mut self, name: &'static str, opener: fn(&Path) -> Result<Trace, Error>) {
            self.registered.push((name, opener));
        }
    }

    #[test]
    fn registers_under_ctf() {
        let mut registry = MockRegistry::default();
        register(&mut registry);
        assert_eq!(registry.registered.len(), 1);
        assert_eq!(registry.registered[0].0, FORMAT_NAME);
    }
}
