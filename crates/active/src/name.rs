//! Module identity and log name decoration.

use heapless::String as FixedString;

/// Width of the decorated name, brackets and padding included.
pub const MAX_NAME_LENGTH: usize = 16;

/// Immutable identity of a module.
///
/// The decorated form is `"[" + name + "]"` padded with dots to exactly
/// [`MAX_NAME_LENGTH`] characters, so log columns line up:
/// `"[Sensor]........"`. Names longer than 14 bytes are truncated on a
/// character boundary.
#[derive(Debug, Clone)]
pub struct Identity {
    name: String,
    decorated: FixedString<MAX_NAME_LENGTH>,
    debug: bool,
}

impl Identity {
    pub fn new(name: &str, debug: bool) -> Self {
        Self {
            name: name.to_string(),
            decorated: decorate(name),
            debug,
        }
    }

    /// The name as given at construction.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn decorated(&self) -> &str {
        &self.decorated
    }

    pub fn debug_active(&self) -> bool {
        self.debug
    }
}

fn decorate(name: &str) -> FixedString<MAX_NAME_LENGTH> {
    let budget = MAX_NAME_LENGTH - 2;
    let mut used = 0;
    let mut out = FixedString::new();
    let _ = out.push('[');
    for ch in name.chars() {
        used += ch.len_utf8();
        if used > budget {
            break;
        }
        let _ = out.push(ch);
    }
    let _ = out.push(']');
    while out.len() < MAX_NAME_LENGTH {
        let _ = out.push('.');
    }
    out
}
