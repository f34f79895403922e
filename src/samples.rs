/// Percussion sample table
///
/// Sample references in a composition carry a reserved prefix (`s-kick`). The
/// playback layer resolves them here to a drum note number.
use std::collections::HashMap;

pub const SAMPLE_PREFIX: &str = "s-";

const DEFAULT_KIT: [(&str, u8); 13] = [
    ("kick", 36),
    ("snare", 37),
    ("rim", 38),
    ("closedhat", 39),
    ("openhat", 40),
    ("shaker", 41),
    ("floor", 42),
    ("tom", 43),
    ("tamb", 44),
    ("cowbell", 45),
    ("ridebell", 46),
    ("ridecymbal", 47),
    ("crash", 48),
];

/// Strip the reserved prefix from a sample reference, if it has one.
pub fn sample_name(reference: &str) -> Option<&str> {
    reference.strip_prefix(SAMPLE_PREFIX)
}

#[derive(Debug, Clone)]
pub struct SampleTable {
    notes: HashMap<String, u8>,
}

impl SampleTable {
    pub fn new() -> Self {
        Self {
            notes: HashMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, note: u8) {
        self.notes.insert(name.into(), note);
    }

    /// Look up a prefixed reference such as `s-kick`.
    pub fn resolve(&self, reference: &str) -> Option<u8> {
        sample_name(reference).and_then(|name| self.notes.get(name).copied())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.notes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

impl Default for SampleTable {
    fn default() -> Self {
        let mut table = Self::new();
        for (name, note) in DEFAULT_KIT {
            table.insert(name, note);
        }
        table
    }
}
