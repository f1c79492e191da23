//! Per-node method dispatch.
//!
//! # Design Decisions
//! - The nine standard methods get fixed slots picked by a switch on the
//!   first byte, so the hot path is a byte compare plus one string compare
//! - Extension methods fall into a short linear list

/// Standard methods in slot order.
pub const STANDARD_METHODS: [&str; 9] = [
    "GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "CONNECT", "OPTIONS", "TRACE",
];

/// Slot of a standard method, `None` for extension methods.
pub fn slot(method: &str) -> Option<usize> {
    let bytes = method.as_bytes();
    let candidate = match bytes.first()? {
        b'G' => 0,
        b'H' => 1,
        b'P' => match bytes.get(1)? {
            b'O' => 2,
            b'U' => 3,
            b'A' => 4,
            _ => return None,
        },
        b'D' => 5,
        b'C' => 6,
        b'O' => 7,
        b'T' => 8,
        _ => return None,
    };
    (STANDARD_METHODS[candidate] == method).then_some(candidate)
}

#[derive(Debug)]
pub(crate) struct MethodTable<V> {
    standard: [Option<V>; 9],
    extension: Vec<(Box<str>, V)>,
}

impl<V> MethodTable<V> {
    pub(crate) fn get(&self, method: &str) -> Option<&V> {
        match slot(method) {
            Some(i) => self.standard[i].as_ref(),
            None => self
                .extension
                .iter()
                .find(|(m, _)| &**m == method)
                .map(|(_, v)| v),
        }
    }

    /// Hands the value back if the method is already taken.
    pub(crate) fn insert(&mut self, method: &str, value: V) -> Result<(), V> {
        match slot(method) {
            Some(i) if self.standard[i].is_some() => Err(value),
            Some(i) => {
                self.standard[i] = Some(value);
                Ok(())
            }
            None if self.extension.iter().any(|(m, _)| &**m == method) => Err(value),
            None => {
                self.extension.push((method.into(), value));
                Ok(())
            }
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.standard.iter().all(Option::is_none) && self.extension.is_empty()
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &V> {
        self.standard
            .iter()
            .flatten()
            .chain(self.extension.iter().map(|(_, v)| v))
    }
}

impl<V> Default for MethodTable<V> {
    fn default() -> Self {
        Self {
            standard: Default::default(),
            extension: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_slots() {
        for (i, m) in STANDARD_METHODS.iter().enumerate() {
            assert_eq!(slot(m), Some(i));
        }
        assert_eq!(slot("PURGE"), None);
        assert_eq!(slot("get"), None);
        assert_eq!(slot("GETX"), None);
        assert_eq!(slot(""), None);
    }

    #[test]
    fn rejects_duplicates() {
        let mut table = MethodTable::default();
        assert!(table.insert("GET", 1).is_ok());
        assert_eq!(table.insert("GET", 2), Err(2));
        assert!(table.insert("PURGE", 3).is_ok());
        assert_eq!(table.insert("PURGE", 4), Err(4));

        assert_eq!(table.get("GET"), Some(&1));
        assert_eq!(table.get("PURGE"), Some(&3));
        assert_eq!(table.get("POST"), None);
        assert_eq!(table.values().count(), 2);
    }
}
