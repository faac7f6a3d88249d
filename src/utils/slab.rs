//! Index arena for task records.
//!
//! Keys stay valid until the entry is removed, so the ring can link tasks by
//! key instead of by pointer. Freed slots are reused last-in first-out.

pub(crate) struct Slab<T> {
    entries: Vec<Option<T>>,
    free: Vec<usize>,
    len: usize,
}

impl<T> Slab<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            free: Vec::new(),
            len: 0,
        }
    }

    pub(crate) fn insert(&mut self, item: T) -> usize {
        let key = match self.free.pop() {
            Some(key) => {
                self.entries[key] = Some(item);
                key
            }
            None => {
                self.entries.push(Some(item));
                self.entries.len() - 1
            }
        };

        self.len += 1;

        key
    }

    pub(crate) fn remove(&mut self, key: usize) -> Option<T> {
        let item = self.entries.get_mut(key)?.take()?;

        self.free.push(key);
        self.len -= 1;

        Some(item)
    }

    pub(crate) fn get(&self, key: usize) -> Option<&T> {
        self.entries.get(key)?.as_ref()
    }

    pub(crate) fn get_mut(&mut self, key: usize) -> Option<&mut T> {
        self.entries.get_mut(key)?.as_mut()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(key, slot)| slot.as_ref().map(|item| (key, item)))
    }
}

#[cfg(test)]
mod tests {
    use super::Slab;

    #[test]
    fn reuses_freed_keys() {
        let mut slab = Slab::with_capacity(2);
        let a = slab.insert("a");
        let b = slab.insert("b");

        assert_eq!(slab.remove(a), Some("a"));
        assert_eq!(slab.len(), 1);

        let c = slab.insert("c");
        assert_eq!(c, a);
        assert_eq!(slab.get(c), Some(&"c"));
        assert_eq!(slab.get(b), Some(&"b"));
    }

    #[test]
    fn remove_twice_is_none() {
        let mut slab = Slab::with_capacity(1);
        let key = slab.insert(7);

        assert_eq!(slab.remove(key), Some(7));
        assert_eq!(slab.remove(key), None);
        assert!(slab.get(key).is_none());
        assert_eq!(slab.len(), 0);
    }

    #[test]
    fn iter_skips_free_slots() {
        let mut slab = Slab::with_capacity(4);
        let keys: Vec<_> = (0..4).map(|n| slab.insert(n)).collect();
        slab.remove(keys[1]);

        let seen: Vec<_> = slab.iter().map(|(_, n)| *n).collect();
        assert_eq!(seen, vec![0, 2, 3]);
    }
}
