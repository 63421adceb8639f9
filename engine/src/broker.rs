use std::ops::Deref;

pub struct Ref<'a, T> {
    entry: &'a mut Option<T>,
}

impl<T> Deref for Ref<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &*self.entry {
            Some(value) => value,
            None => unreachable!("Ref is created only for occupied entries"),
        }
    }
}

impl<T> Ref<'_, T> {
    /// Takes event out of the broker so other readers won't see it.
    pub fn consume(self) -> T {
        match self.entry.take() {
            Some(value) => value,
            None => unreachable!("Ref is created only for occupied entries"),
        }
    }
}

pub struct Iter<'a, T> {
    entries: std::slice::IterMut<'a, Option<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = Ref<'a, T>;

    fn next(&mut self) -> Option<Ref<'a, T>> {
        loop {
            let entry = self.entries.next()?;
            if entry.is_some() {
                return Some(Ref { entry });
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.entries.size_hint().1)
    }
}

/// Distributes events of type `T` among readers.
///
/// Events older than the last [`EventBroker::mark`] are dropped by
/// [`EventBroker::expire`]. Events added after the mark survive it.
pub struct EventBroker<T> {
    pool: Vec<Option<T>>,
    marked: usize,
}

impl<T> EventBroker<T> {
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        EventBroker {
            pool: Vec::with_capacity(capacity),
            marked: 0,
        }
    }

    pub fn read(&mut self) -> Iter<'_, T> {
        Iter {
            entries: self.pool.iter_mut(),
        }
    }

    pub fn add(&mut self, event: T) {
        self.pool.push(Some(event));
    }

    /// Marks all current events as delivered.
    pub fn mark(&mut self) {
        self.marked = self.pool.len();
    }

    /// Drops events delivered before the last mark.
    pub fn expire(&mut self) {
        self.pool.drain(..self.marked);
        self.marked = 0;
    }

    pub fn clear(&mut self) {
        self.pool.clear();
        self.marked = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.pool.iter().all(Option::is_none)
    }
}

impl<T> Default for EventBroker<T> {
    fn default() -> Self {
        Self::new()
    }
}
