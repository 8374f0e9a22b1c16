//! Intrusive instruction list.
//!
//! Links live inside the pooled [`Inst`] nodes, so inserting or unlinking is
//! O(1) and never moves a node. Callers must pass handles that belong to
//! `pool`; [`Block`](super::Block) validates them before calling in here.

use super::inst::{Inst, InstRef};
use crate::core::pool::Pool;

#[derive(Debug, Default)]
pub(crate) struct InstList {
    head: Option<InstRef>,
    tail: Option<InstRef>,
    len: usize,
}

impl InstList {
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn head(&self) -> Option<InstRef> {
        self.head
    }

    pub(crate) fn tail(&self) -> Option<InstRef> {
        self.tail
    }

    /// Link `new` immediately before `at`, or at the end when `at` is `None`.
    pub(crate) fn insert_before(&mut self, pool: &mut Pool<Inst>, at: Option<InstRef>, new: InstRef) {
        let prev = match at {
            Some(at) => node(pool, at).prev,
            None => self.tail,
        };

        {
            let inst = node_mut(pool, new);
            inst.prev = prev;
            inst.next = at;
            inst.linked = true;
        }

        match prev {
            Some(prev) => node_mut(pool, prev).next = Some(new),
            None => self.head = Some(new),
        }
        match at {
            Some(at) => node_mut(pool, at).prev = Some(new),
            None => self.tail = Some(new),
        }

        self.len += 1;
    }

    /// Remove `inst` from the list; its storage stays in the pool.
    pub(crate) fn unlink(&mut self, pool: &mut Pool<Inst>, inst: InstRef) {
        let (prev, next) = {
            let node = node_mut(pool, inst);
            let links = (node.prev, node.next);
            node.prev = None;
            node.next = None;
            node.linked = false;
            links
        };

        match prev {
            Some(prev) => node_mut(pool, prev).next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => node_mut(pool, next).prev = prev,
            None => self.tail = prev,
        }

        self.len -= 1;
    }

    pub(crate) fn iter<'a>(&self, pool: &'a Pool<Inst>) -> Iter<'a> {
        Iter {
            pool,
            cursor: self.head,
            remaining: self.len,
        }
    }
}

fn node(pool: &Pool<Inst>, inst: InstRef) -> &Inst {
    pool.get(inst.0)
        .unwrap_or_else(|| panic!("instruction {inst} is not owned by this list's pool"))
}

fn node_mut(pool: &mut Pool<Inst>, inst: InstRef) -> &mut Inst {
    pool.get_mut(inst.0)
        .unwrap_or_else(|| panic!("instruction {inst} is not owned by this list's pool"))
}

/// Program-order iterator over a block's instructions.
pub struct Iter<'a> {
    pool: &'a Pool<Inst>,
    cursor: Option<InstRef>,
    remaining: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (InstRef, &'a Inst);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.cursor?;
        let inst = node(self.pool, current);
        self.cursor = inst.next;
        self.remaining -= 1;
        Some((current, inst))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Opcode;

    fn alloc(pool: &mut Pool<Inst>) -> InstRef {
        InstRef(pool.alloc(Inst::new(Opcode::Breakpoint)))
    }

    fn order(list: &InstList, pool: &Pool<Inst>) -> Vec<InstRef> {
        list.iter(pool).map(|(r, _)| r).collect()
    }

    #[test]
    fn test_append_and_insert_before() {
        let mut pool = Pool::new();
        let mut list = InstList::default();
        let (a, b, c, d) = (alloc(&mut pool), alloc(&mut pool), alloc(&mut pool), alloc(&mut pool));

        list.insert_before(&mut pool, None, a);
        list.insert_before(&mut pool, None, b);
        list.insert_before(&mut pool, None, c);
        list.insert_before(&mut pool, Some(b), d);

        assert_eq!(order(&list, &pool), vec![a, d, b, c]);
        assert_eq!(list.len(), 4);
        assert_eq!(list.head(), Some(a));
        assert_eq!(list.tail(), Some(c));
    }

    #[test]
    fn test_insert_at_head() {
        let mut pool = Pool::new();
        let mut list = InstList::default();
        let (a, b) = (alloc(&mut pool), alloc(&mut pool));

        list.insert_before(&mut pool, None, a);
        list.insert_before(&mut pool, Some(a), b);

        assert_eq!(order(&list, &pool), vec![b, a]);
        assert_eq!(list.head(), Some(b));
    }

    #[test]
    fn test_unlink() {
        let mut pool = Pool::new();
        let mut list = InstList::default();
        let (a, b, c) = (alloc(&mut pool), alloc(&mut pool), alloc(&mut pool));
        for inst in [a, b, c] {
            list.insert_before(&mut pool, None, inst);
        }

        list.unlink(&mut pool, b);
        assert_eq!(order(&list, &pool), vec![a, c]);
        assert!(!pool.get(b.0).unwrap().linked);

        list.unlink(&mut pool, a);
        list.unlink(&mut pool, c);
        assert_eq!(list.len(), 0);
        assert_eq!(list.head(), None);
        assert_eq!(list.tail(), None);
    }
}
