//! # Persistence
//!
//! The `Store` trait is the persistence collaborator: plain record CRUD
//! plus listing by parent in sequence order. `MemoryStore` is the
//! in-memory implementation used by the CLI and tests.
//!
//! Multi-row structural operations run inside [`Store::transaction`]. A
//! transaction that returns `Err` leaves the store exactly as it was.

use std::collections::BTreeMap;

use crate::error::{ParchmentError, Result};
use crate::model::{ElementRecord, Id, Page, Template};

pub trait Store {
    fn template(&self, id: Id) -> Result<Template>;
    fn templates(&self) -> Vec<Template>;
    /// Insert and return the assigned id.
    fn insert_template(&mut self, template: Template) -> Result<Id>;
    fn update_template(&mut self, template: &Template) -> Result<()>;
    /// Delete the template row only. Pages and elements are the caller's job.
    fn delete_template(&mut self, id: Id) -> Result<()>;

    fn page(&self, id: Id) -> Result<Page>;
    /// Pages of a template in ascending sequence order.
    fn pages(&self, template_id: Id) -> Vec<Page>;
    fn insert_page(&mut self, page: Page) -> Result<Id>;
    fn update_page(&mut self, page: &Page) -> Result<()>;
    fn delete_page(&mut self, id: Id) -> Result<()>;

    fn element(&self, id: Id) -> Result<ElementRecord>;
    /// Elements of a page in ascending sequence order.
    fn elements(&self, page_id: Id) -> Vec<ElementRecord>;
    fn insert_element(&mut self, element: ElementRecord) -> Result<Id>;
    fn update_element(&mut self, element: &ElementRecord) -> Result<()>;
    fn delete_element(&mut self, id: Id) -> Result<()>;

    /// Run `f` atomically. On `Err` every change made inside is undone.
    fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<T>;
}

/// Records in ordered maps, one id counter shared by every table.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    templates: BTreeMap<Id, Template>,
    pages: BTreeMap<Id, Page>,
    elements: BTreeMap<Id, ElementRecord>,
    next_id: Id,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }
}

fn sorted_by_sequence<T, K: Ord>(mut rows: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    rows.sort_by_key(key);
    rows
}

impl Store for MemoryStore {
    fn template(&self, id: Id) -> Result<Template> {
        self.templates
            .get(&id)
            .cloned()
            .ok_or_else(|| ParchmentError::not_found("template", id))
    }

    fn templates(&self) -> Vec<Template> {
        self.templates.values().cloned().collect()
    }

    fn insert_template(&mut self, mut template: Template) -> Result<Id> {
        let id = self.allocate();
        template.id = id;
        self.templates.insert(id, template);
        Ok(id)
    }

    fn update_template(&mut self, template: &Template) -> Result<()> {
        match self.templates.get_mut(&template.id) {
            Some(row) => {
                *row = template.clone();
                Ok(())
            }
            None => Err(ParchmentError::not_found("template", template.id)),
        }
    }

    fn delete_template(&mut self, id: Id) -> Result<()> {
        self.templates
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| ParchmentError::not_found("template", id))
    }

    fn page(&self, id: Id) -> Result<Page> {
        self.pages
            .get(&id)
            .cloned()
            .ok_or_else(|| ParchmentError::not_found("page", id))
    }

    fn pages(&self, template_id: Id) -> Vec<Page> {
        let rows: Vec<Page> = self
            .pages
            .values()
            .filter(|p| p.template_id == template_id)
            .cloned()
            .collect();
        sorted_by_sequence(rows, |p: &Page| (p.sequence, p.id))
    }

    fn insert_page(&mut self, mut page: Page) -> Result<Id> {
        if !self.templates.contains_key(&page.template_id) {
            return Err(ParchmentError::not_found("template", page.template_id));
        }
        let id = self.allocate();
        page.id = id;
        self.pages.insert(id, page);
        Ok(id)
    }

    fn update_page(&mut self, page: &Page) -> Result<()> {
        match self.pages.get_mut(&page.id) {
            Some(row) => {
                *row = page.clone();
                Ok(())
            }
            None => Err(ParchmentError::not_found("page", page.id)),
        }
    }

    fn delete_page(&mut self, id: Id) -> Result<()> {
        self.pages
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| ParchmentError::not_found("page", id))
    }

    fn element(&self, id: Id) -> Result<ElementRecord> {
        self.elements
            .get(&id)
            .cloned()
            .ok_or_else(|| ParchmentError::not_found("element", id))
    }

    fn elements(&self, page_id: Id) -> Vec<ElementRecord> {
        let rows: Vec<ElementRecord> = self
            .elements
            .values()
            .filter(|e| e.page_id == page_id)
            .cloned()
            .collect();
        sorted_by_sequence(rows, |e: &ElementRecord| (e.sequence, e.id))
    }

    fn insert_element(&mut self, mut element: ElementRecord) -> Result<Id> {
        if !self.pages.contains_key(&element.page_id) {
            return Err(ParchmentError::not_found("page", element.page_id));
        }
        let id = self.allocate();
        element.id = id;
        self.elements.insert(id, element);
        Ok(id)
    }

    fn update_element(&mut self, element: &ElementRecord) -> Result<()> {
        match self.elements.get_mut(&element.id) {
            Some(row) => {
                *row = element.clone();
                Ok(())
            }
            None => Err(ParchmentError::not_found("element", element.id)),
        }
    }

    fn delete_element(&mut self, id: Id) -> Result<()> {
        self.elements
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| ParchmentError::not_found("element", id))
    }

    fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let snapshot = self.clone();
        let result = f(self);
        if result.is_err() {
            log::debug!("transaction rolled back");
            *self = snapshot;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PageSettings;

    fn store_with_template() -> (MemoryStore, Id) {
        let mut store = MemoryStore::new();
        let id = store.insert_template(Template::new("Award", 1)).unwrap();
        (store, id)
    }

    #[test]
    fn test_pages_listed_in_sequence_order() {
        let (mut store, tid) = store_with_template();
        for sequence in [3, 1, 2] {
            let mut page = Page::new(tid, PageSettings::A4);
            page.sequence = sequence;
            store.insert_page(page).unwrap();
        }
        let seqs: Vec<u32> = store.pages(tid).iter().map(|p| p.sequence).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn test_insert_requires_parent() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            store.insert_page(Page::new(99, PageSettings::A4)),
            Err(ParchmentError::NotFound { kind: "template", id: 99 })
        ));
        assert!(store.insert_element(ElementRecord::new(5, "text", "T")).is_err());
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let (mut store, tid) = store_with_template();
        let result: Result<()> = store.transaction(|s| {
            s.insert_page(Page::new(tid, PageSettings::A4))?;
            s.delete_template(tid)?;
            Err(ParchmentError::Structure("abort".to_string()))
        });
        assert!(result.is_err());
        assert!(store.template(tid).is_ok());
        assert!(store.pages(tid).is_empty());
    }

    #[test]
    fn test_committed_transaction_keeps_changes() {
        let (mut store, tid) = store_with_template();
        let pid = store
            .transaction(|s| s.insert_page(Page::new(tid, PageSettings::A4)))
            .unwrap();
        assert_eq!(store.page(pid).unwrap().template_id, tid);
    }
}
