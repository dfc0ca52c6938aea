//! # Template Service
//!
//! Structural operations on templates, pages and elements. Every mutation
//! checks the manage capability on the template's context first, runs
//! inside a store transaction, and only then hands its events to the sink:
//!
//! ```text
//!   require_manage ──► Store::transaction ──► commit ──► EventSink::deliver
//!                            │ Err
//!                            └──► rolled back, no events
//! ```
//!
//! Sibling sequences stay dense: additions append, moves swap with the
//! neighbour, deletions renumber what is left.

pub mod document;

use chrono::Utc;
use serde::Serialize;

pub use document::TemplateDocument;

use crate::config::EngineConfig;
use crate::context::{IdMapping, SecurityContext};
use crate::element::form::{self, FormData, FormField};
use crate::element::{ElementRegistry, ElementType};
use crate::error::{ParchmentError, Result, ValidationErrors};
use crate::font::FontContext;
use crate::model::{ElementRecord, Id, Page, PageSettings, Template};
use crate::sequence::{self, Direction, Sequenced};
use crate::store::Store;

/// Something that changed, delivered after the change is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum TemplateEvent {
    TemplateCreated { template_id: Id },
    TemplateUpdated { template_id: Id },
    TemplateDeleted { template_id: Id },
    PageCreated { template_id: Id, page_id: Id },
    PageUpdated { template_id: Id, page_id: Id },
    PageDeleted { template_id: Id, page_id: Id },
    ElementCreated { page_id: Id, element_id: Id },
    ElementUpdated { page_id: Id, element_id: Id },
    ElementDeleted { page_id: Id, element_id: Id },
}

pub trait EventSink {
    fn deliver(&mut self, event: TemplateEvent);
}

impl EventSink for Vec<TemplateEvent> {
    fn deliver(&mut self, event: TemplateEvent) {
        self.push(event);
    }
}

/// A page or element, with the parent the caller believes it has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemRef {
    Page { template_id: Id, page_id: Id },
    Element { page_id: Id, element_id: Id },
}

pub struct TemplateService<S: Store, E: EventSink = Vec<TemplateEvent>> {
    store: S,
    registry: ElementRegistry,
    security: Box<dyn SecurityContext>,
    config: EngineConfig,
    fonts: FontContext,
    events: E,
}

impl<S: Store> TemplateService<S, Vec<TemplateEvent>> {
    pub fn new(store: S, registry: ElementRegistry, security: Box<dyn SecurityContext>, config: EngineConfig) -> Self {
        Self::with_sink(store, registry, security, config, Vec::new())
    }

    /// Delivered events so far, oldest first. Clears the buffer.
    pub fn take_events(&mut self) -> Vec<TemplateEvent> {
        std::mem::take(&mut self.events)
    }
}

impl<S: Store, E: EventSink> TemplateService<S, E> {
    pub fn with_sink(
        store: S,
        registry: ElementRegistry,
        security: Box<dyn SecurityContext>,
        config: EngineConfig,
        events: E,
    ) -> Self {
        Self {
            store,
            registry,
            security,
            config,
            fonts: FontContext::new(),
            events,
        }
    }

    /// Use a font context with custom fonts registered.
    pub fn with_fonts(mut self, fonts: FontContext) -> Self {
        self.fonts = fonts;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &ElementRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn fonts(&self) -> &FontContext {
        &self.fonts
    }

    pub fn sink(&self) -> &E {
        &self.events
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Run `f` in a transaction and deliver the events it queued once the
    /// transaction has committed.
    fn commit<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut S, &mut Vec<TemplateEvent>) -> Result<T>,
    {
        let mut pending = Vec::new();
        let value = self.store.transaction(|store| f(store, &mut pending))?;
        for event in pending {
            self.events.deliver(event);
        }
        Ok(value)
    }

    fn require_manage_template(&self, template_id: Id) -> Result<Template> {
        let template = self.store.template(template_id)?;
        self.security.require_manage(template.context_id)?;
        Ok(template)
    }

    fn require_manage_page(&self, page_id: Id) -> Result<Page> {
        let page = self.store.page(page_id)?;
        self.require_manage_template(page.template_id)?;
        Ok(page)
    }

    // Templates

    pub fn create_template(&mut self, name: &str, context_id: Id) -> Result<Id> {
        self.security.require_manage(context_id)?;
        let name = required_name(name)?;
        self.commit(|store, events| {
            let template_id = store.insert_template(Template::new(&name, context_id))?;
            events.push(TemplateEvent::TemplateCreated { template_id });
            Ok(template_id)
        })
    }

    pub fn rename_template(&mut self, template_id: Id, name: &str) -> Result<()> {
        let mut template = self.require_manage_template(template_id)?;
        template.name = required_name(name)?;
        template.time_modified = Utc::now();
        self.commit(|store, events| {
            store.update_template(&template)?;
            events.push(TemplateEvent::TemplateUpdated { template_id });
            Ok(())
        })
    }

    /// Delete a template with all its pages and elements.
    pub fn delete_template(&mut self, template_id: Id) -> Result<()> {
        self.require_manage_template(template_id)?;
        self.commit(|store, events| {
            for page in store.pages(template_id) {
                delete_page_rows(store, &page, events)?;
            }
            store.delete_template(template_id)?;
            events.push(TemplateEvent::TemplateDeleted { template_id });
            log::debug!("deleted template {}", template_id);
            Ok(())
        })
    }

    /// Copy a template, its pages and its elements into a new template in
    /// the same context.
    pub fn duplicate_template(&mut self, template_id: Id, name: Option<&str>) -> Result<Id> {
        let source = self.require_manage_template(template_id)?;
        let name = match name {
            Some(name) => required_name(name)?,
            None => source.name.clone(),
        };
        self.commit(|store, events| {
            let copy_id = store.insert_template(Template::new(&name, source.context_id))?;
            events.push(TemplateEvent::TemplateCreated { template_id: copy_id });
            copy_pages(store, template_id, copy_id, events)?;
            Ok(copy_id)
        })
    }

    /// Replace everything on `target_id` with copies of the pages and
    /// elements of `source_id`. The target keeps its name and context.
    pub fn replace_contents(&mut self, target_id: Id, source_id: Id) -> Result<()> {
        self.require_manage_template(target_id)?;
        self.store.template(source_id)?;
        if target_id == source_id {
            return Ok(());
        }
        self.commit(|store, events| {
            for page in store.pages(target_id) {
                delete_page_rows(store, &page, events)?;
            }
            copy_pages(store, source_id, target_id, events)?;
            let mut target = store.template(target_id)?;
            target.time_modified = Utc::now();
            store.update_template(&target)?;
            events.push(TemplateEvent::TemplateUpdated { template_id: target_id });
            Ok(())
        })
    }

    /// Import a template document as a new template.
    pub fn import_document(&mut self, document: &TemplateDocument) -> Result<Id> {
        self.security.require_manage(document.context_id)?;
        required_name(&document.name)?;
        document.check(&self.registry)?;
        self.commit(|store, events| {
            let inserted = document.insert_into(store)?;
            let template_id = inserted.template_id;
            events.push(TemplateEvent::TemplateCreated { template_id });
            for page_id in inserted.pages {
                events.push(TemplateEvent::PageCreated { template_id, page_id });
            }
            for (page_id, element_id) in inserted.elements {
                events.push(TemplateEvent::ElementCreated { page_id, element_id });
            }
            Ok(template_id)
        })
    }

    pub fn export_document(&self, template_id: Id) -> Result<TemplateDocument> {
        TemplateDocument::export(&self.store, template_id)
    }

    /// Rewrite payloads that reference ids changed by a restore. Returns
    /// how many elements changed.
    pub fn after_restore(&mut self, template_id: Id, mapping: &dyn IdMapping) -> Result<usize> {
        self.require_manage_template(template_id)?;
        let mut updates = Vec::new();
        for page in self.store.pages(template_id) {
            for record in self.store.elements(page.id) {
                let element = self.registry.create(record)?;
                let Some(restorable) = element.as_restorable() else {
                    continue;
                };
                if let Some(data) = restorable.after_restore(mapping)? {
                    let mut record = element.record().clone();
                    record.data = Some(data);
                    record.time_modified = Utc::now();
                    updates.push(record);
                }
            }
        }
        let count = updates.len();
        self.commit(|store, events| {
            for record in &updates {
                store.update_element(record)?;
                events.push(TemplateEvent::ElementUpdated {
                    page_id: record.page_id,
                    element_id: record.id,
                });
            }
            Ok(())
        })?;
        Ok(count)
    }

    // Pages

    /// Append a page with the configured default size.
    pub fn add_page(&mut self, template_id: Id) -> Result<Id> {
        self.require_manage_template(template_id)?;
        let settings = self.config.default_page;
        self.commit(|store, events| {
            let mut page = Page::new(template_id, settings);
            page.sequence = sequence::next_sequence(&store.pages(template_id));
            let page_id = store.insert_page(page)?;
            events.push(TemplateEvent::PageCreated { template_id, page_id });
            Ok(page_id)
        })
    }

    pub fn update_page(&mut self, page_id: Id, settings: PageSettings) -> Result<()> {
        let mut page = self.require_manage_page(page_id)?;
        validate_page(&settings).into_result()?;
        page.width = settings.width;
        page.height = settings.height;
        page.left_margin = settings.left_margin;
        page.right_margin = settings.right_margin;
        page.time_modified = Utc::now();
        self.commit(|store, events| {
            store.update_page(&page)?;
            events.push(TemplateEvent::PageUpdated {
                template_id: page.template_id,
                page_id,
            });
            Ok(())
        })
    }

    /// Delete a page and its elements, then renumber the remaining pages.
    pub fn delete_page(&mut self, template_id: Id, page_id: Id) -> Result<()> {
        let page = self.require_manage_page(page_id)?;
        if page.template_id != template_id {
            return Err(ParchmentError::Structure(format!(
                "page {} does not belong to template {}",
                page_id, template_id
            )));
        }
        self.commit(|store, events| {
            delete_page_rows(store, &page, events)?;
            for changed in sequence::resequence(&store.pages(template_id)) {
                store.update_page(&changed)?;
                events.push(TemplateEvent::PageUpdated {
                    template_id,
                    page_id: changed.id,
                });
            }
            Ok(())
        })
    }

    // Elements

    /// Validate a submission and add a new element of type `tag` to the
    /// end of the page.
    pub fn add_element(&mut self, page_id: Id, tag: &str, submission: &FormData) -> Result<Id> {
        self.require_manage_page(page_id)?;
        let mut record = ElementRecord::new(page_id, tag, "");
        record.font = self.config.default_font.clone();
        record.font_size = self.config.default_font_size;
        record.colour = self.config.default_colour.clone();
        record.refpoint = self.config.default_refpoint;

        let mut element = self.registry.create(record)?;
        if !submission.contains("name") {
            return Err(ValidationErrors::single("name", "Required").into());
        }
        apply_submission(element.as_mut(), submission)?;
        let record = element.record().clone();

        self.commit(|store, events| {
            let mut record = record;
            record.sequence = sequence::next_sequence(&store.elements(page_id));
            let element_id = store.insert_element(record)?;
            events.push(TemplateEvent::ElementCreated { page_id, element_id });
            Ok(element_id)
        })
    }

    /// Validate a submission and apply it to an existing element.
    pub fn update_element(&mut self, element_id: Id, submission: &FormData) -> Result<()> {
        let record = self.store.element(element_id)?;
        self.require_manage_page(record.page_id)?;
        let mut element = self.registry.create(record)?;
        apply_submission(element.as_mut(), submission)?;
        let mut record = element.record().clone();
        record.time_modified = Utc::now();

        self.commit(|store, events| {
            store.update_element(&record)?;
            events.push(TemplateEvent::ElementUpdated {
                page_id: record.page_id,
                element_id,
            });
            Ok(())
        })
    }

    /// Delete an element and renumber the rest of its page.
    pub fn delete_element(&mut self, page_id: Id, element_id: Id) -> Result<()> {
        let record = self.store.element(element_id)?;
        if record.page_id != page_id {
            return Err(ParchmentError::Structure(format!(
                "element {} does not belong to page {}",
                element_id, page_id
            )));
        }
        self.require_manage_page(page_id)?;
        self.commit(|store, events| {
            store.delete_element(element_id)?;
            events.push(TemplateEvent::ElementDeleted { page_id, element_id });
            for changed in sequence::resequence(&store.elements(page_id)) {
                store.update_element(&changed)?;
                events.push(TemplateEvent::ElementUpdated {
                    page_id,
                    element_id: changed.id,
                });
            }
            Ok(())
        })
    }

    /// The edit form for an element and its current values.
    pub fn edit_form(&self, element_id: Id) -> Result<(Vec<FormField>, FormData)> {
        let record = self.store.element(element_id)?;
        let element = self.registry.create(record)?;
        Ok((
            form::build_form(element.as_ref(), &self.fonts),
            form::prepare_form(element.as_ref()),
        ))
    }

    // Ordering

    /// Swap a page or element with its neighbour. Returns `false` when the
    /// item is already at that end.
    pub fn move_item(&mut self, item: ItemRef, direction: Direction) -> Result<bool> {
        match item {
            ItemRef::Page { template_id, page_id } => {
                let page = self.require_manage_page(page_id)?;
                if page.template_id != template_id {
                    return Err(ParchmentError::Structure(format!(
                        "page {} does not belong to template {}",
                        page_id, template_id
                    )));
                }
                self.commit(|store, events| {
                    let siblings = store.pages(template_id);
                    let Some((a, b)) = swapped(&siblings, &page, direction) else {
                        return Ok(false);
                    };
                    for p in [a, b] {
                        store.update_page(&p)?;
                        events.push(TemplateEvent::PageUpdated {
                            template_id,
                            page_id: p.id,
                        });
                    }
                    Ok(true)
                })
            }
            ItemRef::Element { page_id, element_id } => {
                let record = self.store.element(element_id)?;
                if record.page_id != page_id {
                    return Err(ParchmentError::Structure(format!(
                        "element {} does not belong to page {}",
                        element_id, page_id
                    )));
                }
                self.require_manage_page(page_id)?;
                self.commit(|store, events| {
                    let siblings = store.elements(page_id);
                    let Some((a, b)) = swapped(&siblings, &record, direction) else {
                        return Ok(false);
                    };
                    for e in [a, b] {
                        store.update_element(&e)?;
                        events.push(TemplateEvent::ElementUpdated {
                            page_id,
                            element_id: e.id,
                        });
                    }
                    Ok(true)
                })
            }
        }
    }
}

fn required_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationErrors::single("name", "Required").into());
    }
    Ok(name.to_string())
}

pub(crate) fn validate_page(settings: &PageSettings) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if !(settings.width > 0.0) {
        errors.add("width", "Must be greater than 0");
    }
    if !(settings.height > 0.0) {
        errors.add("height", "Must be greater than 0");
    }
    if settings.left_margin < 0.0 {
        errors.add("leftmargin", "Must be at least 0");
    }
    if settings.right_margin < 0.0 {
        errors.add("rightmargin", "Must be at least 0");
    }
    errors
}

/// Validate a submission against the element and apply it: common fields
/// onto the record, then the type's payload.
fn apply_submission(element: &mut dyn ElementType, submission: &FormData) -> Result<()> {
    form::validate(element, submission).into_result()?;
    let fields = element.common_fields();
    form::apply_common(element.record_mut(), submission, fields)?;
    let data = match element.as_persistable() {
        Some(persistable) => Some(persistable.normalise_data(submission)?),
        None => None,
    };
    if let Some(data) = data {
        element.record_mut().data = data;
    }
    Ok(())
}

/// The item and its neighbour with their sequences exchanged.
fn swapped<T: Sequenced + Clone>(siblings: &[T], item: &T, direction: Direction) -> Option<(T, T)> {
    let other = sequence::find_swap(siblings, item, direction)?;
    let (mut a, mut b) = (item.clone(), other.clone());
    let (sa, sb) = (a.sequence(), b.sequence());
    a.set_sequence(sb);
    b.set_sequence(sa);
    Some((a, b))
}

fn delete_page_rows<S: Store + ?Sized>(store: &mut S, page: &Page, events: &mut Vec<TemplateEvent>) -> Result<()> {
    for element in store.elements(page.id) {
        store.delete_element(element.id)?;
        events.push(TemplateEvent::ElementDeleted {
            page_id: page.id,
            element_id: element.id,
        });
    }
    store.delete_page(page.id)?;
    events.push(TemplateEvent::PageDeleted {
        template_id: page.template_id,
        page_id: page.id,
    });
    Ok(())
}

fn copy_pages<S: Store + ?Sized>(store: &mut S, from: Id, to: Id, events: &mut Vec<TemplateEvent>) -> Result<()> {
    let now = Utc::now();
    for page in store.pages(from) {
        let mut copy = page.clone();
        copy.id = 0;
        copy.template_id = to;
        copy.time_created = now;
        copy.time_modified = now;
        let page_id = store.insert_page(copy)?;
        events.push(TemplateEvent::PageCreated { template_id: to, page_id });

        for element in store.elements(page.id) {
            let mut copy = element.clone();
            copy.id = 0;
            copy.page_id = page_id;
            copy.time_created = now;
            copy.time_modified = now;
            let element_id = store.insert_element(copy)?;
            events.push(TemplateEvent::ElementCreated { page_id, element_id });
        }
    }
    Ok(())
}
