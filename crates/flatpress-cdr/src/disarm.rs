//! # Structural PDF disarm
//!
//! The structural half of Content Disarm & Reconstruction: one pass over
//! the PDF tree that removes every construct addressable from the
//! catalog's standard entry points which could carry executable behavior.
//!
//! > **"Don't detect the bomb. Rebuild without one."**
//!
//! Nothing here inspects payloads. Whether an `/OpenAction` launches
//! calculator.exe or legitimate print dialogs is irrelevant — the entry is
//! removed either way. Novel obfuscation has nothing to hide behind when
//! the slot it hides in no longer exists.
//!
//! ## What gets removed
//!
//! | Entry | Location | Carries |
//! |-------|----------|---------|
//! | `/Annots` | each page | links, forms, launch actions |
//! | `/AA` | each page | automatic (open/close) actions |
//! | `/A` | each page | explicit actions |
//! | `/Names/JavaScript` | catalog | document-level scripts |
//! | `/Names/EmbeddedFiles` | catalog | attached payloads |
//! | `/OpenAction` | catalog | code executed on open |
//! | `/Info` | trailer | original metadata (replaced wholesale) |
//!
//! Absent entries are a no-op, never an error, which makes the pass
//! idempotent: disarming a disarmed document removes nothing (only the
//! synthetic `CreationDate` differs between runs).
//!
//! The structural pass is belt-and-braces. The pixel reconstruction that
//! follows it in the worker pipeline is the disarm of record; this pass
//! exists so that even the intermediate artifact handed to the rasterizer
//! carries no live content.

use std::path::Path;

use chrono::Utc;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use tracing::debug;

use crate::error::Result;

/// What a disarm pass actually removed.
///
/// All-false means the document was already inert (or already disarmed).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisarmSummary {
    /// Pages that carried an `/Annots` array.
    pub annotated_pages: usize,
    /// Pages that carried `/AA` or `/A` actions.
    pub action_pages: usize,
    /// Catalog had a `/Names/JavaScript` subtree.
    pub javascript: bool,
    /// Catalog had a `/Names/EmbeddedFiles` subtree.
    pub embedded_files: bool,
    /// Catalog had an `/OpenAction`.
    pub open_action: bool,
}

impl DisarmSummary {
    /// True if the pass removed anything at all.
    pub fn removed_anything(&self) -> bool {
        self.annotated_pages > 0
            || self.action_pages > 0
            || self.javascript
            || self.embedded_files
            || self.open_action
    }
}

/// Disarm a loaded PDF tree in place.
pub fn disarm_document(doc: &mut Document) -> Result<DisarmSummary> {
    let mut summary = DisarmSummary::default();

    // Page-level: annotations and actions.
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    for page_id in page_ids {
        if let Ok(page) = doc.get_dictionary_mut(page_id) {
            if page.remove(b"Annots").is_some() {
                summary.annotated_pages += 1;
            }
            let had_aa = page.remove(b"AA").is_some();
            let had_a = page.remove(b"A").is_some();
            if had_aa || had_a {
                summary.action_pages += 1;
            }
        }
    }

    // Catalog-level: name trees and the open action.
    let root_id = doc.trailer.get(b"Root")?.as_reference()?;
    strip_name_trees(doc, root_id, &mut summary)?;

    let catalog = doc.get_dictionary_mut(root_id)?;
    summary.open_action = catalog.remove(b"OpenAction").is_some();

    // Original metadata is dropped wholesale, never edited.
    let info_id = doc.add_object(synthetic_info());
    doc.trailer.set("Info", info_id);

    debug!(?summary, "structural disarm complete");
    Ok(summary)
}

/// Disarm `input` and write the result to `output`.
pub fn disarm_file(input: &Path, output: &Path) -> Result<DisarmSummary> {
    let mut doc = Document::load(input)?;
    let summary = disarm_document(&mut doc)?;
    doc.save(output)?;
    Ok(summary)
}

/// Remove `/JavaScript` and `/EmbeddedFiles` from the catalog's name tree,
/// whether `/Names` is stored inline or as an indirect reference.
fn strip_name_trees(doc: &mut Document, root_id: ObjectId, summary: &mut DisarmSummary) -> Result<()> {
    enum NamesSlot {
        Absent,
        Inline,
        Indirect(ObjectId),
    }

    let slot = {
        let catalog = doc.get_dictionary(root_id)?;
        match catalog.get(b"Names") {
            Ok(Object::Reference(id)) => NamesSlot::Indirect(*id),
            Ok(Object::Dictionary(_)) => NamesSlot::Inline,
            _ => NamesSlot::Absent,
        }
    };

    let names = match slot {
        NamesSlot::Absent => return Ok(()),
        NamesSlot::Indirect(id) => match doc.get_dictionary_mut(id) {
            Ok(names) => names,
            Err(_) => return Ok(()),
        },
        NamesSlot::Inline => {
            let catalog = doc.get_dictionary_mut(root_id)?;
            match catalog.get_mut(b"Names").and_then(Object::as_dict_mut) {
                Ok(names) => names,
                Err(_) => return Ok(()),
            }
        }
    };

    summary.javascript = names.remove(b"JavaScript").is_some();
    summary.embedded_files = names.remove(b"EmbeddedFiles").is_some();
    Ok(())
}

/// The fixed information dictionary every sanitized artifact carries.
pub(crate) fn synthetic_info() -> Dictionary {
    dictionary! {
        "Title" => Object::string_literal("Sanitized Document"),
        "Creator" => Object::string_literal("Flatpress Sanitization Pipeline"),
        "Producer" => Object::string_literal("Flatpress"),
        "CreationDate" => Object::string_literal(
            format!("D:{}", Utc::now().format("%Y%m%d%H%M%S"))
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A document with every construct the pass must remove: an annotated
    /// page with actions, catalog JavaScript and embedded-file name trees,
    /// and an OpenAction.
    fn armed_document() -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let action = doc.add_object(dictionary! {
            "S" => "JavaScript",
            "JS" => Object::string_literal("app.alert('armed')"),
        });
        let annot = doc.add_object(dictionary! {
            "Subtype" => "Link",
            "A" => action,
        });
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
            "Annots" => vec![Object::Reference(annot)],
            "AA" => dictionary! { "O" => action },
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => Object::Integer(1),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
            "OpenAction" => action,
            "Names" => dictionary! {
                "JavaScript" => Dictionary::new(),
                "EmbeddedFiles" => Dictionary::new(),
            },
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    fn catalog_of(doc: &Document) -> &Dictionary {
        let root_id = doc.trailer.get(b"Root").unwrap().as_reference().unwrap();
        doc.get_dictionary(root_id).unwrap()
    }

    #[test]
    fn test_disarm_removes_every_armed_entry() {
        let mut doc = armed_document();
        let summary = disarm_document(&mut doc).unwrap();

        assert_eq!(summary.annotated_pages, 1);
        assert_eq!(summary.action_pages, 1);
        assert!(summary.javascript);
        assert!(summary.embedded_files);
        assert!(summary.open_action);

        let catalog = catalog_of(&doc);
        assert!(!catalog.has(b"OpenAction"));
        let names = catalog.get(b"Names").unwrap().as_dict().unwrap();
        assert!(!names.has(b"JavaScript"));
        assert!(!names.has(b"EmbeddedFiles"));

        for (_, page_id) in doc.get_pages() {
            let page = doc.get_dictionary(page_id).unwrap();
            assert!(!page.has(b"Annots"));
            assert!(!page.has(b"AA"));
            assert!(!page.has(b"A"));
        }
    }

    #[test]
    fn test_disarm_is_idempotent() {
        let mut doc = armed_document();
        disarm_document(&mut doc).unwrap();
        let second = disarm_document(&mut doc).unwrap();
        assert!(!second.removed_anything());
    }

    #[test]
    fn test_inert_document_is_a_noop() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => Object::Integer(1),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let summary = disarm_document(&mut doc).unwrap();
        assert!(!summary.removed_anything());
    }

    #[test]
    fn test_indirect_names_tree_is_stripped() {
        let mut doc = armed_document();
        // Rewrite the catalog to hold /Names by reference instead of inline.
        let root_id = doc.trailer.get(b"Root").unwrap().as_reference().unwrap();
        let names_id = doc.add_object(dictionary! {
            "JavaScript" => Dictionary::new(),
        });
        doc.get_dictionary_mut(root_id)
            .unwrap()
            .set("Names", Object::Reference(names_id));

        let summary = disarm_document(&mut doc).unwrap();
        assert!(summary.javascript);
        assert!(!summary.embedded_files);

        let names = doc.get_dictionary(names_id).unwrap();
        assert!(!names.has(b"JavaScript"));
    }

    #[test]
    fn test_original_metadata_is_replaced() {
        let mut doc = armed_document();
        let old_info = doc.add_object(dictionary! {
            "Author" => Object::string_literal("mallory"),
        });
        doc.trailer.set("Info", old_info);

        disarm_document(&mut doc).unwrap();

        let info_id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        let info = doc.get_dictionary(info_id).unwrap();
        assert!(!info.has(b"Author"));
        assert_eq!(
            info.get(b"Title").unwrap().as_str().unwrap(),
            b"Sanitized Document"
        );
        assert!(info.has(b"CreationDate"));
    }

    #[test]
    fn test_disarm_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let armed = dir.path().join("armed.pdf");
        let clean = dir.path().join("clean.pdf");
        armed_document().save(&armed).unwrap();

        let summary = disarm_file(&armed, &clean).unwrap();
        assert!(summary.removed_anything());

        let reloaded = Document::load(&clean).unwrap();
        let catalog = catalog_of(&reloaded);
        assert!(!catalog.has(b"OpenAction"));
        assert_eq!(reloaded.get_pages().len(), 1);
    }
}
