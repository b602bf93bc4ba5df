#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use pdf_chunk_translate::naming::{ChunkName, OutputKind};
use std::path::{Path, PathBuf};

/// Writes a PDF with one page per label. Resources and MediaBox live on the
/// page tree root, so pages inherit them.
pub fn make_pdf(path: &Path, labels: &[String]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for label in labels {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), Object::Integer(12)]),
                Operation::new("Td", vec![Object::Integer(72), Object::Integer(720)]),
                Operation::new("Tj", vec![Object::string_literal(label.as_str())]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

pub fn labels(prefix: &str, range: std::ops::Range<u32>) -> Vec<String> {
    range.map(|i| format!("{prefix}{i}")).collect()
}

/// The text drawn on each page, in page order.
pub fn page_labels(path: &Path) -> Vec<String> {
    let doc = Document::load(path).unwrap();
    doc.get_pages()
        .values()
        .map(|&id| {
            let content = doc.get_page_content(id).unwrap();
            let text = String::from_utf8_lossy(&content);
            let start = text.find('(').unwrap();
            let end = text.rfind(')').unwrap();
            text[start + 1..end].to_string()
        })
        .collect()
}

/// Writes a translated/bilingual chunk output whose pages are labelled
/// `{project}-{index}-{n}`.
pub fn make_chunk(
    dir: &Path,
    project: &str,
    kind: OutputKind,
    index: u32,
    total: u32,
    pages: u32,
) -> PathBuf {
    let path = dir.join(ChunkName::output(project, kind, index, total).file_name());
    make_pdf(&path, &labels(&format!("{project}-{index}-"), 0..pages));
    path
}
