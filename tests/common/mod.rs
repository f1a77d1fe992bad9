//! Fixtures shared by the integration tests.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// Build a one-page PDF. Each entry is `(x, y, text)` drawn in 10pt Courier;
/// entries sharing a `y` end up on one extracted line.
pub fn build_pdf(fragments: &[(i64, i64, &str)]) -> Vec<u8> {
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

    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), Object::Integer(10)]),
    ];
    for (x, y, text) in fragments {
        operations.push(Operation::new(
            "Tm",
            vec![1.into(), 0.into(), 0.into(), 1.into(), Object::Integer(*x), Object::Integer(*y)],
        ));
        operations.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
    }
    operations.push(Operation::new("ET", vec![]));

    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Statement rows laid out in date / description / amount / balance columns.
pub fn statement_rows<'a>(header: &[&'a str], rows: &[[&'a str; 4]]) -> Vec<(i64, i64, &'a str)> {
    let mut fragments = Vec::new();
    let mut y = 760;
    for line in header {
        fragments.push((50, y, *line));
        y -= 20;
    }
    for row in rows {
        for (x, text) in [50, 110, 400, 480].into_iter().zip(row.iter()) {
            if !text.is_empty() {
                fragments.push((x, y, *text));
            }
        }
        y -= 20;
    }
    fragments
}
