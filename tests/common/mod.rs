#![allow(dead_code)]

use image::{Rgba, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use std::fs;
use std::path::{Path, PathBuf};

pub fn write_invoice(path: &Path, pages: usize) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for n in 1..=pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 14.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(format!("Invoice page {n}"))]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! { "Type" => "Pages", "Kids" => kids, "Count" => count }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

pub fn write_seal(path: &Path) {
    let mut seal = RgbaImage::from_pixel(16, 16, Rgba([0, 0, 0, 0]));
    for x in 2..14 {
        for y in 2..14 {
            seal.put_pixel(x, y, Rgba([20, 40, 200, 255]));
        }
    }
    seal.save(path).unwrap();
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

pub fn page_count(path: &Path) -> usize {
    Document::load(path).unwrap().get_pages().len()
}

pub fn page_content(doc: &Document, index: usize) -> String {
    let page_id = *doc.get_pages().values().nth(index).unwrap();
    String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned()
}

/// Contents of every form XObject registered on the page.
pub fn form_contents(doc: &Document, index: usize) -> Vec<String> {
    let page_id = *doc.get_pages().values().nth(index).unwrap();
    let page = doc.get_dictionary(page_id).unwrap();
    let Ok(Object::Dictionary(resources)) = page.get(b"Resources") else {
        return Vec::new();
    };
    let Ok(Object::Dictionary(xobjects)) = resources.get(b"XObject") else {
        return Vec::new();
    };
    xobjects
        .iter()
        .filter_map(|(_, v)| v.as_reference().ok())
        .filter_map(|id| doc.get_object(id).ok()?.as_stream().ok())
        .filter(|s| matches!(s.dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Form"))
        .map(|s| String::from_utf8_lossy(&s.content).into_owned())
        .collect()
}

pub struct Workspace {
    pub root: tempfile::TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self { root: tempfile::tempdir().unwrap() }
    }

    pub fn input(&self) -> PathBuf {
        self.root.path().join("invoices")
    }

    pub fn output(&self) -> PathBuf {
        self.root.path().join("signed_invoices")
    }

    pub fn seal(&self) -> PathBuf {
        self.root.path().join("stamp-blue.png")
    }

    pub fn with_seal(self) -> Self {
        write_seal(&self.seal());
        self
    }

    pub fn with_input_dir(self) -> Self {
        fs::create_dir_all(self.input()).unwrap();
        self
    }
}
