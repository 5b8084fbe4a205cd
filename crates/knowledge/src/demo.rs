//! Demonstration spec sheets for `grounded seed-demo`.
//!
//! SKU-002's sheet has been superseded, so retrieving it exercises the
//! staleness warning.

use crate::passage::Document;

pub const SKU001_SHEET: &str = "Especificaciones del SKU-001 (Router AC1200):
- WiFi de doble banda 2.4/5 GHz
- 4 puertos LAN
- Garantía 12 meses";

pub const SKU002_SHEET: &str = "Especificaciones del SKU-002 (Switch 8 puertos):
- 8 puertos 10/100/1000
- QoS básica
- Manual versión 2023-02";

/// The two demo documents, with fixed ids so reseeding overwrites them.
pub fn demo_documents() -> Vec<Document> {
    vec![
        sheet(
            "demo-sku-001",
            "SKU-001",
            "manual_sku001_v1.pdf",
            SKU001_SHEET,
            Some("2025-06-01"),
            None,
            "router",
        ),
        sheet(
            "demo-sku-002",
            "SKU-002",
            "manual_sku002_v1.pdf",
            SKU002_SHEET,
            Some("2023-02-01"),
            Some("2025-06-30"),
            "switch",
        ),
    ]
}

fn sheet(
    id: &str,
    sku: &str,
    source: &str,
    text: &str,
    valid_from: Option<&str>,
    valid_to: Option<&str>,
    kind: &str,
) -> Document {
    let mut doc = Document::new(text)
        .with_id(id)
        .with_sku(sku)
        .with_source(source)
        .with_validity(valid_from, valid_to);
    doc.lang = Some("es".to_string());
    doc.version = Some("v1".to_string());
    doc.section_id = Some("specs".to_string());
    doc.tags = vec!["specs".to_string(), kind.to_string()];
    doc
}
