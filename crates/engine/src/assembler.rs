//! Deterministic response assembly.
//!
//! Sentences are rendered from whichever slots are present, in a fixed order
//! (retrieval, order and policy, invoice, inventory), and space-joined.

use crate::evidence::EvidenceBag;

/// Returned when no evidence slot is present.
pub const GENERIC_PROMPT: &str =
    "How can I help you? You can ask about orders, invoices, or inventory (by SKU).";

/// Render the deterministic summary for `evidence`.
pub fn summarize(evidence: &EvidenceBag) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(hit) = evidence.top_passage() {
        let passage = &hit.passage;
        let first_line = match passage.first_line() {
            "" => "(no content)",
            line => line,
        };
        let stale = passage
            .valid_to
            .as_ref()
            .map(|to| format!(" (WARNING: outdated document, superseded on {})", to))
            .unwrap_or_default();

        parts.push(format!(
            "Spec sheet (SKU {}): {}{}.",
            passage.sku.as_deref().unwrap_or("unknown"),
            first_line.trim_end_matches(['.', ':']),
            stale
        ));
        if let Some(source) = &passage.source {
            parts.push(format!("Source: {}.", source));
        }
    }

    if let Some(order) = &evidence.order {
        parts.push(format!(
            "Order #{} is in state '{}' with ETA {}.",
            order.id,
            order.status,
            order.eta.as_deref().unwrap_or("unknown")
        ));
        if let Some(policy) = &evidence.policy {
            parts.push(policy.text.clone());
        }
    }

    if let Some(invoice) = &evidence.invoice {
        parts.push(format!(
            "Invoice: {} {}, due {}.",
            invoice.amount, invoice.currency, invoice.due_date
        ));
    }

    if let Some(item) = &evidence.inventory {
        let stale = if item.is_stale() {
            " (WARNING: outdated record)"
        } else {
            ""
        };
        parts.push(format!(
            "Inventory {} - {}: stock {}, price {} {}{}.",
            item.sku, item.name, item.stock, item.price, item.currency, stale
        ));
    }

    if parts.is_empty() {
        return GENERIC_PROMPT.to_string();
    }
    parts.join(" ")
}
