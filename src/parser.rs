//! XML parser for the `PasoParada` payload carried inside the envelope.

use roxmltree::{Document, Node};

/// A complete passage read from the payload, before time normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passage {
    /// `linea`: route identifier.
    pub route: String,
    /// `ruta`: route display name.
    pub route_name: String,
    /// `e1/minutos`: minutes until arrival, as sent.
    pub minutes: String,
}

/// Parses `xml` and returns every complete `PasoParada` under the root
/// element, in document order.
///
/// A passage missing `linea`, `ruta` or `e1/minutos` (or with any of them
/// empty) is skipped.
///
/// # Errors
///
/// Returns an error if `xml` is not well-formed. No partial result is
/// produced in that case.
pub fn parse_passages(xml: &str) -> Result<Vec<Passage>, roxmltree::Error> {
    let doc = Document::parse(xml)?;

    let passages = doc
        .root_element()
        .children()
        .filter(|n| n.has_tag_name("PasoParada"))
        .filter_map(|n| {
            Some(Passage {
                route: child_text(n, "linea")?,
                route_name: child_text(n, "ruta")?,
                minutes: child_text(child(n, "e1")?, "minutos")?,
            })
        })
        .collect();

    Ok(passages)
}

/// Like [`parse_passages`], keeping only passages whose `linea` equals
/// `route` exactly.
pub fn extract(xml: &str, route: &str) -> Result<Vec<Passage>, roxmltree::Error> {
    let mut passages = parse_passages(xml)?;
    passages.retain(|p| p.route == route);
    Ok(passages)
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(name))
}

fn child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    child(node, name)?.text().map(str::to_string)
}
