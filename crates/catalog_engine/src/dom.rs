use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html};

pub(crate) fn element_by_id<'a>(doc: &'a Html, id: &str) -> Option<ElementRef<'a>> {
    doc.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().id() == Some(id))
}

/// Concatenated text below `node`, whatever kind of node it is.
pub(crate) fn node_text(node: NodeRef<'_, Node>) -> String {
    match node.value() {
        Node::Text(text) => text.to_string(),
        Node::Element(_) => ElementRef::wrap(node)
            .map(|element| element.text().collect())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

pub(crate) fn last_child_text(element: ElementRef<'_>) -> Option<String> {
    element
        .last_child()
        .map(|node| node_text(node).trim().to_string())
}

/// Direct element children named `name`, in document order.
pub(crate) fn child_elements<'a>(
    element: ElementRef<'a>,
    name: &'a str,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    element
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |child| child.value().name().eq_ignore_ascii_case(name))
}
