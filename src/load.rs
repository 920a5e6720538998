//! Snapshots of live [`Dom`] subtrees as [`HtmlNode`]s, for serialization and structural comparison.

use crate::{
	dom::{Dom, NodeType, HTML_NAMESPACE},
	html::{HtmlElement, HtmlNode},
};

pub fn load_child_nodes<D: Dom>(dom: &D, node: &D::Node) -> Vec<HtmlNode> {
	dom.child_nodes(node).iter().filter_map(|child| load_node(dom, child)).collect()
}

/// [`None`] for documents and other node types without markup.
pub fn load_node<D: Dom>(dom: &D, node: &D::Node) -> Option<HtmlNode> {
	match dom.node_type(node) {
		NodeType::Element => load_element(dom, node).map(HtmlNode::Element),
		NodeType::Text => Some(HtmlNode::Text(dom.text_content(node))),
		NodeType::Comment => Some(HtmlNode::Comment(dom.text_content(node))),
		NodeType::Document | NodeType::Other => None,
	}
}

pub fn load_element<D: Dom>(dom: &D, element: &D::Node) -> Option<HtmlElement> {
	Some(HtmlElement {
		name: dom.tag_name(element)?,
		namespace: dom.namespace_uri(element).filter(|namespace| namespace != HTML_NAMESPACE),
		attributes: load_attributes(dom, element),
		children: load_child_nodes(dom, element),
	})
}

pub fn load_attributes<D: Dom>(dom: &D, element: &D::Node) -> Vec<(String, String)> {
	dom.attributes(element)
}
