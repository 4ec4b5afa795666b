//! Minimal SVG document tree.
//!
//! Elements are assembled with a small builder and serialized in one
//! place, so user text and attribute values are always escaped.

use std::fmt::Write as _;

pub const SVG_NS: &str = "http://www.w3.org/2000/svg";

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    /// Pre-normalized markup inserted verbatim (icon fragments).
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    name: &'static str,
    attrs: Vec<(&'static str, String)>,
    children: Vec<Node>,
}

impl Element {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Root `<svg>` whose user unit is one millimetre.
    pub fn document_mm(width_mm: f32, height_mm: f32) -> Self {
        Self::new("svg")
            .attr("xmlns", SVG_NS)
            .attr("width", format!("{}mm", fmt_num(width_mm)))
            .attr("height", format!("{}mm", fmt_num(height_mm)))
            .attr(
                "viewBox",
                format!("0 0 {} {}", fmt_num(width_mm), fmt_num(height_mm)),
            )
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn attr(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn num(self, key: &'static str, value: f32) -> Self {
        self.attr(key, fmt_num(value))
    }

    pub fn set_attr(&mut self, key: &'static str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((key, value)),
        }
    }

    pub fn get_attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn child(mut self, element: Element) -> Self {
        self.children.push(Node::Element(element));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn raw(mut self, markup: impl Into<String>) -> Self {
        self.children.push(Node::Raw(markup.into()));
        self
    }

    pub fn push(&mut self, element: Element) {
        self.children.push(Node::Element(element));
    }

    pub fn extend(&mut self, nodes: impl IntoIterator<Item = Node>) {
        self.children.extend(nodes);
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Depth-first search for every descendant element named `name`.
    pub fn find_all<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        self.collect(name, &mut found);
        found
    }

    fn collect<'a>(&'a self, name: &str, found: &mut Vec<&'a Element>) {
        for node in &self.children {
            if let Node::Element(el) = node {
                if el.name == name {
                    found.push(el);
                }
                el.collect(name, found);
            }
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    pub fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(self.name);
        for (key, value) in &self.attrs {
            let _ = write!(out, " {}=\"{}\"", key, escape_xml(value));
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for node in &self.children {
            match node {
                Node::Element(el) => el.write_to(out),
                Node::Text(text) => out.push_str(&escape_xml(text)),
                Node::Raw(markup) => out.push_str(markup),
            }
        }
        let _ = write!(out, "</{}>", self.name);
    }
}

/// Formats a coordinate with at most three decimals and no trailing zeros.
pub fn fmt_num(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let mut s = format!("{:.3}", value);
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

pub fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_nested_elements() {
        let doc = Element::new("g")
            .attr("id", "a")
            .child(Element::new("rect").num("x", 1.5).num("y", 2.0))
            .child(Element::new("text").text("hi"));
        assert_eq!(
            doc.render(),
            "<g id=\"a\"><rect x=\"1.5\" y=\"2\"/><text>hi</text></g>"
        );
    }

    #[test]
    fn escapes_text_and_attributes() {
        let doc = Element::new("text")
            .attr("data-x", "a\"b<c")
            .text("Jam & <Honey>");
        let out = doc.render();
        assert!(out.contains("data-x=\"a&quot;b&lt;c\""));
        assert!(out.contains("Jam &amp; &lt;Honey&gt;"));
    }

    #[test]
    fn raw_markup_is_not_escaped() {
        let doc = Element::new("g").raw("<path d=\"M0 0\"/>");
        assert_eq!(doc.render(), "<g><path d=\"M0 0\"/></g>");
    }

    #[test]
    fn fmt_num_trims_zeros() {
        assert_eq!(fmt_num(58.0), "58");
        assert_eq!(fmt_num(0.25), "0.25");
        assert_eq!(fmt_num(1.0 / 3.0), "0.333");
        assert_eq!(fmt_num(-0.0001), "0");
        assert_eq!(fmt_num(f32::NAN), "0");
    }

    #[test]
    fn set_attr_replaces_existing_value() {
        let mut el = Element::new("rect").attr("fill", "red");
        el.set_attr("fill", "blue");
        assert_eq!(el.get_attr("fill"), Some("blue"));
        assert_eq!(el.render(), "<rect fill=\"blue\"/>");
    }

    #[test]
    fn find_all_descends() {
        let doc = Element::new("svg").child(
            Element::new("g")
                .child(Element::new("circle"))
                .child(Element::new("g").child(Element::new("circle"))),
        );
        assert_eq!(doc.find_all("circle").len(), 2);
        assert_eq!(doc.find_all("g").len(), 2);
    }
}
