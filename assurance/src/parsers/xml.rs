//! Small DOM helpers over `xmltree` shared by the KML and DJI parsers.
//! Element names are matched on their local part, so `wpml:index` and
//! `index` are the same lookup.

use xmltree::{Element, XMLNode};

use crate::error::ParseError;

pub(crate) fn parse_document(text: &str, document: &'static str) -> Result<Element, ParseError> {
    Element::parse(text.as_bytes()).map_err(|source| ParseError::Xml { document, source })
}

/// `root` and every element below it, in document order.
pub(crate) fn descendants(root: &Element) -> Vec<&Element> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(element) = stack.pop() {
        out.push(element);
        for child in element.children.iter().rev() {
            if let XMLNode::Element(child) = child {
                stack.push(child);
            }
        }
    }
    out
}

pub(crate) fn elements_named<'a>(root: &'a Element, name: &str) -> Vec<&'a Element> {
    descendants(root)
        .into_iter()
        .filter(|element| element.name == name)
        .collect()
}

pub(crate) fn text_of(element: &Element) -> Option<String> {
    let text = element.get_text()?;
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub(crate) fn child_text(element: &Element, name: &str) -> Option<String> {
    element.get_child(name).and_then(text_of)
}

/// Text of the first element called `name` anywhere under `root`.
pub(crate) fn find_text(root: &Element, name: &str) -> Option<String> {
    descendants(root)
        .into_iter()
        .filter(|element| element.name == name)
        .find_map(text_of)
}

pub(crate) fn find_number(root: &Element, name: &str) -> Option<f64> {
    find_text(root, name).and_then(|text| text.parse().ok())
}

/// `a,b,c` tuple; every component must be numeric.
pub(crate) fn parse_tuple(text: &str) -> Result<Vec<f64>, ParseError> {
    text.split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| ParseError::InvalidCoordinate(text.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<root xmlns:wpml="http://www.dji.com/wpmz/1.0.2">
        <a><wpml:index>1</wpml:index></a>
        <b><index>2</index><name>  hello </name></b>
    </root>"#;

    #[test]
    fn walks_in_document_order() {
        let root = parse_document(DOC, "test").unwrap();
        let names: Vec<&str> = descendants(&root).iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["root", "a", "index", "b", "index", "name"]);
    }

    #[test]
    fn matches_local_names() {
        let root = parse_document(DOC, "test").unwrap();
        assert_eq!(elements_named(&root, "index").len(), 2);
        assert_eq!(find_number(&root, "index"), Some(1.0));
        assert_eq!(find_text(&root, "name").as_deref(), Some("hello"));
        assert_eq!(find_text(&root, "missing"), None);
    }

    #[test]
    fn parses_tuples() {
        assert_eq!(parse_tuple("1.5, 2,3").unwrap(), vec![1.5, 2.0, 3.0]);
        assert!(parse_tuple("1,x").is_err());
    }

    #[test]
    fn reports_malformed_xml() {
        let err = parse_document("<open>", "template.kml").unwrap_err();
        assert!(matches!(err, ParseError::Xml { document: "template.kml", .. }));
    }
}
