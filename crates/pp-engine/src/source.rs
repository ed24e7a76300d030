//! Separation of a page into its markup, style and script sources.

use pp_dom::Document;
use pp_dom::Element;
use pp_dom::NodeId;
use pp_html::HtmlParser;

const STYLE_OPEN: &str = "<style";
const STYLE_CLOSE: &str = "</style>";

/// Page source split by language.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceBundle {
    pub html: String,
    pub css: String,
    pub javascript: String,
    pub typescript: String,
}

/// Concatenates the bodies of `<style>` blocks, each followed by a newline.
///
/// This is a plain text scan rather than a parse; it stops at the first block
/// without a closing tag.
pub fn extract_style_blocks(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let mut css = String::new();
    let mut pos = 0_usize;

    while let Some(rel_open) = lower.get(pos..).and_then(|rest| rest.find(STYLE_OPEN)) {
        let open = pos + rel_open;
        let Some(open_end) = lower[open..].find('>').map(|rel| open + rel) else {
            break;
        };
        let Some(close) = lower[open_end + 1..]
            .find(STYLE_CLOSE)
            .map(|rel| open_end + 1 + rel)
        else {
            break;
        };

        if let Some(body) = html.get(open_end + 1..close) {
            css.push_str(body);
        }
        css.push('\n');
        pos = close + STYLE_CLOSE.len();
    }

    css
}

/// Splits a page into markup, style and script sources. Scripts whose `type`
/// mentions TypeScript land in `typescript`; all others in `javascript`.
pub fn extract_source_bundle(html: &str) -> SourceBundle {
    let document = HtmlParser.parse(html);
    let mut bundle = SourceBundle {
        html: html.to_owned(),
        css: extract_style_blocks(html),
        ..SourceBundle::default()
    };

    for id in document.descendants(document.root()) {
        let Some(element) = document.element(id) else {
            continue;
        };
        if element.tag != "script" {
            continue;
        }

        let block = script_block(&document, id, element);
        if block.trim().is_empty() {
            continue;
        }

        let target = if is_typescript(element) {
            &mut bundle.typescript
        } else {
            &mut bundle.javascript
        };
        target.push_str(&block);
        target.push('\n');
    }

    bundle
}

fn script_block(document: &Document, id: NodeId, element: &Element) -> String {
    let mut block = String::new();

    let src = element.attr_or_empty("src").trim();
    if !src.is_empty() {
        block.push_str("// external script src=");
        block.push_str(src);
        block.push('\n');
    }

    let body = document.text_content(id);
    if !body.trim().is_empty() {
        block.push_str(&body);
        if !body.ends_with('\n') {
            block.push('\n');
        }
    }

    block
}

fn is_typescript(element: &Element) -> bool {
    let kind = element.attr_or_empty("type").to_ascii_lowercase();
    kind.contains("typescript") || kind.contains("text/ts")
}

#[cfg(test)]
mod tests {
    use super::extract_source_bundle;
    use super::extract_style_blocks;

    #[test]
    fn typescript_blocks_never_reach_javascript() {
        let bundle = extract_source_bundle("<script type=\"text/typescript\">let t:number=1;</script>");
        assert_eq!(bundle.typescript, "let t:number=1;\n\n");
        assert!(bundle.javascript.is_empty());
    }

    #[test]
    fn external_scripts_become_placeholders() {
        let html = "<script src=\"/app.js\"></script>\
                    <script type=\"TEXT/TS\" src=\"m.ts\">  x()  </script>\
                    <script>   </script>";
        let bundle = extract_source_bundle(html);

        assert_eq!(bundle.javascript, "// external script src=/app.js\n\n");
        assert_eq!(bundle.typescript, "// external script src=m.ts\n  x()  \n\n");
        assert_eq!(bundle.html, html);
    }

    #[test]
    fn script_bodies_keep_their_layout() {
        let html = "<script>\n  if (a) {\n    b();\n  }\n</script>";
        let bundle = extract_source_bundle(html);
        assert_eq!(bundle.javascript, "\n  if (a) {\n    b();\n  }\n\n");
    }

    #[test]
    fn collects_style_bodies_until_unterminated_block() {
        let html = "<STYLE media=x>a{}</Style><p>x</p><style>b{}</style><style>c{}";
        assert_eq!(extract_style_blocks(html), "a{}\nb{}\n");
        assert_eq!(extract_style_blocks("<p>no styles</p>"), "");
    }
}
