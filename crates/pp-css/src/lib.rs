//! CSS tokenization, stylesheet model and cascade.
//!
//! Supported selectors are deliberately small: an optional ancestor tag
//! (descendant combinator, one level), an optional tag, an optional id and any
//! number of classes. Rules are ranked by specificity and then by source
//! order, and folded field by field into a sparse [`StyleProperties`].

use log::debug;
use pp_dom::Document;
use pp_dom::NodeId;

/// Weight used for `font-weight` values without a usable number.
pub const DEFAULT_FONT_WEIGHT: u16 = 400;

/// RGBA color. Defaults to opaque black.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

/// Four-sided integer box (margin or padding), in px.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BoxEdges {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl BoxEdges {
    pub const fn uniform(value: i32) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }
}

/// Sparse set of presentation properties. `None` means "never declared",
/// which is distinct from a declared default value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleProperties {
    pub display: Option<String>,
    pub color: Option<Color>,
    pub background_color: Option<Color>,
    pub font_family: Option<String>,
    pub font_size: Option<i32>,
    pub font_weight: Option<u16>,
    pub margin: Option<BoxEdges>,
    pub padding: Option<BoxEdges>,
}

impl StyleProperties {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn is_display_none(&self) -> bool {
        self.display.as_deref() == Some("none")
    }

    /// Overwrites every field `other` declares; leaves the rest untouched.
    pub fn apply(&mut self, other: &Self) {
        overwrite(&mut self.display, &other.display);
        overwrite(&mut self.color, &other.color);
        overwrite(&mut self.background_color, &other.background_color);
        overwrite(&mut self.font_family, &other.font_family);
        overwrite(&mut self.font_size, &other.font_size);
        overwrite(&mut self.font_weight, &other.font_weight);
        overwrite(&mut self.margin, &other.margin);
        overwrite(&mut self.padding, &other.padding);
    }
}

fn overwrite<T: Clone>(target: &mut Option<T>, incoming: &Option<T>) {
    if let Some(value) = incoming {
        *target = Some(value.clone());
    }
}

/// `[ancestor ]tag#id.class...` selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    pub ancestor: Option<String>,
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
}

impl Selector {
    /// Parses one comma-separated selector segment. Returns `None` when the
    /// segment names nothing to match on.
    pub fn parse(input: &str) -> Option<Self> {
        let text = normalize_ws(input);
        let (ancestor, compound) = match text.rfind(' ') {
            Some(space) => (Some(&text[..space]), &text[space + 1..]),
            None => (None, text.as_str()),
        };

        let mut selector = Self {
            ancestor: ancestor.map(str::to_ascii_lowercase),
            ..Self::default()
        };

        let tag_end = compound.find(['#', '.']).unwrap_or(compound.len());
        let tag = &compound[..tag_end];
        if !tag.is_empty() {
            selector.tag = Some(tag.to_ascii_lowercase());
        }

        let mut rest = &compound[tag_end..];
        while let Some(marker) = rest.chars().next() {
            let body = &rest[1..];
            let token_end = body.find(['#', '.']).unwrap_or(body.len());
            let token = &body[..token_end];
            if !token.is_empty() {
                if marker == '#' {
                    selector.id = Some(token.to_owned());
                } else {
                    selector.classes.push(token.to_owned());
                }
            }
            rest = &body[token_end..];
        }

        if selector.ancestor.is_none()
            && selector.tag.is_none()
            && selector.id.is_none()
            && selector.classes.is_empty()
        {
            return None;
        }

        Some(selector)
    }

    pub fn specificity(&self) -> u32 {
        let id: u32 = if self.id.is_some() { 100 } else { 0 };
        let classes = u32::try_from(self.classes.len())
            .unwrap_or(u32::MAX / 10)
            .saturating_mul(10);
        let tag = u32::from(self.tag.is_some());
        let ancestor = u32::from(self.ancestor.is_some());
        id.saturating_add(classes)
            .saturating_add(tag)
            .saturating_add(ancestor)
    }

    pub fn matches(&self, document: &Document, node: NodeId) -> bool {
        let Some(element) = document.element(node) else {
            return false;
        };

        if self.tag.as_deref().is_some_and(|tag| tag != element.tag) {
            return false;
        }

        if self
            .id
            .as_deref()
            .is_some_and(|id| element.attr("id") != Some(id))
        {
            return false;
        }

        if !self.classes.iter().all(|class| element.has_class(class)) {
            return false;
        }

        match self.ancestor.as_deref() {
            None => true,
            Some(ancestor) => document.ancestors(node).any(|id| {
                document
                    .element(id)
                    .is_some_and(|candidate| candidate.tag == ancestor)
            }),
        }
    }
}

/// One selector with its declarations, ranked for the cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub selector: Selector,
    pub properties: StyleProperties,
    pub specificity: u32,
    pub order: usize,
}

/// Style rules compiled from source CSS, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleSheet {
    rules: Vec<Rule>,
}

impl StyleSheet {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    fn push(&mut self, selector: Selector, properties: StyleProperties) {
        let order = self.rules.len();
        self.rules.push(Rule {
            specificity: selector.specificity(),
            selector,
            properties,
            order,
        });
    }

    /// Computes the cascaded style of `node`: matching rules sorted by
    /// (specificity, source order) and folded so later rules win per field.
    pub fn compute_style(&self, document: &Document, node: NodeId) -> StyleProperties {
        let mut matched: Vec<&Rule> = self
            .rules
            .iter()
            .filter(|rule| rule.selector.matches(document, node))
            .collect();
        matched.sort_by_key(|rule| (rule.specificity, rule.order));

        let mut computed = StyleProperties::default();
        for rule in matched {
            computed.apply(&rule.properties);
        }
        computed
    }
}

/// Parses CSS source text.
#[derive(Debug, Default)]
pub struct CssParser;

impl CssParser {
    pub fn parse(&self, input: &str) -> StyleSheet {
        let sanitized = strip_comments(input);
        let mut sheet = StyleSheet::empty();
        let mut cursor = 0_usize;

        while let Some((selectors, body, next_cursor)) = next_rule_block(&sanitized, cursor) {
            cursor = next_cursor;
            let properties = parse_declarations(body);
            for segment in selectors.split(',') {
                if let Some(selector) = Selector::parse(segment) {
                    sheet.push(selector, properties.clone());
                }
            }
        }

        debug!("parsed stylesheet with {} rules", sheet.rule_count());
        sheet
    }
}

fn next_rule_block(input: &str, from: usize) -> Option<(&str, &str, usize)> {
    let open = from + input.get(from..)?.find('{')?;
    let close = open + 1 + input[open + 1..].find('}')?;
    Some((&input[from..open], &input[open + 1..close], close + 1))
}

/// Parses a `;`-separated declaration list such as an inline `style`
/// attribute or a rule body.
pub fn parse_declarations(input: &str) -> StyleProperties {
    let mut properties = StyleProperties::default();

    for declaration in input.split(';') {
        let Some((name, value)) = declaration.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let value = strip_important(value.trim());

        match name.as_str() {
            "display" => properties.display = Some(value.to_ascii_lowercase()),
            "color" => properties.color = Some(parse_color(value)),
            "background-color" => properties.background_color = Some(parse_color(value)),
            "font-family" => properties.font_family = Some(value.to_owned()),
            "font-size" => properties.font_size = Some(parse_px(value)),
            "font-weight" => properties.font_weight = Some(parse_font_weight(value)),
            "margin" => properties.margin = Some(BoxEdges::uniform(parse_px(value))),
            "padding" => properties.padding = Some(BoxEdges::uniform(parse_px(value))),
            _ => {}
        }
    }

    properties
}

fn strip_important(value: &str) -> &str {
    let lower = value.to_ascii_lowercase();
    match lower.rfind("!important") {
        Some(idx) if lower[idx..].trim() == "!important" => value[..idx].trim_end(),
        _ => value,
    }
}

/// Named colors (black, white, red, green, blue) or `#rrggbb`; anything else
/// yields the default color.
pub fn parse_color(value: &str) -> Color {
    let value = value.trim().to_ascii_lowercase();
    match value.as_str() {
        "black" => Color::BLACK,
        "white" => Color::WHITE,
        "red" => Color::rgb(255, 0, 0),
        "green" => Color::rgb(0, 128, 0),
        "blue" => Color::rgb(0, 0, 255),
        _ => parse_hex_color(&value).unwrap_or_default(),
    }
}

fn parse_hex_color(value: &str) -> Option<Color> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 || !hex.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        return None;
    }

    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    Some(Color::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Leading (optionally signed) digit run of a length; `px` and any other
/// suffix is ignored and non-numeric input yields 0.
pub fn parse_px(value: &str) -> i32 {
    let value = value.trim();
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };

    let run_end = digits
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(digits.len());
    let magnitude = digits[..run_end]
        .bytes()
        .fold(0_i64, |acc, byte| {
            acc.saturating_mul(10).saturating_add(i64::from(byte - b'0'))
        })
        .min(i64::from(i32::MAX));
    let magnitude = i32::try_from(magnitude).unwrap_or(i32::MAX);

    if negative { -magnitude } else { magnitude }
}

fn parse_font_weight(value: &str) -> u16 {
    match value.trim().to_ascii_lowercase().as_str() {
        "bold" | "bolder" => 700,
        "normal" | "lighter" => DEFAULT_FONT_WEIGHT,
        other => match u16::try_from(parse_px(other)) {
            Ok(weight) if weight > 0 => weight,
            _ => DEFAULT_FONT_WEIGHT,
        },
    }
}

fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => return out,
        }
    }

    out.push_str(rest);
    out
}

fn normalize_ws(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::BoxEdges;
    use super::Color;
    use super::CssParser;
    use super::Selector;
    use super::parse_declarations;
    use super::parse_px;
    use pp_dom::Document;
    use pp_dom::NodeId;

    fn element(doc: &mut Document, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let Some(id) = doc.append_element(parent, tag) else {
            panic!("parent {parent} is not an element");
        };
        if let Some(el) = doc.element_mut(id) {
            for (name, value) in attrs {
                el.set_attr(name, *value);
            }
        }
        id
    }

    #[test]
    fn parses_simple_rules_in_source_order() {
        let sheet = CssParser.parse("body { color: red; } .card { padding: 8px; }");
        assert_eq!(sheet.rule_count(), 2);
        assert_eq!(sheet.rules()[0].selector.tag.as_deref(), Some("body"));
        assert_eq!(sheet.rules()[0].properties.color, Some(Color::rgb(255, 0, 0)));
        assert_eq!(sheet.rules()[1].selector.classes, vec!["card"]);
        assert_eq!(sheet.rules()[1].properties.padding, Some(BoxEdges::uniform(8)));
        assert!(sheet.rules()[0].order < sheet.rules()[1].order);
    }

    #[test]
    fn comma_lists_produce_one_rule_per_selector() {
        let sheet = CssParser.parse("h1, h2 ,, .x { display: none }");
        assert_eq!(sheet.rule_count(), 3);
        let orders: Vec<_> = sheet.rules().iter().map(|rule| rule.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert!(sheet.rules().iter().all(|rule| rule.properties.is_display_none()));
    }

    #[test]
    fn strips_comments_including_unterminated() {
        let sheet = CssParser.parse("/* p { color: red } */ p { font-size: 14px; } /* div { x");
        assert_eq!(sheet.rule_count(), 1);
        assert_eq!(sheet.rules()[0].properties.font_size, Some(14));
    }

    #[test]
    fn stops_at_unterminated_block() {
        let sheet = CssParser.parse("p { margin: 2px } div { margin: 4px");
        assert_eq!(sheet.rule_count(), 1);
    }

    #[test]
    fn parses_selector_forms() {
        let Some(selector) = Selector::parse("  UL   li.item.active#Main ") else {
            panic!("selector should parse");
        };
        assert_eq!(selector.ancestor.as_deref(), Some("ul"));
        assert_eq!(selector.tag.as_deref(), Some("li"));
        assert_eq!(selector.id.as_deref(), Some("Main"));
        assert_eq!(selector.classes, vec!["item", "active"]);
        assert_eq!(selector.specificity(), 100 + 20 + 1 + 1);

        assert!(Selector::parse("   ").is_none());
        assert!(Selector::parse(".").is_none());
    }

    #[test]
    fn maps_declarations_through_property_table() {
        let props = parse_declarations(
            "DISPLAY: Block; color: #00ff80; background-color: purple; \
             font-family: 'Fira Sans', serif; font-size: 12px; font-weight: bold; \
             margin: -3px; padding: abc; unknown: 1; broken",
        );
        assert_eq!(props.display.as_deref(), Some("block"));
        assert_eq!(props.color, Some(Color::rgb(0, 255, 128)));
        assert_eq!(props.background_color, Some(Color::default()));
        assert_eq!(props.font_family.as_deref(), Some("'Fira Sans', serif"));
        assert_eq!(props.font_size, Some(12));
        assert_eq!(props.font_weight, Some(700));
        assert_eq!(props.margin, Some(BoxEdges::uniform(-3)));
        assert_eq!(props.padding, Some(BoxEdges::uniform(0)));
    }

    #[test]
    fn ignores_important_suffix() {
        let props = parse_declarations("color: blue !important; display:none!IMPORTANT");
        assert_eq!(props.color, Some(Color::rgb(0, 0, 255)));
        assert!(props.is_display_none());
    }

    #[test]
    fn parses_leading_digit_runs() {
        assert_eq!(parse_px("24px"), 24);
        assert_eq!(parse_px(" 1.5em "), 1);
        assert_eq!(parse_px("auto"), 0);
        assert_eq!(parse_px("-8px"), -8);
        assert_eq!(parse_px("99999999999999px"), i32::MAX);
    }

    #[test]
    fn id_beats_class_regardless_of_order() {
        let sheet = CssParser.parse(".btn{font-size:10px} #id{font-size:30px}");
        let mut doc = Document::new();
        let root = doc.root();
        let button = element(&mut doc, root, "button", &[("id", "id"), ("class", "btn")]);

        assert_eq!(sheet.compute_style(&doc, button).font_size, Some(30));

        let reversed = CssParser.parse("#id{font-size:30px} .btn{font-size:10px}");
        assert_eq!(reversed.compute_style(&doc, button).font_size, Some(30));
    }

    #[test]
    fn later_rule_wins_on_equal_specificity() {
        let sheet = CssParser.parse("p{color:red} p{color:blue}");
        let mut doc = Document::new();
        let root = doc.root();
        let p = element(&mut doc, root, "p", &[]);

        assert_eq!(sheet.compute_style(&doc, p).color, Some(Color::rgb(0, 0, 255)));
    }

    #[test]
    fn folds_only_declared_fields() {
        let sheet = CssParser.parse("p{color:red;font-size:20px} p.lead{font-size:24px}");
        let mut doc = Document::new();
        let root = doc.root();
        let p = element(&mut doc, root, "p", &[("class", "lead")]);
        let style = sheet.compute_style(&doc, p);

        assert_eq!(style.color, Some(Color::rgb(255, 0, 0)));
        assert_eq!(style.font_size, Some(24));
        assert_eq!(style.display, None);
        assert_eq!(style.font_weight, None);
    }

    #[test]
    fn requires_every_class() {
        let sheet = CssParser.parse(".a.b{display:none}");
        let mut doc = Document::new();
        let root = doc.root();
        let both = element(&mut doc, root, "div", &[("class", "b  a")]);
        let one = element(&mut doc, root, "div", &[("class", "a")]);

        assert!(sheet.compute_style(&doc, both).is_display_none());
        assert!(sheet.compute_style(&doc, one).display.is_none());
    }

    #[test]
    fn matches_strict_ancestors_only() {
        let sheet = CssParser.parse("nav a{color:white} a a{color:red}");
        let mut doc = Document::new();
        let root = doc.root();
        let nav = element(&mut doc, root, "nav", &[]);
        let list = element(&mut doc, nav, "ul", &[]);
        let nested = element(&mut doc, list, "a", &[]);
        let outside = element(&mut doc, root, "a", &[]);

        assert_eq!(sheet.compute_style(&doc, nested).color, Some(Color::WHITE));
        assert_eq!(sheet.compute_style(&doc, outside).color, None);
        assert!(sheet.compute_style(&doc, nav).is_empty());
    }

    #[test]
    fn text_nodes_have_no_style() {
        let sheet = CssParser.parse("p{color:red}");
        let mut doc = Document::new();
        let root = doc.root();
        let Some(text) = doc.append_text(root, "x") else {
            panic!("root must accept text");
        };
        assert!(sheet.compute_style(&doc, text).is_empty());
    }

    #[test]
    fn id_and_class_names_match_case_sensitively() {
        let sheet = CssParser.parse("DIV#Main{display:none} .Note{color:red}");
        let mut doc = Document::new();
        let root = doc.root();
        let exact = element(&mut doc, root, "div", &[("id", "Main"), ("class", "Note")]);
        let folded = element(&mut doc, root, "div", &[("id", "main"), ("class", "note")]);

        let style = sheet.compute_style(&doc, exact);
        assert!(style.is_display_none());
        assert_eq!(style.color, Some(Color::rgb(255, 0, 0)));
        assert!(sheet.compute_style(&doc, folded).is_empty());
    }
}
