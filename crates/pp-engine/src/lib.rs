//! Document pipeline from HTML source to wrapped plain text.

mod source;

use log::debug;
use pp_core::PapyrusError;
use pp_core::PapyrusResult;
use pp_css::CssParser;
use pp_css::StyleSheet;
use pp_dom::Document;
use pp_html::HtmlParser;
use pp_net::Fetcher;
use pp_net::fetch_document;
use pp_net::url::try_resolve;
use pp_render::TextRenderer;
use pp_render::extract_links;

pub use pp_net::FetchLimits;
pub use pp_render::DEFAULT_WRAP_WIDTH;
pub use pp_render::PageLink;
pub use source::SourceBundle;
pub use source::extract_source_bundle;
pub use source::extract_style_blocks;

const TEXT_AND_LINKS_WIDTH: usize = 120;

/// Parsed document together with the stylesheet that applies to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderContext {
    pub document: Document,
    pub stylesheet: StyleSheet,
}

impl RenderContext {
    pub fn render(&self, wrap_width: usize) -> String {
        TextRenderer::new(wrap_width).render(&self.document, &self.stylesheet)
    }
}

/// Parses `html` and `css` into a render context. An empty `css` yields an
/// empty stylesheet.
pub fn parse_document(html: &str, css: &str) -> RenderContext {
    let stylesheet = if css.trim().is_empty() {
        StyleSheet::empty()
    } else {
        CssParser.parse(css)
    };

    RenderContext {
        document: HtmlParser.parse(html),
        stylesheet,
    }
}

/// Renders `html` with its own `<style>` blocks applied.
pub fn render_text(html: &str, wrap_width: usize) -> String {
    page_context(html).render(wrap_width)
}

/// Resolves `href` against `base_url`; empty when unsafe or unresolvable.
pub fn resolve_link(base_url: &str, href: &str) -> String {
    pp_net::url::resolve(base_url, href)
}

/// Renders at a wide column budget and collects the page's safe links.
pub fn extract_text_and_links(html: &str) -> (String, Vec<PageLink>) {
    let context = page_context(html);
    let text = context.render(TEXT_AND_LINKS_WIDTH);
    (text, extract_links(&context.document))
}

fn page_context(html: &str) -> RenderContext {
    parse_document(html, &extract_style_blocks(html))
}

/// Engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub wrap_width: usize,
    pub fetch: FetchLimits,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wrap_width: DEFAULT_WRAP_WIDTH,
            fetch: FetchLimits::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> PapyrusResult<()> {
        if self.wrap_width == 0 {
            return Err(PapyrusError::new(
                "engine.config.wrap_width_zero",
                "wrap width must be at least one column",
            ));
        }

        self.fetch.validate()
    }
}

/// A fetched and rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedPage {
    /// Final URL after redirects.
    pub url: String,
    pub status_line: String,
    pub title: String,
    pub text: String,
    /// Safe links with targets resolved against `url`.
    pub links: Vec<PageLink>,
}

/// Configured document engine.
#[derive(Debug, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> PapyrusResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn render_page(&self, html: &str) -> String {
        render_text(html, self.config.wrap_width)
    }

    /// Fetches `url` through `fetcher`, following redirects within the
    /// configured limits, then decodes and renders the final response.
    pub fn load_page<F>(&self, fetcher: &mut F, url: &str) -> PapyrusResult<LoadedPage>
    where
        F: Fetcher + ?Sized,
    {
        let fetched = fetch_document(fetcher, url, &self.config.fetch)?;
        let final_url = fetched.url.to_string();
        let html = fetched.response.body_text();

        let context = page_context(&html);
        let text = context.render(self.config.wrap_width);

        let mut links = Vec::new();
        for link in extract_links(&context.document) {
            if let Some(href) = try_resolve(&final_url, &link.href)? {
                links.push(PageLink {
                    label: link.label,
                    href,
                });
            }
        }

        debug!(
            "loaded {final_url} ({}) after {} redirects with {} links",
            fetched.response.status_line.trim(),
            fetched.redirects,
            links.len()
        );

        Ok(LoadedPage {
            title: context.document.title(),
            url: final_url,
            status_line: fetched.response.status_line,
            text,
            links,
        })
    }
}
