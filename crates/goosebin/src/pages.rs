//! HTML pages.
//!
//! Each outcome the handlers can produce has its own [`Page`] variant, so a
//! handler cannot forget a field the markup needs. Markup lives in
//! `src/templates/*.hbs` and is rendered by handlebars, which escapes every
//! `{{value}}` for HTML.

use std::time::Duration;

use handlebars::{Handlebars, TemplateError};
use pastekv::PasteKey;
use serde_json::{json, Value};

const PARTIALS: &[(&str, &str)] = &[
    ("header", include_str!("templates/header.hbs")),
    ("footer", include_str!("templates/footer.hbs")),
];

const TEMPLATES: &[(&str, &str)] = &[
    ("home", include_str!("templates/home.hbs")),
    ("new_paste", include_str!("templates/new_paste.hbs")),
    ("created", include_str!("templates/created.hbs")),
    ("exists", include_str!("templates/exists.hbs")),
    ("failed", include_str!("templates/failed.hbs")),
    ("show", include_str!("templates/show.hbs")),
    ("not_found", include_str!("templates/not_found.hbs")),
    ("error", include_str!("templates/error.hbs")),
];

/// A page and the data it is rendered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    Home,
    NewPaste { size_limit: usize },
    Created { key: PasteKey },
    Exists { key: PasteKey },
    Failed { why: String },
    Show {
        key: PasteKey,
        content: String,
        remaining_ttl: Duration,
    },
    NotFound { path: String },
    ServerError { code: u16, path: String },
}

impl Page {
    pub fn title(&self) -> String {
        match self {
            Page::Home => "Goosebin".to_string(),
            Page::NewPaste { .. } => "Create Paste".to_string(),
            Page::Created { .. } => "Paste created".to_string(),
            Page::Exists { .. } => "Paste exists".to_string(),
            Page::Failed { .. } => "Paste failed".to_string(),
            Page::Show { key, .. } => format!("Paste {}", key),
            Page::NotFound { .. } => "Not Found".to_string(),
            Page::ServerError { .. } => "Server Error".to_string(),
        }
    }

    pub fn template_name(&self) -> &'static str {
        match self {
            Page::Home => "home",
            Page::NewPaste { .. } => "new_paste",
            Page::Created { .. } => "created",
            Page::Exists { .. } => "exists",
            Page::Failed { .. } => "failed",
            Page::Show { .. } => "show",
            Page::NotFound { .. } => "not_found",
            Page::ServerError { .. } => "error",
        }
    }

    /// Template data, including the `title` the header partial uses.
    pub fn data(&self) -> Value {
        let title = self.title();
        match self {
            Page::Home => json!({ "title": title }),
            Page::NewPaste { size_limit } => json!({ "title": title, "size_limit": size_limit }),
            Page::Created { key } | Page::Exists { key } => json!({ "title": title, "path": key.path() }),
            Page::Failed { why } => json!({ "title": title, "why": why }),
            Page::Show {
                key,
                content,
                remaining_ttl,
            } => json!({
                "title": title,
                "content": content,
                "raw_path": key.raw_path(),
                "remaining_secs": remaining_ttl.as_secs(),
            }),
            Page::NotFound { path } => json!({ "title": title, "path": path }),
            Page::ServerError { code, path } => json!({ "title": title, "code": code, "path": path }),
        }
    }
}

/// Template registry, built once at startup and shared by all handlers.
pub struct Pages {
    registry: Handlebars<'static>,
}

impl std::fmt::Debug for Pages {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pages")
            .field("templates", &self.registry.get_templates().len())
            .finish()
    }
}

impl Pages {
    pub fn new() -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_helper("ttl", Box::new(ttl_helper));

        for (name, source) in PARTIALS {
            registry.register_partial(name, *source)?;
        }
        for (name, source) in TEMPLATES {
            registry.register_template_string(name, *source)?;
        }

        Ok(Self { registry })
    }

    pub fn render(&self, page: &Page) -> Result<String, handlebars::RenderError> {
        self.registry.render(page.template_name(), &page.data())
    }
}

/// `{{ttl seconds}}` renders a remaining TTL in human form.
fn ttl_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    if let Some(secs) = h.param(0).and_then(|p| p.value().as_u64()) {
        out.write(&format_ttl(Duration::from_secs(secs)))?;
    }
    Ok(())
}

/// Human form of a remaining TTL, e.g. `6d 23h 59m 59s`. Sub-second
/// remainders are dropped.
pub fn format_ttl(ttl: Duration) -> String {
    let total = ttl.as_secs();
    if total == 0 {
        return "0s".to_string();
    }

    let units = [
        (total / 86_400, "d"),
        (total % 86_400 / 3_600, "h"),
        (total % 3_600 / 60, "m"),
        (total % 60, "s"),
    ];

    units
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{}{}", value, unit))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(page: Page) -> String {
        Pages::new().unwrap().render(&page).unwrap()
    }

    #[test]
    fn test_every_page_renders() {
        let key = PasteKey::derive(b"hello world");
        let pages = [
            Page::Home,
            Page::NewPaste { size_limit: 128 },
            Page::Created { key },
            Page::Exists { key },
            Page::Failed { why: "nope".into() },
            Page::Show {
                key,
                content: "hello world".into(),
                remaining_ttl: Duration::from_secs(5),
            },
            Page::NotFound { path: "/paste/x".into() },
            Page::ServerError {
                code: 500,
                path: "/create-paste".into(),
            },
        ];

        let registry = Pages::new().unwrap();
        for page in pages {
            let html = registry.render(&page).unwrap();
            assert!(html.starts_with("<!DOCTYPE html>"), "{}", page.template_name());
            assert!(html.contains(&format!("<h1>{}</h1>", page.title())));
            assert!(html.trim_end().ends_with("</html>"));
        }
    }

    #[test]
    fn test_format_ttl() {
        assert_eq!(format_ttl(Duration::ZERO), "0s");
        assert_eq!(format_ttl(Duration::from_millis(999)), "0s");
        assert_eq!(format_ttl(Duration::from_secs(59)), "59s");
        assert_eq!(format_ttl(Duration::from_secs(3600)), "1h");
        assert_eq!(format_ttl(Duration::from_secs(3661)), "1h 1m 1s");
        assert_eq!(format_ttl(Duration::from_secs(7 * 86_400 - 1)), "6d 23h 59m 59s");
    }

    #[test]
    fn test_show_page_escapes_content() {
        let key = PasteKey::derive(b"<b>bold</b>");
        let html = render(Page::Show {
            key,
            content: "<b>bold</b> & \"quoted\"".to_string(),
            remaining_ttl: Duration::from_secs(90),
        });

        assert!(html.contains("&lt;b&gt;bold&lt;/b&gt; &amp; &quot;quoted&quot;"));
        assert!(!html.contains("<b>bold</b>"));
        assert!(html.contains(&key.raw_path()));
        assert!(html.contains("Expires in 1m 30s."));
        assert!(html.contains(&format!("<title>Paste {}</title>", key)));
    }

    #[test]
    fn test_failure_text_is_escaped() {
        let html = render(Page::NotFound {
            path: "/paste/<img src=x>".into(),
        });
        assert!(html.contains("/paste/&lt;img src&#x3D;x&gt;"));
    }

    #[test]
    fn test_new_paste_page_shows_limit() {
        let html = render(Page::NewPaste { size_limit: 4096 });
        assert!(html.contains("Maximum size: 4096 bytes"));
        assert!(html.contains("name=\"paste\""));
    }

    #[test]
    fn test_created_and_exists_link_to_paste() {
        let key = PasteKey::derive(b"hello world");
        for page in [Page::Created { key }, Page::Exists { key }] {
            let html = render(page);
            assert!(html.contains("href=\"/paste/uU0nuZNNPgilLlLX2n2r-g\""));
        }
    }
}
