use crate::resolver::ViewModel;
use axum::http::StatusCode;
use std::collections::HashMap;

/// Dynamic templates are rendered with the model, static pages are served as-is
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum ViewKind {
    Template,
    Static,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedView {
    pub name: String,
    pub kind: ViewKind,
    pub source: String,
}

/// Named error views, each possibly present as template and as static page
#[derive(Debug, Clone, Default)]
pub struct ViewCatalog {
    templates: HashMap<String, String>,
    statics: HashMap<String, String>,
}

impl ViewCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_template(&mut self, name: impl Into<String>, source: impl Into<String>) -> &mut Self {
        let name: String = name.into();
        self.templates.insert(normalize(&name).to_string(), source.into());
        self
    }

    pub fn add_static(&mut self, name: impl Into<String>, source: impl Into<String>) -> &mut Self {
        let name: String = name.into();
        self.statics.insert(normalize(&name).to_string(), source.into());
        self
    }

    /// Look up `name`; a template wins over a static page of the same name
    pub fn find(&self, name: &str) -> Option<ResolvedView> {
        let name = normalize(name);
        let found = |kind, source: &String| ResolvedView {
            name: name.to_string(),
            kind,
            source: source.clone(),
        };
        self.templates
            .get(name)
            .map(|source| found(ViewKind::Template, source))
            .or_else(|| self.statics.get(name).map(|source| found(ViewKind::Static, source)))
    }

    /// Status-driven resolution used by the default error route:
    /// `error/404` > `error/4xx` > `error`
    pub fn resolve_error_view(&self, status: StatusCode) -> Option<ResolvedView> {
        let code = status.as_u16();
        [
            format!("error/{code}"),
            format!("error/{}xx", code / 100),
            "error".to_string(),
        ]
        .iter()
        .find_map(|candidate| self.find(candidate))
    }

    /// View for a specific error route, falling back to the generic `error` view
    pub fn resolve_route_view(&self, route: &str) -> Option<ResolvedView> {
        self.find(route).or_else(|| self.find("error"))
    }
}

/// `/error-page/404` and `error-page/404` name the same view
fn normalize(name: &str) -> &str {
    name.trim_start_matches('/')
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("view '{view}' references unknown attribute '{attribute}'")]
    MissingAttribute { view: String, attribute: String },

    #[error("view '{view}' has an unterminated placeholder")]
    Unterminated { view: String },

    #[error("render failed: {0}")]
    Failed(String),
}

/// Turns a resolved view and its model into a response body
pub trait ViewRenderer: Send + Sync + 'static {
    fn render(&self, view: &ResolvedView, model: &ViewModel) -> Result<String, RenderError>;
}

/// Substitutes `{{name}}` placeholders in templates; static pages pass through
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderRenderer;

impl ViewRenderer for PlaceholderRenderer {
    fn render(&self, view: &ResolvedView, model: &ViewModel) -> Result<String, RenderError> {
        if view.kind == ViewKind::Static {
            return Ok(view.source.clone());
        }

        let mut output = String::with_capacity(view.source.len());
        let mut rest = view.source.as_str();
        while let Some(start) = rest.find("{{") {
            output.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| RenderError::Unterminated {
                view: view.name.clone(),
            })?;
            let attribute = after[..end].trim();
            let value = model
                .get(attribute)
                .ok_or_else(|| RenderError::MissingAttribute {
                    view: view.name.clone(),
                    attribute: attribute.to_string(),
                })?;
            output.push_str(value);
            rest = &after[end + 2..];
        }
        output.push_str(rest);
        Ok(output)
    }
}
