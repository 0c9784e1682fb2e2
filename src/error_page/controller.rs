use super::ErrorPageRegistry;
use super::view::{ViewCatalog, ViewRenderer};
use crate::common::{AcceptKind, RequestRecord, TransportResponse};
use crate::config::ErrorProperties;
use crate::fault::Fault;
use std::sync::Arc;

/// Handles replayed error requests.
///
/// API clients get the JSON error body; page clients get a view picked from
/// the catalog. Any failure here is returned as a [`Fault`] and the pipeline
/// answers with the minimal fallback instead of resolving it again.
pub struct ErrorController {
    catalog: Arc<ViewCatalog>,
    renderer: Arc<dyn ViewRenderer>,
    registry: Arc<ErrorPageRegistry>,
    properties: Arc<ErrorProperties>,
}

impl ErrorController {
    pub fn new(
        catalog: Arc<ViewCatalog>,
        renderer: Arc<dyn ViewRenderer>,
        registry: Arc<ErrorPageRegistry>,
        properties: Arc<ErrorProperties>,
    ) -> Self {
        Self {
            catalog,
            renderer,
            registry,
            properties,
        }
    }

    pub fn handle(&self, request: &RequestRecord) -> Result<TransportResponse, Fault> {
        let attributes = request
            .error_attributes()
            .ok_or_else(|| Fault::internal("error route invoked without error attributes"))?;
        let status = attributes.status;

        if request.accept() == AcceptKind::Api {
            tracing::debug!(route = request.path(), %status, "rendering JSON error body");
            return Ok(TransportResponse::json(
                status,
                &attributes.to_body(&self.properties),
            ));
        }

        // The default route picks a view by status; any other route names its own view
        let view = if request.path() == self.registry.default_route() {
            self.catalog.resolve_error_view(status)
        } else {
            self.catalog.resolve_route_view(request.path())
        };

        let Some(view) = view else {
            if self.properties.whitelabel_enabled {
                tracing::debug!(route = request.path(), %status, "no error view, using whitelabel page");
                return Ok(TransportResponse::html(status, whitelabel(attributes.error(), status.as_u16())));
            }
            return Err(Fault::not_found(format!(
                "no error view for route {}",
                request.path()
            )));
        };

        tracing::debug!(
            route = request.path(),
            view = %view.name,
            kind = %view.kind,
            %status,
            "rendering error view"
        );
        let model = attributes.to_model(&self.properties);
        let body = self.renderer.render(&view, &model).map_err(|e| {
            Fault::internal(format!("failed to render error view {}", view.name)).caused_by(e)
        })?;
        Ok(TransportResponse::html(status, body))
    }
}

fn whitelabel(error: &str, status: u16) -> String {
    format!(
        "<html><body><h1>Whitelabel Error Page</h1>\
         <p>There was an unexpected error (type={error}, status={status}).</p></body></html>"
    )
}
