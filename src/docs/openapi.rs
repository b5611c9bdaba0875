//! OpenAPI document generation and the documentation endpoints.
//!
//! Serves `GET /swagger/{doc}/swagger.json` and a Swagger UI page at
//! `GET /swagger`. Only the `v1` document exists.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use utoipa::openapi::{
    info::InfoBuilder,
    path::{OperationBuilder, PathItemBuilder, PathItemType, PathsBuilder},
    response::ResponseBuilder,
    schema::ComponentsBuilder,
    security::{HttpAuthScheme, HttpBuilder, SecurityRequirement, SecurityScheme},
    OpenApi, OpenApiBuilder,
};

use crate::docs::artifact::{DocumentationArtifact, OperationDoc};
use crate::docs::DocumentationError;
use crate::http::response::error_response;

/// Name of the single generated document.
pub const DOCUMENT_NAME: &str = "v1";

/// Name of the security scheme in the generated document.
pub const SECURITY_SCHEME_NAME: &str = "Bearer";

/// Bearer authentication advertised by the documentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecuritySchemeDeclaration {
    pub header_name: &'static str,
    pub scheme: &'static str,
    pub bearer_format: &'static str,
}

pub const BEARER_JWT: SecuritySchemeDeclaration = SecuritySchemeDeclaration {
    header_name: "Authorization",
    scheme: "bearer",
    bearer_format: "JWT",
};

impl SecuritySchemeDeclaration {
    fn to_scheme(self) -> SecurityScheme {
        SecurityScheme::Http(
            HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format(self.bearer_format)
                .description(Some(format!(
                    "Please insert {} with {} into the {} header",
                    self.bearer_format, self.scheme, self.header_name
                )))
                .build(),
        )
    }
}

/// Name and version of the running service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
}

impl ServiceInfo {
    /// Taken from the crate metadata of this build.
    pub const fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Generator bound to an artifact, a security scheme and the service info.
#[derive(Clone)]
pub struct DocumentationGenerator {
    document: Arc<OpenApi>,
}

impl fmt::Debug for DocumentationGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentationGenerator")
            .field("title", &self.document.info.title)
            .field("paths", &self.document.paths.paths.len())
            .finish()
    }
}

impl DocumentationGenerator {
    pub fn new(
        artifact: &DocumentationArtifact,
        security: SecuritySchemeDeclaration,
        service: ServiceInfo,
    ) -> Result<Self, DocumentationError> {
        let info = InfoBuilder::new()
            .title(artifact.title.clone().unwrap_or_else(|| service.name.to_string()))
            .version(service.version)
            .description(artifact.description.clone())
            .build();

        let mut grouped: BTreeMap<&str, Vec<&OperationDoc>> = BTreeMap::new();
        for op in &artifact.operations {
            grouped.entry(op.path.as_str()).or_default().push(op);
        }

        let mut paths = PathsBuilder::new();
        for (path, ops) in grouped {
            let mut item = PathItemBuilder::new();
            for op in ops {
                let method = path_item_type(&op.method).ok_or_else(|| {
                    DocumentationError::UnsupportedMethod {
                        method: op.method.clone(),
                        path: op.path.clone(),
                    }
                })?;
                item = item.operation(method, build_operation(op));
            }
            paths = paths.path(path, item.build());
        }

        let components = ComponentsBuilder::new()
            .security_scheme(SECURITY_SCHEME_NAME, security.to_scheme())
            .build();

        let document = OpenApiBuilder::new()
            .info(info)
            .paths(paths.build())
            .components(Some(components))
            .security(Some(vec![SecurityRequirement::new(
                SECURITY_SCHEME_NAME,
                Vec::<String>::new(),
            )]))
            .build();

        Ok(Self {
            document: Arc::new(document),
        })
    }

    pub fn document(&self) -> &OpenApi {
        &self.document
    }

    /// Routes serving the document and the UI.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/swagger", get(swagger_ui))
            .route("/swagger/index.html", get(swagger_ui))
            .route("/swagger/{doc}/swagger.json", get(swagger_json))
            .with_state(self.document.clone())
    }
}

fn build_operation(op: &OperationDoc) -> utoipa::openapi::path::Operation {
    let mut builder = OperationBuilder::new()
        .operation_id(Some(operation_id(op)))
        .summary(op.summary.clone())
        .description(op.description.clone())
        .response("200", ResponseBuilder::new().description("Success").build())
        .response("401", ResponseBuilder::new().description("Unauthorized").build())
        .response("403", ResponseBuilder::new().description("Forbidden").build());
    if let Some(tag) = &op.tag {
        builder = builder.tag(tag.clone());
    }
    builder.build()
}

fn operation_id(op: &OperationDoc) -> String {
    let path: String = op
        .path
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}{}", op.method.to_ascii_lowercase(), path.trim_end_matches('_'))
}

fn path_item_type(method: &str) -> Option<PathItemType> {
    match method.to_ascii_lowercase().as_str() {
        "get" => Some(PathItemType::Get),
        "post" => Some(PathItemType::Post),
        "put" => Some(PathItemType::Put),
        "delete" => Some(PathItemType::Delete),
        "patch" => Some(PathItemType::Patch),
        "head" => Some(PathItemType::Head),
        "options" => Some(PathItemType::Options),
        "trace" => Some(PathItemType::Trace),
        _ => None,
    }
}

async fn swagger_json(State(document): State<Arc<OpenApi>>, Path(doc): Path<String>) -> Response {
    if doc == DOCUMENT_NAME {
        Json(document.as_ref().clone()).into_response()
    } else {
        error_response(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("unknown documentation `{}`", doc),
        )
    }
}

async fn swagger_ui(State(document): State<Arc<OpenApi>>) -> Html<String> {
    Html(format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <title>{title}</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.ui = SwaggerUIBundle({{ url: "/swagger/{doc}/swagger.json", dom_id: "#swagger-ui" }});
  </script>
</body>
</html>"##,
        title = document.info.title,
        doc = DOCUMENT_NAME,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path as FsPath;

    fn artifact() -> DocumentationArtifact {
        DocumentationArtifact::parse(
            FsPath::new("inline.toml"),
            r#"
            [[operations]]
            method = "get"
            path = "/api/v1/orders"
            summary = "List orders"
            tag = "orders"

            [[operations]]
            method = "POST"
            path = "/api/v1/orders"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_debug_summarizes_document() {
        let generator =
            DocumentationGenerator::new(&artifact(), BEARER_JWT, ServiceInfo::current()).unwrap();
        let debug = format!("{:?}", generator);
        assert!(debug.contains("title: \"api-bootstrap\""));
        assert!(debug.contains("paths: 1"));
    }

    #[test]
    fn test_document_uses_service_info_and_bearer_scheme() {
        let generator =
            DocumentationGenerator::new(&artifact(), BEARER_JWT, ServiceInfo::current()).unwrap();
        let json = serde_json::to_value(generator.document()).unwrap();

        assert_eq!(json["info"]["title"], "api-bootstrap");
        assert_eq!(json["info"]["version"], env!("CARGO_PKG_VERSION"));

        let scheme = &json["components"]["securitySchemes"][SECURITY_SCHEME_NAME];
        assert_eq!(scheme["type"], "http");
        assert_eq!(scheme["scheme"], "bearer");
        assert_eq!(scheme["bearerFormat"], "JWT");
        assert!(scheme["description"].as_str().unwrap().contains("Authorization"));

        assert!(json["security"][0].get(SECURITY_SCHEME_NAME).is_some());
    }

    #[test]
    fn test_operations_grouped_by_path() {
        let generator =
            DocumentationGenerator::new(&artifact(), BEARER_JWT, ServiceInfo::current()).unwrap();
        let json = serde_json::to_value(generator.document()).unwrap();

        let item = &json["paths"]["/api/v1/orders"];
        assert_eq!(item["get"]["summary"], "List orders");
        assert_eq!(item["get"]["operationId"], "get_api_v1_orders");
        assert!(item["post"].is_object());
    }

    #[test]
    fn test_unknown_method_is_rejected() {
        let artifact = DocumentationArtifact::parse(
            FsPath::new("inline.toml"),
            "[[operations]]\nmethod = \"fetch\"\npath = \"/x\"\n",
        )
        .unwrap();
        let err = DocumentationGenerator::new(&artifact, BEARER_JWT, ServiceInfo::current()).unwrap_err();
        assert!(matches!(err, DocumentationError::UnsupportedMethod { .. }));
    }
}
