use utoipa::OpenApi;

use crate::routes::{admin, health, v1, webhooks};

#[derive(OpenApi)]
#[openapi(info(
    title = "logoreel-server",
    description = "Creative direction, credits and billing API for logo animation videos",
    version = "0.1.0"
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(webhooks::WebhooksApi::openapi());
    root.merge(v1::api_docs());
    root.merge(admin::api_docs());
    root
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn document_lists_every_area() {
        let doc = get_docs();
        for path in [
            "/health",
            "/webhooks/stripe",
            "/v1/direction/sessions/{id}/messages",
            "/v1/billing/checkout",
            "/admin/credits/adjust",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
