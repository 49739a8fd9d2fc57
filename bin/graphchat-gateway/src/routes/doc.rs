use utoipa::OpenApi;

use crate::routes::{chat, conversations, health};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "graphchat-gateway",
        description = "Conversational gateway over a graph-database question-answering agent"
    ),
    modifiers(&ApiKeySecurity),
    security(("api_key" = []))
)]
pub struct ApiDoc;

struct ApiKeySecurity;

impl utoipa::Modify for ApiKeySecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};

        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_key",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
        );
    }
}

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(chat::ChatApi::openapi());
    root.merge(conversations::ConversationsApi::openapi());
    root
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn documents_every_route() {
        let doc = get_docs();
        for path in ["/health", "/chat", "/chat/stream", "/conversations/{id}/messages"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
