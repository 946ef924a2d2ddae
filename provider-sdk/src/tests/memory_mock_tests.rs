//! Mock tests for the Mem0 memory adapter

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::ProviderCredentials;
    use crate::core::{AdapterRequest, EndpointClass, ProviderAdapter, ProviderIdentity, ResourceKind};
    use crate::services::memory::Mem0Adapter;

    fn adapter(server: &MockServer) -> Mem0Adapter {
        let identity = ProviderIdentity::new(ResourceKind::Memory, "mem0", EndpointClass::RemoteManaged);
        let creds = ProviderCredentials::new("mem0", server.uri()).with_api_key("m0-mock");
        Mem0Adapter::new(identity, &creds).unwrap()
    }

    fn request(action: &str, params: Value) -> AdapterRequest {
        AdapterRequest::new(action, params.as_object().cloned().unwrap())
    }

    #[tokio::test]
    async fn test_add_memory() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/memories"))
            .and(header("authorization", "Bearer m0-mock"))
            .and(body_partial_json(json!({"user_id": "u1", "metadata": {"session_id": "s1"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "mem-1", "memory": "Likes tea", "event": "ADD"}
            ])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let payload = adapter(&mock_server)
            .execute(&request("add", json!({"userId": "u1", "messages": "I like tea"})).with_session("s1"))
            .await
            .unwrap();

        assert_eq!(payload["count"], 1);
        assert_eq!(payload["memories"][0]["id"], "mem-1");
    }

    #[tokio::test]
    async fn test_search_memories() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/memories/search"))
            .and(query_param("query", "tea"))
            .and(query_param("user_id", "u1"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"id": "mem-1", "memory": "Likes tea", "user_id": "u1", "score": 0.93}]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let payload = adapter(&mock_server)
            .execute(&request("search", json!({"userId": "u1", "query": "tea", "limit": 5})))
            .await
            .unwrap();

        assert_eq!(payload["memories"][0]["score"], 0.93);
        assert_eq!(payload["memories"][0]["userId"], "u1");
    }

    #[tokio::test]
    async fn test_delete_memory() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/memories/mem-7"))
            .and(query_param("user_id", "u1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "mem-7", "memory": "x", "user_id": "u1"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/memories/mem-7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Memory deleted successfully!"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let payload = adapter(&mock_server)
            .execute(&request("delete", json!({"userId": "u1", "memoryId": "mem-7"})))
            .await
            .unwrap();

        assert_eq!(payload, json!({"memoryId": "mem-7", "deleted": true}));
    }

    #[tokio::test]
    async fn test_get_missing_memory_is_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/memories/nope"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "Memory not found"})))
            .mount(&mock_server)
            .await;

        let err = adapter(&mock_server)
            .execute(&request("get", json!({"userId": "u1", "memoryId": "nope"})))
            .await
            .unwrap_err();

        assert_eq!(err.category(), "not_found");
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn test_foreign_memory_is_not_touched() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/memories/mem-a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "mem-a", "memory": "alice secret", "user_id": "alice"
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let memory = adapter(&mock_server);
        for (action, params) in [
            ("get", json!({"userId": "bob", "memoryId": "mem-a"})),
            ("update", json!({"userId": "bob", "memoryId": "mem-a", "data": "bob was here"})),
            ("delete", json!({"userId": "bob", "memoryId": "mem-a"})),
        ] {
            let err = memory.execute(&request(action, params)).await.unwrap_err();
            assert_eq!(err.category(), "not_found", "{} should not reach alice's memory", action);
        }
    }
}
