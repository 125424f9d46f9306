// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// OpenAI LLM Provider Adapter
//
// Anti-Corruption Layer for OpenAI API
// Also works with OpenAI-compatible APIs (LM Studio, vLLM, etc.)

use super::stream::{decode_lines, sse_data, LineDecoder};
use crate::domain::llm::{ChunkStream, Completion, LLMError, LLMProvider, Message, StreamChunk};
use async_trait::async_trait;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct OpenAIAdapter {
    client: reqwest::Client,
    timeout: Duration,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct OpenAIMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIUsage {
    total_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAIStreamChunk {
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIDelta,
}

#[derive(Deserialize)]
struct OpenAIDelta {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAIAdapter {
    /// `api_key` may only be `None` for self-hosted OpenAI-compatible servers.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LLMError> {
        let model = model.into();
        if model.is_empty() {
            return Err(LLMError::Configuration("OpenAI adapter requires a model".into()));
        }

        let client = super::http_client(timeout)?;

        Ok(Self {
            client,
            timeout,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            model,
        })
    }

    fn request(&self, messages: &[Message], model: &str, stream: bool) -> reqwest::RequestBuilder {
        // Translate our domain types to OpenAI's types
        let body = OpenAIRequest {
            model,
            messages: messages
                .iter()
                .map(|m| OpenAIMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            stream,
        };

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        request
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        model: &str,
    ) -> Result<reqwest::Response, LLMError> {
        let response = request.send().await.map_err(LLMError::from_transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LLMError::from_status(status, error_text, model));
        }

        Ok(response)
    }
}

#[async_trait]
impl LLMProvider for OpenAIAdapter {
    async fn chat(
        &self,
        messages: &[Message],
        model: Option<&str>,
    ) -> Result<Completion, LLMError> {
        let model = model.unwrap_or(&self.model);
        let request = self.request(messages, model, false).timeout(self.timeout);
        let response = self.send(request, model).await?;

        let openai_response: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| LLMError::MalformedPayload(format!("Failed to parse response: {}", e)))?;

        let choice = openai_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::MalformedPayload("No choices in response".into()))?;

        Ok(Completion {
            content: choice.message.content.unwrap_or_default(),
            tokens_used: openai_response.usage.map(|u| u.total_tokens).unwrap_or(0),
            model: Some(openai_response.model.unwrap_or_else(|| model.to_string())),
        })
    }

    async fn chat_stream(
        &self,
        messages: &[Message],
        model: Option<&str>,
    ) -> Result<ChunkStream, LLMError> {
        let model = model.unwrap_or(&self.model);
        let response = self.send(self.request(messages, model, true), model).await?;

        let bytes = response.bytes_stream().map_err(LLMError::from_transport);
        Ok(decode_lines(bytes, OpenAISseDecoder))
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        let mut request = self
            .client
            .get(format!("{}/models", self.endpoint))
            .timeout(self.timeout);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(LLMError::from_transport)?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(LLMError::from_status(response.status(), String::new(), &self.model))
        }
    }
}

struct OpenAISseDecoder;

impl LineDecoder for OpenAISseDecoder {
    fn provider(&self) -> &'static str {
        "openai"
    }

    fn decode_line(&mut self, line: &str) -> Result<Option<StreamChunk>, LLMError> {
        let Some(data) = sse_data(line) else {
            return Ok(None);
        };
        if data == "[DONE]" {
            return Ok(Some(StreamChunk::Done));
        }

        let chunk: OpenAIStreamChunk = serde_json::from_str(data)
            .map_err(|e| LLMError::MalformedFragment(e.to_string()))?;

        let text: String = chunk
            .choices
            .into_iter()
            .filter_map(|c| c.delta.content)
            .collect();
        Ok(Some(StreamChunk::Delta(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::testing::read_request;
    use futures::StreamExt;
    use tokio::io::AsyncWriteExt;

    fn adapter(url: &str) -> OpenAIAdapter {
        OpenAIAdapter::new(
            url,
            Some("sk-test".into()),
            "gpt-4o-mini",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_missing_model_is_configuration_error() {
        let err = OpenAIAdapter::new("http://x", None, "", Duration::from_secs(1)).err().unwrap();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_chat_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"model":"gpt-4o-mini-2024","choices":[{"message":{"role":"assistant","content":"hello"}}],"usage":{"prompt_tokens":3,"completion_tokens":2,"total_tokens":5}}"#,
            )
            .create_async()
            .await;

        let completion = adapter(&server.url()).chat(&[Message::user("hi")], None).await.unwrap();
        assert_eq!(completion.content, "hello");
        assert_eq!(completion.tokens_used, 5);
        assert_eq!(completion.model.as_deref(), Some("gpt-4o-mini-2024"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_chat_maps_http_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let err = adapter(&server.url()).chat(&[Message::user("hi")], None).await.unwrap_err();
        assert_eq!(
            err,
            LLMError::Http {
                status: 503,
                body: "overloaded".into()
            }
        );
    }

    #[tokio::test]
    async fn test_chat_rejects_malformed_payload() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let err = adapter(&server.url()).chat(&[Message::user("hi")], None).await.unwrap_err();
        assert!(matches!(err, LLMError::MalformedPayload(_)));
    }

    #[tokio::test]
    async fn test_chat_stream_skips_malformed_chunk() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" wor\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ld\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let stream = adapter(&server.url())
            .chat_stream(&[Message::user("hi")], None)
            .await
            .unwrap();
        let items: Vec<_> = stream.collect().await;

        let deltas: Vec<&str> = items
            .iter()
            .filter_map(|i| match i {
                Ok(StreamChunk::Delta(t)) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(deltas, vec!["Hel", "lo", " wor", "ld"]);
        assert_eq!(items.last(), Some(&Ok(StreamChunk::Done)));
    }

    /// Streams `deltas` SSE chunks, one every `gap`, then `[DONE]`
    async fn paced_sse_server(deltas: usize, gap: Duration) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n")
                .await
                .unwrap();
            for i in 0..deltas {
                tokio::time::sleep(gap).await;
                let line = format!(
                    "data: {{\"choices\":[{{\"delta\":{{\"content\":\"t{}\"}}}}]}}\n\n",
                    i
                );
                if socket.write_all(line.as_bytes()).await.is_err() {
                    return;
                }
            }
            let _ = socket.write_all(b"data: [DONE]\n\n").await;
            let _ = socket.shutdown().await;
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_long_stream_outlives_timeout() {
        let url = paced_sse_server(4, Duration::from_millis(400)).await;
        let adapter = OpenAIAdapter::new(url, None, "local-model", Duration::from_secs(1)).unwrap();

        let items: Vec<_> = adapter
            .chat_stream(&[Message::user("count")], None)
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(
            items,
            vec![
                Ok(StreamChunk::Delta("t0".into())),
                Ok(StreamChunk::Delta("t1".into())),
                Ok(StreamChunk::Delta("t2".into())),
                Ok(StreamChunk::Delta("t3".into())),
                Ok(StreamChunk::Done),
            ]
        );
    }

    #[tokio::test]
    async fn test_stalled_stream_times_out() {
        let url = paced_sse_server(2, Duration::from_millis(900)).await;
        let adapter =
            OpenAIAdapter::new(url, None, "local-model", Duration::from_millis(300)).unwrap();

        let items: Vec<_> = adapter
            .chat_stream(&[Message::user("count")], None)
            .await
            .unwrap()
            .collect()
            .await;

        assert!(matches!(items.last(), Some(Err(_))));
        assert!(!items.contains(&Ok(StreamChunk::Done)));
    }
}
