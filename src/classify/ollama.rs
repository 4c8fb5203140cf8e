use std::time::Duration;

use anyhow::Result;
use log::debug;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::classify::TextBackend;
use crate::config::ClassifierConfig;
use crate::error::BackendError;

const NAME: &str = "ollama-http";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f64,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Text generation over the `/api/generate` HTTP endpoint.
pub struct OllamaHttp {
    client: Client,
    base_url: String,
    model: String,
    temperature: f64,
    num_predict: u32,
    probe_timeout: Duration,
}

impl OllamaHttp {
    pub fn new(cfg: &ClassifierConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            num_predict: cfg.num_predict,
            probe_timeout: Duration::from_secs(cfg.probe_timeout_secs),
        })
    }

    fn http_err(source: reqwest::Error) -> BackendError {
        BackendError::Http {
            backend: NAME,
            source,
        }
    }
}

impl TextBackend for OllamaHttp {
    fn name(&self) -> &'static str {
        NAME
    }

    fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let url = format!("{}/api/generate", self.base_url);
        let req = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                num_predict: self.num_predict,
            },
        };

        let resp = self
            .client
            .post(&url)
            .json(&req)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(Self::http_err)?;
        let body: GenerateResponse = resp.json().map_err(Self::http_err)?;
        debug!("{NAME} answered {} chars", body.response.len());
        Ok(body.response.trim().to_string())
    }

    fn probe(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).timeout(self.probe_timeout).send() {
            Ok(r) => r.status().is_success(),
            Err(e) => {
                debug!("{NAME} probe failed: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::mpsc;
    use std::thread;
    use tiny_http::{Response, Server};

    fn config_for(base_url: String) -> ClassifierConfig {
        ClassifierConfig {
            base_url,
            model: "test-model".into(),
            timeout_secs: 5,
            probe_timeout_secs: 2,
            ..Default::default()
        }
    }

    /// Serve `count` requests with a canned body, reporting each request's
    /// path and body.
    fn fake_server(count: usize, reply: &'static str) -> (String, mpsc::Receiver<(String, String)>) {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for _ in 0..count {
                let Ok(mut request) = server.recv() else {
                    return;
                };
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let _ = tx.send((request.url().to_string(), body));
                let _ = request.respond(Response::from_string(reply));
            }
        });
        (format!("http://{addr}"), rx)
    }

    #[test]
    fn posts_generate_request_and_reads_response_field() {
        let (base, rx) = fake_server(1, r#"{"response":"  category: task\nurgency: urgent \n","done":true}"#);
        let backend = OllamaHttp::new(&config_for(base)).unwrap();

        let text = backend.generate("classify this").unwrap();
        assert_eq!(text, "category: task\nurgency: urgent");

        let (path, body) = rx.recv().unwrap();
        assert_eq!(path, "/api/generate");
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["model"], "test-model");
        assert_eq!(json["prompt"], "classify this");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 50);
        assert!((json["options"]["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn probe_hits_tags_endpoint() {
        let (base, rx) = fake_server(1, r#"{"models":[]}"#);
        let backend = OllamaHttp::new(&config_for(base)).unwrap();
        assert!(backend.probe());
        assert_eq!(rx.recv().unwrap().0, "/api/tags");
    }

    #[test]
    fn unreachable_endpoint_is_an_http_error() {
        // Bind then drop to get a port nothing listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let backend = OllamaHttp::new(&config_for(format!("http://127.0.0.1:{port}"))).unwrap();

        assert!(matches!(
            backend.generate("x"),
            Err(BackendError::Http { .. })
        ));
        assert!(!backend.probe());
    }
}
